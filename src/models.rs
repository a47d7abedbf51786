//! Models and grids the downloader knows how to fetch.

use std::{fmt, str::FromStr};

use crate::errors::FetchErr;

/// Models published on the open data server.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, EnumIter, IntoStaticStr, Hash)]
pub enum Model {
    /// The regional COSMO model over Germany.
    #[strum(serialize = "cosmo-d2")]
    CosmoD2,
    /// The COSMO-D2 ensemble.
    #[strum(serialize = "cosmo-d2-eps")]
    CosmoD2Eps,
    /// The global ICON model.
    #[strum(serialize = "icon")]
    Icon,
    /// The global ICON ensemble.
    #[strum(serialize = "icon-eps")]
    IconEps,
    /// The ICON nest over Europe.
    #[strum(serialize = "icon-eu")]
    IconEu,
    /// The ICON-EU ensemble.
    #[strum(serialize = "icon-eu-eps")]
    IconEuEps,
    /// The high resolution ICON nest over Germany.
    #[strum(serialize = "icon-d2")]
    IconD2,
    /// The ICON-D2 ensemble.
    #[strum(serialize = "icon-d2-eps")]
    IconD2Eps,
}

impl Model {
    /// The name the downloader expects after `--model`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Parse a model name, case insensitive.
    pub fn parse(name: &str) -> Result<Self, FetchErr> {
        Model::from_str(&name.trim().to_lowercase())
            .map_err(|_| FetchErr::InvalidModelName(name.to_owned()))
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spatial discretization of the published files.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, EnumIter, IntoStaticStr, Hash)]
pub enum Grid {
    /// The native triangular ICON grid.
    #[strum(serialize = "icosahedral")]
    Icosahedral,
    /// Regular latitude-longitude.
    #[strum(serialize = "regular-lat-lon")]
    RegularLatLon,
    /// Rotated pole latitude-longitude, used by the COSMO models.
    #[strum(serialize = "rotated-lat-lon")]
    RotatedLatLon,
}

impl Grid {
    /// The name the downloader expects after `--grid`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Parse a grid name, case insensitive.
    pub fn parse(name: &str) -> Result<Self, FetchErr> {
        Grid::from_str(&name.trim().to_lowercase())
            .map_err(|_| FetchErr::InvalidGrid(name.to_owned()))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
