//! Module for errors.
use std::{error::Error, fmt::Display, path::PathBuf};

use crate::category::Category;

/// Error from the orchestration layer.
#[derive(Debug)]
pub enum FetchErr {
    // Fatal errors, the run stops immediately.
    /// The downloader could not report the latest model run.
    Resolution(String),
    /// The output directory could not be created.
    Storage {
        /// The directory we tried to create.
        path: PathBuf,
        /// The underlying filesystem error.
        source: ::std::io::Error,
    },

    // Per category errors, collected and summarized at the end.
    /// A single category invocation failed.
    Download {
        /// The category that failed.
        category: Category,
        /// Exit status or spawn failure, as text.
        reason: String,
    },

    // Configuration errors, raised before the downloader is ever started.
    /// A setting is out of range or inconsistent with another.
    InvalidConfig(String),
    /// Invalid model name
    InvalidModelName(String),
    /// Invalid grid name
    InvalidGrid(String),
    /// An explicit model run that is not of the form YYYYMMDDHH.
    InvalidModelRun(String),

    // Inherited errors from std and friends
    /// Error forwarded from std
    IO(::std::io::Error),
    /// Profile file could not be parsed.
    Profile(toml::de::Error),

    /// Shutdown was requested while the run was in progress.
    Cancelled,
}

impl Display for FetchErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::FetchErr::*;

        match self {
            Resolution(msg) => write!(f, "unable to resolve latest model run: {}", msg),
            Storage { path, source } => write!(
                f,
                "unable to create output directory {}: {}",
                path.display(),
                source
            ),
            Download { category, reason } => write!(f, "{} download failed: {}", category, reason),

            InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            InvalidModelName(mdl_nm) => write!(f, "invalid model name: {}", mdl_nm),
            InvalidGrid(grid) => write!(f, "invalid grid: {}", grid),
            InvalidModelRun(run) => write!(f, "invalid model run (expected YYYYMMDDHH): {}", run),

            IO(err) => write!(f, "std lib io error: {}", err),
            Profile(err) => write!(f, "error parsing profile: {}", err),

            Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Error for FetchErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchErr::Storage { source, .. } => Some(source),
            FetchErr::IO(err) => Some(err),
            FetchErr::Profile(err) => Some(err),
            _ => None,
        }
    }
}

/// Process exit status of a run with nothing failed.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit status when the run could not start or was aborted by an error.
pub const EXIT_FATAL: i32 = 1;
/// Process exit status when at least one category failed.
pub const EXIT_PARTIAL: i32 = 2;
/// Process exit status after a shutdown request, 128 + SIGINT.
pub const EXIT_CANCELLED: i32 = 130;

impl FetchErr {
    /// True for errors that end the run before or instead of any download.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FetchErr::Download { .. })
    }

    /// The process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchErr::Cancelled => EXIT_CANCELLED,
            FetchErr::Download { .. } => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }
}

impl From<::std::io::Error> for FetchErr {
    fn from(err: ::std::io::Error) -> FetchErr {
        FetchErr::IO(err)
    }
}

impl From<toml::de::Error> for FetchErr {
    fn from(err: toml::de::Error) -> FetchErr {
        FetchErr::Profile(err)
    }
}
