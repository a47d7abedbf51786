//! Run configuration: defaults, an optional TOML profile, and caller overrides.
//!
//! Everything the orchestrator needs is gathered into a [`RunConfigBuilder`] and validated once
//! in [`RunConfigBuilder::build`]. The resulting [`RunConfig`] is immutable and is handed by
//! reference to the timestamp query and the category dispatcher.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    category::Category,
    errors::FetchErr,
    models::{Grid, Model},
    timestamp::ModelRun,
};

/// An inclusive range of forecast time steps (hours).
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRange {
    pub min: u32,
    pub max: u32,
}

/// An inclusive range of native model levels.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelRange {
    pub min: u32,
    pub max: u32,
}

/// The variables to fetch, one list per category. An empty list skips that category.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelection {
    pub single_level: Vec<String>,
    pub model_level: Vec<String>,
    pub pressure_level: Vec<String>,
    pub time_invariant: Vec<String>,
}

impl FieldSelection {
    /// The fields selected for a category.
    pub fn fields(&self, category: Category) -> &[String] {
        match category {
            Category::SingleLevel => &self.single_level,
            Category::ModelLevel => &self.model_level,
            Category::PressureLevel => &self.pressure_level,
            Category::TimeInvariant => &self.time_invariant,
        }
    }

    /// True if no category has anything to fetch.
    pub fn is_empty(&self) -> bool {
        self.single_level.is_empty()
            && self.model_level.is_empty()
            && self.pressure_level.is_empty()
            && self.time_invariant.is_empty()
    }
}

/// A validated, immutable run configuration.
#[derive(Clone, Debug)]
pub struct RunConfig {
    model: Model,
    grid: Option<Grid>,
    root: PathBuf,
    compressed: bool,
    modelrun: Option<ModelRun>,
    downloader: Vec<String>,
    fields: FieldSelection,
    steps: StepRange,
    model_levels: LevelRange,
    pressure_levels: Vec<String>,
    time_invariant_levels: bool,
    max_workers: Option<u32>,
    http_proxy: Option<String>,
    verbose: bool,
    dry_run: bool,
    reload: bool,
    extra_flags: Vec<String>,
}

impl RunConfig {
    /// Start from the defaults.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// The model to fetch.
    pub fn model(&self) -> Model {
        self.model
    }

    /// The grid, if one was asked for. Otherwise the downloader picks the model's default.
    pub fn grid(&self) -> Option<Grid> {
        self.grid
    }

    /// Base directory, the resolved timestamp is appended to it.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keep the files bz2 compressed.
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// Pin the run instead of asking for the latest one.
    pub fn modelrun(&self) -> Option<ModelRun> {
        self.modelrun
    }

    /// Program and leading arguments used to start the downloader.
    pub fn downloader(&self) -> &[String] {
        &self.downloader
    }

    /// The field lists.
    pub fn fields(&self) -> &FieldSelection {
        &self.fields
    }

    /// Forecast steps for the time dependent categories.
    pub fn steps(&self) -> StepRange {
        self.steps
    }

    /// Model levels for the model-level category.
    pub fn model_levels(&self) -> LevelRange {
        self.model_levels
    }

    /// Pressure levels exactly as they were given, in order.
    pub fn pressure_levels(&self) -> &[String] {
        &self.pressure_levels
    }

    /// Whether time-invariant downloads are scoped by the model-level range.
    pub fn time_invariant_levels(&self) -> bool {
        self.time_invariant_levels
    }

    /// Worker count handed to the downloader.
    pub fn max_workers(&self) -> Option<u32> {
        self.max_workers
    }

    /// HTTP proxy handed to the downloader.
    pub fn http_proxy(&self) -> Option<&str> {
        self.http_proxy.as_deref()
    }

    /// Ask the downloader for verbose output.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Ask the downloader to only report what it would fetch.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Ask the downloader to fetch files again even if they exist.
    pub fn reload(&self) -> bool {
        self.reload
    }

    /// Flags appended verbatim to every download invocation.
    pub fn extra_flags(&self) -> &[String] {
        &self.extra_flags
    }
}

/// Collects settings from defaults, a profile and the command line.
///
/// Later calls override earlier ones, so apply the profile first and the command line last.
#[derive(Clone, Debug, Default)]
pub struct RunConfigBuilder {
    model: Option<String>,
    grid: Option<String>,
    root: Option<PathBuf>,
    compressed: Option<bool>,
    modelrun: Option<String>,
    downloader: Option<Vec<String>>,
    fields: FieldSelection,
    min_step: Option<u32>,
    max_step: Option<u32>,
    min_model_level: Option<u32>,
    max_model_level: Option<u32>,
    pressure_levels: Option<Vec<String>>,
    time_invariant_levels: Option<bool>,
    max_workers: Option<u32>,
    http_proxy: Option<String>,
    verbose: Option<bool>,
    dry_run: Option<bool>,
    reload: Option<bool>,
    extra_flags: Option<Vec<String>>,
}

impl RunConfigBuilder {
    const DEFAULT_ROOT_DIR: &'static str = "opendata";
    const DEFAULT_DOWNLOADER: &'static [&'static str] = &["python3", "opendata-downloader.py"];

    /// Set the model.
    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model.as_str().to_owned());
        self
    }

    /// Set the model by name, validated in `build`.
    pub fn model_name(mut self, name: &str) -> Self {
        self.model = Some(name.to_owned());
        self
    }

    /// Set the grid.
    pub fn grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid.as_str().to_owned());
        self
    }

    /// Set the grid by name, validated in `build`.
    pub fn grid_name(mut self, name: &str) -> Self {
        self.grid = Some(name.to_owned());
        self
    }

    /// Set the base output directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Keep downloads compressed.
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = Some(compressed);
        self
    }

    /// Pin an explicit model run, `YYYYMMDDHH`.
    pub fn modelrun(mut self, run: &str) -> Self {
        self.modelrun = Some(run.to_owned());
        self
    }

    /// Program and leading arguments used to start the downloader.
    pub fn downloader<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.downloader = Some(command.into_iter().map(|s| s.as_ref().to_owned()).collect());
        self
    }

    /// Single-level fields, entries may hold several space separated names.
    pub fn single_level_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.single_level = split_words(fields);
        self
    }

    /// Model-level fields, entries may hold several space separated names.
    pub fn model_level_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.model_level = split_words(fields);
        self
    }

    /// Pressure-level fields, entries may hold several space separated names.
    pub fn pressure_level_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.pressure_level = split_words(fields);
        self
    }

    /// Time-invariant fields, entries may hold several space separated names.
    pub fn time_invariant_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.time_invariant = split_words(fields);
        self
    }

    /// First forecast step.
    pub fn min_step(mut self, step: u32) -> Self {
        self.min_step = Some(step);
        self
    }

    /// Last forecast step.
    pub fn max_step(mut self, step: u32) -> Self {
        self.max_step = Some(step);
        self
    }

    /// Lowest model level.
    pub fn min_model_level(mut self, level: u32) -> Self {
        self.min_model_level = Some(level);
        self
    }

    /// Highest model level.
    pub fn max_model_level(mut self, level: u32) -> Self {
        self.max_model_level = Some(level);
        self
    }

    /// Pressure levels, entries may hold several space separated values. Order is kept.
    pub fn pressure_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pressure_levels = Some(split_words(levels));
        self
    }

    /// Scope time-invariant downloads by the model-level range.
    pub fn time_invariant_levels(mut self, enabled: bool) -> Self {
        self.time_invariant_levels = Some(enabled);
        self
    }

    /// Worker count handed to the downloader.
    pub fn max_workers(mut self, workers: u32) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// HTTP proxy handed to the downloader.
    pub fn http_proxy(mut self, proxy: &str) -> Self {
        self.http_proxy = Some(proxy.to_owned());
        self
    }

    /// Verbose downloader output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Downloader dry run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    /// Fetch again even if files exist.
    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = Some(reload);
        self
    }

    /// Flags appended verbatim to every download invocation.
    pub fn extra_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_flags = Some(flags.into_iter().map(|s| s.as_ref().to_owned()).collect());
        self
    }

    /// Apply every setting present in a profile.
    pub fn apply_profile(mut self, profile: Profile) -> Self {
        let Profile {
            model,
            grid,
            root,
            compressed,
            modelrun,
            max_workers,
            http_proxy,
            extra_flags,
            downloader,
            verbose,
            dry_run,
            reload,
            fields,
            steps,
            model_levels,
            pressure,
        } = profile;

        self.model = model.or(self.model);
        self.grid = grid.or(self.grid);
        self.root = root.or(self.root);
        self.compressed = compressed.or(self.compressed);
        self.modelrun = modelrun.or(self.modelrun);
        self.max_workers = max_workers.or(self.max_workers);
        self.http_proxy = http_proxy.or(self.http_proxy);
        self.extra_flags = extra_flags.or(self.extra_flags);
        self.downloader = downloader.map(Words::into_vec).or(self.downloader);
        self.verbose = verbose.or(self.verbose);
        self.dry_run = dry_run.or(self.dry_run);
        self.reload = reload.or(self.reload);

        if let Some(list) = fields.single_level {
            self = self.single_level_fields(list.into_vec());
        }
        if let Some(list) = fields.model_level {
            self = self.model_level_fields(list.into_vec());
        }
        if let Some(list) = fields.pressure_level {
            self = self.pressure_level_fields(list.into_vec());
        }
        if let Some(list) = fields.time_invariant {
            self = self.time_invariant_fields(list.into_vec());
        }

        self.min_step = steps.min.or(self.min_step);
        self.max_step = steps.max.or(self.max_step);
        self.min_model_level = model_levels.min.or(self.min_model_level);
        self.max_model_level = model_levels.max.or(self.max_model_level);
        self.time_invariant_levels = model_levels.time_invariant.or(self.time_invariant_levels);

        if let Some(levels) = pressure.levels {
            self = self.pressure_levels(levels.into_vec());
        }

        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<RunConfig, FetchErr> {
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| FetchErr::InvalidConfig("no model given".to_owned()))
            .and_then(Model::parse)?;

        let grid = self.grid.as_deref().map(Grid::parse).transpose()?;

        let modelrun = self.modelrun.as_deref().map(ModelRun::parse).transpose()?;

        let root = match self.root {
            Some(root) => root,
            None => default_root()?,
        };
        if root.to_str().is_none() {
            return Err(FetchErr::InvalidConfig(format!(
                "output directory is not valid UTF-8: {}",
                root.display()
            )));
        }

        let downloader = self.downloader.unwrap_or_else(|| {
            Self::DEFAULT_DOWNLOADER
                .iter()
                .map(|s| (*s).to_owned())
                .collect()
        });
        if downloader.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(FetchErr::InvalidConfig("empty downloader command".to_owned()));
        }

        let steps = StepRange {
            min: self.min_step.unwrap_or(0),
            max: self.max_step.unwrap_or(0),
        };
        if steps.min > steps.max {
            return Err(FetchErr::InvalidConfig(format!(
                "min time step {} is greater than max time step {}",
                steps.min, steps.max
            )));
        }

        let model_levels = LevelRange {
            min: self.min_model_level.unwrap_or(0),
            max: self.max_model_level.unwrap_or(0),
        };
        if model_levels.min > model_levels.max {
            return Err(FetchErr::InvalidConfig(format!(
                "min model level {} is greater than max model level {}",
                model_levels.min, model_levels.max
            )));
        }

        // Checked as numbers, forwarded as written.
        let pressure_levels = self.pressure_levels.unwrap_or_default();
        if let Some(level) = pressure_levels.iter().find(|l| l.parse::<u32>().is_err()) {
            return Err(FetchErr::InvalidConfig(format!(
                "invalid pressure level: {}",
                level
            )));
        }

        let fields = self.fields;
        if !fields.pressure_level.is_empty() && pressure_levels.is_empty() {
            return Err(FetchErr::InvalidConfig(
                "pressure-level fields given without any pressure levels".to_owned(),
            ));
        }
        if self.max_workers == Some(0) {
            return Err(FetchErr::InvalidConfig(
                "max workers must be at least 1".to_owned(),
            ));
        }

        Ok(RunConfig {
            model,
            grid,
            root,
            compressed: self.compressed.unwrap_or(false),
            modelrun,
            downloader,
            fields,
            steps,
            model_levels,
            pressure_levels,
            time_invariant_levels: self.time_invariant_levels.unwrap_or(true),
            max_workers: self.max_workers,
            http_proxy: self.http_proxy,
            verbose: self.verbose.unwrap_or(false),
            dry_run: self.dry_run.unwrap_or(false),
            reload: self.reload.unwrap_or(false),
            extra_flags: self.extra_flags.unwrap_or_default(),
        })
    }
}

/// The default output directory, `${HOME}/opendata`.
pub fn default_root() -> Result<PathBuf, FetchErr> {
    dirs::home_dir()
        .map(|home| home.join(RunConfigBuilder::DEFAULT_ROOT_DIR))
        .ok_or_else(|| {
            FetchErr::InvalidConfig("no home directory, give an output directory".to_owned())
        })
}

fn split_words<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .flat_map(|item| {
            item.as_ref()
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

/*--------------------------------------------------------------------------------------------------
                                        Profile files
--------------------------------------------------------------------------------------------------*/

/// A list written either as one space separated string or as an array.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Words {
    /// `"t_2m pmsl"`
    Line(String),
    /// `["t_2m", "pmsl"]`
    List(Vec<String>),
}

impl Words {
    /// Split a line on whitespace, keep list entries as they are.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Words::Line(line) => line.split_whitespace().map(str::to_owned).collect(),
            Words::List(list) => list,
        }
    }
}

/// Pressure levels written either as `"975 950"` or `[975, 950]`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Levels {
    #[allow(missing_docs)]
    Line(String),
    #[allow(missing_docs)]
    List(Vec<u32>),
}

impl Levels {
    fn into_vec(self) -> Vec<String> {
        match self {
            Levels::Line(line) => line.split_whitespace().map(str::to_owned).collect(),
            Levels::List(list) => list.into_iter().map(|level| level.to_string()).collect(),
        }
    }
}

/// A saved set of run settings. Every key is optional.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub model: Option<String>,
    pub grid: Option<String>,
    pub root: Option<PathBuf>,
    pub compressed: Option<bool>,
    pub modelrun: Option<String>,
    pub max_workers: Option<u32>,
    pub http_proxy: Option<String>,
    pub extra_flags: Option<Vec<String>>,
    pub downloader: Option<Words>,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
    pub reload: Option<bool>,
    #[serde(default)]
    pub fields: ProfileFields,
    #[serde(default)]
    pub steps: ProfileRange,
    #[serde(default)]
    pub model_levels: ProfileModelLevels,
    #[serde(default)]
    pub pressure: ProfilePressure,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFields {
    pub single_level: Option<Words>,
    pub model_level: Option<Words>,
    pub pressure_level: Option<Words>,
    pub time_invariant: Option<Words>,
}

#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileModelLevels {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub time_invariant: Option<bool>,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePressure {
    pub levels: Option<Levels>,
}

impl Profile {
    /// Parse a profile from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, FetchErr> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a profile file.
    pub fn load(path: &Path) -> Result<Self, FetchErr> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
