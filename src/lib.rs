#![deny(missing_docs)]
//! Package to drive an open-data GRIB downloader over every field category of a model run.

//
// Public API
//
pub use category::{Category, Invocation};
pub use cmd_line::CommonCmdLineArgs;
pub use config::{FieldSelection, LevelRange, Profile, RunConfig, RunConfigBuilder, StepRange};
pub use dispatch::{dispatch_categories, exit_code, run, CategoryOutcome, RunSummary};
pub use downloader::{
    shutdown_channel, Captured, Downloader, Exit, ProcessDownloader, Shutdown, ShutdownTrigger,
};
pub use errors::{FetchErr, EXIT_CANCELLED, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
pub use models::{Grid, Model};
pub use output::prepare_output_dir;
pub use timestamp::{resolve_latest_timestamp, ModelRun};

//
// Implementation only
//
#[macro_use]
extern crate strum_macros;

mod category;
mod cmd_line;
mod config;
mod dispatch;
mod downloader;
mod errors;
mod models;
mod output;
mod timestamp;
