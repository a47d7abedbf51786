//! Run every selected category against the latest model run.
//!
//! The order of events is fixed: resolve the timestamp, create the output directory, then one
//! downloader invocation per non-empty category in [`Category`] order. Resolution and storage
//! failures stop the run. A failed category is recorded and the next one still runs. A shutdown
//! stops the run but keeps what already finished.

use std::path::{Path, PathBuf};

use chrono::Utc;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::{
    category::{Category, Invocation},
    config::RunConfig,
    downloader::{Downloader, Shutdown},
    errors::{FetchErr, EXIT_CANCELLED, EXIT_PARTIAL, EXIT_SUCCESS},
    output::prepare_output_dir,
    timestamp::{resolve_latest_timestamp, ModelRun},
};

/// What happened to one category.
#[derive(Debug)]
pub enum CategoryOutcome {
    /// No fields were selected, the downloader was not started.
    Skipped,
    /// The downloader exited successfully.
    Succeeded,
    /// The downloader failed or could not be started.
    Failed(FetchErr),
    /// A shutdown stopped the downloader, or came before it was started.
    Cancelled,
}

impl CategoryOutcome {
    /// True if the downloader ran to completion for this category.
    pub fn attempted(&self) -> bool {
        matches!(self, CategoryOutcome::Succeeded | CategoryOutcome::Failed(_))
    }
}

/// The result of a complete run.
#[derive(Debug)]
pub struct RunSummary {
    timestamp: String,
    directory: PathBuf,
    outcomes: Vec<(Category, CategoryOutcome)>,
}

impl RunSummary {
    /// The model run that was fetched.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Where the files went.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Every category in dispatch order with its outcome.
    pub fn outcomes(&self) -> &[(Category, CategoryOutcome)] {
        &self.outcomes
    }

    /// The errors of the failed categories.
    pub fn failures(&self) -> impl Iterator<Item = &FetchErr> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            CategoryOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// True if a shutdown stopped the run.
    pub fn is_cancelled(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, outcome)| matches!(outcome, CategoryOutcome::Cancelled))
    }

    /// True if every selected category was downloaded.
    pub fn is_success(&self) -> bool {
        !self.is_cancelled() && self.failures().next().is_none()
    }

    /// The process exit status. Cancellation wins over failed categories.
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            EXIT_CANCELLED
        } else if self.failures().next().is_some() {
            EXIT_PARTIAL
        } else {
            EXIT_SUCCESS
        }
    }
}

/// The process exit status for the result of [`run`].
pub fn exit_code(result: &Result<RunSummary, FetchErr>) -> i32 {
    match result {
        Ok(summary) => summary.exit_code(),
        Err(err) => err.exit_code(),
    }
}

/// Resolve, prepare and dispatch.
pub async fn run(
    config: &RunConfig,
    downloader: &dyn Downloader,
    shutdown: &Shutdown,
) -> Result<RunSummary, FetchErr> {
    let start = Utc::now();
    info!(model = %config.model(), "run started at {}", start.format("%Y-%m-%d %H:%M:%S UTC"));

    if config.fields().is_empty() {
        warn!("no fields selected, nothing will be downloaded");
    }

    let timestamp = resolve_latest_timestamp(downloader, config).await?;
    let directory = prepare_output_dir(config.root(), &timestamp)?;

    // The downloader picks "latest" again on every call, so pin it to what was resolved.
    let modelrun = config
        .modelrun()
        .or_else(|| ModelRun::parse(&timestamp).ok());
    debug!(?modelrun, "pinned model run");

    let outcomes = dispatch_categories(config, &directory, modelrun, downloader, shutdown).await;

    let summary = RunSummary {
        timestamp,
        directory,
        outcomes,
    };

    let end = Utc::now();
    info!(
        "run finished at {} after {}s, {} of {} categories failed",
        end.format("%Y-%m-%d %H:%M:%S UTC"),
        (end - start).num_seconds(),
        summary.failures().count(),
        summary.outcomes().iter().filter(|(_, o)| o.attempted()).count(),
    );

    Ok(summary)
}

/// Issue one invocation per non-empty category, in order, each awaited before the next.
///
/// Failures are recorded in the outcome list. After a shutdown the running category and every
/// later one is recorded as [`CategoryOutcome::Cancelled`].
pub async fn dispatch_categories(
    config: &RunConfig,
    directory: &Path,
    modelrun: Option<ModelRun>,
    downloader: &dyn Downloader,
    shutdown: &Shutdown,
) -> Vec<(Category, CategoryOutcome)> {
    let mut outcomes = Vec::with_capacity(4);

    for category in Category::iter() {
        let outcome = if shutdown.is_cancelled() {
            CategoryOutcome::Cancelled
        } else {
            match category.invocation(config, directory, modelrun) {
                Some(invocation) => invoke_category(downloader, &invocation).await,
                None => {
                    debug!(%category, "no fields selected, skipping");
                    CategoryOutcome::Skipped
                }
            }
        };

        outcomes.push((category, outcome));
    }

    outcomes
}

async fn invoke_category(
    downloader: &dyn Downloader,
    invocation: &Invocation,
) -> CategoryOutcome {
    let category = invocation.category;
    info!(%category, "downloading");
    debug!(%category, args = ?invocation.args, "downloader arguments");

    let outcome = match downloader.execute(&invocation.args).await {
        Ok(exit) if exit.success() => CategoryOutcome::Succeeded,
        Ok(exit) => CategoryOutcome::Failed(FetchErr::Download {
            category,
            reason: exit.to_string(),
        }),
        Err(FetchErr::Cancelled) => CategoryOutcome::Cancelled,
        Err(err) => CategoryOutcome::Failed(FetchErr::Download {
            category,
            reason: err.to_string(),
        }),
    };

    match &outcome {
        CategoryOutcome::Failed(err) => warn!(%category, "{}", err),
        CategoryOutcome::Cancelled => warn!(%category, "cancelled"),
        _ => info!(%category, "done"),
    }

    outcome
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
