//! Model run identifiers and the latest-timestamp query.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::{config::RunConfig, downloader::Downloader, errors::FetchErr};

/// An explicit model run, written `YYYYMMDDHH` on the command line and by the downloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelRun(NaiveDateTime);

impl ModelRun {
    const FORMAT: &'static str = "%Y%m%d%H";

    /// Parse a `YYYYMMDDHH` string.
    pub fn parse(run: &str) -> Result<Self, FetchErr> {
        let run = run.trim();
        if run.len() != 10 || !run.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FetchErr::InvalidModelRun(run.to_owned()));
        }

        // chrono wants minutes before it will build a time.
        NaiveDateTime::parse_from_str(&format!("{}00", run), "%Y%m%d%H%M")
            .map(ModelRun)
            .map_err(|_| FetchErr::InvalidModelRun(run.to_owned()))
    }
}

impl fmt::Display for ModelRun {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

/// Arguments for the downloader's query mode.
pub fn query_args(config: &RunConfig) -> Vec<String> {
    let mut args = vec![
        "--get-latest-timestamp".to_owned(),
        "--model".to_owned(),
        config.model().as_str().to_owned(),
    ];

    if let Some(run) = config.modelrun() {
        args.push("--modelrun".to_owned());
        args.push(run.to_string());
    }

    args
}

/// Ask the downloader for the most recent model run.
///
/// The returned token is used verbatim as the name of the output directory, so anything that
/// is not exactly one plain path segment is rejected.
pub async fn resolve_latest_timestamp(
    downloader: &dyn Downloader,
    config: &RunConfig,
) -> Result<String, FetchErr> {
    let args = query_args(config);
    debug!(?args, "querying latest model run");

    let captured = downloader.query(&args).await.map_err(|err| match err {
        FetchErr::Cancelled => FetchErr::Cancelled,
        err => FetchErr::Resolution(format!("unable to run downloader: {}", err)),
    })?;

    if !captured.exit.success() {
        return Err(FetchErr::Resolution(format!(
            "downloader query failed with {}",
            captured.exit
        )));
    }

    let timestamp = parse_timestamp_token(&captured.stdout)?;
    info!(model = %config.model(), %timestamp, "resolved latest model run");

    Ok(timestamp)
}

/// Validate the query output, a single token that can serve as a directory name.
pub fn parse_timestamp_token(stdout: &str) -> Result<String, FetchErr> {
    let mut tokens = stdout.split_whitespace();

    let token = tokens
        .next()
        .ok_or_else(|| FetchErr::Resolution("downloader printed no timestamp".to_owned()))?;

    if tokens.next().is_some() {
        return Err(FetchErr::Resolution(format!(
            "expected a single timestamp, got {:?}",
            stdout.trim()
        )));
    }

    if token == "." || token == ".." || token.contains('/') || token.contains('\\') {
        return Err(FetchErr::Resolution(format!(
            "timestamp {:?} is not a valid directory name",
            token
        )));
    }

    if ModelRun::parse(token).is_err() {
        debug!(token, "timestamp is not YYYYMMDDHH, using it verbatim");
    }

    Ok(token.to_owned())
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
