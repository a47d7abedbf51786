//! GRIB downloader driver.
//!
//! Resolves the latest model run, creates `<root>/<timestamp>` and starts the downloader once for
//! each field category that has something selected.

use std::process::exit;

use anyhow::{Context, Error};
use opendata_fetch::{
    exit_code, resolve_latest_timestamp, shutdown_channel, CategoryOutcome, CommonCmdLineArgs,
    FetchErr, ProcessDownloader, EXIT_FATAL, EXIT_SUCCESS,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(ref e) => {
            error!("error: {}", e);
            for cause in e.chain().skip(1) {
                error!("caused by: {}", cause);
            }

            e.downcast_ref::<FetchErr>()
                .map_or(EXIT_FATAL, FetchErr::exit_code)
        }
    };

    exit(code);
}

async fn run() -> Result<i32, Error> {
    let app = CommonCmdLineArgs::new_app(
        "gribdn",
        "Download the latest run of a weather model with an open-data GRIB downloader.",
    );
    let matches = app.get_matches();

    init_logging(matches.is_present("verbose"));

    let args = CommonCmdLineArgs::from_matches(&matches).context("invalid configuration")?;
    let config = args.config();
    if let Some(profile) = args.profile() {
        info!(profile = %profile.display(), "settings loaded from profile");
    }

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("interrupted, stopping");
        trigger.trigger();
    });

    let downloader = ProcessDownloader::new(config.downloader(), shutdown.clone())?;

    if args.latest_only() {
        let timestamp = resolve_latest_timestamp(&downloader, config).await?;
        println!("{}", timestamp);
        return Ok(EXIT_SUCCESS);
    }

    let result = opendata_fetch::run(config, &downloader, &shutdown).await;

    match &result {
        Ok(summary) => {
            for (category, outcome) in summary.outcomes() {
                match outcome {
                    CategoryOutcome::Succeeded => info!("{:>15}: ok", category),
                    CategoryOutcome::Failed(err) => error!("{:>15}: {}", category, err),
                    CategoryOutcome::Skipped => info!("{:>15}: skipped", category),
                    CategoryOutcome::Cancelled => warn!("{:>15}: cancelled", category),
                }
            }
            if summary.is_success() {
                info!(directory = %summary.directory().display(), "all downloads finished");
            }
        }
        Err(err) => error!("run stopped: {}", err),
    }

    Ok(exit_code(&result))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr, stdout is reserved for --latest-only.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("unable to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("unable to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
