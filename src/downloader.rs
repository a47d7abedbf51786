//! The external downloader, and a way to stop it.

use std::{fmt, process::Stdio};

use async_trait::async_trait;
use tokio::{process::Command, sync::watch};
use tracing::{debug, warn};

use crate::errors::FetchErr;

/// How a downloader run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Exit {
    code: Option<i32>,
}

impl Exit {
    /// A run that ended with an exit code.
    pub fn from_code(code: i32) -> Self {
        Exit { code: Some(code) }
    }

    /// Exit code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for Exit {
    fn from(status: std::process::ExitStatus) -> Self {
        Exit {
            code: status.code(),
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => write!(f, "termination by signal"),
        }
    }
}

/// Output of a query-mode run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Captured {
    /// How the run ended.
    pub exit: Exit,
    /// Everything written to standard output.
    pub stdout: String,
}

/// Anything that can act as the downloader.
///
/// `Err` means the downloader could not be run at all, or was stopped by a shutdown. A run that
/// happened but failed is an `Ok` with an unsuccessful [`Exit`].
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Run with `args` and capture standard output.
    async fn query(&self, args: &[String]) -> Result<Captured, FetchErr>;

    /// Run with `args`, letting the downloader write to the terminal.
    async fn execute(&self, args: &[String]) -> Result<Exit, FetchErr>;
}

/// Runs the downloader as a child process.
#[derive(Clone, Debug)]
pub struct ProcessDownloader {
    program: String,
    leading_args: Vec<String>,
    shutdown: Shutdown,
}

impl ProcessDownloader {
    /// `command` is the program followed by any arguments that go before the per-run ones,
    /// e.g. `["python3", "opendata-downloader.py"]`.
    pub fn new(command: &[String], shutdown: Shutdown) -> Result<Self, FetchErr> {
        let (program, leading_args) = command
            .split_first()
            .ok_or_else(|| FetchErr::InvalidConfig("empty downloader command".to_owned()))?;

        Ok(ProcessDownloader {
            program: program.clone(),
            leading_args: leading_args.to_vec(),
            shutdown,
        })
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Downloader for ProcessDownloader {
    async fn query(&self, args: &[String]) -> Result<Captured, FetchErr> {
        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
        debug!("executing {:?}", cmd);

        let child = cmd.spawn()?;

        // Dropping the output future drops the child, which kills it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                Ok(Captured {
                    exit: Exit::from(output.status),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                })
            }
            _ = self.shutdown.cancelled() => {
                warn!("shutdown requested, stopping downloader query");
                Err(FetchErr::Cancelled)
            }
        }
    }

    async fn execute(&self, args: &[String]) -> Result<Exit, FetchErr> {
        let mut cmd = self.command(args);
        debug!("executing {:?}", cmd);

        let mut child = cmd.spawn()?;

        tokio::select! {
            status = child.wait() => Ok(Exit::from(status?)),
            _ = self.shutdown.cancelled() => {
                warn!("shutdown requested, killing downloader");
                child.kill().await?;
                Err(FetchErr::Cancelled)
            }
        }
    }
}

/// Cloneable handle that reports whether a shutdown was requested.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// The sending half of a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Create a connected trigger and handle.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Request a shutdown. Every handle sees it, including ones created later by cloning.
    pub fn trigger(&self) {
        // No receivers left means nobody is running anything.
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A handle that never fires.
    pub fn never() -> Self {
        let (_, shutdown) = shutdown_channel();
        shutdown
    }

    /// True once a shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when a shutdown is requested. Pending forever if the trigger is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/*--------------------------------------------------------------------------------------------------
                                        Test support
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
pub(crate) mod spy {
    use super::*;

    use std::sync::Mutex;

    /// Records every call and answers from a script.
    #[derive(Debug)]
    pub(crate) struct SpyDownloader {
        timestamp: String,
        query_exit: Exit,
        query_spawn_fails: bool,
        failing: Vec<(String, Exit)>,
        spawn_failing: Vec<String>,
        cancel_on: Option<(String, ShutdownTrigger)>,
        cancel_query: Option<ShutdownTrigger>,
        queries: Mutex<Vec<Vec<String>>>,
        executions: Mutex<Vec<Vec<String>>>,
    }

    impl SpyDownloader {
        pub(crate) fn new() -> Self {
            SpyDownloader {
                timestamp: "2020121212\n".to_owned(),
                query_exit: Exit::from_code(0),
                query_spawn_fails: false,
                failing: vec![],
                spawn_failing: vec![],
                cancel_on: None,
                cancel_query: None,
                queries: Mutex::new(vec![]),
                executions: Mutex::new(vec![]),
            }
        }

        pub(crate) fn with_timestamp(mut self, stdout: &str) -> Self {
            self.timestamp = stdout.to_owned();
            self
        }

        pub(crate) fn with_query_exit(mut self, exit: Exit) -> Self {
            self.query_exit = exit;
            self
        }

        pub(crate) fn with_query_spawn_failure(mut self) -> Self {
            self.query_spawn_fails = true;
            self
        }

        /// Executions whose arguments contain `flag` end with `exit`.
        pub(crate) fn failing_on(mut self, flag: &str, exit: Exit) -> Self {
            self.failing.push((flag.to_owned(), exit));
            self
        }

        /// Executions whose arguments contain `flag` cannot be started.
        pub(crate) fn spawn_failing_on(mut self, flag: &str) -> Self {
            self.spawn_failing.push(flag.to_owned());
            self
        }

        /// Executions whose arguments contain `flag` fire the trigger and report cancellation.
        pub(crate) fn cancelling_on(mut self, flag: &str, trigger: ShutdownTrigger) -> Self {
            self.cancel_on = Some((flag.to_owned(), trigger));
            self
        }

        /// The query fires the trigger and reports cancellation.
        pub(crate) fn cancelling_query(mut self, trigger: ShutdownTrigger) -> Self {
            self.cancel_query = Some(trigger);
            self
        }

        pub(crate) fn queries(&self) -> Vec<Vec<String>> {
            self.queries.lock().unwrap().clone()
        }

        pub(crate) fn executions(&self) -> Vec<Vec<String>> {
            self.executions.lock().unwrap().clone()
        }
    }

    fn has(args: &[String], flag: &str) -> bool {
        args.iter().any(|a| a == flag)
    }

    #[async_trait]
    impl Downloader for SpyDownloader {
        async fn query(&self, args: &[String]) -> Result<Captured, FetchErr> {
            self.queries.lock().unwrap().push(args.to_vec());

            if let Some(trigger) = &self.cancel_query {
                trigger.trigger();
                return Err(FetchErr::Cancelled);
            }

            if self.query_spawn_fails {
                return Err(FetchErr::IO(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such program",
                )));
            }

            Ok(Captured {
                exit: self.query_exit,
                stdout: self.timestamp.clone(),
            })
        }

        async fn execute(&self, args: &[String]) -> Result<Exit, FetchErr> {
            self.executions.lock().unwrap().push(args.to_vec());

            if let Some((flag, trigger)) = &self.cancel_on {
                if has(args, flag) {
                    trigger.trigger();
                    return Err(FetchErr::Cancelled);
                }
            }

            if self.spawn_failing.iter().any(|flag| has(args, flag)) {
                return Err(FetchErr::IO(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such program",
                )));
            }

            Ok(self
                .failing
                .iter()
                .find(|(flag, _)| has(args, flag))
                .map(|(_, exit)| *exit)
                .unwrap_or_else(|| Exit::from_code(0)))
        }
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
