//! Graceful-shutdown runner for the pipeline's long-lived processes.
//!
//! Consumers, bridges and demo producers all run as independent loops that
//! watch a shared `CancellationToken`. The runner owns that token: it spawns
//! every process, cancels the token on SIGTERM/SIGINT or on the first
//! process error, waits for the rest to wind down, then executes closers
//! under a timeout. The caller decides what to do with the outcome.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process driven by the shared cancellation token.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// A cleanup function executed after every process has stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Final result of a run, mapped to an exit code by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every process stopped cleanly (shutdown signal or natural end).
    Completed,
    /// At least one process returned an error or panicked.
    Failed,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Failed => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add a process. All processes run concurrently; the first error
    /// cancels the rest.
    pub fn with_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes.push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Add an already-boxed process, as produced by worker assemblies.
    pub fn with_boxed_process(mut self, process: AppProcess) -> Self {
        self.processes.push(process);
        self
    }

    /// Add a closer. Closers run concurrently after shutdown, even when a
    /// process failed; a closer error is logged, never escalated.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned cancellation token, for callers that want to
    /// trigger shutdown themselves.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run every process until completion or shutdown, then run closers.
    pub async fn run(self) -> RunOutcome {
        let token = self.cancellation_token;
        spawn_signal_watcher(token.clone());

        let mut join_set = JoinSet::new();
        for process in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { process(process_token).await });
        }

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    debug!("Process completed");
                }
                Ok(Err(err)) => {
                    if !token.is_cancelled() {
                        error!("Process error: {:#}", err);
                        failed = true;
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!("Process panicked: {}", err);
                    failed = true;
                    token.cancel();
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        if failed {
            RunOutcome::Failed
        } else {
            RunOutcome::Completed
        }
    }
}

fn spawn_signal_watcher(token: CancellationToken) {
    tokio::spawn({
        let token = token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    token.cancel();
                }
                Err(err) => {
                    error!("Error setting up signal handler: {}", err);
                }
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!("Running closers with timeout of {:?}", timeout);
    let all = async {
        let mut closer_set = JoinSet::new();
        for closer in closers {
            closer_set.spawn(closer());
        }
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("Closer completed"),
                Ok(Err(err)) => error!("Closer error: {:#}", err),
                Err(err) => error!("Closer panicked: {}", err),
            }
        }
    };

    if tokio::time::timeout(timeout, all).await.is_err() {
        error!("Closers timed out after {:?}", timeout);
    } else {
        info!("All closers completed");
    }
}
