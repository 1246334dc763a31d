//! Cancellable background jobs
//!
//! A job is one unit of blocking work (indexing a corpus, mapping a
//! highlight) run on a tokio blocking thread so the caller's control loop
//! never waits on it. The work receives a `CancellationToken` and polls it at
//! its own loop boundaries; the caller holds a [`JobHandle`] to poll, cancel
//! or collect the outcome.
//!
//! Outcome rules:
//! - work that observed the token returns `Cancelled`, and nothing partial
//!   escapes;
//! - a panicked or aborted task is reported as `Cancelled`;
//! - work that finished before its next poll reports its result, even if a
//!   cancel arrived in between.

use crate::interface::{NgramError, NgramResult};
use once_cell::sync::Lazy;
use std::sync::Once;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fallback Tokio runtime for callers outside any runtime context.
/// Shared by every session and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sinogram-jobs")
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Initialize the global Rayon pool once, with lowered worker priority so
/// the caller's threads stay responsive while a scan runs.
/// `worker_threads == 0` means all cores minus two, at least one.
pub(crate) fn init_rayon(worker_threads: usize) {
    RAYON_INIT.call_once(|| {
        let num_threads = if worker_threads > 0 {
            worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .saturating_sub(2)
                .max(1)
        };

        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("sinogram-rayon-{}", i))
            .start_handler(|_| {
                use thread_priority::*;
                let _ = set_current_thread_priority(ThreadPriority::Min);
            })
            .build_global();

        // Someone else (a test harness, the host app) configured it first
        if built.is_err() {
            tracing::debug!("global rayon pool already initialized");
        }
    });
}

/// Current runtime if there is one, otherwise the global fallback
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// RAII guard that cancels a token when dropped.
/// Dropping an in-flight async request drops this guard, which stops the job.
pub(crate) struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Handle to a submitted job
#[derive(Debug)]
pub struct JobHandle<T> {
    token: CancellationToken,
    task: JoinHandle<NgramResult<T>>,
}

impl<T: Send + 'static> JobHandle<T> {
    /// Request cooperative cancellation. Returns immediately.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the work has returned (completed, cancelled or failed)
    pub fn is_done(&self) -> bool {
        self.task.is_finished()
    }

    /// A clone of the job's token. Cancelling the clone cancels the job.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn join(self) -> NgramResult<T> {
        match self.task.await {
            Ok(result) => result,
            // JoinError means the task panicked or was aborted
            Err(_join_error) => Err(NgramError::Cancelled),
        }
    }

    /// Block the current thread until the job returns.
    pub fn wait(self) -> NgramResult<T> {
        futures::executor::block_on(self.join())
    }
}

/// Run `work` on a blocking thread.
pub fn submit<T, F>(work: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> NgramResult<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let worker_token = token.clone();
    let task = runtime_handle().spawn_blocking(move || {
        let result = work(&worker_token);
        if matches!(result, Err(NgramError::Cancelled)) {
            tracing::debug!("job cancelled");
        }
        result
    });
    JobHandle { token, task }
}
