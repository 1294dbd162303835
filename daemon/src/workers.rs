//! Fire-and-forget execution of module actions off the hook thread.
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Where slow module work runs.
#[derive(Debug, Clone)]
pub enum Worker {
    /// Blocking pool of the daemon's tokio runtime.  Nothing is joined.
    Runtime(tokio::runtime::Handle),
    /// Runs the job on the caller's thread.  Used by tests.
    #[cfg_attr(not(test), allow(dead_code))]
    Inline,
}

impl Worker {
    /// Runs `job` without waiting for it.  Errors are logged at `warn` and panics at
    /// `error`; neither reaches the caller.
    pub fn spawn<F>(&self, module: &'static str, job: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        match self {
            Worker::Runtime(handle) => {
                handle.spawn_blocking(move || run(module, job));
            }
            Worker::Inline => run(module, job),
        }
    }
}

fn run<F>(module: &'static str, job: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(module, "action failed: {e:#}"),
        Err(_) => tracing::error!(module, "action panicked"),
    }
}
