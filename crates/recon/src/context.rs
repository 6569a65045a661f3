//! Per-run plumbing handed to every service: where progress lines go and
//! whether the operator asked to stop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
enum CancelSource {
    #[default]
    Disabled,
    Fixed(bool),
    Shared(Arc<AtomicBool>),
}

/// Cooperative cancellation, polled by services at checkpoints.
///
/// A token from a plain boolean never changes; a token from a shared flag
/// sees `cancel()` calls made through any clone of it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancelSource);

impl CancelToken {
    /// A token that never cancels.
    pub fn disabled() -> Self {
        Self(CancelSource::Disabled)
    }

    /// A fresh shared token, not yet cancelled.
    pub fn new() -> Self {
        Self::shared(Arc::new(AtomicBool::new(false)))
    }

    pub fn shared(flag: Arc<AtomicBool>) -> Self {
        Self(CancelSource::Shared(flag))
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.0 {
            CancelSource::Disabled => false,
            CancelSource::Fixed(flag) => *flag,
            CancelSource::Shared(flag) => flag.load(Ordering::SeqCst),
        }
    }

    /// Request cancellation. Only shared tokens can change state.
    pub fn cancel(&self) {
        if let CancelSource::Shared(flag) = &self.0 {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self, task: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled(format!("{task} cancelled by operator")))
        } else {
            Ok(())
        }
    }
}

impl From<bool> for CancelToken {
    fn from(flag: bool) -> Self {
        Self(CancelSource::Fixed(flag))
    }
}

impl From<Arc<AtomicBool>> for CancelToken {
    fn from(flag: Arc<AtomicBool>) -> Self {
        Self::shared(flag)
    }
}

// ---------------------------------------------------------------------------
// Progress lines
// ---------------------------------------------------------------------------

type LineFn = dyn Fn(&str) + Send + Sync;

/// Destination for operator-facing progress lines. Without a callback, lines
/// go to `log::info!`.
#[derive(Clone, Default)]
pub struct LogSink(Option<Arc<LineFn>>);

impl LogSink {
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(f)))
    }

    pub fn line(&self, message: &str) {
        match &self.0 {
            Some(f) => f(message),
            None => log::info!("{}", message),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "LogSink(callback)" } else { "LogSink(log)" })
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub log: LogSink,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(log: LogSink, cancel: CancelToken) -> Self {
        Self { log, cancel }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.log.line(message.as_ref());
    }

    pub fn check(&self, task: &str) -> Result<()> {
        self.cancel.check(task)
    }
}
