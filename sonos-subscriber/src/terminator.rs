//! Process termination seam.
//!
//! Every fatal path in the crate ends in [`Terminator::terminate`]. In
//! production that is [`ProcessExit`], which exits with a non-zero status so
//! an external supervisor restarts the process.

use crate::error::FatalError;

/// Ends the process when a fatal condition is detected.
pub trait Terminator: Send + Sync {
    /// Called once per fatal trip. Production implementations do not return.
    fn terminate(&self, reason: &FatalError);
}

/// Terminates the process with [`std::process::exit`] and status 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl ProcessExit {
    pub fn new() -> Self {
        Self
    }
}

impl Terminator for ProcessExit {
    fn terminate(&self, reason: &FatalError) {
        tracing::debug!("exiting with status 1 ({:?})", reason);
        std::process::exit(1);
    }
}
