//! Unit-test doubles shared across modules.

use std::sync::{Arc, Mutex};

use crate::error::FatalError;
use crate::terminator::Terminator;

/// Records fatal trips instead of exiting.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingTerminator {
    reasons: Arc<Mutex<Vec<FatalError>>>,
}

impl RecordingTerminator {
    pub(crate) fn reasons(&self) -> Vec<FatalError> {
        self.reasons.lock().unwrap().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, reason: &FatalError) {
        self.reasons.lock().unwrap().push(reason.clone());
    }
}
