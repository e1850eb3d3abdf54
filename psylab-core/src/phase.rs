use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle of one experiment instance
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExperimentState {
    #[default]
    Created,
    Configured,
    Presenting,
    Looping,
    Finished,
    Aborted,
}

impl ExperimentState {
    /// Forward transition taken by a normal run
    pub fn next(&self) -> Option<Self> {
        use ExperimentState::*;
        Some(match self {
            Created => Configured,
            Configured => Presenting,
            Presenting => Looping,
            Looping => Finished,
            Finished | Aborted => return None,
        })
    }

    pub fn can_transition(&self, to: ExperimentState) -> bool {
        match to {
            // setup failures can abort from anywhere that is still live
            ExperimentState::Aborted => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }

    pub fn transition(&mut self, to: ExperimentState) -> Result<(), CoreError> {
        if !self.can_transition(to) {
            return Err(CoreError::InvalidTransition { from: *self, to });
        }
        tracing::debug!(from = ?self, to = ?to, "experiment state transition");
        *self = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Presenting | Self::Looping)
    }
}
