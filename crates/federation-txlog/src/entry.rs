use chrono::{DateTime, Utc};
use federation_core::{StepOutcome, TransactionRecord, TransactionState};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// One durable change to a transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// A forward action is about to be invoked. Until the matching
    /// [`LogEntry::StepRecorded`] lands, the step's effect is in doubt.
    StepStarted { step_index: usize },

    StepRecorded { outcome: StepOutcome },

    CompensationRecorded { step_index: usize, attempts: u32 },

    /// The step's store was unreachable; compensation will be retried later.
    CompensationBlocked { step_index: usize, reason: String },

    CompensationExhausted {
        step_index: usize,
        attempts: u32,
        error: String,
    },

    StateChanged {
        state: TransactionState,
        #[serde(default)]
        error: Option<String>,
    },
}

impl LogEntry {
    #[must_use]
    pub fn state(state: TransactionState) -> Self {
        Self::StateChanged { state, error: None }
    }

    fn step_index(&self) -> Option<usize> {
        match self {
            Self::StepStarted { step_index }
            | Self::CompensationRecorded { step_index, .. }
            | Self::CompensationBlocked { step_index, .. }
            | Self::CompensationExhausted { step_index, .. } => Some(*step_index),
            Self::StepRecorded { outcome } => Some(outcome.step_index),
            Self::StateChanged { .. } => None,
        }
    }

    /// Folds this entry into `record`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Terminal`] when `record` is COMMITTED or
    /// COMPENSATED, or [`LogError::StepOutOfRange`] for an unknown step.
    /// `record` is untouched on error.
    pub fn apply(&self, record: &mut TransactionRecord, at: DateTime<Utc>) -> Result<()> {
        if record.state.is_sealed() {
            return Err(LogError::Terminal {
                transaction_id: record.transaction_id,
                state: record.state,
            });
        }
        if let Some(step_index) = self.step_index() {
            if step_index >= record.steps.len() {
                return Err(LogError::StepOutOfRange {
                    transaction_id: record.transaction_id,
                    step_index,
                });
            }
        }

        match self {
            Self::StepStarted { step_index } => {
                record.in_flight = Some(*step_index);
            }
            Self::StepRecorded { outcome } => {
                if record.in_flight == Some(outcome.step_index) {
                    record.in_flight = None;
                }
                if let Some(error) = &outcome.error {
                    record.last_error = Some(error.clone());
                }
                record.steps[outcome.step_index] = outcome.clone();
            }
            Self::CompensationRecorded {
                step_index,
                attempts,
            } => {
                let step = &mut record.steps[*step_index];
                step.compensated = true;
                step.compensation_attempts = *attempts;
            }
            Self::CompensationBlocked { reason, .. } => {
                record.last_error = Some(reason.clone());
            }
            Self::CompensationExhausted {
                step_index,
                attempts,
                error,
            } => {
                record.steps[*step_index].compensation_attempts = *attempts;
                record.last_error = Some(error.clone());
            }
            Self::StateChanged { state, error } => {
                record.state = *state;
                if let Some(error) = error {
                    record.last_error = Some(error.clone());
                }
            }
        }

        record.updated_at = at;
        Ok(())
    }
}
