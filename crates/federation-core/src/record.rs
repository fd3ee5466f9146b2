use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::ids::TransactionId;
use crate::step::{StepDescriptor, StepOutcome, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Pending,
    Committed,
    Compensating,
    Compensated,
    /// Compensation exhausted its retries; needs an operator.
    Failed,
}

impl TransactionState {
    /// States a crashed coordinator must pick back up on restart.
    #[must_use]
    pub fn is_incomplete(self) -> bool {
        matches!(self, Self::Pending | Self::Compensating)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_incomplete()
    }

    /// Records in these states are never written again.
    #[must_use]
    pub fn is_sealed(self) -> bool {
        matches!(self, Self::Committed | Self::Compensated)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Committed => "COMMITTED",
            Self::Compensating => "COMPENSATING",
            Self::Compensated => "COMPENSATED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMMITTED" => Ok(Self::Committed),
            "COMPENSATING" => Ok(Self::Compensating),
            "COMPENSATED" => Ok(Self::Compensated),
            "FAILED" => Ok(Self::Failed),
            _ => Err(CoreError::UnknownState(s.to_string())),
        }
    }
}

/// Durable record of one saga.
///
/// `steps` holds one outcome per descriptor, in declaration order. The
/// descriptors themselves are persisted so that a restarted coordinator can
/// re-drive the remaining actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub state: TransactionState,
    pub descriptors: Vec<StepDescriptor>,
    pub steps: Vec<StepOutcome>,
    /// Step whose forward action was started but has no recorded outcome.
    #[serde(default)]
    pub in_flight: Option<usize>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    #[must_use]
    pub fn new(transaction_id: TransactionId, descriptors: Vec<StepDescriptor>) -> Self {
        let now = Utc::now();
        let steps = descriptors
            .iter()
            .map(|d| StepOutcome::not_attempted(d.step_index))
            .collect();
        Self {
            transaction_id,
            state: TransactionState::Pending,
            descriptors,
            steps,
            in_flight: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The step that ended the forward phase, if any: either a failed forward
    /// action or a step refused before it ran.
    #[must_use]
    pub fn forward_failure(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| {
            s.status == StepStatus::Failed
                || (s.status == StepStatus::NotAttempted && s.error.is_some())
        })
    }

    /// Index of the next forward action to run, or `None` when the forward
    /// phase has finished (every step succeeded, or one failed).
    #[must_use]
    pub fn next_forward_step(&self) -> Option<usize> {
        if self.forward_failure().is_some() {
            return None;
        }
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::NotAttempted)
            .map(|s| s.step_index)
    }

    /// Indices of succeeded, not yet compensated steps, latest first.
    #[must_use]
    pub fn pending_compensations(&self) -> Vec<usize> {
        self.steps
            .iter()
            .rev()
            .filter(|s| s.needs_compensation())
            .map(|s| s.step_index)
            .collect()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Succeeded)
    }

    /// Merges every succeeded step's payload under its response key.
    #[must_use]
    pub fn merged_payload(&self) -> Value {
        let mut merged = Map::new();
        for (descriptor, outcome) in self.descriptors.iter().zip(&self.steps) {
            if let Some(payload) = &outcome.result_payload {
                merged.insert(descriptor.response_key.clone(), payload.clone());
            }
        }
        Value::Object(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::ids::{EntityKey, StoreRef};
    use crate::step::{Action, ActionKind};

    fn descriptors(n: usize) -> Vec<StepDescriptor> {
        (0..n)
            .map(|i| StepDescriptor {
                step_index: i,
                target_store: StoreRef::local(format!("store{i}")),
                response_key: format!("op{i}"),
                forward_action: Action::new(ActionKind::Create, "create", "Thing", json!({})),
                compensating_action: Some(Action::new(
                    ActionKind::Delete,
                    "delete",
                    "Thing",
                    json!({}),
                )),
                entity_keys: BTreeSet::from([EntityKey::new("Thing", i.to_string())]),
            })
            .collect()
    }

    #[test]
    fn new_record_is_pending_with_nothing_attempted() {
        let record = TransactionRecord::new(TransactionId::new(), descriptors(3));

        assert_eq!(record.state, TransactionState::Pending);
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.next_forward_step(), Some(0));
        assert!(record.pending_compensations().is_empty());
    }

    #[test]
    fn next_forward_step_skips_succeeded_steps() {
        let mut record = TransactionRecord::new(TransactionId::new(), descriptors(3));
        record.steps[0] = StepOutcome::succeeded(0, json!(1));
        record.steps[1] = StepOutcome::succeeded(1, json!(2));

        assert_eq!(record.next_forward_step(), Some(2));
    }

    #[test]
    fn forward_phase_ends_on_failure() {
        let mut record = TransactionRecord::new(TransactionId::new(), descriptors(3));
        record.steps[0] = StepOutcome::succeeded(0, json!(1));
        record.steps[1] = StepOutcome::failed(1, "boom");

        assert_eq!(record.next_forward_step(), None);
        assert_eq!(record.forward_failure().map(|s| s.step_index), Some(1));
    }

    #[test]
    fn refused_step_ends_forward_phase() {
        let mut record = TransactionRecord::new(TransactionId::new(), descriptors(2));
        record.steps[0] = StepOutcome::succeeded(0, json!(1));
        record.steps[1] = StepOutcome::refused(1, "unreachable");

        assert_eq!(record.next_forward_step(), None);
        assert_eq!(record.pending_compensations(), vec![0]);
    }

    #[test]
    fn pending_compensations_are_latest_first() {
        let mut record = TransactionRecord::new(TransactionId::new(), descriptors(4));
        record.steps[0] = StepOutcome::succeeded(0, json!(1));
        record.steps[1] = StepOutcome::succeeded(1, json!(2));
        record.steps[2] = StepOutcome::succeeded(2, json!(3));
        record.steps[2].compensated = true;
        record.steps[3] = StepOutcome::failed(3, "boom");

        assert_eq!(record.pending_compensations(), vec![1, 0]);
    }

    #[test]
    fn merged_payload_uses_response_keys() {
        let mut record = TransactionRecord::new(TransactionId::new(), descriptors(2));
        record.steps[0] = StepOutcome::succeeded(0, json!({"id": "a"}));
        record.steps[1] = StepOutcome::succeeded(1, json!({"id": "b"}));

        assert_eq!(
            record.merged_payload(),
            json!({"op0": {"id": "a"}, "op1": {"id": "b"}})
        );
    }

    #[test]
    fn state_classification() {
        assert!(TransactionState::Pending.is_incomplete());
        assert!(TransactionState::Compensating.is_incomplete());
        assert!(TransactionState::Failed.is_terminal());
        assert!(!TransactionState::Failed.is_sealed());
        assert!(TransactionState::Committed.is_sealed());
        assert!(TransactionState::Compensated.is_sealed());
    }

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!(
            "compensating".parse::<TransactionState>(),
            Ok(TransactionState::Compensating)
        );
        assert!("bogus".parse::<TransactionState>().is_err());
    }
}
