use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::ids::{EntityKey, StoreRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Read,
    /// Restores a pre-image captured by an earlier update.
    Revert,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::Revert => "revert",
        };
        write!(f, "{s}")
    }
}

/// A single operation against one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Name of the operation on the target store, e.g. `createOrder`.
    pub operation: String,
    pub entity_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    #[must_use]
    pub fn new(
        kind: ActionKind,
        operation: impl Into<String>,
        entity_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            entity_type: entity_type.into(),
            payload,
        }
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        self.kind == ActionKind::Read
    }
}

/// One atomic step of a federated mutation, bound to exactly one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub step_index: usize,
    pub target_store: StoreRef,
    /// Key under which the step's result is merged into the response.
    pub response_key: String,
    pub forward_action: Action,
    pub compensating_action: Option<Action>,
    pub entity_keys: BTreeSet<EntityKey>,
}

impl StepDescriptor {
    /// Checks the per-step invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-read step lacks a compensating action or the
    /// step touches no entity.
    pub fn validate(&self) -> Result<()> {
        if self.compensating_action.is_none() && !self.forward_action.is_read() {
            return Err(CoreError::MissingCompensation {
                step_index: self.step_index,
                operation: self.forward_action.operation.clone(),
            });
        }
        if self.entity_keys.is_empty() {
            return Err(CoreError::NoEntityKeys {
                step_index: self.step_index,
            });
        }
        Ok(())
    }

    /// Validates an ordered step list: it must be non-empty, indices must run
    /// `0..n` in order and every step must be individually valid.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate_sequence(steps: &[Self]) -> Result<()> {
        if steps.is_empty() {
            return Err(CoreError::NoSteps);
        }
        for (expected, step) in steps.iter().enumerate() {
            if step.step_index != expected {
                return Err(CoreError::StepOrder {
                    expected,
                    found: step.step_index,
                });
            }
            step.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Succeeded,
    Failed,
    NotAttempted,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::NotAttempted => "NOT_ATTEMPTED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_index: usize,
    pub status: StepStatus,
    #[serde(default)]
    pub result_payload: Option<Value>,
    #[serde(default)]
    pub compensated: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub compensation_attempts: u32,
}

impl StepOutcome {
    #[must_use]
    pub fn not_attempted(step_index: usize) -> Self {
        Self {
            step_index,
            status: StepStatus::NotAttempted,
            result_payload: None,
            compensated: false,
            error: None,
            compensation_attempts: 0,
        }
    }

    #[must_use]
    pub fn succeeded(step_index: usize, payload: Value) -> Self {
        Self {
            status: StepStatus::Succeeded,
            result_payload: Some(payload),
            ..Self::not_attempted(step_index)
        }
    }

    #[must_use]
    pub fn failed(step_index: usize, error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            error: Some(error.into()),
            ..Self::not_attempted(step_index)
        }
    }

    /// A step that was refused before its forward action ran.
    #[must_use]
    pub fn refused(step_index: usize, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::not_attempted(step_index)
        }
    }

    /// Whether this step's effects still need undoing.
    #[must_use]
    pub fn needs_compensation(&self) -> bool {
        self.status == StepStatus::Succeeded && !self.compensated
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn step(index: usize, kind: ActionKind, compensation: Option<Action>) -> StepDescriptor {
        StepDescriptor {
            step_index: index,
            target_store: StoreRef::local("orders"),
            response_key: format!("step{index}"),
            forward_action: Action::new(kind, "op", "Order", json!({})),
            compensating_action: compensation,
            entity_keys: BTreeSet::from([EntityKey::new("Order", "1")]),
        }
    }

    #[test]
    fn read_step_may_omit_compensation() {
        let read = step(0, ActionKind::Read, None);

        assert!(read.validate().is_ok());
    }

    #[test]
    fn write_step_requires_compensation() {
        let write = step(0, ActionKind::Update, None);

        let err = write.validate().expect_err("should fail");

        assert!(matches!(err, CoreError::MissingCompensation { step_index: 0, .. }));
    }

    #[test]
    fn step_without_entities_is_rejected() {
        let mut read = step(0, ActionKind::Read, None);
        read.entity_keys.clear();

        assert_eq!(
            read.validate(),
            Err(CoreError::NoEntityKeys { step_index: 0 })
        );
    }

    #[test]
    fn sequence_must_be_contiguous() {
        let undo = Action::new(ActionKind::Delete, "deleteOrder", "Order", json!({}));
        let steps = vec![
            step(0, ActionKind::Create, Some(undo.clone())),
            step(2, ActionKind::Create, Some(undo)),
        ];

        assert_eq!(
            StepDescriptor::validate_sequence(&steps),
            Err(CoreError::StepOrder {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert_eq!(StepDescriptor::validate_sequence(&[]), Err(CoreError::NoSteps));
    }

    #[test]
    fn only_uncompensated_successes_need_compensation() {
        let mut outcome = StepOutcome::succeeded(0, json!({"id": 1}));
        assert!(outcome.needs_compensation());

        outcome.compensated = true;
        assert!(!outcome.needs_compensation());

        assert!(!StepOutcome::failed(1, "boom").needs_compensation());
        assert!(!StepOutcome::not_attempted(2).needs_compensation());
    }

    #[test]
    fn step_status_serializes_in_screaming_case() {
        let json = serde_json::to_string(&StepStatus::NotAttempted).expect("serialize");

        assert_eq!(json, "\"NOT_ATTEMPTED\"");
    }
}
