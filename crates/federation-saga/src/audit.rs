use std::time::Instant;

use federation_core::StepDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    Executed,
    Failed,
    /// Not attempted because its store was unreachable.
    Refused,
    Compensated,
    /// Left for recovery because its store was unreachable.
    CompensationBlocked,
    CompensationFailed,
}

/// What happened to one step during a single executor run.
#[derive(Debug)]
pub struct StepRecord {
    pub step_index: usize,
    /// `"kind:name"` of the target store.
    pub store: String,
    pub operation: String,
    pub status: StepStatus,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
    pub compensation_description: Option<String>,
    pub compensation_attempts: u32,
}

/// In-process trace of one executor run, for callers and tests.
///
/// Unlike the transaction log this is neither durable nor complete across
/// restarts: a resumed run only sees what it did itself.
#[derive(Debug, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
    compensated: Vec<usize>,
}

impl SagaAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, step: &StepDescriptor) -> &mut StepRecord {
        let position = self
            .records
            .iter()
            .position(|r| r.step_index == step.step_index);
        match position {
            Some(i) => &mut self.records[i],
            None => {
                self.records.push(StepRecord {
                    step_index: step.step_index,
                    store: step.target_store.to_string(),
                    operation: step.forward_action.operation.clone(),
                    status: StepStatus::Executed,
                    started_at: Instant::now(),
                    completed_at: None,
                    compensation_description: step
                        .compensating_action
                        .as_ref()
                        .map(|a| a.operation.clone()),
                    compensation_attempts: 0,
                });
                let last = self.records.len() - 1;
                &mut self.records[last]
            }
        }
    }

    fn finish(&mut self, step: &StepDescriptor, status: StepStatus) -> &mut StepRecord {
        let record = self.entry(step);
        record.status = status;
        record.completed_at = Some(Instant::now());
        record
    }

    pub(crate) fn record_start(&mut self, step: &StepDescriptor) {
        self.entry(step);
    }

    pub(crate) fn record_success(&mut self, step: &StepDescriptor) {
        self.finish(step, StepStatus::Executed);
    }

    pub(crate) fn record_failure(&mut self, step: &StepDescriptor) {
        self.finish(step, StepStatus::Failed);
    }

    pub(crate) fn record_refused(&mut self, step: &StepDescriptor) {
        self.finish(step, StepStatus::Refused);
    }

    pub(crate) fn record_compensated(&mut self, step: &StepDescriptor, attempts: u32) {
        self.finish(step, StepStatus::Compensated).compensation_attempts = attempts;
        self.compensated.push(step.step_index);
    }

    pub(crate) fn record_compensation_blocked(&mut self, step: &StepDescriptor, attempts: u32) {
        self.finish(step, StepStatus::CompensationBlocked)
            .compensation_attempts = attempts;
    }

    pub(crate) fn record_compensation_failed(&mut self, step: &StepDescriptor, attempts: u32) {
        self.finish(step, StepStatus::CompensationFailed)
            .compensation_attempts = attempts;
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Step indices in the order they were compensated.
    #[must_use]
    pub fn compensation_order(&self) -> &[usize] {
        &self.compensated
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StepStatus::Executed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Refused => "⊘",
                StepStatus::Compensated => "↩",
                StepStatus::CompensationBlocked => "⏸",
                StepStatus::CompensationFailed => "⚠",
            };
            lines.push(format!(
                "{status} {} {} ({})",
                record.step_index, record.operation, record.store
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use federation_core::{Action, ActionKind, EntityKey, StoreRef};
    use serde_json::json;

    use super::*;

    fn step(index: usize) -> StepDescriptor {
        StepDescriptor {
            step_index: index,
            target_store: StoreRef::local("orders"),
            response_key: format!("op{index}"),
            forward_action: Action::new(ActionKind::Create, "createOrder", "Order", json!({})),
            compensating_action: Some(Action::new(
                ActionKind::Delete,
                "deleteOrder",
                "Order",
                json!({}),
            )),
            entity_keys: BTreeSet::from([EntityKey::new("Order", index.to_string())]),
        }
    }

    #[test]
    fn new_audit_log_is_empty() {
        assert!(SagaAuditLog::new().records().is_empty());
    }

    #[test]
    fn start_then_success_completes_one_record() {
        let mut log = SagaAuditLog::new();
        log.record_start(&step(0));
        log.record_success(&step(0));

        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].status, StepStatus::Executed);
        assert!(log.records()[0].completed_at.is_some());
        assert_eq!(
            log.records()[0].compensation_description.as_deref(),
            Some("deleteOrder")
        );
    }

    #[test]
    fn compensation_updates_matching_step_only() {
        let mut log = SagaAuditLog::new();
        log.record_start(&step(0));
        log.record_success(&step(0));
        log.record_start(&step(1));
        log.record_failure(&step(1));
        log.record_compensated(&step(0), 1);

        assert_eq!(log.records()[0].status, StepStatus::Compensated);
        assert_eq!(log.records()[0].compensation_attempts, 1);
        assert_eq!(log.records()[1].status, StepStatus::Failed);
    }

    #[test]
    fn summary_marks_each_outcome() {
        let mut log = SagaAuditLog::new();
        log.record_start(&step(0));
        log.record_success(&step(0));
        log.record_compensation_failed(&step(0), 3);
        log.record_start(&step(1));
        log.record_refused(&step(1));
        log.record_start(&step(2));
        log.record_compensation_blocked(&step(2), 0);

        let summary = log.summary();

        assert!(summary.contains("⚠ 0 createOrder (local:orders)"));
        assert!(summary.contains("⊘ 1 createOrder"));
        assert!(summary.contains("⏸ 2 createOrder"));
    }
}
