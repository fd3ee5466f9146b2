//! In-memory stores with fault injection, for exercising the executor.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use federation_core::{Action, ActionKind, EntityKey, StepDescriptor, StoreRef};
pub use federation_partition::testing::ToggleProbe;
pub use federation_txlog::testing::FlakyLog;
use serde_json::{Value, json};

use crate::adapter::{ActionError, CompensatingExecutable, ForwardExecutable, StepContext};
use crate::alert::{AlertSink, CompensationAlert};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Forward,
    Compensate,
}

/// One call the executor made into the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub phase: Phase,
    pub store: String,
    pub operation: String,
    pub step_index: usize,
    pub attempt: u32,
    pub idempotency_key: String,
}

#[derive(Debug, Default)]
struct Faults {
    fail_forward: HashSet<String>,
    /// Remaining injected compensation failures per store.
    fail_compensation: HashMap<String, u32>,
    forward_delay: HashMap<String, Duration>,
}

/// Adapter backed by a map of applied effects, keyed by idempotency key.
///
/// Re-invoking a forward action with a key that is already applied returns
/// the earlier result without adding a second effect.
#[derive(Debug, Default)]
pub struct InMemoryStoreAdapter {
    invocations: Mutex<Vec<Invocation>>,
    applied: Mutex<HashMap<String, Value>>,
    faults: Mutex<Faults>,
}

impl InMemoryStoreAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every forward action against `store` is rejected.
    pub fn fail_forward(&self, store: &str) {
        lock(&self.faults).fail_forward.insert(store.to_string());
    }

    /// The next `times` compensations against `store` fail.
    pub fn fail_compensation(&self, store: &str, times: u32) {
        lock(&self.faults)
            .fail_compensation
            .insert(store.to_string(), times);
    }

    pub fn delay_forward(&self, store: &str, delay: Duration) {
        lock(&self.faults)
            .forward_delay
            .insert(store.to_string(), delay);
    }

    /// Clears every injected fault.
    pub fn heal(&self) {
        *lock(&self.faults) = Faults::default();
    }

    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.invocations).clone()
    }

    /// Step indices of forward calls, in call order.
    #[must_use]
    pub fn forward_calls(&self) -> Vec<usize> {
        self.calls(Phase::Forward)
    }

    /// Step indices of compensation calls, in call order.
    #[must_use]
    pub fn compensation_calls(&self) -> Vec<usize> {
        self.calls(Phase::Compensate)
    }

    fn calls(&self, phase: Phase) -> Vec<usize> {
        lock(&self.invocations)
            .iter()
            .filter(|i| i.phase == phase)
            .map(|i| i.step_index)
            .collect()
    }

    /// Number of effects currently applied and not undone.
    #[must_use]
    pub fn effects(&self) -> usize {
        lock(&self.applied).len()
    }

    fn record(&self, phase: Phase, store: &StoreRef, action: &Action, ctx: &StepContext) {
        lock(&self.invocations).push(Invocation {
            phase,
            store: store.name.clone(),
            operation: action.operation.clone(),
            step_index: ctx.step_index,
            attempt: ctx.attempt,
            idempotency_key: ctx.idempotency_key.clone(),
        });
    }
}

#[async_trait]
impl ForwardExecutable for InMemoryStoreAdapter {
    async fn execute(
        &self,
        store: &StoreRef,
        action: &Action,
        ctx: &StepContext,
    ) -> Result<Value, ActionError> {
        self.record(Phase::Forward, store, action, ctx);

        let (delay, fail) = {
            let faults = lock(&self.faults);
            (
                faults.forward_delay.get(&store.name).copied(),
                faults.fail_forward.contains(&store.name),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ActionError::Rejected(format!(
                "{} failed on {}",
                action.operation, store.name
            )));
        }

        let mut applied = lock(&self.applied);
        let result = applied
            .entry(ctx.idempotency_key.clone())
            .or_insert_with(|| {
                json!({
                    "store": store.name,
                    "operation": action.operation,
                    "input": action.payload,
                })
            });
        Ok(result.clone())
    }
}

#[async_trait]
impl CompensatingExecutable for InMemoryStoreAdapter {
    async fn compensate(
        &self,
        store: &StoreRef,
        action: &Action,
        _forward_result: Option<&Value>,
        ctx: &StepContext,
    ) -> Result<(), ActionError> {
        self.record(Phase::Compensate, store, action, ctx);

        {
            let mut faults = lock(&self.faults);
            if let Some(remaining) = faults.fail_compensation.get_mut(&store.name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ActionError::Transport(format!(
                        "{} could not reach {}",
                        action.operation, store.name
                    )));
                }
            }
        }

        lock(&self.applied).remove(&ctx.idempotency_key);
        Ok(())
    }
}

/// Collects alerts instead of logging them.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<CompensationAlert>>,
}

impl RecordingAlertSink {
    #[must_use]
    pub fn alerts(&self) -> Vec<CompensationAlert> {
        lock(&self.alerts).clone()
    }
}

impl AlertSink for RecordingAlertSink {
    fn compensation_exhausted(&self, alert: &CompensationAlert) {
        lock(&self.alerts).push(alert.clone());
    }
}

/// An `update` step on `entity_type#id` in `store`, undone by a revert.
#[must_use]
pub fn write_step(index: usize, store: StoreRef, entity_type: &str, id: &str) -> StepDescriptor {
    StepDescriptor {
        step_index: index,
        target_store: store,
        response_key: format!("update{entity_type}{index}"),
        forward_action: Action::new(
            ActionKind::Update,
            format!("update{entity_type}"),
            entity_type,
            json!({ "id": id }),
        ),
        compensating_action: Some(Action::new(
            ActionKind::Revert,
            format!("revert{entity_type}"),
            entity_type,
            json!({ "id": id }),
        )),
        entity_keys: BTreeSet::from([EntityKey::new(entity_type, id)]),
    }
}

/// A read step; nothing to compensate.
#[must_use]
pub fn read_step(index: usize, store: StoreRef, entity_type: &str, id: &str) -> StepDescriptor {
    StepDescriptor {
        step_index: index,
        target_store: store,
        response_key: format!("read{entity_type}{index}"),
        forward_action: Action::new(
            ActionKind::Read,
            format!("get{entity_type}"),
            entity_type,
            json!({ "id": id }),
        ),
        compensating_action: None,
        entity_keys: BTreeSet::from([EntityKey::new(entity_type, id)]),
    }
}
