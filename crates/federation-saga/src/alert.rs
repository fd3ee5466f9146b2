use federation_core::{StoreRef, TransactionId};
use tracing::error;

/// An exhausted compensation. Partial effects may remain in `store` until an
/// operator reconciles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationAlert {
    pub transaction_id: TransactionId,
    pub step_index: usize,
    pub store: StoreRef,
    pub attempts: u32,
    pub error: String,
}

/// Destination for operational incidents.
pub trait AlertSink: Send + Sync {
    fn compensation_exhausted(&self, alert: &CompensationAlert);
}

/// Emits alerts as `error` events tagged `alert = true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn compensation_exhausted(&self, alert: &CompensationAlert) {
        error!(
            alert = true,
            transaction_id = %alert.transaction_id,
            step_index = alert.step_index,
            store = %alert.store,
            attempts = alert.attempts,
            error = %alert.error,
            "compensation exhausted its retries; manual reconciliation required"
        );
    }
}
