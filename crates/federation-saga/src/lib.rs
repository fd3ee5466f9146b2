//! Saga execution for federated mutations.
//!
//! A transaction runs its steps strictly in declared order, each against one
//! store. When a step fails, every step that already succeeded is compensated
//! in exact reverse order. Each state change is durably logged before the
//! executor moves on, so a crashed transaction can be resumed from the log.
//!
//! Stores are reached through the [`ForwardExecutable`] and
//! [`CompensatingExecutable`] capabilities, selected from a [`StoreRegistry`]
//! by [`StoreKind`](federation_core::StoreKind).

mod adapter;
mod alert;
mod audit;
mod config;
mod error;
mod executor;
mod registry;
mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{ActionError, CompensatingExecutable, ForwardExecutable, StepContext, StoreAdapter};
pub use alert::{AlertSink, CompensationAlert, TracingAlertSink};
pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use config::ExecutorConfig;
pub use error::{CompensationError, SagaError};
pub use executor::SagaExecutor;
pub use registry::StoreRegistry;
pub use retry::{BackoffStrategy, RetryPolicy};
