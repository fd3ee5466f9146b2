//! Shared data model for the federated mutation transaction coordinator.
//!
//! Every other crate in the workspace speaks in these types: transaction and
//! store identifiers, step descriptors with their forward and compensating
//! actions, the persisted transaction record, and the result shape handed back
//! to the mutation execution layer.

pub mod error;
mod ids;
mod record;
mod result;
mod step;

pub use error::{CoreError, Result};
pub use ids::{EntityKey, StoreKind, StoreRef, TransactionId};
pub use record::{TransactionRecord, TransactionState};
pub use result::{ErrorKind, MutationError, MutationResult};
pub use step::{Action, ActionKind, StepDescriptor, StepOutcome, StepStatus};
