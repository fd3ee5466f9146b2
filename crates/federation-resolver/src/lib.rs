//! Turns a validated federated mutation into an ordered list of saga steps.
//!
//! Resolution is a pure function of the request and the federation map: no
//! store is contacted and no lock is taken. Any entity that cannot be bound to
//! exactly one store fails the whole request before anything runs.

mod error;
mod map;
mod request;
mod resolve;

pub use error::ResolutionError;
pub use map::{EntityBinding, FederationMap};
pub use request::{MutationKind, MutationOperation, MutationRequest};
pub use resolve::resolve;
