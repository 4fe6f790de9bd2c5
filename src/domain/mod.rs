//! Domain layer types and invariants.

pub mod envelope;
pub mod error;
pub mod options;
pub mod request;
