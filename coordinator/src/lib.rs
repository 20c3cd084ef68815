//! Coordinator service for allot epochs.
//!
//! The coordinator is the semi-trusted party that relays proofs and computes
//! the final reveal. See [`Coordinator`].

pub mod error;
pub mod service;

pub use error::CoordinatorError;
pub use service::Coordinator;
