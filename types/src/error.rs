//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid commitment hash: {0}")]
    InvalidHash(String),
}
