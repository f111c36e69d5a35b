//! Error types for key parsing

use thiserror::Error;

/// Errors that can occur when constructing keys
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Key text is not valid hex
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(#[from] hex::FromHexError),
}
