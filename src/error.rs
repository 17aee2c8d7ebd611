use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the key container subsystem.
///
/// `Decryption` and `KeyIntegrity` render the same message so that an
/// operator cannot tell a wrong passphrase from a damaged key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("memory allocation failed")]
    Allocation,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("key unwrap integrity check failed")]
    Integrity,

    #[error("wrong passphrase or corrupted key")]
    Decryption,

    #[error("wrong passphrase or corrupted key")]
    KeyIntegrity,

    #[error("malformed key container: {0}")]
    Format(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("OS random generator unavailable")]
    Rng,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(&'static str),

    #[error("no PDP key pair found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("PDP public key is missing: {}", .0.display())]
    IncompleteContainer(PathBuf),

    #[error("passphrases do not match")]
    PassphraseMismatch,

    #[error("passphrase cannot be empty")]
    EmptyPassphrase,

    #[error("operation aborted")]
    Aborted,
}

impl KeyError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        KeyError::Format(msg.into())
    }
}
