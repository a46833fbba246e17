//! Errors shared by every module.

use thiserror::Error;

/// Represents errors that can occur while issuing or packaging certificates.
#[derive(Debug, Error, Clone)]
pub enum SmimerError {
    /// The secure random source could not produce bytes.
    #[error("Entropy source unavailable: {0}")]
    EntropyError(String),

    /// RSA key generation failed (unsupported modulus or algorithm failure).
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Producing a certificate signature failed.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// The signer certificate does not carry the signer key's public half.
    #[error("Signer certificate does not match signer key: {0}")]
    SignerMismatchError(String),

    /// Building or opening a PKCS#12 archive failed.
    #[error("PKCS#12 packaging error: {0}")]
    PackagingError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A signature did not verify against the presented key.
    #[error("Verification failed: {0}")]
    VerificationError(String),
}

pub type Result<T> = std::result::Result<T, SmimerError>;

impl From<der::Error> for SmimerError {
    /// Converts a `der::Error` into a `SmimerError`.
    fn from(err: der::Error) -> Self {
        SmimerError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for SmimerError {
    fn from(err: rsa::Error) -> Self {
        SmimerError::KeyGenerationError(err.to_string())
    }
}

impl From<rand_core::Error> for SmimerError {
    fn from(err: rand_core::Error) -> Self {
        SmimerError::EntropyError(err.to_string())
    }
}
