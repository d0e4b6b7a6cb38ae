//! # Crypto Errors

use thiserror::Error;

/// Error in key handling, signing, or verification.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A key string is not `name:base64` or decodes to the wrong length.
    #[error("malformed key: {0}")]
    KeyFormat(String),

    /// The public half embedded in a secret key does not match its seed.
    #[error("secret key {0:?} embeds a public key that does not match its seed")]
    KeyMismatch(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature did not verify.
    #[error("signature verification failed: {0}")]
    Verification(String),
}
