//! # nits-crypto — Cache Signing Identity
//!
//! Provides the cryptographic identity that makes the cache's narinfo
//! metadata trustworthy:
//!
//! - **Nix-format Ed25519 keys.** Secret keys are `name:base64(seed‖public)`,
//!   public keys are `name:base64(public)`, the format `nix key
//!   generate-secret` produces and `trusted-public-keys` consumes.
//! - **Fingerprint signing.** [`NarSigner`] signs the canonical narinfo
//!   fingerprint and yields a `Sig:` entry.
//! - **Idempotent sign-if-needed.** [`sign_if_needed`] adds this cache's
//!   signature only when no signature under its name is present.
//!
//! ## Crate Policy
//!
//! - Depends only on `nits-core` internally.
//! - Secret key material is never logged: `Debug` is redacted and the Nix
//!   secret-key string is returned inside `Zeroizing`.
//! - Tests use real Ed25519 keys, never mocked signatures.

pub mod error;
pub mod identity;
pub mod signer;

pub use error::CryptoError;
pub use identity::{PublicIdentity, SigningIdentity};
pub use signer::{sign_if_needed, NarSigner};
