//! # Narinfo Signer
//!
//! The seam between the protocol handlers and the key that signs for them.
//! Handlers hold an `Arc<dyn NarSigner>`; production uses
//! [`SigningIdentity`](crate::SigningIdentity).

use nits_core::{NarInfo, NarSignature};

use crate::error::CryptoError;

/// Something that can sign narinfo fingerprints under a fixed name.
pub trait NarSigner: Send + Sync {
    /// Name embedded in produced signatures and compared against existing ones.
    fn name(&self) -> &str;

    /// Sign a fingerprint. Deterministic for a given key; no side effects.
    fn sign(&self, fingerprint: &[u8]) -> Result<NarSignature, CryptoError>;
}

/// Add this signer's signature to `info` unless one with its name exists.
///
/// Returns `true` when the record changed and must be persisted again. On
/// error `info` is left untouched.
pub fn sign_if_needed<S>(signer: &S, info: &mut NarInfo) -> Result<bool, CryptoError>
where
    S: NarSigner + ?Sized,
{
    if info.is_signed_by(signer.name()) {
        return Ok(false);
    }
    let signature = signer.sign(info.fingerprint().as_bytes())?;
    Ok(info.add_signature(signature))
}
