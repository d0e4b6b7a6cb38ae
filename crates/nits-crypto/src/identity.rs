//! # Nix Signing Identity
//!
//! Loads and generates Ed25519 keys in the Nix binary-cache key format and
//! signs narinfo fingerprints with them.
//!
//! ## Security Invariant
//!
//! - `SigningIdentity` does not implement `Serialize` and its `Debug` output
//!   never contains key bytes.
//! - Loading a secret key checks that the embedded public half matches the
//!   seed, so a tampered key file is rejected instead of producing signatures
//!   that no client can verify.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, Verifier};
use nits_core::{NarInfo, NarSignature};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::signer::NarSigner;

/// The cache's secret signing key plus its public name.
pub struct SigningIdentity {
    name: String,
    signing_key: ed25519_dalek::SigningKey,
}

/// Public half of an identity, as listed in `trusted-public-keys`.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    name: String,
    verifying_key: ed25519_dalek::VerifyingKey,
}

// ---------------------------------------------------------------------------
// SigningIdentity
// ---------------------------------------------------------------------------

impl SigningIdentity {
    /// Generate a fresh random identity.
    pub fn generate(name: impl Into<String>) -> Result<Self, CryptoError> {
        let name = validate_name(name.into())?;
        let mut csprng = rand::rngs::OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Ok(Self { name, signing_key })
    }

    /// Build an identity from a 32-byte seed. Deterministic.
    pub fn from_seed(name: impl Into<String>, seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let name = validate_name(name.into())?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Ok(Self { name, signing_key })
    }

    /// Parse a Nix secret key: `name:base64(seed ‖ public)`.
    pub fn from_nix_secret_key(raw: &str) -> Result<Self, CryptoError> {
        let (name, encoded) = split_key(raw.trim())?;
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::KeyFormat(format!("secret key is not base64: {e}")))?,
        );
        let keypair: &[u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyFormat(format!(
                "secret key must decode to 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing_key = ed25519_dalek::SigningKey::from_keypair_bytes(keypair)
            .map_err(|_| CryptoError::KeyMismatch(name.clone()))?;
        Ok(Self { name, signing_key })
    }

    /// Render the Nix secret-key string. Wrapped so the buffer is wiped on drop.
    pub fn to_nix_secret_key(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing_key.to_keypair_bytes());
        Zeroizing::new(format!("{}:{}", self.name, STANDARD.encode(bytes.as_slice())))
    }

    /// Public identity name embedded in every signature this key produces.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            name: self.name.clone(),
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

impl NarSigner for SigningIdentity {
    fn name(&self) -> &str {
        &self.name
    }

    fn sign(&self, fingerprint: &[u8]) -> Result<NarSignature, CryptoError> {
        let signature = self
            .signing_key
            .try_sign(fingerprint)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        NarSignature::new(self.name.clone(), STANDARD.encode(signature.to_bytes()))
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningIdentity({}, <private>)", self.name)
    }
}

// ---------------------------------------------------------------------------
// PublicIdentity
// ---------------------------------------------------------------------------

impl PublicIdentity {
    /// Parse a Nix public key: `name:base64(public)`.
    pub fn from_nix_public_key(raw: &str) -> Result<Self, CryptoError> {
        let (name, encoded) = split_key(raw.trim())?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::KeyFormat(format!("public key is not base64: {e}")))?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyFormat(format!(
                "public key must decode to 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::KeyFormat(format!("invalid public key: {e}")))?;
        Ok(Self {
            name,
            verifying_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_nix_public_key(&self) -> String {
        format!(
            "{}:{}",
            self.name,
            STANDARD.encode(self.verifying_key.as_bytes())
        )
    }

    /// Verify the signature under this identity's name on `info`.
    ///
    /// Fails if no such signature is present or if it does not match the
    /// record's fingerprint.
    pub fn verify(&self, info: &NarInfo) -> Result<(), CryptoError> {
        let sig = info
            .signatures()
            .iter()
            .find(|s| s.name() == self.name)
            .ok_or_else(|| {
                CryptoError::Verification(format!("no signature named {:?}", self.name))
            })?;
        let bytes = STANDARD
            .decode(sig.value())
            .map_err(|e| CryptoError::Verification(format!("signature is not base64: {e}")))?;
        let bytes: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Verification(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);
        self.verifying_key
            .verify(info.fingerprint().as_bytes(), &signature)
            .map_err(|e| CryptoError::Verification(e.to_string()))
    }
}

impl std::fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicIdentity({})", self.to_nix_public_key())
    }
}

impl std::fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_nix_public_key())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn split_key(raw: &str) -> Result<(String, &str), CryptoError> {
    let (name, encoded) = raw
        .split_once(':')
        .ok_or_else(|| CryptoError::KeyFormat("expected `name:base64`".to_string()))?;
    let name = validate_name(name.to_string())?;
    Ok((name, encoded))
}

fn validate_name(name: String) -> Result<String, CryptoError> {
    if name.is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
        return Err(CryptoError::KeyFormat(format!("invalid key name {name:?}")));
    }
    Ok(name)
}
