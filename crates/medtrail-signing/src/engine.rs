//! Ed25519 implementations of the signing seams.
//!
//! `Ed25519Signer` implements `DigestSigner` and `Ed25519Verifier`
//! implements `SignatureVerifier` from medtrail-core.
//!
//! The signed message is the ASCII hex digest exactly as stored, so a
//! verifier needs nothing but the stored row and the public key.
//! Signatures are 64 bytes, stored as 128 lowercase hex characters.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, SIGNATURE_LENGTH};
use tracing::debug;

use medtrail_contracts::{
    error::{MedResult, MedtrailError},
    verify::SignatureCheck,
};
use medtrail_core::traits::{DigestSigner, SignatureVerifier};

use crate::keys::decode_public_key;

/// Signs audit digests with the log's private key.
pub struct Ed25519Signer {
    signing_key: SigningKey,
    public_key_hex: String,
}

impl Ed25519Signer {
    pub fn new(signing_key: SigningKey) -> Self {
        let public_key_hex = hex::encode(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            public_key_hex,
        }
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}

impl DigestSigner for Ed25519Signer {
    fn sign_digest(&self, digest: &str) -> MedResult<String> {
        let signature = self
            .signing_key
            .try_sign(digest.as_bytes())
            .map_err(|e| MedtrailError::SigningFailed {
                reason: format!("ed25519 signing failed: {e}"),
            })?;
        Ok(hex::encode(signature.to_bytes()))
    }

    fn public_key_hex(&self) -> String {
        self.public_key_hex.clone()
    }
}

/// Checks audit signatures against the log's public key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    verifying_key: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// Build a verifier from a hex public key alone.
    ///
    /// Lets auditors without the private key replay a log.
    pub fn from_public_hex(public_hex: &str) -> MedResult<Self> {
        Ok(Self::new(decode_public_key(public_hex)?))
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }
}

impl SignatureVerifier for Ed25519Verifier {
    /// Decode `signature` and verify it over `digest`.
    ///
    /// Undecodable hex or a wrong length is `Malformed`; a well-formed
    /// signature that fails strict verification is `Mismatch`.
    fn check_signature(&self, digest: &str, signature: &str) -> SignatureCheck {
        let bytes = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(e) => return SignatureCheck::Malformed(format!("not valid hex: {e}")),
        };
        let array: [u8; SIGNATURE_LENGTH] = match bytes.as_slice().try_into() {
            Ok(array) => array,
            Err(_) => {
                return SignatureCheck::Malformed(format!(
                    "{} bytes, expected {SIGNATURE_LENGTH}",
                    bytes.len()
                ))
            }
        };
        let signature = Signature::from_bytes(&array);

        match self.verifying_key.verify_strict(digest.as_bytes(), &signature) {
            Ok(()) => SignatureCheck::Valid,
            Err(e) => {
                debug!(error = %e, "signature rejected");
                SignatureCheck::Mismatch
            }
        }
    }
}
