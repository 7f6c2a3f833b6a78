//! Ed25519 key material decoding.
//!
//! Keys arrive as hex strings from the key-management collaborator (in
//! practice, environment variables). Decoding happens once, at startup, and
//! every problem is reported as `MedtrailError::KeyMaterial` so a bad key
//! stops the service before the first request instead of failing appends.
//!
//! Accepted formats:
//! - private key: 32-byte seed, or 64-byte `seed || public` keypair
//! - public key: 32 bytes
//!
//! When both are given, the public key must belong to the private key.

use ed25519_dalek::{
    SigningKey, VerifyingKey, KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;

use medtrail_contracts::error::{MedResult, MedtrailError};

use crate::engine::{Ed25519Signer, Ed25519Verifier};

fn key_error(reason: impl Into<String>) -> MedtrailError {
    MedtrailError::KeyMaterial { reason: reason.into() }
}

fn decode_hex(label: &str, value: &str) -> MedResult<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| key_error(format!("{label} is not valid hex: {e}")))
}

/// Decode a hex public key.
pub fn decode_public_key(public_hex: &str) -> MedResult<VerifyingKey> {
    let bytes = decode_hex("public key", public_hex)?;
    let array: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        key_error(format!(
            "public key is {} bytes, expected {PUBLIC_KEY_LENGTH}",
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&array)
        .map_err(|e| key_error(format!("public key is not a valid curve point: {e}")))
}

/// Decode a hex private key (seed or keypair form).
pub fn decode_private_key(private_hex: &str) -> MedResult<SigningKey> {
    let bytes = decode_hex("private key", private_hex)?;
    match bytes.len() {
        SECRET_KEY_LENGTH => {
            let mut seed = [0u8; SECRET_KEY_LENGTH];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        KEYPAIR_LENGTH => {
            let mut pair = [0u8; KEYPAIR_LENGTH];
            pair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&pair).map_err(|_| {
                key_error("private key's embedded public half does not match its seed")
            })
        }
        n => Err(key_error(format!(
            "private key is {n} bytes, expected {SECRET_KEY_LENGTH} or {KEYPAIR_LENGTH}"
        ))),
    }
}

/// A validated signing keypair for one audit log.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Decode and cross-check a hex keypair.
    ///
    /// Fails with `KeyMaterial` when either key is malformed or the public
    /// key was not derived from the private key.
    pub fn from_hex(private_hex: &str, public_hex: &str) -> MedResult<Self> {
        let signing_key = decode_private_key(private_hex)?;
        let public = decode_public_key(public_hex)?;
        if signing_key.verifying_key() != public {
            return Err(key_error("public key does not belong to the private key"));
        }
        Ok(Self { signing_key })
    }

    /// Generate a fresh keypair from the OS random source.
    ///
    /// For operator tooling only; the audit trail itself never creates keys.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// 64-byte `seed || public` private key, hex encoded.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_keypair_bytes())
    }

    /// 32-byte public key, hex encoded.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    /// A verifier for this keypair's public key.
    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier::new(self.signing_key.verifying_key())
    }

    /// Split into the signing half and the verifying half.
    pub fn into_parts(self) -> (Ed25519Signer, Ed25519Verifier) {
        let verifier = self.verifier();
        (Ed25519Signer::new(self.signing_key), verifier)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
