//! Decryption proofs: a `blake3` keyed hash over the request id and the
//! JSON-encoded plaintext payload, under a key shared with the oracle.

use std::fmt;

use qf_settlement::{Plaintext, RequestId};

use crate::errors::{Result, ServiceError};

#[derive(Clone)]
pub struct AttestationKey([u8; 32]);

impl AttestationKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut key = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut key)
            .map_err(|_| ServiceError::Config("ORACLE_KEY must be 64 hex characters".to_string()))?;
        Ok(Self(key))
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    fn digest(&self, request_id: &RequestId, payload: &[Plaintext]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.0);
        hasher.update(&request_id.0);
        // Vec<Plaintext> always serialises.
        hasher.update(&serde_json::to_vec(payload).unwrap_or_default());
        hasher.finalize()
    }

    pub fn sign(&self, request_id: &RequestId, payload: &[Plaintext]) -> Vec<u8> {
        self.digest(request_id, payload).as_bytes().to_vec()
    }

    pub fn verify(&self, request_id: &RequestId, payload: &[Plaintext], proof: &[u8]) -> bool {
        let Ok(bytes) = <[u8; 32]>::try_from(proof) else {
            return false;
        };
        // blake3::Hash equality is constant-time.
        blake3::Hash::from(bytes) == self.digest(request_id, payload)
    }
}

impl fmt::Debug for AttestationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttestationKey(..)")
    }
}
