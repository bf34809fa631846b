//! Test doubles for the external cryptographic engine.
//!
//! [`TransparentEngine`] "encrypts" by tagging the plaintext, so every
//! handle can be decrypted again; it provides no confidentiality at all.
//! [`RecordingOracle`] keeps every decryption request in memory and signs
//! payloads with a proof it can later check.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::{DecryptionOracle, EngineError, FheEngine, OracleError};
use crate::types::{Ciphertext, Plaintext, RequestId};

const TAG_UINT: u8 = 0;
const TAG_TEXT: u8 = 1;

#[derive(Debug, Default)]
pub struct TransparentEngine {
    fail_sqrt: AtomicBool,
}

impl TransparentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `sqrt_approx` fail.
    pub fn set_fail_sqrt(&self, fail: bool) {
        self.fail_sqrt.store(fail, Ordering::Relaxed);
    }

    pub fn encrypt_uint(&self, value: u128) -> Ciphertext {
        let mut bytes = Vec::with_capacity(17);
        bytes.push(TAG_UINT);
        bytes.extend_from_slice(&value.to_le_bytes());
        Ciphertext(bytes)
    }

    pub fn encrypt_text(&self, value: &str) -> Ciphertext {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.push(TAG_TEXT);
        bytes.extend_from_slice(value.as_bytes());
        Ciphertext(bytes)
    }

    pub fn decrypt(&self, c: &Ciphertext) -> Result<Plaintext, EngineError> {
        match c.as_bytes().split_first() {
            Some((&TAG_UINT, rest)) => {
                let raw: [u8; 16] = rest
                    .try_into()
                    .map_err(|_| EngineError::new("truncated integer ciphertext"))?;
                Ok(Plaintext::Uint(u128::from_le_bytes(raw)))
            }
            Some((&TAG_TEXT, rest)) => String::from_utf8(rest.to_vec())
                .map(Plaintext::Text)
                .map_err(|_| EngineError::new("text ciphertext is not utf-8")),
            _ => Err(EngineError::new("unrecognised ciphertext")),
        }
    }

    pub fn decrypt_uint(&self, c: &Ciphertext) -> Result<u128, EngineError> {
        self.decrypt(c)?
            .as_uint()
            .ok_or_else(|| EngineError::new("expected an integer ciphertext"))
    }
}

/// Largest `r` with `r * r <= n`.
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n / 2 + 1;
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

impl FheEngine for TransparentEngine {
    fn encrypt_zero(&self) -> Result<Ciphertext, EngineError> {
        Ok(self.encrypt_uint(0))
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EngineError> {
        let sum = self
            .decrypt_uint(a)?
            .checked_add(self.decrypt_uint(b)?)
            .ok_or_else(|| EngineError::new("addition overflow"))?;
        Ok(self.encrypt_uint(sum))
    }

    fn sqrt_approx(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        if self.fail_sqrt.load(Ordering::Relaxed) {
            return Err(EngineError::new("sqrt circuit unavailable"));
        }
        Ok(self.encrypt_uint(isqrt(self.decrypt_uint(a)?)))
    }

    fn square(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        let v = self.decrypt_uint(a)?;
        let sq = v
            .checked_mul(v)
            .ok_or_else(|| EngineError::new("multiplication overflow"))?;
        Ok(self.encrypt_uint(sq))
    }
}

/// In-memory oracle that records each batch it is asked to decrypt.
#[derive(Debug, Default)]
pub struct RecordingOracle {
    next: u64,
    requests: Vec<(RequestId, Vec<Ciphertext>)>,
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[(RequestId, Vec<Ciphertext>)] {
        &self.requests
    }

    /// The proof this oracle accepts for `payload` under `request_id`.
    pub fn proof_for(request_id: &RequestId, payload: &[Plaintext]) -> Vec<u8> {
        let mut proof = b"proof:".to_vec();
        proof.extend_from_slice(&request_id.0);
        proof.extend_from_slice(&serde_json::to_vec(payload).unwrap_or_default());
        proof
    }

    /// Decrypt a recorded batch and produce a valid callback.
    pub fn fulfil(
        &self,
        engine: &TransparentEngine,
        request_id: &RequestId,
    ) -> Result<(Vec<Plaintext>, Vec<u8>), OracleError> {
        let (_, handles) = self
            .requests
            .iter()
            .find(|(id, _)| id == request_id)
            .ok_or_else(|| OracleError::new(format!("no request {request_id}")))?;
        let payload = handles
            .iter()
            .map(|h| engine.decrypt(h))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OracleError::new(e.to_string()))?;
        let proof = Self::proof_for(request_id, &payload);
        Ok((payload, proof))
    }
}

impl DecryptionOracle for RecordingOracle {
    fn issue_request_id(&mut self) -> RequestId {
        let mut id = [0xA5u8; 32];
        id[..8].copy_from_slice(&self.next.to_le_bytes());
        self.next += 1;
        RequestId(id)
    }

    fn request_decryption(&mut self, request_id: &RequestId, handles: &[Ciphertext]) -> Result<(), OracleError> {
        self.requests.push((*request_id, handles.to_vec()));
        Ok(())
    }

    fn verify_proof(&self, request_id: &RequestId, payload: &[Plaintext], proof: &[u8]) -> bool {
        proof == Self::proof_for(request_id, payload).as_slice()
    }
}
