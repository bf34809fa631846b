//! # External cryptographic engine
//!
//! The narrow interface through which the ledger consumes homomorphic
//! arithmetic and out-of-band decryption. Implementations live outside this
//! crate (a test double is available behind the `testutils` feature).
//!
//! `sqrt_approx` over ciphertexts is necessarily approximate; the accepted
//! error bound is a property of the concrete engine, not of this crate.

use thiserror::Error;

use crate::types::{Ciphertext, Plaintext, RequestId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fhe engine: {0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("decryption oracle: {0}")]
pub struct OracleError(pub String);

impl OracleError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Homomorphic operations over opaque ciphertexts.
///
/// Every method must be deterministic within the engine's proof system; the
/// ledger never looks at the plaintext behind a handle.
pub trait FheEngine {
    /// A fresh encryption of zero, used to initialise accumulators.
    fn encrypt_zero(&self) -> Result<Ciphertext, EngineError>;

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EngineError>;

    fn sqrt_approx(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError>;

    fn square(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError>;
}

/// Asynchronous threshold decryption service.
///
/// A request is issued in two steps: `issue_request_id` mints the
/// correlation id, then `request_decryption` forwards the batch under it.
/// The plaintext arrives later through
/// [`Ledger::on_decryption_callback`](crate::Ledger::on_decryption_callback).
pub trait DecryptionOracle {
    fn issue_request_id(&mut self) -> RequestId;

    fn request_decryption(&mut self, request_id: &RequestId, handles: &[Ciphertext]) -> Result<(), OracleError>;

    fn verify_proof(&self, request_id: &RequestId, payload: &[Plaintext], proof: &[u8]) -> bool;
}
