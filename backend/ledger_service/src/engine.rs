//! FHE engines the service can run with, chosen by `ORACLE_MODE`.
//!
//! * `local` uses the transparent development engine: handles carry their
//!   plaintext, so the in-process oracle can decrypt them.
//! * `gateway` uses [`SymbolicEngine`]. Each result handle is a `blake3`
//!   commitment to the operation and its operand handles, so the ledger can
//!   accumulate ciphertexts minted by any external encryptor without
//!   understanding them. The coprocessor behind the gateway evaluates a
//!   derived handle by replaying the same derivations from the event log.

use qf_settlement::testutils::TransparentEngine;
use qf_settlement::{Ciphertext, EngineError, FheEngine};

use crate::config::OracleMode;

const HANDLE_DOMAIN: &[u8] = b"qf-settlement/handle/v1";

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum Op {
    Zero = 0,
    Add = 1,
    SqrtApprox = 2,
    Square = 3,
}

/// Engine that derives result handles instead of computing on ciphertexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolicEngine;

impl SymbolicEngine {
    fn derive(op: Op, operands: &[&Ciphertext]) -> Result<Ciphertext, EngineError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(&[op as u8]);
        for operand in operands {
            if operand.as_bytes().is_empty() {
                return Err(EngineError::new("empty ciphertext handle"));
            }
            hasher.update(&(operand.as_bytes().len() as u64).to_le_bytes());
            hasher.update(operand.as_bytes());
        }
        Ok(Ciphertext(hasher.finalize().as_bytes().to_vec()))
    }
}

impl FheEngine for SymbolicEngine {
    fn encrypt_zero(&self) -> Result<Ciphertext, EngineError> {
        Self::derive(Op::Zero, &[])
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EngineError> {
        Self::derive(Op::Add, &[a, b])
    }

    fn sqrt_approx(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        Self::derive(Op::SqrtApprox, &[a])
    }

    fn square(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        Self::derive(Op::Square, &[a])
    }
}

pub enum ServiceEngine {
    Transparent(TransparentEngine),
    Symbolic(SymbolicEngine),
}

impl ServiceEngine {
    pub fn for_mode(mode: &OracleMode) -> Self {
        match mode {
            OracleMode::Local => Self::Transparent(TransparentEngine::new()),
            OracleMode::Gateway { .. } => Self::Symbolic(SymbolicEngine),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transparent(_) => "transparent",
            Self::Symbolic(_) => "symbolic",
        }
    }
}

impl FheEngine for ServiceEngine {
    fn encrypt_zero(&self) -> Result<Ciphertext, EngineError> {
        match self {
            Self::Transparent(e) => e.encrypt_zero(),
            Self::Symbolic(e) => e.encrypt_zero(),
        }
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EngineError> {
        match self {
            Self::Transparent(e) => e.add(a, b),
            Self::Symbolic(e) => e.add(a, b),
        }
    }

    fn sqrt_approx(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        match self {
            Self::Transparent(e) => e.sqrt_approx(a),
            Self::Symbolic(e) => e.sqrt_approx(a),
        }
    }

    fn square(&self, a: &Ciphertext) -> Result<Ciphertext, EngineError> {
        match self {
            Self::Transparent(e) => e.square(a),
            Self::Symbolic(e) => e.square(a),
        }
    }
}
