//! # Types
//!
//! Shared data structures used across all modules of the settlement core.
//!
//! ## Design decisions
//!
//! ### Ciphertexts are opaque
//!
//! A [`Ciphertext`] is a byte string produced by the external FHE engine.
//! Nothing in this crate inspects or branches on its contents; it is only
//! stored, handed back to the engine, or forwarded to the decryption oracle.
//! On the wire it is base64.
//!
//! ### Reveal as a Finite-State Machine
//!
//! [`RevealState`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Hidden ──► RequestPending ──► Revealed
//!    ▲              │
//!    └──────────────┘  (only by request expiry)
//! ```
//!
//! `Revealed` is terminal.

use core::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique, monotonically assigned project identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque caller identity (project submitter or contributor).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to an encrypted value.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ciphertext(pub Vec<u8>);

impl Ciphertext {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Handles can be large; never dump them into logs.
impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Ciphertext)
            .map_err(serde::de::Error::custom)
    }
}

/// Correlation identifier issued by the decryption oracle.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestId(pub [u8; 32]);

impl RequestId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).ok()?;
        Some(Self(out))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.to_hex())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        RequestId::from_hex(&encoded)
            .ok_or_else(|| serde::de::Error::custom("request id must be 64 hex characters"))
    }
}

/// On-ledger representation of a funding project.
///
/// Never deleted; closing a project only clears `active`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (auto-incremented from 0).
    pub id: ProjectId,
    /// Actor that submitted the project; holds the close/reveal capability
    /// under the default policy.
    pub submitter: ActorId,
    pub title: Ciphertext,
    pub description: Ciphertext,
    pub location: Ciphertext,
    pub budget: Ciphertext,
    /// Encrypted running total of all contributions.
    pub total_contributed: Ciphertext,
    /// Ledger timestamp at submission.
    pub created_at: u64,
    /// `true` while the funding period is open.
    pub active: bool,
}

impl Project {
    /// The fields batched into a reveal request, in payload order.
    pub fn reveal_batch(&self) -> Vec<Ciphertext> {
        vec![
            self.title.clone(),
            self.description.clone(),
            self.location.clone(),
            self.budget.clone(),
        ]
    }
}

/// A single encrypted contribution. Immutable once recorded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub project_id: ProjectId,
    /// Position in the project's append-only contribution log.
    pub index: u32,
    pub contributor: ActorId,
    pub amount: Ciphertext,
    pub timestamp: u64,
}

/// A decrypted scalar as returned by the oracle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plaintext {
    Uint(u128),
    Text(String),
}

impl Plaintext {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Plaintext::Text(s) => Some(s),
            Plaintext::Uint(_) => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Plaintext::Uint(v) => Some(*v),
            Plaintext::Text(_) => None,
        }
    }
}

/// Plaintext mirror of a project's four encrypted fields.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RevealedFields {
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: u64,
}

impl RevealedFields {
    /// Map an oracle payload onto the fields, in [`Project::reveal_batch`] order.
    ///
    /// Returns `None` if the payload has the wrong length, a value of the
    /// wrong kind, or a budget that does not fit in a `u64`.
    pub fn from_payload(payload: &[Plaintext]) -> Option<Self> {
        match payload {
            [title, description, location, budget] => Some(Self {
                title: title.as_text()?.to_string(),
                description: description.as_text()?.to_string(),
                location: location.as_text()?.to_string(),
                budget: u64::try_from(budget.as_uint()?).ok()?,
            }),
            _ => None,
        }
    }
}

/// Written exactly once, by a verified decryption callback.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RevealedProject {
    pub project_id: ProjectId,
    pub fields: Option<RevealedFields>,
    pub revealed: bool,
    pub revealed_at: Option<u64>,
}

impl RevealedProject {
    pub fn unrevealed(project_id: ProjectId) -> Self {
        Self {
            project_id,
            fields: None,
            revealed: false,
            revealed_at: None,
        }
    }
}

/// Correlation record between an oracle request and its project.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DecryptionRequest {
    pub request_id: RequestId,
    pub project_id: ProjectId,
    pub requested_at: u64,
}

/// Per-project reveal status.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RevealState {
    Hidden,
    RequestPending {
        request_id: RequestId,
        requested_at: u64,
    },
    Revealed,
}

/// One page of an append-only log.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub total: u32,
}
