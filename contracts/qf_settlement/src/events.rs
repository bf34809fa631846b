//! # Events
//!
//! The ledger's append-only event log. Each committed transition emits
//! exactly one event carrying everything needed to rebuild state by replay
//! (see [`Ledger::replay`](crate::Ledger::replay)).
//!
//! | Event               | Emitted by             | Kind string            |
//! |---------------------|------------------------|------------------------|
//! | `ProjectSubmitted`  | `submit_project`       | `project_submitted`    |
//! | `ContributionMade`  | `contribute`           | `contribution_made`    |
//! | `FundingCompleted`  | `close_project`        | `funding_completed`    |
//! | `ProjectRevealed`   | `on_decryption_callback` | `project_revealed`   |
//!
//! Reveal requests emit nothing; they are not part of the log.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, Ciphertext, ProjectId, RevealedFields};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ProjectSubmitted {
        project_id: ProjectId,
        submitter: ActorId,
        title: Ciphertext,
        description: Ciphertext,
        location: Ciphertext,
        budget: Ciphertext,
        timestamp: u64,
    },
    ContributionMade {
        project_id: ProjectId,
        index: u32,
        contributor: ActorId,
        amount: Ciphertext,
        timestamp: u64,
    },
    FundingCompleted {
        project_id: ProjectId,
        closed_by: ActorId,
        timestamp: u64,
    },
    ProjectRevealed {
        project_id: ProjectId,
        fields: RevealedFields,
        timestamp: u64,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProjectSubmitted { .. } => EventKind::ProjectSubmitted,
            Self::ContributionMade { .. } => EventKind::ContributionMade,
            Self::FundingCompleted { .. } => EventKind::FundingCompleted,
            Self::ProjectRevealed { .. } => EventKind::ProjectRevealed,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::ProjectSubmitted { project_id, .. }
            | Self::ContributionMade { project_id, .. }
            | Self::FundingCompleted { project_id, .. }
            | Self::ProjectRevealed { project_id, .. } => *project_id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Self::ProjectSubmitted { timestamp, .. }
            | Self::ContributionMade { timestamp, .. }
            | Self::FundingCompleted { timestamp, .. }
            | Self::ProjectRevealed { timestamp, .. } => *timestamp,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProjectSubmitted,
    ContributionMade,
    FundingCompleted,
    ProjectRevealed,
}

impl EventKind {
    /// Short identifier string suitable for storage in a database column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectSubmitted => "project_submitted",
            Self::ContributionMade => "contribution_made",
            Self::FundingCompleted => "funding_completed",
            Self::ProjectRevealed => "project_revealed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project_submitted" => Some(Self::ProjectSubmitted),
            "contribution_made" => Some(Self::ContributionMade),
            "funding_completed" => Some(Self::FundingCompleted),
            "project_revealed" => Some(Self::ProjectRevealed),
            _ => None,
        }
    }
}
