//! # Lifecycle gate
//!
//! Decides which operations are legal for a project and who may trigger
//! state transitions.
//!
//! ```text
//! Open ──close──► Closed
//! ```
//!
//! Reveal progress is tracked separately (see [`crate::reveal`]).
//!
//! Authorization is a capability check against an injected [`AccessPolicy`].
//! The default [`SubmitterPolicy`] trusts the `ActorId` it is handed; a real
//! deployment must authenticate that identity before it reaches the ledger.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, Project};
use crate::Error;

/// State transitions guarded by the policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Close,
    RequestReveal,
}

pub trait AccessPolicy {
    fn authorize(&self, actor: &ActorId, action: Action, project: &Project) -> bool;
}

/// Only the original submitter may close or reveal a project.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubmitterPolicy;

impl AccessPolicy for SubmitterPolicy {
    fn authorize(&self, actor: &ActorId, _action: Action, project: &Project) -> bool {
        *actor == project.submitter
    }
}

/// Reject with [`Error::NotAuthorized`] unless `policy` allows the action.
pub fn require_authorized<P: AccessPolicy + ?Sized>(
    policy: &P,
    actor: &ActorId,
    action: Action,
    project: &Project,
) -> Result<(), Error> {
    if policy.authorize(actor, action, project) {
        Ok(())
    } else {
        Err(Error::NotAuthorized)
    }
}

/// Contributions are only accepted while the project is open.
pub fn require_open(project: &Project) -> Result<(), Error> {
    if project.active {
        Ok(())
    } else {
        Err(Error::InactiveProject)
    }
}

/// Matching is only computable once the funding period is closed.
pub fn require_closed(project: &Project) -> Result<(), Error> {
    if project.active {
        Err(Error::FundingStillActive)
    } else {
        Ok(())
    }
}
