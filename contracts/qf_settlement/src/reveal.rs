//! # Decryption oracle protocol
//!
//! Two-phase reveal of a project's four encrypted fields:
//!
//! 1. [`request_reveal`] takes a fresh `RequestId` from the
//!    [`DecryptionOracle`], forwards the batched ciphertexts under it and
//!    records it against the project (`Hidden → RequestPending`).
//! 2. [`on_decryption_callback`] resolves the id, checks the proof and
//!    commits the plaintext in one step (`RequestPending → Revealed`).
//!
//! A callback can only succeed once per request: the correlation record is
//! deleted on commit, so duplicates and replays resolve to
//! [`Error::UnknownRequest`]. A rejected proof leaves the request pending.

use tracing::{info, warn};

use crate::engine::{DecryptionOracle, OracleError};
use crate::gate::{self, AccessPolicy, Action};
use crate::storage::{self, CiphertextStore, DataKey};
use crate::types::{
    ActorId, DecryptionRequest, Plaintext, ProjectId, RequestId, RevealState, RevealedFields,
    RevealedProject,
};
use crate::Error;

/// Current reveal state of a project.
pub fn reveal_state(store: &CiphertextStore, id: ProjectId) -> Result<RevealState, Error> {
    if storage::load_revealed(store, id)?.revealed {
        return Ok(RevealState::Revealed);
    }
    Ok(match storage::pending_request(store, id)? {
        Some(req) => RevealState::RequestPending {
            request_id: req.request_id,
            requested_at: req.requested_at,
        },
        None => RevealState::Hidden,
    })
}

/// Issue a decryption request for a project's fields.
pub fn request_reveal<O, P>(
    store: &mut CiphertextStore,
    oracle: &mut O,
    policy: &P,
    actor: &ActorId,
    id: ProjectId,
    now: u64,
) -> Result<RequestId, Error>
where
    O: DecryptionOracle + ?Sized,
    P: AccessPolicy + ?Sized,
{
    let project = storage::load_project(store, id)?;
    gate::require_authorized(policy, actor, Action::RequestReveal, &project)?;

    match reveal_state(store, id)? {
        RevealState::Revealed => return Err(Error::AlreadyRevealed),
        RevealState::RequestPending { .. } => return Err(Error::RequestAlreadyPending),
        RevealState::Hidden => {}
    }

    let request_id = oracle.issue_request_id();
    if store.contains(&DataKey::Request(request_id)) {
        return Err(OracleError::new(format!("request id {request_id} reused")).into());
    }
    oracle.request_decryption(&request_id, &project.reveal_batch())?;

    let request = DecryptionRequest {
        request_id,
        project_id: id,
        requested_at: now,
    };
    storage::save_request(store, &request);

    info!(project_id = %id, %request_id, "reveal requested");
    Ok(request_id)
}

/// Commit an oracle callback.
///
/// Returns the project that was revealed and its plaintext fields.
pub fn on_decryption_callback<O>(
    store: &mut CiphertextStore,
    oracle: &O,
    request_id: &RequestId,
    payload: &[Plaintext],
    proof: &[u8],
    now: u64,
) -> Result<(ProjectId, RevealedFields), Error>
where
    O: DecryptionOracle + ?Sized,
{
    let request = storage::load_request(store, request_id).map_err(|e| {
        warn!(%request_id, "callback for unknown or consumed request");
        e
    })?;
    let id = request.project_id;

    if storage::load_revealed(store, id)?.revealed {
        warn!(project_id = %id, %request_id, "duplicate callback for revealed project");
        return Err(Error::AlreadyRevealed);
    }

    if !oracle.verify_proof(request_id, payload, proof) {
        warn!(project_id = %id, %request_id, "decryption proof rejected");
        return Err(Error::ProofVerificationFailed);
    }

    let fields = RevealedFields::from_payload(payload).ok_or_else(|| {
        warn!(project_id = %id, %request_id, len = payload.len(), "malformed reveal payload");
        Error::MalformedPayload
    })?;

    let revealed = RevealedProject {
        project_id: id,
        fields: Some(fields.clone()),
        revealed: true,
        revealed_at: Some(now),
    };
    storage::save_revealed(store, &revealed);
    storage::consume_request(store, &request);

    info!(project_id = %id, %request_id, "project revealed");
    Ok((id, fields))
}

/// Drop requests older than `timeout` seconds and reopen their projects.
///
/// A late callback carrying an expired id fails with
/// [`Error::UnknownRequest`].
pub fn expire_stale_requests(
    store: &mut CiphertextStore,
    now: u64,
    timeout: u64,
) -> Vec<DecryptionRequest> {
    let expired: Vec<DecryptionRequest> = storage::outstanding_requests(store)
        .into_iter()
        .filter(|req| now.saturating_sub(req.requested_at) >= timeout)
        .collect();

    for req in &expired {
        storage::consume_request(store, req);
        info!(
            project_id = %req.project_id,
            request_id = %req.request_id,
            "reveal request expired"
        );
    }
    expired
}
