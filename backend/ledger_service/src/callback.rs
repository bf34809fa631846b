//! Decryption callback handler.
//!
//! Every callback, whether produced by the local oracle or received over
//! HTTP from a gateway, is funnelled through one channel and committed here
//! under the ledger lock, then the resulting event is persisted.

use std::sync::Arc;

use qf_settlement::{Plaintext, RequestId, RevealedProject};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::Result;
use crate::state::AppState;

pub struct CallbackEnvelope {
    pub request_id: RequestId,
    pub payload: Vec<Plaintext>,
    pub proof: Vec<u8>,
    /// Set when an HTTP caller is waiting for the outcome.
    pub reply: Option<oneshot::Sender<Result<RevealedProject>>>,
}

pub async fn run(
    state: Arc<AppState>,
    mut callbacks: mpsc::Receiver<CallbackEnvelope>,
    cancel: CancellationToken,
) {
    info!("Callback handler started");

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = callbacks.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let outcome = handle(&state, &envelope.request_id, &envelope.payload, &envelope.proof).await;
        if let Err(e) = &outcome {
            warn!(request_id = %envelope.request_id, "Callback rejected: {e}");
        }
        if let Some(reply) = envelope.reply {
            // The HTTP caller may have gone away; the commit stands regardless.
            let _ = reply.send(outcome);
        }
    }

    info!("Callback handler stopped");
}

/// Commit one callback and persist the resulting event.
pub async fn handle(
    state: &AppState,
    request_id: &RequestId,
    payload: &[Plaintext],
    proof: &[u8],
) -> Result<RevealedProject> {
    let mut guard = state.ledger().await;
    let request = guard
        .ledger
        .pending_requests()
        .into_iter()
        .find(|r| r.request_id == *request_id);
    let revealed = guard
        .ledger
        .on_decryption_callback(request_id, payload, proof)?;

    if let Err(e) = guard.persist(&state.pool).await {
        // The reveal was rolled back; keep the request open for a redelivery.
        if let Some(request) = request {
            if let Err(restore) = guard.ledger.restore_request(request) {
                warn!(%request_id, "Cannot reopen request: {restore}");
            }
        }
        return Err(e);
    }

    info!(project_id = %revealed.project_id, %request_id, "project revealed");
    Ok(revealed)
}
