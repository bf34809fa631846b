//! Decryption oracle plumbing.
//!
//! The ledger talks to the oracle synchronously through [`ChannelOracle`],
//! which mints request ids and queues a [`DecryptionJob`] per request. A background
//! task drains the queue:
//!
//! * [`run_local`] decrypts with the transparent development engine, signs the
//!   result and hands it straight to the callback handler.
//! * [`run_gateway`] forwards each job to an external threshold-decryption
//!   gateway, which later answers on `POST /oracle/callback`.
//!
//! ## Resilience
//!
//! Gateway submissions are retried with exponential back-off, up to
//! [`MAX_BACKOFF_SECS`] seconds, on network errors, rate limiting and 5xx
//! responses. A job the gateway rejects outright is dropped; the ledger keeps
//! the request pending until it expires.

use std::time::Duration;

use qf_settlement::testutils::TransparentEngine;
use qf_settlement::{Ciphertext, DecryptionOracle, OracleError, Plaintext, RequestId};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attest::AttestationKey;
use crate::callback::CallbackEnvelope;

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;
const GATEWAY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct DecryptionJob {
    pub request_id: RequestId,
    pub handles: Vec<Ciphertext>,
}

/// [`DecryptionOracle`] that queues jobs for a background task and checks
/// proofs against the shared [`AttestationKey`].
pub struct ChannelOracle {
    jobs: mpsc::UnboundedSender<DecryptionJob>,
    key: AttestationKey,
}

impl ChannelOracle {
    pub fn new(jobs: mpsc::UnboundedSender<DecryptionJob>, key: AttestationKey) -> Self {
        Self { jobs, key }
    }
}

impl DecryptionOracle for ChannelOracle {
    fn issue_request_id(&mut self) -> RequestId {
        RequestId(rand::random())
    }

    fn request_decryption(&mut self, request_id: &RequestId, handles: &[Ciphertext]) -> Result<(), OracleError> {
        self.jobs
            .send(DecryptionJob {
                request_id: *request_id,
                handles: handles.to_vec(),
            })
            .map_err(|_| OracleError::new("decryption queue is closed"))?;
        debug!(%request_id, handles = handles.len(), "decryption job queued");
        Ok(())
    }

    fn verify_proof(&self, request_id: &RequestId, payload: &[Plaintext], proof: &[u8]) -> bool {
        self.key.verify(request_id, payload, proof)
    }
}

// ─────────────────────────────────────────────────────────
// Local oracle
// ─────────────────────────────────────────────────────────

pub async fn run_local(
    mut jobs: mpsc::UnboundedReceiver<DecryptionJob>,
    key: AttestationKey,
    callbacks: mpsc::Sender<CallbackEnvelope>,
    cancel: CancellationToken,
) {
    info!("Local decryption oracle started");
    let engine = TransparentEngine::new();

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let payload = match job
            .handles
            .iter()
            .map(|h| engine.decrypt(h))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(request_id = %job.request_id, "Cannot decrypt batch: {e}");
                continue;
            }
        };

        let proof = key.sign(&job.request_id, &payload);
        let envelope = CallbackEnvelope {
            request_id: job.request_id,
            payload,
            proof,
            reply: None,
        };
        if callbacks.send(envelope).await.is_err() {
            warn!("Callback handler is gone, stopping local oracle");
            break;
        }
    }

    info!("Local decryption oracle stopped");
}

// ─────────────────────────────────────────────────────────
// Gateway oracle
// ─────────────────────────────────────────────────────────

/// HTTP client used to reach the gateway.
pub fn gateway_client() -> crate::errors::Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
        .build()?)
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    request_id: RequestId,
    handles: &'a [Ciphertext],
    callback_url: &'a str,
}

pub async fn run_gateway(
    mut jobs: mpsc::UnboundedReceiver<DecryptionJob>,
    client: Client,
    gateway_url: String,
    callback_url: String,
    cancel: CancellationToken,
) {
    info!("Gateway decryption oracle started (gateway: {gateway_url})");

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = submit(&client, &gateway_url, &callback_url, &job) => {}
        }
    }

    info!("Gateway decryption oracle stopped");
}

/// Deliver one job to the gateway, retrying transient failures.
async fn submit(client: &Client, gateway_url: &str, callback_url: &str, job: &DecryptionJob) {
    let body = GatewayRequest {
        request_id: job.request_id,
        handles: &job.handles,
        callback_url,
    };
    let mut backoff = INITIAL_BACKOFF_SECS;

    loop {
        match client.post(gateway_url).json(&body).send().await {
            Err(e) => {
                warn!("Gateway request failed (will retry in {backoff}s): {e}");
            }
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(request_id = %job.request_id, "decryption job accepted by gateway");
                    return;
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    warn!("Rate-limited by gateway (will retry in {backoff}s)");
                } else if status.is_server_error() {
                    warn!("Gateway returned {status} (will retry in {backoff}s)");
                } else {
                    error!(request_id = %job.request_id, "Gateway rejected job with {status}");
                    return;
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
    }
}
