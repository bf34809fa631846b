//! # QF Settlement
//!
//! Encrypted contribution ledger and quadratic-funding settlement engine.
//! [`Ledger`] exposes the entry points covering the full project lifecycle:
//!
//! | Phase        | Entry Point(s)                                   |
//! |--------------|--------------------------------------------------|
//! | Registration | [`Ledger::submit_project`]                       |
//! | Funding      | [`Ledger::contribute`], [`Ledger::close_project`] |
//! | Settlement   | [`Ledger::get_matching`]                         |
//! | Reveal       | [`Ledger::request_reveal`], [`Ledger::on_decryption_callback`] |
//! | Queries      | `get_project`, `get_revealed`, `reveal_state`, `contributions` |
//! | Recovery     | [`Ledger::replay`], [`Ledger::rewind`], [`Ledger::expire_stale_requests`] |
//!
//! ## Architecture
//!
//! Authorization and lifecycle checks are delegated to [`gate`]. Storage
//! access is delegated to [`storage`]. Homomorphic arithmetic goes through
//! [`accumulator`] to the injected [`FheEngine`]; the two-phase reveal lives
//! in [`reveal`]. This file contains the entry points and event emission.
//!
//! Each entry point runs to completion before the next one is observed. Every
//! check happens before the first write, so a rejected call leaves the
//! ledger unchanged.

use thiserror::Error;
use tracing::{debug, info};

pub mod accumulator;
pub mod engine;
pub mod events;
pub mod gate;
pub mod quadratic;
pub mod reveal;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_lifecycle;
#[cfg(test)]
mod test_matching;
#[cfg(test)]
mod test_reveal;

use accumulator::HomomorphicAccumulator;
use storage::{CiphertextStore, DataKey};

pub use engine::{DecryptionOracle, EngineError, FheEngine, OracleError};
pub use events::{EventKind, LedgerEvent};
pub use gate::{AccessPolicy, Action, SubmitterPolicy};
pub use storage::StoreError;
pub use types::{
    ActorId, Ciphertext, Contribution, DecryptionRequest, Page, Plaintext, Project, ProjectId,
    RequestId, RevealState, RevealedFields, RevealedProject,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("project not found")]
    ProjectNotFound,

    #[error("project is not accepting contributions")]
    InactiveProject,

    #[error("project is already closed")]
    AlreadyInactive,

    #[error("caller is not authorized for this action")]
    NotAuthorized,

    #[error("project has already been revealed")]
    AlreadyRevealed,

    #[error("a reveal request is already pending for this project")]
    RequestAlreadyPending,

    #[error("unknown or already consumed decryption request")]
    UnknownRequest,

    #[error("decryption proof verification failed")]
    ProofVerificationFailed,

    #[error("decryption payload does not match the requested fields")]
    MalformedPayload,

    #[error("funding period is still active")]
    FundingStillActive,

    #[error("accumulator used before initialisation")]
    UninitializedAccumulator,

    #[error("event log does not replay cleanly: {0}")]
    ReplayMismatch(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification of [`Error`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller lacks the capability; nothing was mutated.
    Authorization,
    NotFound,
    /// Operation is illegal in the project's current state.
    Lifecycle,
    /// Unknown or consumed request id.
    Correlation,
    /// Proof or payload rejected; the request stays pending.
    Integrity,
    /// Engine, oracle or store failure.
    Backend,
}

impl Error {
    /// Stable numeric code.
    pub fn code(&self) -> u32 {
        match self {
            Self::ProjectNotFound => 1,
            Self::InactiveProject => 2,
            Self::AlreadyInactive => 3,
            Self::NotAuthorized => 4,
            Self::AlreadyRevealed => 5,
            Self::RequestAlreadyPending => 6,
            Self::UnknownRequest => 7,
            Self::ProofVerificationFailed => 8,
            Self::MalformedPayload => 9,
            Self::FundingStillActive => 10,
            Self::UninitializedAccumulator => 11,
            Self::ReplayMismatch(_) => 12,
            Self::Engine(_) => 13,
            Self::Oracle(_) => 14,
            Self::Store(_) => 15,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAuthorized => ErrorCategory::Authorization,
            Self::ProjectNotFound => ErrorCategory::NotFound,
            Self::InactiveProject
            | Self::AlreadyInactive
            | Self::AlreadyRevealed
            | Self::RequestAlreadyPending
            | Self::FundingStillActive => ErrorCategory::Lifecycle,
            Self::UnknownRequest => ErrorCategory::Correlation,
            Self::ProofVerificationFailed | Self::MalformedPayload => ErrorCategory::Integrity,
            Self::UninitializedAccumulator
            | Self::ReplayMismatch(_)
            | Self::Engine(_)
            | Self::Oracle(_)
            | Self::Store(_) => ErrorCategory::Backend,
        }
    }
}

/// The settlement ledger.
///
/// Owns the ciphertext store and the event log; the engine, oracle and
/// access policy are injected. Ledger time is supplied by the host through
/// [`Ledger::set_timestamp`].
pub struct Ledger<E, O, P = SubmitterPolicy> {
    store: CiphertextStore,
    engine: E,
    oracle: O,
    policy: P,
    events: Vec<LedgerEvent>,
    timestamp: u64,
}

impl<E, O, P> Ledger<E, O, P>
where
    E: FheEngine,
    O: DecryptionOracle,
    P: AccessPolicy,
{
    pub fn new(engine: E, oracle: O, policy: P) -> Self {
        Self {
            store: CiphertextStore::new(),
            engine,
            oracle,
            policy,
            events: Vec::new(),
            timestamp: 0,
        }
    }

    /// Rebuild a ledger from its event log.
    ///
    /// Accumulators are recomputed through `engine`. Reveal requests are not
    /// logged, so a project that was pending comes back `Hidden`.
    pub fn replay<'a, I>(engine: E, oracle: O, policy: P, events: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a LedgerEvent>,
    {
        let mut ledger = Self::new(engine, oracle, policy);
        ledger.apply_all(events)?;
        info!(events = ledger.events.len(), "ledger replayed");
        Ok(ledger)
    }

    /// Discard every event after the first `len` and rebuild state from the
    /// rest, as if the discarded operations had never been called.
    ///
    /// Outstanding reveal requests survive for projects that are still
    /// unrevealed afterwards. Ledger time is left where it was.
    pub fn rewind(&mut self, len: usize) -> Result<(), Error> {
        if len >= self.events.len() {
            return Ok(());
        }
        let pending = self.pending_requests();
        let timestamp = self.timestamp;
        let mut log = std::mem::take(&mut self.events);
        log.truncate(len);

        self.store = CiphertextStore::new();
        self.apply_all(&log)?;
        self.timestamp = timestamp;

        for request in pending {
            if let Err(e) = self.restore_request(request) {
                debug!("pending request dropped on rewind: {e}");
            }
        }
        info!(events = self.events.len(), "ledger rewound");
        Ok(())
    }

    fn apply_all<'a, I>(&mut self, events: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'a LedgerEvent>,
    {
        for (seq, event) in events.into_iter().enumerate() {
            self.set_timestamp(event.timestamp());
            self.apply(event)
                .map_err(|e| Error::ReplayMismatch(format!("event {seq}: {e}")))?;
        }
        Ok(())
    }

    fn apply(&mut self, event: &LedgerEvent) -> Result<(), Error> {
        match event.clone() {
            LedgerEvent::ProjectSubmitted {
                project_id,
                submitter,
                title,
                description,
                location,
                budget,
                ..
            } => {
                let project = self.submit_project(submitter, title, description, location, budget)?;
                if project.id != project_id {
                    return Err(Error::ReplayMismatch(format!(
                        "expected project {project_id}, assigned {}",
                        project.id
                    )));
                }
            }
            LedgerEvent::ContributionMade {
                project_id,
                index,
                contributor,
                amount,
                ..
            } => {
                let assigned = self.contribute(contributor, project_id, amount)?;
                if assigned != index {
                    return Err(Error::ReplayMismatch(format!(
                        "expected contribution {index}, assigned {assigned}"
                    )));
                }
            }
            LedgerEvent::FundingCompleted {
                project_id,
                closed_by,
                ..
            } => {
                let mut project = storage::load_project(&self.store, project_id)?;
                self.commit_close(&mut project, closed_by)?;
            }
            LedgerEvent::ProjectRevealed {
                project_id, fields, ..
            } => {
                let revealed = storage::load_revealed(&self.store, project_id)?;
                if revealed.revealed {
                    return Err(Error::AlreadyRevealed);
                }
                self.commit_reveal(project_id, fields);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Host environment
    // ─────────────────────────────────────────────────────────

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    // ─────────────────────────────────────────────────────────
    // Entry points
    // ─────────────────────────────────────────────────────────

    /// Register a new project from four pre-encrypted fields.
    pub fn submit_project(
        &mut self,
        submitter: ActorId,
        title: Ciphertext,
        description: Ciphertext,
        location: Ciphertext,
        budget: Ciphertext,
    ) -> Result<Project, Error> {
        let accumulator = HomomorphicAccumulator::new(&self.engine);
        let total = accumulator.zero()?;
        let sqrt_sum = accumulator.zero()?;

        let id = storage::get_and_increment_project_id(&mut self.store)?;
        let project = Project {
            id,
            submitter,
            title,
            description,
            location,
            budget,
            total_contributed: total,
            created_at: self.timestamp,
            active: true,
        };

        storage::save_project(&mut self.store, &project);
        storage::save_ciphertext(&mut self.store, DataKey::ProjectSqrtSum(id), sqrt_sum);
        storage::save_revealed(&mut self.store, &RevealedProject::unrevealed(id));

        info!(project_id = %id, submitter = %project.submitter, "project submitted");
        self.emit(LedgerEvent::ProjectSubmitted {
            project_id: id,
            submitter: project.submitter.clone(),
            title: project.title.clone(),
            description: project.description.clone(),
            location: project.location.clone(),
            budget: project.budget.clone(),
            timestamp: self.timestamp,
        });
        Ok(project)
    }

    /// Record an encrypted contribution and fold it into the accumulators.
    ///
    /// Returns the contribution's index in the project's log.
    pub fn contribute(
        &mut self,
        contributor: ActorId,
        project_id: ProjectId,
        amount: Ciphertext,
    ) -> Result<u32, Error> {
        let mut project = storage::load_project(&self.store, project_id)?;
        gate::require_open(&project)?;

        HomomorphicAccumulator::new(&self.engine).record_contribution(
            &mut self.store,
            &mut project,
            &contributor,
            &amount,
        )?;

        let index = storage::append_contribution(
            &mut self.store,
            Contribution {
                project_id,
                index: 0,
                contributor: contributor.clone(),
                amount: amount.clone(),
                timestamp: self.timestamp,
            },
        )?;

        info!(%project_id, %contributor, index, "contribution recorded");
        self.emit(LedgerEvent::ContributionMade {
            project_id,
            index,
            contributor,
            amount,
            timestamp: self.timestamp,
        });
        Ok(index)
    }

    /// End the funding period.
    pub fn close_project(&mut self, actor: &ActorId, project_id: ProjectId) -> Result<(), Error> {
        let mut project = storage::load_project(&self.store, project_id)?;
        gate::require_authorized(&self.policy, actor, Action::Close, &project)?;
        self.commit_close(&mut project, actor.clone())
    }

    fn commit_close(&mut self, project: &mut Project, closed_by: ActorId) -> Result<(), Error> {
        if !project.active {
            return Err(Error::AlreadyInactive);
        }
        project.active = false;
        storage::save_project(&mut self.store, project);

        info!(project_id = %project.id, %closed_by, "funding completed");
        self.emit(LedgerEvent::FundingCompleted {
            project_id: project.id,
            closed_by,
            timestamp: self.timestamp,
        });
        Ok(())
    }

    /// Ask the oracle to decrypt the project's fields. Emits nothing; the
    /// reveal is committed by [`Ledger::on_decryption_callback`].
    pub fn request_reveal(&mut self, actor: &ActorId, project_id: ProjectId) -> Result<RequestId, Error> {
        reveal::request_reveal(
            &mut self.store,
            &mut self.oracle,
            &self.policy,
            actor,
            project_id,
            self.timestamp,
        )
    }

    /// Put back a reveal request that was issued earlier, without asking the
    /// oracle again. The project must exist and be `Hidden`.
    pub fn restore_request(&mut self, request: DecryptionRequest) -> Result<(), Error> {
        match reveal::reveal_state(&self.store, request.project_id)? {
            RevealState::Hidden => {}
            RevealState::RequestPending { .. } => return Err(Error::RequestAlreadyPending),
            RevealState::Revealed => return Err(Error::AlreadyRevealed),
        }
        storage::save_request(&mut self.store, &request);
        Ok(())
    }

    /// Commit a decryption callback delivered by the oracle.
    pub fn on_decryption_callback(
        &mut self,
        request_id: &RequestId,
        payload: &[Plaintext],
        proof: &[u8],
    ) -> Result<RevealedProject, Error> {
        let (project_id, fields) = reveal::on_decryption_callback(
            &mut self.store,
            &self.oracle,
            request_id,
            payload,
            proof,
            self.timestamp,
        )?;
        self.emit(LedgerEvent::ProjectRevealed {
            project_id,
            fields,
            timestamp: self.timestamp,
        });
        storage::load_revealed(&self.store, project_id)
    }

    fn commit_reveal(&mut self, project_id: ProjectId, fields: RevealedFields) {
        storage::save_revealed(
            &mut self.store,
            &RevealedProject {
                project_id,
                fields: Some(fields.clone()),
                revealed: true,
                revealed_at: Some(self.timestamp),
            },
        );
        self.emit(LedgerEvent::ProjectRevealed {
            project_id,
            fields,
            timestamp: self.timestamp,
        });
    }

    /// Encrypted quadratic-funding matching score of a closed project.
    pub fn get_matching(&self, project_id: ProjectId) -> Result<Ciphertext, Error> {
        quadratic::matching(
            &self.store,
            &HomomorphicAccumulator::new(&self.engine),
            project_id,
        )
    }

    /// Drop reveal requests older than `timeout` seconds.
    pub fn expire_stale_requests(&mut self, timeout: u64) -> Vec<DecryptionRequest> {
        reveal::expire_stale_requests(&mut self.store, self.timestamp, timeout)
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn get_project(&self, project_id: ProjectId) -> Result<Project, Error> {
        storage::load_project(&self.store, project_id)
    }

    pub fn get_revealed(&self, project_id: ProjectId) -> Result<RevealedProject, Error> {
        storage::load_revealed(&self.store, project_id)
    }

    pub fn reveal_state(&self, project_id: ProjectId) -> Result<RevealState, Error> {
        reveal::reveal_state(&self.store, project_id)
    }

    pub fn contributions(
        &self,
        project_id: ProjectId,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Contribution>, Error> {
        storage::load_project(&self.store, project_id)?;
        storage::load_contributions(&self.store, project_id, offset, limit)
    }

    pub fn project_sqrt_sum(&self, project_id: ProjectId) -> Result<Ciphertext, Error> {
        storage::load_project(&self.store, project_id)?;
        storage::load_ciphertext(&self.store, &DataKey::ProjectSqrtSum(project_id))?
            .ok_or(Error::UninitializedAccumulator)
    }

    pub fn contributor_sqrt_sum(&self, contributor: &ActorId) -> Result<Option<Ciphertext>, Error> {
        quadratic::contributor_sqrt_sum(&self.store, contributor)
    }

    pub fn pending_requests(&self) -> Vec<DecryptionRequest> {
        storage::outstanding_requests(&self.store)
    }

    pub fn project_count(&self) -> Result<u64, Error> {
        storage::project_count(&self.store)
    }

    /// The full event log, oldest first.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }
}
