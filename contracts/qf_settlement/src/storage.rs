//! # Storage
//!
//! The ciphertext store: a keyed record map with typed helpers on top.
//!
//! ## Keys
//!
//! | Key                       | Record                | Description                          |
//! |---------------------------|-----------------------|--------------------------------------|
//! | `ProjectCount`            | `Counter`             | Auto-increment project ID counter    |
//! | `Project(id)`             | `Project`             | Encrypted project record             |
//! | `ContributionCount(id)`   | `Counter`             | Length of the contribution log       |
//! | `Contribution(id, i)`     | `Contribution`        | i-th contribution to project `id`    |
//! | `ProjectSqrtSum(id)`      | `Ciphertext`          | Σ sqrt(amount) over the project      |
//! | `ContributorSqrtSum(a)`   | `Ciphertext`          | Σ sqrt(amount) over everything `a` funded |
//! | `Revealed(id)`            | `Revealed`            | Plaintext mirror, written once       |
//! | `Request(rid)`            | `Request`             | Oracle correlation record            |
//! | `PendingRequest(id)`      | `RequestRef`          | Outstanding request for a project    |
//!
//! The store performs no validation beyond existence checks. Reading an
//! unknown key yields [`StoreError::NotFound`]; the typed helpers translate
//! that into the matching domain error.

use std::collections::BTreeMap;

use crate::types::{
    ActorId, Ciphertext, Contribution, DecryptionRequest, Page, Project, ProjectId, RequestId,
    RevealedProject,
};
use crate::Error;

// ── Storage Keys ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum DataKey {
    ProjectCount,
    Project(ProjectId),
    ContributionCount(ProjectId),
    Contribution(ProjectId, u32),
    ProjectSqrtSum(ProjectId),
    ContributorSqrtSum(ActorId),
    Revealed(ProjectId),
    Request(RequestId),
    PendingRequest(ProjectId),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Record {
    Counter(u64),
    Project(Project),
    Contribution(Contribution),
    Ciphertext(Ciphertext),
    Revealed(RevealedProject),
    Request(DecryptionRequest),
    RequestRef(RequestId),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no record under {0:?}")]
    NotFound(DataKey),

    #[error("record under {0:?} has an unexpected type")]
    Corrupt(DataKey),
}

/// Keyed record storage. Writes are visible to every subsequent read.
#[derive(Clone, Debug, Default)]
pub struct CiphertextStore {
    entries: BTreeMap<DataKey, Record>,
}

impl CiphertextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: DataKey, record: Record) {
        self.entries.insert(key, record);
    }

    pub fn get(&self, key: &DataKey) -> Result<&Record, StoreError> {
        self.entries
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    pub fn contains(&self, key: &DataKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &DataKey) -> Option<Record> {
        self.entries.remove(key)
    }
}

// ── Counters ─────────────────────────────────────────────────────────

fn load_counter(store: &CiphertextStore, key: DataKey) -> Result<u64, StoreError> {
    match store.get(&key) {
        Ok(Record::Counter(n)) => Ok(*n),
        Ok(_) => Err(StoreError::Corrupt(key)),
        Err(StoreError::NotFound(_)) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Reads, increments, and stores the project counter.
/// Returns the ID to use for the *current* project (pre-increment value).
pub fn get_and_increment_project_id(store: &mut CiphertextStore) -> Result<ProjectId, Error> {
    let current = load_counter(store, DataKey::ProjectCount)?;
    store.put(DataKey::ProjectCount, Record::Counter(current + 1));
    Ok(ProjectId(current))
}

pub fn project_count(store: &CiphertextStore) -> Result<u64, Error> {
    Ok(load_counter(store, DataKey::ProjectCount)?)
}

// ── Projects ─────────────────────────────────────────────────────────

pub fn save_project(store: &mut CiphertextStore, project: &Project) {
    store.put(DataKey::Project(project.id), Record::Project(project.clone()));
}

/// Load a project, mapping a missing record to [`Error::ProjectNotFound`].
pub fn load_project(store: &CiphertextStore, id: ProjectId) -> Result<Project, Error> {
    let key = DataKey::Project(id);
    match store.get(&key) {
        Ok(Record::Project(p)) => Ok(p.clone()),
        Ok(_) => Err(StoreError::Corrupt(key).into()),
        Err(StoreError::NotFound(_)) => Err(Error::ProjectNotFound),
        Err(e) => Err(e.into()),
    }
}

// ── Contribution log ─────────────────────────────────────────────────

pub fn contribution_count(store: &CiphertextStore, id: ProjectId) -> Result<u32, Error> {
    let key = DataKey::ContributionCount(id);
    let n = load_counter(store, key.clone())?;
    Ok(u32::try_from(n).map_err(|_| StoreError::Corrupt(key))?)
}

/// Append a contribution at the next free index and return that index.
pub fn append_contribution(
    store: &mut CiphertextStore,
    mut contribution: Contribution,
) -> Result<u32, Error> {
    let id = contribution.project_id;
    let index = contribution_count(store, id)?;
    contribution.index = index;
    store.put(
        DataKey::Contribution(id, index),
        Record::Contribution(contribution),
    );
    store.put(
        DataKey::ContributionCount(id),
        Record::Counter(u64::from(index) + 1),
    );
    Ok(index)
}

/// Read up to `limit` contributions starting at `offset`.
pub fn load_contributions(
    store: &CiphertextStore,
    id: ProjectId,
    offset: u32,
    limit: u32,
) -> Result<Page<Contribution>, Error> {
    let total = contribution_count(store, id)?;
    let end = offset.saturating_add(limit).min(total);
    let mut items = Vec::with_capacity(end.saturating_sub(offset) as usize);
    for index in offset..end {
        let key = DataKey::Contribution(id, index);
        match store.get(&key)? {
            Record::Contribution(c) => items.push(c.clone()),
            _ => return Err(StoreError::Corrupt(key).into()),
        }
    }
    Ok(Page {
        items,
        offset,
        total,
    })
}

// ── Accumulator slots ────────────────────────────────────────────────

/// Load an accumulator slot. `None` means the slot was never initialised.
pub fn load_ciphertext(store: &CiphertextStore, key: &DataKey) -> Result<Option<Ciphertext>, Error> {
    match store.get(key) {
        Ok(Record::Ciphertext(c)) => Ok(Some(c.clone())),
        Ok(_) => Err(StoreError::Corrupt(key.clone()).into()),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_ciphertext(store: &mut CiphertextStore, key: DataKey, value: Ciphertext) {
    store.put(key, Record::Ciphertext(value));
}

// ── Reveal mirror ────────────────────────────────────────────────────

pub fn load_revealed(store: &CiphertextStore, id: ProjectId) -> Result<RevealedProject, Error> {
    let key = DataKey::Revealed(id);
    match store.get(&key) {
        Ok(Record::Revealed(r)) => Ok(r.clone()),
        Ok(_) => Err(StoreError::Corrupt(key).into()),
        Err(StoreError::NotFound(_)) => Err(Error::ProjectNotFound),
        Err(e) => Err(e.into()),
    }
}

pub fn save_revealed(store: &mut CiphertextStore, revealed: &RevealedProject) {
    store.put(
        DataKey::Revealed(revealed.project_id),
        Record::Revealed(revealed.clone()),
    );
}

// ── Decryption requests ──────────────────────────────────────────────

/// Record a request and mark it as the project's outstanding one.
pub fn save_request(store: &mut CiphertextStore, request: &DecryptionRequest) {
    store.put(
        DataKey::PendingRequest(request.project_id),
        Record::RequestRef(request.request_id),
    );
    store.put(
        DataKey::Request(request.request_id),
        Record::Request(request.clone()),
    );
}

/// Resolve a request id. Unknown or consumed ids are [`Error::UnknownRequest`].
pub fn load_request(store: &CiphertextStore, id: &RequestId) -> Result<DecryptionRequest, Error> {
    let key = DataKey::Request(*id);
    match store.get(&key) {
        Ok(Record::Request(r)) => Ok(r.clone()),
        Ok(_) => Err(StoreError::Corrupt(key).into()),
        Err(StoreError::NotFound(_)) => Err(Error::UnknownRequest),
        Err(e) => Err(e.into()),
    }
}

pub fn pending_request(
    store: &CiphertextStore,
    project: ProjectId,
) -> Result<Option<DecryptionRequest>, Error> {
    let key = DataKey::PendingRequest(project);
    match store.get(&key) {
        Ok(Record::RequestRef(rid)) => load_request(store, rid).map(Some),
        Ok(_) => Err(StoreError::Corrupt(key).into()),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete both the correlation record and the project's pending marker.
pub fn consume_request(store: &mut CiphertextStore, request: &DecryptionRequest) {
    store.remove(&DataKey::Request(request.request_id));
    store.remove(&DataKey::PendingRequest(request.project_id));
}

/// All outstanding requests, in request-id order.
pub fn outstanding_requests(store: &CiphertextStore) -> Vec<DecryptionRequest> {
    store
        .entries
        .values()
        .filter_map(|r| match r {
            Record::Request(req) => Some(req.clone()),
            _ => None,
        })
        .collect()
}
