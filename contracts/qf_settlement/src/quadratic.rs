//! Quadratic-funding matching over ciphertexts.
//!
//! `matching = (Σ sqrt(contribution))²`, evaluated on the project's
//! encrypted sqrt-sum. Only defined once the funding period is closed.

use tracing::debug;

use crate::accumulator::HomomorphicAccumulator;
use crate::engine::FheEngine;
use crate::gate;
use crate::storage::{self, CiphertextStore, DataKey};
use crate::types::{ActorId, Ciphertext, ProjectId};
use crate::Error;

/// Encrypted matching score for a closed project.
pub fn matching<E: FheEngine>(
    store: &CiphertextStore,
    accumulator: &HomomorphicAccumulator<'_, E>,
    id: ProjectId,
) -> Result<Ciphertext, Error> {
    let project = storage::load_project(store, id)?;
    gate::require_closed(&project)?;

    let sqrt_sum = storage::load_ciphertext(store, &DataKey::ProjectSqrtSum(id))?
        .ok_or(Error::UninitializedAccumulator)?;
    debug!(project_id = %id, "computing encrypted matching score");
    accumulator.square(&sqrt_sum)
}

/// Encrypted Σ sqrt(amount) over everything `contributor` has funded.
///
/// `None` if the contributor has never contributed.
pub fn contributor_sqrt_sum(
    store: &CiphertextStore,
    contributor: &ActorId,
) -> Result<Option<Ciphertext>, Error> {
    storage::load_ciphertext(store, &DataKey::ContributorSqrtSum(contributor.clone()))
}
