//! # Homomorphic accumulator
//!
//! Wraps an [`FheEngine`] and maintains the running encrypted sums:
//!
//! - the project's total contribution (`Project::total_contributed`),
//! - the project's Σ sqrt(amount) (`DataKey::ProjectSqrtSum`),
//! - each contributor's Σ sqrt(amount) across every project they fund
//!   (`DataKey::ContributorSqrtSum`).
//!
//! Every update is an `add` onto the previous value; nothing is ever
//! replaced or corrected, so all three sums are monotonic.

use tracing::debug;

use crate::engine::FheEngine;
use crate::storage::{self, CiphertextStore, DataKey};
use crate::types::{ActorId, Ciphertext, Project};
use crate::Error;

pub struct HomomorphicAccumulator<'a, E: FheEngine> {
    engine: &'a E,
}

/// The three ciphertexts a single contribution produces, computed before
/// anything is written.
struct Update {
    total: Ciphertext,
    project_sqrt: Ciphertext,
    contributor_sqrt: Ciphertext,
}

impl<'a, E: FheEngine> HomomorphicAccumulator<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    pub fn zero(&self) -> Result<Ciphertext, Error> {
        Ok(self.engine.encrypt_zero()?)
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, Error> {
        Ok(self.engine.add(a, b)?)
    }

    pub fn sqrt_approx(&self, a: &Ciphertext) -> Result<Ciphertext, Error> {
        Ok(self.engine.sqrt_approx(a)?)
    }

    pub fn square(&self, a: &Ciphertext) -> Result<Ciphertext, Error> {
        Ok(self.engine.square(a)?)
    }

    /// Add `delta` onto an accumulator slot.
    ///
    /// An uninitialised slot is an error, never an implicit zero.
    pub fn accumulate(&self, slot: Option<&Ciphertext>, delta: &Ciphertext) -> Result<Ciphertext, Error> {
        let current = slot.ok_or(Error::UninitializedAccumulator)?;
        self.add(current, delta)
    }

    /// Fold one contribution into all three running sums.
    ///
    /// All engine calls happen before the first write, so a failing engine
    /// leaves every accumulator untouched.
    pub fn record_contribution(
        &self,
        store: &mut CiphertextStore,
        project: &mut Project,
        contributor: &ActorId,
        amount: &Ciphertext,
    ) -> Result<(), Error> {
        let project_key = DataKey::ProjectSqrtSum(project.id);
        let contributor_key = DataKey::ContributorSqrtSum(contributor.clone());

        let update = {
            let root = self.sqrt_approx(amount)?;
            let project_sqrt = storage::load_ciphertext(store, &project_key)?;
            // A first-time contributor starts from an explicit zero.
            let contributor_sqrt = match storage::load_ciphertext(store, &contributor_key)? {
                Some(sum) => sum,
                None => {
                    debug!(%contributor, "initialising contributor accumulator");
                    self.zero()?
                }
            };
            Update {
                total: self.add(&project.total_contributed, amount)?,
                project_sqrt: self.accumulate(project_sqrt.as_ref(), &root)?,
                contributor_sqrt: self.accumulate(Some(&contributor_sqrt), &root)?,
            }
        };

        project.total_contributed = update.total;
        storage::save_ciphertext(store, project_key, update.project_sqrt);
        storage::save_ciphertext(store, contributor_key, update.contributor_sqrt);
        storage::save_project(store, project);
        Ok(())
    }
}
