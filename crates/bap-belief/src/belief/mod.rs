//! Belief strategies: the nine concrete particle-filter-backed ways of
//! tracking a posterior over augmented states, one file per strategy,
//! behind the shared [`Belief`] trait.
//!
//! Rust's ownership discipline collapses a construct/free lifecycle to a
//! plain constructor plus `Drop`: there is no separate "free" step to
//! implement, a strategy's particles are dropped automatically when it
//! goes out of scope (see `DESIGN.md`'s Open Question resolution).

use bap_core::{EngineError, Index};
use bap_model::Kernel;
use bap_model::domain::IndexedDomain;

use crate::augmented::Augmented;

/// Shared contract over every belief-update strategy.
pub trait Belief<D: IndexedDomain> {
    /// The augmented-state representation this strategy's particles hold.
    type Particle: Augmented<Domain = D>;

    /// Draws one particle from the current belief, e.g. to seed one PO-UCT
    /// simulation.
    fn sample(&self, rng: &mut Kernel) -> Self::Particle;

    /// Folds one real `(action, observation)` transition into the belief.
    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError>;

    /// Redraws every particle's domain-state component from `domain`'s
    /// start distribution, keeping learned counts.
    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel);

    /// Number of particles currently tracked — the invariant that the
    /// particle set size equals `particle_amount` after any update is
    /// checked against this.
    fn particle_count(&self) -> usize;
}

pub mod cheating;
pub mod incubator;
pub mod importance;
pub mod mh_gibbs;
pub mod mh_nips;
pub mod nested;
pub mod point_estimate;
pub mod reinvigoration;
pub mod rejection;

pub use cheating::CheatingReinvigorationBelief;
pub use importance::ImportanceSamplingBelief;
pub use incubator::IncubatorBelief;
pub use mh_gibbs::MhWithinGibbsBelief;
pub use mh_nips::MhNipsBelief;
pub use nested::NestedBelief;
pub use point_estimate::PointEstimateBelief;
pub use reinvigoration::ReinvigorationBelief;
pub use rejection::RejectionSamplingBelief;

/// Shared cap on rejection-sampling attempts per slot before a belief
/// signals [`EngineError::BeliefDegenerate`]: a domain/prior combination
/// that never reproduces the observed observation within this many tries
/// is treated as a degenerate belief rather than looped forever.
pub(crate) const MAX_REJECTION_ATTEMPTS: usize = 10_000;
