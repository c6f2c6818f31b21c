//! Abstraction planner: identical tree search to
//! [`crate::pouct::PoUctPlanner`], applied to a belief whose particles are
//! [`bap_belief::AbstractFbapState`] rather than the full [`bap_belief::FbapState`].
//! The reduced feature set that bounds which counts update lives entirely
//! in the particle type the caller's belief samples; this planner adds no
//! logic of its own beyond naming that pairing, so it is a thin wrapper
//! rather than a parallel tree-search implementation.

use bap_core::Index;
use bap_model::domain::IndexedDomain;
use bap_model::Kernel;

use bap_belief::{Augmented, Belief};

use crate::pouct::PoUctPlanner;

pub struct AbstractionPlanner {
    inner: PoUctPlanner,
}

impl AbstractionPlanner {
    pub fn new(inner: PoUctPlanner) -> Self {
        Self { inner }
    }

    pub fn select_action<D, Bel>(&self, domain: &D, belief: &Bel, history_len: usize, rng: &mut Kernel) -> (Index, usize)
    where
        D: IndexedDomain,
        Bel: Belief<D>,
        Bel::Particle: Augmented<Domain = D>,
    {
        self.inner.select_action(domain, belief, history_len, rng)
    }
}
