//! Reinvigoration belief: two flat filters — a "main" filter
//! whose structures evolve by mutation, and a "fully-connected" filter used
//! purely as a counts donor for the [`crate::breed::breed`] operator. Each
//! real step breeds `resample_amount` fresh particles into both filters,
//! then rejection-samples both against the real transition.

use bap_core::{EngineError, Index};
use bap_model::domain::FactoredDomain;
use bap_model::{DirichletMethod, Kernel};

use super::rejection::rejection_resample;
use super::Belief;
use crate::augmented::{Augmented, FbapState};
use crate::breed::breed;
use crate::particles::FlatFilter;

pub struct ReinvigorationBelief<D: FactoredDomain> {
    main: FlatFilter<FbapState<D>>,
    fully_connected: FlatFilter<FbapState<D>>,
    resample_amount: usize,
    max_parents: usize,
    method: DirichletMethod,
}

impl<D: FactoredDomain> ReinvigorationBelief<D> {
    pub fn new(main: FlatFilter<FbapState<D>>, fully_connected: FlatFilter<FbapState<D>>, resample_amount: usize, max_parents: usize, method: DirichletMethod) -> Self {
        Self {
            main,
            fully_connected,
            resample_amount,
            max_parents,
            method,
        }
    }

    fn breed_into(&mut self, rng: &mut Kernel) {
        for _ in 0..self.resample_amount {
            let structure_donor = self.main.sample(rng).clone();
            let counts_donor = self.fully_connected.sample(rng).clone();
            let into_main = breed(&structure_donor, &counts_donor, self.max_parents, rng);
            self.main.replace_random(into_main, rng);
            let into_fully_connected = breed(&structure_donor, &counts_donor, self.max_parents, rng);
            self.fully_connected.replace_random(into_fully_connected, rng);
        }
    }
}

impl<D: FactoredDomain> Belief<D> for ReinvigorationBelief<D> {
    type Particle = FbapState<D>;

    fn sample(&self, rng: &mut Kernel) -> FbapState<D> {
        self.main.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        self.breed_into(rng);
        self.main = rejection_resample(&self.main, self.main.len(), domain, action_index, observation_index, rng, self.method)?;
        self.fully_connected = rejection_resample(&self.fully_connected, self.fully_connected.len(), domain, action_index, observation_index, rng, self.method)?;
        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        let main: Vec<_> = self.main.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.main = FlatFilter::new(main);
        let fully_connected: Vec<_> = self.fully_connected.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.fully_connected = FlatFilter::new(fully_connected);
    }

    fn particle_count(&self) -> usize {
        self.main.len()
    }
}
