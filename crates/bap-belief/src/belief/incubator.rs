//! Incubator belief: a main flat filter, a fully-connected
//! flat filter (counts donor), and a weighted "shadow" filter that
//! auditions bred candidates before they earn a place in the main filter.
//!
//! Each step the `resample_amount` least-likely shadow particles are
//! re-bred, the whole shadow filter is importance-updated against the real
//! transition, and any shadow particle whose normalized weight clears
//! `threshold` is transplanted into a random main slot with its shadow
//! weight reset to zero.

use bap_core::{EngineError, Index};
use bap_model::domain::FactoredDomain;
use bap_model::{DirichletMethod, Kernel};

use super::Belief;
use crate::augmented::{Augmented, FbapState};
use crate::breed::breed;
use crate::particles::{FlatFilter, WeightedFilter};

pub struct IncubatorBelief<D: FactoredDomain> {
    main: FlatFilter<FbapState<D>>,
    fully_connected: FlatFilter<FbapState<D>>,
    shadow: WeightedFilter<FbapState<D>>,
    resample_amount: usize,
    threshold: f64,
    max_parents: usize,
    method: DirichletMethod,
}

impl<D: FactoredDomain> IncubatorBelief<D> {
    pub fn new(
        main: FlatFilter<FbapState<D>>,
        fully_connected: FlatFilter<FbapState<D>>,
        shadow: WeightedFilter<FbapState<D>>,
        resample_amount: usize,
        threshold: f64,
        max_parents: usize,
        method: DirichletMethod,
    ) -> Self {
        Self {
            main,
            fully_connected,
            shadow,
            resample_amount,
            threshold,
            max_parents,
            method,
        }
    }
}

impl<D: FactoredDomain> Belief<D> for IncubatorBelief<D> {
    type Particle = FbapState<D>;

    fn sample(&self, rng: &mut Kernel) -> FbapState<D> {
        self.main.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        for index in self.shadow.least_likely_k(self.resample_amount.min(self.shadow.len())) {
            let structure_donor = self.main.sample(rng).clone();
            let counts_donor = self.fully_connected.sample(rng).clone();
            let bred = breed(&structure_donor, &counts_donor, self.max_parents, rng);
            self.shadow.replace(index, bred, 1.0);
        }

        let mut next_particles = Vec::with_capacity(self.shadow.len());
        let mut next_weights = Vec::with_capacity(self.shadow.len());
        for i in 0..self.shadow.len() {
            let particle = self.shadow.particle(i);
            let (next, _reward, _terminal, likelihood) = particle.step_given_observation(domain, action_index, observation_index, rng, self.method);
            next_particles.push(next);
            next_weights.push(self.shadow.weight(i) * likelihood);
        }
        self.shadow = WeightedFilter::new(next_particles, next_weights);
        self.shadow.normalize()?;

        for i in 0..self.shadow.len() {
            if self.shadow.normalized_weight(i) > self.threshold {
                self.main.replace_random(self.shadow.particle(i).clone(), rng);
                self.shadow.replace(i, self.shadow.particle(i).clone(), 0.0);
            }
        }

        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        let main: Vec<_> = self.main.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.main = FlatFilter::new(main);
        let fully_connected: Vec<_> = self.fully_connected.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.fully_connected = FlatFilter::new(fully_connected);
        let shadow_particles: Vec<_> = self.shadow.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        let shadow_weights: Vec<f64> = (0..shadow_particles.len()).map(|i| self.shadow.weight(i)).collect();
        self.shadow = WeightedFilter::new(shadow_particles, shadow_weights);
    }

    fn particle_count(&self) -> usize {
        self.main.len()
    }
}
