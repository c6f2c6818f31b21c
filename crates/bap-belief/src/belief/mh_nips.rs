//! MH-NIPS belief: an importance-sampling filter that also
//! tracks the observation history and the cumulative log-likelihood since
//! the last Metropolis-Hastings sweep. Once the cumulative likelihood
//! drops below `−threshold`, one MH sweep (the shared kernel in
//! [`crate::mh`]) runs over the whole recorded history and the tracker
//! resets.

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::Belief;
use crate::augmented::Augmented;
use crate::mh::sweep;
use crate::particles::{FlatFilter, WeightedFilter};

pub struct MhNipsBelief<A: Augmented> {
    filter: WeightedFilter<A>,
    history: Vec<(Index, Index)>,
    cumulative_log_likelihood: f64,
    threshold: f64,
    particle_amount: usize,
    method: DirichletMethod,
}

impl<A: Augmented> MhNipsBelief<A> {
    pub fn new(particles: Vec<A>, particle_amount: usize, threshold: f64, method: DirichletMethod) -> Self {
        let weights = vec![1.0 / particles.len() as f64; particles.len()];
        Self {
            filter: WeightedFilter::new(particles, weights),
            history: Vec::new(),
            cumulative_log_likelihood: 0.0,
            threshold,
            particle_amount,
            method,
        }
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for MhNipsBelief<A> {
    type Particle = A;

    fn sample(&self, rng: &mut Kernel) -> A {
        self.filter.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        let mut next_particles = Vec::with_capacity(self.filter.len());
        let mut next_weights = Vec::with_capacity(self.filter.len());
        let mut mean_likelihood = 0.0;
        for (i, particle) in self.filter.particles().iter().enumerate() {
            let (next, _reward, _terminal, likelihood) = particle.step_given_observation(domain, action_index, observation_index, rng, self.method);
            mean_likelihood += likelihood / self.filter.len() as f64;
            next_particles.push(next);
            next_weights.push(self.filter.weight(i) * likelihood);
        }
        let mut stepped = WeightedFilter::new(next_particles, next_weights);
        stepped.normalize()?;
        let resampled = stepped.systematic_resample(self.particle_amount, rng);
        let uniform = vec![1.0 / resampled.len() as f64; resampled.len()];
        self.filter = WeightedFilter::new(resampled.particles().to_vec(), uniform);

        self.history.push((action_index, observation_index));
        self.cumulative_log_likelihood += mean_likelihood.max(bap_core::DIRICHLET_UNDERFLOW).ln();

        if self.cumulative_log_likelihood < -self.threshold {
            let mut flat: FlatFilter<A> = FlatFilter::new(self.filter.particles().to_vec());
            for &(a, o) in &self.history {
                sweep(&mut flat, domain, a, o, 1, rng);
            }
            let uniform = vec![1.0 / flat.len() as f64; flat.len()];
            self.filter = WeightedFilter::new(flat.particles().to_vec(), uniform);
            self.history.clear();
            self.cumulative_log_likelihood = 0.0;
        }

        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        let reset: Vec<A> = self.filter.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        let weights: Vec<f64> = (0..reset.len()).map(|i| self.filter.weight(i)).collect();
        self.filter = WeightedFilter::new(reset, weights);
    }

    fn particle_count(&self) -> usize {
        self.filter.len()
    }
}
