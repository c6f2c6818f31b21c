//! MH-within-Gibbs belief: like [`super::mh_nips`], but the
//! correction sweep alternates two conditional draws instead of the shared
//! structure-vs-structure MH kernel: first a fresh state trajectory
//! conditioned on each particle's current model, then the model's counts
//! are folded from that trajectory. The `option` config string selects the
//! trajectory draw: `"rs"` rejects until the recorded observation is
//! reproduced at every step; anything else conditions directly on the
//! recorded observation (the Gibbs draw), via
//! [`crate::augmented::Augmented::step_given_observation`].

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::{Belief, MAX_REJECTION_ATTEMPTS};
use crate::augmented::Augmented;
use crate::particles::WeightedFilter;

pub struct MhWithinGibbsBelief<A: Augmented> {
    filter: WeightedFilter<A>,
    history: Vec<(Index, Index)>,
    cumulative_log_likelihood: f64,
    threshold: f64,
    particle_amount: usize,
    use_rejection_trajectory: bool,
    method: DirichletMethod,
}

impl<A: Augmented> MhWithinGibbsBelief<A> {
    pub fn new(particles: Vec<A>, particle_amount: usize, threshold: f64, option: &str, method: DirichletMethod) -> Self {
        let weights = vec![1.0 / particles.len() as f64; particles.len()];
        Self {
            filter: WeightedFilter::new(particles, weights),
            history: Vec::new(),
            cumulative_log_likelihood: 0.0,
            threshold,
            particle_amount,
            use_rejection_trajectory: option == "rs",
            method,
        }
    }

    fn resample_trajectory(&self, particle: &A, domain: &A::Domain, rng: &mut Kernel) -> Result<A, EngineError> {
        let mut state = particle.reset_state(domain, rng);
        for &(action_index, observation_index) in &self.history {
            state = if self.use_rejection_trajectory {
                let mut accepted = None;
                for _ in 0..MAX_REJECTION_ATTEMPTS {
                    let (next, obs, _reward, _terminal) = state.step(domain, action_index, rng, self.method);
                    if obs == observation_index {
                        accepted = Some(next);
                        break;
                    }
                }
                accepted.ok_or(EngineError::BeliefDegenerate)?
            } else {
                let (next, _reward, _terminal, _likelihood) = state.step_given_observation(domain, action_index, observation_index, rng, self.method);
                next
            };
        }
        Ok(state)
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for MhWithinGibbsBelief<A> {
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
            let mut resampled_particles = Vec::with_capacity(self.filter.len());
            for particle in self.filter.particles() {
                resampled_particles.push(self.resample_trajectory(particle, domain, rng)?);
            }
            let uniform = vec![1.0 / resampled_particles.len() as f64; resampled_particles.len()];
            self.filter = WeightedFilter::new(resampled_particles, uniform);
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
