//! Cheating-reinvigoration belief: importance-sampling update
//! on a weighted "main" filter, with a flat "correct-structure" filter held
//! in reserve (a particle pool built with the domain's true structure,
//! hence "cheating"). When the cumulative log-likelihood since the last
//! correction drops below `threshold`, `resample_amount` uniformly chosen
//! main particles are replaced with fresh copies from the correct-structure
//! pool and the tracker resets.

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::Belief;
use crate::augmented::Augmented;
use crate::particles::{FlatFilter, WeightedFilter};

pub struct CheatingReinvigorationBelief<A: Augmented> {
    main: WeightedFilter<A>,
    correct_structure: FlatFilter<A>,
    resample_amount: usize,
    threshold: f64,
    cumulative_log_likelihood: f64,
    particle_amount: usize,
    method: DirichletMethod,
}

impl<A: Augmented> CheatingReinvigorationBelief<A> {
    pub fn new(main: Vec<A>, correct_structure: FlatFilter<A>, resample_amount: usize, threshold: f64, particle_amount: usize, method: DirichletMethod) -> Self {
        let weights = vec![1.0 / main.len() as f64; main.len()];
        Self {
            main: WeightedFilter::new(main, weights),
            correct_structure,
            resample_amount,
            threshold,
            cumulative_log_likelihood: 0.0,
            particle_amount,
            method,
        }
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for CheatingReinvigorationBelief<A> {
    type Particle = A;

    fn sample(&self, rng: &mut Kernel) -> A {
        self.main.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        let mut next_particles = Vec::with_capacity(self.main.len());
        let mut next_weights = Vec::with_capacity(self.main.len());
        let mut mean_likelihood = 0.0;
        for (i, particle) in self.main.particles().iter().enumerate() {
            let (next, _reward, _terminal, likelihood) = particle.step_given_observation(domain, action_index, observation_index, rng, self.method);
            mean_likelihood += likelihood / self.main.len() as f64;
            next_particles.push(next);
            next_weights.push(self.main.weight(i) * likelihood);
        }
        let mut stepped = WeightedFilter::new(next_particles, next_weights);
        stepped.normalize()?;
        let resampled = stepped.systematic_resample(self.particle_amount, rng);
        let uniform = vec![1.0 / resampled.len() as f64; resampled.len()];
        self.main = WeightedFilter::new(resampled.particles().to_vec(), uniform);

        self.cumulative_log_likelihood += mean_likelihood.max(bap_core::DIRICHLET_UNDERFLOW).ln();

        if self.cumulative_log_likelihood < self.threshold {
            for _ in 0..self.resample_amount {
                let index = rng.uniform_index(0, self.main.len());
                let replacement = self.correct_structure.sample(rng).clone();
                self.main.replace(index, replacement, 1.0 / self.main.len() as f64);
            }
            self.cumulative_log_likelihood = 0.0;
        }

        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        let reset: Vec<A> = self.main.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        let weights: Vec<f64> = (0..reset.len()).map(|i| self.main.weight(i)).collect();
        self.main = WeightedFilter::new(reset, weights);
        let correct: Vec<A> = self.correct_structure.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.correct_structure = FlatFilter::new(correct);
    }

    fn particle_count(&self) -> usize {
        self.main.len()
    }
}
