//! Nested belief: a two-level particle filter — a weighted
//! outer filter of candidate dynamics models, each carrying its own inner
//! flat filter of raw domain-state samples ("bottom" particles) drawn
//! under that model.
//!
//! Each update rejection-samples `bottom_amount` fresh bottom states per
//! outer particle (reusing `particle_amount` as the bottom filter's size —
//! the distilled spec names no separate bottom-size field, see
//! `DESIGN.md`), reweighting the outer particle by `1 / total rejection
//! attempts` spent producing them, then renormalizes the outer filter.

use bap_core::{EngineError, Index};
use bap_model::domain::FactoredDomain;
use bap_model::{DbnModel, DirichletMethod, Kernel};

use super::{Belief, MAX_REJECTION_ATTEMPTS};
use crate::augmented::{Augmented, FbapState};

/// One outer-level candidate: a dynamics model shared by every bottom
/// particle drawn under it.
#[derive(Clone)]
pub struct NestedParticle<D: FactoredDomain> {
    model: DbnModel,
    bottom: Vec<Vec<usize>>,
    _domain: std::marker::PhantomData<D>,
}

impl<D: FactoredDomain> NestedParticle<D> {
    pub fn new(model: DbnModel, bottom: Vec<Vec<usize>>) -> Self {
        Self {
            model,
            bottom,
            _domain: std::marker::PhantomData,
        }
    }
}

pub struct NestedBelief<D: FactoredDomain> {
    particles: Vec<NestedParticle<D>>,
    weights: Vec<f64>,
    bottom_amount: usize,
    method: DirichletMethod,
}

impl<D: FactoredDomain> NestedBelief<D> {
    pub fn new(particles: Vec<NestedParticle<D>>, bottom_amount: usize, method: DirichletMethod) -> Self {
        let weights = vec![1.0 / particles.len() as f64; particles.len()];
        Self {
            particles,
            weights,
            bottom_amount,
            method,
        }
    }
}

impl<D: FactoredDomain> Belief<D> for NestedBelief<D> {
    type Particle = FbapState<D>;

    fn sample(&self, rng: &mut Kernel) -> FbapState<D> {
        let total: f64 = self.weights.iter().sum();
        let outer = rng.sample_multinomial(&self.weights, total.max(f64::MIN_POSITIVE));
        let particle = &self.particles[outer];
        let bottom = rng.uniform_index(0, particle.bottom.len());
        FbapState::new(particle.bottom[bottom].clone(), particle.model.clone())
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        for (particle, weight) in self.particles.iter_mut().zip(self.weights.iter_mut()) {
            let mut new_bottom = Vec::with_capacity(self.bottom_amount);
            let mut total_attempts = 0usize;
            for _ in 0..self.bottom_amount {
                let parent_index = rng.uniform_index(0, particle.bottom.len());
                let parent = FbapState::<D>::new(particle.bottom[parent_index].clone(), particle.model.clone());
                let mut accepted = None;
                for attempt in 1..=MAX_REJECTION_ATTEMPTS {
                    let (next, obs, _reward, _terminal) = parent.step(domain, action_index, rng, self.method);
                    if obs == observation_index {
                        accepted = Some(next);
                        total_attempts += attempt;
                        break;
                    }
                }
                new_bottom.push(accepted.ok_or(EngineError::BeliefDegenerate)?.features().to_vec());
            }
            particle.bottom = new_bottom;
            *weight *= 1.0 / total_attempts.max(1) as f64;
        }

        let total: f64 = self.weights.iter().sum();
        if total <= bap_core::DIRICHLET_UNDERFLOW {
            return Err(EngineError::BeliefDegenerate);
        }
        for w in &mut self.weights {
            *w /= total;
        }

        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        for particle in &mut self.particles {
            for bottom in &mut particle.bottom {
                let index = domain.state_prior_index(rng);
                *bottom = domain.state_to_features(index);
            }
        }
    }

    fn particle_count(&self) -> usize {
        self.particles.len()
    }
}
