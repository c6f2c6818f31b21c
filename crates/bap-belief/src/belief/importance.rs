//! Importance-sampling belief: a weighted filter where every
//! particle steps once per update, its weight multiplied by the
//! likelihood of the observed `o`, then the whole filter is systematically
//! resampled back down to `particle_amount` unweighted copies.

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::Belief;
use crate::augmented::Augmented;
use crate::particles::WeightedFilter;

pub struct ImportanceSamplingBelief<A: Augmented> {
    filter: WeightedFilter<A>,
    particle_amount: usize,
    method: DirichletMethod,
}

impl<A: Augmented> ImportanceSamplingBelief<A> {
    pub fn new(particles: Vec<A>, particle_amount: usize, method: DirichletMethod) -> Self {
        let weights = vec![1.0 / particles.len() as f64; particles.len()];
        Self {
            filter: WeightedFilter::new(particles, weights),
            particle_amount,
            method,
        }
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for ImportanceSamplingBelief<A> {
    type Particle = A;

    fn sample(&self, rng: &mut Kernel) -> A {
        self.filter.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        let mut next_particles = Vec::with_capacity(self.filter.len());
        let mut next_weights = Vec::with_capacity(self.filter.len());
        for (i, particle) in self.filter.particles().iter().enumerate() {
            let (next, _reward, _terminal, likelihood) = particle.step_given_observation(domain, action_index, observation_index, rng, self.method);
            next_particles.push(next);
            next_weights.push(self.filter.weight(i) * likelihood);
        }
        let mut stepped = WeightedFilter::new(next_particles, next_weights);
        stepped.normalize()?;
        let resampled = stepped.systematic_resample(self.particle_amount, rng);
        let uniform = vec![1.0 / resampled.len() as f64; resampled.len()];
        self.filter = WeightedFilter::new(resampled.particles().to_vec(), uniform);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augmented::BapState;
    use bap_core::{Probability, Utility};
    use bap_model::domain::{Domain, Step};
    use bap_model::CountModel;

    #[derive(Clone, Copy)]
    struct EchoCoin;
    impl Domain for EchoCoin {
        type State = usize;
        type Action = usize;
        type Observation = usize;
        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            0
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![0]
        }
        fn step(&self, state: Self::State, _action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
            Step {
                next_state: state,
                observation: state,
                reward: 0.0,
                terminal: false,
            }
        }
        fn observation_probability(&self, _a: Self::Action, s: Self::State, o: Self::Observation) -> Probability {
            if s == o { 1.0 } else { 0.0 }
        }
        fn transition_probability(&self, state: Self::State, _action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == state { 1.0 } else { 0.0 }
        }
    }
    impl IndexedDomain for EchoCoin {
        fn state_size(&self) -> usize {
            2
        }
        fn action_size(&self) -> usize {
            1
        }
        fn observation_size(&self) -> usize {
            2
        }
        fn state_to_index(&self, s: Self::State) -> Index {
            s
        }
        fn index_to_state(&self, i: Index) -> Self::State {
            i
        }
        fn action_to_index(&self, a: Self::Action) -> Index {
            a
        }
        fn index_to_action(&self, i: Index) -> Self::Action {
            i
        }
        fn observation_to_index(&self, o: Self::Observation) -> Index {
            o
        }
        fn index_to_observation(&self, i: Index) -> Self::Observation {
            i
        }
        fn terminal(&self, _s: Self::State) -> bool {
            false
        }
        fn reward(&self, _s: Self::State, _a: Self::Action, _n: Self::State) -> Utility {
            0.0
        }
    }

    #[test]
    fn update_normalizes_and_restores_particle_amount() {
        let domain = EchoCoin;
        let model = CountModel::with_uniform_prior(2, 1, 2, 1.0);
        let particles = vec![
            BapState::<EchoCoin>::new(0, model.clone()),
            BapState::<EchoCoin>::new(0, model.clone()),
            BapState::<EchoCoin>::new(0, model),
        ];
        let mut belief = ImportanceSamplingBelief::new(particles, 5, DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("importance-test");
        belief.update(&domain, 0, 1, &mut rng).expect("non-degenerate update");
        assert_eq!(belief.particle_count(), 5);
        let total: f64 = (0..belief.filter.len()).map(|i| belief.filter.weight(i)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
