//! Point-estimate belief: a single particle, updated by
//! rejection-sampling rollout. The degenerate case of [`super::rejection`]
//! with one slot — `particle_amount == 1` under rejection sampling reduces
//! to exactly this strategy.

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::{Belief, MAX_REJECTION_ATTEMPTS};
use crate::augmented::Augmented;

pub struct PointEstimateBelief<A: Augmented> {
    particle: A,
    method: DirichletMethod,
}

impl<A: Augmented> PointEstimateBelief<A> {
    pub fn new(particle: A, method: DirichletMethod) -> Self {
        Self { particle, method }
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for PointEstimateBelief<A> {
    type Particle = A;

    fn sample(&self, _rng: &mut Kernel) -> A {
        self.particle.clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            let (next, obs, _reward, _terminal) = self.particle.step(domain, action_index, rng, self.method);
            if obs == observation_index {
                self.particle = next;
                return Ok(());
            }
        }
        Err(EngineError::BeliefDegenerate)
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        self.particle = self.particle.reset_state(domain, rng);
    }

    fn particle_count(&self) -> usize {
        1
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
    fn update_settles_on_the_observed_state() {
        let domain = EchoCoin;
        let model = CountModel::with_uniform_prior(2, 1, 2, 1.0);
        let mut belief = PointEstimateBelief::new(BapState::<EchoCoin>::new(0, model), DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("point-estimate-test");
        belief.update(&domain, 0, 1, &mut rng).expect("reachable observation");
        assert_eq!(belief.sample(&mut rng).state_index(), 1);
    }
}
