//! Rejection-sampling belief: a flat filter of `n` particles,
//! each slot replaced independently by stepping a re-sampled parent
//! particle until the step reproduces the observed `o`.

use bap_core::{EngineError, Index};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use super::{Belief, MAX_REJECTION_ATTEMPTS};
use crate::augmented::Augmented;
use crate::particles::FlatFilter;

/// Rebuilds a `target_len`-particle filter by rejection sampling against
/// `source`: each new slot repeatedly draws a parent from `source` and
/// steps it until the observation matches. Shared by every belief strategy
/// whose update includes a rejection-sampling resample
/// ([`super::reinvigoration`], [`super::incubator`]).
pub(crate) fn rejection_resample<A: Augmented>(
    source: &FlatFilter<A>,
    target_len: usize,
    domain: &A::Domain,
    action_index: Index,
    observation_index: Index,
    rng: &mut Kernel,
    method: DirichletMethod,
) -> Result<FlatFilter<A>, EngineError> {
    let mut resampled = Vec::with_capacity(target_len);
    for _ in 0..target_len {
        let mut accepted = None;
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            let parent = source.sample(rng);
            let (next, obs, _reward, _terminal) = parent.step(domain, action_index, rng, method);
            if obs == observation_index {
                accepted = Some(next);
                break;
            }
        }
        resampled.push(accepted.ok_or(EngineError::BeliefDegenerate)?);
    }
    Ok(FlatFilter::new(resampled))
}

pub struct RejectionSamplingBelief<A: Augmented> {
    filter: FlatFilter<A>,
    method: DirichletMethod,
}

impl<A: Augmented> RejectionSamplingBelief<A> {
    pub fn new(filter: FlatFilter<A>, method: DirichletMethod) -> Self {
        Self { filter, method }
    }
}

impl<D: IndexedDomain, A: Augmented<Domain = D>> Belief<D> for RejectionSamplingBelief<A> {
    type Particle = A;

    fn sample(&self, rng: &mut Kernel) -> A {
        self.filter.sample(rng).clone()
    }

    fn update(&mut self, domain: &D, action_index: Index, observation_index: Index, rng: &mut Kernel) -> Result<(), EngineError> {
        self.filter = rejection_resample(&self.filter, self.filter.len(), domain, action_index, observation_index, rng, self.method)?;
        Ok(())
    }

    fn reset_domain_state_distribution(&mut self, domain: &D, rng: &mut Kernel) {
        let reset: Vec<A> = self.filter.particles().iter().map(|p| p.reset_state(domain, rng)).collect();
        self.filter = FlatFilter::new(reset);
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
    fn update_keeps_particle_count_fixed_and_matches_observation() {
        let domain = EchoCoin;
        let model = CountModel::with_uniform_prior(2, 1, 2, 1.0);
        let filter = FlatFilter::new(vec![
            BapState::<EchoCoin>::new(0, model.clone()),
            BapState::<EchoCoin>::new(0, model.clone()),
            BapState::<EchoCoin>::new(0, model),
        ]);
        let mut belief = RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("rejection-test");
        belief.update(&domain, 0, 1, &mut rng).expect("reachable observation");
        assert_eq!(belief.particle_count(), 3);
        for particle in belief.filter.particles() {
            assert_eq!(particle.state_index(), 1);
        }
    }
}
