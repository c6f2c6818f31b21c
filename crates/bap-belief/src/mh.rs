//! Shared Metropolis-Hastings sweep kernel, reused by the
//! MH-NIPS and MH-within-Gibbs belief strategies (and, transitively, the
//! nested strategy that layers one of those as its inner loop).
//!
//! Each sweep proposes replacing one particle with another particle from
//! the same filter stepped forward under the action just taken, and
//! accepts the proposal with probability proportional to the ratio of
//! observation likelihoods — the simplest valid MH kernel for a belief
//! whose target density is "consistent with the observation actually
//! received", since the proposal (draw a uniformly random filter index and
//! step it) is symmetric and cancels out of the acceptance ratio.

use bap_core::Index;
use bap_model::Kernel;

use crate::augmented::Augmented;
use crate::particles::FlatFilter;

/// Runs `sweeps` Metropolis-Hastings proposal/accept rounds over every
/// particle in `filter`, mutating it in place to approximate the posterior
/// after observing `observation_index` having taken `action_index`.
pub fn sweep<A: Augmented>(
    filter: &mut FlatFilter<A>,
    domain: &A::Domain,
    action_index: Index,
    observation_index: Index,
    sweeps: usize,
    rng: &mut Kernel,
) {
    let n = filter.len();
    assert!(n > 1, "MH sweep needs at least two particles to propose from");
    for _ in 0..sweeps {
        for i in 0..n {
            let current_likelihood = current_observation_likelihood(filter, i, domain, action_index, observation_index, rng);
            let mut proposal_source = i;
            while proposal_source == i {
                proposal_source = filter.sample_index(rng);
            }
            let (candidate, candidate_obs, _, _) = filter.particles()[proposal_source].step(domain, action_index, rng, bap_model::DirichletMethod::Sampled);
            let candidate_likelihood = if candidate_obs == observation_index {
                candidate.observation_probability(candidate.state_index(), action_index, observation_index)
            } else {
                0.0
            };
            let acceptance = if current_likelihood <= 0.0 {
                1.0
            } else {
                (candidate_likelihood / current_likelihood).min(1.0)
            };
            if rng.uniform01() < acceptance {
                filter.replace(i, candidate);
            }
        }
    }
}

fn current_observation_likelihood<A: Augmented>(
    filter: &FlatFilter<A>,
    index: usize,
    _domain: &A::Domain,
    action_index: Index,
    observation_index: Index,
    _rng: &mut Kernel,
) -> f64 {
    let particle = &filter.particles()[index];
    particle.observation_probability(particle.state_index(), action_index, observation_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augmented::BapState;
    use bap_model::domain::{Domain, IndexedDomain, Step};
    use bap_model::CountModel;

    #[derive(Clone, Copy)]
    struct Coin;
    impl Domain for Coin {
        type State = usize;
        type Action = usize;
        type Observation = usize;
        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            0
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![0]
        }
        fn step(&self, _state: Self::State, _action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
            Step {
                next_state: 0,
                observation: 0,
                reward: 0.0,
                terminal: false,
            }
        }
        fn observation_probability(&self, _a: Self::Action, _s: Self::State, _o: Self::Observation) -> bap_core::Probability {
            1.0
        }
        fn transition_probability(&self, _state: Self::State, _action: Self::Action, next_state: Self::State) -> bap_core::Probability {
            if next_state == 0 { 1.0 } else { 0.0 }
        }
    }
    impl IndexedDomain for Coin {
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
        fn reward(&self, _s: Self::State, _a: Self::Action, _n: Self::State) -> bap_core::Utility {
            0.0
        }
    }

    #[test]
    fn sweep_preserves_particle_count() {
        let domain = Coin;
        let mut filter = FlatFilter::new(vec![
            BapState::new(0, CountModel::with_uniform_prior(2, 1, 2, 1.0)),
            BapState::new(0, CountModel::with_uniform_prior(2, 1, 2, 1.0)),
            BapState::new(0, CountModel::with_uniform_prior(2, 1, 2, 1.0)),
        ]);
        let mut rng = Kernel::from_seed("mh-sweep-test");
        sweep(&mut filter, &domain, 0, 0, 2, &mut rng);
        assert_eq!(filter.len(), 3);
    }
}
