//! Thompson-sampled BA planner: draws one augmented-state
//! sample from the outer belief, freezes it into a degenerate point
//! estimate, and runs PO-UCT against that single hypothesis rather than
//! re-sampling a fresh particle on every simulation. Cheaper per decision
//! than full PO-UCT-over-the-belief at the cost of ignoring posterior
//! variance within one action selection.

use bap_core::Index;
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};

use bap_belief::belief::point_estimate::PointEstimateBelief;
use bap_belief::{Augmented, Belief};

use crate::pouct::PoUctPlanner;

pub struct ThompsonPlanner {
    inner: PoUctPlanner,
    method: DirichletMethod,
}

impl ThompsonPlanner {
    pub fn new(inner: PoUctPlanner, method: DirichletMethod) -> Self {
        Self { inner, method }
    }

    pub fn select_action<D, Bel>(&self, domain: &D, belief: &Bel, history_len: usize, rng: &mut Kernel) -> (Index, usize)
    where
        D: IndexedDomain,
        Bel: Belief<D>,
        Bel::Particle: Augmented<Domain = D>,
    {
        let sample = belief.sample(rng);
        let point = PointEstimateBelief::new(sample, self.method);
        self.inner.select_action(domain, &point, history_len, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_belief::particles::FlatFilter;
    use bap_belief::belief::RejectionSamplingBelief;
    use bap_belief::BapState;
    use bap_core::{Probability, SimulationBudget, Utility};
    use bap_model::domain::{Domain, Step};
    use bap_model::CountModel;

    #[derive(Clone, Copy)]
    struct StayFlip;
    impl Domain for StayFlip {
        type State = usize;
        type Action = usize;
        type Observation = usize;
        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            0
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![0, 1]
        }
        fn step(&self, _state: Self::State, action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
            Step {
                next_state: action,
                observation: action,
                reward: action as Probability,
                terminal: false,
            }
        }
        fn observation_probability(&self, _a: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
            if next_state == observation { 1.0 } else { 0.0 }
        }
        fn transition_probability(&self, _state: Self::State, action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == action { 1.0 } else { 0.0 }
        }
    }
    impl bap_model::domain::IndexedDomain for StayFlip {
        fn state_size(&self) -> usize {
            2
        }
        fn action_size(&self) -> usize {
            2
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
        fn reward(&self, _s: Self::State, action: Self::Action, _n: Self::State) -> Utility {
            action as Utility
        }
    }

    #[test]
    fn delegates_to_po_uct_over_a_single_sample() {
        let domain = StayFlip;
        let model = CountModel::with_uniform_prior(2, 2, 2, 1.0);
        let filter = FlatFilter::new(vec![BapState::<StayFlip>::new(0, model)]);
        let belief = RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let inner = PoUctPlanner::new(3, 1.0, 1.0, None, SimulationBudget::Count(100), DirichletMethod::Expected);
        let planner = ThompsonPlanner::new(inner, DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("thompson-test");
        let (action, simulations) = planner.select_action(&domain, &belief, 0, &mut rng);
        assert_eq!(action, 1);
        assert_eq!(simulations, 100);
    }
}
