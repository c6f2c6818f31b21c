//! Domain contract.
//!
//! Every environment the engine plans or learns in implements [`Domain`].
//! States, actions and observations are opaque associated types to the
//! planner and belief layers; only the model layer needs to turn them into
//! dense indices, which is what [`IndexedDomain`] is for. Factored domains
//! additionally decompose a state into a feature vector so the DBN dynamics
//! model (`dbn.rs`) can condition each next-feature on a learned parent set.

use bap_core::{Index, Probability, Utility};

use crate::rng::Kernel;

/// The result of taking one step in a [`Domain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<S, O> {
    pub next_state: S,
    pub observation: O,
    pub reward: Utility,
    pub terminal: bool,
}

/// The ground-truth (or simulated) dynamics an episode actually runs
/// against. Planning and belief tracking never call these directly on the
/// true environment except to advance the real episode; everywhere else
/// they go through a *model* built from counts (see `count.rs`, `dbn.rs`).
pub trait Domain {
    type State: Copy + Eq + std::hash::Hash + std::fmt::Debug;
    type Action: Copy + Eq + std::hash::Hash + std::fmt::Debug;
    type Observation: Copy + Eq + std::hash::Hash + std::fmt::Debug;

    /// Draws an initial state from the domain's start-state distribution.
    fn sample_start_state(&self, rng: &mut Kernel) -> Self::State;

    /// The actions available in `state`. For most domains this does not
    /// depend on `state`; included for domains that do restrict it.
    fn legal_actions(&self, state: Self::State) -> Vec<Self::Action>;

    /// Draws an action uniformly from [`Domain::legal_actions`], used for
    /// MCTS rollouts and the `random` planner baseline.
    fn generate_random_action(&self, state: Self::State, rng: &mut Kernel) -> Self::Action {
        let actions = self.legal_actions(state);
        assert!(!actions.is_empty(), "domain offered no legal actions");
        let i = rng.uniform_index(0, actions.len());
        actions[i]
    }

    /// Samples a full transition: next state, observation, reward and
    /// terminality, all in one domain-dynamics draw.
    fn step(&self, state: Self::State, action: Self::Action, rng: &mut Kernel) -> Step<Self::State, Self::Observation>;

    /// The probability of observing `observation` having reached
    /// `next_state` via `action`. Used by belief-update strategies that
    /// need to weight or reject particles by observation likelihood.
    fn observation_probability(&self, action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability;

    /// The probability of transitioning to `next_state` from `state` via
    /// `action`, under the domain's true dynamics. Used to seed a fresh
    /// prior's `T` table from declared dynamics instead of a flat uniform
    /// guess (`prior.rs::FlatPrior`).
    fn transition_probability(&self, state: Self::State, action: Self::Action, next_state: Self::State) -> Probability;
}

/// Extension for domains dense enough to back a Bayesian count model: every
/// state/action/observation has a stable index in `0..size`. Required by
/// `bap-belief` (augmented-state particle filters) and `bap-planner`
/// (PO-UCT tree indices).
pub trait IndexedDomain: Domain {
    fn state_size(&self) -> usize;
    fn action_size(&self) -> usize;
    fn observation_size(&self) -> usize;

    fn state_to_index(&self, state: Self::State) -> Index;
    fn index_to_state(&self, index: Index) -> Self::State;
    fn action_to_index(&self, action: Self::Action) -> Index;
    fn index_to_action(&self, index: Index) -> Self::Action;
    fn observation_to_index(&self, observation: Self::Observation) -> Index;
    fn index_to_observation(&self, index: Index) -> Self::Observation;

    /// `true` once `state` can have no successor but itself (an absorbing
    /// terminal state), used by the episode driver and rollout truncation.
    fn terminal(&self, state: Self::State) -> bool;

    /// The (assumed known) reward for transitioning `state` --action--> `next_state`.
    /// BA-POMDP learns the transition and observation functions but treats the
    /// reward function as given, so planning under the model calls this
    /// directly rather than sampling a reward from learned counts.
    fn reward(&self, state: Self::State, action: Self::Action, next_state: Self::State) -> Utility;

    /// A draw from the domain's prior over start-state indices, used to seed
    /// a fresh particle filter. Defaults to sampling a start state and
    /// indexing it; factored domains with a non-uniform structured prior may
    /// override this.
    fn state_prior_index(&self, rng: &mut Kernel) -> Index {
        let state = self.sample_start_state(rng);
        self.state_to_index(state)
    }
}

/// Extension for domains whose state factors into independent features, the
/// prerequisite for the DBN-structured dynamics model. Feature `i`'s size is
/// `feature_sizes()[i]`; [`IndexedDomain::state_size`]
/// must equal the product of all feature sizes.
pub trait FactoredDomain: IndexedDomain {
    /// Sizes of each state feature, outer-to-inner row-major order.
    fn feature_sizes(&self) -> Vec<usize>;

    /// Decomposes a state index into its per-feature index tuple.
    fn state_to_features(&self, index: Index) -> Vec<usize> {
        crate::rng::project_using_dimensions(index, &self.feature_sizes())
    }

    /// Recomposes a per-feature index tuple into a state index.
    fn features_to_state(&self, features: &[usize]) -> Index {
        crate::rng::project(features, &self.feature_sizes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct TinyCoin;

    impl Domain for TinyCoin {
        type State = bool;
        type Action = bool;
        type Observation = bool;

        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            false
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![false, true]
        }
        fn step(&self, _state: Self::State, action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
            Step {
                next_state: action,
                observation: action,
                reward: if action { 1.0 } else { 0.0 },
                terminal: action,
            }
        }
        fn observation_probability(&self, _action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
            if next_state == observation { 1.0 } else { 0.0 }
        }
        fn transition_probability(&self, _state: Self::State, action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == action { 1.0 } else { 0.0 }
        }
    }

    impl IndexedDomain for TinyCoin {
        fn state_size(&self) -> usize {
            2
        }
        fn action_size(&self) -> usize {
            2
        }
        fn observation_size(&self) -> usize {
            2
        }
        fn state_to_index(&self, state: Self::State) -> Index {
            state as usize
        }
        fn index_to_state(&self, index: Index) -> Self::State {
            index != 0
        }
        fn action_to_index(&self, action: Self::Action) -> Index {
            action as usize
        }
        fn index_to_action(&self, index: Index) -> Self::Action {
            index != 0
        }
        fn observation_to_index(&self, observation: Self::Observation) -> Index {
            observation as usize
        }
        fn index_to_observation(&self, index: Index) -> Self::Observation {
            index != 0
        }
        fn terminal(&self, state: Self::State) -> bool {
            state
        }
        fn reward(&self, _state: Self::State, action: Self::Action, _next_state: Self::State) -> Utility {
            if action { 1.0 } else { 0.0 }
        }
    }

    #[test]
    fn random_action_is_always_legal() {
        let domain = TinyCoin;
        let mut rng = Kernel::from_seed("domain-test");
        for _ in 0..20 {
            let action = domain.generate_random_action(false, &mut rng);
            assert!(domain.legal_actions(false).contains(&action));
        }
    }

    #[test]
    fn index_roundtrips() {
        let domain = TinyCoin;
        for i in 0..domain.state_size() {
            let s = domain.index_to_state(i);
            assert_eq!(domain.state_to_index(s), i);
        }
    }
}
