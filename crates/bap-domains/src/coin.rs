//! Deterministic two-state coin domain: `S = {0,1}`,
//! `A = {stay, flip}`, `O = {0,1}` with `o = s'` always, reward `= s` — the
//! state the agent acted from, not the one it lands in, so the first flip
//! out of state 0 earns nothing itself but sets up every later step to earn
//! 1 instead of 0.

use bap_core::{Index, Probability, Utility};
use bap_model::domain::{Domain, FactoredDomain, IndexedDomain, Step};
use bap_model::Kernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinAction {
    Stay,
    Flip,
}

/// `S = {0,1}`; the coin never terminates on its own (episodes end at the
/// horizon).
#[derive(Debug, Clone, Copy)]
pub struct CoinDomain;

impl Domain for CoinDomain {
    type State = usize;
    type Action = CoinAction;
    type Observation = usize;

    fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
        0
    }

    fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
        vec![CoinAction::Stay, CoinAction::Flip]
    }

    fn step(&self, state: Self::State, action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
        let next_state = match action {
            CoinAction::Stay => state,
            CoinAction::Flip => 1 - state,
        };
        Step {
            next_state,
            observation: next_state,
            reward: state as Utility,
            terminal: false,
        }
    }

    fn observation_probability(&self, _action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
        if next_state == observation { 1.0 } else { 0.0 }
    }

    fn transition_probability(&self, state: Self::State, action: Self::Action, next_state: Self::State) -> Probability {
        let deterministic_next = match action {
            CoinAction::Stay => state,
            CoinAction::Flip => 1 - state,
        };
        if next_state == deterministic_next { 1.0 } else { 0.0 }
    }
}

impl IndexedDomain for CoinDomain {
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
        state
    }
    fn index_to_state(&self, index: Index) -> Self::State {
        index
    }
    fn action_to_index(&self, action: Self::Action) -> Index {
        match action {
            CoinAction::Stay => 0,
            CoinAction::Flip => 1,
        }
    }
    fn index_to_action(&self, index: Index) -> Self::Action {
        match index {
            0 => CoinAction::Stay,
            1 => CoinAction::Flip,
            _ => unreachable!("coin domain has two actions"),
        }
    }
    fn observation_to_index(&self, observation: Self::Observation) -> Index {
        observation
    }
    fn index_to_observation(&self, index: Index) -> Self::Observation {
        index
    }

    fn terminal(&self, _state: Self::State) -> bool {
        false
    }

    fn reward(&self, state: Self::State, _action: Self::Action, _next_state: Self::State) -> Utility {
        state as Utility
    }
}

/// One feature covering the whole state: the coin has no internal
/// structure to factor, but the single-feature view lets it share the
/// factored belief strategies' dispatch path with the domains that do.
impl FactoredDomain for CoinDomain {
    fn feature_sizes(&self) -> Vec<usize> {
        vec![2]
    }
}
