//! Factored tiger domain: the episodic tiger problem
//! with `k` extra binary features appended to the state that never
//! influence reward, observation, or the tiger's own feature. `S = 2·2^k`.
//! Exercises the DBN model's ability to learn that the irrelevant features
//! have no parents among the reward-relevant ones.

use bap_core::{Index, Probability, Utility};
use bap_model::domain::{Domain, FactoredDomain, IndexedDomain, Step};
use bap_model::Kernel;

use crate::tiger::{TigerAction, TigerDomain, LISTEN_ACCURACY, LISTEN_COST};

const TIGER_LEFT: usize = 0;
const TIGER_RIGHT: usize = 1;
const HEAR_LEFT: usize = 0;
const HEAR_RIGHT: usize = 1;

/// `k` irrelevant binary features, none of which the tiger's position,
/// reward, or observation depend on.
#[derive(Debug, Clone, Copy)]
pub struct FactoredTigerDomain {
    pub irrelevant_features: usize,
}

impl FactoredTigerDomain {
    pub fn new(irrelevant_features: usize) -> Self {
        Self { irrelevant_features }
    }

    fn tiger_feature(&self, state_index: Index) -> usize {
        self.state_to_features(state_index)[0]
    }
}

impl Domain for FactoredTigerDomain {
    type State = usize;
    type Action = TigerAction;
    type Observation = usize;

    fn sample_start_state(&self, rng: &mut Kernel) -> Self::State {
        let mut features = vec![if rng.boolean() { TIGER_RIGHT } else { TIGER_LEFT }];
        for _ in 0..self.irrelevant_features {
            features.push(if rng.boolean() { 1 } else { 0 });
        }
        self.features_to_state(&features)
    }

    fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
        vec![TigerAction::Listen, TigerAction::OpenLeft, TigerAction::OpenRight]
    }

    fn step(&self, state: Self::State, action: Self::Action, rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
        // None of the features, tiger's included, ever change: listening
        // doesn't move the tiger and opening a door ends the episode before
        // any next configuration matters.
        let tiger = self.tiger_feature(state);
        match action {
            TigerAction::Listen => {
                let heard_correctly = rng.uniform01() < LISTEN_ACCURACY;
                let true_hearing = if tiger == TIGER_LEFT { HEAR_LEFT } else { HEAR_RIGHT };
                let observation = if heard_correctly { true_hearing } else { 1 - true_hearing };
                Step {
                    next_state: state,
                    observation,
                    reward: LISTEN_COST,
                    terminal: false,
                }
            }
            TigerAction::OpenLeft | TigerAction::OpenRight => Step {
                next_state: state,
                observation: tiger,
                reward: TigerDomain::open_reward_for(tiger, action),
                terminal: true,
            },
        }
    }

    fn observation_probability(&self, action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
        let tiger = self.tiger_feature(next_state);
        match action {
            TigerAction::Listen => {
                let true_hearing = if tiger == TIGER_LEFT { HEAR_LEFT } else { HEAR_RIGHT };
                if observation == true_hearing { LISTEN_ACCURACY } else { 1.0 - LISTEN_ACCURACY }
            }
            TigerAction::OpenLeft | TigerAction::OpenRight => {
                if observation == tiger { 1.0 } else { 0.0 }
            }
        }
    }

    /// No feature, tiger's included, ever changes within an episode.
    fn transition_probability(&self, state: Self::State, _action: Self::Action, next_state: Self::State) -> Probability {
        if next_state == state { 1.0 } else { 0.0 }
    }
}

impl IndexedDomain for FactoredTigerDomain {
    fn state_size(&self) -> usize {
        1 << (self.irrelevant_features + 1)
    }
    fn action_size(&self) -> usize {
        3
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
            TigerAction::Listen => 0,
            TigerAction::OpenLeft => 1,
            TigerAction::OpenRight => 2,
        }
    }
    fn index_to_action(&self, index: Index) -> Self::Action {
        match index {
            0 => TigerAction::Listen,
            1 => TigerAction::OpenLeft,
            2 => TigerAction::OpenRight,
            _ => unreachable!("factored tiger domain has three actions"),
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

    fn reward(&self, state: Self::State, action: Self::Action, _next_state: Self::State) -> Utility {
        let tiger = self.tiger_feature(state);
        match action {
            TigerAction::Listen => LISTEN_COST,
            TigerAction::OpenLeft | TigerAction::OpenRight => TigerDomain::open_reward_for(tiger, action),
        }
    }
}

impl FactoredDomain for FactoredTigerDomain {
    fn feature_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![2; self.irrelevant_features + 1];
        sizes[0] = 2;
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_size_matches_two_times_two_to_the_k() {
        let domain = FactoredTigerDomain::new(3);
        assert_eq!(domain.state_size(), 2 * 8);
        assert_eq!(domain.feature_sizes(), vec![2, 2, 2, 2]);
    }

    #[test]
    fn irrelevant_features_do_not_affect_reward_or_observation() {
        let domain = FactoredTigerDomain::new(2);
        let mut rng = Kernel::from_seed("factored-tiger-test");
        let left_with_feature_a = domain.features_to_state(&[TIGER_LEFT, 0, 0]);
        let left_with_feature_b = domain.features_to_state(&[TIGER_LEFT, 1, 1]);

        let step_a = domain.step(left_with_feature_a, TigerAction::OpenRight, &mut rng);
        let step_b = domain.step(left_with_feature_b, TigerAction::OpenRight, &mut rng);
        assert_eq!(step_a.reward, step_b.reward);

        let listen_obs_a = domain.observation_probability(TigerAction::Listen, left_with_feature_a, HEAR_LEFT);
        let listen_obs_b = domain.observation_probability(TigerAction::Listen, left_with_feature_b, HEAR_LEFT);
        assert_eq!(listen_obs_a, listen_obs_b);
    }
}
