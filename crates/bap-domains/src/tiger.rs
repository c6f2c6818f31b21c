//! Episodic tiger domain: a tiger hides behind one of
//! two doors; `listen` costs `−1` and is 85% accurate, opening the correct
//! door pays `+10`, opening the wrong one pays `−100` and ends the episode.
//!
//! `IndexedDomain::terminal` always reports `false` here: the model only
//! ever learns counts over `(state, action) → state'`, and tiger's hidden
//! state never itself changes, so there is no state value a learned count
//! model could use to recognize "the episode just ended" the way the true
//! environment's `Step::terminal` does. Planning rollouts built from the
//! model therefore keep simulating past an open action; only the real
//! episode driver, which reads `Step::terminal` directly, stops there. See
//! `DESIGN.md`.

use bap_core::{Index, Probability, Utility};
use bap_model::domain::{Domain, FactoredDomain, IndexedDomain, Step};
use bap_model::Kernel;

pub const LISTEN_ACCURACY: Probability = 0.85;
pub const LISTEN_COST: Utility = -1.0;
pub const OPEN_CORRECT_REWARD: Utility = 10.0;
pub const OPEN_WRONG_REWARD: Utility = -100.0;

const TIGER_LEFT: usize = 0;
const TIGER_RIGHT: usize = 1;
const HEAR_LEFT: usize = 0;
const HEAR_RIGHT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TigerAction {
    Listen,
    OpenLeft,
    OpenRight,
}

#[derive(Debug, Clone, Copy)]
pub struct TigerDomain;

impl TigerDomain {
    pub(crate) fn open_reward_for(state: usize, opened: TigerAction) -> Utility {
        let tiger_behind_opened_door = match opened {
            TigerAction::OpenLeft => state == TIGER_LEFT,
            TigerAction::OpenRight => state == TIGER_RIGHT,
            TigerAction::Listen => unreachable!("open_reward_for is only called for open actions"),
        };
        if tiger_behind_opened_door { OPEN_WRONG_REWARD } else { OPEN_CORRECT_REWARD }
    }
}

impl Domain for TigerDomain {
    type State = usize;
    type Action = TigerAction;
    type Observation = usize;

    fn sample_start_state(&self, rng: &mut Kernel) -> Self::State {
        if rng.boolean() { TIGER_RIGHT } else { TIGER_LEFT }
    }

    fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
        vec![TigerAction::Listen, TigerAction::OpenLeft, TigerAction::OpenRight]
    }

    fn step(&self, state: Self::State, action: Self::Action, rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
        match action {
            TigerAction::Listen => {
                let heard_correctly = rng.uniform01() < LISTEN_ACCURACY;
                let true_hearing = if state == TIGER_LEFT { HEAR_LEFT } else { HEAR_RIGHT };
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
                observation: state,
                reward: Self::open_reward_for(state, action),
                terminal: true,
            },
        }
    }

    fn observation_probability(&self, action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
        match action {
            TigerAction::Listen => {
                let true_hearing = if next_state == TIGER_LEFT { HEAR_LEFT } else { HEAR_RIGHT };
                if observation == true_hearing { LISTEN_ACCURACY } else { 1.0 - LISTEN_ACCURACY }
            }
            TigerAction::OpenLeft | TigerAction::OpenRight => {
                if observation == next_state { 1.0 } else { 0.0 }
            }
        }
    }

    /// The tiger never moves within an episode, regardless of action.
    fn transition_probability(&self, state: Self::State, _action: Self::Action, next_state: Self::State) -> Probability {
        if next_state == state { 1.0 } else { 0.0 }
    }
}

impl IndexedDomain for TigerDomain {
    fn state_size(&self) -> usize {
        2
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
            _ => unreachable!("tiger domain has three actions"),
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
        match action {
            TigerAction::Listen => LISTEN_COST,
            TigerAction::OpenLeft | TigerAction::OpenRight => Self::open_reward_for(state, action),
        }
    }
}

/// One feature covering the whole state, for the same reason as
/// [`crate::coin::CoinDomain`]'s impl: unfactored domains still need a
/// `feature_sizes` to share the factored belief strategies' dispatch path.
impl FactoredDomain for TigerDomain {
    fn feature_sizes(&self) -> Vec<usize> {
        vec![2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listening_is_eighty_five_percent_accurate_and_free_of_state_change() {
        let domain = TigerDomain;
        assert_eq!(domain.observation_probability(TigerAction::Listen, TIGER_LEFT, HEAR_LEFT), LISTEN_ACCURACY);
        assert_eq!(domain.observation_probability(TigerAction::Listen, TIGER_LEFT, HEAR_RIGHT), 1.0 - LISTEN_ACCURACY);
    }

    #[test]
    fn posterior_after_hearing_left_from_a_uniform_prior_is_the_listen_accuracy() {
        // Bayes: P(left | hear-left) = P(hear-left | left) * 0.5 / P(hear-left),
        // with P(hear-left) = 0.5 * 0.85 + 0.5 * 0.15 = 0.5 under a uniform prior.
        let domain = TigerDomain;
        let p_hear_left_given_left = domain.observation_probability(TigerAction::Listen, TIGER_LEFT, HEAR_LEFT);
        let p_hear_left_given_right = domain.observation_probability(TigerAction::Listen, TIGER_RIGHT, HEAR_LEFT);
        let p_hear_left = 0.5 * p_hear_left_given_left + 0.5 * p_hear_left_given_right;
        let posterior_left = 0.5 * p_hear_left_given_left / p_hear_left;
        assert!((posterior_left - LISTEN_ACCURACY).abs() < 1e-12);
    }

    #[test]
    fn flat_prior_particle_reproduces_the_hand_computed_bayes_posterior() {
        // Drives the same Bayes update through the production pipeline
        // (`FlatPrior` seeding a `BapState` particle's model, then
        // `step_given_observation` computing the likelihood) instead of
        // calling `observation_probability` directly.
        use bap_belief::{Augmented, BapState, FlatPrior};
        use bap_model::DirichletMethod;

        let domain = TigerDomain;
        let model = FlatPrior::build(&domain, 1e6, 0.0);
        let left_particle = BapState::<TigerDomain>::new(TIGER_LEFT, model.clone());
        let right_particle = BapState::<TigerDomain>::new(TIGER_RIGHT, model);
        let mut rng = Kernel::from_seed("tiger-flat-prior-posterior");

        let listen = domain.action_to_index(TigerAction::Listen);
        let hear_left = domain.observation_to_index(HEAR_LEFT);

        let (_, _, _, left_likelihood) = left_particle.step_given_observation(&domain, listen, hear_left, &mut rng, DirichletMethod::Expected);
        let (_, _, _, right_likelihood) = right_particle.step_given_observation(&domain, listen, hear_left, &mut rng, DirichletMethod::Expected);

        let posterior_left = 0.5 * left_likelihood / (0.5 * left_likelihood + 0.5 * right_likelihood);
        assert!((posterior_left - LISTEN_ACCURACY).abs() < 1e-6);
    }

    #[test]
    fn opening_the_wrong_door_pays_the_penalty_and_terminates() {
        let domain = TigerDomain;
        let mut rng = Kernel::from_seed("tiger-test");
        let step = domain.step(TIGER_LEFT, TigerAction::OpenLeft, &mut rng);
        assert_eq!(step.reward, OPEN_WRONG_REWARD);
        assert!(step.terminal);

        let step = domain.step(TIGER_LEFT, TigerAction::OpenRight, &mut rng);
        assert_eq!(step.reward, OPEN_CORRECT_REWARD);
        assert!(step.terminal);
    }
}
