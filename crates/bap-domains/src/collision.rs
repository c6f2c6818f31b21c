//! Collision-avoidance domain: an agent flies leftward across a grid of
//! `height` rows while one obstacle drifts up, down, or stays in its row
//! each turn. The episode ends the moment the agent reaches column 0,
//! whether or not it collided with the obstacle there.
//!
//! The obstacle stays in its row with probability `BLOCK_MOVE_PROB` and
//! otherwise moves up or down with equal probability, clamped at the grid
//! edges; the observation model uses the same clamped-drift kernel under a
//! separate stay probability rather than a continuous Gaussian kernel,
//! since only the discrete transition formula is pinned down here (see
//! `DESIGN.md`). Only one obstacle is modeled.

use bap_core::{Index, Probability, Utility};
use bap_model::domain::{Domain, FactoredDomain, IndexedDomain, Step};
use bap_model::Kernel;

/// Probability an interior-row obstacle stays put each turn.
pub const BLOCK_MOVE_PROB: Probability = 0.6;
/// Probability the observed obstacle row is reported exactly.
pub const OBSERVATION_STAY_PROB: Probability = 0.5;
pub const MOVE_PENALTY: Utility = 1.0;
pub const COLLIDE_PENALTY: Utility = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionAction {
    Up,
    Stay,
    Down,
}

/// Probability mass of a clamped drift from `from` to `to` within
/// `0..height`, under which the occupant stays with `stay_prob` and
/// otherwise moves ±1 with equal probability, absorbed at either edge.
pub fn drift_probability(from: usize, to: usize, height: usize, stay_prob: Probability) -> Probability {
    let move_prob = (1.0 - stay_prob) / 2.0;
    let clamp = |v: i64| v.clamp(0, height as i64 - 1);
    [(-1i64, move_prob), (0, stay_prob), (1, move_prob)]
        .into_iter()
        .filter(|&(delta, _)| clamp(from as i64 + delta) == to as i64)
        .map(|(_, p)| p)
        .sum()
}

#[derive(Debug, Clone, Copy)]
pub struct CollisionAvoidanceDomain {
    pub width: usize,
    pub height: usize,
}

impl CollisionAvoidanceDomain {
    pub fn new(width: usize, height: usize) -> Self {
        assert!(height % 2 == 1, "collision avoidance grid height must be odd");
        Self { width, height }
    }

    fn decode(&self, state_index: Index) -> (usize, usize, usize) {
        let features = self.state_to_features(state_index);
        (features[0], features[1], features[2])
    }

    fn collided(&self, x_agent: usize, y_agent: usize, obstacle_y: usize) -> bool {
        x_agent == 0 && y_agent == obstacle_y
    }
}

impl Domain for CollisionAvoidanceDomain {
    type State = usize;
    type Action = CollisionAction;
    type Observation = usize;

    fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
        self.features_to_state(&[self.width - 1, self.height / 2, self.height / 2])
    }

    fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
        vec![CollisionAction::Up, CollisionAction::Stay, CollisionAction::Down]
    }

    fn step(&self, state: Self::State, action: Self::Action, rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
        let (x_agent, y_agent, obstacle_y) = self.decode(state);

        let next_x = x_agent.saturating_sub(1);
        let delta: i64 = match action {
            CollisionAction::Up => -1,
            CollisionAction::Stay => 0,
            CollisionAction::Down => 1,
        };
        let next_y = (y_agent as i64 + delta).clamp(0, self.height as i64 - 1) as usize;

        let drift_weights: Vec<Probability> = (0..self.height).map(|to| drift_probability(obstacle_y, to, self.height, BLOCK_MOVE_PROB)).collect();
        let next_obstacle_y = rng.sample_multinomial(&drift_weights, drift_weights.iter().sum());

        let reward = if self.collided(next_x, next_y, next_obstacle_y) {
            -COLLIDE_PENALTY
        } else if action == CollisionAction::Stay {
            0.0
        } else {
            -MOVE_PENALTY
        };
        let terminal = next_x == 0;

        let observation_weights: Vec<Probability> = (0..self.height).map(|to| drift_probability(next_obstacle_y, to, self.height, OBSERVATION_STAY_PROB)).collect();
        let observation = rng.sample_multinomial(&observation_weights, observation_weights.iter().sum());

        Step {
            next_state: self.features_to_state(&[next_x, next_y, next_obstacle_y]),
            observation,
            reward,
            terminal,
        }
    }

    fn observation_probability(&self, _action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
        let (_, _, obstacle_y) = self.decode(next_state);
        drift_probability(obstacle_y, observation, self.height, OBSERVATION_STAY_PROB)
    }

    /// The agent's next column/row are a deterministic function of
    /// `state`/`action` (mirrors `step`'s own computation); only the
    /// obstacle's row is stochastic, via the same clamped-drift kernel
    /// `step` samples from.
    fn transition_probability(&self, state: Self::State, action: Self::Action, next_state: Self::State) -> Probability {
        let (x_agent, y_agent, obstacle_y) = self.decode(state);
        let (next_x_actual, next_y_actual, next_obstacle_y) = self.decode(next_state);

        let next_x = x_agent.saturating_sub(1);
        let delta: i64 = match action {
            CollisionAction::Up => -1,
            CollisionAction::Stay => 0,
            CollisionAction::Down => 1,
        };
        let next_y = (y_agent as i64 + delta).clamp(0, self.height as i64 - 1) as usize;

        if next_x != next_x_actual || next_y != next_y_actual {
            return 0.0;
        }
        drift_probability(obstacle_y, next_obstacle_y, self.height, BLOCK_MOVE_PROB)
    }
}

impl IndexedDomain for CollisionAvoidanceDomain {
    fn state_size(&self) -> usize {
        self.width * self.height * self.height
    }
    fn action_size(&self) -> usize {
        3
    }
    fn observation_size(&self) -> usize {
        self.height
    }

    fn state_to_index(&self, state: Self::State) -> Index {
        state
    }
    fn index_to_state(&self, index: Index) -> Self::State {
        index
    }
    fn action_to_index(&self, action: Self::Action) -> Index {
        match action {
            CollisionAction::Up => 0,
            CollisionAction::Stay => 1,
            CollisionAction::Down => 2,
        }
    }
    fn index_to_action(&self, index: Index) -> Self::Action {
        match index {
            0 => CollisionAction::Up,
            1 => CollisionAction::Stay,
            2 => CollisionAction::Down,
            _ => unreachable!("collision avoidance domain has three actions"),
        }
    }
    fn observation_to_index(&self, observation: Self::Observation) -> Index {
        observation
    }
    fn index_to_observation(&self, index: Index) -> Self::Observation {
        index
    }

    fn terminal(&self, state: Self::State) -> bool {
        let (x_agent, _, _) = self.decode(state);
        x_agent == 0
    }

    fn reward(&self, _state: Self::State, action: Self::Action, next_state: Self::State) -> Utility {
        let (x_agent, y_agent, obstacle_y) = self.decode(next_state);
        if self.collided(x_agent, y_agent, obstacle_y) {
            -COLLIDE_PENALTY
        } else if action == CollisionAction::Stay {
            0.0
        } else {
            -MOVE_PENALTY
        }
    }
}

impl FactoredDomain for CollisionAvoidanceDomain {
    fn feature_sizes(&self) -> Vec<usize> {
        vec![self.width, self.height, self.height]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_drift_matches_block_move_prob_exactly() {
        let height = 7;
        let y = 3; // interior row, away from either edge
        assert_eq!(drift_probability(y, y, height, BLOCK_MOVE_PROB), BLOCK_MOVE_PROB);
        assert_eq!(drift_probability(y, y - 1, height, BLOCK_MOVE_PROB), (1.0 - BLOCK_MOVE_PROB) / 2.0);
        assert_eq!(drift_probability(y, y + 1, height, BLOCK_MOVE_PROB), (1.0 - BLOCK_MOVE_PROB) / 2.0);
    }

    #[test]
    fn edge_row_absorbs_the_would_be_out_of_bounds_move() {
        let height = 7;
        let absorbed = drift_probability(0, 0, height, BLOCK_MOVE_PROB);
        assert_eq!(absorbed, BLOCK_MOVE_PROB + (1.0 - BLOCK_MOVE_PROB) / 2.0);
    }

    #[test]
    fn centered_prior_starts_the_agent_and_obstacle_in_the_middle_row() {
        let domain = CollisionAvoidanceDomain::new(5, 7);
        let mut rng = Kernel::from_seed("collision-test");
        let state = domain.sample_start_state(&mut rng);
        assert_eq!(state, domain.features_to_state(&[4, 3, 3]));
    }

    #[test]
    fn reaching_column_zero_always_terminates() {
        let domain = CollisionAvoidanceDomain::new(5, 7);
        let state = domain.features_to_state(&[1, 3, 3]);
        let mut rng = Kernel::from_seed("collision-terminal-test");
        let step = domain.step(state, CollisionAction::Stay, &mut rng);
        assert!(step.terminal);
    }
}
