//! Episode driver: orchestrates planner ↔ belief ↔ environment for one
//! episode and accumulates discounted return.
//!
//! Alongside the `(discounted_return, steps, total_simulations)` triple, the
//! driver also tracks a running mean step-planning duration and a running
//! mean simulation count per step, since the result-file schema names
//! `step_duration_mean, step_simulations_mean` as per-episode output fields.

use std::time::Instant;

use bap_core::{Discount, Index, Utility};
use bap_model::domain::IndexedDomain;
use bap_model::Kernel;

use bap_belief::{Augmented, Belief};

use crate::abstraction::AbstractionPlanner;
use crate::pouct::PoUctPlanner;
use crate::thompson::ThompsonPlanner;

/// The closed set of planner kinds the engine wires up, collapsed into one
/// handle so the episode driver doesn't need to be generic over which
/// planner an episode runs.
pub enum Planner {
    Random,
    PoUct(PoUctPlanner),
    Thompson(ThompsonPlanner),
    Abstraction(AbstractionPlanner),
}

impl Planner {
    fn select_action<D, Bel>(&self, domain: &D, belief: &Bel, history_len: usize, rng: &mut Kernel) -> (Index, usize)
    where
        D: IndexedDomain,
        Bel: Belief<D>,
        Bel::Particle: Augmented<Domain = D>,
    {
        match self {
            Planner::Random => {
                let sample = belief.sample(rng);
                let legal = domain.legal_actions(domain.index_to_state(sample.state_index()));
                (legal[rng.uniform_index(0, legal.len())], 0)
            }
            Planner::PoUct(planner) => planner.select_action(domain, belief, history_len, rng),
            Planner::Thompson(planner) => planner.select_action(domain, belief, history_len, rng),
            Planner::Abstraction(planner) => planner.select_action(domain, belief, history_len, rng),
        }
    }
}

/// Outcome of one episode: its return triple, plus the result-file
/// timing/throughput fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    pub discounted_return: Utility,
    pub steps: usize,
    pub total_simulations: usize,
    pub step_duration_mean: f64,
    pub step_simulations_mean: f64,
}

/// Runs one episode to `horizon` or until the domain reports terminal,
/// mutating `belief` in place and drawing every random choice from `rng`.
pub fn run_episode<D, Bel>(domain: &D, belief: &mut Bel, planner: &Planner, horizon: usize, discount: Discount, rng: &mut Kernel) -> Result<EpisodeResult, bap_core::EngineError>
where
    D: IndexedDomain,
    Bel: Belief<D>,
    Bel::Particle: Augmented<Domain = D>,
{
    let mut state = domain.sample_start_state(rng);
    let mut history_len = 0usize;
    let mut discount_factor = 1.0;
    let mut discounted_return = 0.0;
    let mut total_simulations = 0usize;
    let mut total_duration_secs = 0.0;

    while history_len < horizon {
        let started = Instant::now();
        let (action_index, simulations) = planner.select_action(domain, belief, history_len, rng);
        total_duration_secs += started.elapsed().as_secs_f64();
        total_simulations += simulations;

        let action = domain.index_to_action(action_index);
        let step = domain.step(state, action, rng);
        let observation_index = domain.observation_to_index(step.observation);

        discounted_return += discount_factor * step.reward;
        discount_factor *= discount;
        history_len += 1;

        if step.terminal {
            state = step.next_state;
            break;
        }
        belief.update(domain, action_index, observation_index, rng)?;
        state = step.next_state;
    }
    let _ = state;

    Ok(EpisodeResult {
        discounted_return,
        steps: history_len,
        total_simulations,
        step_duration_mean: total_duration_secs / history_len.max(1) as f64,
        step_simulations_mean: total_simulations as f64 / history_len.max(1) as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_belief::belief::RejectionSamplingBelief;
    use bap_belief::particles::FlatFilter;
    use bap_belief::BapState;
    use bap_core::{Probability, SimulationBudget};
    use bap_model::domain::{Domain, Step};
    use bap_model::{CountModel, DirichletMethod};

    #[derive(Clone, Copy)]
    struct CountUpToThree;
    impl Domain for CountUpToThree {
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
            let next = state + 1;
            Step {
                next_state: next,
                observation: next,
                reward: 1.0,
                terminal: next >= 3,
            }
        }
        fn observation_probability(&self, _a: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
            if next_state == observation { 1.0 } else { 0.0 }
        }
        fn transition_probability(&self, state: Self::State, _action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == state + 1 { 1.0 } else { 0.0 }
        }
    }
    impl IndexedDomain for CountUpToThree {
        fn state_size(&self) -> usize {
            4
        }
        fn action_size(&self) -> usize {
            1
        }
        fn observation_size(&self) -> usize {
            4
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
        fn terminal(&self, s: Self::State) -> bool {
            s >= 3
        }
        fn reward(&self, _s: Self::State, _a: Self::Action, _n: Self::State) -> Utility {
            1.0
        }
    }

    #[test]
    fn stops_at_terminal_before_horizon() {
        let domain = CountUpToThree;
        let model = CountModel::with_uniform_prior(4, 1, 4, 1.0);
        let filter = FlatFilter::new(vec![BapState::<CountUpToThree>::new(0, model)]);
        let mut belief = RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("episode-terminal-test");
        let result = run_episode(&domain, &mut belief, &Planner::Random, 10, 1.0, &mut rng).unwrap();
        assert_eq!(result.steps, 3);
        assert_eq!(result.discounted_return, 3.0);
    }

    #[test]
    fn po_uct_planner_drives_an_episode_to_the_horizon_cap() {
        let domain = CountUpToThree;
        let model = CountModel::with_uniform_prior(4, 1, 4, 1.0);
        let filter = FlatFilter::new(vec![BapState::<CountUpToThree>::new(0, model)]);
        let mut belief = RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let planner = Planner::PoUct(PoUctPlanner::new(2, 1.0, 1.0, None, SimulationBudget::Count(20), DirichletMethod::Expected));
        let mut rng = Kernel::from_seed("episode-po-uct-test");
        let result = run_episode(&domain, &mut belief, &planner, 2, 1.0, &mut rng).unwrap();
        assert_eq!(result.steps, 2);
        assert!(result.total_simulations > 0);
        assert!(result.step_simulations_mean > 0.0);
    }
}
