//! PO-UCT planner: Monte Carlo tree search over augmented-state particles,
//! addressed through a `petgraph::graph::DiGraph` grown lazily rather than
//! preallocated.
//!
//! History nodes ([`NodeKind::Action`]) alternate with chance nodes
//! ([`NodeKind::Chance`]); edges carry either the action choice or the
//! observation index that keys a chance node's children. The tree is
//! rebuilt from scratch on every call to [`PoUctPlanner::select_action`]
//! and discarded when it returns — there is nothing to explicitly free
//! since the `DiGraph` is a local and drops at the end of the call.

use std::time::Instant;

use bap_core::{Discount, Index, SimulationBudget, Utility, WALLCLOCK_CHECK_INTERVAL};
use bap_model::domain::IndexedDomain;
use bap_model::{DirichletMethod, Kernel};
use petgraph::graph::{DiGraph, NodeIndex};

use bap_belief::{Augmented, Belief};

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind {
    Action { visits: usize },
    Chance { action: Index, visits: usize, mean_return: Utility },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EdgeKind {
    Action(Index),
    Observation(Index),
}

type SearchTree = DiGraph<NodeKind, EdgeKind>;

fn find_child(tree: &SearchTree, node: NodeIndex, edge: EdgeKind) -> Option<NodeIndex> {
    tree.edges(node).find(|e| *e.weight() == edge).map(|e| e.target())
}

fn ensure_children(tree: &mut SearchTree, node: NodeIndex, legal_actions: &[Index]) {
    for &action in legal_actions {
        if find_child(tree, node, EdgeKind::Action(action)).is_none() {
            let chance = tree.add_node(NodeKind::Chance { action, visits: 0, mean_return: 0.0 });
            tree.add_edge(node, chance, EdgeKind::Action(action));
        }
    }
}

/// Plain Monte Carlo tree search with UCB1 action selection.
pub struct PoUctPlanner {
    horizon: usize,
    discount: Discount,
    exploration_constant: f64,
    max_depth: Option<usize>,
    budget: SimulationBudget,
    method: DirichletMethod,
}

impl PoUctPlanner {
    pub fn new(horizon: usize, discount: Discount, exploration_constant: f64, max_depth: Option<usize>, budget: SimulationBudget, method: DirichletMethod) -> Self {
        Self {
            horizon,
            discount,
            exploration_constant,
            max_depth,
            budget,
            method,
        }
    }

    /// Chooses an action for the current belief and history.
    /// Returns the chosen action along with the number of simulations run,
    /// which the episode driver accumulates into `step_simulations_mean`.
    pub fn select_action<D, Bel>(&self, domain: &D, belief: &Bel, history_len: usize, rng: &mut Kernel) -> (Index, usize)
    where
        D: IndexedDomain,
        Bel: Belief<D>,
        Bel::Particle: Augmented<Domain = D>,
    {
        let depth_budget = self.depth_budget(history_len);
        let seed = belief.sample(rng);
        let legal_actions = domain.legal_actions(domain.index_to_state(seed.state_index()));
        assert!(!legal_actions.is_empty(), "a planner needs at least one legal action");

        if depth_budget == 0 {
            return (legal_actions[rng.uniform_index(0, legal_actions.len())], 0);
        }

        let mut tree: SearchTree = DiGraph::new();
        let root = tree.add_node(NodeKind::Action { visits: 0 });
        ensure_children(&mut tree, root, &legal_actions);

        let start = Instant::now();
        let mut simulations = 0usize;
        loop {
            match self.budget {
                SimulationBudget::Count(n) => {
                    if simulations >= n {
                        break;
                    }
                }
                SimulationBudget::Millis(ms) => {
                    if simulations > 0 && simulations % WALLCLOCK_CHECK_INTERVAL == 0 && start.elapsed().as_millis() as u64 >= ms {
                        break;
                    }
                }
            }
            self.simulate(&mut tree, root, domain, belief, &legal_actions, depth_budget, rng);
            simulations += 1;
        }

        (self.best_action(&tree, root, &legal_actions, rng), simulations)
    }

    fn depth_budget(&self, history_len: usize) -> usize {
        let remaining = self.horizon.saturating_sub(history_len);
        self.max_depth.map_or(remaining, |cap| cap.min(remaining))
    }

    fn simulate<D, Bel>(&self, tree: &mut SearchTree, root: NodeIndex, domain: &D, belief: &Bel, legal_actions: &[Index], depth_budget: usize, rng: &mut Kernel)
    where
        D: IndexedDomain,
        Bel: Belief<D>,
        Bel::Particle: Augmented<Domain = D>,
    {
        let mut particle = belief.sample(rng);
        let mut path: Vec<(NodeIndex, NodeIndex)> = Vec::with_capacity(depth_budget);
        let mut rewards: Vec<Utility> = Vec::with_capacity(depth_budget);
        let mut node = root;
        let mut depth = 0usize;
        let mut expanded_leaf = false;

        while depth < depth_budget {
            ensure_children(tree, node, legal_actions);
            let action = self.select_ucb1(tree, node, legal_actions, rng);
            let chance = find_child(tree, node, EdgeKind::Action(action)).expect("ensure_children just populated this edge");

            let (next_particle, observation_index, reward, terminal) = particle.step(domain, action, rng, self.method);
            rewards.push(reward);
            particle = next_particle;
            depth += 1;
            path.push((node, chance));

            if terminal {
                break;
            }
            match find_child(tree, chance, EdgeKind::Observation(observation_index)) {
                Some(child) => node = child,
                None => {
                    let child = tree.add_node(NodeKind::Action { visits: 0 });
                    tree.add_edge(chance, child, EdgeKind::Observation(observation_index));
                    expanded_leaf = true;
                    break;
                }
            }
        }

        let rollout_return = if expanded_leaf {
            self.rollout(domain, &particle, depth_budget - depth, rng)
        } else {
            0.0
        };
        self.backpropagate(tree, &path, &rewards, rollout_return);
    }

    fn select_ucb1(&self, tree: &SearchTree, node: NodeIndex, legal_actions: &[Index], rng: &mut Kernel) -> Index {
        let visits = match tree[node] {
            NodeKind::Action { visits } => visits,
            NodeKind::Chance { .. } => unreachable!("select_ucb1 is only called at action nodes"),
        };
        let mut best_score = f64::NEG_INFINITY;
        let mut best_actions = Vec::new();
        for &action in legal_actions {
            let chance = find_child(tree, node, EdgeKind::Action(action)).expect("ensure_children populates every legal action");
            let score = match tree[chance] {
                NodeKind::Chance { visits: 0, .. } => f64::INFINITY,
                NodeKind::Chance { visits: n, mean_return, .. } => mean_return + self.exploration_constant * ((1.0 + visits as f64).ln() / n as f64).sqrt(),
                NodeKind::Action { .. } => unreachable!("action edges always target chance nodes"),
            };
            if score > best_score {
                best_score = score;
                best_actions.clear();
                best_actions.push(action);
            } else if score == best_score {
                best_actions.push(action);
            }
        }
        best_actions[rng.uniform_index(0, best_actions.len())]
    }

    fn rollout<D, P>(&self, domain: &D, particle: &P, depth_budget: usize, rng: &mut Kernel) -> Utility
    where
        D: IndexedDomain,
        P: Augmented<Domain = D>,
    {
        let mut particle = particle.clone();
        let mut discount = 1.0;
        let mut total = 0.0;
        for _ in 0..depth_budget {
            let legal = domain.legal_actions(domain.index_to_state(particle.state_index()));
            let action = legal[rng.uniform_index(0, legal.len())];
            let (next, _observation_index, reward, terminal) = particle.step(domain, action, rng, self.method);
            total += discount * reward;
            discount *= self.discount;
            particle = next;
            if terminal {
                break;
            }
        }
        total
    }

    fn backpropagate(&self, tree: &mut SearchTree, path: &[(NodeIndex, NodeIndex)], rewards: &[Utility], rollout_return: Utility) {
        let mut g = rollout_return;
        for (i, &(action_node, chance_node)) in path.iter().enumerate().rev() {
            g = rewards[i] + self.discount * g;
            if let NodeKind::Chance { visits, mean_return, .. } = &mut tree[chance_node] {
                *visits += 1;
                *mean_return += (g - *mean_return) / *visits as f64;
            }
            if let NodeKind::Action { visits } = &mut tree[action_node] {
                *visits += 1;
            }
        }
    }

    fn best_action(&self, tree: &SearchTree, root: NodeIndex, legal_actions: &[Index], rng: &mut Kernel) -> Index {
        let mut best_q = f64::NEG_INFINITY;
        let mut best_actions = Vec::new();
        for &action in legal_actions {
            let chance = find_child(tree, root, EdgeKind::Action(action)).expect("root always has one chance child per legal action");
            let q = match tree[chance] {
                NodeKind::Chance { mean_return, .. } => mean_return,
                NodeKind::Action { .. } => unreachable!(),
            };
            if q > best_q {
                best_q = q;
                best_actions.clear();
                best_actions.push(action);
            } else if q == best_q {
                best_actions.push(action);
            }
        }
        best_actions[rng.uniform_index(0, best_actions.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_belief::particles::FlatFilter;
    use bap_belief::{Belief as _, BapState};
    use bap_core::{Probability, SimulationBudget};
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
    impl IndexedDomain for StayFlip {
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
        fn reward(&self, _s: Self::State, action: Self::Action, _n: Self::State) -> bap_core::Utility {
            action as bap_core::Utility
        }
    }

    #[test]
    fn prefers_the_higher_reward_action() {
        let domain = StayFlip;
        let model = CountModel::with_uniform_prior(2, 2, 2, 1.0);
        let filter = FlatFilter::new(vec![BapState::<StayFlip>::new(0, model)]);
        let belief = bap_belief::belief::RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let planner = PoUctPlanner::new(3, 1.0, 1.0, None, SimulationBudget::Count(200), DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("pouct-test");
        let (action, simulations) = planner.select_action(&domain, &belief, 0, &mut rng);
        assert_eq!(action, 1);
        assert_eq!(simulations, 200);
    }

    #[test]
    fn zero_depth_budget_picks_a_legal_action() {
        let domain = StayFlip;
        let model = CountModel::with_uniform_prior(2, 2, 2, 1.0);
        let filter = FlatFilter::new(vec![BapState::<StayFlip>::new(0, model)]);
        let belief = bap_belief::belief::RejectionSamplingBelief::new(filter, DirichletMethod::Expected);
        let planner = PoUctPlanner::new(3, 1.0, 1.0, None, SimulationBudget::Count(10), DirichletMethod::Expected);
        let mut rng = Kernel::from_seed("pouct-boundary-test");
        let (action, simulations) = planner.select_action(&domain, &belief, 3, &mut rng);
        assert!(action == 0 || action == 1);
        assert_eq!(simulations, 0);
    }
}
