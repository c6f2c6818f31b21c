//! Prior factory: builds the initial dynamics model an episode's particles
//! start from, and mutates a factored model's structure during belief
//! updates that search over DBN edges.
//!
//! Three structural starting points are supported, selected by
//! [`bap_core::StructurePrior`]: independent ("uniform" / default
//! `match-counts`, since without a domain-specific template there is
//! nothing but counts to match — structure search discovers real edges from
//! there), and `fully-connected` (every feature wired to every other
//! feature and the action, the most expressive and slowest-mixing starting
//! point). A genuine "correctly connected" template — a hand-authored
//! per-domain DBN skeleton — is domain knowledge this generic engine does
//! not have; see `DESIGN.md` for that Open Question's resolution.

use bap_core::{Count, Probability, StructurePrior};
use bap_model::dbn::flip_random_edge;
use bap_model::domain::IndexedDomain;
use bap_model::{CountModel, DbnModel, Kernel};

/// Builds the flat prior for `bap-belief::augmented::BapState` particles:
/// `T[s,a,s'] = C·P_domain(s'|s,a)` and `O[a,s',o] = C·P_domain(o|a,s')`,
/// read straight off the domain's declared dynamics rather than guessed
/// uniformly, so a fresh particle's weights already discriminate between
/// models that do and don't explain an observed transition.
pub struct FlatPrior;

impl FlatPrior {
    /// `noise` blends each row toward uniform before it's scaled by
    /// `prior_count`: `(1 - noise) * p_true + noise / row_len`, clamped at
    /// zero and renormalized. `noise == 0.0` reproduces the domain's true
    /// dynamics exactly; negative `noise` (within the validated `(-0.5,
    /// 0.5)` range) sharpens away from uniform instead of smoothing toward
    /// it.
    pub fn build<D: IndexedDomain>(domain: &D, prior_count: Count, noise: f64) -> CountModel {
        let state_size = domain.state_size();
        let observation_size = domain.observation_size();

        CountModel::from_row_probabilities(
            state_size,
            domain.action_size(),
            observation_size,
            prior_count,
            |s, a| {
                let state = domain.index_to_state(s);
                let action = domain.index_to_action(a);
                let row: Vec<Probability> = (0..state_size)
                    .map(|next_s| domain.transition_probability(state, action, domain.index_to_state(next_s)))
                    .collect();
                smooth_row(row, noise)
            },
            |a, next_s| {
                let action = domain.index_to_action(a);
                let next_state = domain.index_to_state(next_s);
                let row: Vec<Probability> = (0..observation_size)
                    .map(|o| domain.observation_probability(action, next_state, domain.index_to_observation(o)))
                    .collect();
                smooth_row(row, noise)
            },
        )
    }
}

/// Label-smooths a probability row toward uniform by `noise`, clamping
/// negative mass at zero and renormalizing so the row still sums to one.
fn smooth_row(probabilities: Vec<Probability>, noise: f64) -> Vec<Probability> {
    let size = probabilities.len() as f64;
    let mut row: Vec<Probability> = probabilities.into_iter().map(|p| ((1.0 - noise) * p + noise / size).max(0.0)).collect();
    let total: Probability = row.iter().sum();
    if total > 0.0 {
        for p in &mut row {
            *p /= total;
        }
    }
    row
}

/// Builds the factored prior for `bap-belief::augmented::FbapState`
/// particles, per the chosen [`StructurePrior`] keyword.
pub struct FactoredPrior;

impl FactoredPrior {
    pub fn build(
        feature_sizes: Vec<usize>,
        action_size: usize,
        observation_size: usize,
        structure: StructurePrior,
        prior_count: Count,
    ) -> DbnModel {
        let model = DbnModel::independent(feature_sizes.clone(), action_size, observation_size, prior_count);
        match structure {
            StructurePrior::Uniform | StructurePrior::MatchCounts | StructurePrior::MatchUniform => model,
            StructurePrior::FullyConnected => Self::fully_connect(model, &feature_sizes),
        }
    }

    /// Wires every transition node (and the observation node) to every
    /// other feature, the maximally expressive (and maximally
    /// slow-to-learn) structure.
    fn fully_connect(mut model: DbnModel, feature_sizes: &[usize]) -> DbnModel {
        for feature in 0..feature_sizes.len() {
            let mut node = model.transition_node(feature).clone();
            for (parent, &size) in feature_sizes.iter().enumerate() {
                if parent != feature {
                    node = node.add_parent(parent, size);
                }
            }
            model = model.with_transition_node(feature, node);
        }
        let mut observation_node = model.observation_node().clone();
        for (parent, &size) in feature_sizes.iter().enumerate() {
            observation_node = observation_node.add_parent(parent, size);
        }
        model.with_observation_node(observation_node)
    }
}

/// Proposes one structure-search step: picks a uniformly random transition
/// node and flips one of its candidate parent edges, bounding the parent
/// count at `max_parents`. Used by the MH-within-Gibbs and nested belief
/// strategies' structure-sampling sweep.
pub fn mutate(model: &DbnModel, max_parents: usize, rng: &mut Kernel) -> DbnModel {
    let feature_sizes = model.feature_sizes().to_vec();
    let feature = rng.uniform_index(0, feature_sizes.len());
    let node = model.transition_node(feature);
    let mutated = flip_random_edge(node, feature, &feature_sizes, max_parents, rng);
    model.clone().with_transition_node(feature, mutated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_structure_leaves_nodes_parentless() {
        let model = FactoredPrior::build(vec![2, 2], 2, 2, StructurePrior::Uniform, 1.0);
        assert!(model.transition_node(0).parents().is_empty());
        assert!(model.transition_node(1).parents().is_empty());
    }

    #[test]
    fn fully_connected_wires_every_other_feature() {
        let model = FactoredPrior::build(vec![2, 3, 2], 2, 2, StructurePrior::FullyConnected, 1.0);
        assert_eq!(model.transition_node(0).parents().len(), 2);
        assert_eq!(model.observation_node().parents().len(), 3);
    }

    #[test]
    fn mutate_changes_exactly_one_node_parent_set() {
        let model = FactoredPrior::build(vec![2, 2, 2], 2, 2, StructurePrior::Uniform, 1.0);
        let mut rng = Kernel::from_seed("mutate-test");
        let mutated = mutate(&model, 2, &mut rng);
        let changed = (0..3).filter(|&f| model.transition_node(f).parents() != mutated.transition_node(f).parents()).count();
        assert_eq!(changed, 1);
    }
}
