//! Factored (dynamic Bayesian network) dynamics model.
//!
//! A [`DbnNode`] holds the pseudocount table for one output feature
//! (a transition feature, or the observation), conditioned on the action
//! and a learned subset of the previous timestep's features — its
//! "parents". Structure search mutates the parent set one edge at a time
//! ([`DbnNode::add_parent`], [`DbnNode::marginalize_out`]) and scores
//! candidate structures with the Cooper-Herskovits Bayesian-Dirichlet
//! marginal likelihood ([`DbnNode::log_bd_score`]).
//!
//! Counts use the same `Arc`-backed copy-on-write discipline as `count.rs`.

use std::sync::Arc;

use bap_core::{Count, Index, Probability};

use crate::rng::{DirichletMethod, Kernel, log_gamma, project, project_using_step_size, step_size};

/// One output feature's conditional pseudocount table: `rows` indexed by
/// `(action, parent feature values...)`, each row of length `output_size`.
#[derive(Debug, Clone)]
pub struct DbnNode {
    output_size: usize,
    action_size: usize,
    /// Indices (into the previous timestep's feature vector) this node
    /// conditions on, in the order they appear after the action in the row
    /// index.
    parents: Vec<usize>,
    parent_sizes: Vec<usize>,
    row_dims: Vec<usize>,
    row_steps: Vec<usize>,
    /// Fixed prior pseudocounts laid down at construction/structure-change
    /// time; never mutated after. Used by [`DbnNode::log_bd_score`].
    prior: Arc<Vec<Count>>,
    /// Prior plus every observed increment since.
    counts: Arc<Vec<Count>>,
}

impl DbnNode {
    /// Builds a parentless node (output depends only on the action) with a
    /// uniform Dirichlet prior.
    pub fn with_uniform_prior(output_size: usize, action_size: usize, prior_count: Count) -> Self {
        assert!(output_size > 0 && action_size > 0);
        let row_dims = vec![action_size];
        let total_rows = action_size;
        let buffer = Arc::new(vec![prior_count; total_rows * output_size]);
        Self {
            output_size,
            action_size,
            parents: Vec::new(),
            parent_sizes: Vec::new(),
            row_dims: row_dims.clone(),
            row_steps: step_size(&row_dims),
            prior: buffer.clone(),
            counts: buffer,
        }
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    fn row_index(&self, action: usize, parent_values: &[usize]) -> usize {
        assert_eq!(parent_values.len(), self.parents.len());
        let mut key = Vec::with_capacity(1 + parent_values.len());
        key.push(action);
        key.extend_from_slice(parent_values);
        project(&key, &self.row_dims) * self.output_size
    }

    /// The pseudocount row for `(action, parent_values)`.
    pub fn row(&self, action: usize, parent_values: &[usize]) -> &[Count] {
        let start = self.row_index(action, parent_values);
        &self.counts[start..start + self.output_size]
    }

    /// Returns a new node with `output_value`'s count in the row for
    /// `(action, parent_values)` incremented by `amount`.
    pub fn with_incremented(mut self, action: usize, parent_values: &[usize], output_value: usize, amount: Count) -> Self {
        let start = self.row_index(action, parent_values);
        Arc::make_mut(&mut self.counts)[start + output_value] += amount;
        self
    }

    /// Adds `feature_index` (of size `feature_size`) as a new parent. Each
    /// existing row is replicated across the new parent's values, splitting
    /// its pseudocount evenly so the row's total pseudocount mass — and
    /// hence the posterior mean it encodes — is unchanged. Both `prior` and
    /// `counts` are rebuilt from scratch (the new edge has no history to
    /// preserve beyond the evenly split prior).
    pub fn add_parent(&self, feature_index: usize, feature_size: usize) -> Self {
        assert!(
            !self.parents.contains(&feature_index),
            "feature {feature_index} is already a parent"
        );
        let mut parents = self.parents.clone();
        let mut parent_sizes = self.parent_sizes.clone();
        parents.push(feature_index);
        parent_sizes.push(feature_size);

        let mut row_dims = self.row_dims.clone();
        row_dims.push(feature_size);
        let row_steps = step_size(&row_dims);

        let old_rows = self.row_dims.iter().product::<usize>();
        let new_rows = row_dims.iter().product::<usize>();
        let mut prior = vec![0.0; new_rows * self.output_size];
        let mut counts = vec![0.0; new_rows * self.output_size];
        for old_row in 0..old_rows {
            let old_start = old_row * self.output_size;
            for new_value in 0..feature_size {
                let new_row = old_row * feature_size + new_value;
                let new_start = new_row * self.output_size;
                for k in 0..self.output_size {
                    prior[new_start + k] = self.prior[old_start + k] / feature_size as Count;
                    counts[new_start + k] = self.counts[old_start + k] / feature_size as Count;
                }
            }
        }

        Self {
            output_size: self.output_size,
            action_size: self.action_size,
            parents,
            parent_sizes,
            row_dims,
            row_steps,
            prior: Arc::new(prior),
            counts: Arc::new(counts),
        }
    }

    /// Removes `feature_index` from the parent set by summing its
    /// pseudocounts out (marginalizing), the inverse of [`Self::add_parent`].
    pub fn marginalize_out(&self, feature_index: usize) -> Self {
        let position = self
            .parents
            .iter()
            .position(|&p| p == feature_index)
            .expect("feature is not a parent of this node");

        let mut parents = self.parents.clone();
        let mut parent_sizes = self.parent_sizes.clone();
        let removed_size = parent_sizes.remove(position);
        parents.remove(position);

        let mut row_dims = self.row_dims.clone();
        row_dims.remove(position + 1); // +1: action occupies row_dims[0]
        let row_steps = step_size(&row_dims);

        let new_rows = row_dims.iter().product::<usize>();
        let mut prior = vec![0.0; new_rows * self.output_size];
        let mut counts = vec![0.0; new_rows * self.output_size];

        let old_rows = self.row_dims.iter().product::<usize>();
        for old_row in 0..old_rows {
            let mut tuple = project_using_step_size(old_row, &self.row_steps);
            let marginalized_value = tuple.remove(position + 1);
            let _ = marginalized_value;
            let new_row = project(&tuple, &row_dims);
            let old_start = old_row * self.output_size;
            let new_start = new_row * self.output_size;
            for k in 0..self.output_size {
                prior[new_start + k] += self.prior[old_start + k];
                counts[new_start + k] += self.counts[old_start + k];
            }
        }
        let _ = removed_size;

        Self {
            output_size: self.output_size,
            action_size: self.action_size,
            parents,
            parent_sizes,
            row_dims,
            row_steps,
            prior: Arc::new(prior),
            counts: Arc::new(counts),
        }
    }

    /// Marginalizes out every current parent not present in
    /// `target_parents`, assuming `target_parents` is a subset of
    /// `self.parents()` — the breeding operator's reconciliation step: a
    /// "fully connected" donor always has every feature as a parent, so it
    /// can always be restricted down to any mutated, smaller structure by
    /// repeated marginalization. A no-op (identity) when
    /// `self.parents() == target_parents`.
    pub fn restrict_to(&self, target_parents: &[usize]) -> Self {
        let mut node = self.clone();
        loop {
            let extra = node.parents.iter().find(|p| !target_parents.contains(p)).copied();
            match extra {
                Some(feature) => node = node.marginalize_out(feature),
                None => break,
            }
        }
        node
    }

    /// Cooper-Herskovits Bayesian-Dirichlet marginal log-likelihood of this
    /// node's observed counts given its prior, summed over every row:
    /// `sum_row[ lgamma(sum(prior)) - lgamma(sum(counts))
    ///           + sum_k(lgamma(counts[k]) - lgamma(prior[k])) ]`.
    /// Higher is better; used to rank candidate parent sets during
    /// structure search.
    pub fn log_bd_score(&self) -> f64 {
        let rows = self.row_dims.iter().product::<usize>();
        let mut score = 0.0;
        for row in 0..rows {
            let start = row * self.output_size;
            let prior_row = &self.prior[start..start + self.output_size];
            let counts_row = &self.counts[start..start + self.output_size];
            let prior_sum: Count = prior_row.iter().sum();
            let counts_sum: Count = counts_row.iter().sum();
            score += log_gamma(prior_sum) - log_gamma(counts_sum);
            for k in 0..self.output_size {
                score += log_gamma(counts_row[k]) - log_gamma(prior_row[k]);
            }
        }
        score
    }

    /// Draws (or takes the posterior mean of, per `method`) an output index
    /// from this node's row for `(action, parent_values)`.
    pub fn sample_index(&self, action: usize, parent_values: &[usize], rng: &mut Kernel, method: DirichletMethod) -> Index {
        let row = self.row(action, parent_values);
        rng.sample_dirichlet_index(row, method)
            .expect("dbn row pseudocount sum underflowed")
    }

    /// Probability of output index `value` in this node's row for
    /// `(action, parent_values)`.
    pub fn probability(&self, action: usize, parent_values: &[usize], value: usize) -> Probability {
        let row = self.row(action, parent_values);
        let total: Count = row.iter().sum();
        row[value] / total
    }
}

/// A factored dynamics model: one [`DbnNode`] per next-state feature plus
/// one for the observation, each conditioned on the action and its own
/// learned parent subset of the *previous* timestep's features.
#[derive(Debug, Clone)]
pub struct DbnModel {
    feature_sizes: Vec<usize>,
    action_size: usize,
    observation_size: usize,
    transition_nodes: Vec<DbnNode>,
    observation_node: DbnNode,
}

impl DbnModel {
    /// Builds a model where every feature and the observation start
    /// parentless (independent of the previous state given the action),
    /// the natural starting point before structure search adds edges.
    pub fn independent(feature_sizes: Vec<usize>, action_size: usize, observation_size: usize, prior_count: Count) -> Self {
        assert!(!feature_sizes.is_empty());
        let transition_nodes = feature_sizes
            .iter()
            .map(|&size| DbnNode::with_uniform_prior(size, action_size, prior_count))
            .collect();
        let observation_node = DbnNode::with_uniform_prior(observation_size, action_size, prior_count);
        Self {
            feature_sizes,
            action_size,
            observation_size,
            transition_nodes,
            observation_node,
        }
    }

    pub fn feature_sizes(&self) -> &[usize] {
        &self.feature_sizes
    }
    pub fn action_size(&self) -> usize {
        self.action_size
    }
    pub fn observation_size(&self) -> usize {
        self.observation_size
    }
    pub fn transition_node(&self, feature: usize) -> &DbnNode {
        &self.transition_nodes[feature]
    }
    pub fn observation_node(&self) -> &DbnNode {
        &self.observation_node
    }

    fn parent_values_for(node: &DbnNode, features: &[usize]) -> Vec<usize> {
        node.parents().iter().map(|&p| features[p]).collect()
    }

    /// Samples a full next-feature vector given the previous feature vector
    /// and action, one node at a time.
    pub fn sample_next_features(&self, features: &[usize], action: usize, rng: &mut Kernel, method: DirichletMethod) -> Vec<usize> {
        self.transition_nodes
            .iter()
            .map(|node| {
                let parent_values = Self::parent_values_for(node, features);
                node.sample_index(action, &parent_values, rng, method)
            })
            .collect()
    }

    /// Samples an observation index given the action and resulting
    /// next-feature vector.
    pub fn sample_observation(&self, next_features: &[usize], action: usize, rng: &mut Kernel, method: DirichletMethod) -> Index {
        let parent_values = Self::parent_values_for(&self.observation_node, next_features);
        self.observation_node.sample_index(action, &parent_values, rng, method)
    }

    /// Probability of `observation` given `action` and `next_features`.
    pub fn observation_probability(&self, next_features: &[usize], action: usize, observation: usize) -> Probability {
        let parent_values = Self::parent_values_for(&self.observation_node, next_features);
        self.observation_node.probability(action, &parent_values, observation)
    }

    /// Returns a new model with feature node `feature`'s count for
    /// `(action, previous parent values, output value)` incremented.
    pub fn with_transition_incremented(mut self, feature: usize, features: &[usize], action: usize, output_value: usize, amount: Count) -> Self {
        let parent_values = Self::parent_values_for(&self.transition_nodes[feature], features);
        self.transition_nodes[feature] = self.transition_nodes[feature].clone().with_incremented(action, &parent_values, output_value, amount);
        self
    }

    /// Returns a new model with the observation node's count for `(action,
    /// next feature parent values, observation)` incremented.
    pub fn with_observation_incremented(mut self, next_features: &[usize], action: usize, observation: usize, amount: Count) -> Self {
        let parent_values = Self::parent_values_for(&self.observation_node, next_features);
        self.observation_node = self.observation_node.clone().with_incremented(action, &parent_values, observation, amount);
        self
    }

    /// Replaces feature node `feature`'s structure/counts wholesale, the
    /// hook structure search uses after picking a new parent set.
    pub fn with_transition_node(mut self, feature: usize, node: DbnNode) -> Self {
        self.transition_nodes[feature] = node;
        self
    }

    /// Replaces the observation node wholesale.
    pub fn with_observation_node(mut self, node: DbnNode) -> Self {
        self.observation_node = node;
        self
    }

    /// Sum of every transition node's [`DbnNode::log_bd_score`], the
    /// model-level structure score.
    pub fn log_bd_score(&self) -> f64 {
        self.transition_nodes.iter().map(DbnNode::log_bd_score).sum::<f64>() + self.observation_node.log_bd_score()
    }
}

/// Picks a random eligible parent feature (one not already a parent, the
/// node's own output feature excluded) and flips its membership: removes it
/// if present, adds it otherwise. Returns the mutated node and, if a parent
/// was added, the feature index that was added (for bookkeeping by the
/// caller's structure search).
pub fn flip_random_edge(
    node: &DbnNode,
    own_feature: usize,
    feature_sizes: &[usize],
    max_parents: usize,
    rng: &mut Kernel,
) -> DbnNode {
    let candidates: Vec<usize> = (0..feature_sizes.len()).filter(|&f| f != own_feature).collect();
    assert!(!candidates.is_empty(), "no candidate parent features available");
    let pick = candidates[rng.uniform_index(0, candidates.len())];
    if node.parents().contains(&pick) {
        node.marginalize_out(pick)
    } else if node.parents().len() < max_parents {
        node.add_parent(pick, feature_sizes[pick])
    } else {
        node.clone()
    }
}
