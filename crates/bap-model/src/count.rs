//! Flat Dirichlet count model: `T[s,a,s']` and `O[a,s',o]` pseudocount
//! tables backing one augmented (hyper-)state's dynamics belief.
//!
//! Two augmented states sampled from the same prior typically share most of
//! their counts — only the transition touched by the single step that
//! created the child differs. Rather than deep-clone the whole table on
//! every step, counts are held behind an `Arc` and only copied the moment a
//! write actually lands on a shared table (`Arc::make_mut`).

use std::sync::Arc;

use bap_core::{Count, Index, Probability};

use crate::rng::{DirichletMethod, Kernel, project, step_size};

/// Dense Dirichlet count tables over `T[s,a,s']` and `O[a,s',o]`.
///
/// Cloning a [`CountModel`] is `O(1)` (it bumps two `Arc` refcounts); the
/// underlying buffers are copied lazily the first time a clone is mutated.
#[derive(Debug, Clone)]
pub struct CountModel {
    state_size: usize,
    action_size: usize,
    observation_size: usize,
    transition_steps: [usize; 3],
    observation_steps: [usize; 3],
    transitions: Arc<Vec<Count>>,
    observations: Arc<Vec<Count>>,
}

impl CountModel {
    /// Builds a count model where every `T[s,a,·]`/`O[a,s',·]` row is the
    /// uniform Dirichlet prior: `prior_count` split evenly across the row, so
    /// each row still sums to `prior_count` rather than `prior_count` per
    /// cell.
    pub fn with_uniform_prior(state_size: usize, action_size: usize, observation_size: usize, prior_count: Count) -> Self {
        assert!(state_size > 0 && action_size > 0 && observation_size > 0);
        assert!(prior_count > 0.0, "prior pseudocount must be positive");
        let t_dims = [state_size, action_size, state_size];
        let o_dims = [action_size, state_size, observation_size];
        let transition_cell = prior_count / state_size as Count;
        let observation_cell = prior_count / observation_size as Count;
        Self {
            state_size,
            action_size,
            observation_size,
            transition_steps: step_size(&t_dims).try_into().unwrap(),
            observation_steps: step_size(&o_dims).try_into().unwrap(),
            transitions: Arc::new(vec![transition_cell; state_size * action_size * state_size]),
            observations: Arc::new(vec![observation_cell; action_size * state_size * observation_size]),
        }
    }

    /// Builds a count model whose rows are seeded from declared probability
    /// distributions rather than a flat uniform split: `T[s,a,·]` is
    /// `prior_count * transition_row(s, a)` and `O[a,s',·]` is
    /// `prior_count * observation_row(a, s')`. Each supplied row must already
    /// sum to one and have the matching length (`state_size` for transition
    /// rows, `observation_size` for observation rows), so the resulting row
    /// again sums to exactly `prior_count`.
    pub fn from_row_probabilities(
        state_size: usize,
        action_size: usize,
        observation_size: usize,
        prior_count: Count,
        mut transition_row: impl FnMut(Index, Index) -> Vec<Probability>,
        mut observation_row: impl FnMut(Index, Index) -> Vec<Probability>,
    ) -> Self {
        assert!(state_size > 0 && action_size > 0 && observation_size > 0);
        assert!(prior_count > 0.0, "prior pseudocount must be positive");
        let t_dims = [state_size, action_size, state_size];
        let o_dims = [action_size, state_size, observation_size];

        let mut transitions = vec![0.0; state_size * action_size * state_size];
        for s in 0..state_size {
            for a in 0..action_size {
                let row = transition_row(s, a);
                assert_eq!(row.len(), state_size, "transition row length must equal state_size");
                let start = project(&[s, a, 0], &t_dims);
                for (next_s, p) in row.into_iter().enumerate() {
                    transitions[start + next_s] = prior_count * p;
                }
            }
        }

        let mut observations = vec![0.0; action_size * state_size * observation_size];
        for a in 0..action_size {
            for next_s in 0..state_size {
                let row = observation_row(a, next_s);
                assert_eq!(row.len(), observation_size, "observation row length must equal observation_size");
                let start = project(&[a, next_s, 0], &o_dims);
                for (o, p) in row.into_iter().enumerate() {
                    observations[start + o] = prior_count * p;
                }
            }
        }

        Self {
            state_size,
            action_size,
            observation_size,
            transition_steps: step_size(&t_dims).try_into().unwrap(),
            observation_steps: step_size(&o_dims).try_into().unwrap(),
            transitions: Arc::new(transitions),
            observations: Arc::new(observations),
        }
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }
    pub fn action_size(&self) -> usize {
        self.action_size
    }
    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    fn transition_index(&self, s: Index, a: Index, next_s: Index) -> usize {
        project(&[s, a, next_s], &[self.state_size, self.action_size, self.state_size])
    }

    fn observation_index(&self, a: Index, next_s: Index, o: Index) -> usize {
        project(&[a, next_s, o], &[self.action_size, self.state_size, self.observation_size])
    }

    /// The `T[s, a, ·]` pseudocount row.
    pub fn transition_row(&self, s: Index, a: Index) -> &[Count] {
        let start = self.transition_index(s, a, 0);
        &self.transitions[start..start + self.state_size]
    }

    /// The `O[a, next_s, ·]` pseudocount row.
    pub fn observation_row(&self, a: Index, next_s: Index) -> &[Count] {
        let start = self.observation_index(a, next_s, 0);
        &self.observations[start..start + self.observation_size]
    }

    /// Samples (or takes the posterior mean of, per `method`) a transition
    /// distribution over next-states for `(s, a)`.
    pub fn sample_transition(&self, s: Index, a: Index, rng: &mut Kernel, method: DirichletMethod) -> Vec<Probability> {
        match method {
            DirichletMethod::Sampled => rng.sample_dirichlet(self.transition_row(s, a)),
            DirichletMethod::Expected => {
                let row = self.transition_row(s, a);
                let total: Count = row.iter().sum();
                row.iter().map(|c| c / total).collect()
            }
        }
    }

    /// Samples (or takes the posterior mean of) an observation distribution
    /// for `(a, next_s)`.
    pub fn sample_observation(&self, a: Index, next_s: Index, rng: &mut Kernel, method: DirichletMethod) -> Vec<Probability> {
        match method {
            DirichletMethod::Sampled => rng.sample_dirichlet(self.observation_row(a, next_s)),
            DirichletMethod::Expected => {
                let row = self.observation_row(a, next_s);
                let total: Count = row.iter().sum();
                row.iter().map(|c| c / total).collect()
            }
        }
    }

    /// Returns a new model with `T[s, a, next_s]` incremented by `amount`,
    /// sharing the unmodified `O` table and copying the `T` table only if
    /// another augmented state still holds a reference to it.
    pub fn with_transition_incremented(mut self, s: Index, a: Index, next_s: Index, amount: Count) -> Self {
        let idx = self.transition_index(s, a, next_s);
        Arc::make_mut(&mut self.transitions)[idx] += amount;
        self
    }

    /// Returns a new model with `O[a, next_s, o]` incremented by `amount`.
    pub fn with_observation_incremented(mut self, a: Index, next_s: Index, o: Index, amount: Count) -> Self {
        let idx = self.observation_index(a, next_s, o);
        Arc::make_mut(&mut self.observations)[idx] += amount;
        self
    }

    /// `true` if this model and `other` share the same underlying
    /// transition buffer (no writes have diverged them yet).
    pub fn shares_transitions_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.transitions, &other.transitions)
    }
}
