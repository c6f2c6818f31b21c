//! Augmented (hyper-)state: a domain state paired with one dynamics model,
//! the unit a particle filter resamples over.
//!
//! [`BapState`] pairs a domain state with a flat [`CountModel`]; [`FbapState`]
//! pairs it with a factored [`DbnModel`]. Both share the [`Augmented`]
//! trait so belief strategies (`belief.rs`) and the planner can be generic
//! over which dynamics representation is in play. [`AbstractFbapState`]
//! wraps an `FbapState` and additionally restricts which features get
//! counted on each step, backing the abstraction planner.
//!
//! Every augmented state is a plain value: stepping it returns a *new*
//! augmented state rather than mutating in place, so a particle filter can
//! hold many independent trajectories that fan out from a shared prior
//! without ever aliasing another particle's counts.

use bap_core::{Index, Probability, Utility};
use bap_model::domain::{FactoredDomain, IndexedDomain};
use bap_model::{CountModel, DbnModel, DirichletMethod, Kernel};

/// Shared surface over flat and factored augmented states.
pub trait Augmented: Clone {
    /// The concrete domain this augmented state tracks counts for.
    type Domain: IndexedDomain;

    fn state_index(&self) -> Index;

    /// Advances the augmented state by sampling a next state and
    /// observation from the *model's* learned dynamics (not the true
    /// domain), then folding that transition into the returned state's
    /// counts. Returns `(next_state, observation_index, reward, terminal)`.
    fn step(
        &self,
        domain: &Self::Domain,
        action_index: Index,
        rng: &mut Kernel,
        method: DirichletMethod,
    ) -> (Self, Index, Utility, bool);

    /// `P(observation | action, next_state)` under this state's model,
    /// used by belief strategies that weight or reject on observation
    /// likelihood.
    fn observation_probability(&self, next_state_index: Index, action_index: Index, observation_index: Index) -> Probability;

    /// Redraws this particle's domain-state component from `domain`'s start
    /// distribution, keeping its learned dynamics model unchanged. Used by
    /// `reset_domain_state_distribution` when a belief carries learned
    /// counts across episodes but needs a fresh domain-state draw.
    fn reset_state(&self, domain: &Self::Domain, rng: &mut Kernel) -> Self;

    /// Advances the augmented state by sampling only a next state from the
    /// model's transition row, then folding the *actually observed*
    /// `observation_index` into the returned state's counts (rather than a
    /// resampled one). Returns `(next_state, reward, terminal,
    /// likelihood)`, where `likelihood` is `P(observation_index | action,
    /// next_state)` computed against this particle's pre-update model — the
    /// per-particle importance weight factor the importance-sampling family
    /// of belief strategies multiplies into their running weight.
    fn step_given_observation(
        &self,
        domain: &Self::Domain,
        action_index: Index,
        observation_index: Index,
        rng: &mut Kernel,
        method: DirichletMethod,
    ) -> (Self, Utility, bool, Probability);
}

/// A domain state plus a flat `T[s,a,s']`/`O[a,s',o]` count model.
#[derive(Debug, Clone)]
pub struct BapState<D: IndexedDomain> {
    state_index: Index,
    model: CountModel,
    /// Verbose-trace display hint; never read by planning or belief logic.
    display: Option<String>,
    _domain: std::marker::PhantomData<D>,
}

impl<D: IndexedDomain> BapState<D> {
    pub fn new(state_index: Index, model: CountModel) -> Self {
        Self {
            state_index,
            model,
            display: None,
            _domain: std::marker::PhantomData,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn model(&self) -> &CountModel {
        &self.model
    }
}

impl<D: IndexedDomain> Augmented for BapState<D> {
    type Domain = D;

    fn state_index(&self) -> Index {
        self.state_index
    }

    fn step(&self, domain: &D, action_index: Index, rng: &mut Kernel, method: DirichletMethod) -> (Self, Index, Utility, bool) {
        let transition_row = self.model.sample_transition(self.state_index, action_index, rng, method);
        let total: Probability = transition_row.iter().sum();
        let next_state_index = rng.sample_multinomial(&transition_row, total.max(f64::MIN_POSITIVE));

        let observation_row = self.model.sample_observation(action_index, next_state_index, rng, method);
        let obs_total: Probability = observation_row.iter().sum();
        let observation_index = rng.sample_multinomial(&observation_row, obs_total.max(f64::MIN_POSITIVE));

        let state = domain.index_to_state(self.state_index);
        let action = domain.index_to_action(action_index);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let model = self
            .model
            .clone()
            .with_transition_incremented(self.state_index, action_index, next_state_index, 1.0)
            .with_observation_incremented(action_index, next_state_index, observation_index, 1.0);

        (
            Self {
                state_index: next_state_index,
                model,
                display: self.display.clone(),
                _domain: std::marker::PhantomData,
            },
            observation_index,
            reward,
            terminal,
        )
    }

    fn observation_probability(&self, next_state_index: Index, action_index: Index, observation_index: Index) -> Probability {
        let row = self.model.observation_row(action_index, next_state_index);
        let total: Probability = row.iter().sum();
        row[observation_index] / total
    }

    fn reset_state(&self, domain: &D, rng: &mut Kernel) -> Self {
        Self {
            state_index: domain.state_prior_index(rng),
            model: self.model.clone(),
            display: self.display.clone(),
            _domain: std::marker::PhantomData,
        }
    }

    fn step_given_observation(
        &self,
        domain: &D,
        action_index: Index,
        observation_index: Index,
        rng: &mut Kernel,
        method: DirichletMethod,
    ) -> (Self, Utility, bool, Probability) {
        let transition_row = self.model.sample_transition(self.state_index, action_index, rng, method);
        let total: Probability = transition_row.iter().sum();
        let next_state_index = rng.sample_multinomial(&transition_row, total.max(f64::MIN_POSITIVE));

        let likelihood = self.observation_probability(next_state_index, action_index, observation_index);

        let state = domain.index_to_state(self.state_index);
        let action = domain.index_to_action(action_index);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let model = self
            .model
            .clone()
            .with_transition_incremented(self.state_index, action_index, next_state_index, 1.0)
            .with_observation_incremented(action_index, next_state_index, observation_index, 1.0);

        (
            Self {
                state_index: next_state_index,
                model,
                display: self.display.clone(),
                _domain: std::marker::PhantomData,
            },
            reward,
            terminal,
            likelihood,
        )
    }
}

/// A factored domain state: a feature-index vector plus a [`DbnModel`].
#[derive(Debug, Clone)]
pub struct FbapState<D: FactoredDomain> {
    features: Vec<usize>,
    model: DbnModel,
    display: Option<String>,
    _domain: std::marker::PhantomData<D>,
}

impl<D: FactoredDomain> FbapState<D> {
    pub fn new(features: Vec<usize>, model: DbnModel) -> Self {
        Self {
            features,
            model,
            display: None,
            _domain: std::marker::PhantomData,
        }
    }

    pub fn features(&self) -> &[usize] {
        &self.features
    }

    pub fn model(&self) -> &DbnModel {
        &self.model
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

impl<D: FactoredDomain> Augmented for FbapState<D> {
    type Domain = D;

    fn state_index(&self) -> Index {
        bap_model::rng::project(&self.features, &self.model.feature_sizes().to_vec())
    }

    fn step(&self, domain: &D, action_index: Index, rng: &mut Kernel, method: DirichletMethod) -> (Self, Index, Utility, bool) {
        let next_features = self.model.sample_next_features(&self.features, action_index, rng, method);
        let observation_index = self.model.sample_observation(&next_features, action_index, rng, method);

        let state = domain.index_to_state(self.state_index());
        let action = domain.index_to_action(action_index);
        let next_state_index = domain.features_to_state(&next_features);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let mut model = self.model.clone();
        for (feature, &value) in next_features.iter().enumerate() {
            model = model.with_transition_incremented(feature, &self.features, action_index, value, 1.0);
        }
        model = model.with_observation_incremented(&next_features, action_index, observation_index, 1.0);

        (
            Self {
                features: next_features,
                model,
                display: self.display.clone(),
                _domain: std::marker::PhantomData,
            },
            observation_index,
            reward,
            terminal,
        )
    }

    fn observation_probability(&self, next_state_index: Index, action_index: Index, observation_index: Index) -> Probability {
        let next_features = bap_model::rng::project_using_dimensions(next_state_index, &self.model.feature_sizes().to_vec());
        self.model.observation_probability(&next_features, action_index, observation_index)
    }

    fn reset_state(&self, domain: &D, rng: &mut Kernel) -> Self {
        let index = domain.state_prior_index(rng);
        Self {
            features: domain.state_to_features(index),
            model: self.model.clone(),
            display: self.display.clone(),
            _domain: std::marker::PhantomData,
        }
    }

    fn step_given_observation(
        &self,
        domain: &D,
        action_index: Index,
        observation_index: Index,
        rng: &mut Kernel,
        method: DirichletMethod,
    ) -> (Self, Utility, bool, Probability) {
        let next_features = self.model.sample_next_features(&self.features, action_index, rng, method);
        let likelihood = self.model.observation_probability(&next_features, action_index, observation_index);

        let state = domain.index_to_state(self.state_index());
        let action = domain.index_to_action(action_index);
        let next_state_index = domain.features_to_state(&next_features);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let mut model = self.model.clone();
        for (feature, &value) in next_features.iter().enumerate() {
            model = model.with_transition_incremented(feature, &self.features, action_index, value, 1.0);
        }
        model = model.with_observation_incremented(&next_features, action_index, observation_index, 1.0);

        (
            Self {
                features: next_features,
                model,
                display: self.display.clone(),
                _domain: std::marker::PhantomData,
            },
            reward,
            terminal,
            likelihood,
        )
    }
}

/// Wraps an [`FbapState`] with a tier that restricts which features get
/// incremented on each step — the abstraction planner's "only count the top
/// `k` most-visited features" policy.
#[derive(Debug, Clone)]
pub struct AbstractFbapState<D: FactoredDomain> {
    inner: FbapState<D>,
    /// Feature indices eligible to have their counts incremented.
    tracked_features: Vec<usize>,
}

impl<D: FactoredDomain> AbstractFbapState<D> {
    pub fn new(inner: FbapState<D>, tracked_features: Vec<usize>) -> Self {
        Self { inner, tracked_features }
    }

    pub fn inner(&self) -> &FbapState<D> {
        &self.inner
    }

    /// Increments counts only for features in `tracked_features`, leaving
    /// the rest of the model untouched even though the full feature vector
    /// still advances.
    fn increment_counts_of(&self, next_features: &[usize], action_index: Index, observation_index: Index) -> DbnModel {
        let mut model = self.inner.model().clone();
        for &feature in &self.tracked_features {
            model = model.with_transition_incremented(feature, self.inner.features(), action_index, next_features[feature], 1.0);
        }
        model.with_observation_incremented(next_features, action_index, observation_index, 1.0)
    }
}

impl<D: FactoredDomain> Augmented for AbstractFbapState<D> {
    type Domain = D;

    fn state_index(&self) -> Index {
        self.inner.state_index()
    }

    fn step(&self, domain: &D, action_index: Index, rng: &mut Kernel, method: DirichletMethod) -> (Self, Index, Utility, bool) {
        let next_features = self
            .inner
            .model()
            .sample_next_features(self.inner.features(), action_index, rng, method);
        let observation_index = self.inner.model().sample_observation(&next_features, action_index, rng, method);

        let state = domain.index_to_state(self.inner.state_index());
        let action = domain.index_to_action(action_index);
        let next_state_index = domain.features_to_state(&next_features);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let model = self.increment_counts_of(&next_features, action_index, observation_index);
        let inner = FbapState::new(next_features, model);

        (
            Self {
                inner,
                tracked_features: self.tracked_features.clone(),
            },
            observation_index,
            reward,
            terminal,
        )
    }

    fn observation_probability(&self, next_state_index: Index, action_index: Index, observation_index: Index) -> Probability {
        self.inner.observation_probability(next_state_index, action_index, observation_index)
    }

    fn reset_state(&self, domain: &D, rng: &mut Kernel) -> Self {
        Self {
            inner: self.inner.reset_state(domain, rng),
            tracked_features: self.tracked_features.clone(),
        }
    }

    fn step_given_observation(
        &self,
        domain: &D,
        action_index: Index,
        observation_index: Index,
        rng: &mut Kernel,
        method: DirichletMethod,
    ) -> (Self, Utility, bool, Probability) {
        let next_features = self
            .inner
            .model()
            .sample_next_features(self.inner.features(), action_index, rng, method);
        let likelihood = self.inner.model().observation_probability(&next_features, action_index, observation_index);

        let state = domain.index_to_state(self.inner.state_index());
        let action = domain.index_to_action(action_index);
        let next_state_index = domain.features_to_state(&next_features);
        let next_state = domain.index_to_state(next_state_index);
        let reward = domain.reward(state, action, next_state);
        let terminal = domain.terminal(next_state);

        let model = self.increment_counts_of(&next_features, action_index, observation_index);
        let inner = FbapState::new(next_features, model);

        (
            Self {
                inner,
                tracked_features: self.tracked_features.clone(),
            },
            reward,
            terminal,
            likelihood,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_model::domain::{Domain, Step};

    #[derive(Clone, Copy)]
    struct TwoState;

    impl Domain for TwoState {
        type State = usize;
        type Action = usize;
        type Observation = usize;

        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            0
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![0, 1]
        }
        fn step(&self, state: Self::State, action: Self::Action, _rng: &mut Kernel) -> Step<Self::State, Self::Observation> {
            Step {
                next_state: action,
                observation: action,
                reward: if action == 1 { 1.0 } else { 0.0 },
                terminal: state == 1,
            }
        }
        fn observation_probability(&self, _action: Self::Action, next_state: Self::State, observation: Self::Observation) -> Probability {
            if next_state == observation { 1.0 } else { 0.0 }
        }
        fn transition_probability(&self, _state: Self::State, action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == action { 1.0 } else { 0.0 }
        }
    }

    impl IndexedDomain for TwoState {
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
            action
        }
        fn index_to_action(&self, index: Index) -> Self::Action {
            index
        }
        fn observation_to_index(&self, observation: Self::Observation) -> Index {
            observation
        }
        fn index_to_observation(&self, index: Index) -> Self::Observation {
            index
        }
        fn terminal(&self, state: Self::State) -> bool {
            state == 1
        }
        fn reward(&self, _state: Self::State, action: Self::Action, _next_state: Self::State) -> Utility {
            action as Utility
        }
    }

    #[test]
    fn stepping_increments_the_visited_transition() {
        let domain = TwoState;
        let model = CountModel::with_uniform_prior(2, 2, 2, 1.0);
        let state = BapState::new(0, model);
        let mut rng = Kernel::from_seed("augmented-test");
        let (next, _obs, reward, _terminal) = state.step(&domain, 1, &mut rng, DirichletMethod::Expected);
        assert_eq!(reward, 1.0);
        assert!(next.model().transition_row(0, 1)[next.state_index()] > state.model().transition_row(0, 1)[next.state_index()]);
    }

    #[test]
    fn step_given_observation_increments_the_supplied_observation_not_a_resampled_one() {
        let domain = TwoState;
        let model = CountModel::with_uniform_prior(2, 2, 2, 1.0);
        let state = BapState::new(0, model);
        let mut rng = Kernel::from_seed("step-given-obs-test");
        let (next, reward, _terminal, likelihood) = state.step_given_observation(&domain, 1, 0, &mut rng, DirichletMethod::Expected);
        assert_eq!(reward, 1.0);
        assert!((0.0..=1.0).contains(&likelihood));
        let next_state = next.state_index();
        assert!(next.model().observation_row(1, next_state)[0] > state.model().observation_row(1, next_state)[0]);
    }
}
