//! Particle filters over augmented states.
//!
//! [`FlatFilter`] holds an unweighted particle set — every belief strategy
//! that resamples uniformly (rejection sampling, reinvigoration, the
//! incubator) stores its particles here. [`WeightedFilter`] additionally
//! tracks an importance weight per particle, used by importance sampling
//! and as the staging area before systematic resampling collapses a
//! weighted set back down to a flat one.

use bap_core::{EngineError, Probability};

use crate::augmented::Augmented;
use bap_model::Kernel;

/// An unweighted particle set. Particles are stored densely; `replace`
/// overwrites one slot in place (the common case: swap out a rejected or
/// least-likely particle), `add`/`free` grow or clear the set.
#[derive(Debug, Clone)]
pub struct FlatFilter<A: Augmented> {
    particles: Vec<A>,
}

impl<A: Augmented> FlatFilter<A> {
    pub fn new(particles: Vec<A>) -> Self {
        assert!(!particles.is_empty(), "a particle filter must start non-empty");
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[A] {
        &self.particles
    }

    /// Draws one particle index uniformly at random.
    pub fn sample_index(&self, rng: &mut Kernel) -> usize {
        rng.uniform_index(0, self.particles.len())
    }

    /// Draws one particle uniformly at random.
    pub fn sample(&self, rng: &mut Kernel) -> &A {
        &self.particles[self.sample_index(rng)]
    }

    /// Overwrites the particle at `index`.
    pub fn replace(&mut self, index: usize, particle: A) {
        self.particles[index] = particle;
    }

    /// Substitutes a uniformly chosen slot with `particle`, returning the
    /// evicted one; the caller is free to simply drop it.
    pub fn replace_random(&mut self, particle: A, rng: &mut Kernel) -> A {
        let index = self.sample_index(rng);
        std::mem::replace(&mut self.particles[index], particle)
    }

    /// Appends a new particle.
    pub fn add(&mut self, particle: A) {
        self.particles.push(particle);
    }

    /// Drops every particle, leaving the filter empty until repopulated.
    pub fn free(&mut self) {
        self.particles.clear();
    }
}

/// A particle set with one importance weight per particle.
#[derive(Debug, Clone)]
pub struct WeightedFilter<A: Augmented> {
    particles: Vec<A>,
    weights: Vec<Probability>,
}

impl<A: Augmented> WeightedFilter<A> {
    pub fn new(particles: Vec<A>, weights: Vec<Probability>) -> Self {
        assert_eq!(particles.len(), weights.len());
        assert!(!particles.is_empty());
        Self { particles, weights }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn particle(&self, index: usize) -> &A {
        &self.particles[index]
    }

    pub fn particles(&self) -> &[A] {
        &self.particles
    }

    pub fn weight(&self, index: usize) -> Probability {
        self.weights[index]
    }

    /// Appends a particle with its weight.
    pub fn add(&mut self, particle: A, weight: Probability) {
        self.particles.push(particle);
        self.weights.push(weight);
    }

    /// Overwrites the particle/weight pair at `index`.
    pub fn replace(&mut self, index: usize, particle: A, weight: Probability) {
        self.particles[index] = particle;
        self.weights[index] = weight;
    }

    /// Index of the lowest-weighted particle, the usual candidate to evict
    /// when a reinvigoration strategy injects a fresh one.
    pub fn least_likely(&self) -> usize {
        self.least_likely_k(1)[0]
    }

    /// Indices of the `k` lowest-weighted particles, ascending by weight —
    /// the incubator's "breed the least-likely shadow particles" selection.
    pub fn least_likely_k(&self, k: usize) -> Vec<usize> {
        assert!(k > 0 && k <= self.weights.len());
        let mut indices: Vec<usize> = (0..self.weights.len()).collect();
        indices.sort_by(|&a, &b| self.weights[a].partial_cmp(&self.weights[b]).expect("weight is NaN"));
        indices.truncate(k);
        indices
    }

    /// This particle's weight divided by the sum of all weights.
    pub fn normalized_weight(&self, index: usize) -> Probability {
        let total: Probability = self.weights.iter().sum();
        if total <= 0.0 { 0.0 } else { self.weights[index] / total }
    }

    /// Normalizes weights in place to sum to one. Returns
    /// [`EngineError::BeliefDegenerate`] if every weight is (numerically)
    /// zero.
    pub fn normalize(&mut self) -> Result<(), EngineError> {
        let total: Probability = self.weights.iter().sum();
        if total <= bap_core::DIRICHLET_UNDERFLOW {
            return Err(EngineError::BeliefDegenerate);
        }
        for w in &mut self.weights {
            *w /= total;
        }
        Ok(())
    }

    /// Draws one particle index with probability proportional to its
    /// (assumed already normalized) weight.
    pub fn sample_index(&self, rng: &mut Kernel) -> usize {
        let total: Probability = self.weights.iter().sum();
        rng.sample_multinomial(&self.weights, total.max(f64::MIN_POSITIVE))
    }

    pub fn sample(&self, rng: &mut Kernel) -> &A {
        &self.particles[self.sample_index(rng)]
    }

    /// Systematic resampling: collapses this weighted set down to `count`
    /// unweighted particles, giving each original particle an expected
    /// number of copies proportional to its weight with lower variance
    /// than independent multinomial draws. Assumes weights already
    /// normalized (call [`Self::normalize`] first).
    pub fn systematic_resample(&self, count: usize, rng: &mut Kernel) -> FlatFilter<A> {
        assert!(count > 0);
        let mut cumulative = Vec::with_capacity(self.weights.len());
        let mut running = 0.0;
        for &w in &self.weights {
            running += w;
            cumulative.push(running);
        }
        let start = rng.uniform01() / count as f64;
        let mut drawn = Vec::with_capacity(count);
        let mut cursor = 0;
        for i in 0..count {
            let target = start + i as f64 / count as f64;
            while cursor + 1 < cumulative.len() && cumulative[cursor] < target {
                cursor += 1;
            }
            drawn.push(self.particles[cursor].clone());
        }
        FlatFilter::new(drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augmented::BapState;
    use bap_model::domain::IndexedDomain;
    use bap_model::CountModel;

    #[derive(Clone, Copy)]
    struct Dummy;
    impl bap_model::domain::Domain for Dummy {
        type State = usize;
        type Action = usize;
        type Observation = usize;
        fn sample_start_state(&self, _rng: &mut Kernel) -> Self::State {
            0
        }
        fn legal_actions(&self, _state: Self::State) -> Vec<Self::Action> {
            vec![0]
        }
        fn step(&self, state: Self::State, _action: Self::Action, _rng: &mut Kernel) -> bap_model::domain::Step<Self::State, Self::Observation> {
            bap_model::domain::Step {
                next_state: state,
                observation: 0,
                reward: 0.0,
                terminal: false,
            }
        }
        fn observation_probability(&self, _a: Self::Action, _s: Self::State, _o: Self::Observation) -> Probability {
            1.0
        }
        fn transition_probability(&self, state: Self::State, _action: Self::Action, next_state: Self::State) -> Probability {
            if next_state == state { 1.0 } else { 0.0 }
        }
    }
    impl IndexedDomain for Dummy {
        fn state_size(&self) -> usize {
            1
        }
        fn action_size(&self) -> usize {
            1
        }
        fn observation_size(&self) -> usize {
            1
        }
        fn state_to_index(&self, s: Self::State) -> bap_core::Index {
            s
        }
        fn index_to_state(&self, i: bap_core::Index) -> Self::State {
            i
        }
        fn action_to_index(&self, a: Self::Action) -> bap_core::Index {
            a
        }
        fn index_to_action(&self, i: bap_core::Index) -> Self::Action {
            i
        }
        fn observation_to_index(&self, o: Self::Observation) -> bap_core::Index {
            o
        }
        fn index_to_observation(&self, i: bap_core::Index) -> Self::Observation {
            i
        }
        fn terminal(&self, _s: Self::State) -> bool {
            false
        }
        fn reward(&self, _s: Self::State, _a: Self::Action, _n: Self::State) -> bap_core::Utility {
            0.0
        }
    }

    fn particle() -> BapState<Dummy> {
        BapState::new(0, CountModel::with_uniform_prior(1, 1, 1, 1.0))
    }

    #[test]
    fn flat_filter_sample_index_in_bounds() {
        let filter = FlatFilter::new(vec![particle(), particle(), particle()]);
        let mut rng = Kernel::from_seed("flat-filter");
        for _ in 0..10 {
            assert!(filter.sample_index(&mut rng) < 3);
        }
    }

    #[test]
    fn weighted_filter_rejects_all_zero_weights() {
        let mut filter = WeightedFilter::new(vec![particle(), particle()], vec![0.0, 0.0]);
        assert!(matches!(filter.normalize(), Err(EngineError::BeliefDegenerate)));
    }

    #[test]
    fn systematic_resample_preserves_count() {
        let filter = WeightedFilter::new(vec![particle(), particle(), particle()], vec![0.1, 0.7, 0.2]);
        let mut rng = Kernel::from_seed("resample-test");
        let resampled = filter.systematic_resample(10, &mut rng);
        assert_eq!(resampled.len(), 10);
    }

    #[test]
    fn least_likely_picks_minimum_weight() {
        let filter = WeightedFilter::new(vec![particle(), particle(), particle()], vec![0.5, 0.1, 0.4]);
        assert_eq!(filter.least_likely(), 1);
    }

    #[test]
    fn least_likely_k_returns_ascending_weights() {
        let filter = WeightedFilter::new(vec![particle(), particle(), particle()], vec![0.5, 0.1, 0.4]);
        assert_eq!(filter.least_likely_k(2), vec![1, 2]);
    }
}
