//! Breeding operator: combines a structure donor and a counts
//! donor into one child factored particle, used by the reinvigoration and
//! incubator belief strategies. The structure donor contributes its DBN
//! structure after one random edge flip; the counts donor contributes its
//! learned Dirichlet counts, reconciled down onto the mutated structure by
//! marginalization — valid whenever the counts donor's structure is at
//! least as connected as the mutated one, which both strategies guarantee
//! by always pairing a "main" structure donor with a "fully connected"
//! counts donor. The child inherits a fresh copy of the structure donor's
//! domain state.

use bap_model::Kernel;

use crate::augmented::FbapState;
use crate::prior::mutate;
use bap_model::domain::FactoredDomain;

/// Breeds `structure_donor` and `counts_donor` into a child particle: one
/// random edge flip on `structure_donor`'s model, then every node's counts
/// (including the observation node) reconciled from `counts_donor` onto
/// the resulting (mostly unchanged) parent sets.
pub fn breed<D: FactoredDomain>(structure_donor: &FbapState<D>, counts_donor: &FbapState<D>, max_parents: usize, rng: &mut Kernel) -> FbapState<D> {
    let mutated = mutate(structure_donor.model(), max_parents, rng);
    let feature_count = mutated.feature_sizes().len();

    let mut model = mutated;
    for feature in 0..feature_count {
        let target_parents = model.transition_node(feature).parents().to_vec();
        let reconciled = counts_donor.model().transition_node(feature).restrict_to(&target_parents);
        model = model.with_transition_node(feature, reconciled);
    }
    let target_parents = model.observation_node().parents().to_vec();
    let reconciled_observation = counts_donor.model().observation_node().restrict_to(&target_parents);
    model = model.with_observation_node(reconciled_observation);

    FbapState::new(structure_donor.features().to_vec(), model)
}
