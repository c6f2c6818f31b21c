//! Augmented state, prior factory, particle filters, and the nine
//! belief-update strategies for the BA-POMDP / FBA-POMDP engine.
#![allow(dead_code)]

pub mod augmented;
pub mod belief;
pub mod breed;
pub mod mh;
pub mod particles;
pub mod prior;

pub use augmented::{AbstractFbapState, Augmented, BapState, FbapState};
pub use belief::Belief;
pub use particles::{FlatFilter, WeightedFilter};
pub use prior::{FactoredPrior, FlatPrior};
