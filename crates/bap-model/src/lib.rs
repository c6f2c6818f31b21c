//! Random-sampling kernel, domain contract, and flat/factored dynamics
//! models for the BA-POMDP / FBA-POMDP engine.
#![allow(dead_code)]

pub mod count;
pub mod dbn;
pub mod domain;
pub mod rng;

pub use count::CountModel;
pub use dbn::{DbnModel, DbnNode};
pub use domain::{Domain, FactoredDomain, IndexedDomain, Step};
pub use rng::{DirichletMethod, Kernel};
