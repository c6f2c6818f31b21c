//! Closed error taxonomy for the engine.
//!
//! `ConfigInvalid` is the only kind expected to be recovered from (it
//! surfaces at startup with exit code 1). The other three are fatal
//! programming errors or caller-visible degeneracies; the engine does not
//! attempt to recover from them at runtime.

use std::fmt;

/// The four error kinds recognized by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A configuration record failed validation at startup.
    ConfigInvalid(String),
    /// An index was presented outside the domain's declared size. This is a
    /// programmer error in a domain implementation, never a user input.
    DomainOutOfRange { index: usize, size: usize },
    /// Every particle in a filter carries zero weight after an update.
    BeliefDegenerate,
    /// A Dirichlet sample's gamma sum underflowed below
    /// [`bap_core::DIRICHLET_UNDERFLOW`](crate::DIRICHLET_UNDERFLOW).
    NumericUnderflow,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::DomainOutOfRange { index, size } => {
                write!(f, "domain index {index} out of range for size {size}")
            }
            Self::BeliefDegenerate => write!(f, "belief degenerate: all particle weights zero"),
            Self::NumericUnderflow => write!(f, "numeric underflow sampling a Dirichlet row"),
        }
    }
}

impl std::error::Error for EngineError {}
