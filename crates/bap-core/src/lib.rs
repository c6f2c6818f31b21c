//! Core type aliases, error types, configuration, and runtime utilities for
//! the BA-POMDP / FBA-POMDP research engine.
#![allow(dead_code)]

mod config;
mod error;

pub use config::*;
pub use error::*;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Index into a finite state/action/observation/feature space.
pub type Index = usize;
/// Dirichlet pseudocount / pseudo-observation count.
pub type Count = f64;
/// A probability in `[0, 1]`.
pub type Probability = f64;
/// Discounted return, reward, or utility.
pub type Utility = f64;
/// Discount factor in `(0, 1]`.
pub type Discount = f64;

// ============================================================================
// ENGINE CONSTANTS
// ============================================================================
/// Below this, a Dirichlet sample sum is treated as numeric underflow and the
/// sampler returns the conventional zero distribution.
pub const DIRICHLET_UNDERFLOW: Count = 1e-300;
/// PO-UCT checks the wall-clock budget once every this many simulations.
pub const WALLCLOCK_CHECK_INTERVAL: usize = 100;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with a timestamped log file.
#[cfg(feature = "server")]
pub fn log(verbose: u8) {
    use std::time::{SystemTime, UNIX_EPOCH};
    std::fs::create_dir_all("logs").expect("create logs directory");
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Global interrupt flag for graceful shutdown between episodes.
#[cfg(feature = "server")]
static INTERRUPTED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if graceful shutdown was requested (via stdin "Q").
#[cfg(feature = "server")]
pub fn interrupted() -> bool {
    INTERRUPTED.load(std::sync::atomic::Ordering::Relaxed)
}
#[cfg(not(feature = "server"))]
pub fn interrupted() -> bool {
    false
}

/// Register a graceful interrupt handler. Typing "Q" + Enter stops the
/// runner after the current episode finishes.
#[cfg(feature = "server")]
pub fn watch_for_interrupt() {
    std::thread::spawn(|| {
        loop {
            let ref mut buffer = String::new();
            if std::io::stdin().read_line(buffer).is_ok() {
                if buffer.trim().to_uppercase() == "Q" {
                    log::warn!("graceful interrupt requested, finishing current episode...");
                    INTERRUPTED.store(true, std::sync::atomic::Ordering::Relaxed);
                    break;
                }
            }
        }
    });
}

/// Deterministic seed derivation: hash a seed string down to a `u64` for
/// `rand::rngs::SmallRng::seed_from_u64`. Two engines constructed from the
/// same seed string always draw identical samples.
pub fn seed_from_str(seed: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish()
}
