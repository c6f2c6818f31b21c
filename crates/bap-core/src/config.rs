//! Configuration record and CLI surface: a global / planner / belief / BA /
//! factored-BA / domain section hierarchy.

use clap::{Parser, ValueEnum};

/// Planner selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum PlannerKind {
    Random,
    Ts,
    PoUct,
    PoUctAbstraction,
}

/// Belief strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum BeliefKind {
    PointEstimate,
    RejectionSampling,
    ImportanceSampling,
    Reinvigoration,
    MhNips,
    MhWithinGibbs,
    CheatingReinvigoration,
    Incubator,
    Nested,
}

/// Dirichlet sampling method used throughout the count/DBN model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum DirichletSamplingMethod {
    Regular,
    Expected,
}

/// Factored structure prior keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum StructurePrior {
    MatchCounts,
    Uniform,
    MatchUniform,
    FullyConnected,
}

impl Default for StructurePrior {
    fn default() -> Self {
        Self::MatchCounts
    }
}

/// One of simulation-count or wall-clock-millisecond planning budgets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationBudget {
    Count(usize),
    Millis(u64),
}

/// Planner-section configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub kind: PlannerKind,
    pub budget: SimulationBudget,
    /// `None` means "adopt horizon" (the CLI's `-1` sentinel).
    pub max_depth: Option<usize>,
    pub exploration_constant: f64,
    pub abstraction_k: usize,
}

/// Belief-section configuration.
#[derive(Debug, Clone)]
pub struct BeliefConfig {
    pub kind: BeliefKind,
    pub particle_amount: usize,
    pub resample_amount: usize,
    pub threshold: f64,
    pub option: String,
}

/// BA-section configuration.
#[derive(Debug, Clone)]
pub struct BaConfig {
    pub noise: f64,
    pub counts_total: f64,
    pub dirichlet_sampling_method: DirichletSamplingMethod,
}

/// Factored-BA-section configuration.
#[derive(Debug, Clone)]
pub struct FactoredBaConfig {
    pub structure_prior: StructurePrior,
}

/// Domain-section configuration.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub domain: String,
    pub size: usize,
    pub height: usize,
    pub width: usize,
    pub abstraction: bool,
    pub store_statespace: bool,
}

/// Fully validated configuration record, built from [`Cli`] by [`Cli::into_config`].
#[derive(Debug, Clone)]
pub struct Config {
    pub num_runs: usize,
    pub num_episodes: usize,
    pub horizon: usize,
    pub discount: f64,
    pub seed: String,
    pub id: String,
    pub output_file: std::path::PathBuf,
    pub verbose: u8,
    pub planner: PlannerConfig,
    pub belief: BeliefConfig,
    pub ba: BaConfig,
    pub fba: FactoredBaConfig,
    pub domain: DomainConfig,
}

/// Command-line arguments, one flag per configuration field.
#[derive(Debug, Parser)]
#[command(name = "bap", about = "BA-POMDP / FBA-POMDP research engine")]
pub struct Cli {
    #[arg(long, default_value_t = 1)]
    pub num_runs: usize,
    #[arg(long, default_value_t = 1)]
    pub num_episodes: usize,
    #[arg(long, default_value_t = 10)]
    pub horizon: usize,
    #[arg(long, default_value_t = 0.95)]
    pub discount: f64,
    #[arg(long, default_value = "")]
    pub seed: String,
    #[arg(long, default_value = "")]
    pub id: String,
    #[arg(long, default_value = "results.txt")]
    pub output_file: std::path::PathBuf,
    #[arg(long, default_value_t = 0)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = PlannerKind::PoUct)]
    pub planner: PlannerKind,
    #[arg(long, default_value_t = 0)]
    pub simulation_amount: usize,
    #[arg(long, default_value_t = 0)]
    pub milliseconds_thinking: u64,
    /// `-1` adopts the horizon as max depth.
    #[arg(long, default_value_t = -1)]
    pub max_depth: i64,
    #[arg(long, default_value_t = 1.0)]
    pub exploration_constant: f64,
    #[arg(long, default_value_t = 0)]
    pub abstraction_k: usize,

    #[arg(long, value_enum, default_value_t = BeliefKind::RejectionSampling)]
    pub belief: BeliefKind,
    #[arg(long, default_value_t = 100)]
    pub particle_amount: usize,
    #[arg(long, default_value_t = 0)]
    pub resample_amount: usize,
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,
    #[arg(long, default_value = "")]
    pub option: String,

    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,
    #[arg(long, default_value_t = 100.0)]
    pub counts_total: f64,
    #[arg(long, value_enum, default_value_t = DirichletSamplingMethod::Regular)]
    pub dirichlet_sampling_method: DirichletSamplingMethod,

    #[arg(long, value_enum, default_value_t = StructurePrior::MatchCounts)]
    pub structure_prior: StructurePrior,

    #[arg(long, default_value = "tiger")]
    pub domain: String,
    #[arg(long, default_value_t = 0)]
    pub size: usize,
    #[arg(long, default_value_t = 0)]
    pub height: usize,
    #[arg(long, default_value_t = 0)]
    pub width: usize,
    #[arg(long, default_value_t = false)]
    pub abstraction: bool,
    #[arg(long, default_value_t = false)]
    pub store_statespace: bool,

    /// Validate configuration and print it without running any episodes.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Cli {
    /// Validates this CLI invocation into a [`Config`], or an
    /// [`EngineError::ConfigInvalid`] describing the first rule violated.
    pub fn into_config(self) -> Result<Config, crate::EngineError> {
        use crate::EngineError::ConfigInvalid;

        if self.num_runs == 0 {
            return Err(ConfigInvalid("num_runs must be > 0".into()));
        }
        if self.num_episodes == 0 {
            return Err(ConfigInvalid("num_episodes must be > 0".into()));
        }
        if self.horizon == 0 {
            return Err(ConfigInvalid("horizon must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.discount) || self.discount <= 0.0 {
            return Err(ConfigInvalid("discount must be in (0, 1]".into()));
        }
        if self.simulation_amount == 0 && self.milliseconds_thinking == 0 {
            return Err(ConfigInvalid(
                "one of simulation_amount or milliseconds_thinking must be non-zero".into(),
            ));
        }
        if self.simulation_amount != 0 && self.milliseconds_thinking != 0 {
            return Err(ConfigInvalid(
                "simulation_amount and milliseconds_thinking are mutually exclusive".into(),
            ));
        }
        if self.exploration_constant < 0.0 {
            return Err(ConfigInvalid("exploration_constant must be >= 0".into()));
        }
        if self.particle_amount == 0 {
            return Err(ConfigInvalid("particle_amount must be >= 1".into()));
        }
        let resample_required = matches!(
            self.belief,
            BeliefKind::Reinvigoration | BeliefKind::CheatingReinvigoration | BeliefKind::Incubator
        );
        if resample_required && self.resample_amount == 0 {
            return Err(ConfigInvalid(format!(
                "resample_amount must be > 0 for belief {:?}",
                self.belief
            )));
        }
        if !resample_required && self.resample_amount != 0 {
            return Err(ConfigInvalid(format!(
                "resample_amount must be 0 unless belief requires reinvigoration, got belief {:?}",
                self.belief
            )));
        }
        if !(-0.5..0.5).contains(&self.noise) {
            return Err(ConfigInvalid("noise must be in (-0.5, 0.5)".into()));
        }
        if self.counts_total < 1.0 {
            return Err(ConfigInvalid("counts_total must be >= 1".into()));
        }

        let max_depth = if self.max_depth < 0 {
            None
        } else {
            Some(self.max_depth as usize)
        };
        let budget = if self.simulation_amount != 0 {
            SimulationBudget::Count(self.simulation_amount)
        } else {
            SimulationBudget::Millis(self.milliseconds_thinking)
        };
        let id = if self.id.is_empty() {
            format!(
                "{}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default()
            )
        } else {
            self.id
        };

        Ok(Config {
            num_runs: self.num_runs,
            num_episodes: self.num_episodes,
            horizon: self.horizon,
            discount: self.discount,
            seed: self.seed,
            id,
            output_file: self.output_file,
            verbose: self.verbose,
            planner: PlannerConfig {
                kind: self.planner,
                budget,
                max_depth,
                exploration_constant: self.exploration_constant,
                abstraction_k: self.abstraction_k,
            },
            belief: BeliefConfig {
                kind: self.belief,
                particle_amount: self.particle_amount,
                resample_amount: self.resample_amount,
                threshold: self.threshold,
                option: self.option,
            },
            ba: BaConfig {
                noise: self.noise,
                counts_total: self.counts_total,
                dirichlet_sampling_method: self.dirichlet_sampling_method,
            },
            fba: FactoredBaConfig {
                structure_prior: self.structure_prior,
            },
            domain: DomainConfig {
                domain: self.domain,
                size: self.size,
                height: self.height,
                width: self.width,
                abstraction: self.abstraction,
                store_statespace: self.store_statespace,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli::parse_from(["bap", "--simulation-amount", "100"])
    }

    #[test]
    fn defaults_validate() {
        assert!(base_cli().into_config().is_ok());
    }

    #[test]
    fn rejects_zero_horizon() {
        let mut cli = base_cli();
        cli.horizon = 0;
        assert!(matches!(
            cli.into_config(),
            Err(crate::EngineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn rejects_both_budgets_set() {
        let mut cli = base_cli();
        cli.milliseconds_thinking = 50;
        assert!(matches!(
            cli.into_config(),
            Err(crate::EngineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn reinvigoration_requires_resample_amount() {
        let mut cli = base_cli();
        cli.belief = BeliefKind::Reinvigoration;
        assert!(matches!(
            cli.into_config(),
            Err(crate::EngineError::ConfigInvalid(_))
        ));
        cli.resample_amount = 4;
        assert!(cli.into_config().is_ok());
    }

    #[test]
    fn rejects_noise_out_of_range() {
        let mut cli = base_cli();
        cli.noise = 0.5;
        assert!(matches!(
            cli.into_config(),
            Err(crate::EngineError::ConfigInvalid(_))
        ));
    }
}
