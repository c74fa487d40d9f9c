//! Simulation parameters and configuration.
//!
//! `Config` is the master configuration: it can be deserialized from JSON to
//! fully reproduce a simulation setup. Derived quantities (genome map,
//! probability tables, snapshot stages) are computed from it on demand.

use crate::errors::ConfigError;
use crate::genome::{n_states, probability_table, GenomeMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The master configuration struct.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub execution: ExecutionConfig,
    pub genome: GenomeConfig,
    pub demography: DemographyConfig,
    pub evolution: EvolutionConfig,
    pub resources: ResourceConfig,
    pub starvation: StarvationConfig,
    pub crisis: CrisisConfig,
    pub recording: RecordingConfig,
}

/// How snapshot stages are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshots {
    /// This many stages, evenly spread over the run
    Count(usize),
    /// This fraction of the stage count, evenly spread over the run
    Fraction(f64),
    /// Explicit stage indices
    Stages(Vec<usize>),
}

/// Run-level execution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Total number of independent runs
    pub number_of_runs: usize,
    /// Stages per run
    pub number_of_stages: usize,
    /// Stages at which full population state is captured
    pub snapshots: Snapshots,
    /// Maximum number of failed attempts tolerated for each run
    pub max_fail: usize,
    /// Optional RNG seed for reproducibility
    pub random_seed: Option<u64>,
    /// Report progress every this many stages
    pub report_n: usize,
    /// Emit detailed per-stage messages on report stages
    pub verbose: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            number_of_runs: 1,
            number_of_stages: 1000,
            snapshots: Snapshots::Count(5),
            max_fail: 10,
            random_seed: None,
            report_n: 100,
            verbose: false,
        }
    }
}

/// Initial proportion of set bits per locus type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitDistribution {
    pub s: f64,
    pub r: f64,
    pub n: f64,
}

impl Default for BitDistribution {
    fn default() -> Self {
        Self {
            s: 0.5,
            r: 0.5,
            n: 0.5,
        }
    }
}

/// Genome layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Bits per locus
    pub n_base: usize,
    /// Number of neutral loci
    pub n_neutral: usize,
    /// Label offset of reproduction loci (must be >= max_ls)
    pub repr_offset: usize,
    /// Label offset of neutral loci (must be >= repr_offset + max_ls)
    pub neut_offset: usize,
    pub g_dist: BitDistribution,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            n_base: 10,
            n_neutral: 10,
            repr_offset: 100,
            neut_offset: 200,
            g_dist: BitDistribution::default(),
        }
    }
}

/// Reproduction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproductionMode {
    #[default]
    Asexual,
    /// Recombination then assortment of two parents
    Sexual,
    /// Assortment of two parents without recombination
    AssortOnly,
    /// Single parent, genome recombined before copying
    RecombineOnly,
}

impl ReproductionMode {
    /// Whether offspring need two parents.
    #[inline]
    pub fn is_sexual(self) -> bool {
        matches!(self, ReproductionMode::Sexual | ReproductionMode::AssortOnly)
    }

    /// Whether parental genomes are recombined before transmission.
    #[inline]
    pub fn recombines(self) -> bool {
        matches!(self, ReproductionMode::Sexual | ReproductionMode::RecombineOnly)
    }
}

/// Demographic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographyConfig {
    /// Founding population size
    pub start_pop: usize,
    /// Maximum lifespan
    pub max_ls: usize,
    /// Age from which individuals can reproduce
    pub maturity: usize,
    /// Founder ages uniform over lifespan, else all at maturity
    pub age_random: bool,
    pub repr_mode: ReproductionMode,
    /// Survival probability at minimum and maximum genotype
    pub surv_bound: [f64; 2],
    /// Reproduction probability at minimum and maximum genotype
    pub repr_bound: [f64; 2],
}

impl Default for DemographyConfig {
    fn default() -> Self {
        Self {
            start_pop: 500,
            max_ls: 98,
            maturity: 21,
            age_random: false,
            repr_mode: ReproductionMode::Asexual,
            surv_bound: [0.98, 0.999],
            repr_bound: [0.0, 0.2],
        }
    }
}

/// Mutation and recombination rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Per-bit probability of a 1 -> 0 mutation
    pub m_rate: f64,
    /// Ratio of 0 -> 1 to 1 -> 0 mutation probability
    pub m_ratio: f64,
    /// Per-locus crossover probability
    pub r_rate: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            m_rate: 0.001,
            m_ratio: 0.1,
            r_rate: 0.01,
        }
    }
}

/// Resource model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub res_start: u64,
    /// Resources respond to population pressure; else constant
    pub res_var: bool,
    /// Geometric regrowth factor while resources exceed the population
    pub regrowth: f64,
    /// Arithmetic increment per stage
    pub increment: u64,
    /// Upper bound on resources (`None` = unbounded)
    pub res_limit: Option<u64>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            res_start: 1000,
            res_var: true,
            regrowth: 1.6,
            increment: 1000,
            res_limit: Some(5000),
        }
    }
}

/// Starvation penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarvationConfig {
    pub surv_pen: bool,
    pub repr_pen: bool,
    /// Per-stage death multiplier under starvation
    pub death_inc: f64,
    /// Per-stage reproduction divisor under starvation
    pub repr_dec: f64,
}

impl Default for StarvationConfig {
    fn default() -> Self {
        Self {
            surv_pen: true,
            repr_pen: false,
            death_inc: 3.0,
            repr_dec: 3.0,
        }
    }
}

/// Extrinsic mortality events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    /// Per-stage probability of a crisis
    pub probability: f64,
    /// Fraction of the population surviving a crisis
    pub survival: f64,
    /// Stages with a guaranteed crisis
    pub stages: Vec<usize>,
}

/// Derived-statistics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Sliding-window size per record key
    pub windows: BTreeMap<String, usize>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let windows = [("population_size", 1000), ("resources", 1000), ("n1", 10)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { windows }
    }
}

fn check_probability(name: &'static str, p: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability(name, p))
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check parameter ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ex = &self.execution;
        if ex.number_of_runs == 0 {
            return Err(invalid("number_of_runs", "must be at least 1"));
        }
        if ex.number_of_stages == 0 {
            return Err(invalid("number_of_stages", "must be at least 1"));
        }
        if ex.max_fail == 0 {
            return Err(invalid("max_fail", "must be at least 1"));
        }
        if ex.report_n == 0 {
            return Err(invalid("report_n", "must be at least 1"));
        }
        match &ex.snapshots {
            Snapshots::Count(n) if *n > ex.number_of_stages => {
                return Err(invalid(
                    "snapshots",
                    format!("{n} snapshots exceed {} stages", ex.number_of_stages),
                ));
            }
            Snapshots::Fraction(f) => check_probability("snapshots", *f)?,
            Snapshots::Stages(stages) => {
                if let Some(&stage) = stages.iter().find(|&&s| s >= ex.number_of_stages) {
                    return Err(ConfigError::SnapshotOutOfRange {
                        stage,
                        n_stages: ex.number_of_stages,
                    });
                }
            }
            _ => {}
        }

        let g = &self.genome;
        if g.n_base == 0 {
            return Err(invalid("n_base", "must be at least 1"));
        }
        check_probability("g_dist.s", g.g_dist.s)?;
        check_probability("g_dist.r", g.g_dist.r)?;
        check_probability("g_dist.n", g.g_dist.n)?;

        let d = &self.demography;
        if d.max_ls == 0 {
            return Err(invalid("max_ls", "must be at least 1"));
        }
        if d.maturity >= d.max_ls {
            return Err(invalid(
                "maturity",
                format!("{} must be below max_ls {}", d.maturity, d.max_ls),
            ));
        }
        for (name, bound) in [("surv_bound", d.surv_bound), ("repr_bound", d.repr_bound)] {
            check_probability(name, bound[0])?;
            check_probability(name, bound[1])?;
        }
        self.genome_map()?;

        let e = &self.evolution;
        check_probability("m_rate", e.m_rate)?;
        check_probability("r_rate", e.r_rate)?;
        if e.m_ratio.is_nan() || e.m_ratio < 0.0 || e.m_rate * e.m_ratio > 1.0 {
            return Err(invalid("m_ratio", format!("{} gives an invalid 0 -> 1 rate", e.m_ratio)));
        }

        let r = &self.resources;
        if r.regrowth.is_nan() || r.regrowth < 0.0 {
            return Err(invalid("regrowth", "must be non-negative"));
        }

        let s = &self.starvation;
        if s.death_inc.is_nan() || s.death_inc < 0.0 || s.repr_dec.is_nan() || s.repr_dec < 0.0 {
            return Err(invalid("starvation", "factors must be non-negative"));
        }

        check_probability("crisis.probability", self.crisis.probability)?;
        check_probability("crisis.survival", self.crisis.survival)?;

        if let Some((key, _)) = self.recording.windows.iter().find(|(_, &w)| w == 0) {
            return Err(invalid("windows", format!("window for {key} must be at least 1")));
        }
        Ok(())
    }

    /// Canonical (unshuffled) genome map.
    pub fn genome_map(&self) -> Result<GenomeMap, ConfigError> {
        GenomeMap::new(
            self.demography.max_ls,
            self.demography.maturity,
            self.genome.n_neutral,
            self.genome.repr_offset,
            self.genome.neut_offset,
        )
    }

    /// Loci per chromosome.
    pub fn genmap_len(&self) -> usize {
        let d = &self.demography;
        d.max_ls + d.max_ls.saturating_sub(d.maturity) + self.genome.n_neutral
    }

    /// Bits per chromosome.
    pub fn chr_len(&self) -> usize {
        self.genmap_len() * self.genome.n_base
    }

    pub fn n_states(&self) -> usize {
        n_states(self.genome.n_base)
    }

    pub fn is_sexual(&self) -> bool {
        self.demography.repr_mode.is_sexual()
    }

    pub fn surv_bound(&self) -> [f64; 2] {
        self.demography.surv_bound
    }

    /// Reproduction bounds as used by growth: the upper bound is doubled in
    /// sexual modes, offsetting the halving applied per parent.
    pub fn repr_bound(&self) -> [f64; 2] {
        let [lo, hi] = self.demography.repr_bound;
        if self.is_sexual() {
            [lo, hi * 2.0]
        } else {
            [lo, hi]
        }
    }

    /// Survival probability for each locus state.
    pub fn surv_range(&self) -> Vec<f64> {
        let [lo, hi] = self.surv_bound();
        probability_table(lo, hi, self.n_states())
    }

    /// Reproduction probability for each locus state.
    pub fn repr_range(&self) -> Vec<f64> {
        let [lo, hi] = self.repr_bound();
        probability_table(lo, hi, self.n_states())
    }

    /// Stages at which snapshots are taken, ascending.
    pub fn snapshot_stages(&self) -> Vec<usize> {
        let n_stages = self.execution.number_of_stages;
        let count = match &self.execution.snapshots {
            Snapshots::Count(n) => *n,
            Snapshots::Fraction(f) => (f * n_stages as f64) as usize,
            Snapshots::Stages(stages) => {
                let mut stages = stages.clone();
                stages.sort_unstable();
                stages.dedup();
                return stages;
            }
        };
        let mut stages: Vec<usize> = match count {
            0 => Vec::new(),
            1 => vec![0],
            _ => {
                let last = n_stages.saturating_sub(1) as f64;
                (0..count)
                    .map(|i| (last * i as f64 / (count - 1) as f64).round() as usize)
                    .collect()
            }
        };
        stages.dedup();
        stages
    }
}
