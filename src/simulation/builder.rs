//! Builder pattern for creating simulations.
//!
//! Provides a fluent API over [`Config`] with the defaults of
//! `Config::default()` and validation at build time.

use crate::errors::{ConfigError, SimulationError};
use crate::simulation::parameters::{BitDistribution, Config, ReproductionMode, Snapshots};
use crate::simulation::Simulation;

/// Builder for constructing configurations and simulations.
///
/// # Examples
///
/// ```
/// use aegis::simulation::{ConfigBuilder, ReproductionMode};
///
/// let config = ConfigBuilder::new()
///     .runs(2)
///     .stages(50)
///     .start_pop(100)
///     .lifespan(20, 5)
///     .reproduction_mode(ReproductionMode::Sexual)
///     .mutation(0.001, 0.1)
///     .seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(config.execution.number_of_stages, 50);
/// assert_eq!(config.repr_bound()[1], 0.4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn runs(mut self, n: usize) -> Self {
        self.config.execution.number_of_runs = n;
        self
    }

    pub fn stages(mut self, n: usize) -> Self {
        self.config.execution.number_of_stages = n;
        self
    }

    pub fn snapshots(mut self, snapshots: Snapshots) -> Self {
        self.config.execution.snapshots = snapshots;
        self
    }

    pub fn max_fail(mut self, n: usize) -> Self {
        self.config.execution.max_fail = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.execution.random_seed = Some(seed);
        self
    }

    /// Progress reporting interval and verbosity.
    pub fn report(mut self, every: usize, verbose: bool) -> Self {
        self.config.execution.report_n = every;
        self.config.execution.verbose = verbose;
        self
    }

    pub fn start_pop(mut self, n: usize) -> Self {
        self.config.demography.start_pop = n;
        self
    }

    /// Maximum lifespan and age at maturity.
    pub fn lifespan(mut self, max_ls: usize, maturity: usize) -> Self {
        self.config.demography.max_ls = max_ls;
        self.config.demography.maturity = maturity;
        self
    }

    pub fn random_ages(mut self, random: bool) -> Self {
        self.config.demography.age_random = random;
        self
    }

    pub fn reproduction_mode(mut self, mode: ReproductionMode) -> Self {
        self.config.demography.repr_mode = mode;
        self
    }

    pub fn survival_bounds(mut self, lo: f64, hi: f64) -> Self {
        self.config.demography.surv_bound = [lo, hi];
        self
    }

    pub fn reproduction_bounds(mut self, lo: f64, hi: f64) -> Self {
        self.config.demography.repr_bound = [lo, hi];
        self
    }

    /// Bits per locus and number of neutral loci.
    pub fn genome(mut self, n_base: usize, n_neutral: usize) -> Self {
        self.config.genome.n_base = n_base;
        self.config.genome.n_neutral = n_neutral;
        self
    }

    pub fn offsets(mut self, repr_offset: usize, neut_offset: usize) -> Self {
        self.config.genome.repr_offset = repr_offset;
        self.config.genome.neut_offset = neut_offset;
        self
    }

    pub fn initial_bits(mut self, dist: BitDistribution) -> Self {
        self.config.genome.g_dist = dist;
        self
    }

    pub fn mutation(mut self, rate: f64, ratio: f64) -> Self {
        self.config.evolution.m_rate = rate;
        self.config.evolution.m_ratio = ratio;
        self
    }

    pub fn recombination(mut self, rate: f64) -> Self {
        self.config.evolution.r_rate = rate;
        self
    }

    /// Resources that respond to population pressure.
    pub fn variable_resources(mut self, start: u64, regrowth: f64, increment: u64, limit: Option<u64>) -> Self {
        let r = &mut self.config.resources;
        r.res_var = true;
        r.res_start = start;
        r.regrowth = regrowth;
        r.increment = increment;
        r.res_limit = limit;
        self
    }

    /// A fixed resource level.
    pub fn constant_resources(mut self, level: u64) -> Self {
        self.config.resources.res_var = false;
        self.config.resources.res_start = level;
        self
    }

    pub fn starvation(mut self, surv_pen: bool, repr_pen: bool, death_inc: f64, repr_dec: f64) -> Self {
        let s = &mut self.config.starvation;
        s.surv_pen = surv_pen;
        s.repr_pen = repr_pen;
        s.death_inc = death_inc;
        s.repr_dec = repr_dec;
        self
    }

    pub fn crisis(mut self, probability: f64, survival: f64, stages: Vec<usize>) -> Self {
        let c = &mut self.config.crisis;
        c.probability = probability;
        c.survival = survival;
        c.stages = stages;
        self
    }

    pub fn window(mut self, key: impl Into<String>, size: usize) -> Self {
        self.config.recording.windows.insert(key.into(), size);
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validate and set up a simulation.
    pub fn build_simulation(self) -> Result<Simulation, SimulationError> {
        Simulation::new(self.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_config() {
        assert_eq!(ConfigBuilder::new().build().unwrap(), Config::default());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = ConfigBuilder::new()
            .stages(30)
            .snapshots(Snapshots::Stages(vec![0, 29]))
            .lifespan(20, 5)
            .genome(4, 3)
            .constant_resources(1000)
            .crisis(0.0, 0.5, vec![10])
            .window("resources", 7)
            .build()
            .unwrap();
        assert_eq!(config.snapshot_stages(), vec![0, 29]);
        assert_eq!(config.chr_len(), (20 + 15 + 3) * 4);
        assert!(!config.resources.res_var);
        assert_eq!(config.crisis.stages, vec![10]);
        assert_eq!(config.recording.windows["resources"], 7);
    }

    #[test]
    fn test_builder_validates() {
        let result = ConfigBuilder::new().lifespan(10, 10).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "maturity", .. })));
        assert!(ConfigBuilder::new().mutation(2.0, 0.1).build_simulation().is_err());
    }

    #[test]
    fn test_build_simulation() {
        let sim = ConfigBuilder::new()
            .runs(2)
            .stages(5)
            .start_pop(10)
            .lifespan(10, 2)
            .genome(2, 1)
            .seed(7)
            .build_simulation()
            .unwrap();
        assert_eq!(sim.runs().len(), 2);
    }
}
