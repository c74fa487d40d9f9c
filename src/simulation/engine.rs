//! Multi-run simulation driver.
//!
//! Independent runs share one read-only configuration; each owns its
//! population, record and random stream, seeded from a master RNG. Runs are
//! executed in parallel and their finalised records averaged afterwards.

use crate::errors::SimulationError;
use crate::simulation::parameters::Config;
use crate::simulation::population::Population;
use crate::simulation::run::Run;
use crate::storage::AverageRecord;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Main simulation engine.
#[derive(Debug)]
pub struct Simulation {
    config: Arc<Config>,
    runs: Vec<Run>,
    /// Master RNG the per-run seeds were drawn from
    rng: Xoshiro256PlusPlus,
    average: Option<AverageRecord>,
}

impl Simulation {
    /// Set up `number_of_runs` fresh runs.
    pub fn new(config: Config) -> Result<Self, SimulationError> {
        Self::build(config, None)
    }

    /// Set up runs starting from the given populations, one per run.
    pub fn with_seed_populations(
        config: Config,
        seeds: &[Population],
    ) -> Result<Self, SimulationError> {
        if seeds.len() != config.execution.number_of_runs {
            return Err(SimulationError::SeedCount {
                expected: config.execution.number_of_runs,
                found: seeds.len(),
            });
        }
        Self::build(config, Some(seeds))
    }

    fn build(config: Config, seeds: Option<&[Population]>) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = match config.execution.random_seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_seed(rand::rng().random()),
        };
        let config = Arc::new(config);
        let n_runs = config.execution.number_of_runs;
        let run_seeds: Vec<u64> = (0..n_runs).map(|_| rng.random()).collect();

        let runs = run_seeds
            .into_iter()
            .enumerate()
            .map(|(n, seed)| {
                let pop = seeds.map(|s| &s[n]);
                Run::new(
                    Arc::clone(&config),
                    n,
                    pop,
                    Xoshiro256PlusPlus::seed_from_u64(seed),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            runs = n_runs,
            stages = config.execution.number_of_stages,
            "simulation initialised"
        );

        Ok(Self {
            config,
            runs,
            rng,
            average: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run(&self, n: usize) -> Option<&Run> {
        self.runs.get(n)
    }

    /// Seed for the next simulation derived from this one.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.random()
    }

    /// Execute all runs to completion, in parallel.
    pub fn execute(&mut self) -> Result<(), SimulationError> {
        self.runs
            .par_iter_mut()
            .filter(|run| !run.is_complete())
            .try_for_each(|run| run.execute())?;
        let dieoffs = self.runs.iter().filter(|r| r.dieoff()).count();
        info!(runs = self.runs.len(), dieoffs, "all runs executed");
        Ok(())
    }

    /// Average the finalised records of all runs.
    pub fn finalise(&mut self) -> &AverageRecord {
        self.average
            .insert(AverageRecord::from_records(self.runs.iter().map(Run::record)))
    }

    pub fn average(&self) -> Option<&AverageRecord> {
        self.average.as_ref()
    }

    /// Final populations of all runs.
    pub fn populations(&self) -> Vec<&Population> {
        self.runs.iter().map(Run::population).collect()
    }
}
