//! A single simulation run: one population evolving over a fixed number of
//! stages, with its own record and random stream.
//!
//! Each stage records the population, ages it, updates resources and
//! starvation penalties, optionally applies a crisis, then runs growth and
//! death. A run whose population dies out is restored to its starting state
//! and retried until it succeeds or `max_fail` attempts have failed.

use crate::analysis::utils::format_runtime;
use crate::errors::{PopulationError, SimulationError};
use crate::simulation::parameters::Config;
use crate::simulation::population::{Population, PopulationParams};
use crate::storage::Record;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Complete,
    Dieoff,
    /// Died out on the final permitted attempt
    AcceptedFailure,
}

#[derive(Debug, Clone)]
pub struct Run {
    config: Arc<Config>,
    n_run: usize,
    population: Population,
    record: Record,
    resources: u64,
    surv_penf: f64,
    repr_penf: f64,
    n_stage: usize,
    n_snap: usize,
    status: RunStatus,
    surv_range: Vec<f64>,
    repr_range: Vec<f64>,
    rng: Xoshiro256PlusPlus,
    log: Vec<String>,
}

impl Run {
    /// Create run `n_run`.
    ///
    /// Without a seed population, the genome map is shuffled and founders
    /// are drawn from `rng`. A seed population is cloned and keeps its own
    /// genome map, which must carry the same loci as the configuration's.
    pub fn new(
        config: Arc<Config>,
        n_run: usize,
        seed: Option<&Population>,
        mut rng: Xoshiro256PlusPlus,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let params = PopulationParams::from_config(&config);
        let population = match seed {
            Some(pop) => {
                check_seed(&config, pop)?;
                let mut pop = pop.clone();
                *pop.params_mut() = params;
                pop
            }
            None => {
                let mut genmap = config.genome_map()?;
                genmap.shuffle(&mut rng);
                Population::founders(params, genmap, &mut rng)
            }
        };
        let record = Record::new(&config, population.genmap());

        Ok(Self {
            n_run,
            resources: config.resources.res_start,
            surv_penf: 1.0,
            repr_penf: 1.0,
            n_stage: 0,
            n_snap: 0,
            status: RunStatus::Running,
            surv_range: config.surv_range(),
            repr_range: config.repr_range(),
            population,
            record,
            rng,
            log: Vec::new(),
            config,
        })
    }

    pub fn n_run(&self) -> usize {
        self.n_run
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn resources(&self) -> u64 {
        self.resources
    }

    pub fn set_resources(&mut self, resources: u64) {
        self.resources = resources;
    }

    pub fn surv_penf(&self) -> f64 {
        self.surv_penf
    }

    pub fn repr_penf(&self) -> f64 {
        self.repr_penf
    }

    /// Index of the next stage to execute.
    pub fn n_stage(&self) -> usize {
        self.n_stage
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status != RunStatus::Running
    }

    pub fn dieoff(&self) -> bool {
        matches!(self.status, RunStatus::Dieoff | RunStatus::AcceptedFailure)
    }

    /// Cumulative log, kept across retries.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Move resources towards a level set by population pressure.
    ///
    /// `new = clip((resources - N) * k + increment, 0, res_limit)` with
    /// `k = 1` when the population exceeds resources and `k = regrowth`
    /// otherwise. Constant resources are left untouched.
    pub fn update_resources(&mut self) {
        let res = &self.config.resources;
        if !res.res_var {
            return;
        }
        let n = self.population.size() as f64;
        let current = self.resources as f64;
        let k = if n > current { 1.0 } else { res.regrowth };
        let target = ((current - n) * k + res.increment as f64) as i64;
        let limit = res.res_limit.map_or(i64::MAX, |l| i64::try_from(l).unwrap_or(i64::MAX));
        self.resources = target.clamp(0, limit) as u64;
    }

    /// Whether the population is short of resources this stage.
    pub fn starving(&self) -> bool {
        if self.config.resources.res_var {
            self.resources == 0
        } else {
            self.population.size() as u64 > self.resources
        }
    }

    /// Compound penalty factors while starving; reset them otherwise.
    pub fn update_starvation_factors(&mut self) {
        if self.starving() {
            let s = &self.config.starvation;
            if s.surv_pen {
                self.surv_penf *= s.death_inc;
            }
            if s.repr_pen {
                self.repr_penf *= s.repr_dec;
            }
        } else {
            self.surv_penf = 1.0;
            self.repr_penf = 1.0;
        }
    }

    /// Advance the run by one stage.
    ///
    /// The run dies out in the stage its population reaches zero, including
    /// the final one.
    pub fn execute_stage(&mut self) -> Result<(), SimulationError> {
        if self.is_complete() {
            return Err(SimulationError::RunComplete(self.n_run));
        }
        let stage = self.n_stage;
        let report = stage % self.config.execution.report_n == 0;
        let verbose = self.config.execution.verbose;

        if self.population.is_empty() {
            self.mark_dieoff(stage);
        } else {
            let snapshot = if self.record.snapshot_stages().get(self.n_snap) == Some(&stage) {
                self.n_snap += 1;
                Some(self.n_snap - 1)
            } else {
                None
            };
            self.record.update(
                &self.population,
                self.resources,
                self.surv_penf,
                self.repr_penf,
                stage,
                snapshot,
            )?;
            if report {
                let msg = format!(
                    "Population = {}, resources = {}.",
                    self.population.size(),
                    self.resources
                );
                self.logprint(msg);
            }
            if let Some(slot) = snapshot {
                debug!(run = self.n_run, stage, slot, "snapshot taken");
            }

            self.population.increment_ages();
            self.update_resources();
            self.update_starvation_factors();
            if verbose && self.surv_penf * self.repr_penf != 1.0 {
                debug!(
                    run = self.n_run,
                    stage,
                    surv_penf = self.surv_penf,
                    repr_penf = self.repr_penf,
                    "starving"
                );
            }

            let crisis = &self.config.crisis;
            let hit = crisis.stages.contains(&stage)
                || (crisis.probability > 0.0 && self.rng.random::<f64>() < crisis.probability);
            if hit {
                let killed = self.population.crisis(crisis.survival, &mut self.rng);
                self.logprint(format!("Crisis! {killed} individuals died."));
            }

            let evo = &self.config.evolution;
            let births = self.population.growth(
                &self.repr_range,
                self.repr_penf,
                evo.m_rate,
                evo.m_ratio,
                evo.r_rate,
                &mut self.rng,
            )?;
            let deaths = self.population.death(&self.surv_range, self.surv_penf, &mut self.rng);
            if verbose && report {
                debug!(run = self.n_run, stage, births, deaths, "stage complete");
            }
            if self.population.is_empty() {
                self.mark_dieoff(stage);
            }
        }

        self.n_stage += 1;
        if self.status == RunStatus::Running && self.n_stage >= self.config.execution.number_of_stages {
            self.status = RunStatus::Complete;
            self.record.finalise();
        }
        Ok(())
    }

    fn mark_dieoff(&mut self, stage: usize) {
        self.status = RunStatus::Dieoff;
        self.record.set_dieoff(true);
        warn!(run = self.n_run, stage, "population died out");
        self.logprint(format!("Dieoff at stage {stage}."));
    }

    /// Execute stages until the run completes, retrying after dieoff.
    ///
    /// Each retry restarts from the state the run had when this method was
    /// called, with the random stream carried forward. After `max_fail`
    /// failed attempts the last one is accepted and finalised.
    pub fn execute(&mut self) -> Result<(), SimulationError> {
        if self.is_complete() {
            return Err(SimulationError::RunComplete(self.n_run));
        }
        let start = Instant::now();
        let max_fail = self.config.execution.max_fail;
        let blank = self.clone();
        let mut nfail = 0;

        loop {
            while !self.is_complete() {
                self.execute_stage()?;
            }
            if self.status != RunStatus::Dieoff {
                break;
            }
            nfail += 1;
            if nfail >= max_fail {
                self.status = RunStatus::AcceptedFailure;
                warn!(run = self.n_run, attempts = nfail, "accepting failed run");
                self.logprint("Reached maximum number of failures; accepting failed run.".to_string());
                self.record.finalise();
                break;
            }
            self.logprint(format!("Run failed ({nfail}/{max_fail}); restarting."));
            self.restore(&blank, nfail);
        }

        let elapsed = format_runtime(start.elapsed());
        self.logprint(elapsed);
        Ok(())
    }

    /// Return to `blank`, keeping the log and random stream.
    fn restore(&mut self, blank: &Run, prev_failed: usize) {
        let log = std::mem::take(&mut self.log);
        let rng = self.rng.clone();
        *self = blank.clone();
        self.log = log;
        self.rng = rng;
        self.record.set_prev_failed(prev_failed);
    }

    /// Append `msg` to the run log, prefixed with run and stage numbers.
    pub fn logprint(&mut self, msg: String) {
        let ex = &self.config.execution;
        let rw = digits(ex.number_of_runs.saturating_sub(1));
        let sw = digits(ex.number_of_stages.saturating_sub(1));
        let stage = self.n_stage;
        info!(run = self.n_run, stage, "{msg}");
        self.log
            .push(format!("RUN {:>rw$} | STAGE {:>sw$} | {msg}", self.n_run, stage));
    }

    /// Serialized RNG state.
    pub fn rng_state_bytes(&self) -> Result<Vec<u8>, SimulationError> {
        bincode::serialize(&self.rng).map_err(|e| SimulationError::RngState(e.to_string()))
    }

    /// Restore the RNG from [`Run::rng_state_bytes`] output.
    pub fn set_rng_from_bytes(&mut self, bytes: &[u8]) -> Result<(), SimulationError> {
        self.rng = bincode::deserialize(bytes).map_err(|e| SimulationError::RngState(e.to_string()))?;
        Ok(())
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

/// A seed population must carry the configured loci with the configured width.
fn check_seed(config: &Config, pop: &Population) -> Result<(), SimulationError> {
    let canonical = config.genome_map()?;
    let mut expected = canonical.labels().to_vec();
    let mut found = pop.genmap().labels().to_vec();
    expected.sort_unstable();
    found.sort_unstable();
    if expected != found || pop.params().n_base != config.genome.n_base {
        return Err(PopulationError::IncompatibleLayout(
            "seed population does not match configured genome".to_string(),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::parameters::Snapshots;
    use rand::SeedableRng;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.execution.number_of_stages = 20;
        config.execution.snapshots = Snapshots::Count(3);
        config.execution.report_n = 5;
        config.execution.max_fail = 3;
        config.demography.start_pop = 60;
        config.demography.max_ls = 12;
        config.demography.maturity = 3;
        config.genome.n_base = 4;
        config.genome.n_neutral = 3;
        config.resources.res_var = false;
        config.resources.res_start = 1000;
        config.recording.windows = [("population_size".to_string(), 5)].into_iter().collect();
        config
    }

    fn make_run(config: Config, seed: u64) -> Run {
        Run::new(Arc::new(config), 0, None, Xoshiro256PlusPlus::seed_from_u64(seed)).unwrap()
    }

    fn resource_run(res: u64, n: usize) -> Run {
        let mut config = small_config();
        config.demography.start_pop = n;
        config.resources.res_var = true;
        config.resources.regrowth = 2.0;
        config.resources.increment = 1000;
        config.resources.res_limit = Some(5000);
        let mut run = make_run(config, 1);
        run.set_resources(res);
        run
    }

    #[test]
    fn test_update_resources() {
        for (res, n, expected) in [(1000, 500, 2000), (500, 1000, 500), (5000, 0, 5000), (0, 5000, 0)] {
            let mut run = resource_run(res, n);
            run.update_resources();
            assert_eq!(run.resources(), expected, "res {res}, N {n}");
        }
    }

    #[test]
    fn test_constant_resources_unchanged() {
        let mut run = make_run(small_config(), 1);
        run.update_resources();
        assert_eq!(run.resources(), 1000);
    }

    #[test]
    fn test_starving() {
        let mut config = small_config();
        config.demography.start_pop = 100;
        config.resources.res_start = 50;
        let mut run = make_run(config, 1);
        assert!(run.starving());
        run.set_resources(100);
        assert!(!run.starving());

        let mut run = resource_run(0, 10);
        assert!(run.starving());
        run.set_resources(1);
        assert!(!run.starving());
    }

    #[test]
    fn test_starvation_factors_compound_and_reset() {
        let mut config = small_config();
        config.demography.start_pop = 100;
        config.resources.res_start = 50;
        config.starvation.surv_pen = true;
        config.starvation.repr_pen = true;
        config.starvation.death_inc = 3.0;
        config.starvation.repr_dec = 2.0;
        let mut run = make_run(config, 1);
        run.update_starvation_factors();
        run.update_starvation_factors();
        assert_eq!(run.surv_penf(), 9.0);
        assert_eq!(run.repr_penf(), 4.0);
        run.set_resources(1000);
        run.update_starvation_factors();
        assert_eq!(run.surv_penf(), 1.0);
        assert_eq!(run.repr_penf(), 1.0);
    }

    #[test]
    fn test_disabled_penalties_stay_at_one() {
        let mut config = small_config();
        config.demography.start_pop = 100;
        config.resources.res_start = 50;
        config.starvation.surv_pen = false;
        config.starvation.repr_pen = false;
        let mut run = make_run(config, 1);
        run.update_starvation_factors();
        assert_eq!(run.surv_penf(), 1.0);
        assert_eq!(run.repr_penf(), 1.0);
    }

    #[test]
    fn test_execute_stage_empty_population_is_dieoff() {
        let mut config = small_config();
        config.demography.start_pop = 0;
        let mut run = make_run(config, 1);
        run.execute_stage().unwrap();
        assert_eq!(run.status(), RunStatus::Dieoff);
        assert_eq!(run.n_stage(), 1);
        assert!(run.record().dieoff());
        assert!(run.log().last().unwrap().contains("Dieoff at stage 0."));
        assert_eq!(
            run.execute_stage(),
            Err(SimulationError::RunComplete(0))
        );
    }

    #[test]
    fn test_dieoff_detected_in_same_stage() {
        let mut config = small_config();
        config.execution.number_of_stages = 10;
        config.demography.start_pop = 50;
        config.demography.surv_bound = [0.0, 0.0];
        config.demography.repr_bound = [0.0, 0.0];
        let mut run = make_run(config, 4);
        run.execute_stage().unwrap();
        assert!(run.population().is_empty());
        assert_eq!(run.status(), RunStatus::Dieoff);
        assert!(run.is_complete());
        assert_eq!(run.n_stage(), 1);
        assert!(run.record().dieoff());
        assert!(run.log().last().unwrap().contains("Dieoff at stage 0."));
    }

    #[test]
    fn test_dieoff_on_final_stage_is_not_success() {
        let mut config = small_config();
        config.execution.number_of_stages = 1;
        config.execution.snapshots = Snapshots::Count(1);
        config.execution.max_fail = 2;
        config.demography.start_pop = 50;
        config.demography.surv_bound = [0.0, 0.0];
        config.demography.repr_bound = [0.0, 0.0];
        let mut run = make_run(config.clone(), 4);
        run.execute_stage().unwrap();
        assert_eq!(run.status(), RunStatus::Dieoff);
        assert!(!run.record().is_finalised());

        let mut run = make_run(config, 4);
        run.execute().unwrap();
        assert_eq!(run.status(), RunStatus::AcceptedFailure);
        assert_eq!(run.record().prev_failed(), 1);
        assert_eq!(run.log().iter().filter(|l| l.contains("restarting")).count(), 1);
    }

    #[test]
    fn test_execute_stage_ages_and_records() {
        let mut config = small_config();
        config.demography.surv_bound = [1.0, 1.0];
        config.demography.repr_bound = [0.0, 0.0];
        let mut run = make_run(config, 3);
        run.execute_stage().unwrap();
        assert_eq!(run.population().size(), 60);
        assert!(run.population().ages().iter().all(|&a| a == 4));
        assert_eq!(run.record().population_size()[0], 60.0);
        assert_eq!(run.record().age_distribution()[[0, 3]], 1.0);
        assert!(run.record().snapshot_pops()[0].is_some());
        assert!(run.record().snapshot_pops()[1].is_none());
    }

    #[test]
    fn test_crisis_stage() {
        let mut config = small_config();
        config.demography.surv_bound = [1.0, 1.0];
        config.demography.repr_bound = [0.0, 0.0];
        config.crisis.stages = vec![0];
        config.crisis.survival = 0.5;
        let mut run = make_run(config, 3);
        run.execute_stage().unwrap();
        assert_eq!(run.population().size(), 30);
        assert!(run.log().iter().any(|l| l.contains("Crisis! 30 individuals died.")));
    }

    #[test]
    fn test_execute_completes_and_finalises() {
        let mut config = small_config();
        config.demography.surv_bound = [0.95, 1.0];
        config.demography.repr_bound = [0.2, 0.4];
        config.starvation.surv_pen = false;
        let mut run = make_run(config, 11);
        run.execute().unwrap();
        assert_eq!(run.status(), RunStatus::Complete);
        assert_eq!(run.n_stage(), 20);
        assert!(run.record().is_finalised());
        assert_eq!(run.record().percent_dieoff(), 0.0);
        assert!(run.log().last().unwrap().contains("Total runtime:"));
        assert!(run.log()[0].starts_with("RUN 0 | STAGE  0 | Population = "));
        assert!(run.record().get("population_size_window_mean").is_ok());
        assert!(run.execute().is_err());
    }

    #[test]
    fn test_execute_retries_then_accepts_failure() {
        let mut config = small_config();
        config.demography.surv_bound = [0.0, 0.0];
        config.demography.repr_bound = [0.0, 0.0];
        config.execution.max_fail = 3;
        let mut run = make_run(config, 5);
        run.execute().unwrap();
        assert_eq!(run.status(), RunStatus::AcceptedFailure);
        assert!(run.dieoff());
        assert_eq!(run.record().prev_failed(), 2);
        assert_eq!(run.record().percent_dieoff(), 100.0);
        assert!(run.record().is_finalised());
        let restarts = run.log().iter().filter(|l| l.contains("restarting")).count();
        assert_eq!(restarts, 2);
        let dieoffs = run.log().iter().filter(|l| l.contains("Dieoff")).count();
        assert_eq!(dieoffs, 3);
    }

    #[test]
    fn test_seeded_run() {
        let config = small_config();
        let donor = make_run(config.clone(), 8);
        let seed = donor.population().clone();
        let run = Run::new(
            Arc::new(config.clone()),
            1,
            Some(&seed),
            Xoshiro256PlusPlus::seed_from_u64(9),
        )
        .unwrap();
        assert_eq!(run.population(), &seed);
        assert_eq!(run.record().genmap(), seed.genmap());

        let mut other = config;
        other.genome.n_neutral = 4;
        assert!(matches!(
            Run::new(Arc::new(other), 1, Some(&seed), Xoshiro256PlusPlus::seed_from_u64(9)),
            Err(SimulationError::Population(PopulationError::IncompatibleLayout(_)))
        ));
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut config = small_config();
        config.demography.surv_bound = [0.9, 1.0];
        config.demography.repr_bound = [0.1, 0.3];
        let mut a = make_run(config.clone(), 21);
        let mut b = make_run(config, 21);
        a.execute().unwrap();
        b.execute().unwrap();
        assert_eq!(a.population(), b.population());
        assert_eq!(a.record(), b.record());
    }

    #[test]
    fn test_rng_state_round_trip() {
        let mut run = make_run(small_config(), 2);
        let bytes = run.rng_state_bytes().unwrap();
        let first: u64 = run.rng.random();
        run.set_rng_from_bytes(&bytes).unwrap();
        let again: u64 = run.rng.random();
        assert_eq!(first, again);
        assert!(run.set_rng_from_bytes(&[1, 2]).is_err());
    }
}
