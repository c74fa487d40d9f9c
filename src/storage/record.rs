//! Per-run statistics record.
//!
//! A record is filled stage by stage while a run executes (population size,
//! resources, penalty factors, age structure, and full population copies at
//! snapshot stages). Once the run ends, [`Record::finalise`] derives genotype
//! densities, survival and reproduction probabilities, fitness, bit
//! statistics, observed death rates and sliding-window summaries.
//!
//! Fields are typed, but every entry can also be read or written by name
//! through [`Record::get`] and [`Record::set`].

use crate::analysis::utils::fivenum;
use crate::errors::RecordError;
use crate::genome::{n_states, GenomeMap, LocusType};
use crate::simulation::{Config, Population};
use crate::storage::types::{ByClass, ByTrait, RecordPhase, RecordValue, Tagged};
use ndarray::{Array, Array1, Array2, Array3, ArrayD, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics accumulated over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub(crate) phase: RecordPhase,

    // Layout and run metadata
    pub(crate) genmap: GenomeMap,
    pub(crate) n_base: usize,
    pub(crate) chr_len: usize,
    pub(crate) max_ls: usize,
    pub(crate) maturity: usize,
    pub(crate) n_neutral: usize,
    pub(crate) n_states: usize,
    pub(crate) sexual: bool,
    pub(crate) surv_bound: [f64; 2],
    pub(crate) repr_bound: [f64; 2],
    pub(crate) n_stages: usize,
    pub(crate) snapshot_stages: Vec<usize>,
    pub(crate) windows: BTreeMap<String, usize>,
    pub(crate) res_var: bool,
    pub(crate) start_pop: usize,
    pub(crate) dieoff: bool,
    pub(crate) prev_failed: usize,
    pub(crate) percent_dieoff: f64,

    // Per-stage series
    pub(crate) population_size: Array1<f64>,
    pub(crate) resources: Array1<f64>,
    pub(crate) surv_penf: Array1<f64>,
    pub(crate) repr_penf: Array1<f64>,
    pub(crate) age_distribution: Array2<f64>,
    pub(crate) generation_dist: Array2<f64>,
    pub(crate) gentime_dist: Array2<f64>,

    // Per-snapshot raw data
    pub(crate) snapshot_pops: Vec<Option<Population>>,
    pub(crate) snapshot_age_distribution: Array2<f64>,

    // Genotype densities
    pub(crate) density_per_locus: ByClass<Array3<f64>>,
    pub(crate) density: ByClass<Array2<f64>>,
    pub(crate) mean_gt: ByClass<Array2<f64>>,
    pub(crate) var_gt: ByClass<Array2<f64>>,
    pub(crate) entropy_gt: ByClass<Array1<f64>>,

    // Probabilities and fitness
    pub(crate) prob_mean: ByTrait<Array2<f64>>,
    pub(crate) prob_var: ByTrait<Array2<f64>>,
    pub(crate) junk_mean: ByTrait<Array2<f64>>,
    pub(crate) junk_var: ByTrait<Array2<f64>>,
    pub(crate) cmv_surv: Array2<f64>,
    pub(crate) junk_cmv_surv: Array2<f64>,
    pub(crate) fitness_term: Array2<f64>,
    pub(crate) junk_fitness_term: Array2<f64>,
    pub(crate) fitness: Array1<f64>,
    pub(crate) junk_fitness: Array1<f64>,
    pub(crate) repr_value: Array2<f64>,
    pub(crate) junk_repr_value: Array2<f64>,

    // Bit statistics
    pub(crate) n1: Array2<f64>,
    pub(crate) n1_var: Array2<f64>,
    pub(crate) entropy_bits: Array1<f64>,

    pub(crate) actual_death_rate: Array2<f64>,
    pub(crate) window_stats: BTreeMap<String, ArrayD<f64>>,

    /// Ad hoc scalars set by name
    pub(crate) extras: BTreeMap<String, RecordValue>,
}

/// Keys describing the genome layout; fixed once the record exists.
const LAYOUT_KEYS: &[&str] = &[
    "genmap",
    "genmap_argsort",
    "chr_len",
    "n_base",
    "max_ls",
    "maturity",
    "n_neutral",
    "repr_offset",
    "neut_offset",
    "n_states",
    "n_stages",
    "n_snapshots",
    "snapshot_stages",
    "start_pop",
    "res_var",
];

impl Record {
    /// Empty record for a run using `genmap` under `config`.
    pub fn new(config: &Config, genmap: &GenomeMap) -> Self {
        let max_ls = config.demography.max_ls;
        let maturity = config.demography.maturity;
        let n_neutral = config.genome.n_neutral;
        let n_base = config.genome.n_base;
        let ns = n_states(n_base);
        let n_stages = config.execution.number_of_stages;
        let snapshot_stages = config.snapshot_stages();
        let m = snapshot_stages.len();
        let chr_len = genmap.len() * n_base;
        let n_loci = |kind: LocusType| match kind {
            LocusType::Survival => max_ls,
            LocusType::Reproduction => max_ls - maturity,
            LocusType::Neutral => n_neutral,
        };
        let (ls, lr, ln, la) = (
            n_loci(LocusType::Survival),
            n_loci(LocusType::Reproduction),
            n_loci(LocusType::Neutral),
            genmap.len(),
        );

        let density_per_locus = ByClass {
            s: Array3::zeros((ns, m, ls)),
            r: Array3::zeros((ns, m, lr)),
            n: Array3::zeros((ns, m, ln)),
            a: Array3::zeros((ns, m, la)),
        };
        let mean_gt = ByClass {
            s: Array2::zeros((m, ls)),
            r: Array2::zeros((m, lr)),
            n: Array2::zeros((m, ln)),
            a: Array2::zeros((m, la)),
        };
        let var_gt = mean_gt.clone();
        let per_trait = ByTrait {
            surv: Array2::zeros((m, max_ls)),
            repr: Array2::zeros((m, lr)),
        };
        let junk = ByTrait {
            surv: Array2::zeros((m, n_neutral)),
            repr: Array2::zeros((m, n_neutral)),
        };

        Self {
            phase: RecordPhase::Accumulating,
            genmap: genmap.clone(),
            n_base,
            chr_len,
            max_ls,
            maturity,
            n_neutral,
            n_states: ns,
            sexual: config.is_sexual(),
            surv_bound: config.surv_bound(),
            repr_bound: config.repr_bound(),
            n_stages,
            snapshot_stages,
            windows: config.recording.windows.clone(),
            res_var: config.resources.res_var,
            start_pop: config.demography.start_pop,
            dieoff: false,
            prev_failed: 0,
            percent_dieoff: 0.0,
            population_size: Array1::zeros(n_stages),
            resources: Array1::zeros(n_stages),
            surv_penf: Array1::zeros(n_stages),
            repr_penf: Array1::zeros(n_stages),
            age_distribution: Array2::zeros((n_stages, max_ls)),
            generation_dist: Array2::zeros((n_stages, 5)),
            gentime_dist: Array2::zeros((n_stages, 5)),
            snapshot_pops: vec![None; m],
            snapshot_age_distribution: Array2::zeros((m, max_ls)),
            density_per_locus,
            density: ByClass {
                s: Array2::zeros((ns, m)),
                r: Array2::zeros((ns, m)),
                n: Array2::zeros((ns, m)),
                a: Array2::zeros((ns, m)),
            },
            mean_gt,
            var_gt,
            entropy_gt: ByClass {
                s: Array1::zeros(m),
                r: Array1::zeros(m),
                n: Array1::zeros(m),
                a: Array1::zeros(m),
            },
            prob_mean: per_trait.clone(),
            prob_var: per_trait,
            junk_mean: junk.clone(),
            junk_var: junk,
            cmv_surv: Array2::zeros((m, max_ls)),
            junk_cmv_surv: Array2::zeros((m, max_ls)),
            fitness_term: Array2::zeros((m, max_ls)),
            junk_fitness_term: Array2::zeros((m, max_ls)),
            fitness: Array1::zeros(m),
            junk_fitness: Array1::zeros(m),
            repr_value: Array2::zeros((m, max_ls)),
            junk_repr_value: Array2::zeros((m, max_ls)),
            n1: Array2::zeros((m, chr_len)),
            n1_var: Array2::zeros((m, chr_len)),
            entropy_bits: Array1::zeros(m),
            actual_death_rate: Array2::zeros((0, max_ls)),
            window_stats: BTreeMap::new(),
            extras: BTreeMap::new(),
        }
    }

    /// Record the state of the population at the start of `stage`.
    ///
    /// With `snapshot = Some(i)` a full copy of the population is also
    /// stored in snapshot slot `i`.
    pub fn update(
        &mut self,
        population: &Population,
        resources: u64,
        surv_penf: f64,
        repr_penf: f64,
        stage: usize,
        snapshot: Option<usize>,
    ) -> Result<(), RecordError> {
        if stage >= self.n_stages {
            return Err(RecordError::OutOfRange {
                what: "stage",
                index: stage,
                len: self.n_stages,
            });
        }
        let n = population.size();
        self.population_size[stage] = n as f64;
        self.resources[stage] = resources as f64;
        self.surv_penf[stage] = surv_penf;
        self.repr_penf[stage] = repr_penf;

        let age_dist = self.age_histogram(population);
        self.age_distribution.row_mut(stage).assign(&age_dist);

        let gens: Vec<f64> = population.generations().iter().map(|&g| g as f64).collect();
        let times: Vec<f64> = population.gentimes().iter().map(|&g| g as f64).collect();
        self.generation_dist
            .row_mut(stage)
            .assign(&Array1::from_vec(fivenum(&gens).to_vec()));
        self.gentime_dist
            .row_mut(stage)
            .assign(&Array1::from_vec(fivenum(&times).to_vec()));

        if let Some(slot) = snapshot {
            let m = self.snapshot_pops.len();
            if slot >= m {
                return Err(RecordError::OutOfRange {
                    what: "snapshot",
                    index: slot,
                    len: m,
                });
            }
            self.snapshot_pops[slot] = Some(population.clone());
            self.snapshot_age_distribution.row_mut(slot).assign(&age_dist);
        }
        Ok(())
    }

    /// Fraction of individuals at each age.
    fn age_histogram(&self, population: &Population) -> Array1<f64> {
        let mut hist = Array1::zeros(self.max_ls);
        let n = population.size();
        if n == 0 {
            return hist;
        }
        for &age in population.ages() {
            if age < self.max_ls {
                hist[age] += 1.0;
            }
        }
        hist / n as f64
    }

    pub fn phase(&self) -> RecordPhase {
        self.phase
    }

    pub fn is_finalised(&self) -> bool {
        self.phase == RecordPhase::Finalised
    }

    pub fn genmap(&self) -> &GenomeMap {
        &self.genmap
    }

    pub fn n_snapshots(&self) -> usize {
        self.snapshot_stages.len()
    }

    pub fn snapshot_stages(&self) -> &[usize] {
        &self.snapshot_stages
    }

    pub fn dieoff(&self) -> bool {
        self.dieoff
    }

    pub fn set_dieoff(&mut self, dieoff: bool) {
        self.dieoff = dieoff;
    }

    pub fn prev_failed(&self) -> usize {
        self.prev_failed
    }

    pub fn set_prev_failed(&mut self, prev_failed: usize) {
        self.prev_failed = prev_failed;
    }

    pub fn percent_dieoff(&self) -> f64 {
        self.percent_dieoff
    }

    pub fn population_size(&self) -> &Array1<f64> {
        &self.population_size
    }

    pub fn resources(&self) -> &Array1<f64> {
        &self.resources
    }

    pub fn age_distribution(&self) -> &Array2<f64> {
        &self.age_distribution
    }

    pub fn snapshot_pops(&self) -> &[Option<Population>] {
        &self.snapshot_pops
    }

    pub fn fitness(&self) -> &Array1<f64> {
        &self.fitness
    }

    pub fn fitness_term(&self) -> &Array2<f64> {
        &self.fitness_term
    }

    pub fn cmv_surv(&self) -> &Array2<f64> {
        &self.cmv_surv
    }

    pub fn repr_value(&self) -> &Array2<f64> {
        &self.repr_value
    }

    pub fn actual_death_rate(&self) -> &Array2<f64> {
        &self.actual_death_rate
    }

    /// Update `percent_dieoff` from the failure counters.
    pub fn compute_failure_stats(&mut self) {
        let failed = self.prev_failed as f64;
        let died = if self.dieoff { 1.0 } else { 0.0 };
        self.percent_dieoff = 100.0 * (failed + died) / (failed + 1.0);
    }

    /// Every numeric array in the record, nested entries flattened to
    /// `key.tag` names.
    pub fn numeric_fields(&self) -> BTreeMap<String, ArrayD<f64>> {
        let mut out = BTreeMap::new();
        for key in Self::ARRAY_KEYS.iter().chain(Self::NESTED_KEYS) {
            match self.get(key) {
                Ok(RecordValue::Array(a)) => {
                    out.insert(key.to_string(), a);
                }
                Ok(RecordValue::Nested(map)) => {
                    for (tag, a) in map {
                        out.insert(format!("{key}.{tag}"), a);
                    }
                }
                _ => {}
            }
        }
        for (key, a) in &self.window_stats {
            out.insert(key.clone(), a.clone());
        }
        out
    }

    /// Keys holding plain numeric arrays.
    pub const ARRAY_KEYS: &'static [&'static str] = &[
        "population_size",
        "resources",
        "surv_penf",
        "repr_penf",
        "age_distribution",
        "generation_dist",
        "gentime_dist",
        "snapshot_age_distribution",
        "cmv_surv",
        "junk_cmv_surv",
        "fitness_term",
        "junk_fitness_term",
        "fitness",
        "junk_fitness",
        "repr_value",
        "junk_repr_value",
        "n1",
        "n1_var",
        "entropy_bits",
        "actual_death_rate",
    ];

    /// Keys holding arrays keyed by locus class or trait.
    pub const NESTED_KEYS: &'static [&'static str] = &[
        "density_per_locus",
        "density",
        "mean_gt",
        "var_gt",
        "entropy_gt",
        "prob_mean",
        "prob_var",
        "junk_mean",
        "junk_var",
    ];

    /// Read an entry by name.
    pub fn get(&self, key: &str) -> Result<RecordValue, RecordError> {
        let value: RecordValue = match key {
            "genmap" => self.genmap.labels().to_vec().into(),
            "genmap_argsort" => self.genmap.argsort().into(),
            "chr_len" => self.chr_len.into(),
            "n_base" => self.n_base.into(),
            "max_ls" => self.max_ls.into(),
            "maturity" => self.maturity.into(),
            "n_neutral" => self.n_neutral.into(),
            "repr_offset" => self.genmap.repr_offset().into(),
            "neut_offset" => self.genmap.neut_offset().into(),
            "n_states" => self.n_states.into(),
            "n_stages" => self.n_stages.into(),
            "n_snapshots" => self.n_snapshots().into(),
            "snapshot_stages" => self.snapshot_stages.clone().into(),
            "start_pop" => self.start_pop.into(),
            "res_var" => self.res_var.into(),
            "sexual" => self.sexual.into(),
            "dieoff" => self.dieoff.into(),
            "prev_failed" => self.prev_failed.into(),
            "percent_dieoff" => self.percent_dieoff.into(),
            "surv_bound" => Array1::from_vec(self.surv_bound.to_vec()).into(),
            "repr_bound" => Array1::from_vec(self.repr_bound.to_vec()).into(),
            "surv_step" => self.surv_step().into(),
            "repr_step" => self.repr_step().into(),
            "windows" => RecordValue::Windows(self.windows.clone()),
            "snapshot_pops" => RecordValue::Snapshots(self.snapshot_pops.clone()),
            "population_size" => self.population_size.clone().into(),
            "resources" => self.resources.clone().into(),
            "surv_penf" => self.surv_penf.clone().into(),
            "repr_penf" => self.repr_penf.clone().into(),
            "age_distribution" => self.age_distribution.clone().into(),
            "generation_dist" => self.generation_dist.clone().into(),
            "gentime_dist" => self.gentime_dist.clone().into(),
            "snapshot_age_distribution" => self.snapshot_age_distribution.clone().into(),
            "density_per_locus" => (&self.density_per_locus).into(),
            "density" => (&self.density).into(),
            "mean_gt" => (&self.mean_gt).into(),
            "var_gt" => (&self.var_gt).into(),
            "entropy_gt" => (&self.entropy_gt).into(),
            "prob_mean" => (&self.prob_mean).into(),
            "prob_var" => (&self.prob_var).into(),
            "junk_mean" => (&self.junk_mean).into(),
            "junk_var" => (&self.junk_var).into(),
            "cmv_surv" => self.cmv_surv.clone().into(),
            "junk_cmv_surv" => self.junk_cmv_surv.clone().into(),
            "fitness_term" => self.fitness_term.clone().into(),
            "junk_fitness_term" => self.junk_fitness_term.clone().into(),
            "fitness" => self.fitness.clone().into(),
            "junk_fitness" => self.junk_fitness.clone().into(),
            "repr_value" => self.repr_value.clone().into(),
            "junk_repr_value" => self.junk_repr_value.clone().into(),
            "n1" => self.n1.clone().into(),
            "n1_var" => self.n1_var.clone().into(),
            "entropy_bits" => self.entropy_bits.clone().into(),
            "actual_death_rate" => self.actual_death_rate.clone().into(),
            other => {
                if let Some(a) = self.window_stats.get(other) {
                    RecordValue::Array(a.clone())
                } else if let Some(v) = self.extras.get(other) {
                    v.clone()
                } else {
                    return Err(RecordError::UnknownKey(other.to_string()));
                }
            }
        };
        Ok(value)
    }

    /// Write an entry by name.
    ///
    /// Layout keys are read-only. Unknown keys accept scalars only, which
    /// are kept in an extension map.
    pub fn set(&mut self, key: &str, value: RecordValue) -> Result<(), RecordError> {
        if LAYOUT_KEYS.contains(&key) {
            return Err(RecordError::ReadOnly(key.to_string()));
        }
        match key {
            "sexual" => self.sexual = flag(key, value)?,
            "dieoff" => self.dieoff = flag(key, value)?,
            "prev_failed" => {
                self.prev_failed = value.as_count().ok_or_else(|| mismatch(key, "count"))?
            }
            "percent_dieoff" => {
                self.percent_dieoff = value.as_float().ok_or_else(|| mismatch(key, "float"))?
            }
            "surv_bound" => self.surv_bound = bound(key, value)?,
            "repr_bound" => self.repr_bound = bound(key, value)?,
            "windows" => match value {
                RecordValue::Windows(w) => self.windows = w,
                _ => return Err(mismatch(key, "window map")),
            },
            "snapshot_pops" => match value {
                RecordValue::Snapshots(p) if p.len() == self.n_snapshots() => self.snapshot_pops = p,
                _ => return Err(mismatch(key, "one entry per snapshot")),
            },
            "population_size" => self.population_size = array(key, value)?,
            "resources" => self.resources = array(key, value)?,
            "surv_penf" => self.surv_penf = array(key, value)?,
            "repr_penf" => self.repr_penf = array(key, value)?,
            "age_distribution" => self.age_distribution = array(key, value)?,
            "generation_dist" => self.generation_dist = array(key, value)?,
            "gentime_dist" => self.gentime_dist = array(key, value)?,
            "snapshot_age_distribution" => self.snapshot_age_distribution = array(key, value)?,
            "density_per_locus" => set_nested(key, value, &mut self.density_per_locus)?,
            "density" => set_nested(key, value, &mut self.density)?,
            "mean_gt" => set_nested(key, value, &mut self.mean_gt)?,
            "var_gt" => set_nested(key, value, &mut self.var_gt)?,
            "entropy_gt" => set_nested(key, value, &mut self.entropy_gt)?,
            "prob_mean" => set_nested(key, value, &mut self.prob_mean)?,
            "prob_var" => set_nested(key, value, &mut self.prob_var)?,
            "junk_mean" => set_nested(key, value, &mut self.junk_mean)?,
            "junk_var" => set_nested(key, value, &mut self.junk_var)?,
            "cmv_surv" => self.cmv_surv = array(key, value)?,
            "junk_cmv_surv" => self.junk_cmv_surv = array(key, value)?,
            "fitness_term" => self.fitness_term = array(key, value)?,
            "junk_fitness_term" => self.junk_fitness_term = array(key, value)?,
            "fitness" => self.fitness = array(key, value)?,
            "junk_fitness" => self.junk_fitness = array(key, value)?,
            "repr_value" => self.repr_value = array(key, value)?,
            "junk_repr_value" => self.junk_repr_value = array(key, value)?,
            "n1" => self.n1 = array(key, value)?,
            "n1_var" => self.n1_var = array(key, value)?,
            "entropy_bits" => self.entropy_bits = array(key, value)?,
            "actual_death_rate" => self.actual_death_rate = array(key, value)?,
            other => {
                if self.window_stats.contains_key(other) {
                    match value {
                        RecordValue::Array(a) => {
                            self.window_stats.insert(other.to_string(), a);
                        }
                        _ => return Err(mismatch(key, "array")),
                    }
                } else if value.is_scalar() {
                    self.extras.insert(other.to_string(), value);
                } else {
                    return Err(RecordError::UnknownKey(other.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Probability increment per locus state for survival.
    pub fn surv_step(&self) -> f64 {
        (self.surv_bound[1] - self.surv_bound[0]) / (self.n_states - 1) as f64
    }

    /// Probability increment per locus state for reproduction.
    pub fn repr_step(&self) -> f64 {
        (self.repr_bound[1] - self.repr_bound[0]) / (self.n_states - 1) as f64
    }
}

fn mismatch(key: &str, expected: &'static str) -> RecordError {
    RecordError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

fn flag(key: &str, value: RecordValue) -> Result<bool, RecordError> {
    value.as_flag().ok_or_else(|| mismatch(key, "flag"))
}

fn bound(key: &str, value: RecordValue) -> Result<[f64; 2], RecordError> {
    match value {
        RecordValue::Array(a) if a.len() == 2 => {
            let v: Vec<f64> = a.iter().copied().collect();
            Ok([v[0], v[1]])
        }
        _ => Err(mismatch(key, "two-element array")),
    }
}

fn array<D: Dimension>(key: &str, value: RecordValue) -> Result<Array<f64, D>, RecordError> {
    match value {
        RecordValue::Array(a) => a
            .into_dimensionality::<D>()
            .map_err(|_| mismatch(key, "array of matching rank")),
        _ => Err(mismatch(key, "array")),
    }
}

fn set_nested<D, C>(key: &str, value: RecordValue, target: &mut C) -> Result<(), RecordError>
where
    D: Dimension,
    C: Tagged<Array<f64, D>>,
{
    let map = match value {
        RecordValue::Nested(map) => map,
        _ => return Err(mismatch(key, "nested arrays")),
    };
    let mut staged = Vec::with_capacity(map.len());
    for (tag, a) in map {
        if target.slot_mut(&tag).is_none() {
            return Err(mismatch(key, "known class tags"));
        }
        let a = a
            .into_dimensionality::<D>()
            .map_err(|_| mismatch(key, "arrays of matching rank"))?;
        staged.push((tag, a));
    }
    for (tag, a) in staged {
        if let Some(slot) = target.slot_mut(&tag) {
            *slot = a;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{PopulationParams, Snapshots};
    use ndarray::{Array2, Array3, IxDyn};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.demography.max_ls = 8;
        config.demography.maturity = 2;
        config.genome.n_base = 2;
        config.genome.n_neutral = 3;
        config.genome.repr_offset = 8;
        config.genome.neut_offset = 16;
        config.execution.number_of_stages = 6;
        config.execution.snapshots = Snapshots::Stages(vec![0, 5]);
        config
    }

    fn record() -> Record {
        let config = test_config();
        Record::new(&config, &config.genome_map().unwrap())
    }

    fn population(config: &Config, ages: Vec<usize>) -> Population {
        let n = ages.len();
        let generations = (0..n).collect();
        Population::new(
            PopulationParams::from_config(config),
            config.genome_map().unwrap(),
            ages,
            Array2::zeros((n, 2 * config.chr_len())),
            generations,
            vec![3; n],
        )
        .unwrap()
    }

    #[test]
    fn test_update_records_stage_and_snapshot() {
        let config = test_config();
        let mut rec = record();
        let pop = population(&config, vec![1, 1, 3, 7]);
        rec.update(&pop, 500, 2.0, 1.5, 0, Some(0)).unwrap();

        assert_eq!(rec.population_size()[0], 4.0);
        assert_eq!(rec.resources()[0], 500.0);
        assert_eq!(rec.surv_penf[0], 2.0);
        assert_eq!(rec.repr_penf[0], 1.5);
        assert_eq!(rec.age_distribution()[[0, 1]], 0.5);
        assert_eq!(rec.age_distribution()[[0, 7]], 0.25);
        assert_eq!(rec.generation_dist.row(0).to_vec(), vec![0.0, 0.75, 1.5, 2.25, 3.0]);
        assert!(rec.gentime_dist.row(0).iter().all(|&g| g == 3.0));
        assert_eq!(rec.snapshot_pops()[0].as_ref(), Some(&pop));
        assert!(rec.snapshot_pops()[1].is_none());
        assert_eq!(rec.snapshot_age_distribution.row(0), rec.age_distribution().row(0));
    }

    #[test]
    fn test_update_rejects_out_of_range() {
        let config = test_config();
        let mut rec = record();
        let pop = population(&config, vec![2; 3]);
        assert_eq!(
            rec.update(&pop, 0, 1.0, 1.0, 6, None),
            Err(RecordError::OutOfRange {
                what: "stage",
                index: 6,
                len: 6
            })
        );
        assert_eq!(
            rec.update(&pop, 0, 1.0, 1.0, 2, Some(2)),
            Err(RecordError::OutOfRange {
                what: "snapshot",
                index: 2,
                len: 2
            })
        );
    }

    #[test]
    fn test_update_empty_population() {
        let config = test_config();
        let mut rec = record();
        rec.update(&population(&config, Vec::new()), 10, 1.0, 1.0, 3, None).unwrap();
        assert_eq!(rec.population_size()[3], 0.0);
        assert_eq!(rec.age_distribution().row(3).sum(), 0.0);
    }

    #[test]
    fn test_get_layout_and_unknown() {
        let rec = record();
        assert_eq!(rec.get("max_ls"), Ok(RecordValue::Count(8)));
        assert_eq!(rec.get("n_states"), Ok(RecordValue::Count(5)));
        assert_eq!(rec.get("snapshot_stages"), Ok(RecordValue::Labels(vec![0, 5])));
        assert_eq!(rec.get("chr_len"), Ok(RecordValue::Count((8 + 6 + 3) * 2)));
        assert_eq!(
            rec.get("no_such_key"),
            Err(RecordError::UnknownKey("no_such_key".to_string()))
        );
    }

    #[test]
    fn test_set_layout_keys_read_only() {
        let mut rec = record();
        for key in ["genmap", "max_ls", "n_base", "snapshot_stages", "neut_offset"] {
            assert_eq!(
                rec.set(key, RecordValue::Count(1)),
                Err(RecordError::ReadOnly(key.to_string()))
            );
        }
        assert_eq!(rec.get("max_ls"), Ok(RecordValue::Count(8)));
    }

    #[test]
    fn test_set_type_mismatch() {
        let mut rec = record();
        assert!(matches!(
            rec.set("dieoff", RecordValue::Count(1)),
            Err(RecordError::TypeMismatch { expected: "flag", .. })
        ));
        assert!(matches!(
            rec.set("population_size", RecordValue::Float(2.0)),
            Err(RecordError::TypeMismatch { expected: "array", .. })
        ));
        // Rank 2 into a series.
        assert!(matches!(
            rec.set("fitness", Array2::<f64>::zeros((2, 2)).into()),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            rec.set("surv_bound", Array1::from_vec(vec![0.1, 0.2, 0.3]).into()),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            rec.set("snapshot_pops", RecordValue::Snapshots(vec![None])),
            Err(RecordError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_known_keys() {
        let mut rec = record();
        rec.set("dieoff", true.into()).unwrap();
        rec.set("prev_failed", 3usize.into()).unwrap();
        rec.set("percent_dieoff", 75.0.into()).unwrap();
        rec.set("repr_bound", Array1::from_vec(vec![0.0, 0.8]).into()).unwrap();
        rec.set("fitness", Array1::from_vec(vec![1.0, 2.0]).into()).unwrap();
        assert!(rec.dieoff());
        assert_eq!(rec.prev_failed(), 3);
        assert_eq!(rec.percent_dieoff(), 75.0);
        assert_eq!(rec.repr_step(), 0.2);
        assert_eq!(rec.fitness().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_set_unknown_keys() {
        let mut rec = record();
        rec.set("note", 4.5.into()).unwrap();
        assert_eq!(rec.get("note"), Ok(RecordValue::Float(4.5)));
        assert_eq!(
            rec.set("series", Array1::<f64>::zeros(3).into()),
            Err(RecordError::UnknownKey("series".to_string()))
        );
        assert_eq!(
            rec.set("labels", RecordValue::Labels(vec![1, 2])),
            Err(RecordError::UnknownKey("labels".to_string()))
        );
    }

    #[test]
    fn test_set_nested_is_staged() {
        let mut rec = record();
        let before = rec.get("density_per_locus").unwrap();

        let mut map = BTreeMap::new();
        map.insert("s".to_string(), Array3::<f64>::ones((5, 2, 8)).into_dyn());
        map.insert("r".to_string(), ArrayD::<f64>::ones(IxDyn(&[5, 2])));
        assert!(matches!(
            rec.set("density_per_locus", RecordValue::Nested(map)),
            Err(RecordError::TypeMismatch { .. })
        ));
        // A bad entry leaves every class untouched.
        assert_eq!(rec.get("density_per_locus").unwrap(), before);

        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Array3::<f64>::ones((5, 2, 8)).into_dyn());
        assert!(matches!(
            rec.set("density_per_locus", RecordValue::Nested(map)),
            Err(RecordError::TypeMismatch { expected: "known class tags", .. })
        ));

        let mut map = BTreeMap::new();
        map.insert("s".to_string(), Array3::<f64>::ones((5, 2, 8)).into_dyn());
        rec.set("density_per_locus", RecordValue::Nested(map)).unwrap();
        assert_eq!(rec.density_per_locus.s.sum(), 80.0);
        assert_eq!(rec.density_per_locus.r.sum(), 0.0);
    }

    #[test]
    fn test_failure_stats() {
        let mut rec = record();
        rec.compute_failure_stats();
        assert_eq!(rec.percent_dieoff(), 0.0);
        rec.set_prev_failed(3);
        rec.compute_failure_stats();
        assert_eq!(rec.percent_dieoff(), 75.0);
        rec.set_dieoff(true);
        rec.compute_failure_stats();
        assert_eq!(rec.percent_dieoff(), 100.0);
    }
}
