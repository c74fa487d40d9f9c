//! Population state and demographic operations.
//!
//! A population is a set of diploid individuals stored column-wise: an
//! `N x 2*chr_len` bit matrix of genomes plus per-individual ages,
//! generations and generation times. Every operation keeps all four in
//! step, and every operation on an empty population is a no-op.

use crate::errors::PopulationError;
use crate::evolution::{assort, MutationModel, RecombinationModel};
use crate::genome::{locus_state, GenomeMap, LocusType};
use crate::simulation::parameters::{BitDistribution, Config, ReproductionMode};
use ndarray::{concatenate, Array2, Axis};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters a population needs independently of the run driving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParams {
    pub repr_mode: ReproductionMode,
    pub n_base: usize,
    pub chr_len: usize,
    pub maturity: usize,
    pub max_ls: usize,
    pub start_pop: usize,
    pub age_random: bool,
    pub g_dist: BitDistribution,
}

impl PopulationParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repr_mode: config.demography.repr_mode,
            n_base: config.genome.n_base,
            chr_len: config.chr_len(),
            maturity: config.demography.maturity,
            max_ls: config.demography.max_ls,
            start_pop: config.demography.start_pop,
            age_random: config.demography.age_random,
            g_dist: config.genome.g_dist,
        }
    }
}

/// A cohort of diploid individuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    params: PopulationParams,
    genmap: GenomeMap,
    ages: Vec<usize>,
    genomes: Array2<u8>,
    generations: Vec<usize>,
    gentimes: Vec<usize>,
}

/// Random bit matrix with one Bernoulli probability per locus type.
pub fn make_genome<R: Rng + ?Sized>(
    n: usize,
    genmap: &GenomeMap,
    n_base: usize,
    dist: &BitDistribution,
    rng: &mut R,
) -> Array2<u8> {
    let chr_len = genmap.len() * n_base;
    let probs: Vec<f64> = genmap
        .labels()
        .iter()
        .map(|&label| match genmap.locus_type(label) {
            LocusType::Survival => dist.s,
            LocusType::Reproduction => dist.r,
            LocusType::Neutral => dist.n,
        })
        .collect();

    let mut genomes = Array2::zeros((n, 2 * chr_len));
    for mut row in genomes.outer_iter_mut() {
        for (j, bit) in row.iter_mut().enumerate() {
            let locus = (j % chr_len) / n_base;
            *bit = u8::from(rng.random::<f64>() < probs[locus]);
        }
    }
    genomes
}

impl Population {
    /// Assemble a population from its parts.
    ///
    /// # Errors
    /// Fails if the per-individual vectors disagree in length or the genome
    /// width does not match `2 * chr_len`.
    pub fn new(
        params: PopulationParams,
        genmap: GenomeMap,
        ages: Vec<usize>,
        genomes: Array2<u8>,
        generations: Vec<usize>,
        gentimes: Vec<usize>,
    ) -> Result<Self, PopulationError> {
        let n = genomes.nrows();
        if ages.len() != n || generations.len() != n || gentimes.len() != n {
            return Err(PopulationError::LengthMismatch {
                ages: ages.len(),
                genomes: n,
                generations: generations.len(),
                gentimes: gentimes.len(),
            });
        }
        let expected = 2 * genmap.len() * params.n_base;
        if genomes.ncols() != expected || params.chr_len * 2 != expected {
            return Err(PopulationError::GenomeWidth {
                expected,
                found: genomes.ncols(),
            });
        }
        Ok(Self {
            params,
            genmap,
            ages,
            genomes,
            generations,
            gentimes,
        })
    }

    /// Founding population of `params.start_pop` random individuals.
    pub fn founders<R: Rng + ?Sized>(params: PopulationParams, genmap: GenomeMap, rng: &mut R) -> Self {
        let n = params.start_pop;
        let ages = if params.age_random {
            (0..n).map(|_| rng.random_range(0..params.max_ls)).collect()
        } else {
            vec![params.maturity; n]
        };
        let genomes = make_genome(n, &genmap, params.n_base, &params.g_dist, rng);
        Self {
            params,
            genmap,
            ages,
            genomes,
            generations: vec![0; n],
            gentimes: vec![0; n],
        }
    }

    /// An empty population sharing this one's layout.
    pub fn empty_like(&self) -> Self {
        Self {
            params: self.params.clone(),
            genmap: self.genmap.clone(),
            ages: Vec::new(),
            genomes: Array2::zeros((0, self.genomes.ncols())),
            generations: Vec::new(),
            gentimes: Vec::new(),
        }
    }

    /// Number of individuals.
    #[inline]
    pub fn size(&self) -> usize {
        self.ages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    pub fn params(&self) -> &PopulationParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut PopulationParams {
        &mut self.params
    }

    pub fn genmap(&self) -> &GenomeMap {
        &self.genmap
    }

    pub fn ages(&self) -> &[usize] {
        &self.ages
    }

    pub fn genomes(&self) -> &Array2<u8> {
        &self.genomes
    }

    pub fn genomes_mut(&mut self) -> &mut Array2<u8> {
        &mut self.genomes
    }

    pub fn generations(&self) -> &[usize] {
        &self.generations
    }

    pub fn gentimes(&self) -> &[usize] {
        &self.gentimes
    }

    pub fn chr_len(&self) -> usize {
        self.params.chr_len
    }

    /// Replace all ages (lengths must agree).
    pub fn set_ages(&mut self, ages: Vec<usize>) -> Result<(), PopulationError> {
        if ages.len() != self.size() {
            return Err(PopulationError::LengthMismatch {
                ages: ages.len(),
                genomes: self.genomes.nrows(),
                generations: self.generations.len(),
                gentimes: self.gentimes.len(),
            });
        }
        self.ages = ages;
        Ok(())
    }

    /// Whether another population has the same genome layout.
    pub fn is_compatible(&self, other: &Population) -> bool {
        self.genmap == other.genmap
            && self.params.n_base == other.params.n_base
            && self.genomes.ncols() == other.genomes.ncols()
    }

    /// Bernoulli draw per individual from the state of the locus labelled
    /// `offset + age`, mapped through `table`.
    ///
    /// Individuals with an age outside `[min_age, max_age)`, or whose locus
    /// is absent from the map, are never selected.
    pub fn get_subpop<R: Rng + ?Sized>(
        &self,
        min_age: usize,
        max_age: usize,
        offset: usize,
        table: &[f64],
        rng: &mut R,
    ) -> Vec<bool> {
        let n_base = self.params.n_base;
        self.ages
            .iter()
            .zip(self.genomes.outer_iter())
            .map(|(&age, row)| {
                let u: f64 = rng.random();
                if age < min_age || age >= max_age {
                    return false;
                }
                match self.genmap.position(offset + age) {
                    Some(pos) => {
                        let p = table.get(locus_state(row, pos, n_base)).copied().unwrap_or(0.0);
                        u < p
                    }
                    None => false,
                }
            })
            .collect()
    }

    /// Keep only individuals whose mask entry is true, preserving order.
    pub fn retain_mask(&mut self, keep: &[bool]) {
        let idx: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.retain_indices(&idx);
    }

    fn retain_indices(&mut self, idx: &[usize]) {
        if idx.len() == self.size() {
            return;
        }
        self.genomes = self.genomes.select(Axis(0), idx);
        self.ages = idx.iter().map(|&i| self.ages[i]).collect();
        self.generations = idx.iter().map(|&i| self.generations[i]).collect();
        self.gentimes = idx.iter().map(|&i| self.gentimes[i]).collect();
    }

    /// Remove individuals according to their survival genotype.
    ///
    /// Death probability is `clip((1 - survival[state]) * penalty, 0, 1)`;
    /// individuals that have reached the maximum lifespan always die.
    /// Returns the number of deaths.
    pub fn death<R: Rng + ?Sized>(&mut self, surv_range: &[f64], penalty: f64, rng: &mut R) -> usize {
        if self.is_empty() {
            return 0;
        }
        let death_table: Vec<f64> = surv_range
            .iter()
            .map(|&s| clip_probability((1.0 - s) * penalty))
            .collect();
        let max_ls = self.params.max_ls;
        let dies = self.get_subpop(0, max_ls, 0, &death_table, rng);
        let keep: Vec<bool> = dies
            .iter()
            .zip(&self.ages)
            .map(|(&d, &age)| !d && age < max_ls)
            .collect();
        let before = self.size();
        self.retain_mask(&keep);
        before - self.size()
    }

    /// Produce offspring from mature individuals and append them.
    ///
    /// Parent probability is `clip(repr[state] / penalty, 0, 1)` in asexual
    /// modes and `clip(repr[state] / penalty / 2, 0, 1)` in sexual ones. Sexual parents are shuffled and paired, an odd one out
    /// sitting this stage out. Offspring are mutated, start at age 0 and
    /// one generation past their (eldest-lineage) parent. Returns the
    /// number of births.
    pub fn growth<R: Rng + ?Sized>(
        &mut self,
        repr_range: &[f64],
        penalty: f64,
        m_rate: f64,
        m_ratio: f64,
        r_rate: f64,
        rng: &mut R,
    ) -> Result<usize, PopulationError> {
        if self.is_empty() {
            return Ok(0);
        }
        let mode = self.params.repr_mode;
        let scale = if mode.is_sexual() { 0.5 } else { 1.0 };
        let table: Vec<f64> = repr_range
            .iter()
            .map(|&r| clip_probability(r / penalty * scale))
            .collect();
        let chosen = self.get_subpop(
            self.params.maturity,
            self.params.max_ls,
            self.genmap.repr_offset(),
            &table,
            rng,
        );
        let mut parents: Vec<usize> = chosen
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| c.then_some(i))
            .collect();
        if parents.is_empty() {
            return Ok(0);
        }

        let mut offspring = self.empty_like();
        if mode.is_sexual() {
            parents.shuffle(rng);
            if parents.len() % 2 == 1 {
                parents.pop();
            }
            if parents.is_empty() {
                return Ok(0);
            }
            let mut pool = self.genomes.select(Axis(0), &parents);
            if mode.recombines() {
                RecombinationModel::new(r_rate)?.recombine_genomes(&mut pool, self.params.n_base, rng);
            }
            let n_pairs = parents.len() / 2;
            let mut genomes = Array2::zeros((n_pairs, self.genomes.ncols()));
            for (k, mut child) in genomes.outer_iter_mut().enumerate() {
                child.assign(&assort(pool.row(2 * k), pool.row(2 * k + 1), rng));
            }
            offspring.genomes = genomes;
            for pair in parents.chunks_exact(2) {
                let (a, b) = (pair[0], pair[1]);
                offspring
                    .generations
                    .push(self.generations[a].max(self.generations[b]) + 1);
                offspring.gentimes.push((self.ages[a] + self.ages[b]) / 2);
            }
        } else {
            let mut genomes = self.genomes.select(Axis(0), &parents);
            if mode.recombines() {
                RecombinationModel::new(r_rate)?.recombine_genomes(&mut genomes, self.params.n_base, rng);
            }
            offspring.genomes = genomes;
            offspring.generations = parents.iter().map(|&p| self.generations[p] + 1).collect();
            offspring.gentimes = parents.iter().map(|&p| self.ages[p]).collect();
        }
        offspring.ages = vec![0; offspring.genomes.nrows()];
        offspring.mutate(m_rate, m_ratio, rng)?;

        let born = offspring.size();
        self.addto(&offspring)?;
        Ok(born)
    }

    /// Keep a uniformly random subset of `round(N * survival)` individuals.
    pub fn crisis<R: Rng + ?Sized>(&mut self, survival: f64, rng: &mut R) -> usize {
        let n = self.size();
        if n == 0 {
            return 0;
        }
        let keep = ((n as f64 * survival).round().max(0.0) as usize).min(n);
        let mut idx = index::sample(rng, n, keep).into_vec();
        idx.sort_unstable();
        self.retain_indices(&idx);
        n - keep
    }

    /// Apply asymmetric bit-flip mutation to every genome.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f64, ratio: f64, rng: &mut R) -> Result<usize, PopulationError> {
        if self.is_empty() {
            return Ok(0);
        }
        Ok(MutationModel::new(rate, ratio)?.mutate_genomes(&mut self.genomes, rng))
    }

    /// Per-locus crossover between the two chromosomes of every genome.
    pub fn recombine<R: Rng + ?Sized>(&mut self, rate: f64, rng: &mut R) -> Result<usize, PopulationError> {
        if self.is_empty() {
            return Ok(0);
        }
        let n_base = self.params.n_base;
        Ok(RecombinationModel::new(rate)?.recombine_genomes(&mut self.genomes, n_base, rng))
    }

    /// Append another population's individuals, preserving order.
    pub fn addto(&mut self, other: &Population) -> Result<(), PopulationError> {
        if other.is_empty() {
            return Ok(());
        }
        if !self.is_compatible(other) {
            return Err(PopulationError::IncompatibleLayout(
                "genome maps or widths differ".to_string(),
            ));
        }
        self.genomes = concatenate(Axis(0), &[self.genomes.view(), other.genomes.view()])
            .map_err(|e| PopulationError::IncompatibleLayout(e.to_string()))?;
        self.ages.extend_from_slice(&other.ages);
        self.generations.extend_from_slice(&other.generations);
        self.gentimes.extend_from_slice(&other.gentimes);
        Ok(())
    }

    pub fn increment_ages(&mut self) {
        self.ages.iter_mut().for_each(|a| *a += 1);
    }

    /// Randomly permute the individuals.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut idx: Vec<usize> = (0..self.size()).collect();
        idx.shuffle(rng);
        self.genomes = self.genomes.select(Axis(0), &idx);
        self.ages = idx.iter().map(|&i| self.ages[i]).collect();
        self.generations = idx.iter().map(|&i| self.generations[i]).collect();
        self.gentimes = idx.iter().map(|&i| self.gentimes[i]).collect();
    }

    /// Cold representation for storage outside a run.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PopulationError> {
        bincode::serialize(self).map_err(|e| PopulationError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PopulationError> {
        let pop: Population =
            bincode::deserialize(bytes).map_err(|e| PopulationError::Serialization(e.to_string()))?;
        Population::new(
            pop.params,
            pop.genmap,
            pop.ages,
            pop.genomes,
            pop.generations,
            pop.gentimes,
        )
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
#[inline]
fn clip_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
