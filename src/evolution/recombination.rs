//! Crossover between the two chromosomes of a genome, and random assortment
//! of parental chromosomes into offspring.

use crate::errors::PopulationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Geometric};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-locus crossover probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecombinationModel {
    rate: f64,
}

impl RecombinationModel {
    /// # Errors
    /// Returns an error if `rate` is outside [0, 1].
    pub fn new(rate: f64) -> Result<Self, PopulationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(PopulationError::InvalidRecombinationRate(rate));
        }
        Ok(Self { rate })
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Crossover in place between the two chromosomes of one row.
    ///
    /// A crossover occurs at each locus boundary independently with
    /// probability `rate`; every crossover toggles whether the following
    /// loci are exchanged. At `rate = 1` this exchanges every other locus,
    /// starting with the first. Returns the number of crossovers.
    pub fn recombine_row<R: Rng + ?Sized>(
        &self,
        mut row: ArrayViewMut1<'_, u8>,
        n_base: usize,
        rng: &mut R,
    ) -> usize {
        if self.rate <= 0.0 || n_base == 0 {
            return 0;
        }
        let chr_len = row.len() / 2;
        let n_loci = chr_len / n_base;
        let geo = match Geometric::new(self.rate) {
            Ok(g) => g,
            Err(_) => return 0,
        };

        let mut crossovers = 0;
        let mut swapped = false;
        let mut next = match usize::try_from(geo.sample(rng)) {
            Ok(s) => s,
            Err(_) => return 0,
        };
        for locus in 0..n_loci {
            if locus == next {
                swapped = !swapped;
                crossovers += 1;
                next = usize::try_from(geo.sample(rng))
                    .ok()
                    .and_then(|s| (locus + 1).checked_add(s))
                    .unwrap_or(usize::MAX);
            }
            if swapped {
                let start = locus * n_base;
                for i in start..start + n_base {
                    row.swap(i, chr_len + i);
                }
            }
        }
        crossovers
    }

    /// Recombine every row of a genome matrix with per-row seeds.
    pub fn recombine_genomes<R: Rng + ?Sized>(
        &self,
        genomes: &mut Array2<u8>,
        n_base: usize,
        rng: &mut R,
    ) -> usize {
        let n = genomes.nrows();
        if n == 0 || self.rate <= 0.0 {
            return 0;
        }
        let seeds: Vec<u64> = (0..n).map(|_| rng.random()).collect();

        genomes
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(seeds.par_iter())
            .map(|(row, &seed)| {
                let mut local_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                self.recombine_row(row, n_base, &mut local_rng)
            })
            .sum()
    }
}

/// Build an offspring genome from one randomly chosen chromosome of each parent.
pub fn assort<R: Rng + ?Sized>(
    parent_a: ArrayView1<'_, u8>,
    parent_b: ArrayView1<'_, u8>,
    rng: &mut R,
) -> Array1<u8> {
    let first = chromosome(parent_a, rng.random::<bool>());
    let second = chromosome(parent_b, rng.random::<bool>());
    first.iter().chain(second.iter()).copied().collect()
}

fn chromosome(genome: ArrayView1<'_, u8>, second: bool) -> ArrayView1<'_, u8> {
    let chr_len = genome.len() / 2;
    let start = if second { chr_len } else { 0 };
    genome.slice_move(ndarray::s![start..start + chr_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    #[test]
    fn test_zero_rate_is_noop() {
        let model = RecombinationModel::new(0.0).unwrap();
        let mut genomes = array![[1u8, 1, 1, 1, 0, 0, 0, 0]];
        let before = genomes.clone();
        assert_eq!(model.recombine_genomes(&mut genomes, 1, &mut rng(1)), 0);
        assert_eq!(genomes, before);
    }

    #[test]
    fn test_full_rate_zigzag() {
        let model = RecombinationModel::new(1.0).unwrap();
        // Four loci of two bits; chromosome A all ones, B all zeros.
        let mut row = array![1u8, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        let n = model.recombine_row(row.view_mut(), 2, &mut rng(3));
        assert_eq!(n, 4);
        assert_eq!(row, array![0u8, 0, 1, 1, 0, 0, 1, 1, 1, 1, 0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_recombination_preserves_locus_states() {
        let model = RecombinationModel::new(0.5).unwrap();
        let mut genomes = Array2::<u8>::zeros((30, 40));
        for (i, mut row) in genomes.outer_iter_mut().enumerate() {
            for j in 0..20 {
                row[j] = ((i + j) % 2) as u8;
            }
        }
        let before = crate::genome::locus_states(genomes.view(), 4);
        model.recombine_genomes(&mut genomes, 4, &mut rng(8));
        let after = crate::genome::locus_states(genomes.view(), 4);
        assert_eq!(before, after);
    }

    #[test]
    fn test_assort_takes_one_chromosome_each() {
        let a = array![1u8, 1, 2, 2];
        let b = array![3u8, 3, 4, 4];
        let mut r = rng(4);
        for _ in 0..20 {
            let child = assort(a.view(), b.view(), &mut r);
            assert_eq!(child.len(), 4);
            assert!(child[0] == 1 || child[0] == 2);
            assert_eq!(child[0], child[1]);
            assert!(child[2] == 3 || child[2] == 4);
            assert_eq!(child[2], child[3]);
        }
    }

    #[test]
    fn test_rate_validation() {
        assert!(RecombinationModel::new(1.1).is_err());
        assert!(RecombinationModel::new(-0.1).is_err());
    }
}
