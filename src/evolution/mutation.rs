//! Asymmetric bit-flip mutation.
//!
//! Set bits are cleared with probability `rate`; clear bits are set with
//! probability `rate * ratio`. With the usual `ratio < 1` this biases
//! mutation towards loss of function, so genotypes drift down unless
//! selection holds them up.

use crate::errors::PopulationError;
use ndarray::{Array2, ArrayViewMut1, Axis};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Geometric};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Above this per-bit flip probability every bit is visited directly.
const SPARSE_THRESHOLD: f64 = 0.1;

/// Per-bit mutation probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationModel {
    /// Probability that a 1 becomes a 0
    rate: f64,
    /// Multiplier giving the probability that a 0 becomes a 1
    ratio: f64,
}

impl MutationModel {
    /// Create a mutation model.
    ///
    /// # Errors
    /// Returns an error if `rate` is outside [0, 1], `ratio` is negative, or
    /// `rate * ratio` exceeds 1.
    pub fn new(rate: f64, ratio: f64) -> Result<Self, PopulationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(PopulationError::InvalidMutationRate(rate));
        }
        if ratio.is_nan() || ratio < 0.0 || rate * ratio > 1.0 {
            return Err(PopulationError::InvalidMutationRate(rate * ratio));
        }
        Ok(Self { rate, ratio })
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Flip probability for a bit currently holding `bit`.
    #[inline]
    fn flip_prob(&self, bit: u8) -> f64 {
        if bit == 1 {
            self.rate
        } else {
            self.rate * self.ratio
        }
    }

    /// Mutate one genome row in place, returning the number of flipped bits.
    ///
    /// For low rates the distance to the next candidate bit is drawn from a
    /// geometric distribution at the larger of the two flip probabilities,
    /// and the candidate is accepted with its own probability divided by
    /// that maximum. The outcome matches visiting every bit.
    pub fn mutate_row<R: Rng + ?Sized>(&self, mut row: ArrayViewMut1<'_, u8>, rng: &mut R) -> usize {
        let len = row.len();
        let max_p = self.rate.max(self.rate * self.ratio);
        if len == 0 || max_p <= 0.0 {
            return 0;
        }

        let mut flips = 0;
        if max_p > SPARSE_THRESHOLD {
            for bit in row.iter_mut() {
                if rng.random::<f64>() < self.flip_prob(*bit) {
                    *bit ^= 1;
                    flips += 1;
                }
            }
            return flips;
        }

        let geo = match Geometric::new(max_p) {
            Ok(g) => g,
            Err(_) => return 0,
        };
        let mut pos = 0usize;
        loop {
            let skip = geo.sample(rng);
            pos = match usize::try_from(skip).ok().and_then(|s| pos.checked_add(s)) {
                Some(p) if p < len => p,
                _ => break,
            };
            let bit = row[pos];
            if rng.random::<f64>() * max_p < self.flip_prob(bit) {
                row[pos] = bit ^ 1;
                flips += 1;
            }
            pos += 1;
        }
        flips
    }

    /// Mutate every row of a genome matrix.
    ///
    /// One seed per row is drawn from `rng` up front so the result does not
    /// depend on how rayon schedules the rows.
    pub fn mutate_genomes<R: Rng + ?Sized>(&self, genomes: &mut Array2<u8>, rng: &mut R) -> usize {
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
                self.mutate_row(row, &mut local_rng)
            })
            .sum()
    }
}
