//! Genotype codec: bit sums per locus and state-to-probability lookups.
//!
//! A genome row holds two chromosomes of `chr_len` bits each. Locus `p`
//! occupies bits `p*n_base..(p+1)*n_base` on both chromosomes; its state
//! is the total number of set bits over the two copies, an integer in
//! `0..=2*n_base`.

use ndarray::{Array2, ArrayView1, ArrayView2};

/// Number of distinct locus states for a given locus width.
#[inline]
pub fn n_states(n_base: usize) -> usize {
    2 * n_base + 1
}

/// State of the locus at chromosome position `pos` in a single genome row.
#[inline]
pub fn locus_state(row: ArrayView1<'_, u8>, pos: usize, n_base: usize) -> usize {
    let chr_len = row.len() / 2;
    let start = pos * n_base;
    (start..start + n_base)
        .map(|i| (row[i] + row[chr_len + i]) as usize)
        .sum()
}

/// States of every locus of every individual, shape `[N, n_loci]`.
pub fn locus_states(genomes: ArrayView2<'_, u8>, n_base: usize) -> Array2<usize> {
    let n = genomes.nrows();
    let n_loci = if n_base == 0 { 0 } else { genomes.ncols() / (2 * n_base) };
    let mut states = Array2::zeros((n, n_loci));
    for (i, row) in genomes.outer_iter().enumerate() {
        for pos in 0..n_loci {
            states[[i, pos]] = locus_state(row, pos, n_base);
        }
    }
    states
}

/// Map a (possibly fractional) state onto a probability table.
///
/// Integer states return the table entry exactly; fractional states are
/// interpolated linearly between neighbouring entries. States outside the
/// table saturate at its ends. Tables may be ascending or descending.
pub fn state_to_probability(state: f64, table: &[f64]) -> f64 {
    match table.len() {
        0 => 0.0,
        1 => table[0],
        len => {
            let top = (len - 1) as f64;
            if state.is_nan() || state <= 0.0 {
                return table[0];
            }
            if state >= top {
                return table[len - 1];
            }
            let lo = state.floor() as usize;
            let frac = state - lo as f64;
            if frac == 0.0 {
                table[lo]
            } else {
                table[lo] + (table[lo + 1] - table[lo]) * frac
            }
        }
    }
}

/// Evenly spaced probability table over `[lo, hi]` with `n` entries.
pub fn probability_table(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}
