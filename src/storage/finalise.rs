//! Deferred statistics derived from a filled record.
//!
//! Each step overwrites its derived fields wholesale from raw data and
//! earlier steps, so finalising twice gives identical results.

use crate::analysis::utils::entropy;
use crate::genome::{locus_states, probability_table, state_to_probability, LocusType};
use crate::storage::record::Record;
use crate::storage::types::{ByClass, RecordPhase};
use ndarray::{s, Array1, Array2, Axis};
use tracing::debug;

impl Record {
    /// Positions of each locus class in label order.
    fn class_positions(&self) -> ByClass<Vec<usize>> {
        ByClass {
            s: self.genmap.positions_of(LocusType::Survival),
            r: self.genmap.positions_of(LocusType::Reproduction),
            n: self.genmap.positions_of(LocusType::Neutral),
            a: self.genmap.argsort(),
        }
    }

    /// Genotype state distributions, means, variances and entropies per
    /// locus class at every snapshot.
    pub fn compute_densities(&mut self) {
        let classes = self.class_positions();
        let ns = self.n_states;

        for (i, slot) in self.snapshot_pops.iter().enumerate() {
            let pop = match slot {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };
            let states = locus_states(pop.genomes().view(), self.n_base);
            assert_eq!(
                states.ncols(),
                self.genmap.len(),
                "snapshot genome does not match record layout"
            );
            let n = states.nrows() as f64;

            for (tag, positions) in classes.entries() {
                let mut hist = Array2::<f64>::zeros((ns, positions.len()));
                let mut means = Array1::<f64>::zeros(positions.len());
                let mut vars = Array1::<f64>::zeros(positions.len());
                for (j, &pos) in positions.iter().enumerate() {
                    let column = states.column(pos);
                    for &state in column.iter() {
                        hist[[state, j]] += 1.0;
                    }
                    let mean = column.iter().map(|&x| x as f64).sum::<f64>() / n;
                    let var = column.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
                    means[j] = mean;
                    vars[j] = var;
                }
                hist /= n;
                let aggregate = if positions.is_empty() {
                    Array1::zeros(ns)
                } else {
                    hist.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(ns))
                };
                let h = entropy(&aggregate.to_vec());

                let (dpl, dens, mgt, vgt, ent) = match tag {
                    "s" => (
                        &mut self.density_per_locus.s,
                        &mut self.density.s,
                        &mut self.mean_gt.s,
                        &mut self.var_gt.s,
                        &mut self.entropy_gt.s,
                    ),
                    "r" => (
                        &mut self.density_per_locus.r,
                        &mut self.density.r,
                        &mut self.mean_gt.r,
                        &mut self.var_gt.r,
                        &mut self.entropy_gt.r,
                    ),
                    "n" => (
                        &mut self.density_per_locus.n,
                        &mut self.density.n,
                        &mut self.mean_gt.n,
                        &mut self.var_gt.n,
                        &mut self.entropy_gt.n,
                    ),
                    _ => (
                        &mut self.density_per_locus.a,
                        &mut self.density.a,
                        &mut self.mean_gt.a,
                        &mut self.var_gt.a,
                        &mut self.entropy_gt.a,
                    ),
                };
                assert_eq!(dpl.dim().2, positions.len(), "locus count mismatch for class {tag}");
                dpl.slice_mut(s![.., i, ..]).assign(&hist);
                dens.column_mut(i).assign(&aggregate);
                mgt.row_mut(i).assign(&means);
                vgt.row_mut(i).assign(&vars);
                ent[i] = h;
            }
        }
    }

    /// Survival and reproduction probabilities, cumulative survival,
    /// fitness and reproductive value, for real and neutral-locus genotypes.
    pub fn compute_probabilities(&mut self) {
        let ns = self.n_states;
        let surv_table = probability_table(self.surv_bound[0], self.surv_bound[1], ns);
        let repr_table = probability_table(self.repr_bound[0], self.repr_bound[1], ns);
        let (surv_step, repr_step) = (self.surv_step(), self.repr_step());
        fn to_prob(a: &Array2<f64>, table: &[f64]) -> Array2<f64> {
            a.mapv(|x| state_to_probability(x, table))
        }

        self.prob_mean.surv = to_prob(&self.mean_gt.s, &surv_table);
        self.prob_mean.repr = to_prob(&self.mean_gt.r, &repr_table);
        self.prob_var.surv = &self.var_gt.s * surv_step.powi(2);
        self.prob_var.repr = &self.var_gt.r * repr_step.powi(2);
        self.junk_mean.surv = to_prob(&self.mean_gt.n, &surv_table);
        self.junk_mean.repr = to_prob(&self.mean_gt.n, &repr_table);
        self.junk_var.surv = &self.var_gt.n * surv_step.powi(2);
        self.junk_var.repr = &self.var_gt.n * repr_step.powi(2);

        let m = self.n_snapshots();
        let (ls, mt) = (self.max_ls, self.maturity);
        assert_eq!(self.prob_mean.surv.dim(), (m, ls), "survival loci do not cover lifespan");
        assert_eq!(self.prob_mean.repr.dim(), (m, ls - mt), "reproduction loci do not cover adulthood");
        let parity = if self.sexual { 0.5 } else { 1.0 };

        let mut cmv = Array2::<f64>::ones((m, ls));
        let mut repr = Array2::<f64>::zeros((m, ls));
        let mut junk_cmv = Array2::<f64>::ones((m, ls));
        let mut junk_repr = Array2::<f64>::zeros((m, ls));
        for i in 0..m {
            for a in 1..ls {
                cmv[[i, a]] = cmv[[i, a - 1]] * self.prob_mean.surv[[i, a - 1]];
            }
            for a in mt..ls {
                repr[[i, a]] = self.prob_mean.repr[[i, a - mt]] * parity;
            }
            if self.n_neutral > 0 {
                let js = self.junk_mean.surv.row(i).mean().unwrap_or(0.0);
                let jr = self.junk_mean.repr.row(i).mean().unwrap_or(0.0);
                for a in 0..ls {
                    junk_cmv[[i, a]] = js.powi(a as i32);
                    if a >= mt {
                        junk_repr[[i, a]] = jr * parity;
                    }
                }
            } else {
                junk_cmv.row_mut(i).fill(0.0);
            }
        }

        self.fitness_term = &cmv * &repr;
        self.junk_fitness_term = &junk_cmv * &junk_repr;
        self.fitness = self.fitness_term.sum_axis(Axis(1));
        self.junk_fitness = self.junk_fitness_term.sum_axis(Axis(1));
        self.repr_value = reproductive_value(&self.fitness_term, &cmv);
        self.junk_repr_value = reproductive_value(&self.junk_fitness_term, &junk_cmv);
        self.cmv_surv = cmv;
        self.junk_cmv_surv = junk_cmv;
    }

    /// Per-position bit frequency and variance along the label-sorted
    /// chromosome, pooled over both copies, plus bit entropy.
    pub fn compute_bits(&mut self) {
        let order = self.genmap.argsort();
        let (nb, chr_len) = (self.n_base, self.chr_len);
        let m = self.n_snapshots();
        assert_eq!(self.n1.dim(), (m, chr_len), "bit statistics shape mismatch");

        for (i, slot) in self.snapshot_pops.iter().enumerate() {
            let pop = match slot {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };
            let genomes = pop.genomes();
            let denom = 2.0 * genomes.nrows() as f64;
            for (k_locus, &pos) in order.iter().enumerate() {
                for b in 0..nb {
                    let col = pos * nb + b;
                    let ones = genomes.column(col).iter().map(|&x| x as f64).sum::<f64>()
                        + genomes.column(chr_len + col).iter().map(|&x| x as f64).sum::<f64>();
                    let p = ones / denom;
                    let k = k_locus * nb + b;
                    self.n1[[i, k]] = p;
                    self.n1_var[[i, k]] = p - p * p;
                }
            }
            let overall = self.n1.row(i).mean().unwrap_or(0.0);
            self.entropy_bits[i] = entropy(&[1.0 - overall, overall]);
        }
    }

    /// Observed per-age death rate between consecutive populated stages.
    ///
    /// Rate at age `a` is the fraction of the stage-`t` cohort of age `a`
    /// missing from age `a + 1` at stage `t + 1`; the oldest age class
    /// always has rate 1.
    pub fn compute_actual_death(&mut self) {
        let ls = self.max_ls;
        assert_eq!(
            self.age_distribution.nrows(),
            self.population_size.len(),
            "age distribution and population size cover different stages"
        );
        let counts: Vec<Array1<f64>> = self
            .age_distribution
            .outer_iter()
            .zip(self.population_size.iter())
            .filter(|(_, &n)| n > 0.0)
            .map(|(dist, &n)| dist.mapv(|f| (f * n).round()))
            .collect();

        let rows = counts.len().saturating_sub(1);
        let mut rate = Array2::<f64>::zeros((rows, ls));
        for t in 0..rows {
            for a in 0..ls.saturating_sub(1) {
                let before = counts[t][a];
                if before > 0.0 {
                    rate[[t, a]] = 1.0 - counts[t + 1][a + 1] / before;
                }
            }
            if ls > 0 {
                rate[[t, ls - 1]] = 1.0;
            }
        }
        self.actual_death_rate = rate;
    }

    /// Derive every secondary statistic and mark the record finalised.
    pub fn finalise(&mut self) {
        self.compute_densities();
        self.compute_probabilities();
        self.compute_bits();
        self.compute_actual_death();
        self.compute_windows();
        self.compute_failure_stats();
        self.phase = RecordPhase::Finalised;
        debug!(
            snapshots = self.n_snapshots(),
            dieoff = self.dieoff,
            "record finalised"
        );
    }
}

/// Reverse cumulative sum of `terms` along ages, divided by `cmv`; zero
/// where `cmv` is zero.
fn reproductive_value(terms: &Array2<f64>, cmv: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(terms.dim());
    for (i, row) in terms.outer_iter().enumerate() {
        let mut acc = 0.0;
        for a in (0..row.len()).rev() {
            acc += row[a];
            let c = cmv[[i, a]];
            out[[i, a]] = if c == 0.0 { 0.0 } else { acc / c };
        }
    }
    out
}
