//! Cross-run averaging of finalised records.

use crate::storage::record::Record;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Mean and standard deviation of every numeric record field across runs.
///
/// Only runs that completed without dieoff contribute, unless every run
/// failed, in which case all runs are averaged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageRecord {
    pub n_runs: usize,
    pub n_successes: usize,
    /// Failed attempts summed over runs
    pub prev_failed: usize,
    pub percent_dieoff: f64,
    mean: BTreeMap<String, ArrayD<f64>>,
    sd: BTreeMap<String, ArrayD<f64>>,
}

impl AverageRecord {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let records: Vec<&Record> = records.into_iter().collect();
        let n_runs = records.len();
        if n_runs == 0 {
            return Self::default();
        }
        let successes: Vec<&Record> = records.iter().copied().filter(|r| !r.dieoff()).collect();
        let n_successes = successes.len();
        let pool = if successes.is_empty() { &records } else { &successes };

        let prev_failed: usize = records.iter().map(|r| r.prev_failed()).sum();
        let n_failed = n_runs - n_successes;
        let percent_dieoff =
            100.0 * (prev_failed + n_failed) as f64 / (prev_failed + n_runs) as f64;

        let fields: Vec<BTreeMap<String, ArrayD<f64>>> =
            pool.iter().map(|r| r.numeric_fields()).collect();
        let mut mean = BTreeMap::new();
        let mut sd = BTreeMap::new();
        for (key, first) in &fields[0] {
            let arrays: Vec<&ArrayD<f64>> = fields.iter().filter_map(|f| f.get(key)).collect();
            if arrays.len() != fields.len() || arrays.iter().any(|a| a.shape() != first.shape()) {
                warn!(key = %key, "field shapes differ between runs; not averaged");
                continue;
            }
            let n = arrays.len() as f64;
            let mut m = ArrayD::<f64>::zeros(first.raw_dim());
            for a in &arrays {
                m += *a;
            }
            m /= n;
            let mut v = ArrayD::<f64>::zeros(first.raw_dim());
            for a in &arrays {
                v += &(*a - &m).mapv(|x| x * x);
            }
            v /= n;
            sd.insert(key.clone(), v.mapv(f64::sqrt));
            mean.insert(key.clone(), m);
        }
        debug!(n_runs, n_successes, fields = mean.len(), "averaged records");

        Self {
            n_runs,
            n_successes,
            prev_failed,
            percent_dieoff,
            mean,
            sd,
        }
    }

    /// Mean of the field `key` across runs.
    pub fn mean(&self, key: &str) -> Option<&ArrayD<f64>> {
        self.mean.get(key)
    }

    /// Standard deviation of the field `key` across runs.
    pub fn sd(&self, key: &str) -> Option<&ArrayD<f64>> {
        self.sd.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mean.keys().map(String::as_str)
    }
}
