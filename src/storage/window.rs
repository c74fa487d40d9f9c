//! Sliding-window summaries of recorded series.

use crate::analysis::utils::{mean, variance};
use crate::errors::RecordError;
use crate::storage::record::Record;
use crate::storage::types::RecordValue;
use ndarray::{s, Array3, ArrayD, Axis, IxDyn};
use tracing::warn;

impl Record {
    /// All overlapping windows of width `window_size` along the last axis of
    /// the array stored under `key`.
    ///
    /// For an array of shape `[..., L]` the result has shape
    /// `[..., L - w + 1, w]`. A width above `L` gives `[..., 0, L + 1]` and a
    /// width of zero gives `[..., L + 1, 0]`.
    pub fn get_window(&self, key: &str, window_size: i64) -> Result<ArrayD<f64>, RecordError> {
        if window_size < 0 {
            return Err(RecordError::NegativeWindow(window_size));
        }
        let series = match self.get(key)? {
            RecordValue::Array(a) if a.ndim() > 0 => a,
            _ => return Err(RecordError::NotASeries(key.to_string())),
        };
        let w = window_size as usize;
        let shape = series.shape().to_vec();
        let (prefix, len) = shape.split_at(shape.len() - 1);
        let len = len[0];
        let rows: usize = prefix.iter().product();

        let (n_windows, width) = if w > len {
            (0, len + 1)
        } else {
            (len - w + 1, w)
        };
        let flat = series
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((rows, len))?;
        let mut out = Array3::<f64>::zeros((rows, n_windows, width));
        for i in 0..n_windows {
            out.slice_mut(s![.., i, ..])
                .assign(&flat.slice(s![.., i..i + width]));
        }

        let mut dims = prefix.to_vec();
        dims.extend([n_windows, width]);
        Ok(out.into_shape_with_order(IxDyn(&dims))?)
    }

    /// Window means and variances for every configured key, stored as
    /// `<key>_window_mean` and `<key>_window_var`.
    pub fn compute_windows(&mut self) {
        self.window_stats.clear();
        let windows = self.windows.clone();
        for (key, size) in windows {
            let w = match self.get_window(&key, size as i64) {
                Ok(w) => w,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping window statistics");
                    continue;
                }
            };
            let last = Axis(w.ndim() - 1);
            let means = w.map_axis(last, |lane| mean(&lane.to_vec()));
            let vars = w.map_axis(last, |lane| variance(&lane.to_vec()));
            self.window_stats.insert(format!("{key}_window_mean"), means);
            self.window_stats.insert(format!("{key}_window_var"), vars);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Config;
    use ndarray::{Array1, Array2};

    fn record_with_series(len: usize) -> Record {
        let mut config = Config::default();
        config.execution.number_of_stages = len;
        let mut record = Record::new(&config, &config.genome_map().unwrap());
        let series = Array1::from_iter((0..len).map(|x| x as f64));
        record.set("population_size", series.into()).unwrap();
        record
    }

    #[test]
    fn test_window_shapes() {
        let len = 12;
        let record = record_with_series(len);
        for w in 1..=len {
            let windows = record.get_window("population_size", w as i64).unwrap();
            assert_eq!(windows.shape(), &[len - w + 1, w]);
        }
        assert_eq!(record.get_window("population_size", 13).unwrap().shape(), &[0, 13]);
        assert_eq!(record.get_window("population_size", 0).unwrap().shape(), &[13, 0]);
    }

    #[test]
    fn test_window_contents() {
        let record = record_with_series(5);
        let windows = record.get_window("population_size", 3).unwrap();
        let expected = Array2::from_shape_vec((3, 3), vec![0., 1., 2., 1., 2., 3., 2., 3., 4.])
            .unwrap()
            .into_dyn();
        assert_eq!(windows, expected);
    }

    #[test]
    fn test_window_over_last_axis() {
        let mut record = record_with_series(5);
        let n1 = Array2::from_shape_fn((2, 4), |(i, j)| (10 * i + j) as f64);
        record.set("n1", n1.into()).unwrap();
        let windows = record.get_window("n1", 2).unwrap();
        assert_eq!(windows.shape(), &[2, 3, 2]);
        assert_eq!(windows[[1, 2, 0]], 12.0);
        assert_eq!(windows[[1, 2, 1]], 13.0);
    }

    #[test]
    fn test_window_errors() {
        let record = record_with_series(5);
        assert_eq!(
            record.get_window("population_size", -1),
            Err(RecordError::NegativeWindow(-1))
        );
        assert_eq!(
            record.get_window("max_ls", 2),
            Err(RecordError::NotASeries("max_ls".to_string()))
        );
        assert!(matches!(
            record.get_window("no_such_key", 2),
            Err(RecordError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_compute_windows() {
        let mut record = record_with_series(5);
        record.windows = [("population_size".to_string(), 2), ("bogus".to_string(), 3)]
            .into_iter()
            .collect();
        record.compute_windows();
        let means = record.get("population_size_window_mean").unwrap();
        assert_eq!(
            means.as_array().unwrap(),
            &Array1::from_vec(vec![0.5, 1.5, 2.5, 3.5]).into_dyn()
        );
        let vars = record.get("population_size_window_var").unwrap();
        assert!(vars.as_array().unwrap().iter().all(|&v| v == 0.25));
        assert!(record.get("bogus_window_mean").is_err());
    }

    #[test]
    fn test_compute_windows_empty() {
        let mut record = record_with_series(5);
        record.windows = [("population_size".to_string(), 9)].into_iter().collect();
        record.compute_windows();
        let means = record.get("population_size_window_mean").unwrap();
        assert_eq!(means.as_array().unwrap().shape(), &[0]);
    }
}
