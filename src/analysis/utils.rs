//! Utility functions for summary statistics.
//!
//! Shared helpers used by the record and averaging code.

use std::time::Duration;

/// Calculate mean of a vector
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean_val = mean(values);
    values.iter().map(|v| (v - mean_val).powi(2)).sum::<f64>() / values.len() as f64
}

/// Shannon entropy (natural log) of a probability vector; zero entries are skipped.
pub fn entropy(probs: &[f64]) -> f64 {
    -probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.ln())
        .sum::<f64>()
}

/// Linearly interpolated quantile of sorted data.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Minimum, lower quartile, median, upper quartile and maximum.
///
/// Returns zeros for empty input.
pub fn fivenum(values: &[f64]) -> [f64; 5] {
    if values.is_empty() {
        return [0.0; 5];
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    [0.0, 0.25, 0.5, 0.75, 1.0].map(|q| quantile_sorted(&sorted, q))
}

/// Human-readable runtime, e.g. `Total runtime: 2 hours, 3 minutes and 4 seconds.`
///
/// Units that are zero are omitted, except seconds.
pub fn format_runtime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let units = [
        ("days", total / 86_400),
        ("hours", total % 86_400 / 3600),
        ("minutes", total % 3600 / 60),
        ("seconds", total % 60),
    ];
    let after = [", ", ", ", " and ", ""];
    let mut out = String::new();
    for ((name, value), sep) in units.iter().zip(after) {
        if *value != 0 || *name == "seconds" {
            out.push_str(&format!("{value} {name}{sep}"));
        }
    }
    format!("Total runtime: {out}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[5.0]), 5.0);
    }

    #[test]
    fn test_variance() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((variance(&values) - 4.0).abs() < 1e-12);
        assert_eq!(variance(&[3.0]), 0.0);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy(&[1.0, 0.0]), 0.0);
        assert!((entropy(&[0.5, 0.5]) - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_fivenum() {
        assert_eq!(fivenum(&[1.0, 2.0, 3.0, 4.0, 5.0]), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(fivenum(&[4.0, 1.0, 3.0, 2.0]), [1.0, 1.75, 2.5, 3.25, 4.0]);
        assert_eq!(fivenum(&[]), [0.0; 5]);
    }

    #[test]
    fn test_format_runtime() {
        assert_eq!(
            format_runtime(Duration::from_secs(86_405)),
            "Total runtime: 1 days, 5 seconds."
        );
        assert_eq!(
            format_runtime(Duration::from_secs(2 * 3600 + 3 * 60 + 4)),
            "Total runtime: 2 hours, 3 minutes and 4 seconds."
        );
        assert_eq!(format_runtime(Duration::from_millis(300)), "Total runtime: 0 seconds.");
    }
}
