//! Five-number summary with linear-interpolated percentiles (R-7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Compute min/q1/median/q3/max of a sample. Returns `None` for an empty
/// sample. The input is not modified.
pub fn quantiles(values: &[f64]) -> Option<FiveNumberSummary> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Some(FiveNumberSummary {
        min: percentile(&sorted, 0.0),
        q1: percentile(&sorted, 0.25),
        median: percentile(&sorted, 0.5),
        q3: percentile(&sorted, 0.75),
        max: percentile(&sorted, 1.0),
    })
}

/// R-7 percentile over an already-sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = (sorted.len() - 1) as f64 * p;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (idx - lo as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_has_no_summary() {
        assert_eq!(quantiles(&[]), None);
    }

    #[test]
    fn single_value() {
        let s = quantiles(&[5.0]).unwrap();
        assert_eq!(
            s,
            FiveNumberSummary { min: 5.0, q1: 5.0, median: 5.0, q3: 5.0, max: 5.0 }
        );
    }

    #[test]
    fn two_values_blend_linearly() {
        let s = quantiles(&[10.0, 20.0]).unwrap();
        assert_eq!(s.min, 10.0);
        assert_eq!(s.q1, 12.5);
        assert_eq!(s.median, 15.0);
        assert_eq!(s.q3, 17.5);
        assert_eq!(s.max, 20.0);
    }

    #[test]
    fn even_count_median_interpolates() {
        let s = quantiles(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.q1, 1.75);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.q3, 3.25);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn odd_count_hits_exact_indices() {
        let s = quantiles(&[35.0, 65.0, 85.0, 40.0, 70.0]).unwrap();
        assert_eq!(s.min, 35.0);
        assert_eq!(s.q1, 40.0);
        assert_eq!(s.median, 65.0);
        assert_eq!(s.q3, 70.0);
        assert_eq!(s.max, 85.0);
    }

    #[test]
    fn input_is_left_unsorted() {
        let values = vec![3.0, 1.0, 2.0];
        let _ = quantiles(&values);
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }
}
