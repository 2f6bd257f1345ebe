//! Peak coefficient and lag extraction.

use std::fmt;

use crate::correlate::CorrelationResult;
use crate::signal::SampleRate;

/// The coefficient of greatest magnitude in a [`CorrelationResult`] and its lag.
///
/// `coefficient` keeps its sign. A positive `lag_samples` means the best
/// alignment pairs `a[i]` with `b[i - lag]`, i.e. `b` leads `a`; a negative lag
/// means `b` is delayed relative to `a`.
///
/// [`PairAnalyzer`](crate::PairAnalyzer) and
/// [`PairwiseMatrix`](crate::PairwiseMatrix) pass the candidate as `a` and the
/// reference as `b`, so there a positive lag means the candidate arrives later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxCorrelation {
    /// Signed coefficient at the peak.
    pub coefficient: f64,
    /// Signed lag in samples.
    pub lag_samples: isize,
    /// Signed lag in seconds, `lag_samples / sample_rate`.
    pub lag_seconds: f64,
}

impl fmt::Display for MaxCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} at {:.3}s", self.coefficient, self.lag_seconds)
    }
}

/// Find the coefficient with the largest absolute value.
///
/// Ties go to the first occurrence in increasing-lag order.
#[must_use]
pub fn extract_max(result: &CorrelationResult, sample_rate: SampleRate) -> MaxCorrelation {
    let coefficients = result.coefficients();
    let mut best_idx = 0;
    let mut best_abs = coefficients[0].abs();
    for (idx, c) in coefficients.iter().enumerate().skip(1) {
        if c.abs() > best_abs {
            best_abs = c.abs();
            best_idx = idx;
        }
    }

    let lag_samples = result.lag_at(best_idx);
    MaxCorrelation {
        coefficient: coefficients[best_idx],
        lag_samples,
        lag_seconds: sample_rate.lag_to_seconds(lag_samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::CrossCorrelator;

    fn fs(hz: f64) -> SampleRate {
        SampleRate::new(hz).unwrap()
    }

    #[test]
    fn picks_largest_magnitude_and_keeps_sign() {
        // a = [1], b = [-1, 0.5]: cc lags -1..=0 = [0.5, -1]
        let result = CrossCorrelator::new().correlate(&[1.0], &[-1.0, 0.5]).unwrap();
        let max = extract_max(&result, fs(1.0));
        assert!(max.coefficient < 0.0);
        assert_eq!(max.lag_samples, 0);
    }

    #[test]
    fn ties_resolve_to_lowest_lag() {
        // a = [1, 0, 1], b = [1]: coefficients [1, 0, 1] at lags 0, 1, 2
        let result = CrossCorrelator::new().correlate(&[1.0, 0.0, 1.0], &[1.0]).unwrap();
        let max = extract_max(&result, fs(1.0));
        assert_eq!(max.lag_samples, 0);
    }

    #[test]
    fn tie_between_signs_keeps_first() {
        // a = [1, 0, -1], b = [1]: |coefficients| tie at lags 0 and 2
        let result = CrossCorrelator::new().correlate(&[1.0, 0.0, -1.0], &[1.0]).unwrap();
        let max = extract_max(&result, fs(1.0));
        assert_eq!(max.lag_samples, 0);
        assert!(max.coefficient > 0.0);
    }

    #[test]
    fn lag_converted_to_seconds() {
        // a peaks at index 3, b peaks at index 0 -> best lag +3
        let a = [0.0, 0.0, 0.0, 1.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let result = CrossCorrelator::new().correlate(&a, &b).unwrap();
        let max = extract_max(&result, fs(100.0));
        assert_eq!(max.lag_samples, 3);
        assert!((max.lag_seconds - 0.03).abs() < 1e-15);
    }

    #[test]
    fn negative_lag_when_b_is_delayed() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 1.0, 0.0];
        let result = CrossCorrelator::new().correlate(&a, &b).unwrap();
        let max = extract_max(&result, fs(2.0));
        assert_eq!(max.lag_samples, -2);
        assert_eq!(max.lag_seconds, -1.0);
    }

    #[test]
    fn display_format() {
        let max = MaxCorrelation {
            coefficient: 0.98765,
            lag_samples: 25,
            lag_seconds: 0.25,
        };
        assert_eq!(format!("{max}"), "0.988 at 0.250s");
    }
}
