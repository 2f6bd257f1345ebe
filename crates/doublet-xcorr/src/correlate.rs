//! Full discrete cross-correlation normalized by autocorrelation energy.

use rayon::prelude::*;
use tracing::instrument;

use crate::error::CorrelationError;
use crate::signal::SampleRate;

/// Peak absolute value of a signal's full autocorrelation.
///
/// For real signals this is the zero-lag value, i.e. the sum of squares.
/// It is computed through the same full-correlation routine as every other
/// coefficient so that self-correlation normalizes to exactly 1.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SignalEnergy(f64);

impl SignalEnergy {
    /// Return the raw energy value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Normalized full cross-correlation of a pair `(a, b)`.
///
/// Entry `idx` holds the coefficient for lag `k = idx - (len_b - 1)`, so lags run
/// from `-(len_b - 1)` to `len_a - 1` and lag 0 aligns sample 0 of both inputs.
///
/// Coefficients are divided by the larger of the two autocorrelation peaks. This
/// keeps values near `[-1, 1]` for similarly scaled signals but is not a strict
/// bound: for short or noisy series the estimate is biased, which is why the
/// input lengths are kept alongside the coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    coefficients: Vec<f64>,
    len_a: usize,
    len_b: usize,
    normalizer: f64,
}

impl CorrelationResult {
    /// Return the normalized coefficients in increasing-lag order.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Return the number of lags, `len_a + len_b - 1`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// Always `false`: both inputs are non-empty, so there is at least one lag.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Return the length of the first input.
    #[must_use]
    pub fn len_a(&self) -> usize {
        self.len_a
    }

    /// Return the length of the second input.
    #[must_use]
    pub fn len_b(&self) -> usize {
        self.len_b
    }

    /// Return the divisor applied to the raw cross-correlation.
    #[must_use]
    pub fn normalizer(&self) -> f64 {
        self.normalizer
    }

    /// Return the most negative lag, `-(len_b - 1)`.
    #[must_use]
    pub fn min_lag(&self) -> isize {
        -((self.len_b - 1) as isize)
    }

    /// Return the most positive lag, `len_a - 1`.
    #[must_use]
    pub fn max_lag(&self) -> isize {
        (self.len_a - 1) as isize
    }

    /// Return the signed lag for a storage index.
    #[must_use]
    pub fn lag_at(&self, index: usize) -> isize {
        index as isize + self.min_lag()
    }

    /// Return the coefficient at signed lag `lag`, or `None` outside the lag range.
    #[must_use]
    pub fn at_lag(&self, lag: isize) -> Option<f64> {
        if lag < self.min_lag() || lag > self.max_lag() {
            return None;
        }
        Some(self.coefficients[(lag - self.min_lag()) as usize])
    }

    /// Iterate over `(lag, coefficient)` in increasing-lag order.
    pub fn iter(&self) -> impl Iterator<Item = (isize, f64)> + '_ {
        let min_lag = self.min_lag();
        self.coefficients
            .iter()
            .enumerate()
            .map(move |(i, &c)| (i as isize + min_lag, c))
    }

    /// Return the lag axis in seconds, one entry per coefficient.
    #[must_use]
    pub fn lag_seconds(&self, sample_rate: SampleRate) -> Vec<f64> {
        (self.min_lag()..=self.max_lag())
            .map(|lag| sample_rate.lag_to_seconds(lag))
            .collect()
    }
}

/// Computes normalized full cross-correlations.
///
/// Direct O(len_a * len_b) evaluation. When the output has at least
/// `min_parallel_len` lags, lags are evaluated in parallel with rayon. Every lag
/// is summed in the same order either way, so results are bit-identical.
///
/// # Defaults
///
/// | Parameter          | Default |
/// |--------------------|---------|
/// | `min_parallel_len` | 4096    |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossCorrelator {
    min_parallel_len: usize,
}

impl Default for CrossCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossCorrelator {
    /// Create a correlator with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_parallel_len: 4096,
        }
    }

    /// Set the output length at which lag evaluation switches to rayon.
    #[must_use]
    pub fn with_min_parallel_len(mut self, min_parallel_len: usize) -> Self {
        self.min_parallel_len = min_parallel_len;
        self
    }

    /// Return the parallel threshold.
    #[must_use]
    pub fn min_parallel_len(&self) -> usize {
        self.min_parallel_len
    }

    /// Compute the unnormalized full cross-correlation `cc[k] = sum_i a[i] * b[i - k]`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CorrelationError::EmptySignal`] | `a` or `b` is empty |
    pub fn raw(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, CorrelationError> {
        check_non_empty(a, b)?;
        Ok(self.full(a, b))
    }

    /// Return the autocorrelation peak of `a`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CorrelationError::EmptySignal`] | `a` is empty |
    pub fn energy(&self, a: &[f64]) -> Result<SignalEnergy, CorrelationError> {
        check_non_empty(a, a)?;
        Ok(SignalEnergy(max_abs(&self.full(a, a))))
    }

    /// Compute the normalized full cross-correlation of `a` and `b`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CorrelationError::EmptySignal`] | `a` or `b` is empty |
    /// | [`CorrelationError::ZeroEnergy`] | Both inputs are all zero |
    #[instrument(skip(self, a, b), fields(len_a = a.len(), len_b = b.len()))]
    pub fn correlate(&self, a: &[f64], b: &[f64]) -> Result<CorrelationResult, CorrelationError> {
        check_non_empty(a, b)?;
        let energy_a = self.energy(a)?;
        let energy_b = self.energy(b)?;
        self.correlate_with_energy(a, energy_a, b, energy_b)
    }

    /// Correlate a signal with itself through the general path.
    ///
    /// # Errors
    ///
    /// Same as [`correlate`][Self::correlate].
    pub fn autocorrelate(&self, a: &[f64]) -> Result<CorrelationResult, CorrelationError> {
        self.correlate(a, a)
    }

    /// Normalized cross-correlation with precomputed autocorrelation peaks.
    ///
    /// `energy_a` and `energy_b` must come from [`energy`][Self::energy] on the
    /// same inputs; batch callers use this to compute each signal's energy once.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CorrelationError::EmptySignal`] | `a` or `b` is empty |
    /// | [`CorrelationError::ZeroEnergy`] | Both energies are zero |
    pub fn correlate_with_energy(
        &self,
        a: &[f64],
        energy_a: SignalEnergy,
        b: &[f64],
        energy_b: SignalEnergy,
    ) -> Result<CorrelationResult, CorrelationError> {
        check_non_empty(a, b)?;
        let normalizer = energy_a.value().max(energy_b.value());
        if normalizer == 0.0 {
            return Err(CorrelationError::ZeroEnergy);
        }

        let mut coefficients = self.full(a, b);
        for c in &mut coefficients {
            *c /= normalizer;
        }

        Ok(CorrelationResult {
            coefficients,
            len_a: a.len(),
            len_b: b.len(),
            normalizer,
        })
    }

    fn full(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        let out_len = a.len() + b.len() - 1;
        if out_len >= self.min_parallel_len {
            (0..out_len)
                .into_par_iter()
                .map(|idx| lag_product_sum(a, b, idx))
                .collect()
        } else {
            (0..out_len).map(|idx| lag_product_sum(a, b, idx)).collect()
        }
    }
}

/// Sum of `a[i] * b[i - k]` over the overlap, for storage index `idx`
/// (lag `k = idx - (len_b - 1)`), in increasing `i`.
fn lag_product_sum(a: &[f64], b: &[f64], idx: usize) -> f64 {
    let n = a.len();
    let m = b.len();
    // i - k = i + (m - 1) - idx must lie in [0, m)
    let offset = m - 1;
    let i_start = idx.saturating_sub(offset);
    let i_end = n.min(idx + 1);
    (i_start..i_end)
        .map(|i| a[i] * b[i + offset - idx])
        .sum()
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn check_non_empty(a: &[f64], b: &[f64]) -> Result<(), CorrelationError> {
    if a.is_empty() || b.is_empty() {
        return Err(CorrelationError::EmptySignal {
            len_a: a.len(),
            len_b: b.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xc() -> CrossCorrelator {
        CrossCorrelator::new()
    }

    #[test]
    fn raw_matches_hand_computed() {
        // a = [1, 2, 3], b = [0, 1, 0.5]
        // k=-2: a0*b2 = 0.5
        // k=-1: a0*b1 + a1*b2 = 1 + 1 = 2
        // k= 0: a0*b0 + a1*b1 + a2*b2 = 0 + 2 + 1.5 = 3.5
        // k= 1: a1*b0 + a2*b1 = 0 + 3 = 3
        // k= 2: a2*b0 = 0
        let cc = xc().raw(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]).unwrap();
        assert_eq!(cc, vec![0.5, 2.0, 3.5, 3.0, 0.0]);
    }

    #[test]
    fn raw_unequal_lengths() {
        // a = [1, 2], b = [1, 1, 1]: lags -2..=1
        let cc = xc().raw(&[1.0, 2.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(cc, vec![1.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn output_length_is_sum_minus_one() {
        let a = vec![0.5; 7];
        let b = vec![-0.25; 4];
        let result = xc().correlate(&a, &b).unwrap();
        assert_eq!(result.len(), 10);
        assert_eq!(result.min_lag(), -3);
        assert_eq!(result.max_lag(), 6);
    }

    #[test]
    fn empty_input_fails() {
        let result = xc().correlate(&[], &[1.0]);
        assert!(matches!(
            result,
            Err(CorrelationError::EmptySignal { len_a: 0, len_b: 1 })
        ));
        let result = xc().correlate(&[1.0], &[]);
        assert!(matches!(
            result,
            Err(CorrelationError::EmptySignal { len_a: 1, len_b: 0 })
        ));
    }

    #[test]
    fn zero_energy_fails() {
        let result = xc().correlate(&[0.0, 0.0], &[0.0]);
        assert!(matches!(result, Err(CorrelationError::ZeroEnergy)));
    }

    #[test]
    fn energy_is_sum_of_squares() {
        let energy = xc().energy(&[1.0, -2.0, 0.5]).unwrap();
        assert!((energy.value() - 5.25).abs() < 1e-12);
    }

    #[test]
    fn normalized_by_larger_energy() {
        // energy(a) = 1, energy(b) = 4 -> divisor 4
        let result = xc().correlate(&[1.0], &[2.0]).unwrap();
        assert_eq!(result.normalizer(), 4.0);
        assert_eq!(result.coefficients(), &[0.5]);
    }

    #[test]
    fn autocorrelation_zero_lag_is_one() {
        let a = [0.2, -1.0, 0.7, 0.4];
        let result = xc().autocorrelate(&a).unwrap();
        assert_eq!(result.at_lag(0), Some(1.0));
    }

    #[test]
    fn at_lag_out_of_range() {
        let result = xc().correlate(&[1.0, 0.5], &[1.0]).unwrap();
        assert_eq!(result.at_lag(-1), None);
        assert_eq!(result.at_lag(2), None);
        assert!(result.at_lag(1).is_some());
    }

    #[test]
    fn iter_yields_signed_lags() {
        let result = xc().correlate(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap();
        let lags: Vec<isize> = result.iter().map(|(lag, _)| lag).collect();
        assert_eq!(lags, vec![-2, -1, 0, 1]);
        assert_eq!(result.lag_at(0), -2);
    }

    #[test]
    fn lag_seconds_axis() {
        let result = xc().correlate(&[1.0, 0.0, 1.0], &[1.0, 1.0]).unwrap();
        let axis = result.lag_seconds(SampleRate::new(10.0).unwrap());
        assert_eq!(axis, vec![-0.1, 0.0, 0.1, 0.2]);
    }

    #[test]
    fn parallel_and_serial_agree_bitwise() {
        let a: Vec<f64> = (0..300).map(|i| (i as f64 * 0.37).sin()).collect();
        let b: Vec<f64> = (0..200).map(|i| (i as f64 * 0.11).cos()).collect();
        let serial = CrossCorrelator::new().with_min_parallel_len(usize::MAX);
        let parallel = CrossCorrelator::new().with_min_parallel_len(1);
        assert_eq!(
            serial.correlate(&a, &b).unwrap(),
            parallel.correlate(&a, &b).unwrap()
        );
    }

    #[test]
    fn cached_energy_matches_direct() {
        let a = [0.3, -0.6, 1.0];
        let b = [1.0, 0.1];
        let direct = xc().correlate(&a, &b).unwrap();
        let ea = xc().energy(&a).unwrap();
        let eb = xc().energy(&b).unwrap();
        let cached = xc().correlate_with_energy(&a, ea, &b, eb).unwrap();
        assert_eq!(direct, cached);
    }
}
