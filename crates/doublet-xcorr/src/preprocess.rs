//! Signal preprocessing: missing-sample replacement, offset removal, peak normalization.

use tracing::instrument;

use crate::error::PreprocessError;
use crate::signal::{RawSignal, Signal};

/// Turns [`RawSignal`]s into unit-peak [`Signal`]s.
///
/// Missing (NaN) samples become zero so the sample positions, and therefore the
/// alignment between signals, are preserved. Offset removal subtracts the mean
/// of the non-missing samples before the missing ones are zeroed.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `remove_offset` | `true`  |
///
/// Batch (multi-event) runs conventionally disable offset removal because the
/// event files already have the offset removed upstream. That precondition is
/// not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    remove_offset: bool,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Create a preprocessor with offset removal enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            remove_offset: true,
        }
    }

    /// Enable or disable mean (offset) removal.
    #[must_use]
    pub fn with_offset_removal(mut self, remove_offset: bool) -> Self {
        self.remove_offset = remove_offset;
        self
    }

    /// Return whether mean removal is applied.
    #[must_use]
    pub fn remove_offset(&self) -> bool {
        self.remove_offset
    }

    /// Clean and normalize a raw signal.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PreprocessError::DegenerateSignal`] | Every sample is zero (or missing) after offset removal |
    #[instrument(skip(raw), fields(len = raw.len(), missing = raw.missing_count()))]
    pub fn preprocess(&self, raw: &RawSignal) -> Result<Signal, PreprocessError> {
        let mut samples = raw.samples().to_vec();
        if self.remove_offset {
            remove_offset(&mut samples);
        }
        fill_missing(&mut samples);
        normalize_peak(&mut samples)?;
        Ok(Signal::from_normalized(
            samples,
            raw.sample_rate(),
            raw.label().map(str::to_owned),
        ))
    }

    /// Preprocess a batch, returning the first error encountered.
    ///
    /// # Errors
    ///
    /// Returns the first [`PreprocessError`] in input order.
    pub fn preprocess_batch(&self, raw: &[RawSignal]) -> Result<Vec<Signal>, PreprocessError> {
        raw.iter().map(|r| self.preprocess(r)).collect()
    }
}

/// Replace NaN samples with zero in place.
pub fn fill_missing(samples: &mut [f64]) {
    for v in samples.iter_mut().filter(|v| v.is_nan()) {
        *v = 0.0;
    }
}

/// Subtract the mean of the non-missing samples in place. NaN entries are left
/// untouched. Does nothing when every sample is missing.
pub fn remove_offset(samples: &mut [f64]) {
    let (sum, count) = samples
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        return;
    }
    let mean = sum / count as f64;
    for v in samples.iter_mut().filter(|v| !v.is_nan()) {
        *v -= mean;
    }
}

/// Scale samples in place so the largest absolute value is exactly 1.0.
///
/// A signal whose peak is already 1.0 is left bit-for-bit unchanged.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`PreprocessError::DegenerateSignal`] | The peak absolute value is zero |
pub fn normalize_peak(samples: &mut [f64]) -> Result<(), PreprocessError> {
    let peak = samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if peak == 0.0 {
        return Err(PreprocessError::DegenerateSignal { len: samples.len() });
    }
    for v in samples.iter_mut() {
        *v /= peak;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SampleRate;

    fn raw(values: Vec<f64>) -> RawSignal {
        RawSignal::new(values, SampleRate::new(100.0).unwrap()).unwrap()
    }

    fn peak(samples: &[f64]) -> f64 {
        samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    #[test]
    fn removes_offset_then_scales_to_unit_peak() {
        let signal = Preprocessor::new().preprocess(&raw(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(signal.samples(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn without_offset_removal_only_scales() {
        let signal = Preprocessor::new()
            .with_offset_removal(false)
            .preprocess(&raw(vec![2.0, 4.0, -8.0]))
            .unwrap();
        assert_eq!(signal.samples(), &[0.25, 0.5, -1.0]);
    }

    #[test]
    fn missing_samples_become_zero_and_keep_position() {
        let signal = Preprocessor::new()
            .with_offset_removal(false)
            .preprocess(&raw(vec![f64::NAN, 2.0, f64::NAN, -4.0]))
            .unwrap();
        assert_eq!(signal.len(), 4);
        assert_eq!(signal.samples(), &[0.0, 0.5, 0.0, -1.0]);
    }

    #[test]
    fn mean_ignores_missing_samples() {
        // Mean of valid samples is 2.0; the NaN slot stays at zero.
        let signal = Preprocessor::new()
            .preprocess(&raw(vec![1.0, f64::NAN, 3.0]))
            .unwrap();
        assert_eq!(signal.samples(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn peak_is_one() {
        let signal = Preprocessor::new()
            .preprocess(&raw(vec![0.3, -7.5, 2.2, 4.1, -0.9]))
            .unwrap();
        assert!((peak(signal.samples()) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn all_zero_is_degenerate() {
        let result = Preprocessor::new().preprocess(&raw(vec![0.0, 0.0, 0.0]));
        assert!(matches!(result, Err(PreprocessError::DegenerateSignal { len: 3 })));
    }

    #[test]
    fn all_missing_is_degenerate() {
        let result = Preprocessor::new().preprocess(&raw(vec![f64::NAN, f64::NAN]));
        assert!(matches!(result, Err(PreprocessError::DegenerateSignal { len: 2 })));
    }

    #[test]
    fn constant_is_degenerate_with_offset_removal() {
        let result = Preprocessor::new().preprocess(&raw(vec![5.0, 5.0, 5.0, 5.0]));
        assert!(matches!(result, Err(PreprocessError::DegenerateSignal { len: 4 })));
    }

    #[test]
    fn constant_is_valid_without_offset_removal() {
        let signal = Preprocessor::new()
            .with_offset_removal(false)
            .preprocess(&raw(vec![5.0, 5.0]))
            .unwrap();
        assert_eq!(signal.samples(), &[1.0, 1.0]);
    }

    #[test]
    fn normalizing_normalized_signal_is_noop() {
        let pre = Preprocessor::new().with_offset_removal(false);
        let once = pre.preprocess(&raw(vec![0.1, -3.3, 2.7, 0.0, 1.9])).unwrap();
        let twice = pre.preprocess(&once.clone().into_raw()).unwrap();
        assert_eq!(once.samples(), twice.samples());
    }

    #[test]
    fn label_and_rate_survive() {
        let input = raw(vec![1.0, -1.0]).with_label("03:12:09");
        let signal = Preprocessor::new().preprocess(&input).unwrap();
        assert_eq!(signal.label(), Some("03:12:09"));
        assert_eq!(signal.sample_rate().hz(), 100.0);
    }

    #[test]
    fn batch_stops_on_first_degenerate() {
        let batch = vec![raw(vec![1.0, 2.0]), raw(vec![0.0, 0.0]), raw(vec![3.0, 1.0])];
        let result = Preprocessor::new().with_offset_removal(false).preprocess_batch(&batch);
        assert!(matches!(result, Err(PreprocessError::DegenerateSignal { len: 2 })));
    }
}
