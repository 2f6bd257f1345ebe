//! Signal types: raw input samples and normalized signals.

use std::fmt;
use std::ops::Index;

use crate::error::SignalError;

/// Sampling frequency in Hz. Guaranteed positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SampleRate(f64);

impl SampleRate {
    /// Create a sample rate, rejecting zero, negative, and non-finite values.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SignalError::InvalidSampleRate`] | `hz <= 0`, NaN, or infinite |
    pub fn new(hz: f64) -> Result<Self, SignalError> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(SignalError::InvalidSampleRate { rate: hz });
        }
        Ok(Self(hz))
    }

    /// Return the rate in Hz.
    #[must_use]
    pub fn hz(self) -> f64 {
        self.0
    }

    /// Convert a signed lag in samples to seconds.
    #[must_use]
    pub fn lag_to_seconds(self, lag: isize) -> f64 {
        lag as f64 / self.0
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// Unprocessed samples as delivered by an input source.
///
/// Non-empty and free of infinities. NaN samples are allowed and mean
/// "missing"; they are replaced during preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    samples: Vec<f64>,
    sample_rate: SampleRate,
    label: Option<String>,
}

impl RawSignal {
    /// Create a raw signal.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SignalError::EmptySignal`] | `samples` is empty |
    /// | [`SignalError::InfiniteValue`] | Any sample is `+inf` or `-inf` |
    pub fn new(samples: Vec<f64>, sample_rate: SampleRate) -> Result<Self, SignalError> {
        if samples.is_empty() {
            return Err(SignalError::EmptySignal);
        }
        if let Some(index) = samples.iter().position(|v| v.is_infinite()) {
            return Err(SignalError::InfiniteValue { index });
        }
        Ok(Self {
            samples,
            sample_rate,
            label: None,
        })
    }

    /// Attach a display label (typically the event time).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Return the raw samples, including any NaN markers.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Return the sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Return the display label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false` for a constructed signal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Count the samples that are NaN.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.samples.iter().filter(|v| v.is_nan()).count()
    }
}

/// A preprocessed signal: no missing samples and a peak absolute amplitude of 1.0.
///
/// Only produced by [`Preprocessor`](crate::Preprocessor), so the invariant
/// holds for every instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f64>,
    sample_rate: SampleRate,
    label: Option<String>,
}

impl Signal {
    pub(crate) fn from_normalized(
        samples: Vec<f64>,
        sample_rate: SampleRate,
        label: Option<String>,
    ) -> Self {
        debug_assert!(!samples.is_empty());
        debug_assert!(samples.iter().all(|v| v.is_finite()));
        Self {
            samples,
            sample_rate,
            label,
        }
    }

    /// Return the normalized samples.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Return the sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Return the display label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false` for a constructed signal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert back into a raw signal, e.g. to feed an already-normalized
    /// signal through a batch again.
    #[must_use]
    pub fn into_raw(self) -> RawSignal {
        RawSignal {
            samples: self.samples,
            sample_rate: self.sample_rate,
            label: self.label,
        }
    }
}

impl AsRef<[f64]> for Signal {
    fn as_ref(&self) -> &[f64] {
        &self.samples
    }
}

impl Index<usize> for Signal {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}
