//! Single-pair analysis: preprocess, correlate, and locate the peak.

use tracing::{debug, instrument};

use crate::correlate::{CorrelationResult, CrossCorrelator};
use crate::error::PairError;
use crate::lag::{MaxCorrelation, extract_max};
use crate::preprocess::Preprocessor;
use crate::signal::RawSignal;

/// Full correlation curve plus its peak, for single-pair display.
///
/// `correlation` is `correlate(b, a)`, so its `len_a()` is the candidate's
/// length and `len_b()` the reference's. A positive lag means `b` arrives
/// later than `a`; a negative lag means `b` leads.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    /// Normalized coefficients over every lag.
    pub correlation: CorrelationResult,
    /// Peak coefficient and lag.
    pub max: MaxCorrelation,
    /// Lag axis in seconds, parallel to `correlation.coefficients()`.
    pub lag_axis: Vec<f64>,
}

/// Correlates one pair of raw signals.
///
/// Offset removal is on by default, matching single-pair use on signals that
/// still carry their DC offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairAnalyzer {
    preprocessor: Preprocessor,
    correlator: CrossCorrelator,
}

impl PairAnalyzer {
    /// Create an analyzer with default preprocessing and correlation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable mean removal.
    #[must_use]
    pub fn with_offset_removal(mut self, remove_offset: bool) -> Self {
        self.preprocessor = self.preprocessor.with_offset_removal(remove_offset);
        self
    }

    /// Use a custom correlator.
    #[must_use]
    pub fn with_correlator(mut self, correlator: CrossCorrelator) -> Self {
        self.correlator = correlator;
        self
    }

    /// Preprocess both signals and correlate the candidate `b` against the
    /// reference `a`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PairError::PreprocessA`] / [`PairError::PreprocessB`] | A signal is degenerate |
    /// | [`PairError::SampleRateMismatch`] | The sample rates differ |
    /// | [`PairError::Correlation`] | Correlation fails |
    #[instrument(skip(self, a, b), fields(len_a = a.len(), len_b = b.len()))]
    pub fn analyze(&self, a: &RawSignal, b: &RawSignal) -> Result<PairResult, PairError> {
        if a.sample_rate() != b.sample_rate() {
            return Err(PairError::SampleRateMismatch {
                rate_a: a.sample_rate().hz(),
                rate_b: b.sample_rate().hz(),
            });
        }
        let sa = self.preprocessor.preprocess(a).map_err(PairError::PreprocessA)?;
        let sb = self.preprocessor.preprocess(b).map_err(PairError::PreprocessB)?;

        let correlation = self.correlator.correlate(sb.samples(), sa.samples())?;
        let max = extract_max(&correlation, sa.sample_rate());
        debug!(coefficient = max.coefficient, lag_seconds = max.lag_seconds, "pair correlated");

        let lag_axis = correlation.lag_seconds(sa.sample_rate());
        Ok(PairResult {
            correlation,
            max,
            lag_axis,
        })
    }
}
