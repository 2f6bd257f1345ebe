//! Error types for signal validation, preprocessing, correlation and matrix building.

/// Errors from constructing a raw signal.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Returned when an empty sample vector is provided.
    #[error("signal must contain at least one sample")]
    EmptySignal,

    /// Returned when a sample is positive or negative infinity.
    ///
    /// NaN is accepted and treated as a missing sample.
    #[error("signal contains infinite value at index {index}")]
    InfiniteValue {
        /// Position of the first infinite sample.
        index: usize,
    },

    /// Returned when the sample rate is zero, negative, or not finite.
    #[error("sample rate must be positive and finite, got {rate}")]
    InvalidSampleRate {
        /// The rejected rate in Hz.
        rate: f64,
    },
}

/// Errors from amplitude normalization.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// Returned when every sample is zero after missing-value replacement and
    /// offset removal, so the amplitude cannot be scaled to unit peak.
    #[error("degenerate signal: all {len} samples are zero after offset removal")]
    DegenerateSignal {
        /// Number of samples in the signal.
        len: usize,
    },
}

/// Errors from cross-correlation.
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    /// Returned when either input has length zero.
    #[error("cannot correlate an empty signal (len_a = {len_a}, len_b = {len_b})")]
    EmptySignal {
        /// Length of the first input.
        len_a: usize,
        /// Length of the second input.
        len_b: usize,
    },

    /// Returned when both autocorrelation peaks are zero, so there is no
    /// energy to normalize against.
    #[error("both signals have zero energy; coefficients are undefined")]
    ZeroEnergy,
}

/// Errors from single-pair analysis.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    /// The first signal could not be normalized.
    #[error("preprocessing failed for signal a: {0}")]
    PreprocessA(#[source] PreprocessError),

    /// The second signal could not be normalized.
    #[error("preprocessing failed for signal b: {0}")]
    PreprocessB(#[source] PreprocessError),

    /// The signals have different sample rates, so lags cannot be expressed in seconds.
    #[error("sample rate mismatch: {rate_a} Hz vs {rate_b} Hz")]
    SampleRateMismatch {
        /// Rate of the first signal.
        rate_a: f64,
        /// Rate of the second signal.
        rate_b: f64,
    },

    /// Wraps a correlation failure.
    #[error("correlation failed: {0}")]
    Correlation(#[from] CorrelationError),
}

/// Errors from building a pairwise correlation matrix.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// Wraps a preprocessing failure for the signal at `index`.
    #[error("preprocessing failed for signal {index}: {source}")]
    Preprocess {
        /// Position of the failing signal in the input collection.
        index: usize,
        /// Underlying error.
        source: PreprocessError,
    },

    /// Wraps a correlation failure for the pair `(row, col)`.
    #[error("correlation failed for pair ({row}, {col}): {source}")]
    Correlation {
        /// Row index of the pair.
        row: usize,
        /// Column index of the pair.
        col: usize,
        /// Underlying error.
        source: CorrelationError,
    },

    /// Returned when two signals in a pair have different sample rates.
    #[error("sample rate mismatch for pair ({row}, {col}): {rate_row} Hz vs {rate_col} Hz")]
    SampleRateMismatch {
        /// Row index of the pair.
        row: usize,
        /// Column index of the pair.
        col: usize,
        /// Sample rate of the row signal.
        rate_row: f64,
        /// Sample rate of the column signal.
        rate_col: f64,
    },

    /// Returned when the batch was cancelled before every pair completed.
    #[error("matrix build cancelled after {completed} of {total} pairs")]
    Cancelled {
        /// Pairs finished before cancellation was observed.
        completed: usize,
        /// Total pairs in the batch.
        total: usize,
    },
}
