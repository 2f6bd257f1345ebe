//! Pairwise correlation matrix over an ordered collection of events.

use std::ops::Index;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::correlate::{CrossCorrelator, SignalEnergy};
use crate::error::MatrixError;
use crate::lag::{MaxCorrelation, extract_max};
use crate::preprocess::Preprocessor;
use crate::signal::{RawSignal, Signal};

/// What to do when a signal or pair cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Fail the whole batch on the first error (default).
    #[default]
    Abort,
    /// Leave the affected cells empty and keep going.
    MarkInvalid,
}

/// Square matrix of peak correlation coefficients indexed by event position.
///
/// Cell `(i, j)` holds the [`MaxCorrelation`] of `correlate(signal_j, signal_i)`:
/// event `i` is the reference and a positive lag means event `j` arrives later.
/// `(i, j)` and `(j, i)` are computed independently; their lags are negated
/// unless two peaks of opposite sign tie, in which case each cell keeps the
/// first in its own lag order. A cell is `None` only under
/// [`FailurePolicy::MarkInvalid`].
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseMatrix {
    n: usize,
    cells: Vec<Option<MaxCorrelation>>,
    labels: Vec<String>,
    signal_lengths: Vec<usize>,
}

impl PairwiseMatrix {
    /// Return the number of events (rows and columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the cell for row `i`, column `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<MaxCorrelation> {
        self[(i, j)]
    }

    /// Return the signed peak coefficient for `(i, j)`.
    #[must_use]
    pub fn coefficient(&self, i: usize, j: usize) -> Option<f64> {
        self.get(i, j).map(|m| m.coefficient)
    }

    /// Return the peak lag in seconds for `(i, j)`.
    #[must_use]
    pub fn lag_seconds(&self, i: usize, j: usize) -> Option<f64> {
        self.get(i, j).map(|m| m.lag_seconds)
    }

    /// Return the display labels, one per event, in matrix order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Return the sample count of each event. Coefficients between short events
    /// are less reliable.
    #[must_use]
    pub fn signal_lengths(&self) -> &[usize] {
        &self.signal_lengths
    }

    /// Return the coefficients as row vectors, for heatmap rendering.
    #[must_use]
    pub fn coefficient_rows(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.coefficient(i, j)).collect())
            .collect()
    }

    /// Return the lags in seconds as row vectors.
    #[must_use]
    pub fn lag_rows(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.lag_seconds(i, j)).collect())
            .collect()
    }

    /// Iterate over every cell as `(i, j, cell)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Option<MaxCorrelation>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(flat, &cell)| (flat / self.n, flat % self.n, cell))
    }

    /// Count cells left empty by [`FailurePolicy::MarkInvalid`].
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }
}

impl Index<(usize, usize)> for PairwiseMatrix {
    type Output = Option<MaxCorrelation>;

    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        assert!(i < self.n, "row index {i} out of bounds for matrix of size {}", self.n);
        assert!(j < self.n, "column index {j} out of bounds for matrix of size {}", self.n);
        &self.cells[i * self.n + j]
    }
}

/// Configuration for building a [`PairwiseMatrix`].
///
/// # Defaults
///
/// | Parameter        | Default                    |
/// |------------------|----------------------------|
/// | `remove_offset`  | `false`                    |
/// | `failure_policy` | [`FailurePolicy::Abort`]   |
/// | `correlator`     | [`CrossCorrelator::new`]   |
/// | `cancel`         | none                       |
///
/// Offset removal is off because batch inputs are expected to arrive with the
/// offset already removed.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    preprocessor: Preprocessor,
    correlator: CrossCorrelator,
    failure_policy: FailurePolicy,
    cancel: Option<CancelToken>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A preprocessed event with its cached autocorrelation peak.
struct Prepared {
    signal: Signal,
    energy: SignalEnergy,
}

impl MatrixConfig {
    /// Create a configuration with the defaults above.
    #[must_use]
    pub fn new() -> Self {
        Self {
            preprocessor: Preprocessor::new().with_offset_removal(false),
            correlator: CrossCorrelator::new(),
            failure_policy: FailurePolicy::Abort,
            cancel: None,
        }
    }

    /// Enable or disable mean removal before normalization.
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

    /// Set the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Attach a cancellation token, checked before each pair.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Return the preprocessor applied to each event.
    #[must_use]
    pub fn preprocessor(&self) -> Preprocessor {
        self.preprocessor
    }

    /// Return the correlator.
    #[must_use]
    pub fn correlator(&self) -> CrossCorrelator {
        self.correlator
    }

    /// Return the failure policy.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Correlate every ordered pair `(i, j)` of `signals`, including `i == j`.
    ///
    /// Each event is preprocessed and its autocorrelation peak computed once.
    /// Pairs run in parallel; every cell is written by exactly one task, so the
    /// result does not depend on scheduling.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MatrixError::Preprocess`] | An event is degenerate (`Abort` only) |
    /// | [`MatrixError::SampleRateMismatch`] | Two events differ in sample rate (`Abort` only) |
    /// | [`MatrixError::Correlation`] | A pair cannot be correlated (`Abort` only) |
    /// | [`MatrixError::Cancelled`] | The cancel token fired before all pairs finished |
    #[instrument(skip(self, signals), fields(n = signals.len(), policy = ?self.failure_policy))]
    pub fn build(&self, signals: &[RawSignal]) -> Result<PairwiseMatrix, MatrixError> {
        let started = Instant::now();
        let n = signals.len();
        let total = n * n;

        let prepared = self.prepare(signals)?;
        if self.failure_policy == FailurePolicy::Abort {
            check_sample_rates(signals)?;
        }
        debug!(valid = prepared.iter().filter(|p| p.is_some()).count(), "events prepared");

        let completed = AtomicUsize::new(0);
        let cells: Vec<Option<MaxCorrelation>> = (0..total)
            .into_par_iter()
            .map(|flat| {
                if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                    return Err(MatrixError::Cancelled {
                        completed: completed.load(Ordering::Relaxed),
                        total,
                    });
                }
                let cell = self.cell(&prepared, flat / n, flat % n);
                completed.fetch_add(1, Ordering::Relaxed);
                cell
            })
            .collect::<Result<_, _>>()?;

        let matrix = PairwiseMatrix {
            n,
            cells,
            labels: signals
                .iter()
                .enumerate()
                .map(|(i, s)| s.label().map_or_else(|| i.to_string(), str::to_owned))
                .collect(),
            signal_lengths: signals.iter().map(RawSignal::len).collect(),
        };

        info!(
            n,
            pairs = total,
            invalid = matrix.invalid_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "correlation matrix built"
        );
        Ok(matrix)
    }

    /// Preprocess every event and cache its energy. Under `MarkInvalid`, failed
    /// events become `None`; under `Abort` the first failure in input order wins.
    fn prepare(&self, signals: &[RawSignal]) -> Result<Vec<Option<Prepared>>, MatrixError> {
        let results: Vec<Result<Prepared, MatrixError>> = signals
            .par_iter()
            .enumerate()
            .map(|(index, raw)| {
                let signal = self
                    .preprocessor
                    .preprocess(raw)
                    .map_err(|source| MatrixError::Preprocess { index, source })?;
                let energy = self
                    .correlator
                    .energy(signal.samples())
                    .map_err(|source| MatrixError::Correlation {
                        row: index,
                        col: index,
                        source,
                    })?;
                Ok(Prepared { signal, energy })
            })
            .collect();

        let mut prepared = Vec::with_capacity(results.len());
        for result in results {
            match (result, self.failure_policy) {
                (Ok(p), _) => prepared.push(Some(p)),
                (Err(err), FailurePolicy::Abort) => return Err(err),
                (Err(err), FailurePolicy::MarkInvalid) => {
                    warn!(error = %err, "event marked invalid");
                    prepared.push(None);
                }
            }
        }
        Ok(prepared)
    }

    fn cell(
        &self,
        prepared: &[Option<Prepared>],
        row: usize,
        col: usize,
    ) -> Result<Option<MaxCorrelation>, MatrixError> {
        let (Some(reference), Some(candidate)) = (&prepared[row], &prepared[col]) else {
            return Ok(None);
        };

        let rate = reference.signal.sample_rate();
        if rate != candidate.signal.sample_rate() {
            return self.on_pair_failure(MatrixError::SampleRateMismatch {
                row,
                col,
                rate_row: rate.hz(),
                rate_col: candidate.signal.sample_rate().hz(),
            });
        }

        // Candidate first: lag is the candidate's delay behind the reference.
        match self.correlator.correlate_with_energy(
            candidate.signal.samples(),
            candidate.energy,
            reference.signal.samples(),
            reference.energy,
        ) {
            Ok(result) => Ok(Some(extract_max(&result, rate))),
            Err(source) => self.on_pair_failure(MatrixError::Correlation { row, col, source }),
        }
    }

    fn on_pair_failure(&self, err: MatrixError) -> Result<Option<MaxCorrelation>, MatrixError> {
        match self.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::MarkInvalid => {
                debug!(error = %err, "pair marked invalid");
                Ok(None)
            }
        }
    }
}

/// Report the first mismatching pair in row-major order: `(0, j)` for the first
/// event whose rate differs from event 0.
fn check_sample_rates(signals: &[RawSignal]) -> Result<(), MatrixError> {
    let Some(first) = signals.first() else {
        return Ok(());
    };
    if let Some((col, other)) = signals
        .iter()
        .enumerate()
        .find(|(_, s)| s.sample_rate() != first.sample_rate())
    {
        return Err(MatrixError::SampleRateMismatch {
            row: 0,
            col,
            rate_row: first.sample_rate().hz(),
            rate_col: other.sample_rate().hz(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::CrossCorrelator;
    use crate::error::PreprocessError;
    use crate::signal::SampleRate;

    fn raw(values: Vec<f64>) -> RawSignal {
        RawSignal::new(values, SampleRate::new(50.0).unwrap()).unwrap()
    }

    fn events() -> Vec<RawSignal> {
        vec![
            raw(vec![0.0, 1.0, 0.5, -0.5, 0.0]).with_label("00:00:01"),
            raw(vec![0.0, 0.0, 1.0, 0.5, -0.5]).with_label("00:00:07"),
            raw(vec![1.0, -1.0, 1.0]).with_label("00:01:30"),
        ]
    }

    #[test]
    fn sized_to_collection() {
        let m = MatrixConfig::new().build(&events()).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.coefficient_rows().len(), 3);
        assert!(m.coefficient_rows().iter().all(|r| r.len() == 3));
    }

    #[test]
    fn larger_than_any_fixed_size() {
        let signals: Vec<RawSignal> = (0..30)
            .map(|i| raw(vec![1.0, (i as f64 * 0.3).sin(), -0.5]))
            .collect();
        let m = MatrixConfig::new().build(&signals).unwrap();
        assert_eq!(m.len(), 30);
        assert!(m.get(29, 29).is_some());
    }

    #[test]
    fn diagonal_is_one() {
        let m = MatrixConfig::new().build(&events()).unwrap();
        for i in 0..3 {
            assert_eq!(m.coefficient(i, i), Some(1.0));
            assert_eq!(m.get(i, i).unwrap().lag_samples, 0);
        }
    }

    #[test]
    fn cells_match_direct_pipeline() {
        let signals = events();
        let m = MatrixConfig::new().build(&signals).unwrap();
        let pre = Preprocessor::new().with_offset_removal(false);
        let xc = CrossCorrelator::new();
        for i in 0..3 {
            for j in 0..3 {
                let a = pre.preprocess(&signals[i]).unwrap();
                let b = pre.preprocess(&signals[j]).unwrap();
                let result = xc.correlate(b.samples(), a.samples()).unwrap();
                let expected = extract_max(&result, a.sample_rate());
                assert_eq!(m.get(i, j), Some(expected), "cell ({i}, {j})");
            }
        }
    }

    #[test]
    fn transposed_cells_negate_lag() {
        let m = MatrixConfig::new().build(&events()).unwrap();
        let forward = m.get(0, 1).unwrap();
        let backward = m.get(1, 0).unwrap();
        assert!((forward.coefficient - backward.coefficient).abs() < 1e-12);
        assert_eq!(forward.lag_samples, -backward.lag_samples);
        // Event 1 is event 0 one sample later.
        assert_eq!(forward.lag_samples, 1);
        assert_eq!(forward.lag_seconds, 0.02);
    }

    #[test]
    fn tied_peaks_keep_sign_of_reference_order() {
        // correlate([1, -1], [1, 0]) / 2 = [0, 0.5, -0.5]: the positive peak
        // comes first, so the cell is +0.5 at lag 0.
        let signals = vec![raw(vec![1.0, 0.0]), raw(vec![1.0, -1.0])];
        let m = MatrixConfig::new().build(&signals).unwrap();

        let cell = m.get(0, 1).unwrap();
        assert_eq!(cell.coefficient, 0.5);
        assert_eq!(cell.lag_samples, 0);

        // correlate([1, 0], [1, -1]) / 2 = [-0.5, 0.5, 0]
        let transposed = m.get(1, 0).unwrap();
        assert_eq!(transposed.coefficient, -0.5);
        assert_eq!(transposed.lag_samples, -1);
    }

    #[test]
    fn labels_follow_input_order() {
        let m = MatrixConfig::new().build(&events()).unwrap();
        assert_eq!(m.labels(), &["00:00:01", "00:00:07", "00:01:30"]);
        assert_eq!(m.signal_lengths(), &[5, 5, 3]);
    }

    #[test]
    fn missing_labels_fall_back_to_index() {
        let m = MatrixConfig::new().build(&[raw(vec![1.0]), raw(vec![2.0])]).unwrap();
        assert_eq!(m.labels(), &["0", "1"]);
    }

    #[test]
    fn empty_collection_builds_empty_matrix() {
        let m = MatrixConfig::new().build(&[]).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.iter().count(), 0);
    }

    #[test]
    fn degenerate_event_aborts_batch() {
        let mut signals = events();
        signals.insert(1, raw(vec![0.0, 0.0, 0.0]));
        let result = MatrixConfig::new().build(&signals);
        assert!(matches!(
            result,
            Err(MatrixError::Preprocess {
                index: 1,
                source: PreprocessError::DegenerateSignal { len: 3 }
            })
        ));
    }

    #[test]
    fn degenerate_event_marked_invalid() {
        let mut signals = events();
        signals.insert(1, raw(vec![f64::NAN, f64::NAN]));
        let m = MatrixConfig::new()
            .with_failure_policy(FailurePolicy::MarkInvalid)
            .build(&signals)
            .unwrap();
        assert_eq!(m.len(), 4);
        // Row 1 and column 1 are empty: 4 + 4 - 1 cells.
        assert_eq!(m.invalid_count(), 7);
        assert!(m.get(1, 3).is_none());
        assert!(m.get(3, 1).is_none());
        assert_eq!(m.coefficient(0, 0), Some(1.0));
    }

    #[test]
    fn sample_rate_mismatch_aborts() {
        let mut signals = events();
        signals.push(RawSignal::new(vec![1.0, 0.0], SampleRate::new(100.0).unwrap()).unwrap());
        let result = MatrixConfig::new().build(&signals);
        assert!(matches!(
            result,
            Err(MatrixError::SampleRateMismatch { row: 0, col: 3, .. })
        ));
    }

    #[test]
    fn sample_rate_mismatch_marked_invalid() {
        let mut signals = events();
        signals.push(RawSignal::new(vec![1.0, 0.0], SampleRate::new(100.0).unwrap()).unwrap());
        let m = MatrixConfig::new()
            .with_failure_policy(FailurePolicy::MarkInvalid)
            .build(&signals)
            .unwrap();
        assert!(m.get(0, 3).is_none());
        assert!(m.get(3, 0).is_none());
        assert_eq!(m.coefficient(3, 3), Some(1.0));
        assert_eq!(m.invalid_count(), 6);
    }

    #[test]
    fn cancelled_token_stops_build() {
        let token = CancelToken::new();
        token.cancel();
        let result = MatrixConfig::new().with_cancel_token(token).build(&events());
        assert!(matches!(result, Err(MatrixError::Cancelled { total: 9, .. })));
    }

    #[test]
    fn cancel_mid_batch_reports_progress() {
        // 48 events of 1500 samples take seconds to finish; the token fires long before.
        let signals: Vec<RawSignal> = (0..48)
            .map(|i| raw((0..1500).map(|t| ((t * (i + 1)) as f64 * 0.01).sin()).collect()))
            .collect();
        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            trigger.cancel();
        });

        let result = MatrixConfig::new().with_cancel_token(token).build(&signals);
        canceller.join().unwrap();

        match result {
            Err(MatrixError::Cancelled { completed, total }) => {
                assert_eq!(total, 48 * 48);
                assert!(completed < total, "completed {completed} of {total}");
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn offset_removal_is_optional() {
        let signals = vec![raw(vec![3.0, 3.0, 3.0])];
        assert!(MatrixConfig::new().build(&signals).is_ok());
        let result = MatrixConfig::new().with_offset_removal(true).build(&signals);
        assert!(matches!(result, Err(MatrixError::Preprocess { index: 0, .. })));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_out_of_bounds_panics() {
        let m = MatrixConfig::new().build(&events()).unwrap();
        let _cell = m[(3, 0)];
    }
}
