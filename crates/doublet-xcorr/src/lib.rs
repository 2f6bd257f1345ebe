//! Normalized cross-correlation for repeated-event waveforms.
//!
//! Pure math library, zero I/O. Provides signal preprocessing (missing-sample
//! replacement, offset removal, unit-peak scaling), full discrete
//! cross-correlation normalized by autocorrelation energy, peak/lag extraction,
//! and pairwise correlation matrices over event collections.
//!
//! Coefficients are divided by the larger autocorrelation peak of the pair. This
//! is not a variance-stabilized estimate: for short or noisy series, or pairs
//! with very different energies, the peak coefficient is biased, so signal
//! lengths are reported alongside results.

mod cancel;
mod correlate;
mod error;
mod lag;
mod matrix;
mod pair;
mod preprocess;
mod signal;
mod synthetic;

pub use cancel::CancelToken;
pub use correlate::{CorrelationResult, CrossCorrelator, SignalEnergy};
pub use error::{CorrelationError, MatrixError, PairError, PreprocessError, SignalError};
pub use lag::{MaxCorrelation, extract_max};
pub use matrix::{FailurePolicy, MatrixConfig, PairwiseMatrix};
pub use pair::{PairAnalyzer, PairResult};
pub use preprocess::{Preprocessor, fill_missing, normalize_peak, remove_offset};
pub use signal::{RawSignal, SampleRate, Signal};
pub use synthetic::{SineWave, white_noise};
