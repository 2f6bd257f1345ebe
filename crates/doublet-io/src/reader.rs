//! CSV event catalog reader.

use std::path::{Path, PathBuf};

use doublet_xcorr::{RawSignal, SampleRate, SignalError};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::EventCatalog;

/// Reads an event catalog from a CSV file, one event per row.
///
/// Row format: `label,s0,s1,...,sn`. Rows may have different lengths.
/// Empty cells and `NaN` are missing samples; trailing empty cells are treated
/// as padding and dropped, so rectangular exports of ragged data read back at
/// their true lengths. All events share the sample rate given to the reader.
///
/// # Defaults
///
/// | Option | Default |
/// |---|---|
/// | `has_header` | `true` |
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::EmptyCatalog`] | No event rows |
/// | [`IoError::MissingLabel`] | Label cell is empty |
/// | [`IoError::EmptyEvent`] | Row has no samples |
/// | [`IoError::InvalidSample`] | Cell is infinite or not a float |
pub struct SignalReader {
    path: PathBuf,
    sample_rate: SampleRate,
    has_header: bool,
}

impl SignalReader {
    /// Create a reader for `path`, tagging every event with `sample_rate`.
    pub fn new(path: &Path, sample_rate: SampleRate) -> Self {
        Self {
            path: path.to_path_buf(),
            sample_rate,
            has_header: true,
        }
    }

    /// Whether the first row is a header to skip.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Read and validate the file, returning an [`EventCatalog`].
    #[instrument(skip(self), fields(path = %self.path.display(), rate = self.sample_rate.hz()))]
    pub fn read(&self) -> Result<EventCatalog, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // Ragged rows are expected.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut events = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;
            events.push(self.parse_row(row_index, &record)?);
        }

        if events.is_empty() {
            return Err(IoError::EmptyCatalog {
                path: self.path.clone(),
            });
        }

        info!(
            n_events = events.len(),
            max_len = events.iter().map(RawSignal::len).max().unwrap_or(0),
            "catalog loaded"
        );
        Ok(EventCatalog::new(events))
    }

    fn parse_row(&self, row_index: usize, record: &csv::StringRecord) -> Result<RawSignal, IoError> {
        let label = record.get(0).unwrap_or("");
        if label.is_empty() {
            return Err(IoError::MissingLabel {
                path: self.path.clone(),
                row_index,
            });
        }

        let cells: Vec<&str> = record.iter().skip(1).collect();
        let used = cells.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);

        let mut samples = Vec::with_capacity(used);
        for (col_index, raw) in cells[..used].iter().enumerate() {
            samples.push(self.parse_cell(row_index, col_index, raw)?);
        }

        let missing = samples.iter().filter(|v| v.is_nan()).count();
        debug!(row_index, label, len = samples.len(), missing, "event parsed");

        let signal = RawSignal::new(samples, self.sample_rate).map_err(|e| match e {
            SignalError::InfiniteValue { index } => IoError::InvalidSample {
                path: self.path.clone(),
                row_index,
                col_index: index,
                raw: cells[index].to_string(),
            },
            _ => IoError::EmptyEvent {
                path: self.path.clone(),
                row_index,
                label: label.to_string(),
            },
        })?;
        Ok(signal.with_label(label))
    }

    fn parse_cell(&self, row_index: usize, col_index: usize, raw: &str) -> Result<f64, IoError> {
        if raw.is_empty() {
            return Ok(f64::NAN);
        }
        raw.parse::<f64>().map_err(|_| IoError::InvalidSample {
            path: self.path.clone(),
            row_index,
            col_index,
            raw: raw.to_string(),
        })
    }
}
