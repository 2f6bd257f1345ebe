//! I/O error types for doublet-io.

use std::path::PathBuf;

/// Errors from reading event catalogs and writing correlation results.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the file contains no event rows.
    #[error("empty catalog (no event rows) in {path}")]
    EmptyCatalog {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a row has a label but no sample columns.
    #[error("event \"{label}\" in {path} (row {row_index}) has no samples")]
    EmptyEvent {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
        /// Label of the offending row.
        label: String,
    },

    /// Returned when a row has an empty label cell.
    #[error("missing label in {path} at row {row_index}")]
    MissingLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned when a sample cell is infinite or not a float.
    ///
    /// Empty cells and `NaN` are missing samples, not errors.
    #[error("invalid sample in {path}: row {row_index}, column {col_index}, raw value \"{raw}\"")]
    InvalidSample {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
        /// Zero-based column index (excluding the label column).
        col_index: usize,
        /// The raw cell text.
        raw: String,
    },

    /// Returned when a requested event label is not in the catalog.
    #[error("no event labelled \"{label}\"")]
    UnknownLabel {
        /// The label that was looked up.
        label: String,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
