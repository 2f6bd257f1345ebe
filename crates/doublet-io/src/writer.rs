//! JSON result writer for single-pair and matrix outputs.

use std::fs;
use std::path::{Path, PathBuf};

use doublet_xcorr::{MaxCorrelation, PairResult, PairwiseMatrix};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes correlation results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_pair.json` and
/// `{experiment}_matrix.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Path of the single-pair artifact.
    #[must_use]
    pub fn pair_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_pair.json", self.experiment.as_str()))
    }

    /// Path of the matrix artifact.
    #[must_use]
    pub fn matrix_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_matrix.json", self.experiment.as_str()))
    }

    /// Write a single-pair result to `{experiment}_pair.json`.
    ///
    /// The artifact carries the full coefficient curve and its lag axis so the
    /// correlation can be plotted without recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_pair(
        &self,
        reference: &str,
        candidate: &str,
        result: &PairResult,
    ) -> Result<PathBuf, IoError> {
        let artifact = PairArtifact {
            experiment: self.experiment.as_str(),
            reference,
            candidate,
            len_reference: result.correlation.len_b(),
            len_candidate: result.correlation.len_a(),
            max: MaxEntry::from(result.max),
            lag_seconds: &result.lag_axis,
            coefficients: result.correlation.coefficients(),
        };

        let path = self.pair_path();
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "pair result written");
        Ok(path)
    }

    /// Write a pairwise matrix to `{experiment}_matrix.json`.
    ///
    /// Invalid cells serialize as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n = matrix.len()))]
    pub fn write_matrix(&self, matrix: &PairwiseMatrix) -> Result<PathBuf, IoError> {
        let artifact = MatrixArtifact {
            experiment: self.experiment.as_str(),
            n_events: matrix.len(),
            invalid_cells: matrix.invalid_count(),
            labels: matrix.labels(),
            signal_lengths: matrix.signal_lengths(),
            coefficients: matrix.coefficient_rows(),
            lag_seconds: matrix.lag_rows(),
        };

        let path = self.matrix_path();
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "matrix written");
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).expect("serialization cannot fail");
        fs::write(path, &json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct PairArtifact<'a> {
    experiment: &'a str,
    reference: &'a str,
    candidate: &'a str,
    len_reference: usize,
    len_candidate: usize,
    max: MaxEntry,
    lag_seconds: &'a [f64],
    coefficients: &'a [f64],
}

#[derive(Serialize)]
struct MaxEntry {
    coefficient: f64,
    lag_samples: isize,
    lag_seconds: f64,
}

impl From<MaxCorrelation> for MaxEntry {
    fn from(max: MaxCorrelation) -> Self {
        Self {
            coefficient: max.coefficient,
            lag_samples: max.lag_samples,
            lag_seconds: max.lag_seconds,
        }
    }
}

#[derive(Serialize)]
struct MatrixArtifact<'a> {
    experiment: &'a str,
    n_events: usize,
    invalid_cells: usize,
    labels: &'a [String],
    signal_lengths: &'a [usize],
    coefficients: Vec<Vec<Option<f64>>>,
    lag_seconds: Vec<Vec<Option<f64>>>,
}
