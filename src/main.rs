use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use doublet_io::{ExperimentName, ResultWriter, SignalReader};
use doublet_xcorr::{
    CancelToken, FailurePolicy, MatrixConfig, PairAnalyzer, PairwiseMatrix, RawSignal,
    SampleRate, SineWave,
};

#[derive(Parser)]
#[command(name = "doublet")]
#[command(about = "Normalized cross-correlation of repeated-event waveforms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Correlate two events from a catalog and report the peak coefficient and lag
    Pair {
        /// Path to the event CSV (`label,s0,s1,...`)
        #[arg(long)]
        data: PathBuf,

        /// Label of the reference event (signal a)
        #[arg(long)]
        reference: String,

        /// Label of the candidate event (signal b)
        #[arg(long)]
        candidate: String,

        /// Sampling rate in Hz shared by all events
        #[arg(long)]
        sample_rate: f64,

        /// Skip mean removal before normalization
        #[arg(long, default_value_t = false)]
        no_offset_removal: bool,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Build the pairwise correlation matrix over every event in a catalog
    Matrix {
        /// Path to the event CSV (`label,s0,s1,...`)
        #[arg(long)]
        data: PathBuf,

        /// Sampling rate in Hz shared by all events
        #[arg(long)]
        sample_rate: f64,

        /// Remove each event's mean before normalization
        #[arg(long, default_value_t = false)]
        remove_offset: bool,

        /// Record failed cells as invalid instead of aborting
        #[arg(long, default_value_t = false)]
        mark_invalid: bool,

        /// Cancel the build if it runs longer than this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Correlate a clean sine against a phase-shifted noisy copy
    Synthetic {
        /// Number of samples per trace
        #[arg(long, default_value_t = 36001)]
        samples: usize,

        /// Sampling rate in Hz
        #[arg(long, default_value_t = 100.0)]
        sample_rate: f64,

        /// Phase shift of the candidate in radians
        #[arg(long, default_value_t = std::f64::consts::FRAC_PI_4)]
        phase: f64,

        /// Standard deviation of the candidate's Gaussian noise
        #[arg(long, default_value_t = 1.0)]
        noise: f64,

        /// RNG seed for the noise
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct PairOutput {
    experiment: String,
    reference: String,
    candidate: String,
    len_reference: usize,
    len_candidate: usize,
    coefficient: f64,
    lag_samples: isize,
    lag_seconds: f64,
    artifact: PathBuf,
}

#[derive(Serialize)]
struct MatrixOutput {
    experiment: String,
    n_events: usize,
    invalid_cells: usize,
    strongest_pair: Option<StrongestPair>,
    artifact: PathBuf,
}

#[derive(Serialize)]
struct StrongestPair {
    row: String,
    col: String,
    coefficient: f64,
    lag_seconds: f64,
}

#[derive(Serialize)]
struct SyntheticOutput {
    samples: usize,
    sample_rate: f64,
    phase: f64,
    noise: f64,
    seed: u64,
    coefficient: f64,
    lag_samples: isize,
    lag_seconds: f64,
}

fn parse_sample_rate(hz: f64) -> Result<SampleRate> {
    SampleRate::new(hz).with_context(|| format!("invalid --sample-rate {hz}"))
}

/// Off-diagonal cell with the largest absolute coefficient, first in row-major order on ties.
fn strongest_pair(matrix: &PairwiseMatrix) -> Option<StrongestPair> {
    let mut best: Option<(usize, usize, f64, f64)> = None;
    for (row, col, cell) in matrix.iter() {
        let Some(max) = cell else { continue };
        if row == col {
            continue;
        }
        if best.is_none_or(|(_, _, c, _)| max.coefficient.abs() > c.abs()) {
            best = Some((row, col, max.coefficient, max.lag_seconds));
        }
    }
    best.map(|(row, col, coefficient, lag_seconds)| StrongestPair {
        row: matrix.labels()[row].clone(),
        col: matrix.labels()[col].clone(),
        coefficient,
        lag_seconds,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        if threads == 0 {
            bail!("--threads must be at least 1");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Pair {
            data,
            reference,
            candidate,
            sample_rate,
            no_offset_removal,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let rate = parse_sample_rate(sample_rate)?;

            // 1. Read catalog and pick the two events
            let catalog = SignalReader::new(&data, rate)
                .read()
                .context("failed to read event CSV")?;
            let a = catalog.find(&reference)?;
            let b = catalog.find(&candidate)?;

            // 2. Correlate
            let result = PairAnalyzer::new()
                .with_offset_removal(!no_offset_removal)
                .analyze(a, b)
                .with_context(|| format!("failed to correlate {reference} against {candidate}"))?;
            info!(max = %result.max, "pair correlated");

            // 3. Write JSON artifact
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let artifact = writer.write_pair(&reference, &candidate, &result)?;

            // 4. Print summary
            let output = PairOutput {
                experiment,
                reference,
                candidate,
                len_reference: a.len(),
                len_candidate: b.len(),
                coefficient: result.max.coefficient,
                lag_samples: result.max.lag_samples,
                lag_seconds: result.max.lag_seconds,
                artifact,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Matrix {
            data,
            sample_rate,
            remove_offset,
            mark_invalid,
            deadline_secs,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let rate = parse_sample_rate(sample_rate)?;

            // 1. Read catalog
            let events: Vec<RawSignal> = SignalReader::new(&data, rate)
                .read()
                .context("failed to read event CSV")?
                .into_events();

            // 2. Configure builder
            let policy = if mark_invalid {
                FailurePolicy::MarkInvalid
            } else {
                FailurePolicy::Abort
            };
            let mut config = MatrixConfig::new()
                .with_offset_removal(remove_offset)
                .with_failure_policy(policy);

            if let Some(secs) = deadline_secs {
                let token = CancelToken::new();
                let watchdog = token.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(secs));
                    warn!(secs, "deadline reached, cancelling matrix build");
                    watchdog.cancel();
                });
                config = config.with_cancel_token(token);
            }

            // 3. Build
            let matrix = config
                .build(&events)
                .context("failed to build correlation matrix")?;

            // 4. Write JSON artifact
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let artifact = writer.write_matrix(&matrix)?;

            // 5. Print summary
            let output = MatrixOutput {
                experiment,
                n_events: matrix.len(),
                invalid_cells: matrix.invalid_count(),
                strongest_pair: strongest_pair(&matrix),
                artifact,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Synthetic {
            samples,
            sample_rate,
            phase,
            noise,
            seed,
        } => {
            let rate = parse_sample_rate(sample_rate)?;
            if noise < 0.0 || !noise.is_finite() {
                bail!("--noise must be a finite non-negative standard deviation, got {noise}");
            }

            // 1. Generate traces
            let reference = SineWave::new(samples)
                .context("invalid --samples")?
                .generate();
            let candidate = SineWave::new(samples)
                .context("invalid --samples")?
                .with_phase(phase)
                .with_noise(noise)
                .with_seed(seed)
                .generate();
            info!(samples, phase, noise, seed, "synthetic traces generated");

            // 2. Correlate
            let a = RawSignal::new(reference, rate)?.with_label("reference");
            let b = RawSignal::new(candidate, rate)?.with_label("candidate");
            let result = PairAnalyzer::new()
                .analyze(&a, &b)
                .context("failed to correlate synthetic traces")?;

            // 3. Print summary
            let output = SyntheticOutput {
                samples,
                sample_rate,
                phase,
                noise,
                seed,
                coefficient: result.max.coefficient,
                lag_samples: result.max.lag_samples,
                lag_seconds: result.max.lag_seconds,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
