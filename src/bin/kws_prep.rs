use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kws_prep::augment::{AugmentOptions, Augmenter, Ledger};
use kws_prep::config::{NoiseGain, PipelineConfig};
use kws_prep::dataset::{extract_features, read_dataset, ClassMap};
use kws_prep::logging;
use kws_prep::pipeline::{preprocess, preprocess_denoise, DatasetPaths, PreprocessRequest};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "kws_prep",
    about = "Keyword dataset augmentation and feature extraction"
)]
struct Cli {
    /// JSON pipeline configuration (defaults apply to omitted sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at DEBUG level
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Hide progress bars
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Augment `<input>/<class>/*.wav` into `<output>/wav`
    Augment {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        noise_dir: Option<PathBuf>,
        /// Keep only originals for the configured skip classes
        #[arg(long)]
        validation: bool,
        /// Originals and time shifts only
        #[arg(long)]
        denoise: bool,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value_t = 1000.0)]
        keyword_ms: f64,
    },
    /// Extract features from an augmented directory
    Extract {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// JSON object mapping class names to label indices
        #[arg(long)]
        classes: PathBuf,
        #[arg(long, default_value_t = 1000.0)]
        keyword_ms: f64,
    },
    /// Augment and extract the train and validation splits
    Preprocess {
        #[arg(long)]
        train: PathBuf,
        #[arg(long)]
        valid: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        classes: PathBuf,
        #[arg(long)]
        noise_dir: Option<PathBuf>,
        /// Train split only, originals and time shifts only
        #[arg(long)]
        denoise: bool,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value_t = 1000.0)]
        keyword_ms: f64,
        #[arg(long, requires = "noise_gain_max")]
        noise_gain_min: Option<f32>,
        #[arg(long, requires = "noise_gain_min")]
        noise_gain_max: Option<f32>,
    },
    /// Summarise a feature container or an augmentation ledger
    Inspect {
        #[arg(long, conflicts_with = "ledger", required_unless_present = "ledger")]
        dataset: Option<PathBuf>,
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if cli.quiet {
        config.augment.show_progress = false;
    }

    match cli.command {
        Commands::Augment {
            input,
            output,
            noise_dir,
            validation,
            denoise,
            workers,
            keyword_ms,
        } => {
            let geometry = config.data.geometry(keyword_ms)?;
            let mut options = AugmentOptions::new(geometry.keyword_length);
            options.noise_dir = noise_dir;
            options.validation_mode = validation;
            options.variants = !denoise;
            options.num_workers = workers;

            let augmenter = Augmenter::new(config)?;
            let report = augmenter
                .run(&input, &output, &options)
                .with_context(|| format!("augmenting {}", input.display()))?;
            let sample_rate = augmenter.config().data.sample_rate;
            emit(&AugmentPayload {
                output: &output,
                files: report.num_files(),
                sources: report.num_sources,
                noise_chunks: report.num_noise_chunks,
                hours: report.ledger.hours(sample_rate),
                elapsed_secs: report.elapsed.as_secs_f64(),
            })?;
            Ok(ExitCode::from(0))
        }
        Commands::Extract {
            data,
            output,
            classes,
            keyword_ms,
        } => {
            config.validate()?;
            let classes = ClassMap::load(&classes)?;
            let geometry = config.data.geometry(keyword_ms)?;
            let report = extract_features(
                &data,
                &output,
                &classes,
                &config.data,
                geometry,
                config.augment.show_progress,
            )
            .with_context(|| format!("extracting features from {}", data.display()))?;
            emit(&ExtractPayload {
                output: &report.output,
                accepted: report.accepted,
                failed: report.failed,
                elapsed_secs: report.elapsed.as_secs_f64(),
            })?;
            Ok(failure_code(report.failed))
        }
        Commands::Preprocess {
            train,
            valid,
            output,
            classes,
            noise_dir,
            denoise,
            workers,
            keyword_ms,
            noise_gain_min,
            noise_gain_max,
        } => {
            let noise_gain = match (noise_gain_min, noise_gain_max) {
                (Some(min), Some(max)) => Some(NoiseGain { min, max }),
                _ => None,
            };
            if !denoise && valid.is_none() {
                bail!("--valid is required unless --denoise is set");
            }
            let request = PreprocessRequest {
                dataset: DatasetPaths { train, valid },
                output,
                noise_dir,
                classes: ClassMap::load(&classes)?,
                keyword_duration_ms: keyword_ms,
                noise_gain,
                num_workers: workers,
            };

            let report = if denoise {
                preprocess_denoise(&config, &request)
            } else {
                preprocess(&config, &request)
            }
            .context("preprocessing")?;

            let splits: Vec<ExtractPayload> = std::iter::once(&report.train)
                .chain(report.valid.as_ref())
                .map(|split| ExtractPayload {
                    output: &split.extract.output,
                    accepted: split.extract.accepted,
                    failed: split.extract.failed,
                    elapsed_secs: split.extract.elapsed.as_secs_f64(),
                })
                .collect();
            emit(&PreprocessPayload {
                window_length: report.geometry.window_length,
                num_samples: report.geometry.num_samples,
                splits,
            })?;
            Ok(failure_code(report.total_failures()))
        }
        Commands::Inspect { dataset, ledger } => {
            if let Some(path) = dataset {
                let dataset = read_dataset(&path)?;
                emit(&DatasetPayload {
                    path: &path,
                    examples: dataset.len(),
                    input_shape: dataset.input.shape().to_vec(),
                    labels_shape: dataset.labels.shape().to_vec(),
                    class_counts: dataset.class_counts(),
                })?;
            } else if let Some(path) = ledger {
                let ledger = Ledger::read(&path)?;
                emit(&LedgerPayload {
                    path: &path,
                    files: ledger.len(),
                    total_samples: ledger.total_samples(),
                    hours: ledger.hours(config.data.sample_rate),
                })?;
            }
            Ok(ExitCode::from(0))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load_from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn failure_code(failed: usize) -> ExitCode {
    if failed > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::from(0)
    }
}

fn emit<T: Serialize>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

#[derive(Serialize)]
struct AugmentPayload<'a> {
    output: &'a Path,
    files: usize,
    sources: usize,
    noise_chunks: usize,
    hours: f64,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct ExtractPayload<'a> {
    output: &'a Path,
    accepted: usize,
    failed: usize,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct PreprocessPayload<'a> {
    window_length: usize,
    num_samples: usize,
    splits: Vec<ExtractPayload<'a>>,
}

#[derive(Serialize)]
struct DatasetPayload<'a> {
    path: &'a Path,
    examples: usize,
    input_shape: Vec<usize>,
    labels_shape: Vec<usize>,
    class_counts: Vec<usize>,
}

#[derive(Serialize)]
struct LedgerPayload<'a> {
    path: &'a Path,
    files: usize,
    total_samples: usize,
    hours: f64,
}
