// Augment module - parallel generation of augmented keyword recordings
//
// Run flow:
// 1. Load the noise pool (optional, never in denoise mode)
// 2. Recreate `<out>/wav` and `<out>/jams`
// 3. Load sources and plan every task up front
// 4. Dispatch tasks to a bounded blocking pool and collect results
// 5. Write the ledger
//
// Any task error aborts the run before the ledger is written.

pub mod drc;
pub mod ledger;
pub mod plan;
pub mod transforms;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::task::JoinSet;

use crate::audio::{list_wav_files, read_audio_file, write_wav, Waveform};
use crate::config::{NoiseGain, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::progress::task_progress_bar;

pub use ledger::{Ledger, LedgerEntry, LEDGER_FILE};
pub use plan::{
    discover_sources, load_sources, noise_chunk_starts, plan_tasks, source_label, AugmentOptions,
    AugmentTask, SourceFile, SourceRef, TaskKind,
};

/// Subdirectory holding the augmented recordings
pub const WAV_DIR: &str = "wav";

/// Annotation subdirectory, created empty for downstream tooling
pub const JAMS_DIR: &str = "jams";

/// Outcome of one augmentation run
#[derive(Debug, Clone)]
pub struct AugmentReport {
    pub ledger: Ledger,
    pub ledger_path: PathBuf,
    pub num_sources: usize,
    pub num_noise_files: usize,
    pub num_noise_chunks: usize,
    pub elapsed: Duration,
}

impl AugmentReport {
    pub fn num_files(&self) -> usize {
        self.ledger.len()
    }
}

/// Read-only state shared by every worker
struct TaskContext {
    wav_dir: PathBuf,
    sample_rate: u32,
    noise_gain: NoiseGain,
    drc_program: String,
    presets: Vec<Vec<String>>,
    sources: Vec<SourceFile>,
    noise_pool: Arc<Vec<Waveform>>,
    run_seed: u64,
}

impl TaskContext {
    fn source(&self, task: &AugmentTask) -> &[f32] {
        match task.source {
            SourceRef::Keyword(position) => &self.sources[position].waveform.samples,
            SourceRef::Noise(position) => &self.noise_pool[position].samples,
        }
    }

    fn run(&self, task: &AugmentTask) -> PipelineResult<LedgerEntry> {
        let filename = task.filename();
        let out_path = self.wav_dir.join(&filename);
        let input = self.source(task);

        let samples = match &task.kind {
            TaskKind::Original => input.to_vec(),
            TaskKind::NoiseChunk { start, length } => {
                input[*start..(*start + *length).min(input.len())].to_vec()
            }
            TaskKind::TimeShift { shift } => transforms::time_shift(input, *shift),
            TaskKind::TimeStretch { shift, rate } => {
                transforms::time_stretch(&transforms::time_shift(input, *shift), *rate)
            }
            TaskKind::PitchShift { shift, steps } => transforms::pitch_shift(
                &transforms::time_shift(input, *shift),
                self.sample_rate,
                *steps,
            )?,
            TaskKind::BackgroundNoise { shift, noise } => {
                let mut rng = StdRng::seed_from_u64(task_seed(self.run_seed, task));
                transforms::mix_background_noise(
                    &transforms::time_shift(input, *shift),
                    &self.noise_pool[*noise].samples,
                    self.noise_gain,
                    &mut rng,
                )
            }
            TaskKind::Compression { preset } => {
                let SourceRef::Keyword(position) = task.source else {
                    return Err(PipelineError::config("compression task without a source file"));
                };
                let sample_count = drc::apply_drc(
                    &self.drc_program,
                    &self.sources[position].path,
                    &out_path,
                    &self.presets[*preset],
                    self.sample_rate,
                )?;
                return Ok(LedgerEntry::new(filename, task.label.clone(), sample_count));
            }
        };

        write_wav(&out_path, &samples, self.sample_rate)?;
        log::debug!("[Augment] Wrote {} ({} samples)", filename, samples.len());
        Ok(LedgerEntry::new(filename, task.label.clone(), samples.len()))
    }
}

/// Seed for a task's random draws, stable under any scheduling order
fn task_seed(run_seed: u64, task: &AugmentTask) -> u64 {
    let mut state = run_seed;
    for value in [task.index as u64, tag_id(&task.kind), task.sub_index as u64] {
        state = splitmix64(state ^ value);
    }
    state
}

fn tag_id(kind: &TaskKind) -> u64 {
    kind.tag().bytes().fold(0u64, |acc, byte| (acc << 8) | byte as u64)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Augmenter drives one augmentation run per call to [`run`](Self::run)
pub struct Augmenter {
    config: PipelineConfig,
    presets: Vec<Vec<String>>,
}

impl Augmenter {
    /// Validate the configuration and resolve the compression presets
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let presets = drc::resolve_presets(&config.drc.presets)?;
        Ok(Self { config, presets })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Augment every `<in_dir>/<class>/*.wav` into `out_dir`
    pub fn run(
        &self,
        in_dir: &Path,
        out_dir: &Path,
        options: &AugmentOptions,
    ) -> PipelineResult<AugmentReport> {
        let started = Instant::now();
        let sample_rate = self.config.data.sample_rate;
        let workers = options
            .num_workers
            .or(self.config.augment.num_workers)
            .unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(PipelineError::config("num_workers must be at least 1"));
        }
        if options.keyword_length == 0 {
            return Err(PipelineError::config("keyword length must be greater than zero"));
        }
        if !in_dir.is_dir() {
            return Err(PipelineError::config(format!(
                "input directory {} does not exist",
                in_dir.display()
            )));
        }

        tracing::info!(
            "[Augment] Augmenting {} into {} ({} workers)",
            in_dir.display(),
            out_dir.display(),
            workers
        );

        let noise_pool = if options.variants {
            self.load_noise_pool(options.noise_dir.as_deref())?
        } else {
            Vec::new()
        };

        let wav_dir = out_dir.join(WAV_DIR);
        recreate_dir(out_dir)?;
        recreate_dir(&wav_dir)?;
        recreate_dir(&out_dir.join(JAMS_DIR))?;

        let paths = discover_sources(in_dir)?;
        let sources = load_sources(&paths, sample_rate, noise_pool.len() + 1)?;
        log::info!(
            "[Augment] Loaded {} recordings and {} noise files",
            sources.len(),
            noise_pool.len()
        );

        let run_seed = self
            .config
            .augment
            .seed
            .unwrap_or_else(|| rand::thread_rng().next_u64());
        let mut plan_rng = StdRng::seed_from_u64(run_seed);
        let tasks = plan_tasks(
            &sources,
            &noise_pool,
            &self.config,
            options,
            self.presets.len(),
            &mut plan_rng,
        )?;
        let num_noise_chunks = tasks
            .iter()
            .filter(|task| matches!(task.kind, TaskKind::NoiseChunk { .. }))
            .count();

        let num_sources = sources.len();
        let num_noise_files = noise_pool.len();
        let context = Arc::new(TaskContext {
            wav_dir,
            sample_rate,
            noise_gain: self.config.augment.noise_gain,
            drc_program: self.config.drc.program.clone(),
            presets: self.presets.clone(),
            sources,
            noise_pool: Arc::new(noise_pool),
            run_seed,
        });

        let progress = task_progress_bar(
            tasks.len() as u64,
            "Augmenting",
            self.config.augment.show_progress,
        );
        let ledger = dispatch(tasks, context, workers, &progress)?;
        progress.finish_and_clear();

        let ledger_path = ledger.write(out_dir)?;
        let elapsed = started.elapsed();
        tracing::info!(
            "[Augment] Generated {} audio files with total {:.2} hours in {:.1}s",
            ledger.len(),
            ledger.hours(sample_rate),
            elapsed.as_secs_f64()
        );

        Ok(AugmentReport {
            ledger,
            ledger_path,
            num_sources,
            num_noise_files,
            num_noise_chunks,
            elapsed,
        })
    }

    fn load_noise_pool(&self, noise_dir: Option<&Path>) -> PipelineResult<Vec<Waveform>> {
        let Some(noise_dir) = noise_dir else {
            return Ok(Vec::new());
        };
        if !noise_dir.is_dir() {
            return Err(PipelineError::config(format!(
                "noise directory {} does not exist",
                noise_dir.display()
            )));
        }

        let files = list_wav_files(noise_dir).map_err(|err| PipelineError::io(noise_dir, err))?;
        let mut pool = Vec::with_capacity(files.len());
        for path in files {
            let waveform = read_audio_file(&path, self.config.data.sample_rate, None)?;
            if waveform.is_empty() {
                log::warn!("[Augment] Noise file {:?} is empty", path);
            }
            pool.push(waveform);
        }
        Ok(pool)
    }
}

/// Run every task on a blocking pool capped at `workers` threads
///
/// Entries are appended in completion order; the first failure aborts the
/// remaining work.
fn dispatch(
    tasks: Vec<AugmentTask>,
    context: Arc<TaskContext>,
    workers: usize,
    progress: &ProgressBar,
) -> PipelineResult<Ledger> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(workers)
        .thread_name("kws-augment")
        .build()?;

    runtime.block_on(async {
        let mut set = JoinSet::new();
        for task in tasks {
            let context = Arc::clone(&context);
            set.spawn_blocking(move || {
                context.run(&task).inspect_err(|err| {
                    log::error!("[Augment] Task {} failed: {}", task, err);
                })
            });
        }

        let mut ledger = Ledger::new();
        while let Some(joined) = set.join_next().await {
            let entry = joined.map_err(|err| PipelineError::WorkerPanicked {
                details: err.to_string(),
            })??;
            progress.inc(1);
            ledger.push(entry);
        }
        Ok(ledger)
    })
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

fn recreate_dir(dir: &Path) -> PipelineResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|err| PipelineError::io(dir, err))?;
    }
    fs::create_dir_all(dir).map_err(|err| PipelineError::io(dir, err))
}
