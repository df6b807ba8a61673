//! Task planning for the augmentation run.
//!
//! Planning is pure apart from reading the sources: it fixes every task's
//! identity (index, tag, sub-index) and output filename before anything is
//! dispatched, so names never depend on scheduling order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::index::sample;
use rand::Rng;

use crate::audio::{list_wav_files, read_audio_file, Waveform};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// A keyword recording loaded for augmentation
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub class_name: String,
    pub label: String,
    pub index: usize,
    pub waveform: Arc<Waveform>,
}

/// What a task reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef {
    /// Position in the source list
    Keyword(usize),
    /// Position in the noise pool
    Noise(usize),
}

/// Transform applied by a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Original,
    NoiseChunk { start: usize, length: usize },
    TimeShift { shift: usize },
    TimeStretch { shift: usize, rate: f32 },
    PitchShift { shift: usize, steps: f32 },
    BackgroundNoise { shift: usize, noise: usize },
    Compression { preset: usize },
}

impl TaskKind {
    /// Filename tag
    pub fn tag(&self) -> &'static str {
        match self {
            TaskKind::Original => "orig",
            TaskKind::NoiseChunk { .. } => "n",
            TaskKind::TimeShift { .. } => "ts",
            TaskKind::TimeStretch { .. } => "t",
            TaskKind::PitchShift { .. } => "p",
            TaskKind::BackgroundNoise { .. } => "bgn",
            TaskKind::Compression { .. } => "drc",
        }
    }
}

/// One independent unit of augmentation work
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentTask {
    pub kind: TaskKind,
    pub source: SourceRef,
    pub index: usize,
    /// Unused for `orig`
    pub sub_index: usize,
    pub label: String,
}

impl AugmentTask {
    /// `<label>-<index>-<tag><sub-index>.wav`, without sub-index for `orig`
    pub fn filename(&self) -> String {
        match self.kind {
            TaskKind::Original => format!("{}-{}-orig.wav", self.label, self.index),
            _ => format!(
                "{}-{}-{}{}.wav",
                self.label,
                self.index,
                self.kind.tag(),
                self.sub_index
            ),
        }
    }
}

impl fmt::Display for AugmentTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Per-run switches that are not part of the configuration file
#[derive(Debug, Clone)]
pub struct AugmentOptions {
    /// Keyword length in samples; noise chunks have this length
    pub keyword_length: usize,
    /// Directory of background noise recordings
    pub noise_dir: Option<PathBuf>,
    /// Keep only originals for the configured skip classes
    pub validation_mode: bool,
    /// Stretch, pitch, noise and compression variants; off in denoise mode
    pub variants: bool,
    /// Overrides `augment.num_workers`
    pub num_workers: Option<usize>,
}

impl AugmentOptions {
    pub fn new(keyword_length: usize) -> Self {
        Self {
            keyword_length,
            noise_dir: None,
            validation_mode: false,
            variants: true,
            num_workers: None,
        }
    }
}

/// Class name and label for a recording at `<root>/<class>/<file>.wav`
///
/// The label is the class name joined by `-` to the file name's first
/// whitespace-separated token, cut at its first `.`.
pub fn source_label(path: &Path) -> Option<(String, String)> {
    let class_name = path.parent()?.file_name()?.to_str()?.to_string();
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.split_whitespace().next()?.split('.').next()?;
    let label = format!("{}-{}", class_name, stem);
    Some((class_name, label))
}

/// Recordings matching `<in_dir>/*/*.wav`, sorted by path
pub fn discover_sources(in_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(in_dir).map_err(|err| PipelineError::io(in_dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let class_dir = entry.map_err(|err| PipelineError::io(in_dir, err))?.path();
        if class_dir.is_dir() {
            files.extend(
                list_wav_files(&class_dir).map_err(|err| PipelineError::io(&class_dir, err))?,
            );
        }
    }
    files.sort();
    Ok(files)
}

/// Decode every source at `sample_rate`, numbering them from `first_index`
pub fn load_sources(
    paths: &[PathBuf],
    sample_rate: u32,
    first_index: usize,
) -> PipelineResult<Vec<SourceFile>> {
    paths
        .iter()
        .enumerate()
        .map(|(offset, path)| {
            let (class_name, label) = source_label(path).ok_or_else(|| {
                PipelineError::config(format!("cannot derive a label from {}", path.display()))
            })?;
            let waveform = read_audio_file(path, sample_rate, None)?;
            Ok(SourceFile {
                path: path.clone(),
                class_name,
                label,
                index: first_index + offset,
                waveform: Arc::new(waveform),
            })
        })
        .collect()
}

/// Start offsets of the noise chunks cut from a recording of `len` samples
///
/// Chunks of `keyword_length` samples start every `keyword_length / 2`
/// samples while the start stays below `len - keyword_length`.
pub fn noise_chunk_starts(len: usize, keyword_length: usize) -> Vec<usize> {
    if len <= keyword_length {
        return Vec::new();
    }
    let step = (keyword_length / 2).max(1);
    (0..len - keyword_length).step_by(step).collect()
}

/// Expand sources and the noise pool into the full task list
///
/// Noise recordings take the first indices (one each); sources continue the
/// numbering. `rng` only decides which noise recordings each shift uses when
/// `data.num_noise_augmentations` is set.
pub fn plan_tasks<R: Rng + ?Sized>(
    sources: &[SourceFile],
    noise_pool: &[Waveform],
    config: &PipelineConfig,
    options: &AugmentOptions,
    num_presets: usize,
    rng: &mut R,
) -> PipelineResult<Vec<AugmentTask>> {
    let augment = &config.augment;
    let mut tasks = Vec::new();

    // Some(0) is uncapped
    let noise_choices = match config.data.num_noise_augmentations.filter(|&count| count > 0) {
        Some(count) if count > noise_pool.len() && !noise_pool.is_empty() => {
            return Err(PipelineError::config(format!(
                "num_noise_augmentations {} exceeds the {} noise recordings available",
                count,
                noise_pool.len()
            )));
        }
        other => other,
    };

    for (position, noise) in noise_pool.iter().enumerate() {
        let index = position + 1;
        for (chunk, start) in noise_chunk_starts(noise.len(), options.keyword_length)
            .into_iter()
            .enumerate()
        {
            tasks.push(AugmentTask {
                kind: TaskKind::NoiseChunk {
                    start,
                    length: options.keyword_length,
                },
                source: SourceRef::Noise(position),
                index,
                sub_index: chunk,
                label: augment.noise_label.clone(),
            });
        }
    }

    let pitch_steps = augment.all_pitch_steps();
    for (position, source) in sources.iter().enumerate() {
        let task = |kind: TaskKind, sub_index: usize| AugmentTask {
            kind,
            source: SourceRef::Keyword(position),
            index: source.index,
            sub_index,
            label: source.label.clone(),
        };

        tasks.push(task(TaskKind::Original, 0));

        if options.validation_mode && augment.skip_classes.contains(&source.class_name) {
            continue;
        }

        let mut ts_index = 1;
        let mut ps_index = 1;
        let mut bgn_index = 1;

        for (i, &shift) in augment.time_shift_steps.iter().enumerate() {
            if shift != 0 {
                tasks.push(task(TaskKind::TimeShift { shift }, i));
            }
            if !options.variants {
                continue;
            }

            for &rate in &augment.time_stretch_rates {
                tasks.push(task(TaskKind::TimeStretch { shift, rate }, ts_index));
                ts_index += 1;
            }

            for &steps in &pitch_steps {
                tasks.push(task(TaskKind::PitchShift { shift, steps }, ps_index));
                ps_index += 1;
            }

            let chosen: Vec<usize> = match noise_choices {
                Some(count) if !noise_pool.is_empty() => {
                    sample(rng, noise_pool.len(), count).into_vec()
                }
                _ => (0..noise_pool.len()).collect(),
            };
            for noise in chosen {
                tasks.push(task(TaskKind::BackgroundNoise { shift, noise }, bgn_index));
                bgn_index += 1;
            }
        }

        if options.variants {
            for preset in 0..num_presets {
                tasks.push(task(TaskKind::Compression { preset }, preset));
            }
        }
    }

    Ok(tasks)
}
