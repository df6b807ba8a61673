//! Feature extraction over an augmented directory.
//!
//! Files are processed sequentially in name order. Unreadable, empty and
//! wrongly-shaped files are logged and counted, never fatal; only a bad
//! class mapping or a failed container write aborts the run.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ndarray::{Array2, Array4, Axis};

use crate::analysis::FeatureExtractor;
use crate::audio::{fit_length, list_wav_files, read_audio_file};
use crate::augment::WAV_DIR;
use crate::config::{DataConfig, FrameGeometry};
use crate::dataset::writer::{write_dataset, DatasetMetadata};
use crate::dataset::ClassMap;
use crate::error::{log_audio_error, log_pipeline_error, PipelineError, PipelineResult};
use crate::progress::task_progress_bar;

/// Outcome of one extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    pub output: PathBuf,
    pub accepted: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Class key of an augmented file: the name up to the first `-`
pub fn class_key(filename: &str) -> &str {
    filename.split('-').next().unwrap_or(filename)
}

/// Extract features for every `<data_dir>/wav/*.wav` into `feature_path`
///
/// # Errors
/// Configuration error when the directory is missing or a file's class key
/// is not in `classes`; dataset or I/O error when the container cannot be
/// written. Per-file decode and shape problems only increase `failed`.
pub fn extract_features(
    data_dir: &Path,
    feature_path: &Path,
    classes: &ClassMap,
    data: &DataConfig,
    geometry: FrameGeometry,
    show_progress: bool,
) -> PipelineResult<ExtractionReport> {
    let started = Instant::now();
    let wav_dir = data_dir.join(WAV_DIR);
    if !wav_dir.is_dir() {
        return Err(PipelineError::config(format!(
            "augmented directory {} does not exist",
            wav_dir.display()
        )));
    }

    let files = list_wav_files(&wav_dir).map_err(|err| PipelineError::io(&wav_dir, err))?;
    let labelled = resolve_classes(&files, classes)?;
    tracing::info!(
        "[Extract] Extracting features from {} files in {}",
        labelled.len(),
        wav_dir.display()
    );

    let extractor = FeatureExtractor::new(data, geometry)?;
    let shape = extractor.shape();
    let mut features = Vec::with_capacity(labelled.len() * shape.len());
    let mut labels = Vec::with_capacity(labelled.len() * classes.num_classes());
    let mut accepted = 0usize;
    let mut failed = 0usize;

    let progress = task_progress_bar(labelled.len() as u64, "Extracting", show_progress);
    for (path, class_index) in &labelled {
        progress.inc(1);
        let waveform = match read_audio_file(path, data.sample_rate, None) {
            Ok(waveform) => waveform,
            Err(err) => {
                log_audio_error(&err, "feature extraction");
                failed += 1;
                continue;
            }
        };
        if waveform.is_empty() {
            log::warn!("[Extract] File {:?} is corrupted.", path);
            failed += 1;
            continue;
        }

        let samples = fit_length(waveform.samples, geometry.num_samples);
        let tensor = extractor.extract(&samples);
        if !shape.matches(&tensor) {
            let err = PipelineError::ShapeMismatch {
                file: path.display().to_string(),
                expected: shape.frames,
                actual: tensor.len_of(Axis(0)),
            };
            log_pipeline_error(&err, "feature extraction");
            failed += 1;
            continue;
        }

        features.extend(tensor.iter().copied());
        labels.extend(classes.one_hot(*class_index));
        accepted += 1;
    }
    progress.finish_and_clear();

    let (frames, mels, channels) = shape.as_tuple();
    let input = Array4::from_shape_vec((accepted, frames, mels, channels), features)
        .map_err(PipelineError::dataset)?;
    let labels = Array2::from_shape_vec((accepted, classes.num_classes()), labels)
        .map_err(PipelineError::dataset)?;
    write_dataset(
        feature_path,
        &input,
        &labels,
        DatasetMetadata {
            window_length: geometry.window_length,
            num_mels: data.num_mels,
            num_classes: classes.num_classes(),
            sample_rate: data.sample_rate,
        },
    )?;

    let elapsed = started.elapsed();
    tracing::info!(
        "[Extract] Time taken for extracting features: {:.2}s ({} accepted, {} failed)",
        elapsed.as_secs_f64(),
        accepted,
        failed
    );

    Ok(ExtractionReport {
        output: feature_path.to_path_buf(),
        accepted,
        failed,
        elapsed,
    })
}

/// Pair each file with its class index, failing on the first unknown key
fn resolve_classes(files: &[PathBuf], classes: &ClassMap) -> PipelineResult<Vec<(PathBuf, usize)>> {
    files
        .iter()
        .map(|path| {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let key = class_key(filename);
            classes
                .index_of(key)
                .map(|index| (path.clone(), index))
                .ok_or_else(|| {
                    PipelineError::config(format!(
                        "class {:?} of {} is not in the class map ({})",
                        key,
                        filename,
                        classes.names().collect::<Vec<_>>().join(", ")
                    ))
                })
        })
        .collect()
}
