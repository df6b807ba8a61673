//! Preprocessing driver: augment then extract, per split.
//!
//! Output layout under `output`:
//! - `train/` and `valid/` augmented directories (`wav/`, `jams/`, ledger)
//! - `features/train.safetensors` and `features/valid.safetensors`

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::augment::{discover_sources, source_label, AugmentOptions, AugmentReport, Augmenter};
use crate::config::{FrameGeometry, NoiseGain, PipelineConfig};
use crate::dataset::{class_key, extract_features, ClassMap, ExtractionReport};
use crate::error::{PipelineError, PipelineResult};

pub const FEATURES_DIR: &str = "features";
pub const TRAIN_SPLIT: &str = "train";
pub const VALID_SPLIT: &str = "valid";

/// Raw recording roots, each laid out as `<root>/<class>/*.wav`
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub train: PathBuf,
    /// Required by [`preprocess`], ignored by [`preprocess_denoise`]
    pub valid: Option<PathBuf>,
}

/// Inputs of a preprocessing run
#[derive(Debug, Clone)]
pub struct PreprocessRequest {
    pub dataset: DatasetPaths,
    pub output: PathBuf,
    pub noise_dir: Option<PathBuf>,
    pub classes: ClassMap,
    pub keyword_duration_ms: f64,
    /// Overrides `augment.noise_gain`
    pub noise_gain: Option<NoiseGain>,
    /// Overrides `augment.num_workers`
    pub num_workers: Option<usize>,
}

/// Augmentation and extraction outcome for one split
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub augment: AugmentReport,
    pub extract: ExtractionReport,
}

#[derive(Debug, Clone)]
pub struct PreprocessReport {
    pub geometry: FrameGeometry,
    pub train: SplitReport,
    pub valid: Option<SplitReport>,
}

impl PreprocessReport {
    /// Files skipped during extraction across all splits
    pub fn total_failures(&self) -> usize {
        self.train.extract.failed + self.valid.as_ref().map_or(0, |valid| valid.extract.failed)
    }
}

/// Augment and extract the train and validation splits
///
/// The validation split runs in validation mode, so its skip classes keep
/// only their originals.
pub fn preprocess(
    config: &PipelineConfig,
    request: &PreprocessRequest,
) -> PipelineResult<PreprocessReport> {
    let valid_dir = request.dataset.valid.as_deref().ok_or_else(|| {
        PipelineError::config("a validation dataset path is required for preprocessing")
    })?;
    let (config, geometry) = prepare(config, request)?;
    check_inputs(
        &config,
        request,
        &[request.dataset.train.as_path(), valid_dir],
        true,
    )?;
    let augmenter = Augmenter::new(config)?;

    let train_out = request.output.join(TRAIN_SPLIT);
    let valid_out = request.output.join(VALID_SPLIT);

    let mut options = AugmentOptions::new(geometry.keyword_length);
    options.noise_dir = request.noise_dir.clone();
    options.num_workers = request.num_workers;
    let train_augment = augmenter.run(&request.dataset.train, &train_out, &options)?;

    options.validation_mode = true;
    let valid_augment = augmenter.run(valid_dir, &valid_out, &options)?;

    let features_dir = recreate_features_dir(&request.output)?;
    let train_extract =
        extract_split(&augmenter, request, geometry, &train_out, &features_dir, TRAIN_SPLIT)?;
    let valid_extract =
        extract_split(&augmenter, request, geometry, &valid_out, &features_dir, VALID_SPLIT)?;

    Ok(PreprocessReport {
        geometry,
        train: SplitReport {
            augment: train_augment,
            extract: train_extract,
        },
        valid: Some(SplitReport {
            augment: valid_augment,
            extract: valid_extract,
        }),
    })
}

/// Train split only, with originals and time shifts but no other variants
pub fn preprocess_denoise(
    config: &PipelineConfig,
    request: &PreprocessRequest,
) -> PipelineResult<PreprocessReport> {
    let (config, geometry) = prepare(config, request)?;
    check_inputs(&config, request, &[request.dataset.train.as_path()], false)?;
    let augmenter = Augmenter::new(config)?;
    let train_out = request.output.join(TRAIN_SPLIT);

    let mut options = AugmentOptions::new(geometry.keyword_length);
    options.noise_dir = request.noise_dir.clone();
    options.num_workers = request.num_workers;
    options.variants = false;
    let train_augment = augmenter.run(&request.dataset.train, &train_out, &options)?;

    let features_dir = recreate_features_dir(&request.output)?;
    let train_extract =
        extract_split(&augmenter, request, geometry, &train_out, &features_dir, TRAIN_SPLIT)?;

    Ok(PreprocessReport {
        geometry,
        train: SplitReport {
            augment: train_augment,
            extract: train_extract,
        },
        valid: None,
    })
}

/// Apply request overrides and derive the frame geometry
fn prepare(
    config: &PipelineConfig,
    request: &PreprocessRequest,
) -> PipelineResult<(PipelineConfig, FrameGeometry)> {
    let mut config = config.clone();
    if let Some(gain) = request.noise_gain {
        config.augment.noise_gain = gain;
    }
    config.validate()?;
    let geometry = config.data.geometry(request.keyword_duration_ms)?;
    log::info!(
        "[Pipeline] Keyword length {} samples, window {} frames, {} samples per example",
        geometry.keyword_length,
        geometry.window_length,
        geometry.num_samples
    );
    Ok((config, geometry))
}

/// Fail before any augmentation when an input directory is missing or a
/// class key the run would produce is not in the class map
///
/// Keys come from each split's class directories and, when noise chunks
/// are cut (`with_noise` and a noise directory), from the noise label.
fn check_inputs(
    config: &PipelineConfig,
    request: &PreprocessRequest,
    splits: &[&Path],
    with_noise: bool,
) -> PipelineResult<()> {
    for split in splits {
        if !split.is_dir() {
            return Err(PipelineError::config(format!(
                "input directory {} does not exist",
                split.display()
            )));
        }
    }

    let mut keys = BTreeSet::new();
    if let Some(noise_dir) = request.noise_dir.as_deref().filter(|_| with_noise) {
        if !noise_dir.is_dir() {
            return Err(PipelineError::config(format!(
                "noise directory {} does not exist",
                noise_dir.display()
            )));
        }
        keys.insert(class_key(&config.augment.noise_label).to_string());
    }
    for split in splits {
        for path in discover_sources(split)? {
            if let Some((_, label)) = source_label(&path) {
                keys.insert(class_key(&label).to_string());
            }
        }
    }

    let missing: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|key| request.classes.index_of(key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::config(format!(
            "classes {:?} are not in the class map ({})",
            missing,
            request.classes.names().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}

fn recreate_features_dir(output: &Path) -> PipelineResult<PathBuf> {
    let dir = output.join(FEATURES_DIR);
    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(|err| PipelineError::io(&dir, err))?;
    }
    fs::create_dir_all(&dir).map_err(|err| PipelineError::io(&dir, err))?;
    Ok(dir)
}

fn extract_split(
    augmenter: &Augmenter,
    request: &PreprocessRequest,
    geometry: FrameGeometry,
    augmented: &Path,
    features_dir: &Path,
    split: &str,
) -> PipelineResult<ExtractionReport> {
    let config = augmenter.config();
    let report = extract_features(
        augmented,
        &features_dir.join(format!("{}.safetensors", split)),
        &request.classes,
        &config.data,
        geometry,
        config.augment.show_progress,
    )?;
    if report.failed > 0 {
        log::warn!(
            "[Pipeline] {} files failed feature extraction in the {} split",
            report.failed,
            split
        );
    }
    Ok(report)
}
