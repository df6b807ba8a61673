//! Safetensors container for extracted features.
//!
//! Two `F32` tensors, `input` `(N, frames, mels, 3)` and `labels`
//! `(N, classes)`, plus string metadata describing the geometry. Writes go to
//! a temporary sibling file that is renamed over the destination.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use safetensors::tensor::{Dtype, SafeTensors, TensorView};

use crate::error::{PipelineError, PipelineResult};

pub const INPUT_TENSOR: &str = "input";
pub const LABELS_TENSOR: &str = "labels";

/// Geometry recorded alongside the tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub window_length: usize,
    pub num_mels: usize,
    pub num_classes: usize,
    pub sample_rate: u32,
}

impl DatasetMetadata {
    fn to_map(self) -> HashMap<String, String> {
        HashMap::from([
            ("window_length".to_string(), self.window_length.to_string()),
            ("num_mels".to_string(), self.num_mels.to_string()),
            ("num_classes".to_string(), self.num_classes.to_string()),
            ("sample_rate".to_string(), self.sample_rate.to_string()),
        ])
    }

    fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            window_length: map.get("window_length")?.parse().ok()?,
            num_mels: map.get("num_mels")?.parse().ok()?,
            num_classes: map.get("num_classes")?.parse().ok()?,
            sample_rate: map.get("sample_rate")?.parse().ok()?,
        })
    }
}

/// Tensors loaded back from a container
#[derive(Debug, Clone)]
pub struct FeatureDataset {
    pub input: Array4<f32>,
    pub labels: Array2<f32>,
    pub metadata: Option<DatasetMetadata>,
}

impl FeatureDataset {
    pub fn len(&self) -> usize {
        self.input.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of examples per class index
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.ncols()];
        for row in self.labels.rows() {
            if let Some((index, _)) = row.iter().enumerate().find(|(_, &value)| value > 0.5) {
                counts[index] += 1;
            }
        }
        counts
    }
}

fn to_le_bytes<'a>(values: impl Iterator<Item = &'a f32>) -> Vec<u8> {
    values.flat_map(|value| value.to_le_bytes()).collect()
}

/// Write `input` and `labels`, replacing any existing file at `path`
pub fn write_dataset(
    path: &Path,
    input: &Array4<f32>,
    labels: &Array2<f32>,
    metadata: DatasetMetadata,
) -> PipelineResult<()> {
    if input.dim().0 != labels.dim().0 {
        return Err(PipelineError::dataset(format!(
            "{} feature rows but {} label rows",
            input.dim().0,
            labels.dim().0
        )));
    }

    let input_shape = input.shape().to_vec();
    let labels_shape = labels.shape().to_vec();
    let input_bytes = to_le_bytes(input.iter());
    let labels_bytes = to_le_bytes(labels.iter());

    let input_view = TensorView::new(Dtype::F32, input_shape, &input_bytes)
        .map_err(|err| PipelineError::dataset(format!("input tensor: {:?}", err)))?;
    let labels_view = TensorView::new(Dtype::F32, labels_shape, &labels_bytes)
        .map_err(|err| PipelineError::dataset(format!("labels tensor: {:?}", err)))?;

    let bytes = safetensors::serialize(
        [(INPUT_TENSOR, input_view), (LABELS_TENSOR, labels_view)],
        &Some(metadata.to_map()),
    )
    .map_err(|err| PipelineError::dataset(format!("serialize: {:?}", err)))?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }
    let staging = staging_path(path);
    fs::write(&staging, bytes).map_err(|err| PipelineError::io(&staging, err))?;
    fs::rename(&staging, path).map_err(|err| PipelineError::io(path, err))?;

    log::info!("[Dataset] Wrote {} examples to {:?}", input.dim().0, path);
    Ok(())
}

/// Load a container written by [`write_dataset`]
pub fn read_dataset(path: &Path) -> PipelineResult<FeatureDataset> {
    let bytes = fs::read(path).map_err(|err| PipelineError::io(path, err))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .map_err(|err| PipelineError::dataset(format!("{}: {:?}", path.display(), err)))?;
    let (_, header) = SafeTensors::read_metadata(&bytes)
        .map_err(|err| PipelineError::dataset(format!("{}: {:?}", path.display(), err)))?;

    let input_values = tensor_values(&tensors, INPUT_TENSOR, path)?;
    let labels_values = tensor_values(&tensors, LABELS_TENSOR, path)?;

    let input = match input_values.0.as_slice() {
        &[n, frames, mels, channels] => {
            Array4::from_shape_vec((n, frames, mels, channels), input_values.1)
        }
        other => {
            return Err(PipelineError::dataset(format!(
                "{}: input tensor must be 4-D, got shape {:?}",
                path.display(),
                other
            )))
        }
    }
    .map_err(PipelineError::dataset)?;

    let labels = match labels_values.0.as_slice() {
        &[n, classes] => Array2::from_shape_vec((n, classes), labels_values.1),
        other => {
            return Err(PipelineError::dataset(format!(
                "{}: labels tensor must be 2-D, got shape {:?}",
                path.display(),
                other
            )))
        }
    }
    .map_err(PipelineError::dataset)?;

    Ok(FeatureDataset {
        input,
        labels,
        metadata: header.metadata().as_ref().and_then(DatasetMetadata::from_map),
    })
}

fn tensor_values(
    tensors: &SafeTensors<'_>,
    name: &str,
    path: &Path,
) -> PipelineResult<(Vec<usize>, Vec<f32>)> {
    let view = tensors
        .tensor(name)
        .map_err(|err| PipelineError::dataset(format!("{}: {}: {:?}", path.display(), name, err)))?;
    if view.dtype() != Dtype::F32 {
        return Err(PipelineError::dataset(format!(
            "{}: {} has dtype {:?}, expected F32",
            path.display(),
            name,
            view.dtype()
        )));
    }
    let values = view
        .data()
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok((view.shape().to_vec(), values))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata() -> DatasetMetadata {
        DatasetMetadata {
            window_length: 4,
            num_mels: 2,
            num_classes: 3,
            sample_rate: 16_000,
        }
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features").join("train.safetensors");
        let input = Array4::from_shape_fn((2, 4, 2, 3), |(n, t, m, c)| {
            (n * 100 + t * 10 + m) as f32 + c as f32 * 0.25
        });
        let mut labels = Array2::zeros((2, 3));
        labels[[0, 2]] = 1.0;
        labels[[1, 0]] = 1.0;

        write_dataset(&path, &input, &labels, metadata()).unwrap();
        let dataset = read_dataset(&path).unwrap();

        assert_eq!(dataset.input, input);
        assert_eq!(dataset.labels, labels);
        assert_eq!(dataset.metadata, Some(metadata()));
        assert_eq!(dataset.class_counts(), vec![1, 0, 1]);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_zero_rows_still_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("valid.safetensors");
        write_dataset(
            &path,
            &Array4::zeros((0, 4, 2, 3)),
            &Array2::zeros((0, 3)),
            metadata(),
        )
        .unwrap();

        let dataset = read_dataset(&path).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.input.dim(), (0, 4, 2, 3));
        assert_eq!(dataset.labels.dim(), (0, 3));
    }

    #[test]
    fn test_existing_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.safetensors");
        fs::write(&path, b"stale").unwrap();

        write_dataset(
            &path,
            &Array4::ones((1, 4, 2, 3)),
            &Array2::ones((1, 3)),
            metadata(),
        )
        .unwrap();
        assert_eq!(read_dataset(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let err = write_dataset(
            &dir.path().join("bad.safetensors"),
            &Array4::zeros((2, 4, 2, 3)),
            &Array2::zeros((1, 3)),
            metadata(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Dataset { .. }));
    }

    #[test]
    fn test_garbage_file_is_dataset_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.safetensors");
        fs::write(&path, b"definitely not safetensors").unwrap();
        assert!(matches!(
            read_dataset(&path).unwrap_err(),
            PipelineError::Dataset { .. }
        ));
    }
}
