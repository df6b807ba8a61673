//! Feature dataset assembly.
//!
//! Turns an augmented directory into a two-tensor container: `input` holds
//! the stacked features, `labels` the one-hot class vectors.

pub mod extract;
pub mod writer;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

pub use extract::{class_key, extract_features, ExtractionReport};
pub use writer::{read_dataset, write_dataset, DatasetMetadata, FeatureDataset};

/// Mapping from class key (filename prefix before the first `-`) to label index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    classes: BTreeMap<String, usize>,
}

impl ClassMap {
    /// Build a map whose indices cover `0..len` exactly once
    pub fn new(classes: BTreeMap<String, usize>) -> PipelineResult<Self> {
        if classes.is_empty() {
            return Err(PipelineError::config("class map is empty"));
        }
        let mut seen = vec![false; classes.len()];
        for (name, &index) in &classes {
            if name.is_empty() || name.contains('-') {
                return Err(PipelineError::config(format!(
                    "class name {:?} must be non-empty and contain no '-'",
                    name
                )));
            }
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(PipelineError::config(format!(
                        "class index {} is assigned more than once",
                        index
                    )))
                }
                None => {
                    return Err(PipelineError::config(format!(
                        "class index {} for {:?} is outside 0..{}",
                        index,
                        name,
                        classes.len()
                    )))
                }
            }
        }
        Ok(Self { classes })
    }

    /// Load a JSON object such as `{"yes": 0, "no": 1}`
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            PipelineError::config(format!("failed to read class map {}: {}", path.display(), err))
        })?;
        let classes: BTreeMap<String, usize> = serde_json::from_str(&contents).map_err(|err| {
            PipelineError::config(format!("failed to parse class map {}: {}", path.display(), err))
        })?;
        Self::new(classes)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.classes.get(key).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// One-hot vector for a class index
    pub fn one_hot(&self, index: usize) -> Vec<f32> {
        let mut label = vec![0.0; self.num_classes()];
        if let Some(slot) = label.get_mut(index) {
            *slot = 1.0;
        }
        label
    }
}
