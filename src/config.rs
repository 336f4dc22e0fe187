//! Handler configuration and JSON persistence of configuration structures.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SynapseError;
use crate::synapse::WeightBounds;
use crate::DEFAULT_HISTORY_CAPACITY;

/// Configuration of a synaptic handler, fixed between two reinits.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Name of the handler, used as prefix of the sampled columns.
    pub name: String,
    /// Number of recent events kept in the history of each synapse.
    pub history_capacity: usize,
    /// Bounds applied to the weights after every plastic update, if any.
    pub weight_bounds: Option<WeightBounds>,
    /// Number of ticks between two samples sent to the stream sink, if any.
    pub sample_interval: Option<u64>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            name: "syn".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            weight_bounds: None,
            sample_interval: None,
        }
    }
}

impl HandlerConfig {
    pub fn new(name: &str) -> Self {
        HandlerConfig {
            name: name.to_string(),
            ..HandlerConfig::default()
        }
    }

    pub fn with_weight_bounds(mut self, min: f64, max: f64) -> Self {
        self.weight_bounds = Some(WeightBounds { min, max });
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_sample_interval(mut self, interval: u64) -> Self {
        self.sample_interval = Some(interval);
        self
    }

    /// Check the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), SynapseError> {
        if let Some(bounds) = &self.weight_bounds {
            bounds.validate()?;
        }
        if self.sample_interval == Some(0) {
            return Err(SynapseError::InvalidParameter(
                "Sample interval must be at least one tick".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SynapseError> {
        save_json(self, path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SynapseError> {
        load_json(path)
    }
}

/// Write a value as pretty JSON to a file.
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), SynapseError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Read a value from a JSON file.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, SynapseError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
