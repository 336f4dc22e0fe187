//! Error module for the Rusty Synapse library.
use std::error::Error;
use std::fmt;

use crate::synapse::SynapseId;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SynapseError {
    /// Error for invalid delay values, e.g., negative or non-finite.
    InvalidDelay(f64),
    /// Error for invalid simulation time step, e.g., zero, negative or non-finite.
    InvalidTimeStep(f64),
    /// Error for invalid parameters, e.g., non-positive time constants.
    InvalidParameter(String),
    /// Error for weight bounds with min greater than max or non-finite limits.
    InvalidWeightBounds { min: f64, max: f64 },
    /// Error for an operation which is not allowed in the current state.
    InvalidOperation(String),
    /// Error for a synapse which does not belong to the handler.
    SynapseNotFound(SynapseId),
    /// Error for a sample row whose width does not match the registered columns.
    IncompatibleRow { expected: usize, found: usize },
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SynapseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SynapseError::InvalidDelay(d) => {
                write!(f, "Invalid delay value {}: must be finite and non-negative", d)
            }
            SynapseError::InvalidTimeStep(dt) => {
                write!(f, "Invalid time step {}: must be finite and positive", dt)
            }
            SynapseError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SynapseError::InvalidWeightBounds { min, max } => {
                write!(f, "Invalid weight bounds [{}, {}]", min, max)
            }
            SynapseError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            SynapseError::SynapseNotFound(id) => write!(f, "Synapse {} not found", id),
            SynapseError::IncompatibleRow { expected, found } => write!(
                f,
                "Incompatible row: expected {} values, found {}",
                expected, found
            ),
            SynapseError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SynapseError {}

impl From<std::io::Error> for SynapseError {
    fn from(e: std::io::Error) -> Self {
        SynapseError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SynapseError {
    fn from(e: serde_json::Error) -> Self {
        SynapseError::IOError(e.to_string())
    }
}
