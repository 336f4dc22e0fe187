//! Output of sampled values.
//!
//! A [`StreamSink`] receives one row of values per recording interval, the first value being the time.
//! The [`streamer::Streamer`] sink writes the rows to a CSV or NPY file.
//!
//! # Example
//!
//! ```rust
//! use rusty_synapse::stream::StreamSink;
//!
//! let mut rows: Vec<Vec<f64>> = vec![];
//! rows.append_row(&[0.1, 2.0]).unwrap();
//! assert_eq!(rows, vec![vec![0.1, 2.0]]);
//! ```
use crate::error::SynapseError;

pub mod streamer;

pub trait StreamSink {
    /// Append a row of values, the first one being the time.
    fn append_row(&mut self, values: &[f64]) -> Result<(), SynapseError>;
}

/// An in-memory sink keeping every row.
impl StreamSink for Vec<Vec<f64>> {
    fn append_row(&mut self, values: &[f64]) -> Result<(), SynapseError> {
        self.push(values.to_vec());
        Ok(())
    }
}
