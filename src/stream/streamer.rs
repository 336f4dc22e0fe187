//! A sink streaming rows of named columns to a file.
//!
//! The first column is always `time`. Columns can be added or removed until the first row is appended;
//! after that the layout is frozen until the next reinit, so rows always match the header.
//!
//! Two formats are supported:
//! - `csv`: a header line with the column names, then one line per row, values with 10 significant digits
//! - `npy`: a structured numpy array with one little-endian `f8` field per column; the header is
//!   rewritten on every flush so the file is always readable
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::StreamSink;
use crate::error::SynapseError;

/// Number of buffered rows after which the streamer flushes to disk.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024;

/// Significant digits of the values written in CSV.
const CSV_PRECISION: usize = 10;

/// NPY magic string, followed by the major and minor format versions.
const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Output file format of a streamer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum StreamFormat {
    Csv,
    Npy,
}

impl StreamFormat {
    /// Infer the format from the extension of a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension()?.to_str()?.to_lowercase().as_str() {
            "csv" | "dat" | "txt" => Some(StreamFormat::Csv),
            "npy" => Some(StreamFormat::Npy),
            _ => None,
        }
    }
}

/// Configuration of a streamer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Path of the output file.
    pub outfile: PathBuf,
    /// Output format, inferred from the file extension if not set.
    pub format: Option<StreamFormat>,
    /// Number of buffered rows triggering a flush.
    pub flush_threshold: usize,
}

impl StreamerConfig {
    pub fn new<P: AsRef<Path>>(outfile: P) -> Self {
        StreamerConfig {
            outfile: outfile.as_ref().to_path_buf(),
            format: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }
}

/// Streams rows of named columns to a CSV or NPY file.
#[derive(Debug)]
pub struct Streamer {
    outfile: PathBuf,
    format: StreamFormat,
    flush_threshold: usize,
    /// Column names, starting with `time`.
    columns: Vec<String>,
    /// Rows appended but not yet written.
    buffer: Vec<Vec<f64>>,
    /// Number of rows written to the file since the last reinit.
    num_written: usize,
    writer: Option<BufWriter<File>>,
}

impl Streamer {
    /// Create a streamer. The output file is only created on reinit or on the first flush.
    /// Returns an error if the format is neither given nor inferable from the file extension.
    pub fn build(config: StreamerConfig) -> Result<Self, SynapseError> {
        let format = match config.format {
            Some(format) => format,
            None => StreamFormat::from_path(&config.outfile).ok_or_else(|| {
                SynapseError::InvalidParameter(format!(
                    "Cannot infer the stream format of {}",
                    config.outfile.display()
                ))
            })?,
        };

        Ok(Streamer {
            outfile: config.outfile,
            format,
            flush_threshold: config.flush_threshold.max(1),
            columns: vec!["time".to_string()],
            buffer: vec![],
            num_written: 0,
            writer: None,
        })
    }

    /// Returns the path of the output file.
    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Returns the column names, starting with `time`.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of rows appended since the last reinit.
    pub fn num_rows(&self) -> usize {
        self.num_written + self.buffer.len()
    }

    fn check_layout_open(&self) -> Result<(), SynapseError> {
        if self.num_rows() > 0 {
            return Err(SynapseError::InvalidOperation(
                "Columns cannot change once rows have been appended".to_string(),
            ));
        }
        Ok(())
    }

    /// Add a column at the end of the row.
    pub fn add_column(&mut self, name: &str) -> Result<(), SynapseError> {
        self.check_layout_open()?;
        if self.columns.iter().any(|column| column == name) {
            return Err(SynapseError::InvalidParameter(format!(
                "Column {} already exists",
                name
            )));
        }
        self.columns.push(name.to_string());
        if self.writer.is_some() {
            // the header has to be written again
            self.writer = None;
        }
        Ok(())
    }

    pub fn add_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), SynapseError> {
        names
            .iter()
            .try_for_each(|name| self.add_column(name.as_ref()))
    }

    /// Remove a column, keeping the order of the others. The `time` column cannot be removed.
    pub fn remove_column(&mut self, name: &str) -> Result<(), SynapseError> {
        self.check_layout_open()?;
        if name == "time" {
            return Err(SynapseError::InvalidOperation(
                "The time column cannot be removed".to_string(),
            ));
        }
        match self.columns.iter().position(|column| column == name) {
            Some(pos) => {
                self.columns.remove(pos);
                self.writer = None;
                Ok(())
            }
            None => {
                log::warn!("Column {} not found in streamer", name);
                Ok(())
            }
        }
    }

    /// Prepend the time to a sample.
    pub fn zip_with_time(values: &[f64], time: f64) -> Vec<f64> {
        std::iter::once(time).chain(values.iter().copied()).collect()
    }

    /// Create (or truncate) the output file and write the header. Pending rows are discarded.
    pub fn reinit(&mut self) -> Result<(), SynapseError> {
        self.buffer.clear();
        self.num_written = 0;
        self.open()
    }

    fn open(&mut self) -> Result<(), SynapseError> {
        let file = File::create(&self.outfile)?;
        let mut writer = BufWriter::new(file);
        match self.format {
            StreamFormat::Csv => writeln!(writer, "{}", self.columns.iter().join(","))?,
            StreamFormat::Npy => writer.write_all(&self.npy_header(self.num_written)?)?,
        }
        writer.flush()?;
        log::info!(
            "Streaming {} columns to {}",
            self.columns.len(),
            self.outfile.display()
        );
        self.writer = Some(writer);
        Ok(())
    }

    /// Write the buffered rows to the file.
    pub fn flush(&mut self) -> Result<(), SynapseError> {
        if self.writer.is_none() {
            self.open()?;
        }
        let num_rows = self.num_written + self.buffer.len();
        let header = match self.format {
            StreamFormat::Npy => Some(self.npy_header(num_rows)?),
            StreamFormat::Csv => None,
        };

        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                return Err(SynapseError::IOError(format!(
                    "Output file {} is not open",
                    self.outfile.display()
                )))
            }
        };

        for row in self.buffer.iter() {
            match self.format {
                StreamFormat::Csv => {
                    writeln!(writer, "{}", row.iter().map(|v| format_value(*v)).join(","))?
                }
                StreamFormat::Npy => {
                    for v in row {
                        writer.write_all(&v.to_le_bytes())?;
                    }
                }
            }
        }

        if let Some(header) = header {
            writer.seek(SeekFrom::Start(0))?;
            writer.write_all(&header)?;
            writer.seek(SeekFrom::End(0))?;
        }
        writer.flush()?;

        log::debug!(
            "Flushed {} rows to {}",
            self.buffer.len(),
            self.outfile.display()
        );
        self.num_written = num_rows;
        self.buffer.clear();
        Ok(())
    }

    /// NPY header for the given number of rows.
    /// Its length only depends on the columns, so it can be overwritten in place. Version 1.0 stores the
    /// header length on 2 bytes; wider layouts switch to version 2.0 and its 4-byte length.
    fn npy_header(&self, num_rows: usize) -> Result<Vec<u8>, SynapseError> {
        let descr = self
            .columns
            .iter()
            .map(|name| format!("('{}', '<f8')", name.replace('\'', "_")))
            .join(", ");
        let dict = format!(
            "{{'descr': [{}], 'fortran_order': False, 'shape': ({:<21}), }}",
            descr,
            format!("{},", num_rows)
        );

        let v1_len = padded_header_len(dict.len(), NPY_MAGIC.len() + 4);
        let mut header = NPY_MAGIC.to_vec();
        let header_len = if v1_len <= u16::MAX as usize {
            header.extend_from_slice(&[1, 0]);
            header.extend_from_slice(&(v1_len as u16).to_le_bytes());
            v1_len
        } else {
            let v2_len = padded_header_len(dict.len(), NPY_MAGIC.len() + 6);
            let len = u32::try_from(v2_len).map_err(|_| {
                SynapseError::InvalidOperation(format!(
                    "NPY header of {} columns is too large",
                    self.columns.len()
                ))
            })?;
            header.extend_from_slice(&[2, 0]);
            header.extend_from_slice(&len.to_le_bytes());
            v2_len
        };

        header.extend_from_slice(dict.as_bytes());
        header.resize(header.len() + header_len - dict.len() - 1, b' ');
        header.push(b'\n');
        Ok(header)
    }
}

/// Length of a header dict padded with spaces and a newline, such that the prefix (magic, version and
/// length field) plus the header is a multiple of 64 bytes.
fn padded_header_len(dict_len: usize, prefix_len: usize) -> usize {
    let unpadded = prefix_len + dict_len + 1;
    dict_len + 1 + (64 - unpadded % 64) % 64
}

impl StreamSink for Streamer {
    fn append_row(&mut self, values: &[f64]) -> Result<(), SynapseError> {
        if values.len() != self.columns.len() {
            return Err(SynapseError::IncompatibleRow {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.buffer.push(values.to_vec());
        if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            if let Err(e) = self.flush() {
                log::warn!("Failed to flush {}: {}", self.outfile.display(), e);
            }
        }
    }
}

/// Format a value with a fixed number of significant digits, without trailing zeros.
fn format_value(v: f64) -> String {
    let rounded = format!("{:.*e}", CSV_PRECISION - 1, v)
        .parse::<f64>()
        .unwrap_or(v);
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(StreamFormat::from_path("out.csv"), Some(StreamFormat::Csv));
        assert_eq!(StreamFormat::from_path("out.NPY"), Some(StreamFormat::Npy));
        assert_eq!(StreamFormat::from_path("out.h5"), None);
        assert_eq!(StreamFormat::from_path("out"), None);
        assert!(Streamer::build(StreamerConfig::new("out.h5")).is_err());
        assert!(Streamer::build(StreamerConfig::new("out.h5").with_format(StreamFormat::Csv)).is_ok());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.1), "0.1");
        assert_eq!(format_value(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_value(-2.0), "-2");
        assert_eq!(format_value(f64::NAN), "NaN");
    }

    #[test]
    fn test_columns() {
        let dir = tempdir().unwrap();
        let mut streamer = Streamer::build(StreamerConfig::new(dir.path().join("out.csv"))).unwrap();
        assert_eq!(streamer.columns(), &["time".to_string()]);

        streamer.add_columns(&["a", "b", "c"]).unwrap();
        assert!(streamer.add_column("a").is_err());
        streamer.remove_column("b").unwrap();
        streamer.remove_column("missing").unwrap();
        assert!(streamer.remove_column("time").is_err());
        assert_eq!(streamer.columns(), &["time", "a", "c"]);

        streamer.append_row(&[0.0, 1.0, 2.0]).unwrap();
        assert!(matches!(
            streamer.add_column("d"),
            Err(SynapseError::InvalidOperation(_))
        ));
        assert!(streamer.remove_column("a").is_err());
    }

    #[test]
    fn test_row_width() {
        let dir = tempdir().unwrap();
        let mut streamer = Streamer::build(StreamerConfig::new(dir.path().join("out.csv"))).unwrap();
        streamer.add_column("v").unwrap();
        assert_eq!(
            streamer.append_row(&[1.0]),
            Err(SynapseError::IncompatibleRow {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(streamer.num_rows(), 0);
    }

    #[test]
    fn test_zip_with_time() {
        assert_eq!(Streamer::zip_with_time(&[1.0, 2.0], 0.5), vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_csv_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut streamer = Streamer::build(StreamerConfig::new(&path)).unwrap();
        streamer.add_columns(&["syn.output", "syn.w0"]).unwrap();
        streamer.reinit().unwrap();
        streamer.append_row(&[0.001, 0.5, 0.25]).unwrap();
        streamer.append_row(&[0.002, 0.0, 1.0 / 3.0]).unwrap();
        streamer.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "time,syn.output,syn.w0\n0.001,0.5,0.25\n0.002,0,0.3333333333\n"
        );

        // reinit truncates the file
        streamer.reinit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "time,syn.output,syn.w0\n");
    }

    #[test]
    fn test_auto_flush_and_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let mut streamer =
                Streamer::build(StreamerConfig::new(&path).with_flush_threshold(2)).unwrap();
            streamer.add_column("v").unwrap();
            streamer.append_row(&[1.0, 1.0]).unwrap();
            assert!(!path.exists());
            streamer.append_row(&[2.0, 2.0]).unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
            streamer.append_row(&[3.0, 3.0]).unwrap();
        }
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "time,v\n1,1\n2,2\n3,3\n"
        );
    }

    #[test]
    fn test_npy_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.npy");
        let mut streamer = Streamer::build(StreamerConfig::new(&path)).unwrap();
        streamer.add_column("w").unwrap();
        streamer.reinit().unwrap();
        let header_len = fs::read(&path).unwrap().len();
        assert_eq!(header_len % 64, 0);

        streamer.append_row(&[0.5, 1.5]).unwrap();
        streamer.flush().unwrap();
        streamer.append_row(&[1.0, -2.0]).unwrap();
        streamer.flush().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], NPY_MAGIC);
        assert_eq!(&bytes[6..8], &[1u8, 0]);
        let dict_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!(10 + dict_len, header_len);
        let dict = std::str::from_utf8(&bytes[10..header_len]).unwrap();
        assert!(dict.starts_with("{'descr': [('time', '<f8'), ('w', '<f8')]"));
        assert!(dict.contains("'shape': (2,"));
        assert!(dict.ends_with('\n'));

        let data: Vec<f64> = bytes[header_len..]
            .chunks(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(data, vec![0.5, 1.5, 1.0, -2.0]);
    }

    #[test]
    fn test_npy_output_with_wide_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.npy");
        let mut streamer = Streamer::build(StreamerConfig::new(&path)).unwrap();
        let names: Vec<String> = (0..3000).map(|k| format!("dend.w{}", k)).collect();
        streamer.add_columns(&names).unwrap();
        streamer.reinit().unwrap();

        let row: Vec<f64> = (0..3001).map(|k| k as f64).collect();
        streamer.append_row(&row).unwrap();
        streamer.flush().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], NPY_MAGIC);
        assert_eq!(&bytes[6..8], &[2u8, 0]);
        let dict_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert!(dict_len > u16::MAX as usize);
        let header_len = 12 + dict_len;
        assert_eq!(header_len % 64, 0);

        let dict = std::str::from_utf8(&bytes[12..header_len]).unwrap();
        assert!(dict.starts_with("{'descr': [('time', '<f8'), ('dend.w0', '<f8')"));
        assert!(dict.contains("('dend.w2999', '<f8')], 'fortran_order': False, 'shape': (1,"));
        assert!(dict.ends_with('\n'));

        let data: Vec<f64> = bytes[header_len..]
            .chunks(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(data, row);
    }
}
