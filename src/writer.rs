//! Contract for the destination container writer.
//!
//! Encoding Imaris files is left to an external implementation of [BlockWriter].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::buffer::BlockBuffer;
use crate::dims::{BlockIndex, DimensionSequence, ImageSize};
use crate::metadata::{ColorInfo, ImageExtents, Parameters};
use crate::progress::ProgressCallback;
use crate::sample::SampleType;
use crate::Error;

/// Block compression used by the destination.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Compression {
    /// Uncompressed.
    None,
    Gzip {
        /// Default 2. Must be in the range 1..=9.
        #[serde(default = "default_gzip_level")]
        level: u8,
    },
    /// Byte shuffle followed by gzip.
    ShuffleGzip {
        /// Default 2. Must be in the range 1..=9.
        #[serde(default = "default_gzip_level")]
        level: u8,
    },
    Lz4,
    /// Byte shuffle followed by LZ4.
    ShuffleLz4,
}

fn default_gzip_level() -> u8 {
    2
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Gzip {
            level: default_gzip_level(),
        }
    }
}

impl Compression {
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Compression::Gzip { level } | Compression::ShuffleGzip { level }
                if !(1..=9).contains(level) =>
            {
                Err(Error::invalid_argument(format!(
                    "invalid gzip compression level {level}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Options passed through to the destination writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterOptions {
    /// Worker threads the writer may use internally. Default 1.
    #[serde(default = "default_number_of_threads")]
    pub number_of_threads: usize,
    #[serde(default)]
    pub compression: Compression,
    /// Default true.
    #[serde(default = "default_enable_log_progress")]
    pub enable_log_progress: bool,
}

fn default_number_of_threads() -> usize {
    1
}

fn default_enable_log_progress() -> bool {
    true
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            number_of_threads: default_number_of_threads(),
            compression: Compression::default(),
            enable_log_progress: default_enable_log_progress(),
        }
    }
}

impl WriterOptions {
    pub fn validate(&self) -> crate::Result<()> {
        if self.number_of_threads == 0 {
            return Err(Error::invalid_argument("number of threads must be at least 1"));
        }
        self.compression.validate()
    }
}

/// Everything the destination needs to know before the first block arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    pub sample_type: SampleType,
    pub image_size: ImageSize,
    /// Physical size of one sample along each axis.
    pub sample_size: ImageSize,
    /// Memory layout of every block handed to [BlockWriter::copy_block].
    pub dimension_sequence: DimensionSequence,
    pub block_size: ImageSize,
    pub output_path: PathBuf,
    pub options: WriterOptions,
    pub application_name: String,
    pub application_version: String,
}

/// Creates a writer for a single conversion run.
pub trait WriterFactory {
    type Writer: BlockWriter;

    fn create(
        &self,
        config: WriterConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<Self::Writer, <Self::Writer as BlockWriter>::Error>;
}

/// Sink for fixed-size blocks of a chunked destination container.
pub trait BlockWriter {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the block still needs data.
    ///
    /// Always true for a fresh destination;
    /// writers holding partial state may return false for blocks already stored.
    fn need_copy_block(&mut self, index: &BlockIndex) -> bool;

    /// Store one block; the buffer always has the configured block size.
    fn copy_block(&mut self, block: BlockBuffer, index: &BlockIndex) -> Result<(), Self::Error>;

    fn finish(
        &mut self,
        extents: ImageExtents,
        parameters: Parameters,
        time_infos: Vec<OffsetDateTime>,
        color_infos: Vec<ColorInfo>,
        adjust_color_range: bool,
    ) -> Result<(), Self::Error>;

    /// Release the writer's resources.
    fn destroy(self) -> Result<(), Self::Error>;
}
