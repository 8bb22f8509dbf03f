//! In-memory implementations of the source and destination contracts.
//!
//! Useful for testing, and for callers which already hold the whole volume in memory.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use log::debug;
use time::OffsetDateTime;

use crate::buffer::BlockBuffer;
use crate::dims::{BlockIndex, DimensionSequence, ImageSize};
use crate::grid::{BlockGrid, Region};
use crate::metadata::{ColorInfo, ImageExtents, Parameters};
use crate::progress::ProgressCallback;
use crate::sample::SampleType;
use crate::source::{SourceHeader, SourceReader};
use crate::writer::{BlockWriter, WriterConfig, WriterFactory};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("{0}")]
    Injected(String),
    #[error(transparent)]
    Buffer(#[from] crate::Error),
    #[error("writer has already been finished")]
    Finished,
}

/// A whole volume held in memory, served region by region.
///
/// The path passed to the reader methods is ignored.
#[derive(Debug, Clone)]
pub struct MemorySource {
    image: BlockBuffer,
    data_type: String,
    header_error: Option<String>,
    failing_regions: Vec<ImageSize>,
}

impl MemorySource {
    pub fn new(
        image_size: ImageSize,
        sample_type: SampleType,
        layout: DimensionSequence,
        data: impl Into<Bytes>,
    ) -> crate::Result<Self> {
        Ok(Self::from_buffer(BlockBuffer::new(
            image_size,
            sample_type,
            layout,
            data,
        )?))
    }

    pub fn from_buffer(image: BlockBuffer) -> Self {
        Self {
            data_type: image.sample_type().name().to_owned(),
            image,
            header_error: None,
            failing_regions: Vec::new(),
        }
    }

    /// Report a different data type name in the header.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Fail every header read with the given message.
    pub fn with_header_error(mut self, message: impl Into<String>) -> Self {
        self.header_error = Some(message.into());
        self
    }

    /// Fail reads of any region starting at `min`.
    pub fn with_failing_region(mut self, min: ImageSize) -> Self {
        self.failing_regions.push(min);
        self
    }

    pub fn image(&self) -> &BlockBuffer {
        &self.image
    }

    pub fn data(&self) -> &Bytes {
        self.image.data()
    }

    pub fn sample(&self, index: &ImageSize) -> Option<&[u8]> {
        self.image.sample(index)
    }
}

impl SourceReader for MemorySource {
    type Error = MemoryError;

    fn read_header(&self, _path: &Path) -> Result<SourceHeader, Self::Error> {
        if let Some(msg) = &self.header_error {
            return Err(MemoryError::Injected(msg.clone()));
        }
        Ok(SourceHeader {
            image_size: self.image.shape(),
            data_type: self.data_type.clone(),
        })
    }

    fn read_region(&self, _path: &Path, region: &Region) -> Result<BlockBuffer, Self::Error> {
        if self.failing_regions.contains(&region.min) {
            return Err(MemoryError::Injected(format!(
                "region at {} is unreadable",
                region.min
            )));
        }
        Ok(self.image.crop(region.min, region.shape())?)
    }
}

/// A block as received by a [MemoryWriter].
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedBlock {
    pub index: BlockIndex,
    pub block: BlockBuffer,
}

/// Arguments received by [BlockWriter::finish].
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedImage {
    pub extents: ImageExtents,
    pub parameters: Parameters,
    pub time_infos: Vec<OffsetDateTime>,
    pub color_infos: Vec<ColorInfo>,
    pub adjust_color_range: bool,
}

/// Everything a [MemoryWriter] has received.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    pub config: Option<WriterConfig>,
    pub blocks: Vec<CopiedBlock>,
    pub finished: Option<FinishedImage>,
    pub destroyed: bool,
    pub progress: Vec<(f32, u64)>,
}

impl MemoryRecord {
    /// Reassemble the written blocks into a single image, cropping away padding.
    ///
    /// Returns None before the writer has been configured.
    pub fn assemble(&self) -> Option<crate::Result<BlockBuffer>> {
        let config = self.config.as_ref()?;
        Some(assemble(config, &self.blocks))
    }
}

fn assemble(config: &WriterConfig, blocks: &[CopiedBlock]) -> crate::Result<BlockBuffer> {
    let grid = BlockGrid::new(config.image_size, config.block_size)?;
    let mut image = BlockBuffer::zeros(
        config.image_size,
        config.sample_type,
        config.dimension_sequence,
    );
    for b in blocks {
        let region = grid.region(&b.index)?;
        let part = b.block.crop(ImageSize::default(), region.shape())?;
        image.insert(region.min, &part)?;
    }
    Ok(image)
}

/// Shared view of what a [MemoryWriter] received, readable after the conversion run.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput(Arc<Mutex<MemoryRecord>>);

impl MemoryOutput {
    pub fn record(&self) -> MutexGuard<'_, MemoryRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates [MemoryWriter]s which all report into the same [MemoryOutput].
#[derive(Debug, Clone, Default)]
pub struct MemoryWriterFactory {
    output: MemoryOutput,
    existing: HashSet<BlockIndex>,
    fail_open: Option<String>,
    fail_copy_at: Option<BlockIndex>,
    fail_finish: Option<String>,
}

impl MemoryWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> MemoryOutput {
        self.output.clone()
    }

    /// Treat the given blocks as already written, so they are not requested again.
    pub fn with_existing_blocks(mut self, blocks: impl IntoIterator<Item = BlockIndex>) -> Self {
        self.existing.extend(blocks);
        self
    }

    pub fn with_open_error(mut self, message: impl Into<String>) -> Self {
        self.fail_open = Some(message.into());
        self
    }

    pub fn with_copy_error_at(mut self, index: BlockIndex) -> Self {
        self.fail_copy_at = Some(index);
        self
    }

    pub fn with_finish_error(mut self, message: impl Into<String>) -> Self {
        self.fail_finish = Some(message.into());
        self
    }
}

impl WriterFactory for MemoryWriterFactory {
    type Writer = MemoryWriter;

    fn create(
        &self,
        config: WriterConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<MemoryWriter, MemoryError> {
        if let Some(msg) = &self.fail_open {
            return Err(MemoryError::Injected(msg.clone()));
        }
        let grid = BlockGrid::new(config.image_size, config.block_size)?;
        debug!(
            "memory writer opened for {} with {} blocks",
            config.output_path.display(),
            grid.len()
        );
        self.output.record().config = Some(config);
        Ok(MemoryWriter {
            output: self.output.clone(),
            existing: self.existing.clone(),
            fail_copy_at: self.fail_copy_at,
            fail_finish: self.fail_finish.clone(),
            total_blocks: grid.len(),
            copied: 0,
            bytes_written: 0,
            progress,
            finished: false,
        })
    }
}

/// Destination which records every call into a [MemoryOutput].
pub struct MemoryWriter {
    output: MemoryOutput,
    existing: HashSet<BlockIndex>,
    fail_copy_at: Option<BlockIndex>,
    fail_finish: Option<String>,
    total_blocks: u64,
    copied: u64,
    bytes_written: u64,
    progress: Option<ProgressCallback>,
    finished: bool,
}

impl MemoryWriter {
    fn report_progress(&mut self) {
        let fraction = if self.total_blocks == 0 {
            1.0
        } else {
            (self.copied + self.existing.len() as u64) as f32 / self.total_blocks as f32
        };
        let fraction = fraction.min(1.0);
        self.output
            .record()
            .progress
            .push((fraction, self.bytes_written));
        if let Some(cb) = self.progress.as_mut() {
            cb(fraction, self.bytes_written);
        }
    }
}

impl BlockWriter for MemoryWriter {
    type Error = MemoryError;

    fn need_copy_block(&mut self, index: &BlockIndex) -> bool {
        !self.existing.contains(index)
    }

    fn copy_block(&mut self, block: BlockBuffer, index: &BlockIndex) -> Result<(), Self::Error> {
        if self.finished {
            return Err(MemoryError::Finished);
        }
        if self.fail_copy_at == Some(*index) {
            return Err(MemoryError::Injected(format!("block {index} rejected")));
        }
        self.copied += 1;
        self.bytes_written += block.data().len() as u64;
        self.output.record().blocks.push(CopiedBlock {
            index: *index,
            block,
        });
        self.report_progress();
        Ok(())
    }

    fn finish(
        &mut self,
        extents: ImageExtents,
        parameters: Parameters,
        time_infos: Vec<OffsetDateTime>,
        color_infos: Vec<ColorInfo>,
        adjust_color_range: bool,
    ) -> Result<(), Self::Error> {
        if let Some(msg) = &self.fail_finish {
            return Err(MemoryError::Injected(msg.clone()));
        }
        if self.finished {
            return Err(MemoryError::Finished);
        }
        self.finished = true;
        self.output.record().finished = Some(FinishedImage {
            extents,
            parameters,
            time_infos,
            color_infos,
            adjust_color_range,
        });
        Ok(())
    }

    fn destroy(self) -> Result<(), Self::Error> {
        self.output.record().destroyed = true;
        Ok(())
    }
}
