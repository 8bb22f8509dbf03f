use std::path::Path;

use log::trace;

use crate::buffer::BlockBuffer;
use crate::dims::{BlockIndex, DimensionSequence};
use crate::grid::BlockGrid;
use crate::sample::SampleType;
use crate::source::SourceReader;
use crate::Error;

/// Reads blocks from a source and shapes them for the destination.
///
/// Every buffer returned has exactly the grid's block size,
/// the requested layout and the requested sample type.
pub struct BlockLoader<'a, R> {
    reader: &'a R,
    path: &'a Path,
    grid: &'a BlockGrid,
    sample_type: SampleType,
    layout: DimensionSequence,
}

impl<'a, R: SourceReader> BlockLoader<'a, R> {
    pub fn new(
        reader: &'a R,
        path: &'a Path,
        grid: &'a BlockGrid,
        sample_type: SampleType,
        layout: DimensionSequence,
    ) -> Self {
        Self {
            reader,
            path,
            grid,
            sample_type,
            layout,
        }
    }

    /// Read the region covered by `index`, zero-padding boundary blocks up to the block size.
    pub fn load(&self, index: &BlockIndex) -> crate::Result<BlockBuffer> {
        let index = *index;
        let region = self.grid.region(&index).map_err(|e| Error::read(index, e))?;
        let buffer = self
            .reader
            .read_region(self.path, &region)
            .map_err(|e| Error::read(index, e))?;

        if buffer.shape() != region.shape() {
            return Err(Error::read(
                index,
                Error::general(format!(
                    "source returned shape {}, expected {}",
                    buffer.shape(),
                    region.shape()
                )),
            ));
        }
        if buffer.sample_type().size() != self.sample_type.size() {
            return Err(Error::read(
                index,
                Error::general(format!(
                    "source returned {} samples, expected {}",
                    buffer.sample_type(),
                    self.sample_type
                )),
            ));
        }

        let buffer = buffer
            .with_sample_type(self.sample_type)
            .reorder(self.layout);
        let block_size = self.grid.block_size();
        if buffer.shape() == block_size {
            return Ok(buffer);
        }
        trace!(
            "padding block {index} from {} to {block_size}",
            buffer.shape()
        );
        buffer.pad_to(block_size).map_err(|e| Error::read(index, e))
    }
}
