//! Contract for the reader of the source volume.
//!
//! Decoding KLB files is left to an external implementation of [SourceReader].

use std::path::Path;

use crate::buffer::BlockBuffer;
use crate::dims::ImageSize;
use crate::grid::Region;

/// What the source header reports about the volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHeader {
    /// Extent along each axis.
    /// KLB headers store this as `tczyx`; see [ImageSize::from_tczyx].
    pub image_size: ImageSize,
    /// Native sample type name, e.g. `"uint16"`.
    pub data_type: String,
}

/// Random-access reader of a chunked source volume.
pub trait SourceReader {
    type Error: std::error::Error + Send + Sync + 'static;

    fn read_header(&self, path: &Path) -> Result<SourceHeader, Self::Error>;

    /// Read the samples within the inclusive `region`.
    ///
    /// The returned buffer has the region's shape, in whichever layout the reader prefers.
    fn read_region(&self, path: &Path, region: &Region) -> Result<BlockBuffer, Self::Error>;
}

impl<R: SourceReader + ?Sized> SourceReader for &R {
    type Error = R::Error;

    fn read_header(&self, path: &Path) -> Result<SourceHeader, Self::Error> {
        (**self).read_header(path)
    }

    fn read_region(&self, path: &Path, region: &Region) -> Result<BlockBuffer, Self::Error> {
        (**self).read_region(path, region)
    }
}
