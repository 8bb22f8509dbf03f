//! Partitioning of an image into fixed-size blocks.

use crate::dims::{Axis, BlockIndex, ImageSize};
use crate::Error;

/// Inclusive bounds of a block in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min: ImageSize,
    pub max: ImageSize,
}

impl Region {
    /// Number of samples along each axis.
    pub fn shape(&self) -> ImageSize {
        self.max + ImageSize::splat(1) - self.min
    }
}

/// Regular grid of blocks covering an image.
///
/// The block size is clamped to the image size,
/// so that no block is larger than the image along any axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    image_size: ImageSize,
    block_size: ImageSize,
    num_blocks: ImageSize,
}

impl BlockGrid {
    /// Clamp the requested block size to the image and count the blocks along each axis.
    pub fn new(image_size: ImageSize, requested_block_size: ImageSize) -> crate::Result<Self> {
        if !image_size.is_valid() {
            return Err(Error::invalid_argument(format!(
                "image size {image_size} is empty along at least one axis"
            )));
        }
        let block_size = requested_block_size.min(image_size);
        let num_blocks = image_size.ceil_div(block_size)?;
        Ok(Self {
            image_size,
            block_size,
            num_blocks,
        })
    }

    /// A grid with one block spanning the whole image.
    pub fn single(image_size: ImageSize) -> crate::Result<Self> {
        Self::new(image_size, image_size)
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// The clamped block size.
    pub fn block_size(&self) -> ImageSize {
        self.block_size
    }

    pub fn num_blocks(&self) -> ImageSize {
        self.num_blocks
    }

    /// Total number of blocks.
    pub fn len(&self) -> u64 {
        self.num_blocks.volume()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every block index, channel outermost and x innermost.
    pub fn indices(&self) -> BlockIndices {
        BlockIndices {
            num_blocks: self.num_blocks,
            next: 0,
            len: self.len(),
        }
    }

    /// Source-space bounds of the given block, truncated at the image edge.
    pub fn region(&self, index: &BlockIndex) -> crate::Result<Region> {
        if !self.num_blocks.contains(&(*index + ImageSize::splat(1))) {
            return Err(Error::invalid_argument(format!(
                "block index {index} is outside the grid {}",
                self.num_blocks
            )));
        }
        let min = *index * self.block_size;
        let mut max = ImageSize::default();
        for a in Axis::CANONICAL {
            let end = (min.get(a) + self.block_size.get(a)).min(self.image_size.get(a));
            max.set(a, end - 1);
        }
        Ok(Region { min, max })
    }

    /// True if the block is cut short by the image edge along any axis.
    pub fn is_boundary(&self, index: &BlockIndex) -> bool {
        Axis::CANONICAL.into_iter().any(|a| {
            let end = (index.get(a) + 1) * self.block_size.get(a);
            end > self.image_size.get(a)
        })
    }
}

/// Lazy iterator over the block indices of a [BlockGrid].
#[derive(Debug, Clone)]
pub struct BlockIndices {
    num_blocks: ImageSize,
    next: u64,
    len: u64,
}

impl Iterator for BlockIndices {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let mut rest = self.next;
        let mut index = ImageSize::default();
        for a in Axis::CANONICAL.into_iter().rev() {
            let n = self.num_blocks.get(a);
            index.set(a, rest % n);
            rest /= n;
        }
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockIndices {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_clamped() {
        let grid = BlockGrid::new(
            ImageSize::new(1, 1, 10, 100, 100),
            ImageSize::new(4, 4, 4, 1000, 64),
        )
        .unwrap();
        assert_eq!(grid.block_size(), ImageSize::new(1, 1, 4, 100, 64));
        assert_eq!(grid.num_blocks(), ImageSize::new(1, 1, 3, 1, 2));
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn last_z_block_is_truncated() {
        let grid = BlockGrid::new(
            ImageSize::new(1, 1, 10, 100, 100),
            ImageSize::new(1, 1, 4, 100, 100),
        )
        .unwrap();
        assert_eq!(grid.num_blocks(), ImageSize::new(1, 1, 3, 1, 1));

        let region = grid.region(&ImageSize::new(0, 0, 2, 0, 0)).unwrap();
        assert_eq!(region.min, ImageSize::new(0, 0, 8, 0, 0));
        assert_eq!(region.max, ImageSize::new(0, 0, 9, 99, 99));
        assert_eq!(region.shape(), ImageSize::new(1, 1, 2, 100, 100));
        assert!(grid.is_boundary(&ImageSize::new(0, 0, 2, 0, 0)));
        assert!(!grid.is_boundary(&ImageSize::new(0, 0, 1, 0, 0)));
    }

    #[test]
    fn iteration_is_nested_and_repeatable() {
        let grid = BlockGrid::new(ImageSize::new(2, 1, 1, 3, 2), ImageSize::splat(1)).unwrap();
        let indices: Vec<_> = grid.indices().collect();
        assert_eq!(indices.len(), 12);
        assert_eq!(indices[0], ImageSize::new(0, 0, 0, 0, 0));
        assert_eq!(indices[1], ImageSize::new(0, 0, 0, 0, 1));
        assert_eq!(indices[2], ImageSize::new(0, 0, 0, 1, 0));
        assert_eq!(indices[6], ImageSize::new(1, 0, 0, 0, 0));
        assert_eq!(indices[11], ImageSize::new(1, 0, 0, 2, 1));
        assert_eq!(grid.indices().len(), 12);
        assert_eq!(indices, grid.indices().collect::<Vec<_>>());
    }

    #[test]
    fn covered_volume_bounds_image_volume() {
        let cases: [([u64; 5], [u64; 5]); 3] = [
            ([1, 1, 10, 100, 100], [1, 1, 4, 100, 100]),
            ([3, 2, 8, 64, 64], [1, 1, 4, 32, 32]),
            ([2, 5, 7, 13, 17], [2, 2, 3, 5, 4]),
        ];
        for (image, block) in cases {
            let grid = BlockGrid::new(image.into(), block.into()).unwrap();
            let covered = grid.len() * grid.block_size().volume();
            let image = ImageSize::from(image);
            let exact = image
                .checked_rem(grid.block_size())
                .unwrap()
                .to_array()
                .iter()
                .all(|&r| r == 0);
            assert!(covered >= image.volume());
            assert_eq!(covered == image.volume(), exact);
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(BlockGrid::single(ImageSize::new(1, 1, 0, 4, 4)).is_err());
        assert!(BlockGrid::new(ImageSize::splat(4), ImageSize::new(1, 1, 0, 1, 1)).is_err());
    }

    #[test]
    fn out_of_grid_region_is_rejected() {
        let grid = BlockGrid::single(ImageSize::splat(2)).unwrap();
        assert!(grid.region(&ImageSize::new(0, 0, 1, 0, 0)).is_err());
    }
}
