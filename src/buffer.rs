//! Untyped 5D sample buffers, with zero padding and layout changes.

use bytes::{Bytes, BytesMut};

use crate::dims::{Axis, DimensionSequence, ImageSize};
use crate::sample::SampleType;
use crate::Error;

/// Samples of one block, laid out according to a [DimensionSequence].
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBuffer {
    shape: ImageSize,
    sample_type: SampleType,
    layout: DimensionSequence,
    data: Bytes,
}

impl BlockBuffer {
    pub fn new(
        shape: ImageSize,
        sample_type: SampleType,
        layout: DimensionSequence,
        data: impl Into<Bytes>,
    ) -> crate::Result<Self> {
        let data = data.into();
        let expected = shape.volume() as usize * sample_type.size();
        if data.len() != expected {
            return Err(Error::general(format!(
                "buffer of shape {shape} and type {sample_type} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            shape,
            sample_type,
            layout,
            data,
        })
    }

    /// A buffer filled with zero-valued samples.
    pub fn zeros(shape: ImageSize, sample_type: SampleType, layout: DimensionSequence) -> Self {
        let len = shape.volume() as usize * sample_type.size();
        Self {
            shape,
            sample_type,
            layout,
            data: BytesMut::zeroed(len).freeze(),
        }
    }

    pub fn shape(&self) -> ImageSize {
        self.shape
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn layout(&self) -> DimensionSequence {
        self.layout
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Reinterpret the samples as another type of the same width.
    pub(crate) fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        debug_assert_eq!(sample_type.size(), self.sample_type.size());
        self.sample_type = sample_type;
        self
    }

    /// Bytes of the sample at the given position, if it lies within the buffer.
    pub fn sample(&self, index: &ImageSize) -> Option<&[u8]> {
        if !self.shape.contains(&(*index + ImageSize::splat(1))) {
            return None;
        }
        let size = self.sample_type.size();
        let offset = index.dot(&self.layout.strides(&self.shape)) as usize * size;
        Some(&self.data[offset..offset + size])
    }

    /// Copy the samples into a new buffer with the given memory layout.
    pub fn reorder(self, layout: DimensionSequence) -> Self {
        if layout == self.layout {
            return self;
        }
        let mut out = BytesMut::zeroed(self.data.len());
        copy_samples(
            &self.data,
            self.layout.strides(&self.shape),
            &mut out,
            layout.strides(&self.shape),
            self.shape,
            self.layout,
            self.sample_type.size(),
        );
        Self {
            shape: self.shape,
            sample_type: self.sample_type,
            layout,
            data: out.freeze(),
        }
    }

    /// Extend the trailing edge of each short axis with zero samples,
    /// leaving existing samples untouched.
    pub fn pad_to(self, shape: ImageSize) -> crate::Result<Self> {
        if self.shape == shape {
            return Ok(self);
        }
        if !shape.contains(&self.shape) {
            return Err(Error::invalid_argument(format!(
                "cannot pad buffer of shape {} to smaller shape {shape}",
                self.shape
            )));
        }
        let size = self.sample_type.size();
        let mut out = BytesMut::zeroed(shape.volume() as usize * size);
        copy_samples(
            &self.data,
            self.layout.strides(&self.shape),
            &mut out,
            self.layout.strides(&shape),
            self.shape,
            self.layout,
            size,
        );
        Ok(Self {
            shape,
            sample_type: self.sample_type,
            layout: self.layout,
            data: out.freeze(),
        })
    }

    /// Copy out the samples of the box starting at `origin` with the given shape.
    pub fn crop(&self, origin: ImageSize, shape: ImageSize) -> crate::Result<Self> {
        if !self.shape.contains(&(origin + shape)) {
            return Err(Error::invalid_argument(format!(
                "box of shape {shape} at {origin} exceeds buffer of shape {}",
                self.shape
            )));
        }
        let size = self.sample_type.size();
        let strides = self.layout.strides(&self.shape);
        let start = origin.dot(&strides) as usize * size;
        let mut out = BytesMut::zeroed(shape.volume() as usize * size);
        copy_samples(
            &self.data[start..],
            strides,
            &mut out,
            self.layout.strides(&shape),
            shape,
            self.layout,
            size,
        );
        Ok(Self {
            shape,
            sample_type: self.sample_type,
            layout: self.layout,
            data: out.freeze(),
        })
    }

    /// Overwrite the box starting at `origin` with the samples of `other`.
    pub fn insert(&mut self, origin: ImageSize, other: &BlockBuffer) -> crate::Result<()> {
        if !self.shape.contains(&(origin + other.shape)) {
            return Err(Error::invalid_argument(format!(
                "box of shape {} at {origin} exceeds buffer of shape {}",
                other.shape, self.shape
            )));
        }
        if other.sample_type != self.sample_type {
            return Err(Error::invalid_argument(format!(
                "cannot insert {} samples into a {} buffer",
                other.sample_type, self.sample_type
            )));
        }
        let other = other.clone().reorder(self.layout);
        let size = self.sample_type.size();
        let strides = self.layout.strides(&self.shape);
        let start = origin.dot(&strides) as usize * size;
        let mut out = BytesMut::from(self.data.as_ref());
        copy_samples(
            &other.data,
            self.layout.strides(&other.shape),
            &mut out[start..],
            strides,
            other.shape,
            self.layout,
            size,
        );
        self.data = out.freeze();
        Ok(())
    }
}

/// Copy every sample in `shape` between two strided buffers,
/// visiting axes in the given order.
///
/// Where the innermost axis is contiguous in both buffers, whole rows are copied at once.
fn copy_samples(
    src: &[u8],
    src_strides: ImageSize,
    dst: &mut [u8],
    dst_strides: ImageSize,
    shape: ImageSize,
    order: DimensionSequence,
    sample_size: usize,
) {
    if shape.volume() == 0 {
        return;
    }
    let axes = order.axes();
    let inner: Axis = axes[0];
    let run = if src_strides.get(inner) == 1 && dst_strides.get(inner) == 1 {
        shape.get(inner)
    } else {
        1
    };
    let run_bytes = run as usize * sample_size;

    let mut index = ImageSize::default();
    loop {
        let s = index.dot(&src_strides) as usize * sample_size;
        let d = index.dot(&dst_strides) as usize * sample_size;
        dst[d..d + run_bytes].copy_from_slice(&src[s..s + run_bytes]);

        let mut done = true;
        for (i, &a) in axes.iter().enumerate() {
            let step = if i == 0 { run } else { 1 };
            let next = index.get(a) + step;
            if next < shape.get(a) {
                index.set(a, next);
                done = false;
                break;
            }
            index.set(a, 0);
        }
        if done {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: ImageSize, layout: DimensionSequence) -> BlockBuffer {
        let data: Vec<u8> = (1..=shape.volume() as u8).collect();
        BlockBuffer::new(shape, SampleType::Uint8, layout, data).unwrap()
    }

    #[test]
    fn wrong_length_is_rejected() {
        let r = BlockBuffer::new(
            ImageSize::new(1, 1, 1, 2, 2),
            SampleType::Uint16,
            DimensionSequence::XYZCT,
            vec![0u8; 4],
        );
        assert!(r.is_err());
    }

    #[test]
    fn padding_keeps_samples_and_zero_fills() {
        let shape = ImageSize::new(1, 1, 2, 2, 3);
        let target = ImageSize::new(1, 1, 4, 3, 4);
        let buf = ramp(shape, DimensionSequence::XYZCT);
        let padded = buf.clone().pad_to(target).unwrap();

        assert_eq!(padded.shape(), target);
        assert_eq!(padded.data().len(), target.volume() as usize);
        for z in 0..4 {
            for y in 0..3 {
                for x in 0..4 {
                    let idx = ImageSize::new(0, 0, z, y, x);
                    let got = padded.sample(&idx).unwrap();
                    match buf.sample(&idx) {
                        Some(expected) => assert_eq!(got, expected),
                        None => assert_eq!(got, &[0]),
                    }
                }
            }
        }
    }

    #[test]
    fn padding_to_same_shape_is_identity() {
        let buf = ramp(ImageSize::new(1, 1, 2, 2, 2), DimensionSequence::XYZCT);
        assert_eq!(buf.clone().pad_to(buf.shape()).unwrap(), buf);
    }

    #[test]
    fn padding_to_smaller_shape_fails() {
        let buf = ramp(ImageSize::new(1, 1, 2, 2, 2), DimensionSequence::XYZCT);
        assert!(buf.pad_to(ImageSize::new(1, 1, 1, 2, 2)).is_err());
    }

    #[test]
    fn multi_byte_padding() {
        let shape = ImageSize::new(2, 1, 1, 1, 1);
        let buf = BlockBuffer::new(
            shape,
            SampleType::Uint16,
            DimensionSequence::XYZCT,
            vec![1u8, 2, 3, 4],
        )
        .unwrap();
        let padded = buf.pad_to(ImageSize::new(2, 1, 1, 1, 2)).unwrap();
        assert_eq!(padded.data().as_ref(), &[1, 2, 0, 0, 3, 4, 0, 0]);
    }

    #[test]
    fn crop_then_insert() {
        let shape = ImageSize::new(1, 2, 3, 4, 5);
        let buf = ramp(shape, DimensionSequence::XYZCT);
        let origin = ImageSize::new(0, 1, 1, 2, 3);
        let part = buf.crop(origin, ImageSize::new(1, 1, 2, 2, 2)).unwrap();
        assert_eq!(
            part.sample(&ImageSize::new(0, 0, 1, 1, 1)),
            buf.sample(&ImageSize::new(0, 1, 2, 3, 4))
        );
        assert!(buf.crop(origin, ImageSize::new(1, 1, 2, 2, 3)).is_err());

        let mut canvas = BlockBuffer::zeros(shape, SampleType::Uint8, DimensionSequence::XYZTC);
        canvas.insert(origin, &part).unwrap();
        assert_eq!(
            canvas.sample(&ImageSize::new(0, 1, 2, 3, 4)),
            buf.sample(&ImageSize::new(0, 1, 2, 3, 4))
        );
        assert_eq!(canvas.sample(&ImageSize::default()), Some(&[0u8][..]));
    }

    #[test]
    fn reorder_preserves_positions() {
        let shape = ImageSize::new(2, 3, 1, 2, 2);
        let buf = ramp(shape, DimensionSequence::XYZTC);
        let reordered = buf.clone().reorder(DimensionSequence::XYZCT);
        assert_eq!(reordered.layout(), DimensionSequence::XYZCT);
        assert_ne!(reordered.data(), buf.data());
        for c in 0..2 {
            for t in 0..3 {
                for y in 0..2 {
                    for x in 0..2 {
                        let idx = ImageSize::new(c, t, 0, y, x);
                        assert_eq!(reordered.sample(&idx), buf.sample(&idx));
                    }
                }
            }
        }
    }
}
