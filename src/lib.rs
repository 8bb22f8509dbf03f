pub mod buffer;
pub mod convert;
pub mod dims;
mod error;
pub mod grid;
pub mod loader;
pub mod memory;
pub mod metadata;
pub mod progress;
pub mod sample;
pub mod source;
pub mod writer;

pub use convert::{ConversionDriver, ConversionReport, ConvertOptions, DriverState, convert};
pub use dims::{BlockIndex, DimensionSequence, ImageSize};
pub use error::{BoxError, Error, Result};
