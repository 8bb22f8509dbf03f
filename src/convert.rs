//! Drives a whole conversion: header, block grid, block copy loop and finalization.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::dims::{DimensionSequence, ImageSize};
use crate::grid::BlockGrid;
use crate::loader::BlockLoader;
use crate::metadata::{Color, ImageExtents, Parameters, channel_colors};
use crate::progress::{ProgressCallback, ProgressLogger};
use crate::sample::SampleType;
use crate::source::SourceReader;
use crate::writer::{BlockWriter, WriterConfig, WriterFactory, WriterOptions};
use crate::Error;

/// Extension of the destination file.
pub const DESTINATION_EXTENSION: &str = "ims";

/// Layout of every block submitted to the destination.
pub const DESTINATION_SEQUENCE: DimensionSequence = DimensionSequence::XYZCT;

/// Configuration of a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    /// Image title; defaults to the source file stem.
    pub title: Option<String>,
    /// Color applied to every channel, replacing the per-channel-count defaults.
    pub default_color: Option<Color>,
    /// Requested block size; defaults to the whole image.
    /// Clamped to the image size along every axis.
    pub block_size: Option<ImageSize>,
    /// Declare samples as this type instead of the source's own.
    /// Must have the same width as the source type.
    pub sample_type: Option<SampleType>,
    /// Record the image size in MB in the destination parameters.
    pub record_size_metadata: bool,
    /// Let the destination adjust display ranges to the data.
    pub adjust_color_range: bool,
    pub writer: WriterOptions,
    pub application_name: String,
    pub application_version: String,
    /// Fixed timestamp for every time point; defaults to the time of finalization.
    pub timestamp: Option<OffsetDateTime>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            title: None,
            default_color: None,
            block_size: None,
            sample_type: None,
            record_size_metadata: true,
            adjust_color_range: true,
            writer: WriterOptions::default(),
            application_name: env!("CARGO_PKG_NAME").to_owned(),
            application_version: env!("CARGO_PKG_VERSION").to_owned(),
            timestamp: None,
        }
    }
}

impl ConvertOptions {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_default_color(mut self, color: Color) -> Self {
        self.default_color = Some(color);
        self
    }

    pub fn with_block_size(mut self, block_size: ImageSize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = Some(sample_type);
        self
    }

    pub fn with_size_metadata(mut self, record: bool) -> Self {
        self.record_size_metadata = record;
        self
    }

    pub fn with_adjust_color_range(mut self, adjust: bool) -> Self {
        self.adjust_color_range = adjust;
        self
    }

    pub fn with_writer_options(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Append the destination extension unless the path already has it.
pub fn destination_path(path: &Path) -> PathBuf {
    let has_ext = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(DESTINATION_EXTENSION));
    if has_ext {
        return path.to_path_buf();
    }
    let mut s = OsString::from(path.as_os_str());
    s.push(".");
    s.push(DESTINATION_EXTENSION);
    PathBuf::from(s)
}

/// Progress of a [ConversionDriver] through a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    HeaderRead,
    WriterOpened,
    Iterating,
    Finalizing,
    Done,
    Failed,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub destination: PathBuf,
    pub grid: BlockGrid,
    pub sample_type: SampleType,
    pub blocks_copied: u64,
    pub blocks_skipped: u64,
    pub bytes_copied: u64,
}

/// What the header told us, resolved against the options.
struct Plan {
    grid: BlockGrid,
    source_type: SampleType,
    sample_type: SampleType,
}

/// Converts one source volume into one destination container.
///
/// Blocks are submitted one at a time, in [BlockGrid::indices] order.
/// The writer is destroyed on every exit path once it has been opened.
pub struct ConversionDriver<R, F> {
    reader: R,
    factory: F,
    source: PathBuf,
    destination: PathBuf,
    options: ConvertOptions,
    progress: Option<ProgressCallback>,
    state: DriverState,
}

impl<R: SourceReader, F: WriterFactory> ConversionDriver<R, F> {
    pub fn new(
        reader: R,
        factory: F,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Self {
        Self {
            reader,
            factory,
            source: source.as_ref().to_path_buf(),
            destination: destination_path(destination.as_ref()),
            options: ConvertOptions::default(),
            progress: None,
            state: DriverState::Init,
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default callback, which logs every 5 percentage points.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The destination path, with its extension appended if it was missing.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn transition(&mut self, state: DriverState) {
        debug!("conversion state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run the conversion to completion.
    ///
    /// A driver can only be run once.
    pub fn run(&mut self) -> crate::Result<ConversionReport> {
        if self.state != DriverState::Init {
            return Err(Error::general(format!(
                "conversion cannot be started from state {:?}",
                self.state
            )));
        }
        info!(
            "converting {} to {}",
            self.source.display(),
            self.destination.display()
        );
        match self.run_inner() {
            Ok(report) => {
                self.transition(DriverState::Done);
                info!(
                    "wrote {} blocks ({} skipped) to {}",
                    report.blocks_copied,
                    report.blocks_skipped,
                    report.destination.display()
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(DriverState::Failed);
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> crate::Result<ConversionReport> {
        let plan = self.read_header()?;
        self.transition(DriverState::HeaderRead);

        let mut writer = self.open_writer(&plan)?;
        self.transition(DriverState::WriterOpened);

        let result = self.write_blocks(&mut writer, &plan);
        let result = result.and_then(|report| {
            self.transition(DriverState::Finalizing);
            self.finish(&mut writer, &plan)?;
            Ok(report)
        });

        match result {
            Ok(report) => {
                writer.destroy().map_err(Error::finalize)?;
                Ok(report)
            }
            Err(e) => {
                if let Err(d) = writer.destroy() {
                    warn!("destination writer could not be released: {d}");
                }
                Err(e)
            }
        }
    }

    fn read_header(&self) -> crate::Result<Plan> {
        let header = self
            .reader
            .read_header(&self.source)
            .map_err(Error::header)?;
        let source_type = header
            .data_type
            .parse::<SampleType>()
            .map_err(Error::header)?;
        if !header.image_size.is_valid() {
            return Err(Error::header(Error::general(format!(
                "source image size {} is empty along at least one axis",
                header.image_size
            ))));
        }

        let sample_type = match self.options.sample_type {
            Some(t) if t.size() != source_type.size() => {
                return Err(Error::invalid_argument(format!(
                    "cannot declare {source_type} samples as {t}"
                )));
            }
            Some(t) => t,
            None => source_type,
        };

        let image_size = header.image_size;
        let grid = BlockGrid::new(image_size, self.options.block_size.unwrap_or(image_size))?;
        debug!(
            "image {image_size} of {source_type}, blocks of {} in a grid of {}",
            grid.block_size(),
            grid.num_blocks()
        );
        Ok(Plan {
            grid,
            source_type,
            sample_type,
        })
    }

    fn open_writer(&mut self, plan: &Plan) -> crate::Result<F::Writer> {
        self.options.writer.validate()?;
        if let Some(parent) = self.destination.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(Error::writer_open)?;
        }
        let config = WriterConfig {
            sample_type: plan.sample_type,
            image_size: plan.grid.image_size(),
            sample_size: ImageSize::splat(1),
            dimension_sequence: DESTINATION_SEQUENCE,
            block_size: plan.grid.block_size(),
            output_path: self.destination.clone(),
            options: self.options.writer.clone(),
            application_name: self.options.application_name.clone(),
            application_version: self.options.application_version.clone(),
        };
        let progress = self
            .progress
            .take()
            .unwrap_or_else(|| ProgressLogger::default().into_callback());
        self.factory
            .create(config, Some(progress))
            .map_err(Error::writer_open)
    }

    fn write_blocks(
        &mut self,
        writer: &mut F::Writer,
        plan: &Plan,
    ) -> crate::Result<ConversionReport> {
        self.transition(DriverState::Iterating);
        let loader = BlockLoader::new(
            &self.reader,
            &self.source,
            &plan.grid,
            plan.sample_type,
            DESTINATION_SEQUENCE,
        );

        let mut blocks_copied = 0;
        let mut blocks_skipped = 0;
        let mut bytes_copied = 0;
        for index in plan.grid.indices() {
            if !writer.need_copy_block(&index) {
                debug!("block {index} already present, skipping");
                blocks_skipped += 1;
                continue;
            }
            let block = loader.load(&index)?;
            let n_bytes = block.data().len() as u64;
            writer
                .copy_block(block, &index)
                .map_err(|e| Error::copy(index, e))?;
            blocks_copied += 1;
            bytes_copied += n_bytes;
        }

        Ok(ConversionReport {
            destination: self.destination.clone(),
            grid: plan.grid,
            sample_type: plan.sample_type,
            blocks_copied,
            blocks_skipped,
            bytes_copied,
        })
    }

    fn title(&self) -> String {
        if let Some(t) = &self.options.title {
            return t.clone();
        }
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_owned())
    }

    fn finish(&self, writer: &mut F::Writer, plan: &Plan) -> crate::Result<()> {
        let image_size = plan.grid.image_size();
        let sample_size = ImageSize::splat(1);
        let timestamp = self
            .options
            .timestamp
            .unwrap_or_else(OffsetDateTime::now_utc);
        let title = self.title();

        let mut parameters = Parameters::new();
        parameters.set_value("Image", "Name", &title);
        parameters.set_value("Image", "Info", &title);
        let recording_date = timestamp
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(Error::finalize)?;
        parameters.set_value("Image", "RecordingDate", recording_date);
        if self.options.record_size_metadata {
            let n_bytes = image_size.volume() * plan.source_type.size() as u64;
            parameters.set_value("Image", "ImageSizeInMB", n_bytes.div_ceil(1024 * 1024));
        }
        for c in 0..image_size.c {
            parameters.set_channel_name(c, &format!("Channel {}", c + 1));
        }

        writer
            .finish(
                ImageExtents::from_image_size(&image_size, &sample_size),
                parameters,
                vec![timestamp; image_size.t as usize],
                channel_colors(image_size.c, self.options.default_color),
                self.options.adjust_color_range,
            )
            .map_err(Error::finalize)
    }
}

/// Convert the volume at `source` into a destination container at `destination`.
///
/// The destination gains the `.ims` extension if it is missing,
/// and its parent directories are created as needed.
pub fn convert<R: SourceReader, F: WriterFactory>(
    reader: R,
    factory: F,
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: ConvertOptions,
    progress: Option<ProgressCallback>,
) -> crate::Result<ConversionReport> {
    let mut driver =
        ConversionDriver::new(reader, factory, source, destination).with_options(options);
    if let Some(p) = progress {
        driver = driver.with_progress(p);
    }
    driver.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_appended_once() {
        assert_eq!(destination_path(Path::new("out/a")), Path::new("out/a.ims"));
        assert_eq!(
            destination_path(Path::new("out/a.ims")),
            Path::new("out/a.ims")
        );
        assert_eq!(
            destination_path(Path::new("out/a.IMS")),
            Path::new("out/a.IMS")
        );
        assert_eq!(
            destination_path(Path::new("out/a.klb")),
            Path::new("out/a.klb.ims")
        );
    }

    #[test]
    fn options_from_json() {
        let opts = ConvertOptions::from_json(
            r#"{
                "title": "embryo",
                "blockSize": {"c": 1, "t": 1, "z": 16, "y": 256, "x": 256},
                "sampleType": "uint16",
                "writer": {"compression": {"type": "lz4"}}
            }"#,
        )
        .unwrap();
        assert_eq!(opts.title.as_deref(), Some("embryo"));
        assert_eq!(opts.block_size, Some(ImageSize::new(1, 1, 16, 256, 256)));
        assert_eq!(opts.sample_type, Some(SampleType::Uint16));
        assert_eq!(opts.writer.compression, crate::writer::Compression::Lz4);
        assert!(opts.record_size_metadata);
        assert!(opts.adjust_color_range);
        assert_eq!(opts.application_name, "klb2ims");
    }
}
