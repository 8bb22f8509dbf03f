use klb2ims::memory::{MemorySource, MemoryWriterFactory};
use klb2ims::sample::SampleType;
use klb2ims::{ConvertOptions, DimensionSequence, ImageSize, convert};

fn source() -> MemorySource {
    env_logger::try_init().ok();
    MemorySource::new(
        ImageSize::new(1, 1, 1, 2, 2),
        SampleType::Uint8,
        DimensionSequence::XYZTC,
        vec![1u8, 2, 3, 4],
    )
    .expect("valid source")
}

#[test]
fn missing_parent_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("deeper").join("out");
    let factory = MemoryWriterFactory::new();
    let output = factory.output();

    let report = convert(source(), factory, "in.klb", &dest, ConvertOptions::default(), None).unwrap();

    assert_eq!(report.destination, dest.with_extension("ims"));
    assert!(dir.path().join("nested").join("deeper").is_dir());
    let record = output.record();
    assert_eq!(
        record.config.as_ref().unwrap().output_path,
        dir.path().join("nested/deeper/out.ims")
    );
}

#[test]
fn existing_extension_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.ims");
    let report = convert(
        source(),
        MemoryWriterFactory::new(),
        "in.klb",
        &dest,
        ConvertOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(report.destination, dest);
}

#[test]
fn uncreatable_parent_is_a_writer_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let dest = blocker.join("out");

    let err = convert(
        source(),
        MemoryWriterFactory::new(),
        "in.klb",
        &dest,
        ConvertOptions::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, klb2ims::Error::WriterOpen(_)));
}
