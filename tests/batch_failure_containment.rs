//! Batch runs keep going past bad items and never leave partial files

mod common;

use anime_stylize::{
    services::scratch::SCRATCH_PREFIX, BatchJob, BatchProcessor, ErrorKind, OutputFormat,
    ProcessorConfig,
};
use common::{test_weights, write_png, Network, TestFactory};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn leftover_scratch_dirs(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SCRATCH_PREFIX))
        })
        .collect()
}

fn inputs_with_broken(dir: &Path, count: usize, broken: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            if i == broken {
                let path = dir.join(format!("img_{i}.jpg"));
                fs::write(&path, b"this is not a jpeg").unwrap();
                path
            } else {
                write_png(dir, &format!("img_{i}.png"), 64 + i as u32 * 8, 48)
            }
        })
        .collect()
}

#[tokio::test]
async fn test_undecodable_item_does_not_stop_the_batch() {
    for concurrency in [1, 3] {
        let input_dir = TempDir::new().unwrap();
        let output_dir = TempDir::new().unwrap();
        let inputs = inputs_with_broken(input_dir.path(), 6, 2);
        let jobs = BatchJob::plan(&inputs, output_dir.path(), OutputFormat::Png);

        let batch = BatchProcessor::with_factory(
            ProcessorConfig::default(),
            concurrency,
            TestFactory::new(Network::Invert),
        );
        let outcome = batch.run_with_weights(test_weights(), jobs.clone()).await;

        assert_eq!(outcome.total(), 6);
        assert_eq!(outcome.succeeded.len(), 5);
        assert_eq!(outcome.failed.len(), 1);
        assert!(!outcome.is_complete());

        let failure = &outcome.failed[0];
        assert_eq!(failure.input, inputs[2]);
        assert_eq!(failure.kind, ErrorKind::ImageDecode);

        for (index, job) in jobs.iter().enumerate() {
            assert_eq!(job.output.exists(), index != 2, "{}", job.output.display());
        }
        let written: Vec<_> = outcome.succeeded.iter().map(|s| s.input.clone()).collect();
        let expected: Vec<_> = inputs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(written, expected);

        assert!(leftover_scratch_dirs(output_dir.path()).is_empty());
    }
}

#[tokio::test]
async fn test_outputs_decode_with_original_dimensions() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_png(input_dir.path(), "wide.png", 300, 70),
        write_png(input_dir.path(), "tall.png", 70, 300),
    ];
    let jobs = BatchJob::plan(&inputs, output_dir.path(), OutputFormat::Jpeg);

    let outcome = BatchProcessor::with_factory(
        ProcessorConfig::default(),
        2,
        TestFactory::new(Network::Identity),
    )
    .run_with_weights(test_weights(), jobs)
    .await;

    assert!(outcome.is_complete());
    for success in &outcome.succeeded {
        let decoded = image::open(&success.output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), success.dimensions);
        assert_eq!(success.output.extension().unwrap(), "jpg");
    }
    assert_eq!(outcome.succeeded[0].dimensions, (300, 70));
    assert_eq!(outcome.succeeded[1].dimensions, (70, 300));
}

#[tokio::test]
async fn test_inference_failures_leave_no_files() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_png(input_dir.path(), "a.png", 64, 64),
        write_png(input_dir.path(), "b.png", 64, 64),
    ];
    let jobs = BatchJob::plan(&inputs, output_dir.path(), OutputFormat::Png);

    let outcome = BatchProcessor::with_factory(
        ProcessorConfig::default(),
        2,
        TestFactory::new(Network::Broken),
    )
    .run_with_weights(test_weights(), jobs)
    .await;

    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 2);
    assert!(outcome.failed.iter().all(|f| f.kind == ErrorKind::Inference));
    assert_eq!(fs::read_dir(output_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_session_start_failure_fails_every_item() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_png(input_dir.path(), "a.png", 64, 64),
        write_png(input_dir.path(), "b.png", 64, 64),
        write_png(input_dir.path(), "c.png", 64, 64),
    ];
    let jobs = BatchJob::plan(&inputs, output_dir.path(), OutputFormat::Png);

    let factory = Arc::new(TestFactory {
        network: Network::Identity,
        fail_initialize: true,
    });
    let outcome = BatchProcessor::with_factory(ProcessorConfig::default(), 2, factory)
        .run_with_weights(test_weights(), jobs)
        .await;

    assert_eq!(outcome.failed.len(), 3);
    assert!(outcome.failed.iter().all(|f| f.kind == ErrorKind::ModelLoad));
    assert_eq!(fs::read_dir(output_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_weights_fail_before_any_job() {
    let output_dir = TempDir::new().unwrap();
    let config = ProcessorConfig::builder()
        .weights_path(output_dir.path().join("missing.onnx"))
        .build()
        .unwrap();
    let jobs = vec![BatchJob::new("a.png", output_dir.path().join("a.png"))];

    let err = BatchProcessor::with_factory(config, 1, TestFactory::new(Network::Identity))
        .run(jobs)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelLoad);
}

#[tokio::test]
async fn test_report_lists_every_item() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let inputs = inputs_with_broken(input_dir.path(), 3, 0);
    let jobs = BatchJob::plan(&inputs, output_dir.path(), OutputFormat::Png);

    let outcome = BatchProcessor::with_factory(
        ProcessorConfig::default(),
        1,
        TestFactory::new(Network::Identity),
    )
    .run_with_weights(test_weights(), jobs)
    .await;

    let report = output_dir.path().join("report.json");
    outcome.write_report(&report).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&fs::read(&report).unwrap()).unwrap();
    assert_eq!(json["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(json["failed"][0]["kind"], "ImageDecode");
}
