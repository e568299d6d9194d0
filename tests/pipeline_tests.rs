use serde_json::Value;
use serial_test::serial;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tomatempo::constants::LOGGING_CONFIG_FILE;
use tomatempo::logging::*;
use tomatempo::settings::{LogLevel, Settings};

fn read_json_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("log file should exist")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be one JSON object"))
        .collect()
}

fn detached_settings() -> Settings {
    let mut settings = Settings::default();
    settings.ensure_dirs = false;
    settings
}

/// Default wiring, but writing into `dir` instead of the platform log directory
fn config_in(dir: &Path) -> LoggingConfig {
    let mut config = LoggingConfig::from_settings(&detached_settings()).unwrap();
    config.log_directory = dir.to_path_buf();
    config.root_severity = LogLevel::Debug;
    config
}

#[test]
#[serial]
fn test_records_enqueued_before_stop_reach_the_file() {
    let dir = TempDir::new().unwrap();
    let log_file = dir.path().join("log_test.jsonl");
    let handler = Handler::file(&log_file, JsonFormatter::default()).unwrap();
    let pipeline = LoggingPipeline::with_handlers(vec![handler], 1024, OverflowPolicy::Block).unwrap();
    assert_eq!(pipeline.state(), WorkerState::Running);

    for index in 0..200 {
        pipeline
            .emit(LogRecord::new("test", LogLevel::Info, format!("record {index}")))
            .unwrap();
    }
    let sender = pipeline.sender();
    pipeline.shutdown();

    let records = read_json_lines(&log_file);
    assert_eq!(records.len(), 200);
    assert_eq!(records[0]["message"], "record 0");
    assert_eq!(records[199]["message"], "record 199");

    assert!(sender.is_closed());
    assert_eq!(
        sender.enqueue(LogRecord::new("test", LogLevel::Info, "too late")),
        Err(QueueClosed)
    );
}

#[test]
#[serial]
fn test_tracing_events_flow_through_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let stdout = MemoryBuffer::new();
    let stderr = MemoryBuffer::new();
    let handlers =
        default_handlers_with(Box::new(stdout.clone()), Box::new(stderr.clone()), &config.log_file_path()).unwrap();
    let pipeline = LoggingPipeline::with_handlers(handlers, 64, OverflowPolicy::Block).unwrap();

    tracing::subscriber::with_default(pipeline.subscriber(LogLevel::Debug), || {
        log::debug!(task = "write", "session planned");
        log::info!(pomodoros = 4, "session started");
        log::warn!("break skipped");
        log::error!(critical = true, "timer store unavailable");
    });
    pipeline.shutdown();

    assert_eq!(stdout.lines().len(), 2);
    assert_eq!(stderr.lines().len(), 2);
    assert!(stderr.lines()[1].contains("CRITICAL"));

    let records = read_json_lines(&config.log_file_path());
    let levels: Vec<&str> = records.iter().map(|r| r["level"].as_str().unwrap()).collect();
    assert_eq!(levels, vec!["DEBUG", "INFO", "WARNING", "CRITICAL"]);
    assert_eq!(records[0]["task"], "write");
    assert_eq!(records[1]["pomodoros"], 4);
    assert!(records[1]["line"].as_u64().is_some());
}

#[test]
#[serial]
fn test_root_severity_drops_events_before_the_queue() {
    let buffer = MemoryBuffer::new();
    let pipeline = LoggingPipeline::with_handlers(
        vec![Handler::memory(buffer.clone(), SimpleFormatter)],
        16,
        OverflowPolicy::Block,
    )
    .unwrap();

    tracing::subscriber::with_default(pipeline.subscriber(LogLevel::Warning), || {
        log::debug!("hidden");
        log::info!("hidden");
        log::warn!("shown");
        log::error!("shown");
    });
    pipeline.shutdown();

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.ends_with("shown")));
}

#[test]
#[serial]
fn test_critical_root_severity_blocks_error_records() {
    let buffer = MemoryBuffer::new();
    let pipeline = LoggingPipeline::with_handlers(
        vec![Handler::memory(buffer.clone(), SimpleFormatter)],
        16,
        OverflowPolicy::Block,
    )
    .unwrap();

    tracing::subscriber::with_default(pipeline.subscriber(LogLevel::Critical), || {
        log::warn!("hidden");
        log::error!("plain error");
        log::error!(critical = true, "store lost");
    });
    pipeline.shutdown();

    let lines = buffer.lines();
    assert_eq!(lines.len(), 1, "root CRITICAL should only admit CRITICAL records: {lines:?}");
    assert!(lines[0].contains("CRITICAL"));
    assert!(lines[0].ends_with("store lost"));
}

#[test]
#[serial]
fn test_concurrent_producers_keep_per_thread_order() {
    let buffer = MemoryBuffer::new();
    let pipeline = LoggingPipeline::with_handlers(
        vec![Handler::memory(buffer.clone(), JsonFormatter::bare())],
        8,
        OverflowPolicy::Block,
    )
    .unwrap();

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let sender = pipeline.sender();
            thread::spawn(move || {
                for index in 0..100 {
                    let record = LogRecord::new("producer", LogLevel::Info, format!("{producer}:{index}"))
                        .with_extra("producer", producer)
                        .with_extra("index", index);
                    sender.enqueue(record).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    pipeline.shutdown();

    let records: Vec<Value> = buffer
        .lines()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 400);

    for producer in 0..4 {
        let indices: Vec<u64> = records
            .iter()
            .filter(|record| record["producer"] == producer)
            .map(|record| record["index"].as_u64().unwrap())
            .collect();
        assert_eq!(indices, (0..100).collect::<Vec<u64>>());
    }
}

#[test]
#[serial]
fn test_records_accepted_during_shutdown_are_delivered() {
    for policy in [OverflowPolicy::Block, OverflowPolicy::DropOldest] {
        let buffer = MemoryBuffer::new();
        let pipeline =
            LoggingPipeline::with_handlers(vec![Handler::memory(buffer.clone(), SimpleFormatter)], 4096, policy)
                .unwrap();
        let accepted = Arc::new(AtomicU64::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let sender = pipeline.sender();
                let accepted = Arc::clone(&accepted);
                thread::spawn(move || {
                    while sender.enqueue(LogRecord::new("race", LogLevel::Info, "in flight")).is_ok() {
                        accepted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        while accepted.load(Ordering::Relaxed) < 500 {
            thread::yield_now();
        }
        let sender = pipeline.sender();
        pipeline.shutdown();
        for producer in producers {
            producer.join().unwrap();
        }

        let delivered = buffer.lines().len() as u64 + sender.dropped();
        assert_eq!(delivered, accepted.load(Ordering::Relaxed), "{policy:?}");
    }
}

#[test]
#[serial]
fn test_drop_oldest_counts_discarded_records() {
    let (sender, records) = log_queue(4, OverflowPolicy::DropOldest);
    for index in 0..10 {
        sender
            .enqueue(LogRecord::new("test", LogLevel::Info, format!("{index}")))
            .unwrap();
    }
    assert_eq!(sender.dropped(), 6);

    let buffer = MemoryBuffer::new();
    let mut listener =
        QueueListener::start(sender.clone(), records, vec![Handler::memory(buffer.clone(), SimpleFormatter)]).unwrap();
    listener.stop();

    let messages: Vec<String> = buffer
        .lines()
        .iter()
        .map(|line| line.rsplit(' ').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(messages, vec!["6", "7", "8", "9"]);
}

#[test]
#[serial]
fn test_logging_document_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(LOGGING_CONFIG_FILE);

    let mut config = LoggingConfig::from_file(&path, &detached_settings()).unwrap();
    config.log_directory = dir.path().to_path_buf();

    assert_eq!(config.destinations.len(), 3);
    assert_eq!(config.log_file_name, "log_tomatempo.jsonl");
    assert_eq!(config.build_handlers().unwrap().len(), 3);
}

#[test]
#[serial]
fn test_global_init_installs_once_and_guard_drains() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let guard = init(&config).unwrap();
    assert_eq!(guard.log_file(), config.log_file_path());
    assert_eq!(guard.pipeline().state(), WorkerState::Running);

    log::info!(source = "global", "installed globally");

    let second = init(&config_in(dir.path()));
    assert!(matches!(second, Err(LoggingError::AlreadyInitialized)));

    guard.shutdown();

    let records = read_json_lines(&config.log_file_path());
    assert!(records
        .iter()
        .any(|record| record["message"] == "installed globally" && record["source"] == "global"));
}
