use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::io;
use tomatempo::logging::*;
use tomatempo::settings::LogLevel;

fn frozen_record(level: LogLevel) -> LogRecord {
    LogRecord::new("test", level, "This is a test")
        .with_created(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
        .with_location("tests/unit_logging.rs", 10)
}

fn parse(line: &str) -> serde_json::Map<String, Value> {
    match serde_json::from_str::<Value>(line).expect("formatter output should be valid JSON") {
        Value::Object(object) => object,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[test]
fn test_json_formatter_round_trip() {
    let formatter = JsonFormatter::new([
        ("level", "levelname"),
        ("message", "message"),
        ("timestamp", "timestamp"),
        ("logger", "name"),
        ("line", "lineno"),
    ])
    .unwrap();

    let line = formatter.format(&frozen_record(LogLevel::Debug)).unwrap();
    let object = parse(&line);

    assert_eq!(object["level"], "DEBUG");
    assert_eq!(object["message"], "This is a test");
    assert_eq!(object["timestamp"], "2023-01-01T12:00:00+00:00");
    assert_eq!(object["logger"], "test");
    assert_eq!(object["line"], 10);
    assert!(!object.contains_key("exc_info"));
    assert!(!object.contains_key("stack_info"));
    assert!(!line.contains('\n'), "one record per line");
}

#[test]
fn test_computed_fields_are_not_duplicated_under_renamed_keys() {
    let formatter = JsonFormatter::new([("msg", "message"), ("ts", "timestamp")]).unwrap();
    let object = parse(&formatter.format(&frozen_record(LogLevel::Info)).unwrap());

    assert_eq!(object["msg"], "This is a test");
    assert_eq!(object["ts"], "2023-01-01T12:00:00+00:00");
    assert!(!object.contains_key("message"));
    assert!(!object.contains_key("timestamp"));
}

#[test]
fn test_unmapped_computed_fields_are_still_written() {
    let object = parse(&JsonFormatter::bare().format(&frozen_record(LogLevel::Info)).unwrap());

    assert_eq!(object["message"], "This is a test");
    assert_eq!(object["timestamp"], "2023-01-01T12:00:00+00:00");
    assert_eq!(object.len(), 2);
}

#[test]
fn test_extras_are_merged_and_reserved_names_skipped() {
    let record = frozen_record(LogLevel::Info)
        .with_extra("session", 3)
        .with_extra("task", "write")
        .with_extra("levelname", "SPOOFED");

    let object = parse(&JsonFormatter::default().format(&record).unwrap());

    assert_eq!(object["session"], 3);
    assert_eq!(object["task"], "write");
    assert_eq!(object["level"], "INFO");
    assert!(!object.contains_key("levelname"));
}

#[test]
fn test_exception_and_stack_info_are_included_when_present() {
    let err = io::Error::new(io::ErrorKind::Other, "division by zero");
    let record = frozen_record(LogLevel::Error)
        .with_exception(ExceptionInfo::capture(&err))
        .with_stack_info("frame one\nframe two");

    let line = JsonFormatter::default().format(&record).unwrap();
    assert!(!line.contains('\n'), "embedded newlines must be escaped");

    let object = parse(&line);
    assert!(object["exc_info"].as_str().unwrap().contains("division by zero"));
    assert_eq!(object["stack_info"], "frame one\nframe two");
}

#[test]
fn test_unknown_attribute_fails_at_construction() {
    let result = JsonFormatter::new([("oops", "no_such_attribute")]);
    match result {
        Err(FormatterError::UnknownAttribute { key, attribute }) => {
            assert_eq!(key, "oops");
            assert_eq!(attribute, "no_such_attribute");
        }
        other => panic!("expected UnknownAttribute, got {other:?}"),
    }
}

#[test]
fn test_missing_extra_attribute_fails_at_format_time() {
    let formatter = JsonFormatter::new([("user", "extra.user_id")]).unwrap();

    let err = formatter.format(&frozen_record(LogLevel::Info)).unwrap_err();
    assert!(matches!(err, FormatterError::MissingAttribute(ref name) if name == "extra.user_id"));

    let object = parse(&formatter.format(&frozen_record(LogLevel::Info).with_extra("user_id", 42)).unwrap());
    assert_eq!(object["user"], 42);
}

#[test]
fn test_simple_formatter_layout() {
    let line = SimpleFormatter.format(&frozen_record(LogLevel::Warning)).unwrap();
    assert_eq!(line, "2023-01-01T12:00:00.000+00:00 WARNING  [test] This is a test");
}

#[test]
fn test_non_error_filter() {
    let filter = NonErrorFilter;
    for level in [LogLevel::Debug, LogLevel::Info] {
        assert!(filter.allows(&frozen_record(level)), "{level} should pass");
    }
    for level in [LogLevel::Warning, LogLevel::Error, LogLevel::Critical] {
        assert!(!filter.allows(&frozen_record(level)), "{level} should be blocked");
    }
}

#[test]
fn test_error_only_filter_is_the_complement() {
    for level in LogLevel::ALL {
        let record = frozen_record(level);
        assert_ne!(NonErrorFilter.allows(&record), ErrorOnlyFilter.allows(&record), "{level}");
    }
}

#[test]
fn test_default_handlers_route_by_severity() {
    let dir = tempfile::TempDir::new().unwrap();
    let stdout = MemoryBuffer::new();
    let stderr = MemoryBuffer::new();
    let log_file = dir.path().join("log_test.jsonl");

    let mut handlers =
        default_handlers_with(Box::new(stdout.clone()), Box::new(stderr.clone()), &log_file).unwrap();

    for level in LogLevel::ALL {
        let record = LogRecord::new("test", level, format!("at {level}"));
        for handler in handlers.iter_mut() {
            handler.handle(&record).unwrap();
        }
    }
    for handler in handlers.iter_mut() {
        handler.flush().unwrap();
    }

    let out = stdout.lines();
    assert_eq!(out.len(), 2);
    assert!(out[0].ends_with("at DEBUG"));
    assert!(out[1].ends_with("at INFO"));

    let err = stderr.lines();
    assert_eq!(err.len(), 3);
    assert!(err[0].ends_with("at WARNING"));
    assert!(err[2].ends_with("at CRITICAL"));

    let file_lines = std::fs::read_to_string(&log_file).unwrap();
    let levels: Vec<Value> = file_lines.lines().map(|line| parse(line)["level"].clone()).collect();
    assert_eq!(levels, vec!["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]);
}
