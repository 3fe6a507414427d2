//! Integration test: structured logging contract
//!
//! Validates that:
//! 1. LogEmitter writes correct JSONL to files.
//! 2. The validation function catches schema violations.
//! 3. Emitted entries deserialize back into LogEntry.
//!
//! Run: cargo test -p heapscript-harness --test structured_log_test

use heapscript_harness::structured_log::{
    LogEmitter, LogEntry, LogLevel, Outcome, RunMode, validate_log_file, validate_log_line,
};

#[test]
fn emitter_writes_valid_jsonl() {
    let dir = std::env::temp_dir().join(format!("heapscript_log_test-{}", std::process::id()));
    let log_path = dir.join("nested/test_output.jsonl");

    {
        let mut emitter = LogEmitter::to_file(&log_path, "run-integ", RunMode::Generate).unwrap();
        emitter
            .emit_entry(LogEntry::new("", LogLevel::Info, "run_start"))
            .unwrap();
        emitter
            .emit_entry(
                LogEntry::new("", LogLevel::Info, "validation_pass")
                    .with_seed(9)
                    .with_outcome(Outcome::Pass)
                    .with_duration_ms(1),
            )
            .unwrap();
        emitter
            .emit_entry(LogEntry::new("", LogLevel::Debug, "run_end"))
            .unwrap();
        emitter.flush().unwrap();
    }

    let (line_count, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(line_count, 3, "Expected 3 log lines");
    assert!(errors.is_empty(), "Emitter output should validate: {errors:?}");

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["trace_id"], "run-integ::generate::001");
    assert_eq!(lines[1]["trace_id"], "run-integ::generate::002");
    assert_eq!(lines[2]["trace_id"], "run-integ::generate::003");
    assert_eq!(lines[1]["mode"], "generate");
    assert_eq!(lines[1]["seed"], 9);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn explicit_trace_id_and_mode_are_kept() {
    let dir = std::env::temp_dir().join(format!("heapscript_log_keep-{}", std::process::id()));
    let log_path = dir.join("keep.jsonl");
    {
        let mut emitter = LogEmitter::to_file(&log_path, "run-x", RunMode::Parse).unwrap();
        emitter
            .emit_entry(
                LogEntry::new("other::validate::042", LogLevel::Warn, "note")
                    .with_mode(RunMode::Validate),
            )
            .unwrap();
        emitter.flush().unwrap();
    }
    let content = std::fs::read_to_string(&log_path).unwrap();
    let entry = validate_log_line(content.trim(), 1).unwrap();
    assert_eq!(entry.trace_id, "other::validate::042");
    assert_eq!(entry.mode, Some(RunMode::Validate));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn validation_catches_missing_fields() {
    let line = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"info","event":"test"}"#;
    let errors = validate_log_line(line, 1).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "trace_id"));

    let line = r#"{"trace_id":"a::parse::1","level":"info","event":"test"}"#;
    let errors = validate_log_line(line, 2).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "timestamp"));

    let line = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::parse::1"}"#;
    let errors = validate_log_line(line, 3).unwrap_err();
    assert!(errors.len() >= 2);
}

#[test]
fn validation_catches_invalid_enums() {
    let line = r#"{"timestamp":"T","trace_id":"a::parse::1","level":"critical","event":"e"}"#;
    assert!(validate_log_line(line, 1).is_err());

    let line =
        r#"{"timestamp":"T","trace_id":"a::parse::1","level":"info","event":"e","mode":"strict"}"#;
    assert!(validate_log_line(line, 2).is_err());

    let line =
        r#"{"timestamp":"T","trace_id":"a::parse::1","level":"info","event":"e","outcome":"maybe"}"#;
    assert!(validate_log_line(line, 3).is_err());
}

#[test]
fn validate_file_counts_only_non_blank_lines() {
    let dir = std::env::temp_dir().join(format!("heapscript_log_count-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("mixed.jsonl");
    std::fs::write(
        &path,
        "{\"timestamp\":\"T\",\"trace_id\":\"a::parse::1\",\"level\":\"info\",\"event\":\"e\"}\n\n not json\n",
    )
    .unwrap();
    let (count, errors) = validate_log_file(&path).unwrap();
    assert_eq!(count, 2);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line_number, 3);
    assert_eq!(errors[0].field, "<json>");
    std::fs::remove_dir_all(&dir).ok();
}
