//! Driver modes.
//!
//! `parse` and `generate` stream their script straight into the output file,
//! then read the persisted file back and validate it. `validate` only does the
//! second half. Every mode logs `run_start`, and the validating step logs
//! `validation_pass` or `validation_fail`; producing modes also log
//! `script_written` with the script's SHA-256.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use heapscript_core::{
    DirectiveError, GenerateStats, ScriptError, ScriptSummary, ScriptWriter, TraceTranslator,
    TranslateStats, generate, parse_directives, validate_script_file,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::RunConfig;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, RunMode};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("io error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("log: {0}")]
    Log(#[from] io::Error),
    #[error("log: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Directive(#[from] DirectiveError),
    #[error("{}: {source}", path.display())]
    Script { path: PathBuf, source: ScriptError },
}

impl RunError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of `parse`.
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub script: PathBuf,
    pub sha256: String,
    pub translate: TranslateStats,
    pub summary: ScriptSummary,
}

/// Result of `generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub script: PathBuf,
    pub sha256: String,
    pub generate: GenerateStats,
    pub summary: ScriptSummary,
}

/// Translate the trace at `trace` into a script at `output`, then validate it.
pub fn run_parse(trace: &Path, output: &Path, config: &RunConfig) -> Result<ParseReport, RunError> {
    let started = Instant::now();
    let mut log = open_log(config, RunMode::Parse)?;
    log_start(&mut log, config, &[trace, output], serde_json::Value::Null)?;

    let mut reader = BufReader::new(File::open(trace).map_err(RunError::io(trace))?);
    let mut writer = create_script(output)?;
    let mut translator = TraceTranslator::new(config.rng());
    // Traces can carry arbitrary bytes from traced string arguments.
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader
            .read_until(b'\n', &mut raw)
            .map_err(RunError::io(trace))?
            == 0
        {
            break;
        }
        translator
            .feed_line(&String::from_utf8_lossy(&raw), &mut writer)
            .map_err(RunError::io(output))?;
    }
    let translate = translator
        .finish(&mut writer)
        .map_err(RunError::io(output))?;
    writer.into_inner().map_err(RunError::io(output))?;

    let sha256 = log_written(&mut log, output, serde_json::to_value(&translate)?)?;
    let summary = validate_logged(&mut log, output, started)?;
    Ok(ParseReport {
        script: output.to_path_buf(),
        sha256,
        translate,
        summary,
    })
}

/// Expand `directives` into a script at `output`, then validate it.
pub fn run_generate(
    directives: &[String],
    output: &Path,
    config: &RunConfig,
) -> Result<GenerateReport, RunError> {
    let started = Instant::now();
    let parsed = parse_directives(directives)?;
    let mut log = open_log(config, RunMode::Generate)?;
    log_start(
        &mut log,
        config,
        &[output],
        serde_json::json!({ "directives": directives.join(" ") }),
    )?;

    let mut writer = create_script(output)?;
    let stats = generate(&parsed, config.rng(), &mut writer).map_err(RunError::io(output))?;
    writer.into_inner().map_err(RunError::io(output))?;

    let sha256 = log_written(&mut log, output, serde_json::to_value(&stats)?)?;
    let summary = validate_logged(&mut log, output, started)?;
    Ok(GenerateReport {
        script: output.to_path_buf(),
        sha256,
        generate: stats,
        summary,
    })
}

/// Validate an existing script file.
pub fn run_validate(script: &Path, config: &RunConfig) -> Result<ScriptSummary, RunError> {
    let started = Instant::now();
    let mut log = open_log(config, RunMode::Validate)?;
    log_start(&mut log, config, &[script], serde_json::Value::Null)?;
    validate_logged(&mut log, script, started)
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String, RunError> {
    let data = std::fs::read(path).map_err(RunError::io(path))?;
    Ok(Sha256::digest(&data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

fn open_log(config: &RunConfig, mode: RunMode) -> Result<LogEmitter, RunError> {
    let run_id = config.run_id();
    match &config.log_path {
        Some(path) => LogEmitter::to_file(path, &run_id, mode).map_err(RunError::io(path)),
        None => Ok(LogEmitter::discard(&run_id, mode)),
    }
}

fn create_script(path: &Path) -> Result<ScriptWriter<BufWriter<File>>, RunError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(RunError::io(parent))?;
    }
    let file = File::create(path).map_err(RunError::io(path))?;
    Ok(ScriptWriter::new(BufWriter::new(file)))
}

fn log_start(
    log: &mut LogEmitter,
    config: &RunConfig,
    paths: &[&Path],
    details: serde_json::Value,
) -> Result<(), RunError> {
    let mut entry = LogEntry::new("", LogLevel::Info, "run_start")
        .with_seed(config.seed)
        .with_artifacts(paths.iter().map(|p| p.display().to_string()).collect());
    let mut details = match details {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    details.insert(
        "seed_source".to_string(),
        serde_json::to_value(config.seed_source)?,
    );
    entry = entry.with_details(serde_json::Value::Object(details));
    log.emit_entry(entry)?;
    Ok(())
}

fn log_written(
    log: &mut LogEmitter,
    script: &Path,
    stats: serde_json::Value,
) -> Result<String, RunError> {
    let digest = sha256_file(script)?;
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "script_written")
            .with_artifacts(vec![format!("{}@sha256:{digest}", script.display())])
            .with_details(stats),
    )?;
    Ok(digest)
}

fn validate_logged(
    log: &mut LogEmitter,
    script: &Path,
    started: Instant,
) -> Result<ScriptSummary, RunError> {
    let elapsed = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let artifacts = vec![script.display().to_string()];
    match validate_script_file(script) {
        Ok(summary) => {
            log.emit_entry(
                LogEntry::new("", LogLevel::Info, "validation_pass")
                    .with_outcome(Outcome::Pass)
                    .with_duration_ms(elapsed())
                    .with_artifacts(artifacts)
                    .with_details(serde_json::to_value(&summary)?),
            )?;
            log.flush()?;
            Ok(summary)
        }
        Err(source) => {
            log.emit_entry(
                LogEntry::new("", LogLevel::Error, "validation_fail")
                    .with_outcome(Outcome::Fail)
                    .with_duration_ms(elapsed())
                    .with_artifacts(artifacts)
                    .with_details(serde_json::json!({
                        "line": source.line(),
                        "error": source.to_string(),
                    })),
            )?;
            log.flush()?;
            Err(RunError::Script {
                path: script.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_digest() {
        let path = std::env::temp_dir().join(format!("heapscript-sha-{}.txt", std::process::id()));
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_trace_reports_its_path() {
        let config = RunConfig::from_sources(Some("1"), None, None, None).unwrap();
        let missing = Path::new("/nonexistent/heapscript/trace.txt");
        let out = std::env::temp_dir().join("heapscript-unused-out.txt");
        let err = run_parse(missing, &out, &config).unwrap_err();
        assert!(matches!(err, RunError::Io { ref path, .. } if path == missing));
    }

    #[test]
    fn bad_directives_fail_before_touching_the_output() {
        let config = RunConfig::from_sources(Some("1"), None, None, None).unwrap();
        let out = std::env::temp_dir().join(format!(
            "heapscript-never-written-{}.txt",
            std::process::id()
        ));
        let err = run_generate(&["-grow".to_string()], &out, &config).unwrap_err();
        assert!(matches!(err, RunError::Directive(DirectiveError::UnknownVerb(_))));
        assert!(!out.exists());
    }
}
