//! Script consistency checking.
//!
//! Every id must follow `alloc, realloc*, free`. Ids may come back after
//! their free through a fresh alloc, and ids still live at the end of the
//! script are accepted (leaking scripts are valid).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ScriptError, ScriptInconsistency};
use crate::script::{MemoryId, ScriptEntry, ScriptLine, ScriptSummary, read_script};

/// Incremental lifecycle checker.
#[derive(Debug, Default)]
pub struct ScriptValidator {
    /// Live id -> line of its alloc.
    live: HashMap<MemoryId, usize>,
    seen: HashSet<MemoryId>,
    summary: ScriptSummary,
}

impl ScriptValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the next line. `lineno` is 1-based and only used for reporting.
    pub fn check(&mut self, lineno: usize, line: &ScriptLine) -> Result<(), ScriptInconsistency> {
        match *line {
            ScriptLine::Alloc { id, .. } => {
                if let Some(&live_since) = self.live.get(&id) {
                    return Err(ScriptInconsistency::DoubleAlloc {
                        line: lineno,
                        id,
                        live_since,
                    });
                }
                self.live.insert(id, lineno);
                self.summary.allocs += 1;
            }
            ScriptLine::Realloc { id, .. } => {
                if !self.live.contains_key(&id) {
                    return Err(ScriptInconsistency::ReallocBeforeAlloc { line: lineno, id });
                }
                self.summary.reallocs += 1;
            }
            ScriptLine::Free { id } => {
                if self.live.remove(&id).is_none() {
                    return Err(ScriptInconsistency::FreeBeforeAlloc { line: lineno, id });
                }
                self.summary.frees += 1;
            }
        }
        self.seen.insert(line.id());
        self.summary.lines += 1;
        Ok(())
    }

    /// Close the check and report what was seen.
    #[must_use]
    pub fn finish(mut self) -> ScriptSummary {
        self.summary.distinct_ids = self.seen.len();
        self.summary.live_at_end = self.live.len();
        self.summary
    }
}

/// Validate emitted lines; line numbers are positions starting at 1.
pub fn validate_lines(lines: &[ScriptLine]) -> Result<ScriptSummary, ScriptInconsistency> {
    let mut validator = ScriptValidator::new();
    for (idx, line) in lines.iter().enumerate() {
        validator.check(idx + 1, line)?;
    }
    Ok(validator.finish())
}

/// Validate parsed entries, reporting their file line numbers.
pub fn validate_entries(entries: &[ScriptEntry]) -> Result<ScriptSummary, ScriptInconsistency> {
    let mut validator = ScriptValidator::new();
    for entry in entries {
        validator.check(entry.lineno, &entry.line)?;
    }
    Ok(validator.finish())
}

/// Read a persisted script back and validate it.
pub fn validate_script_file(path: &Path) -> Result<ScriptSummary, ScriptError> {
    let file = File::open(path)?;
    let entries = read_script(BufReader::new(file))?;
    Ok(validate_entries(&entries)?)
}
