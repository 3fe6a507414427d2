//! Error taxonomy for script handling.
//!
//! Non-fatal conditions (unparseable trace lines, stale frees, short generator
//! directives) never surface here; they are counted in the run statistics
//! instead. Everything in this module aborts the run.

use thiserror::Error;

use crate::script::{MAX_REQUEST_SIZE, MemoryId};

/// A persisted script line that does not follow the `a|r|f` line format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptParseError {
    #[error("line {line}: malformed script line '{text}'")]
    Malformed { line: usize, text: String },
    #[error("line {line}: request size {size} exceeds the {max} byte limit", max = MAX_REQUEST_SIZE)]
    SizeTooLarge { line: usize, size: u64 },
}

impl ScriptParseError {
    /// 1-based line number the error refers to.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Malformed { line, .. } | Self::SizeTooLarge { line, .. } => *line,
        }
    }

    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::Malformed { text, .. } => Self::Malformed { line, text },
            Self::SizeTooLarge { size, .. } => Self::SizeTooLarge { line, size },
        }
    }
}

/// A logically inconsistent script: an id used outside of its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptInconsistency {
    #[error("line {line}: realloc of id {id} before any alloc")]
    ReallocBeforeAlloc { line: usize, id: MemoryId },
    #[error("line {line}: free of id {id} which is not allocated")]
    FreeBeforeAlloc { line: usize, id: MemoryId },
    #[error("line {line}: id {id} allocated again while still live (allocated at line {live_since})")]
    DoubleAlloc {
        line: usize,
        id: MemoryId,
        live_since: usize,
    },
}

impl ScriptInconsistency {
    /// 1-based line number of the offending script line.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::ReallocBeforeAlloc { line, .. }
            | Self::FreeBeforeAlloc { line, .. }
            | Self::DoubleAlloc { line, .. } => *line,
        }
    }

    /// The memory id the offending line refers to.
    #[must_use]
    pub fn id(&self) -> MemoryId {
        match self {
            Self::ReallocBeforeAlloc { id, .. }
            | Self::FreeBeforeAlloc { id, .. }
            | Self::DoubleAlloc { id, .. } => *id,
        }
    }
}

/// Any failure while reading back and checking a persisted script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ScriptParseError),
    #[error(transparent)]
    Inconsistent(#[from] ScriptInconsistency),
}

impl ScriptError {
    /// Script line the error points at, if any.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Io(_) => None,
            Self::Parse(err) => Some(err.line()),
            Self::Inconsistent(err) => Some(err.line()),
        }
    }
}

/// A generator directive list that cannot be turned into requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("unknown directive '{0}', expected -alloc, -realloc, -free or -leak")]
    UnknownVerb(String),
    #[error("malformed size list in '{0}', expected (size) or (low,high)")]
    MalformedSizes(String),
    #[error("zero byte size in '{0}'")]
    ZeroSize(String),
    #[error("size in '{0}' exceeds the {max} byte limit", max = MAX_REQUEST_SIZE)]
    SizeTooLarge(String),
    #[error("empty size range in '{token}': {low} > {high}")]
    EmptyRange { token: String, low: u64, high: u64 },
    #[error("token '{0}' does not belong to any directive")]
    StrayToken(String),
    #[error("malformed request count '{0}'")]
    MalformedCount(String),
    #[error("'{0}' needs an explicit request count")]
    MissingAllocCount(String),
}
