//! Script line model and the persisted script format.
//!
//! One request per line, space separated:
//!
//! ```text
//! a <id> <size>
//! r <id> <size>
//! f <id>
//! ```
//!
//! Emitters write through a [`ScriptSink`]; the on-disk form is produced by
//! [`ScriptWriter`], which separates lines with `\n` and leaves the final line
//! unterminated.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ScriptError, ScriptParseError};

/// Stand-in for a runtime pointer over one allocation lifetime.
pub type MemoryId = u64;

/// Largest request size a script line may carry.
pub const MAX_REQUEST_SIZE: u64 = 1 << 30;

/// Request kind of a script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Alloc,
    Realloc,
    Free,
}

impl Op {
    /// Single-character tag used in the persisted format.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Alloc => 'a',
            Self::Realloc => 'r',
            Self::Free => 'f',
        }
    }
}

/// One emitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptLine {
    Alloc { id: MemoryId, size: u64 },
    Realloc { id: MemoryId, size: u64 },
    Free { id: MemoryId },
}

impl ScriptLine {
    #[must_use]
    pub const fn op(&self) -> Op {
        match self {
            Self::Alloc { .. } => Op::Alloc,
            Self::Realloc { .. } => Op::Realloc,
            Self::Free { .. } => Op::Free,
        }
    }

    #[must_use]
    pub const fn id(&self) -> MemoryId {
        match *self {
            Self::Alloc { id, .. } | Self::Realloc { id, .. } | Self::Free { id } => id,
        }
    }

    /// Requested byte count; `None` for frees.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        match *self {
            Self::Alloc { size, .. } | Self::Realloc { size, .. } => Some(size),
            Self::Free { .. } => None,
        }
    }
}

impl fmt::Display for ScriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc { id, size } | Self::Realloc { id, size } => {
                write!(f, "{} {id} {size}", self.op().tag())
            }
            Self::Free { id } => write!(f, "{} {id}", self.op().tag()),
        }
    }
}

impl FromStr for ScriptLine {
    type Err = ScriptParseError;

    /// Parses a single line. Errors carry line number 0; readers re-stamp them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScriptParseError::Malformed {
            line: 0,
            text: s.trim().to_string(),
        };

        let fields: Vec<&str> = s.split_whitespace().collect();
        let (tag, rest) = fields.split_first().ok_or_else(malformed)?;
        let id = |field: &str| field.parse::<MemoryId>().map_err(|_| malformed());
        let size = |field: &str| {
            let size = field.parse::<u64>().map_err(|_| malformed())?;
            if size > MAX_REQUEST_SIZE {
                return Err(ScriptParseError::SizeTooLarge { line: 0, size });
            }
            Ok(size)
        };

        match (*tag, rest) {
            ("a", &[i, sz]) => Ok(Self::Alloc {
                id: id(i)?,
                size: size(sz)?,
            }),
            ("r", &[i, sz]) => Ok(Self::Realloc {
                id: id(i)?,
                size: size(sz)?,
            }),
            ("f", &[i]) => Ok(Self::Free { id: id(i)? }),
            _ => Err(malformed()),
        }
    }
}

/// Destination for emitted script lines.
pub trait ScriptSink {
    fn push(&mut self, line: ScriptLine) -> io::Result<()>;
}

impl ScriptSink for Vec<ScriptLine> {
    fn push(&mut self, line: ScriptLine) -> io::Result<()> {
        Vec::push(self, line);
        Ok(())
    }
}

impl<S: ScriptSink + ?Sized> ScriptSink for &mut S {
    fn push(&mut self, line: ScriptLine) -> io::Result<()> {
        (**self).push(line)
    }
}

/// Writes lines in the persisted format. No terminator after the last line.
pub struct ScriptWriter<W: Write> {
    inner: W,
    lines: usize,
}

impl<W: Write> ScriptWriter<W> {
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner, lines: 0 }
    }

    #[must_use]
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> ScriptSink for ScriptWriter<W> {
    fn push(&mut self, line: ScriptLine) -> io::Result<()> {
        if self.lines > 0 {
            self.inner.write_all(b"\n")?;
        }
        write!(self.inner, "{line}")?;
        self.lines += 1;
        Ok(())
    }
}

/// A parsed line together with its physical 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptEntry {
    pub lineno: usize,
    pub line: ScriptLine,
}

/// Parse script text, skipping blank lines and `#` comments.
pub fn parse_script(text: &str) -> Result<Vec<ScriptEntry>, ScriptParseError> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        if let Some(entry) = parse_numbered(raw, idx + 1)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Streaming variant of [`parse_script`].
pub fn read_script<R: BufRead>(reader: R) -> Result<Vec<ScriptEntry>, ScriptError> {
    let mut entries = Vec::new();
    for (idx, raw) in reader.lines().enumerate() {
        let raw = raw?;
        if let Some(entry) = parse_numbered(&raw, idx + 1)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn parse_numbered(raw: &str, lineno: usize) -> Result<Option<ScriptEntry>, ScriptParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let line = trimmed
        .parse::<ScriptLine>()
        .map_err(|err| err.at_line(lineno))?;
    Ok(Some(ScriptEntry { lineno, line }))
}

/// Counts describing a checked script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptSummary {
    pub lines: usize,
    pub allocs: usize,
    pub reallocs: usize,
    pub frees: usize,
    pub distinct_ids: usize,
    /// Ids still allocated after the last line (non-zero only for leaking scripts).
    pub live_at_end: usize,
}
