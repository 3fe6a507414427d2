//! # heapscript-core
//!
//! Builds heap allocator test scripts. A script is a sequence of `alloc`,
//! `realloc` and `free` requests over abstract memory ids, produced either by
//! translating an `ltrace` capture of a real program or by expanding a list
//! of generator directives, and checked for lifecycle consistency before it
//! is handed to an allocator test driver.
//!
//! All randomness is injected by the caller, so a fixed seed reproduces a
//! script exactly.

#![deny(unsafe_code)]

pub mod decode;
pub mod directive;
pub mod error;
pub mod generate;
pub mod script;
pub mod translate;
pub mod validate;

pub use decode::{CallKind, DecodedCall, decode};
pub use directive::{Count, Directive, SizeSpec, Verb, parse_directives};
pub use error::{DirectiveError, ScriptError, ScriptInconsistency, ScriptParseError};
pub use generate::{GenerateStats, PatternGenerator, generate};
pub use script::{
    MAX_REQUEST_SIZE, MemoryId, Op, ScriptEntry, ScriptLine, ScriptSink, ScriptSummary,
    ScriptWriter, parse_script, read_script,
};
pub use translate::{TraceTranslator, TranslateStats, translate_lines};
pub use validate::{
    ScriptValidator, validate_entries, validate_lines, validate_script_file,
};
