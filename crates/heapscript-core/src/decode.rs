//! Trace line decoding.
//!
//! Understands the four heap calls as printed by `ltrace`:
//!
//! ```text
//! make->calloc(8192, 1)                            = 0x56167a22c440
//! make->malloc(48)                                 = 0x56167a2418e0
//! make->realloc(0x56167a22c440, 8)                 = 0x56167a252a00
//! make->free(0x56167a22c440)                       = <void>
//! ```
//!
//! Anything else (exit banners, signal notices, compiler command lines,
//! truncated calls) decodes to `None`.

/// Marker separating the calling binary from the callee.
const CALL_MARKER: &str = "->";

/// Calls made by libc itself rather than by the traced program.
const LIBC_CALLER_PREFIX: &str = "libc.";

/// Heap call classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `malloc` or `calloc`.
    Allocate,
    Reallocate,
    Free,
}

impl CallKind {
    fn from_callee(name: &str) -> Option<Self> {
        match name {
            "malloc" | "calloc" => Some(Self::Allocate),
            "realloc" => Some(Self::Reallocate),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

/// One heap call recovered from a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCall {
    pub kind: CallKind,
    /// Runtime address: the freed pointer, or the pointer returned by the call.
    pub address: u64,
    /// Requested bytes. Always `None` for frees; `None` for an allocation whose
    /// arguments could not be read.
    pub size: Option<u64>,
}

/// Decode one raw trace line.
#[must_use]
pub fn decode(line: &str) -> Option<DecodedCall> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with(LIBC_CALLER_PREFIX) {
        return None;
    }

    let marker = compact.find(CALL_MARKER)?;
    let call = &compact[marker + CALL_MARKER.len()..];
    let open = call.find('(')?;
    let callee = &call[..open];
    let kind = CallKind::from_callee(callee)?;
    let after_open = &call[open + 1..];

    let (address, size) = match kind {
        CallKind::Free => (free_address(after_open)?, None),
        CallKind::Allocate => {
            let (_, result) = call.split_once('=')?;
            let size = if callee == "calloc" {
                calloc_size(after_open)
            } else {
                malloc_size(after_open)
            };
            (parse_hex(result)?, size)
        }
        CallKind::Reallocate => {
            let (_, result) = call.split_once('=')?;
            (parse_hex(result)?, realloc_size(after_open))
        }
    };

    // NULL returns and free(NULL) carry no allocation.
    if address == 0 {
        return None;
    }
    Some(DecodedCall {
        kind,
        address,
        size,
    })
}

/// Address argument of a free. Only the leading alphanumeric run counts, so
/// tracer noise glued onto the token (`0x22e8f10<noreturn...>`) is dropped.
fn free_address(args: &str) -> Option<u64> {
    let end = args
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(args.len());
    parse_hex(&args[..end])
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

/// Argument list up to the closing parenthesis.
fn arguments(after_open: &str) -> Option<&str> {
    after_open.split_once(')').map(|(args, _)| args)
}

fn malloc_size(after_open: &str) -> Option<u64> {
    arguments(after_open)?.parse().ok()
}

fn calloc_size(after_open: &str) -> Option<u64> {
    let (count, elem) = arguments(after_open)?.split_once(',')?;
    let count: u64 = count.parse().ok()?;
    let elem: u64 = elem.parse().ok()?;
    count.checked_mul(elem)
}

fn realloc_size(after_open: &str) -> Option<u64> {
    let (_, size) = arguments(after_open)?.split_once(',')?;
    size.parse().ok()
}
