//! Generator directives.
//!
//! A directive list reads like `-alloc(64,512) 1000 -free -realloc(800) 50 -leak`:
//! a verb with an optional size list, optionally followed by a bare count.
//! Tokens are split on whitespace first, so `'-free(800,1200) 5000'` passed as
//! one shell word is the same as two words.

use crate::error::DirectiveError;
use crate::script::MAX_REQUEST_SIZE;

/// Bounds for the per-directive implicit size range.
pub const RANDOM_LOW_BOUNDS: (u64, u64) = (1, 50);
pub const RANDOM_HIGH_BOUNDS: (u64, u64) = (200, 1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Alloc,
    Realloc,
    Free,
    /// Stop generating and skip the cleanup frees.
    Leak,
}

impl Verb {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "alloc" => Some(Self::Alloc),
            "realloc" => Some(Self::Realloc),
            "free" => Some(Self::Free),
            "leak" => Some(Self::Leak),
            _ => None,
        }
    }
}

/// Requested byte sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// No size list given; an implicit range is drawn per directive.
    Random,
    Exactly(u64),
    /// Inclusive range.
    Between(u64, u64),
}

/// Number of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exactly(usize),
    /// Every id live when the directive starts.
    AllLive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub verb: Verb,
    pub sizes: SizeSpec,
    pub count: Count,
}

/// Parse a directive token list.
pub fn parse_directives<I, T>(tokens: I) -> Result<Vec<Directive>, DirectiveError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let words: Vec<String> = tokens
        .into_iter()
        .flat_map(|t| {
            t.as_ref()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut directives = Vec::new();
    let mut words = words.iter().peekable();
    while let Some(word) = words.next() {
        let Some(body) = word.strip_prefix('-') else {
            return Err(DirectiveError::StrayToken(word.clone()));
        };
        let (verb, sizes) = parse_head(word, body)?;

        let count = match words.next_if(|next| !next.starts_with('-')) {
            Some(raw) => Count::Exactly(
                raw.parse()
                    .map_err(|_| DirectiveError::MalformedCount(raw.clone()))?,
            ),
            None if verb == Verb::Alloc => {
                return Err(DirectiveError::MissingAllocCount(word.clone()));
            }
            None => Count::AllLive,
        };

        directives.push(Directive { verb, sizes, count });
    }
    Ok(directives)
}

fn parse_head(word: &str, body: &str) -> Result<(Verb, SizeSpec), DirectiveError> {
    let name_end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    let (name, rest) = body.split_at(name_end);
    let verb = Verb::from_name(name).ok_or_else(|| DirectiveError::UnknownVerb(word.to_string()))?;

    if rest.is_empty() {
        return Ok((verb, SizeSpec::Random));
    }
    let list = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| DirectiveError::MalformedSizes(word.to_string()))?;
    let parse = |raw: &str| -> Result<u64, DirectiveError> {
        let value: u64 = raw
            .parse()
            .map_err(|_| DirectiveError::MalformedSizes(word.to_string()))?;
        if value == 0 {
            return Err(DirectiveError::ZeroSize(word.to_string()));
        }
        if value > MAX_REQUEST_SIZE {
            return Err(DirectiveError::SizeTooLarge(word.to_string()));
        }
        Ok(value)
    };

    let sizes = match list.split_once(',') {
        None => SizeSpec::Exactly(parse(list)?),
        Some((low, high)) => {
            let (low, high) = (parse(low)?, parse(high)?);
            if low > high {
                return Err(DirectiveError::EmptyRange {
                    token: word.to_string(),
                    low,
                    high,
                });
            }
            SizeSpec::Between(low, high)
        }
    };
    Ok((verb, sizes))
}
