//! Live-trace translation: runtime addresses to memory ids.
//!
//! Every address maps to a stack of live ids, since one address can be handed
//! out again before the trace shows the matching free. Frees resolve last-in
//! first-out. A realloc picks one of the address's live ids at random and
//! leaves it live. A realloc on an address never seen before gets a
//! synthesized 8-byte alloc in front of it. Ids still live at end of input are
//! flushed as frees.

use std::io;

use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::decode::{CallKind, DecodedCall, decode};
use crate::script::{MAX_REQUEST_SIZE, MemoryId, ScriptLine, ScriptSink};

/// Size of the alloc synthesized in front of an unmatched realloc.
pub const SYNTHESIZED_ALLOC_SIZE: u64 = 8;

/// Counters for one translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslateStats {
    pub lines_read: usize,
    pub calls_decoded: usize,
    /// Lines that are not heap calls.
    pub lines_ignored: usize,
    /// Frees of addresses that are not tracked.
    pub stale_frees: usize,
    /// Allocations whose size could not be recovered.
    pub calls_dropped: usize,
    /// Allocations above [`MAX_REQUEST_SIZE`], dropped like unsized ones.
    pub oversized_calls: usize,
    pub synthesized_allocs: usize,
    pub trailing_frees: usize,
    pub lines_emitted: usize,
}

/// Stateful address-to-id translator.
pub struct TraceTranslator<R: Rng> {
    /// Address -> live ids, most recent last. Iteration follows first binding.
    bindings: IndexMap<u64, Vec<MemoryId>>,
    next_id: MemoryId,
    rng: R,
    stats: TranslateStats,
}

impl<R: Rng> TraceTranslator<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self {
            bindings: IndexMap::new(),
            next_id: 0,
            rng,
            stats: TranslateStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &TranslateStats {
        &self.stats
    }

    /// Number of ids currently live across all addresses.
    #[must_use]
    pub fn live_ids(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Decode and apply one raw trace line.
    pub fn feed_line<S: ScriptSink>(&mut self, line: &str, sink: &mut S) -> io::Result<()> {
        self.stats.lines_read += 1;
        match decode(line) {
            Some(call) => self.apply(call, sink),
            None => {
                self.stats.lines_ignored += 1;
                Ok(())
            }
        }
    }

    /// Apply one decoded call.
    pub fn apply<S: ScriptSink>(&mut self, call: DecodedCall, sink: &mut S) -> io::Result<()> {
        self.stats.calls_decoded += 1;
        match call.kind {
            CallKind::Free => self.free(call.address, sink),
            CallKind::Allocate => match self.request_size(call.size) {
                Some(size) => self.allocate(call.address, size, sink),
                None => Ok(()),
            },
            CallKind::Reallocate => match self.request_size(call.size) {
                Some(size) => self.reallocate(call.address, size, sink),
                None => Ok(()),
            },
        }
    }

    /// Size a script line may carry, counting the calls that have none.
    fn request_size(&mut self, size: Option<u64>) -> Option<u64> {
        match size {
            Some(size) if size <= MAX_REQUEST_SIZE => Some(size),
            Some(_) => {
                self.stats.oversized_calls += 1;
                None
            }
            None => {
                self.stats.calls_dropped += 1;
                None
            }
        }
    }

    /// Flush every id still live, in address order then stack order.
    pub fn finish<S: ScriptSink>(mut self, sink: &mut S) -> io::Result<TranslateStats> {
        let bindings = std::mem::take(&mut self.bindings);
        for id in bindings.into_values().flatten() {
            self.emit(ScriptLine::Free { id }, sink)?;
            self.stats.trailing_frees += 1;
        }
        Ok(self.stats)
    }

    fn free<S: ScriptSink>(&mut self, address: u64, sink: &mut S) -> io::Result<()> {
        let Some(ids) = self.bindings.get_mut(&address) else {
            self.stats.stale_frees += 1;
            return Ok(());
        };
        // Pop first, drop the binding only once its stack is empty.
        let popped = ids.pop();
        if ids.is_empty() {
            self.bindings.shift_remove(&address);
        }
        match popped {
            Some(id) => self.emit(ScriptLine::Free { id }, sink),
            None => {
                self.stats.stale_frees += 1;
                Ok(())
            }
        }
    }

    fn allocate<S: ScriptSink>(&mut self, address: u64, size: u64, sink: &mut S) -> io::Result<()> {
        let id = self.bind_fresh(address);
        self.emit(ScriptLine::Alloc { id, size }, sink)
    }

    fn reallocate<S: ScriptSink>(
        &mut self,
        address: u64,
        size: u64,
        sink: &mut S,
    ) -> io::Result<()> {
        let live = self
            .bindings
            .get(&address)
            .and_then(|ids| ids.choose(&mut self.rng))
            .copied();
        let id = match live {
            Some(id) => id,
            None => {
                let id = self.bind_fresh(address);
                self.stats.synthesized_allocs += 1;
                self.emit(
                    ScriptLine::Alloc {
                        id,
                        size: SYNTHESIZED_ALLOC_SIZE,
                    },
                    sink,
                )?;
                id
            }
        };
        self.emit(ScriptLine::Realloc { id, size }, sink)
    }

    fn bind_fresh(&mut self, address: u64) -> MemoryId {
        let id = self.next_id;
        self.next_id += 1;
        self.bindings.entry(address).or_default().push(id);
        id
    }

    fn emit<S: ScriptSink>(&mut self, line: ScriptLine, sink: &mut S) -> io::Result<()> {
        sink.push(line)?;
        self.stats.lines_emitted += 1;
        Ok(())
    }
}

/// Translate a whole trace, including the trailing flush.
pub fn translate_lines<I, L, R, S>(lines: I, rng: R, sink: &mut S) -> io::Result<TranslateStats>
where
    I: IntoIterator<Item = L>,
    L: AsRef<str>,
    R: Rng,
    S: ScriptSink,
{
    let mut translator = TraceTranslator::new(rng);
    for line in lines {
        translator.feed_line(line.as_ref(), sink)?;
    }
    translator.finish(sink)
}
