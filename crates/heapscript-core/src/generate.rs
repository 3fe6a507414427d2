//! Synthetic script generation from directives.
//!
//! Three independent cursors walk the id space. Allocations take fresh ids in
//! order. Frees start at the free cursor and skip every other id, so freed
//! blocks stay separated by live ones and a coalescing allocator cannot merge
//! them. Reallocs cycle round-robin over the live ids.

use std::collections::BTreeMap;
use std::io;

use rand::Rng;
use serde::Serialize;

use crate::directive::{Count, Directive, RANDOM_HIGH_BOUNDS, RANDOM_LOW_BOUNDS, SizeSpec, Verb};
use crate::script::{MemoryId, ScriptLine, ScriptSink};

/// Distance the free cursor moves after each free.
pub const FREE_STRIDE: MemoryId = 2;

/// Counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateStats {
    pub allocs: usize,
    pub reallocs: usize,
    pub frees: usize,
    /// Frees emitted by the end-of-run cleanup.
    pub cleanup_frees: usize,
    /// Free directives that ran out of allocated ids before their count.
    pub short_directives: usize,
    /// Whether `-leak` ended the run.
    pub leaked: bool,
    pub live_at_end: usize,
}

#[derive(Debug, Clone, Copy)]
enum SizeDraw {
    Fixed(u64),
    Uniform(u64, u64),
}

/// Stateful directive interpreter.
pub struct PatternGenerator<R: Rng> {
    /// Live id -> size at allocation. Ids are handed out in increasing order,
    /// so key order is insertion order.
    live: BTreeMap<MemoryId, u64>,
    alloc_cursor: MemoryId,
    free_cursor: MemoryId,
    realloc_cursor: MemoryId,
    rng: R,
    stats: GenerateStats,
}

impl<R: Rng> PatternGenerator<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self {
            live: BTreeMap::new(),
            alloc_cursor: 0,
            free_cursor: 0,
            realloc_cursor: 0,
            rng,
            stats: GenerateStats::default(),
        }
    }

    /// Run every directive, then free whatever is still live unless a
    /// `-leak` directive stopped the run first.
    pub fn run<S: ScriptSink>(
        mut self,
        directives: &[Directive],
        sink: &mut S,
    ) -> io::Result<GenerateStats> {
        for directive in directives {
            match directive.verb {
                Verb::Alloc => self.alloc(directive, sink)?,
                Verb::Free => self.free(directive, sink)?,
                Verb::Realloc => self.realloc(directive, sink)?,
                Verb::Leak => {
                    self.stats.leaked = true;
                    self.stats.live_at_end = self.live.len();
                    return Ok(self.stats);
                }
            }
        }

        let live = std::mem::take(&mut self.live);
        for id in live.into_keys() {
            sink.push(ScriptLine::Free { id })?;
            self.stats.cleanup_frees += 1;
        }
        Ok(self.stats)
    }

    fn alloc<S: ScriptSink>(&mut self, directive: &Directive, sink: &mut S) -> io::Result<()> {
        // There is no "every live id" for fresh allocations.
        let Count::Exactly(count) = directive.count else {
            return Ok(());
        };
        let draw = self.resolve_sizes(directive.sizes);
        for _ in 0..count {
            let id = self.alloc_cursor;
            let size = self.draw(draw);
            self.live.insert(id, size);
            sink.push(ScriptLine::Alloc { id, size })?;
            self.alloc_cursor += 1;
            self.stats.allocs += 1;
        }
        Ok(())
    }

    fn free<S: ScriptSink>(&mut self, directive: &Directive, sink: &mut S) -> io::Result<()> {
        let count = self.resolve_count(directive.count);
        for _ in 0..count {
            if self.live.remove(&self.free_cursor).is_none() {
                self.stats.short_directives += 1;
                break;
            }
            sink.push(ScriptLine::Free {
                id: self.free_cursor,
            })?;
            self.free_cursor += FREE_STRIDE;
            self.stats.frees += 1;
        }
        Ok(())
    }

    fn realloc<S: ScriptSink>(&mut self, directive: &Directive, sink: &mut S) -> io::Result<()> {
        if self.live.is_empty() {
            return Ok(());
        }
        let count = self.resolve_count(directive.count);
        let draw = self.resolve_sizes(directive.sizes);
        // Every live id is below the alloc cursor, so the skip loop terminates.
        let span = self.alloc_cursor;
        for _ in 0..count {
            while !self.live.contains_key(&self.realloc_cursor) {
                self.realloc_cursor = (self.realloc_cursor + 1) % span;
            }
            let size = self.draw(draw);
            sink.push(ScriptLine::Realloc {
                id: self.realloc_cursor,
                size,
            })?;
            self.realloc_cursor = (self.realloc_cursor + 1) % span;
            self.stats.reallocs += 1;
        }
        Ok(())
    }

    fn resolve_count(&self, count: Count) -> usize {
        match count {
            Count::Exactly(n) => n,
            Count::AllLive => self.live.len(),
        }
    }

    fn resolve_sizes(&mut self, sizes: SizeSpec) -> SizeDraw {
        match sizes {
            SizeSpec::Exactly(size) => SizeDraw::Fixed(size),
            SizeSpec::Between(low, high) => SizeDraw::Uniform(low, high),
            SizeSpec::Random => {
                let low = self.rng.gen_range(RANDOM_LOW_BOUNDS.0..=RANDOM_LOW_BOUNDS.1);
                let high = self
                    .rng
                    .gen_range(RANDOM_HIGH_BOUNDS.0..=RANDOM_HIGH_BOUNDS.1);
                SizeDraw::Uniform(low, high)
            }
        }
    }

    fn draw(&mut self, draw: SizeDraw) -> u64 {
        match draw {
            SizeDraw::Fixed(size) => size,
            SizeDraw::Uniform(low, high) => self.rng.gen_range(low..=high),
        }
    }
}

/// Generate a script for `directives` in one call.
pub fn generate<R: Rng, S: ScriptSink>(
    directives: &[Directive],
    rng: R,
    sink: &mut S,
) -> io::Result<GenerateStats> {
    PatternGenerator::new(rng).run(directives, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::parse_directives;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn run(tokens: &[&str]) -> (Vec<String>, GenerateStats) {
        let directives = parse_directives(tokens).unwrap();
        let mut out = Vec::new();
        let stats = generate(&directives, ChaCha8Rng::seed_from_u64(11), &mut out).unwrap();
        (out.iter().map(ToString::to_string).collect(), stats)
    }

    #[test]
    fn free_all_skips_every_other_id() {
        let (out, stats) = run(&["-alloc(100)", "6", "-free", "-leak"]);
        assert_eq!(
            out,
            ["a 0 100", "a 1 100", "a 2 100", "a 3 100", "a 4 100", "a 5 100", "f 0", "f 2", "f 4"]
        );
        assert_eq!(stats.short_directives, 1);
        assert_eq!(stats.live_at_end, 3);
        assert!(stats.leaked);
    }

    #[test]
    fn explicit_free_count_stops_at_count() {
        let (out, _) = run(&["-alloc(8)", "5", "-free", "2", "-leak"]);
        assert_eq!(&out[5..], ["f 0", "f 2"]);
    }

    #[test]
    fn cleanup_frees_in_insertion_order() {
        let (out, stats) = run(&["-alloc(100)", "3"]);
        assert_eq!(out, ["a 0 100", "a 1 100", "a 2 100", "f 0", "f 1", "f 2"]);
        assert_eq!(stats.cleanup_frees, 3);
        assert!(!stats.leaked);
        assert_eq!(stats.live_at_end, 0);
    }

    #[test]
    fn second_free_directive_continues_the_stride() {
        let (out, _) = run(&["-alloc(8)", "8", "-free", "2", "-free", "2", "-leak"]);
        assert_eq!(&out[8..], ["f 0", "f 2", "f 4", "f 6"]);
    }

    #[test]
    fn realloc_all_visits_each_live_id_once() {
        let (out, stats) = run(&["-alloc(8)", "3", "-realloc(64)", "-leak"]);
        assert_eq!(&out[3..], ["r 0 64", "r 1 64", "r 2 64"]);
        assert_eq!(stats.reallocs, 3);
    }

    #[test]
    fn realloc_skips_freed_gaps_and_wraps() {
        let (out, _) = run(&["-alloc(8)", "4", "-free", "2", "-realloc(32)", "5", "-leak"]);
        assert_eq!(
            &out[6..],
            ["r 1 32", "r 3 32", "r 1 32", "r 3 32", "r 1 32"]
        );
    }

    #[test]
    fn realloc_terminates_when_only_high_ids_survive() {
        // Live {3, 5}: wrapping on the live count alone would never reach them.
        let (out, _) = run(&["-alloc(8)", "6", "-free", "-realloc(16)", "4", "-leak"]);
        assert_eq!(&out[9..], ["r 1 16", "r 3 16", "r 5 16", "r 1 16"]);
    }

    #[test]
    fn realloc_with_nothing_live_emits_nothing() {
        let (out, stats) = run(&["-realloc(16)", "4"]);
        assert!(out.is_empty());
        assert_eq!(stats.reallocs, 0);
    }

    #[test]
    fn leak_ignores_later_directives() {
        let (out, _) = run(&["-alloc(8)", "1", "-leak", "-alloc(8)", "5"]);
        assert_eq!(out, ["a 0 8"]);
    }

    #[test]
    fn ranged_sizes_stay_in_bounds() {
        for seed in 0..20 {
            let directives = parse_directives(["-alloc(50,60)", "40", "-realloc(70,75)"]).unwrap();
            let mut out = Vec::new();
            generate(&directives, ChaCha8Rng::seed_from_u64(seed), &mut out).unwrap();
            for line in &out {
                match *line {
                    ScriptLine::Alloc { size, .. } => assert!((50..=60).contains(&size)),
                    ScriptLine::Realloc { size, .. } => assert!((70..=75).contains(&size)),
                    ScriptLine::Free { .. } => {}
                }
            }
        }
    }

    #[test]
    fn implicit_sizes_stay_within_the_widest_range() {
        let directives = parse_directives(["-alloc", "200"]).unwrap();
        let mut out = Vec::new();
        generate(&directives, ChaCha8Rng::seed_from_u64(3), &mut out).unwrap();
        let low = RANDOM_LOW_BOUNDS.0;
        let high = RANDOM_HIGH_BOUNDS.1;
        assert!(
            out.iter()
                .filter_map(ScriptLine::size)
                .all(|size| (low..=high).contains(&size))
        );
    }

    #[test]
    fn same_seed_same_script() {
        let directives = parse_directives(["-alloc", "50", "-realloc", "-free"]).unwrap();
        let mut first = Vec::new();
        let mut second = Vec::new();
        generate(&directives, ChaCha8Rng::seed_from_u64(99), &mut first).unwrap();
        generate(&directives, ChaCha8Rng::seed_from_u64(99), &mut second).unwrap();
        assert_eq!(first, second);
    }
}
