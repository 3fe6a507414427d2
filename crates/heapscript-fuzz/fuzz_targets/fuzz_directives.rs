#![no_main]
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use heapscript_core::{Count, ScriptWriter, Verb, parse_script, validate_entries};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(directives) = heapscript_core::parse_directives(text.split_whitespace()) else {
        return;
    };

    // Keep the output bounded.
    let total: usize = directives
        .iter()
        .map(|d| match (d.verb, d.count) {
            (Verb::Leak, _) | (_, Count::AllLive) => 0,
            (_, Count::Exactly(n)) => n,
        })
        .fold(0, usize::saturating_add);
    if total > 100_000 {
        return;
    }

    let mut writer = ScriptWriter::new(Vec::new());
    heapscript_core::generate(&directives, ChaCha8Rng::seed_from_u64(0), &mut writer).unwrap();
    let bytes = writer.into_inner().unwrap();
    let entries = parse_script(std::str::from_utf8(&bytes).unwrap()).unwrap();
    validate_entries(&entries).unwrap();
});
