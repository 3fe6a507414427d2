#![no_main]
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use heapscript_core::{ScriptWriter, parse_script, translate_lines, validate_entries};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for line in text.lines() {
        if let Some(call) = heapscript_core::decode(line) {
            assert_ne!(call.address, 0);
        }
    }

    // Whatever the trace, the persisted script must read back as a valid one.
    let mut writer = ScriptWriter::new(Vec::new());
    let stats = translate_lines(text.lines(), ChaCha8Rng::seed_from_u64(0), &mut writer).unwrap();
    let bytes = writer.into_inner().unwrap();
    let script = std::str::from_utf8(&bytes).unwrap();

    let entries = parse_script(script).unwrap();
    assert_eq!(entries.len(), stats.lines_emitted);
    let summary = validate_entries(&entries).unwrap();
    assert_eq!(summary.live_at_end, 0);
});
