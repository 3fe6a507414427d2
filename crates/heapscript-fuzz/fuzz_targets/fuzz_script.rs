#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(entries) = heapscript_core::parse_script(text) else {
        return;
    };

    // Accepted scripts re-render to text that parses to the same lines.
    let rendered: Vec<String> = entries.iter().map(|e| e.line.to_string()).collect();
    let reparsed = heapscript_core::parse_script(&rendered.join("\n")).unwrap();
    assert_eq!(reparsed.len(), entries.len());
    for (a, b) in entries.iter().zip(&reparsed) {
        assert_eq!(a.line, b.line);
    }

    if let Err(err) = heapscript_core::validate_entries(&entries) {
        assert!(entries.iter().any(|e| e.lineno == err.line()));
    }
});
