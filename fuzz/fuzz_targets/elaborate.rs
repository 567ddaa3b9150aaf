#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_syntax::ModuleLocation;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Whatever parses must also resolve and elaborate without panicking.
        let (module, _) = quill_syntax::parse(s, ModuleLocation::parse("fuzz"));
        let resolved = quill_resolve::resolve(&module, &[], None);
        let _ = quill_core::elaborate(&resolved.module, &[], None);
    }
});
