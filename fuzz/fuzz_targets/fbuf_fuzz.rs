//! Format buffer fuzz target: feed arbitrary text to the format buffer
//! parser and build a layout from whatever parses. Neither may panic.
//! Build with: cargo fuzz run fbuf_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(specs) = datamap::fbuf::parse(s) {
        if let Ok(layout) = datamap::Layout::new("fuzz", specs) {
            let _ = layout.format_buffer();
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run fbuf_fuzz");
}
