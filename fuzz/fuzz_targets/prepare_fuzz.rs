//! prepare() fuzz target: walk a variable layout over arbitrary bytes and
//! read every field. Errors are fine, panics are not.
//! Build with: cargo fuzz run prepare_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use datamap::{field, FieldOpts, Layout};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn layout() -> Layout {
    let item = Layout::new(
        "item",
        [
            field::string("name", 0).opt(FieldOpts::VAR1),
            field::packed("amount", 3),
            field::bytes("tag", 0).opt(FieldOpts::VAR2),
        ],
    )
    .expect("item");
    Layout::new(
        "fuzz",
        [
            field::uint1("n"),
            field::periodic("items", item, 0),
            field::utf8("note", 0).opt(FieldOpts::VAR4),
            field::uint2("codes").occurs_fn(|ctx| ctx.get_int("n")),
        ],
    )
    .expect("layout")
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut layout = layout();
    let mut rec = layout.bind_ref(data, 0);
    if rec.prepare().is_err() {
        return;
    }
    let _ = rec.get("note");
    let _ = rec.get("codes");
    let n = rec.occurs("items").unwrap_or(0);
    for i in 0..n {
        if let Ok(g) = rec.group("items", i) {
            let _ = g.get("name");
            let _ = g.get("amount");
            let _ = g.get("tag");
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run prepare_fuzz");
}
