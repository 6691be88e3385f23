//! Benchmark: field access through a bound record. Fixed layout get/set,
//! packed and zoned decimal conversion, and prepare() over a buffer of
//! length-prefixed records.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use datamap::{field, fpack, funpack, ByteOrder, FieldOpts, Layout, LayoutOptions, NumFormat, Value};

fn customer() -> Layout {
    Layout::with_options(
        "customer",
        [
            field::string("name", 20),
            field::packed("balance", 6),
            field::unpacked("branch", 4),
            field::int4("id"),
            field::uint2("flags").opt(FieldOpts::HEX),
            field::double("rate"),
        ],
        LayoutOptions::default().byte_order(ByteOrder::Network),
    )
    .expect("layout")
}

/// `count` repeats of a 1-byte-prefixed name, counted by the leading byte.
fn varying(count: u8) -> (Layout, Vec<u8>) {
    let item = Layout::new("item", [field::string("name", 0).opt(FieldOpts::VAR1)]).expect("item");
    let layout = Layout::new("list", [field::uint1("n"), field::periodic("items", item, 0)]).expect("layout");
    let mut buf = vec![count];
    for i in 0..count {
        let name = format!("item-{i}");
        buf.push(name.len() as u8 + 1);
        buf.extend_from_slice(name.as_bytes());
    }
    (layout, buf)
}

fn bench_fixed(c: &mut Criterion) {
    let mut layout = customer();
    let mut buf = vec![0u8; layout.size()];

    c.bench_function("set_fixed_record", |b| {
        b.iter(|| {
            let mut rec = layout.bind(&mut buf, 0);
            rec.set("name", black_box("Jane Doe")).expect("name");
            rec.set("balance", black_box(-1_234_567)).expect("balance");
            rec.set("branch", black_box(42)).expect("branch");
            rec.set("id", black_box(77)).expect("id");
            rec.set("flags", black_box(0x0F)).expect("flags");
            rec.set("rate", black_box(0.035)).expect("rate");
        })
    });

    c.bench_function("get_fixed_record", |b| {
        b.iter(|| {
            let rec = layout.bind(&mut buf, 0);
            for name in ["name", "balance", "branch", "id", "flags", "rate"] {
                black_box(rec.get(name).expect("get"));
            }
        })
    });
}

fn bench_decimal(c: &mut Criterion) {
    c.bench_function("fpack_packed_8", |b| {
        b.iter(|| fpack(black_box(-123_456_789_012i64), NumFormat::Packed, 8, ByteOrder::Native, false))
    });
    let packed = fpack(-123_456_789_012i64, NumFormat::Packed, 8, ByteOrder::Native, false).expect("fpack");
    c.bench_function("funpack_packed_8", |b| {
        b.iter(|| funpack(black_box(&packed), NumFormat::Packed, ByteOrder::Native, false))
    });
    c.bench_function("fpack_zoned_ebcdic_10", |b| {
        b.iter(|| fpack(black_box(Value::Int(-98_765)), NumFormat::Unpacked, 10, ByteOrder::Native, true))
    });
}

fn bench_prepare(c: &mut Criterion) {
    let (mut layout, buf) = varying(200);
    c.bench_function("prepare_200_varying_items", |b| {
        b.iter(|| {
            let mut rec = layout.bind_ref(black_box(&buf), 0);
            rec.prepare().expect("prepare");
            black_box(rec.size())
        })
    });
}

criterion_group!(benches, bench_fixed, bench_decimal, bench_prepare);
criterion_main!(benches);
