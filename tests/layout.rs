//! Variable layouts: length prefixes, counted and dynamic occurrences,
//! nested varying groups, and format buffers.

use datamap::{fbuf, field, ByteOrder, ErrorKind, Field, FieldOpts, Layout, LayoutOptions, Value};

fn network() -> LayoutOptions {
    LayoutOptions::default().byte_order(ByteOrder::Network)
}

fn offsets(layout: &Layout) -> Vec<usize> {
    layout.fields().map(Field::offset).collect()
}

#[test]
fn test_var2_length_includes_prefix() {
    let mut layout = Layout::with_options(
        "v",
        [field::string("s", 0).opt(FieldOpts::VAR2), field::uint1("after")],
        network(),
    )
    .expect("layout");
    assert!(layout.is_variable());
    let mut buf = [0u8; 16];
    let mut rec = layout.bind(&mut buf, 0);
    rec.prepare().expect("prepare empty");
    assert_eq!(rec.get("s").expect("s"), Value::from(""));

    rec.set("s", "hello").expect("set");
    assert_eq!(&buf[..7], &[0x00, 0x07, b'h', b'e', b'l', b'l', b'o']);

    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare fresh bind");
    assert_eq!(rec.get("s").expect("s"), Value::from("hello"));
    assert_eq!(rec.size(), 8);
    assert_eq!(layout.field("after").map(Field::offset), Some(7));

    let mut rec = layout.bind(&mut buf, 0);
    rec.prepare().expect("prepare");
    rec.set("after", 9).expect("after");
    assert_eq!(&buf[..8], &[0x00, 0x07, b'h', b'e', b'l', b'l', b'o', 9]);
}

#[test]
fn test_variable_write_before_prepare() {
    let mut layout = Layout::new("v", [field::string("s", 0).opt(FieldOpts::VAR1)]).expect("layout");
    let mut buf = [0u8; 4];
    let err = layout.bind(&mut buf, 0).set("s", "x").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidPosition { .. }));
}

#[test]
fn test_variable_write_before_prepare_keeps_earlier_fields() {
    let mut layout = Layout::with_options(
        "v",
        [field::uint2("a"), field::string("s", 0).opt(FieldOpts::VAR2)],
        network(),
    )
    .expect("layout");
    assert!(!layout.is_prepared());
    let mut buf = [0u8; 8];
    let mut rec = layout.bind(&mut buf, 0);
    rec.set("a", 0x1234).expect("a");
    let err = rec.set("s", "hi").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidPosition { .. }));
    assert_eq!(rec.get("a").expect("a"), Value::Int(0x1234));

    rec.prepare().expect("prepare");
    rec.set("s", "hi").expect("s after prepare");
    assert_eq!(&buf[..6], &[0x12, 0x34, 0x00, 0x04, b'h', b'i']);
    assert!(layout.is_prepared());

    layout.set_field_size("s", 3).expect("resize");
    assert!(!layout.is_prepared());
    let err = layout.bind(&mut buf, 0).set("s", "x").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidPosition { .. }));
}

#[test]
fn test_var1_overflow() {
    let mut layout = Layout::new("v", [field::bytes("b", 0).opt(FieldOpts::VAR1)]).expect("layout");
    let mut buf = vec![0u8; 300];
    let mut rec = layout.bind(&mut buf, 0);
    rec.prepare().expect("prepare");
    rec.set("b", vec![1u8; 254]).expect("254 bytes fit");
    let err = rec.set("b", vec![1u8; 255]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FieldOverflow { .. }));
    assert_eq!(buf[0], 255);
}

#[test]
fn test_var1_and_var4_prefixes() {
    let mut layout = Layout::with_options(
        "p",
        [
            field::string("one", 0).opt(FieldOpts::VAR1),
            field::string("empty", 0).opt(FieldOpts::VAR1),
            field::string("four", 0).opt(FieldOpts::VAR4),
        ],
        network(),
    )
    .expect("layout");
    let buf = [4, b'a', b'b', b'c', 0, 0, 0, 0, 6, b'x', b'y'];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    assert_eq!(rec.get("one").expect("one"), Value::from("abc"));
    assert_eq!(rec.get("empty").expect("empty"), Value::from(""));
    assert_eq!(rec.get("four").expect("four"), Value::from("xy"));
    assert_eq!(offsets(rec.layout()), vec![1, 5, 9]);
}

#[test]
fn test_counted_group() {
    let sub = Layout::new("pe", [field::string("a", 2), field::uint1("b")]).expect("sub");
    let mut layout = Layout::new(
        "rec",
        [field::uint1("cnt"), field::periodic("pe", sub, 0), field::uint1("tail")],
    )
    .expect("layout");
    let buf = [2, b'x', b'y', 1, b'z', b'z', 2, 0xEE];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    assert_eq!(rec.occurs("pe").expect("occurs"), 2);
    assert_eq!(rec.get("tail").expect("tail"), Value::Int(0xEE));
    assert_eq!(rec.size(), 8);
    let g = rec.group("pe", 1).expect("occurrence");
    assert_eq!(g.get("a").expect("a"), Value::from("zz"));
    assert_eq!(g.get("b").expect("b"), Value::Int(2));
}

#[test]
fn test_two_byte_count() {
    let sub = Layout::new("pe", [field::uint1("v")]).expect("sub");
    let mut layout = Layout::with_options(
        "rec",
        [field::uint2("cnt"), field::periodic("pe", sub, 0).occurs_counted(2)],
        network(),
    )
    .expect("layout");
    let buf = [0, 3, 7, 8, 9];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    let mut pe = rec.repeated("pe").expect("pe");
    assert_eq!(pe.len(), 3);
    assert_eq!(pe.record(2).expect("last").get("v").expect("v"), Value::Int(9));
}

#[test]
fn test_dynamic_occurs() {
    let mut layout = Layout::with_options(
        "dyn",
        [
            field::uint1("n"),
            field::int2("vals").occurs_fn(|ctx| ctx.get_int("n")),
            field::uint1("k"),
            field::uint1("prev").occurs_fn(|_| Ok(-1)),
        ],
        network(),
    )
    .expect("layout");
    let buf = [3, 0, 1, 0, 2, 0xFF, 0xFD, 2, 5, 6];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    assert_eq!(
        rec.get("vals").expect("vals"),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(-3)])
    );
    assert_eq!(
        rec.get("prev").expect("prev"),
        Value::List(vec![Value::Int(5), Value::Int(6)])
    );
}

#[test]
fn test_negative_occurs_rejected() {
    let mut layout = Layout::new("dyn", [field::uint1("x").occurs_fn(|_| Ok(-5))]).expect("layout");
    let buf = [0u8; 4];
    let err = layout.bind_ref(&buf, 0).prepare().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOccurs { count: -5, .. }));
}

#[test]
fn test_nested_varying_groups() {
    let item = Layout::new("item", [field::string("t", 0).opt(FieldOpts::VAR1)]).expect("item");
    let mut layout = Layout::new(
        "rec",
        [field::uint1("cnt"), field::periodic("pe", item, 0), field::uint1("end")],
    )
    .expect("layout");
    let buf = [2, 4, b'a', b'b', b'c', 3, b'x', b'y', 0x7F];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    assert_eq!(rec.get("end").expect("end"), Value::Int(0x7F));
    assert_eq!(rec.size(), 9);
    assert_eq!(
        rec.group("pe", 0).expect("first").get("t").expect("t"),
        Value::from("abc")
    );
    let second = rec.group("pe", 1).expect("second");
    assert_eq!(second.offset(), 5);
    assert_eq!(second.get("t").expect("t"), Value::from("xy"));
}

#[test]
fn test_count_beyond_buffer() {
    let item = Layout::new("item", [field::string("t", 0).opt(FieldOpts::VAR1)]).expect("item");
    let mut layout = Layout::new("rec", [field::uint1("cnt"), field::periodic("pe", item, 0)]).expect("layout");
    let buf = [200, 1, 1];
    let err = layout.bind_ref(&buf, 0).prepare().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOccurs { count: 200, .. }));
    assert!(!err.to_string().contains("-1"));
}

#[test]
fn test_size_function() {
    let mut layout = Layout::new(
        "sz",
        [
            field::uint1("len"),
            field::string("s", 0).size_fn(|ctx| Ok(usize::try_from(ctx.get_int("len")?).unwrap_or(0))),
            field::uint1("tail"),
        ],
    )
    .expect("layout");
    let buf = [3, b'a', b'b', b'c', 9];
    let mut rec = layout.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    assert_eq!(rec.get("s").expect("s"), Value::from("abc"));
    assert_eq!(rec.get("tail").expect("tail"), Value::Int(9));
}

#[test]
fn test_prepare_is_deterministic() {
    let mut fixed = Layout::new(
        "f",
        [field::string("a", 3), field::int4("b"), field::packed("c", 2).occurs(2)],
    )
    .expect("layout");
    let before = offsets(&fixed);
    let buf = [0u8; 11];
    let mut rec = fixed.bind_ref(&buf, 0);
    rec.prepare().expect("prepare");
    rec.prepare().expect("prepare again");
    assert_eq!(offsets(&fixed), before);
    assert_eq!(fixed.size(), 11);

    let mut var = Layout::new(
        "v",
        [field::string("a", 0).opt(FieldOpts::VAR1), field::uint1("b")],
    )
    .expect("layout");
    let buf = [3, b'h', b'i', 1];
    var.bind_ref(&buf, 0).prepare().expect("prepare");
    let first = offsets(&var);
    var.bind_ref(&buf, 0).prepare().expect("prepare again");
    assert_eq!(offsets(&var), first);
    assert_eq!(first, vec![1, 3]);
}

#[test]
fn test_reset_keeps_prefixes() {
    let mut layout = Layout::with_options(
        "r",
        [field::string("s", 0).opt(FieldOpts::VAR2), field::int2("n")],
        network(),
    )
    .expect("layout");
    let mut buf = [0x00, 0x05, b'a', b'b', b'c', 0x12, 0x34];
    let mut rec = layout.bind(&mut buf, 0);
    rec.prepare().expect("prepare");
    rec.reset_all().expect("reset");
    assert_eq!(buf, [0x00, 0x05, b' ', b' ', b' ', 0, 0]);
}

#[test]
fn test_format_buffer_layout() -> anyhow::Result<()> {
    let specs = fbuf::parse("AA,4,A,AB,4,P,2X,AC1-2,2,F.")?;
    let mut layout = Layout::with_options("fb", specs, network())?;
    assert_eq!(layout.size(), 4 + 4 + 2 + 4);
    assert_eq!(layout.format_buffer(), "AA,4,A,AB,4,P,2X,AC1-2,2,F.");
    assert_eq!(
        layout.field_definition("AB"),
        Some(("AB".to_string(), 4, "P"))
    );
    let mut buf = vec![0u8; layout.size()];
    let mut rec = layout.bind(&mut buf, 0);
    rec.update([("AA", Value::from("ok")), ("AB", Value::Int(-1))])?;
    rec.set("AC", vec![Value::Int(1), Value::Int(2)])?;
    assert_eq!(buf, [b'o', b'k', b' ', b' ', 0, 0, 0, 0x1D, 0, 0, 0, 1, 0, 2]);
    Ok(())
}

#[test]
fn test_layout_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Layout>();
}
