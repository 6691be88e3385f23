//! Integration tests: bind layouts to buffers, read and write every field
//! family, repeating groups, standalone fpack/funpack.

use chrono::NaiveDate;
use datamap::{
    field, fpack, funpack, ByteOrder, DtKind, ErrorKind, FieldOpts, Layout, LayoutOptions,
    NumFormat, TextEncoding, Value,
};

fn network() -> LayoutOptions {
    LayoutOptions::default().byte_order(ByteOrder::Network)
}

#[test]
#[cfg(target_endian = "little")]
fn test_str8_bar_native() {
    let mut layout = Layout::new("mymap", [field::string("foo", 6), field::int2("bar")]).expect("layout");
    assert_eq!(layout.size(), 8);
    let mut buf = [0u8; 8];
    let mut rec = layout.bind(&mut buf, 0);
    rec.set("bar", 255).expect("bar");
    rec.set("foo", "abcdef").expect("foo");
    assert_eq!(
        rec.items(&[]).expect("items"),
        vec![
            ("foo".to_string(), Value::from("abcdef")),
            ("bar".to_string(), Value::Int(255)),
        ]
    );
    assert_eq!(buf, [0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0xFF, 0x00]);
}

#[test]
fn test_byte_order_sensitivity() {
    let specs = || [field::uint4("x")];
    let mut net = Layout::with_options("n", specs(), network()).expect("layout");
    let mut buf = [0u8; 4];
    net.bind(&mut buf, 0).set("x", 0x0102_0304u32).expect("set");
    assert_eq!(buf, [1, 2, 3, 4]);

    let mut native = Layout::new("h", specs()).expect("layout");
    let rec = native.bind(&mut buf, 0);
    let expected = u32::from_ne_bytes([1, 2, 3, 4]);
    assert_eq!(rec.get("x").expect("get"), Value::from(expected));

    native.set_byte_order(ByteOrder::Network);
    assert_eq!(native.bind(&mut buf, 0).get("x").expect("get"), Value::Int(0x0102_0304));
}

#[test]
fn test_nwbo_overrides_layout_order() {
    let mut layout = Layout::new("r", [field::int2("n").opt(FieldOpts::NWBO)]).expect("layout");
    let mut buf = [0u8; 2];
    layout.bind(&mut buf, 0).set("n", -2).expect("set");
    assert_eq!(buf, [0xFF, 0xFE]);
}

#[test]
fn test_bind_at_offset() {
    let mut layout = Layout::with_options("r", [field::uint2("a"), field::string("b", 3)], network())
        .expect("layout");
    let mut buf = [0xEEu8; 9];
    {
        let mut rec = layout.bind(&mut buf, 4);
        rec.set("a", 0xABCD).expect("a");
        rec.set("b", "xy").expect("b");
        assert_eq!(rec.get("b").expect("b"), Value::from("xy"));
    }
    assert_eq!(buf, [0xEE, 0xEE, 0xEE, 0xEE, 0xAB, 0xCD, b'x', b'y', b' ']);
}

#[test]
fn test_bind_default_uses_option_offset() {
    let mut layout =
        Layout::with_options("r", [field::uint1("a")], LayoutOptions::default().offset(2)).expect("layout");
    let mut buf = [0u8; 3];
    layout.bind_default(&mut buf).set("a", 7).expect("set");
    assert_eq!(buf, [0, 0, 7]);
}

#[test]
fn test_decimal_fields() {
    let mut layout = Layout::new(
        "dec",
        [field::packed("p", 3), field::unpacked("u", 4)],
    )
    .expect("layout");
    let mut buf = [0u8; 7];
    let mut rec = layout.bind(&mut buf, 0);
    rec.set("p", -12345).expect("p");
    rec.set("u", 42).expect("u");
    assert_eq!(rec.get("p").expect("p"), Value::Int(-12345));
    assert_eq!(rec.get("u").expect("u"), Value::Int(42));
    let err = rec.set("p", 1_000_000).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FieldOverflow { .. }));
    assert_eq!(err.layout(), "dec");
    assert_eq!(buf, [0x12, 0x34, 0x5D, b'0', b'0', b'4', b'2']);
}

#[test]
fn test_ebcdic_layout() {
    let mut layout = Layout::with_options(
        "e",
        [field::string("s", 4), field::unpacked("z", 2)],
        LayoutOptions::default().ebcdic(true),
    )
    .expect("layout");
    assert_eq!(layout.text_encoding(), TextEncoding::Cp037);
    let mut buf = [0u8; 6];
    let mut rec = layout.bind(&mut buf, 0);
    rec.set("s", "AB").expect("s");
    rec.set("z", -7).expect("z");
    assert_eq!(rec.get("s").expect("s"), Value::from("AB"));
    assert_eq!(rec.get("z").expect("z"), Value::Int(-7));
    assert_eq!(buf, [0xC1, 0xC2, 0x40, 0x40, 0xF0, 0xD7]);
}

#[test]
fn test_packed_date() {
    let mut layout = Layout::new("d", [field::packed("day", 5).dt(DtKind::Date)]).expect("layout");
    let mut buf = [0u8; 5];
    let mut rec = layout.bind(&mut buf, 0);
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).expect("date");
    rec.set("day", day).expect("set");
    assert_eq!(rec.get("day").expect("get"), Value::Date(day));
    rec.set("day", Value::Null).expect("clear");
    assert_eq!(rec.get("day").expect("get"), Value::Null);
    rec.set("day", day).expect("set");
    assert_eq!(buf, [0x02, 0x02, 0x40, 0x22, 0x9C]);
}

#[test]
fn test_repeating_group_index() {
    let qq = Layout::new("QQQ", [field::string("a", 2), field::int1("b")]).expect("sub");
    let mut layout = Layout::new("rec", [field::uint1("h"), field::periodic("qqq", qq, 3)]).expect("layout");
    assert_eq!(layout.size(), 1 + 3 * 3);
    let mut buf = [0u8; 10];
    let mut rec = layout.bind(&mut buf, 0);
    {
        let mut g = rec.group("qqq", 1).expect("occurrence 1");
        g.set("a", "hi").expect("a");
        g.set("b", -1).expect("b");
    }
    assert!(rec.group("qqq", 2).is_ok());
    let err = rec.group("qqq", 3).err().expect("out of range");
    assert_eq!(
        err.kind(),
        &ErrorKind::IndexOutOfRange {
            field: "qqq".to_string(),
            index: 3,
            occurs: 3,
        }
    );
    assert!(matches!(rec.get("qqq").unwrap_err().kind(), ErrorKind::Composite(_)));
    assert_eq!(&buf[4..7], &[b'h', b'i', 0xFF]);
}

#[test]
fn test_repeating_scalar_list() {
    let mut layout = Layout::with_options("r", [field::int2("m").occurs(3)], network()).expect("layout");
    let mut buf = [0u8; 6];
    let mut rec = layout.bind(&mut buf, 0);
    rec.set("m", vec![Value::Int(1), Value::Int(-1)]).expect("set");
    rec.set_at("m", 2, 5).expect("set_at");
    assert_eq!(rec.get_at("m", 1).expect("get_at"), Value::Int(-1));
    assert_eq!(
        rec.get("m").expect("get"),
        Value::List(vec![Value::Int(1), Value::Int(-1), Value::Int(5)])
    );
    assert_eq!(buf, [0, 1, 0xFF, 0xFF, 0, 5]);
}

#[test]
fn test_unknown_field() {
    let mut layout = Layout::new("r", [field::uint1("a")]).expect("layout");
    let mut buf = [0u8; 1];
    let rec = layout.bind(&mut buf, 0);
    let err = rec.get("b").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::UnknownField("b".to_string()));
    assert!(err.to_string().contains("'r'"));
}

#[test]
fn test_fpack_funpack() -> anyhow::Result<()> {
    assert_eq!(fpack(234, NumFormat::Packed, 2, ByteOrder::Native, false)?, vec![0x23, 0x4C]);
    assert_eq!(
        funpack(&[0x23, 0x4D], NumFormat::Packed, ByteOrder::Native, false)?,
        Value::Int(-234)
    );
    assert_eq!(fpack(-5, NumFormat::Unpacked, 2, ByteOrder::Native, true)?, vec![0xF0, 0xD5]);
    assert_eq!(fpack(258, NumFormat::Fixpoint, 2, ByteOrder::Network, false)?, vec![1, 2]);
    assert_eq!(
        funpack(&[0xFF, 0xFE], NumFormat::Fixpoint, ByteOrder::Network, false)?,
        Value::Int(-2)
    );
    assert!(fpack(1000, NumFormat::Packed, 2, ByteOrder::Native, false).is_err());
    Ok(())
}

#[test]
fn test_options_from_json() -> anyhow::Result<()> {
    let opts = LayoutOptions::from_json(r#"{"byteOrder": "network", "encoding": "cp500", "dmlen": 12}"#)?;
    let layout = Layout::with_options("j", [field::uint2("a")], opts)?;
    assert_eq!(layout.size(), 12);
    assert!(layout.is_ebcdic());
    assert_eq!(layout.byte_order(), ByteOrder::Network);
    let err = LayoutOptions::from_json(r#"{"colour": 1}"#).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownOption(_)));
    Ok(())
}
