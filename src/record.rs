//! A layout bound to a caller's buffer.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use crate::codec::Endianness;
use crate::dump;
use crate::error::{ErrorKind, Result};
use crate::field::{FieldOpts, FieldType};
use crate::layout::{Field, Layout};
use crate::repeat::Repeated;
use crate::value::Value;

/// Borrowed buffer of a record.
pub(crate) enum Buf<'a> {
    Shared(&'a [u8]),
    Exclusive(&'a mut [u8]),
}

impl<'a> Buf<'a> {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Buf::Shared(b) => *b,
            Buf::Exclusive(b) => &**b,
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Buf::Shared(_) => None,
            Buf::Exclusive(b) => Some(&mut **b),
        }
    }

    fn reborrow(&mut self) -> Buf<'_> {
        match self {
            Buf::Shared(b) => Buf::Shared(*b),
            Buf::Exclusive(b) => Buf::Exclusive(&mut **b),
        }
    }
}

/// Field access to a buffer through a [`Layout`], the layout starting at
/// `offset()` within the buffer.
///
/// ```
/// use datamap::{field, Layout};
///
/// let mut layout = Layout::new("rec", [field::string("name", 6), field::packed("amount", 3)]).unwrap();
/// let mut buf = vec![0u8; layout.size()];
/// let mut rec = layout.bind(&mut buf, 0);
/// rec.set("name", "abc").unwrap();
/// rec.set("amount", -1234).unwrap();
/// assert_eq!(rec.get("amount").unwrap().as_i64(), Some(-1234));
/// assert_eq!(&buf[..], b"abc   \x01\x23\x4d");
/// ```
pub struct Record<'a> {
    pub(crate) layout: &'a mut Layout,
    buf: Buf<'a>,
    base: usize,
}

impl<'a> Record<'a> {
    pub(crate) fn new(layout: &'a mut Layout, buf: Buf<'a>, base: usize) -> Record<'a> {
        Record { layout, buf, base }
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    /// Start of the layout within the buffer.
    pub fn offset(&self) -> usize {
        self.base
    }

    pub fn buffer(&self) -> &[u8] {
        self.buf.bytes()
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Compute field positions, sizes and occurrence counts from the
    /// buffer contents. Required after binding a variable layout.
    pub fn prepare(&mut self) -> Result<()> {
        let Record { layout, buf, base } = self;
        layout.prepare_at(buf.bytes(), *base, None)
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.layout.read_named(self.buf.bytes(), self.base, name)
    }

    pub fn get_at(&self, name: &str, index: usize) -> Result<Value> {
        let i = self.layout.lookup(name)?;
        self.read_field(i, index)
    }

    /// Live occurrence count of a field.
    pub fn occurs(&self, name: &str) -> Result<usize> {
        let i = self.layout.lookup(name)?;
        Ok(self.layout.fields[i].occurs())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let i = self.layout.lookup(name)?;
        let f = &self.layout.fields[i];
        if f.is_group() {
            return Err(self.layout.err(ErrorKind::Composite(name.to_string())));
        }
        if !f.opts.writable() {
            return Err(self.layout.err(ErrorKind::ReadOnly {
                field: name.to_string(),
            }));
        }
        match (f.is_repeating(), value) {
            (true, Value::List(items)) => {
                if items.len() > f.occurs {
                    return Err(self.layout.err(ErrorKind::TooManyValues {
                        field: name.to_string(),
                        given: items.len(),
                        occurs: f.occurs,
                    }));
                }
                for (ix, v) in items.iter().enumerate() {
                    self.write_field(i, ix, v, true)?;
                }
                Ok(())
            }
            (true, other) => Err(self.layout.err(ErrorKind::TypeMismatch {
                field: name.to_string(),
                expected: "list",
                got: other.type_name(),
            })),
            (false, Value::List(_)) => Err(self.layout.err(ErrorKind::NotRepeating(name.to_string()))),
            (false, v) => self.write_field(i, 0, &v, true),
        }
    }

    pub fn set_at(&mut self, name: &str, index: usize, value: impl Into<Value>) -> Result<()> {
        let i = self.layout.lookup(name)?;
        if self.layout.fields[i].is_group() {
            return Err(self.layout.err(ErrorKind::Composite(name.to_string())));
        }
        self.write_field(i, index, &value.into(), true)
    }

    /// Access to the occurrences of a repeating field or group.
    pub fn repeated(&mut self, name: &str) -> Result<Repeated<'_, 'a>> {
        let i = self.layout.lookup(name)?;
        if !self.layout.fields[i].is_repeating() {
            return Err(self.layout.err(ErrorKind::NotRepeating(name.to_string())));
        }
        Ok(Repeated::new(self, i))
    }

    /// Occurrence `index` of a periodic group as a record over the same buffer.
    pub fn group(&mut self, name: &str, index: usize) -> Result<Record<'_>> {
        let i = self.layout.lookup(name)?;
        self.occurrence_record(i, index)
    }

    /// Set every writable field to its empty value: blanks for text,
    /// zeros for numbers and bytes, `Null` for dates.
    pub fn reset_all(&mut self) -> Result<()> {
        for i in 0..self.layout.fields.len() {
            let f = &self.layout.fields[i];
            let occurs = f.occurs();
            if f.is_group() {
                for ix in 0..occurs {
                    self.occurrence_record(i, ix)?.reset_all()?;
                }
                continue;
            }
            if !f.opts.writable() {
                continue;
            }
            let empty = empty_value(f);
            for ix in 0..occurs {
                self.write_field(i, ix, &empty, false)?;
            }
        }
        Ok(())
    }

    /// Set several fields in order. Stops at the first error; fields set
    /// before it keep their new values.
    pub fn update<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (k, v) in pairs {
            self.set(k.as_ref(), v)?;
        }
        Ok(())
    }

    /// Name/value pairs of the displayable scalar fields, optionally
    /// restricted to `selected`. Repeating fields, groups, fillers and
    /// write-only fields are skipped.
    pub fn items(&self, selected: &[&str]) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        for (i, f) in self.layout.fields.iter().enumerate() {
            if f.opts.contains(FieldOpts::NONE) || f.is_repeating() || !f.opts.readable() {
                continue;
            }
            if !selected.is_empty() && !selected.contains(&f.name()) {
                continue;
            }
            let v = self.read_field(i, 0)?;
            out.push((f.name().to_string(), dump::display_value(f, v)));
        }
        Ok(out)
    }

    pub(crate) fn read_field(&self, i: usize, index: usize) -> Result<Value> {
        self.layout.read_field(self.buf.bytes(), self.base, i, index)
    }

    /// Record over occurrence `index` of group field `i`.
    pub(crate) fn occurrence_record(&mut self, i: usize, index: usize) -> Result<Record<'_>> {
        if !self.layout.fields[i].is_group() {
            let name = self.layout.fields[i].name().to_string();
            return Err(self.layout.err(ErrorKind::NotComposite(name)));
        }
        let Record { layout, buf, base } = self;
        let abs = layout.prepare_occurrence(buf.bytes(), *base, i, index)?;
        let name = layout.fields[i].name().to_string();
        let missing = layout.err(ErrorKind::NotComposite(name));
        let sub = layout.fields[i]
            .spec
            .group
            .as_deref_mut()
            .ok_or(missing)?;
        Ok(Record {
            layout: sub,
            buf: buf.reborrow(),
            base: abs,
        })
    }

    /// Encode `value` into occurrence `index` of field `i`. Length-prefixed
    /// text and byte fields get a new prefix when `resize` is set; later
    /// fields keep their positions until the next `prepare()`.
    pub(crate) fn write_field(&mut self, i: usize, index: usize, value: &Value, resize: bool) -> Result<()> {
        let f = &self.layout.fields[i];
        if f.is_group() {
            return Err(self.layout.err(ErrorKind::Composite(f.name().to_string())));
        }
        if !f.opts.writable() || matches!(self.buf, Buf::Shared(_)) {
            return Err(self.layout.err(ErrorKind::ReadOnly {
                field: f.name().to_string(),
            }));
        }
        let width = f.opts.prefix_width();
        let resizable = matches!(
            f.spec.ftype,
            FieldType::String | FieldType::Utf8 | FieldType::Utf16 | FieldType::Bytes
        );
        if resize && width > 0 && resizable {
            return self.write_variable(i, index, value, width);
        }
        let buf_len = self.buf.bytes().len();
        let r = self.layout.window(buf_len, self.base, i, index)?;
        tracing::trace!(
            layout = %self.layout.name(),
            field = %f.name(),
            index,
            offset = r.start,
            size = r.len(),
            "pack"
        );
        let codec = self.layout.codec(f);
        let Some(bytes) = self.buf.bytes_mut() else {
            return Err(self.layout.err(ErrorKind::ReadOnly {
                field: f.name().to_string(),
            }));
        };
        codec
            .encode(&mut bytes[r], value)
            .map_err(|k| self.layout.err(k))
    }

    fn write_variable(&mut self, i: usize, index: usize, value: &Value, width: usize) -> Result<()> {
        let f = &self.layout.fields[i];
        let name = f.name().to_string();
        if !self.layout.is_prepared() {
            return Err(self.layout.err(ErrorKind::InvalidPosition {
                field: name,
                detail: "field not prepared".to_string(),
            }));
        }
        let data = self
            .layout
            .codec(f)
            .encode_variable(value)
            .map_err(|k| self.layout.err(k))?;
        let (rel, _) = f.occurrence(index).map_err(|k| self.layout.err(k))?;
        let limit: u64 = match width {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => 0xFFFF_FFFF,
        };
        let stored = (data.len() + width) as u64;
        if stored > limit {
            return Err(self.layout.err(ErrorKind::FieldOverflow {
                field: name,
                detail: format!("{} bytes exceed a {width}-byte length prefix", data.len()),
            }));
        }
        let prefix_at = rel.checked_sub(width).ok_or_else(|| {
            self.layout.err(ErrorKind::InvalidPosition {
                field: name.clone(),
                detail: "field not prepared".to_string(),
            })
        })?;
        let buf_len = self.buf.bytes().len();
        let r = self
            .layout
            .range(buf_len, self.base, prefix_at, width + data.len(), &name)?;
        let endianness = self.layout.field_endianness(f);
        tracing::trace!(
            layout = %self.layout.name(),
            field = %name,
            index,
            offset = r.start,
            size = data.len(),
            "pack variable"
        );
        let Some(bytes) = self.buf.bytes_mut() else {
            return Err(self.layout.err(ErrorKind::ReadOnly { field: name }));
        };
        let (prefix, body) = bytes[r].split_at_mut(width);
        match endianness {
            Endianness::Big => BigEndian::write_uint(prefix, stored, width),
            Endianness::Little => LittleEndian::write_uint(prefix, stored, width),
        }
        body.copy_from_slice(&data);

        let f = &mut self.layout.fields[i];
        match f.possiz.as_mut().and_then(|ps| ps.get_mut(index)) {
            Some(slot) => slot.1 = data.len(),
            None => f.size = data.len(),
        }
        Ok(())
    }
}

fn empty_value(f: &Field) -> Value {
    if f.opts.contains(FieldOpts::DT) {
        return Value::Null;
    }
    match f.spec.ftype {
        FieldType::String | FieldType::Utf8 | FieldType::Utf16 => Value::Str(String::new()),
        FieldType::Char => Value::Str(" ".to_string()),
        FieldType::Bytes => Value::Bytes(Vec::new()),
        FieldType::Float | FieldType::Double => Value::Double(0.0),
        _ => Value::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ByteOrder, LayoutOptions};
    use crate::field;

    fn network(specs: Vec<crate::field::FieldSpec>) -> Layout {
        Layout::with_options("t", specs, LayoutOptions::default().byte_order(ByteOrder::Network))
            .expect("layout")
    }

    #[test]
    fn test_read_only_and_write_only() {
        let mut l = network(vec![field::int2("ro").read_only(), field::int2("wo").write_only()]);
        let mut buf = [0u8; 4];
        let mut rec = l.bind(&mut buf, 0);
        let err = rec.set("ro", 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ReadOnly { .. }));
        rec.set("wo", 2).expect("write");
        let err = rec.get("wo").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WriteOnly { .. }));
        assert_eq!(buf, [0, 0, 0, 2]);
    }

    #[test]
    fn test_shared_buffer_rejects_writes() {
        let mut l = network(vec![field::int2("x")]);
        let buf = [0x01, 0x02];
        let mut rec = l.bind_ref(&buf, 0);
        assert_eq!(rec.get("x").expect("get"), Value::Int(0x0102));
        assert!(matches!(
            rec.set("x", 3).unwrap_err().kind(),
            ErrorKind::ReadOnly { .. }
        ));
    }

    #[test]
    fn test_offset_and_short_buffer() {
        let mut l = network(vec![field::int2("x")]);
        let mut buf = [0u8, 0, 0, 7];
        let rec = l.bind(&mut buf, 2);
        assert_eq!(rec.get("x").expect("get"), Value::Int(7));
        let rec = l.bind(&mut buf, 3);
        assert!(matches!(
            rec.get("x").unwrap_err().kind(),
            ErrorKind::BufferTooShort { .. }
        ));
    }

    #[test]
    fn test_reset_all() {
        let mut l = network(vec![
            field::string("s", 3),
            field::char("c"),
            field::packed("p", 2),
            field::bytes("b", 2),
            field::int2("r").read_only(),
            field::uint1("m").occurs(2),
        ]);
        let mut buf = [0xAAu8; 13];
        let mut rec = l.bind(&mut buf, 0);
        rec.reset_all().expect("reset");
        assert_eq!(
            buf,
            [b' ', b' ', b' ', b' ', 0x00, 0x0C, 0, 0, 0xAA, 0xAA, 0, 0, 0xAA]
        );
    }

    #[test]
    fn test_list_assignment() {
        let mut l = network(vec![field::uint1("m").occurs(3), field::uint1("x")]);
        let mut buf = [0u8; 4];
        let mut rec = l.bind(&mut buf, 0);
        rec.set("m", vec![Value::Int(1), Value::Int(2)]).expect("set list");
        assert_eq!(rec.get("m").expect("get"), Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(0)]));
        let err = rec
            .set("m", vec![Value::Int(1); 4])
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TooManyValues { given: 4, occurs: 3, .. }));
        let err = rec.set("x", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotRepeating("x".to_string()));
        assert!(rec.set("nope", 1).is_err());
    }

    #[test]
    fn test_update_and_items() {
        let mut l = network(vec![
            field::string("name", 4),
            field::filler("pad", 1),
            field::uint2("flags").opt(FieldOpts::HEX),
            field::int1("n").ppfunc(|v| format!("<{v}>")),
        ]);
        let mut buf = [0u8; 8];
        let mut rec = l.bind(&mut buf, 0);
        rec.update([("name", Value::from("ab")), ("flags", Value::Int(0x1F)), ("n", Value::Int(-3))])
            .expect("update");
        let items = rec.items(&[]).expect("items");
        assert_eq!(
            items,
            vec![
                ("name".to_string(), Value::from("ab")),
                ("flags".to_string(), Value::from("001F")),
                ("n".to_string(), Value::from("<-3>")),
            ]
        );
        let only = rec.items(&["n"]).expect("items");
        assert_eq!(only.len(), 1);
    }
}
