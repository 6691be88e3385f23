//! Indexed access to the occurrences of a repeating field or group.

use crate::error::{DatamapError, ErrorKind, Result};
use crate::record::Record;
use crate::value::Value;

/// The occurrences of one repeating field of a bound record.
///
/// Scalar occurrences are read and written by index. Group occurrences are
/// reached with [`Repeated::record`], which prepares the nested layout for
/// that occurrence when it is variable.
pub struct Repeated<'r, 'a> {
    record: &'r mut Record<'a>,
    field: usize,
}

impl<'r, 'a> Repeated<'r, 'a> {
    pub(crate) fn new(record: &'r mut Record<'a>, field: usize) -> Self {
        Repeated { record, field }
    }

    pub fn name(&self) -> &str {
        self.record.layout.fields[self.field].name()
    }

    /// Live occurrence count.
    pub fn len(&self) -> usize {
        self.record.layout.fields[self.field].occurs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_group(&self) -> bool {
        self.record.layout.fields[self.field].is_group()
    }

    fn composite(&self) -> DatamapError {
        self.record
            .layout
            .err(ErrorKind::Composite(self.name().to_string()))
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        if self.is_group() {
            return Err(self.composite());
        }
        self.record.read_field(self.field, index)
    }

    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        if self.is_group() {
            return Err(self.composite());
        }
        self.record.write_field(self.field, index, &value.into(), true)
    }

    /// Occurrence `index` of a periodic group.
    pub fn record(&mut self, index: usize) -> Result<Record<'_>> {
        self.record.occurrence_record(self.field, index)
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|ix| self.get(ix)).collect()
    }

    /// Assign the leading occurrences in order. More values than
    /// occurrences is an error and nothing is written.
    pub fn set_all<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        if self.is_group() {
            return Err(self.composite());
        }
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() > self.len() {
            return Err(self.record.layout.err(ErrorKind::TooManyValues {
                field: self.name().to_string(),
                given: values.len(),
                occurs: self.len(),
            }));
        }
        for (ix, v) in values.iter().enumerate() {
            self.record.write_field(self.field, ix, v, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ByteOrder, LayoutOptions};
    use crate::error::ErrorKind;
    use crate::field;
    use crate::layout::Layout;
    use crate::value::Value;

    fn sub() -> Layout {
        Layout::new("qq", [field::string("a", 2), field::uint1("b")]).expect("sub")
    }

    #[test]
    fn test_scalar_occurrences() {
        let mut l = Layout::with_options(
            "r",
            [field::uint2("m").occurs(3)],
            LayoutOptions::default().byte_order(ByteOrder::Network),
        )
        .expect("layout");
        let mut buf = [0u8; 6];
        let mut rec = l.bind(&mut buf, 0);
        let mut m = rec.repeated("m").expect("repeated");
        assert_eq!(m.len(), 3);
        assert!(!m.is_group());
        m.set(2, 0x0102).expect("set");
        assert_eq!(m.get(2).expect("get"), Value::Int(0x0102));
        let err = m.get(3).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::IndexOutOfRange { index: 3, occurs: 3, .. }
        ));
        let err = m.set_all([1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TooManyValues { .. }));
        m.set_all([7, 8]).expect("set_all");
        assert_eq!(
            m.values().expect("values"),
            vec![Value::Int(7), Value::Int(8), Value::Int(0x0102)]
        );
        assert_eq!(buf, [0, 7, 0, 8, 1, 2]);
    }

    #[test]
    fn test_group_occurrences() {
        let mut l = Layout::new("r", [field::periodic("qq", sub(), 2)]).expect("layout");
        assert_eq!(l.size(), 6);
        let mut buf = [0u8; 6];
        let mut rec = l.bind(&mut buf, 0);
        let mut qq = rec.repeated("qq").expect("repeated");
        assert!(qq.is_group());
        assert!(matches!(qq.get(0).unwrap_err().kind(), ErrorKind::Composite(_)));
        {
            let mut second = qq.record(1).expect("occurrence");
            assert_eq!(second.offset(), 3);
            second.set("a", "xy").expect("set");
            second.set("b", 9).expect("set");
        }
        assert!(qq.record(2).is_err());
        assert_eq!(buf, [0, 0, 0, b'x', b'y', 9]);
    }

    #[test]
    fn test_not_repeating() {
        let mut l = Layout::new("r", [field::uint1("x")]).expect("layout");
        let mut buf = [0u8; 1];
        let mut rec = l.bind(&mut buf, 0);
        assert!(matches!(
            rec.repeated("x").err().map(|e| e.kind().clone()),
            Some(ErrorKind::NotRepeating(_))
        ));
        assert!(matches!(
            rec.group("x", 0).err().map(|e| e.kind().clone()),
            Some(ErrorKind::NotComposite(_))
        ));
    }
}
