//! Field specifications: types, option flags, and the builder API.
//!
//! A [`FieldSpec`] is inert until a [`Layout`] places it. Constructors take
//! the field name and, where the type has no fixed width, the size in bytes
//! (characters for [`unicode`]).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::error::Result;
use crate::layout::{Layout, OccursContext};
use crate::value::Value;

/// Closed set of field encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Bytes,
    /// Zoned decimal, one digit per byte.
    Unpacked,
    /// Packed decimal (BCD) with trailing sign nibble.
    Packed,
    Char,
    Int1,
    Uint1,
    Int2,
    Uint2,
    Int4,
    Uint4,
    Int8,
    Uint8,
    Float,
    Double,
    Utf16,
    Utf8,
    /// Nested layout, always repeated.
    Group,
}

impl FieldType {
    /// Width of the fixed-size types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Char | FieldType::Int1 | FieldType::Uint1 => Some(1),
            FieldType::Int2 | FieldType::Uint2 => Some(2),
            FieldType::Int4 | FieldType::Uint4 | FieldType::Float => Some(4),
            FieldType::Int8 | FieldType::Uint8 | FieldType::Double => Some(8),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Int1
                | FieldType::Uint1
                | FieldType::Int2
                | FieldType::Uint2
                | FieldType::Int4
                | FieldType::Uint4
                | FieldType::Int8
                | FieldType::Uint8
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            FieldType::Int1 | FieldType::Int2 | FieldType::Int4 | FieldType::Int8
        )
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Char | FieldType::Utf16 | FieldType::Utf8
        )
    }

    /// Adabas format letter, `None` for types without one.
    pub fn adabas_format(self) -> Option<&'static str> {
        match self {
            FieldType::String | FieldType::Char | FieldType::Utf8 => Some("A"),
            FieldType::Unpacked => Some("U"),
            FieldType::Packed => Some("P"),
            FieldType::Int1 | FieldType::Uint1 | FieldType::Uint2 => Some("B"),
            FieldType::Uint4 | FieldType::Uint8 => Some("B"),
            FieldType::Int2 | FieldType::Int4 | FieldType::Int8 => Some("F"),
            FieldType::Float | FieldType::Double => Some("G"),
            FieldType::Utf16 => Some("W"),
            FieldType::Bytes | FieldType::Group => None,
        }
    }

    /// Single-letter code used in listings.
    pub fn code(self) -> &'static str {
        match self {
            FieldType::String => "A",
            FieldType::Bytes => "B",
            FieldType::Unpacked => "U",
            FieldType::Packed => "P",
            FieldType::Char => "c",
            FieldType::Int1 => "b",
            FieldType::Uint1 => "B1",
            FieldType::Int2 => "h",
            FieldType::Uint2 => "H",
            FieldType::Int4 => "l",
            FieldType::Uint4 => "L",
            FieldType::Int8 => "q",
            FieldType::Uint8 => "Q",
            FieldType::Float => "f",
            FieldType::Double => "d",
            FieldType::Utf16 => "u",
            FieldType::Utf8 => "t",
            FieldType::Group => "M",
        }
    }
}

/// Field option bit set. Bit values match the classic record-mapping
/// option numbers so stored definitions stay interchangeable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldOpts(u32);

impl FieldOpts {
    pub const IN: FieldOpts = FieldOpts(1);
    pub const OUT: FieldOpts = FieldOpts(2);
    pub const INOUT: FieldOpts = FieldOpts(3);
    /// Binary field holds a TOD clock value.
    pub const STCK: FieldOpts = FieldOpts(4);
    /// Display as hex.
    pub const HEX: FieldOpts = FieldOpts(8);
    /// Filler: skipped by listings.
    pub const NONE: FieldOpts = FieldOpts(16);
    pub const EBCDIC: FieldOpts = FieldOpts(32);
    /// Variable size given by a size function.
    pub const VAR0: FieldOpts = FieldOpts(64);
    /// 1-byte length prefix.
    pub const VAR1: FieldOpts = FieldOpts(128);
    /// 2-byte length prefix.
    pub const VAR2: FieldOpts = FieldOpts(256);
    /// 4-byte length prefix.
    pub const VAR4: FieldOpts = FieldOpts(512);
    /// Field holds a date or time, see [`DtKind`].
    pub const DT: FieldOpts = FieldOpts(1024);
    /// Network byte order regardless of the layout.
    pub const NWBO: FieldOpts = FieldOpts(2048);
    pub const GMT: FieldOpts = FieldOpts(4096);
    /// Length prefix excludes itself (count prefix of a periodic group).
    pub(crate) const MUPE: FieldOpts = FieldOpts(8192);

    const VAR_ANY: u32 = 64 | 128 | 256 | 512;

    pub const fn empty() -> FieldOpts {
        FieldOpts(0)
    }

    pub const fn from_bits(bits: u32) -> FieldOpts {
        FieldOpts(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: FieldOpts) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: FieldOpts) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: FieldOpts) {
        self.0 &= !other.0;
    }

    pub fn readable(self) -> bool {
        self.contains(FieldOpts::OUT)
    }

    pub fn writable(self) -> bool {
        self.contains(FieldOpts::IN)
    }

    pub fn is_variable(self) -> bool {
        self.0 & Self::VAR_ANY != 0
    }

    /// Width of the length prefix: 0 for VAR0 or fixed fields.
    pub fn prefix_width(self) -> usize {
        if self.intersects(FieldOpts::VAR1) {
            1
        } else if self.intersects(FieldOpts::VAR2) {
            2
        } else if self.intersects(FieldOpts::VAR4) {
            4
        } else {
            0
        }
    }

    /// Neither IN nor OUT means both.
    pub(crate) fn normalized(self) -> FieldOpts {
        if self.intersects(FieldOpts::INOUT) {
            self
        } else {
            self | FieldOpts::INOUT
        }
    }
}

impl BitOr for FieldOpts {
    type Output = FieldOpts;

    fn bitor(self, rhs: FieldOpts) -> FieldOpts {
        FieldOpts(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldOpts {
    fn bitor_assign(&mut self, rhs: FieldOpts) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FieldOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(FieldOpts, &str); 14] = [
            (FieldOpts::IN, "IN"),
            (FieldOpts::OUT, "OUT"),
            (FieldOpts::STCK, "STCK"),
            (FieldOpts::HEX, "HEX"),
            (FieldOpts::NONE, "NONE"),
            (FieldOpts::EBCDIC, "EBCDIC"),
            (FieldOpts::VAR0, "VAR0"),
            (FieldOpts::VAR1, "VAR1"),
            (FieldOpts::VAR2, "VAR2"),
            (FieldOpts::VAR4, "VAR4"),
            (FieldOpts::DT, "DT"),
            (FieldOpts::NWBO, "NWBO"),
            (FieldOpts::GMT, "GMT"),
            (FieldOpts::MUPE, "MUPE"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(o, _)| self.contains(*o))
            .map(|(_, n)| *n)
            .collect();
        write!(f, "FieldOpts({})", names.join("|"))
    }
}

/// Date/time interpretation of a decimal or binary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtKind {
    /// YYYYMMDD
    Date,
    /// HHMMSS
    Time,
    /// YYYYMMDDHHMMSS
    DateTime,
    /// YYYYMMDDHHMMSSuuuuuu
    Timestamp,
    /// Days since 0000-01-01.
    NatDate,
    /// Tenths of seconds since 0000-01-01.
    NatTime,
    /// Seconds since 1970.
    UnixTime,
    /// Microseconds since 1970.
    XTimestamp,
}

impl DtKind {
    pub fn from_name(name: &str) -> Option<DtKind> {
        match name.to_ascii_uppercase().as_str() {
            "DATE" => Some(DtKind::Date),
            "TIME" => Some(DtKind::Time),
            "DATETIME" => Some(DtKind::DateTime),
            "TIMESTAMP" => Some(DtKind::Timestamp),
            "NATDATE" => Some(DtKind::NatDate),
            "NATTIME" => Some(DtKind::NatTime),
            "UNIXTIME" => Some(DtKind::UnixTime),
            "XTIMESTAMP" => Some(DtKind::XTimestamp),
            _ => None,
        }
    }
}

/// Computes an occurrence count from the already positioned fields.
/// `-1` or `-2` means a 1- or 2-byte count precedes the group.
pub type OccursFn = Arc<dyn Fn(&OccursContext<'_>) -> Result<i64> + Send + Sync>;
/// Computes the size of a `VAR0` field.
pub type SizeFn = Arc<dyn Fn(&OccursContext<'_>) -> Result<usize> + Send + Sync>;
/// Custom rendering for listings.
pub type PrintFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Occurrence count of a repeating field.
#[derive(Clone)]
pub enum Occurs {
    Fixed(usize),
    /// Count stored in the 1 or 2 bytes preceding the first occurrence.
    Counted(usize),
    Dynamic(OccursFn),
}

impl Occurs {
    pub fn is_fixed(&self) -> bool {
        matches!(self, Occurs::Fixed(_))
    }
}

impl fmt::Debug for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurs::Fixed(n) => write!(f, "Fixed({n})"),
            Occurs::Counted(w) => write!(f, "Counted({w})"),
            Occurs::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<usize> for Occurs {
    fn from(n: usize) -> Self {
        Occurs::Fixed(n)
    }
}

/// Declarative description of one field.
#[derive(Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) ftype: FieldType,
    pub(crate) size: usize,
    pub(crate) opts: FieldOpts,
    pub(crate) caption: Option<String>,
    pub(crate) ppfunc: Option<PrintFn>,
    pub(crate) colsize: Option<usize>,
    pub(crate) dt: Option<DtKind>,
    pub(crate) occurs: Option<Occurs>,
    pub(crate) group: Option<Box<Layout>>,
    pub(crate) adabas_name: Option<String>,
    pub(crate) pos: Option<usize>,
    pub(crate) repos: Option<i64>,
    pub(crate) size_fn: Option<SizeFn>,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("ftype", &self.ftype)
            .field("size", &self.size)
            .field("opts", &self.opts)
            .field("dt", &self.dt)
            .field("occurs", &self.occurs)
            .field("group", &self.group.as_ref().map(|g| g.name().to_string()))
            .field("adabas_name", &self.adabas_name)
            .field("pos", &self.pos)
            .field("repos", &self.repos)
            .finish_non_exhaustive()
    }
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ftype: FieldType, size: usize) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            ftype,
            size: ftype.fixed_size().unwrap_or(size),
            opts: FieldOpts::empty(),
            caption: None,
            ppfunc: None,
            colsize: None,
            dt: None,
            occurs: None,
            group: None,
            adabas_name: None,
            pos: None,
            repos: None,
            size_fn: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.ftype
    }

    /// Declared size: bytes, or characters for UTF-16.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn options(&self) -> FieldOpts {
        self.opts
    }

    pub fn opt(mut self, opts: FieldOpts) -> Self {
        self.opts |= opts;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.opts.remove(FieldOpts::IN);
        self.opts |= FieldOpts::OUT;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.opts.remove(FieldOpts::OUT);
        self.opts |= FieldOpts::IN;
        self
    }

    /// Place the field at an absolute offset.
    pub fn pos(mut self, offset: usize) -> Self {
        self.pos = Some(offset);
        self
    }

    /// Move the cursor by `delta` bytes before placing the field.
    pub fn repos(mut self, delta: i64) -> Self {
        self.repos = Some(delta);
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn colsize(mut self, width: usize) -> Self {
        self.colsize = Some(width);
        self
    }

    pub fn dt(mut self, kind: DtKind) -> Self {
        self.dt = Some(kind);
        self.opts |= FieldOpts::DT;
        self
    }

    /// Fixed occurrence count.
    pub fn occurs(mut self, n: usize) -> Self {
        self.occurs = Some(Occurs::Fixed(n));
        self
    }

    /// Occurrence count stored in the `width` (1 or 2) bytes before the
    /// first occurrence.
    pub fn occurs_counted(mut self, width: usize) -> Self {
        self.occurs = Some(Occurs::Counted(width));
        self
    }

    pub fn occurs_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&OccursContext<'_>) -> Result<i64> + Send + Sync + 'static,
    {
        self.occurs = Some(Occurs::Dynamic(Arc::new(f)));
        self
    }

    /// Two-letter Adabas short name.
    pub fn adabas_name(mut self, name: impl Into<String>) -> Self {
        self.adabas_name = Some(name.into());
        self
    }

    pub fn ppfunc<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.ppfunc = Some(Arc::new(f));
        self
    }

    /// Size function of a `VAR0` field; sets `VAR0`.
    pub fn size_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&OccursContext<'_>) -> Result<usize> + Send + Sync + 'static,
    {
        self.size_fn = Some(Arc::new(f));
        self.opts |= FieldOpts::VAR0;
        self
    }
}

pub fn string(name: impl Into<String>, size: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::String, size)
}

/// UTF-16 text of `chars` code units.
pub fn unicode(name: impl Into<String>, chars: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::Utf16, chars)
}

pub fn utf8(name: impl Into<String>, size: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::Utf8, size)
}

pub fn packed(name: impl Into<String>, size: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::Packed, size)
}

pub fn unpacked(name: impl Into<String>, size: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::Unpacked, size)
}

pub fn bytes(name: impl Into<String>, size: usize) -> FieldSpec {
    FieldSpec::new(name, FieldType::Bytes, size)
}

/// Unlisted byte field.
pub fn filler(name: impl Into<String>, size: usize) -> FieldSpec {
    bytes(name, size).opt(FieldOpts::NONE)
}

pub fn char(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Char, 1)
}

pub fn int1(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Int1, 1)
}

pub fn uint1(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Uint1, 1)
}

pub fn int2(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Int2, 2)
}

pub fn uint2(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Uint2, 2)
}

pub fn int4(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Int4, 4)
}

pub fn uint4(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Uint4, 4)
}

pub fn int8(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Int8, 8)
}

pub fn uint8(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Uint8, 8)
}

pub fn float(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Float, 4)
}

pub fn double(name: impl Into<String>) -> FieldSpec {
    FieldSpec::new(name, FieldType::Double, 8)
}

/// Repeating group of a nested layout. An occurrence count of 0 means
/// the count is stored in the byte before the group.
pub fn periodic(name: impl Into<String>, sub: Layout, occurs: usize) -> FieldSpec {
    let occurs = match occurs {
        0 => Occurs::Counted(1),
        n => Occurs::Fixed(n),
    };
    let mut spec = FieldSpec::new(name, FieldType::Group, sub.size());
    spec.group = Some(Box::new(sub));
    spec.occurs = Some(occurs);
    spec
}

/// Periodic group using the nested layout's own `occurs` option.
pub fn periodic_of(name: impl Into<String>, sub: Layout) -> FieldSpec {
    let n = sub.default_occurs().unwrap_or(0);
    periodic(name, sub, n)
}

/// Map a Predict format and length to a field type.
pub fn from_predict(format: &str, length: usize) -> Option<FieldType> {
    match format {
        "A" => Some(FieldType::String),
        "B" => Some(FieldType::Bytes),
        "F" if length == 8 => Some(FieldType::Double),
        "F" => Some(FieldType::Float),
        "I" => match length {
            1 => Some(FieldType::Int1),
            2 => Some(FieldType::Int2),
            4 => Some(FieldType::Int4),
            8 => Some(FieldType::Int8),
            _ => None,
        },
        "N" => Some(FieldType::Unpacked),
        "P" => Some(FieldType::Packed),
        "W" => Some(FieldType::Utf16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opts_normalize() {
        assert_eq!(FieldOpts::empty().normalized(), FieldOpts::INOUT);
        assert_eq!(FieldOpts::IN.normalized(), FieldOpts::IN);
        let o = (FieldOpts::HEX | FieldOpts::VAR2).normalized();
        assert!(o.readable() && o.writable() && o.is_variable());
        assert_eq!(o.prefix_width(), 2);
        assert_eq!(FieldOpts::VAR0.prefix_width(), 0);
        assert_eq!(FieldOpts::from_bits(1024 | 2048).bits(), 3072);
    }

    #[test]
    fn test_builder_chain() {
        let f = packed("amount", 5)
            .caption("Amount")
            .dt(DtKind::Date)
            .read_only()
            .adabas_name("AA");
        assert_eq!(f.size(), 5);
        assert!(f.options().contains(FieldOpts::DT));
        assert!(f.options().readable());
        assert!(!f.options().writable());
        assert_eq!(f.adabas_name.as_deref(), Some("AA"));

        let w = int4("w").write_only();
        assert!(w.options().writable() && !w.options().readable());
        // fixed width types ignore the size argument
        assert_eq!(FieldSpec::new("x", FieldType::Int8, 3).size(), 8);
    }

    #[test]
    fn test_from_predict() {
        assert_eq!(from_predict("F", 8), Some(FieldType::Double));
        assert_eq!(from_predict("F", 4), Some(FieldType::Float));
        assert_eq!(from_predict("I", 2), Some(FieldType::Int2));
        assert_eq!(from_predict("I", 3), None);
        assert_eq!(from_predict("N", 7), Some(FieldType::Unpacked));
        assert_eq!(from_predict("L", 1), None);
    }

    #[test]
    fn test_dt_names() {
        assert_eq!(DtKind::from_name("natdate"), Some(DtKind::NatDate));
        assert_eq!(DtKind::from_name("XTIMESTAMP"), Some(DtKind::XTimestamp));
        assert_eq!(DtKind::from_name("epoch"), None);
    }
}
