//! Layout engine: field placement, the live field directory, and
//! `prepare()` for layouts whose positions depend on the buffer contents.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use tracing::debug;

use crate::codec::{Codec, Endianness};
use crate::config::{ByteOrder, CodecDefaults, LayoutOptions, TextEncoding};
use crate::error::{DatamapError, ErrorKind, Result};
use crate::field::{DtKind, FieldOpts, FieldSpec, FieldType, Occurs};
use crate::record::{Buf, Record};
use crate::value::Value;

/// Directory entry of a placed field. Offsets are relative to the start
/// of the layout; `prepare()` updates them for variable layouts.
#[derive(Clone, Debug)]
pub struct Field {
    pub(crate) spec: FieldSpec,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) opts: FieldOpts,
    pub(crate) colsize: usize,
    pub(crate) occurs: usize,
    /// Per occurrence (offset, size) of variable repeats.
    pub(crate) possiz: Option<Vec<(usize, usize)>>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn field_type(&self) -> FieldType {
        self.spec.ftype
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current size in bytes of one occurrence.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn options(&self) -> FieldOpts {
        self.opts
    }

    pub fn colsize(&self) -> usize {
        self.colsize
    }

    pub fn caption(&self) -> Option<&str> {
        self.spec.caption.as_deref()
    }

    /// Caption, or the name when there is none.
    pub fn title(&self) -> &str {
        self.caption().unwrap_or(self.name())
    }

    pub fn dt(&self) -> Option<DtKind> {
        self.spec.dt
    }

    pub fn adabas_name(&self) -> Option<&str> {
        self.spec.adabas_name.as_deref()
    }

    pub fn is_repeating(&self) -> bool {
        self.spec.occurs.is_some()
    }

    pub fn is_group(&self) -> bool {
        self.spec.ftype == FieldType::Group
    }

    /// Live occurrence count; 1 for a plain field.
    pub fn occurs(&self) -> usize {
        if self.is_repeating() {
            self.occurs
        } else {
            1
        }
    }

    pub fn group(&self) -> Option<&Layout> {
        self.spec.group.as_deref()
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// Relative (offset, size) of occurrence `index`.
    pub(crate) fn occurrence(&self, index: usize) -> std::result::Result<(usize, usize), ErrorKind> {
        if !self.is_repeating() {
            if index != 0 {
                return Err(ErrorKind::NotRepeating(self.spec.name.clone()));
            }
            return Ok((self.offset, self.size));
        }
        if index >= self.occurs {
            return Err(ErrorKind::IndexOutOfRange {
                field: self.spec.name.clone(),
                index,
                occurs: self.occurs,
            });
        }
        if let Some((p, s)) = self.possiz.as_ref().and_then(|ps| ps.get(index)) {
            return Ok((*p, *s));
        }
        index
            .checked_mul(self.size)
            .and_then(|d| d.checked_add(self.offset))
            .map(|p| (p, self.size))
            .ok_or_else(|| ErrorKind::InvalidPosition {
                field: self.spec.name.clone(),
                detail: format!("occurrence {index} beyond address space"),
            })
    }
}

/// Display column width used by line listings.
fn default_colsize(spec: &FieldSpec, opts: FieldOpts) -> usize {
    let size = spec.size;
    let sz = if spec.ftype == FieldType::Bytes || opts.contains(FieldOpts::HEX) {
        size * 2
    } else if opts.contains(FieldOpts::STCK) {
        size.max(19)
    } else {
        match spec.ftype {
            FieldType::Uint1 => 3,
            FieldType::Int1 => 4,
            FieldType::Uint2 => 5,
            FieldType::Int2 => 6,
            FieldType::Int4 | FieldType::Uint4 | FieldType::Int8 | FieldType::Uint8 => 10,
            FieldType::Packed => (size * 2).saturating_sub(1),
            _ if opts.contains(FieldOpts::DT) => 19,
            _ => size,
        }
    };
    sz.max(spec.name.chars().count())
}

/// A named, ordered set of fields over a byte buffer.
///
/// A layout never owns a buffer; [`Layout::bind`] yields a [`Record`] view
/// over a caller's buffer.
#[derive(Clone, Debug)]
pub struct Layout {
    name: String,
    pub(crate) fields: Vec<Field>,
    index: HashMap<String, usize>,
    size: usize,
    init_size: usize,
    varies: bool,
    prepared: bool,
    offset: usize,
    byte_order: Option<ByteOrder>,
    ebcdic: Option<bool>,
    encoding: Option<TextEncoding>,
    defaults: CodecDefaults,
    occurs: Option<usize>,
}

impl Layout {
    pub fn new(name: impl Into<String>, specs: impl IntoIterator<Item = FieldSpec>) -> Result<Layout> {
        Layout::with_options(name, specs, LayoutOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        specs: impl IntoIterator<Item = FieldSpec>,
        options: LayoutOptions,
    ) -> Result<Layout> {
        let mut layout = Layout {
            name: name.into(),
            fields: Vec::new(),
            index: HashMap::new(),
            size: 0,
            init_size: 0,
            varies: options.varies,
            prepared: false,
            offset: options.offset,
            byte_order: options.byte_order,
            ebcdic: options.ebcdic,
            encoding: options.encoding,
            defaults: options.defaults,
            occurs: options.occurs,
        };
        if layout.ebcdic.is_none() && options.encoding.is_some_and(TextEncoding::is_ebcdic) {
            layout.ebcdic = Some(true);
        }

        let mut cursor: usize = 0;
        let mut max = options.dmlen.unwrap_or(0);
        for mut spec in specs {
            if spec.name.is_empty() {
                return Err(layout.err(ErrorKind::InvalidOption(
                    "field definition without a name".to_string(),
                )));
            }
            if layout.index.contains_key(&spec.name) {
                return Err(layout.err(ErrorKind::DuplicateField(spec.name.clone())));
            }
            if let Some(delta) = spec.repos {
                if delta == 0 {
                    return Err(layout.err(ErrorKind::InvalidPosition {
                        field: spec.name.clone(),
                        detail: "repos must not be zero".to_string(),
                    }));
                }
                max = max.max(cursor);
                cursor = layout.shift(cursor, delta, &spec.name)?;
            }
            if let Some(p) = spec.pos {
                max = max.max(cursor);
                cursor = p;
            }
            let mut opts = spec.opts.normalized();
            if spec.dt.is_some() {
                opts |= FieldOpts::DT;
            }

            let size = match spec.group.as_mut() {
                Some(sub) => {
                    sub.inherit(layout.byte_order, layout.ebcdic, layout.encoding, layout.defaults);
                    if sub.varies {
                        layout.varies = true;
                    }
                    sub.size()
                }
                None if spec.ftype == FieldType::Utf16 => spec.size * 2,
                None => spec.size,
            };
            if size == 0 || opts.is_variable() {
                layout.varies = true;
            }
            let colsize = spec.colsize.unwrap_or_else(|| default_colsize(&spec, opts));

            let (advance, occurs) = match &spec.occurs {
                None => (size, 1),
                Some(Occurs::Fixed(n)) => (size.checked_mul(*n).ok_or_else(|| {
                    layout.err(ErrorKind::InvalidOccurs {
                        field: spec.name.clone(),
                        count: *n as i64,
                    })
                })?, *n),
                Some(Occurs::Counted(w)) if !matches!(*w, 1 | 2) => {
                    return Err(layout.err(ErrorKind::InvalidOccurs {
                        field: spec.name.clone(),
                        count: -(*w as i64),
                    }));
                }
                Some(_) => {
                    layout.varies = true;
                    (0, 0)
                }
            };
            debug!(
                layout = %layout.name,
                field = %spec.name,
                offset = cursor,
                size,
                occurs,
                "place field"
            );
            layout.index.insert(spec.name.clone(), layout.fields.len());
            layout.fields.push(Field {
                spec,
                offset: cursor,
                size,
                opts,
                colsize,
                occurs,
                possiz: None,
            });
            cursor = cursor.checked_add(advance).ok_or_else(|| {
                layout.err(ErrorKind::InvalidPosition {
                    field: layout.name.clone(),
                    detail: "layout exceeds address space".to_string(),
                })
            })?;
        }
        layout.size = max.max(cursor);
        layout.init_size = layout.size;
        Ok(layout)
    }

    pub(crate) fn err(&self, kind: ErrorKind) -> DatamapError {
        DatamapError::new(self.name.clone(), kind)
    }

    fn shift(&self, cursor: usize, delta: i64, field: &str) -> Result<usize> {
        let moved = if delta < 0 {
            cursor.checked_sub(delta.unsigned_abs() as usize)
        } else {
            cursor.checked_add(delta as usize)
        };
        moved.ok_or_else(|| {
            self.err(ErrorKind::InvalidPosition {
                field: field.to_string(),
                detail: format!("repos {delta} from offset {cursor}"),
            })
        })
    }

    /// Take over settings a nested layout did not set itself.
    fn inherit(
        &mut self,
        byte_order: Option<ByteOrder>,
        ebcdic: Option<bool>,
        encoding: Option<TextEncoding>,
        defaults: CodecDefaults,
    ) {
        if self.byte_order.is_none() {
            self.byte_order = byte_order;
        }
        if self.ebcdic.is_none() && self.encoding.is_none() {
            self.ebcdic = ebcdic;
            self.encoding = encoding;
        }
        self.defaults = defaults;
        let (bo, eb, enc, d) = (self.byte_order, self.ebcdic, self.encoding, self.defaults);
        for f in &mut self.fields {
            if let Some(sub) = f.spec.group.as_mut() {
                sub.inherit(bo, eb, enc, d);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes (the maximum position reached).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether positions depend on the buffer, requiring `prepare()`.
    pub fn is_variable(&self) -> bool {
        self.varies
    }

    /// Whether field positions reflect a bound buffer: always for fixed
    /// layouts, after a successful `prepare()` for variable ones.
    pub fn is_prepared(&self) -> bool {
        !self.varies || self.prepared
    }

    /// Default start offset from the layout options.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn default_occurs(&self) -> Option<usize> {
        self.occurs
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order.unwrap_or(self.defaults.byte_order)
    }

    pub fn endianness(&self) -> Endianness {
        self.byte_order().endianness()
    }

    pub fn is_ebcdic(&self) -> bool {
        self.ebcdic.unwrap_or(self.defaults.ebcdic)
            || self.encoding.is_some_and(TextEncoding::is_ebcdic)
    }

    pub fn text_encoding(&self) -> TextEncoding {
        match self.encoding {
            Some(enc) => enc,
            None if self.is_ebcdic() => TextEncoding::Cp037,
            None => TextEncoding::Latin1,
        }
    }

    /// Set the byte order of this layout and all nested groups.
    pub fn set_byte_order(&mut self, bo: ByteOrder) {
        debug!(layout = %self.name, ?bo, "set byte order");
        self.byte_order = Some(bo);
        for f in &mut self.fields {
            if let Some(sub) = f.spec.group.as_mut() {
                sub.set_byte_order(bo);
            }
        }
    }

    /// Switch EBCDIC text (CP037) on or off (Latin-1) here and in all
    /// nested groups.
    pub fn set_ebcdic(&mut self, on: bool) {
        debug!(layout = %self.name, on, "set ebcdic");
        self.ebcdic = Some(on);
        self.encoding = Some(if on {
            TextEncoding::Cp037
        } else {
            TextEncoding::Latin1
        });
        for f in &mut self.fields {
            if let Some(sub) = f.spec.group.as_mut() {
                sub.set_ebcdic(on);
            }
        }
    }

    /// Change the byte size of a field. Following offsets are not moved.
    pub fn set_field_size(&mut self, name: &str, size: usize) -> Result<()> {
        let i = self.lookup(name)?;
        let f = &self.fields[i];
        if f.spec.ftype.fixed_size().is_some() || f.is_group() {
            return Err(self.err(ErrorKind::InvalidLength {
                field: name.to_string(),
                length: size,
            }));
        }
        let end = f.offset.saturating_add(size.saturating_mul(f.occurs()));
        self.fields[i].size = size;
        self.prepared = false;
        self.size = self.size.max(end);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| self.err(ErrorKind::UnknownField(name.to_string())))
    }

    /// Bind a buffer for reading and writing, the layout starting at `offset`.
    pub fn bind<'a>(&'a mut self, buf: &'a mut [u8], offset: usize) -> Record<'a> {
        Record::new(self, Buf::Exclusive(buf), offset)
    }

    /// Bind at the offset given in the layout options.
    pub fn bind_default<'a>(&'a mut self, buf: &'a mut [u8]) -> Record<'a> {
        let offset = self.offset;
        self.bind(buf, offset)
    }

    /// Bind a buffer for reading only; writes fail with `ReadOnly`.
    pub fn bind_ref<'a>(&'a mut self, buf: &'a [u8], offset: usize) -> Record<'a> {
        Record::new(self, Buf::Shared(buf), offset)
    }

    pub(crate) fn field_endianness(&self, f: &Field) -> Endianness {
        if f.opts.contains(FieldOpts::NWBO) {
            Endianness::Big
        } else {
            self.endianness()
        }
    }

    pub(crate) fn codec<'s>(&'s self, f: &'s Field) -> Codec<'s> {
        let enc = self.text_encoding();
        let encoding = if f.opts.contains(FieldOpts::EBCDIC) && !enc.is_ebcdic() {
            TextEncoding::Cp037
        } else {
            enc
        };
        Codec {
            field: &f.spec.name,
            ftype: f.spec.ftype,
            opts: f.opts,
            dt: f.spec.dt,
            endianness: self.field_endianness(f),
            encoding,
        }
    }

    /// Absolute byte range of occurrence `index` of field `i`.
    pub(crate) fn window(
        &self,
        buf_len: usize,
        base: usize,
        i: usize,
        index: usize,
    ) -> Result<std::ops::Range<usize>> {
        let f = &self.fields[i];
        let (rel, len) = f.occurrence(index).map_err(|k| self.err(k))?;
        self.range(buf_len, base, rel, len, &f.spec.name)
    }

    pub(crate) fn range(
        &self,
        buf_len: usize,
        base: usize,
        rel: usize,
        len: usize,
        field: &str,
    ) -> Result<std::ops::Range<usize>> {
        let start = base.checked_add(rel);
        let end = start.and_then(|s| s.checked_add(len));
        match (start, end) {
            (Some(start), Some(end)) if end <= buf_len => Ok(start..end),
            _ => Err(self.err(ErrorKind::BufferTooShort {
                field: field.to_string(),
                start: start.unwrap_or(usize::MAX),
                end: end.unwrap_or(usize::MAX),
                len: buf_len,
            })),
        }
    }

    /// Decode occurrence `index` of field `i`.
    pub(crate) fn read_field(&self, buf: &[u8], base: usize, i: usize, index: usize) -> Result<Value> {
        let f = &self.fields[i];
        if f.is_group() {
            return Err(self.err(ErrorKind::Composite(f.spec.name.clone())));
        }
        if !f.opts.readable() {
            return Err(self.err(ErrorKind::WriteOnly {
                field: f.spec.name.clone(),
            }));
        }
        let r = self.window(buf.len(), base, i, index)?;
        tracing::trace!(
            layout = %self.name,
            field = %f.spec.name,
            index,
            offset = r.start,
            size = r.len(),
            "unpack"
        );
        self.codec(f).decode(&buf[r]).map_err(|k| self.err(k))
    }

    /// Decode a field by name; a repeating scalar yields all occurrences.
    pub(crate) fn read_named(&self, buf: &[u8], base: usize, name: &str) -> Result<Value> {
        let i = self.lookup(name)?;
        let f = &self.fields[i];
        if f.is_repeating() && !f.is_group() {
            return (0..f.occurs)
                .map(|ix| self.read_field(buf, base, i, ix))
                .collect::<Result<Vec<_>>>()
                .map(Value::List);
        }
        self.read_field(buf, base, i, 0)
    }

    /// Re-walk the fields against the bound buffer. No-op for fixed layouts.
    pub(crate) fn prepare_at(
        &mut self,
        buf: &[u8],
        base: usize,
        parent: Option<&OccursContext<'_>>,
    ) -> Result<()> {
        if !self.varies {
            return Ok(());
        }
        self.prepared = false;
        let mut cursor: usize = 0;
        for i in 0..self.fields.len() {
            if let Some(delta) = self.fields[i].spec.repos {
                cursor = self.shift(cursor, delta, &self.fields[i].spec.name)?;
            }
            if let Some(p) = self.fields[i].spec.pos {
                cursor = p;
            }
            if cursor != self.fields[i].offset {
                debug!(
                    layout = %self.name,
                    field = %self.fields[i].spec.name,
                    from = self.fields[i].offset,
                    to = cursor,
                    "reposition"
                );
            }
            self.fields[i].offset = cursor;
            let opts = self.fields[i].opts;

            if self.fields[i].is_repeating() {
                let count = self.resolve_occurs(buf, base, parent, i, cursor)?;
                self.fields[i].occurs = count;
                self.fields[i].possiz = None;
                if self.fields[i].is_group() {
                    cursor = self.prepare_group(buf, base, parent, i, cursor, count)?;
                } else if opts.is_variable() {
                    self.check_walk(buf, base, i, cursor, count)?;
                    let mut possiz = Vec::with_capacity(count);
                    for _ in 0..count {
                        let (p, s) = self.read_prefix(buf, base, parent, i, cursor, opts)?;
                        possiz.push((p, s));
                        cursor = self.advance(p, s, i)?;
                    }
                    self.fields[i].possiz = Some(possiz);
                } else {
                    let total = self.fields[i].size.checked_mul(count);
                    cursor = self.advance(cursor, total.unwrap_or(usize::MAX), i)?;
                }
            } else if opts.is_variable() {
                let (p, s) = self.read_prefix(buf, base, parent, i, cursor, opts)?;
                self.fields[i].offset = p;
                self.fields[i].size = s;
                cursor = self.advance(p, s, i)?;
            } else {
                cursor = self.advance(cursor, self.fields[i].size, i)?;
            }
        }
        self.size = self.init_size.max(cursor);
        self.prepared = true;
        debug!(layout = %self.name, size = self.size, "prepared");
        Ok(())
    }

    fn advance(&self, cursor: usize, by: usize, i: usize) -> Result<usize> {
        cursor.checked_add(by).ok_or_else(|| {
            self.err(ErrorKind::InvalidPosition {
                field: self.fields[i].spec.name.clone(),
                detail: "field extends beyond address space".to_string(),
            })
        })
    }

    /// Occurrences walked one by one occupy at least a byte each, so a
    /// count larger than the rest of the buffer cannot be right.
    fn check_walk(&self, buf: &[u8], base: usize, i: usize, cursor: usize, count: usize) -> Result<()> {
        let rest = buf.len().saturating_sub(base.saturating_add(cursor));
        if count > rest {
            return Err(self.err(ErrorKind::InvalidOccurs {
                field: self.fields[i].spec.name.clone(),
                count: i64::try_from(count).unwrap_or(i64::MAX),
            }));
        }
        Ok(())
    }

    fn resolve_occurs(
        &self,
        buf: &[u8],
        base: usize,
        parent: Option<&OccursContext<'_>>,
        i: usize,
        cursor: usize,
    ) -> Result<usize> {
        let name = &self.fields[i].spec.name;
        let count = match self.fields[i].spec.occurs.clone() {
            Some(Occurs::Fixed(n)) => n,
            Some(Occurs::Counted(w)) => self.read_count(buf, base, parent, i, cursor, w)?,
            Some(Occurs::Dynamic(f)) => {
                let ctx = OccursContext {
                    layout: self,
                    buf,
                    base,
                    parent,
                };
                match f(&ctx)? {
                    n if n >= 0 => usize::try_from(n).map_err(|_| {
                        self.err(ErrorKind::InvalidOccurs {
                            field: name.clone(),
                            count: n,
                        })
                    })?,
                    -1 => self.read_count(buf, base, parent, i, cursor, 1)?,
                    -2 => self.read_count(buf, base, parent, i, cursor, 2)?,
                    n => {
                        return Err(self.err(ErrorKind::InvalidOccurs {
                            field: name.clone(),
                            count: n,
                        }))
                    }
                }
            }
            None => 1,
        };
        debug!(layout = %self.name, field = %name, count, "occurrences");
        Ok(count)
    }

    /// Occurrence count stored in the `width` bytes before `cursor`.
    fn read_count(
        &self,
        buf: &[u8],
        base: usize,
        parent: Option<&OccursContext<'_>>,
        i: usize,
        cursor: usize,
        width: usize,
    ) -> Result<usize> {
        let at = cursor.checked_sub(width).ok_or_else(|| {
            self.err(ErrorKind::InvalidPosition {
                field: self.fields[i].spec.name.clone(),
                detail: format!("no room for a {width}-byte count before offset {cursor}"),
            })
        })?;
        let prefix = if width == 1 {
            FieldOpts::MUPE | FieldOpts::VAR1
        } else {
            FieldOpts::MUPE | FieldOpts::VAR2
        };
        self.read_prefix(buf, base, parent, i, at, prefix)
            .map(|(_, count)| count)
    }

    /// Position and size of variable data at `pos`: the data offset past the
    /// length prefix and the data length.
    pub(crate) fn read_prefix(
        &self,
        buf: &[u8],
        base: usize,
        parent: Option<&OccursContext<'_>>,
        i: usize,
        pos: usize,
        opts: FieldOpts,
    ) -> Result<(usize, usize)> {
        let f = &self.fields[i];
        let width = opts.prefix_width();
        if width == 0 {
            let size = match f.spec.size_fn.clone() {
                Some(size_fn) => size_fn(&OccursContext {
                    layout: self,
                    buf,
                    base,
                    parent,
                })?,
                None => f.spec.size,
            };
            return Ok((pos, size));
        }
        let mupe = opts.contains(FieldOpts::MUPE);
        let r = self.range(buf.len(), base, pos, width, &f.spec.name)?;
        let endianness = if mupe {
            self.endianness()
        } else {
            self.field_endianness(f)
        };
        let n = match endianness {
            Endianness::Big => BigEndian::read_uint(&buf[r], width),
            Endianness::Little => LittleEndian::read_uint(&buf[r], width),
        };
        let size = match width {
            1 if n > 0 && !mupe => n - 1,
            2 if !mupe => n.saturating_sub(2),
            4 => n.saturating_sub(4),
            _ => n,
        };
        let size = usize::try_from(size).map_err(|_| {
            self.err(ErrorKind::InvalidData {
                field: f.spec.name.clone(),
                detail: format!("length {n}"),
            })
        })?;
        debug!(layout = %self.name, field = %f.spec.name, pos, width, size, mupe, "length prefix");
        Ok((pos + width, size))
    }

    /// Place the occurrences of a periodic group starting at `cursor`.
    fn prepare_group(
        &mut self,
        buf: &[u8],
        base: usize,
        parent: Option<&OccursContext<'_>>,
        i: usize,
        cursor: usize,
        count: usize,
    ) -> Result<usize> {
        let Some(mut sub) = self.fields[i].spec.group.take() else {
            return Err(self.err(ErrorKind::NotComposite(self.fields[i].spec.name.clone())));
        };
        if !sub.varies {
            let size = sub.size();
            self.fields[i].spec.group = Some(sub);
            self.fields[i].size = size;
            let total = size.checked_mul(count).unwrap_or(usize::MAX);
            return self.advance(cursor, total, i);
        }
        let walked = {
            let ctx = OccursContext {
                layout: self,
                buf,
                base,
                parent,
            };
            let mut walk = || -> Result<Vec<(usize, usize)>> {
                self.check_walk(buf, base, i, cursor, count)?;
                let mut possiz = Vec::with_capacity(count);
                let mut at = cursor;
                for _ in 0..count {
                    let abs = self.advance(base, at, i)?;
                    sub.prepare_at(buf, abs, Some(&ctx))?;
                    possiz.push((at, sub.size()));
                    at = self.advance(at, sub.size(), i)?;
                }
                Ok(possiz)
            };
            walk()
        };
        let size = sub.size();
        self.fields[i].spec.group = Some(sub);
        let possiz = walked?;
        let end = possiz.last().map_or(cursor, |(p, s)| p + s);
        self.fields[i].size = size;
        self.fields[i].possiz = Some(possiz);
        Ok(end)
    }

    /// Re-prepare the nested layout of group `i` for occurrence `index` and
    /// return its absolute start.
    pub(crate) fn prepare_occurrence(&mut self, buf: &[u8], base: usize, i: usize, index: usize) -> Result<usize> {
        let (rel, _) = self.fields[i].occurrence(index).map_err(|k| self.err(k))?;
        let abs = base.checked_add(rel).unwrap_or(usize::MAX);
        let needs_prepare = self.fields[i].group().is_some_and(Layout::is_variable);
        if needs_prepare {
            let Some(mut sub) = self.fields[i].spec.group.take() else {
                return Err(self.err(ErrorKind::NotComposite(self.fields[i].spec.name.clone())));
            };
            let result = {
                let ctx = OccursContext {
                    layout: self,
                    buf,
                    base,
                    parent: None,
                };
                sub.prepare_at(buf, abs, Some(&ctx))
            };
            self.fields[i].spec.group = Some(sub);
            result?;
        }
        Ok(abs)
    }
}

/// Read-only view of a layout bound to a buffer, handed to occurrence and
/// size functions during `prepare()`. Fields placed before the one being
/// resolved are readable.
pub struct OccursContext<'a> {
    layout: &'a Layout,
    buf: &'a [u8],
    base: usize,
    parent: Option<&'a OccursContext<'a>>,
}

impl<'a> OccursContext<'a> {
    pub fn get(&self, name: &str) -> Result<Value> {
        self.layout.read_named(self.buf, self.base, name)
    }

    pub fn get_at(&self, name: &str, index: usize) -> Result<Value> {
        let i = self.layout.lookup(name)?;
        self.layout.read_field(self.buf, self.base, i, index)
    }

    /// Integer value of a field, `0` when it is not an integer.
    pub fn get_int(&self, name: &str) -> Result<i64> {
        Ok(self.get(name)?.as_i64().unwrap_or(0))
    }

    /// Context of the enclosing layout when resolving a nested group.
    pub fn parent(&self) -> Option<&OccursContext<'a>> {
        self.parent
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    pub fn buffer(&self) -> &[u8] {
        self.buf
    }

    /// Absolute start of the layout in the buffer.
    pub fn offset(&self) -> usize {
        self.base
    }
}
