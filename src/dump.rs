//! Display helpers: hex dumps, flag decoding, and detail/line listings of
//! bound records.

use crate::dtconv;
use crate::ebcdic::CP037;
use crate::error::Result;
use crate::field::{FieldOpts, FieldType};
use crate::layout::{Field, Layout};
use crate::record::Record;
use crate::value::Value;

fn ascii_printable(b: u8) -> char {
    if (0x20..0x7F).contains(&b) {
        char::from(b)
    } else {
        '.'
    }
}

fn ebcdic_printable(b: u8) -> char {
    if b < 0x40 || b == 0xFF {
        return '.';
    }
    ascii_printable(CP037.to_latin1(b))
}

fn suppressed(n: usize) -> String {
    format!("      {n} identical line(s) suppressed")
}

/// Hex dump in 16-byte lines: offset, four big-endian words, then the
/// bytes read as ASCII and as EBCDIC. Runs of identical lines are
/// collapsed.
///
/// ```
/// let d = datamap::dump::hexdump(b"ABC", "buf");
/// let lines: Vec<&str> = d.lines().collect();
/// assert_eq!(lines[0], "buf");
/// assert!(lines[1].starts_with(" 0000 414243   "));
/// assert!(lines[1].ends_with(&format!("ABC{}...", " ".repeat(14))));
/// ```
pub fn hexdump(buf: &[u8], header: &str) -> String {
    let mut lines = Vec::new();
    if !header.is_empty() {
        lines.push(header.to_string());
    }
    let full = buf.len() / 16;
    let mut prev: Option<&[u8]> = None;
    let mut last = 0;
    for (i, chunk) in buf.chunks_exact(16).enumerate() {
        if prev == Some(chunk) {
            continue;
        }
        if i > last + 1 {
            lines.push(suppressed(i - last - 1));
        }
        last = i;
        prev = Some(chunk);
        let words: Vec<String> = chunk
            .chunks_exact(4)
            .map(|w| w.iter().map(|b| format!("{b:02X}")).collect())
            .collect();
        let asc: String = chunk.iter().map(|&b| ascii_printable(b)).collect();
        let ebc: String = chunk.iter().map(|&b| ebcdic_printable(b)).collect();
        lines.push(format!(" {:04X} {} {asc} {ebc}", i * 16, words.join(" ")));
    }
    if full > 0 && last + 1 < full {
        lines.push(suppressed(full - 1 - last));
    }

    let rest = &buf[full * 16..];
    if !rest.is_empty() {
        let hex: String = rest.iter().map(|b| format!("{b:02X}")).collect();
        let hex = format!("{hex:<32}");
        let asc: String = rest.iter().map(|&b| ascii_printable(b)).collect();
        let ebc: String = rest.iter().map(|&b| ebcdic_printable(b)).collect();
        lines.push(format!(
            " {:04X} {} {} {} {} {asc}{}{ebc}",
            full * 16,
            &hex[0..8],
            &hex[8..16],
            &hex[16..24],
            &hex[24..32],
            " ".repeat(16 - rest.len() + 1),
        ));
    }
    lines.join("\n")
}

/// Names of the bit groups set in `value`. Each entry is a mask, the name
/// used when all its bits are set, and an optional name used when none
/// are. Bits left over are shown in hex.
///
/// ```
/// use datamap::dump::bit_str;
/// let bits = [(2, "two", None), (0x80, "negative", Some("positive"))];
/// assert_eq!(bit_str(0x86, &bits), "two,negative,X'04'");
/// assert_eq!(bit_str(0, &bits), "positive");
/// ```
pub fn bit_str(value: u64, bits: &[(u64, &str, Option<&str>)]) -> String {
    let mut x = value;
    let mut out: Vec<String> = Vec::new();
    for &(mask, name, unset) in bits {
        if x & mask == mask {
            x ^= mask;
            out.push(name.to_string());
        } else if x & mask == 0 {
            if let Some(d) = unset {
                out.push(d.to_string());
            }
        }
    }
    if x != 0 {
        out.push(format!("X'{x:02X}'"));
    }
    out.join(",")
}

/// Names of the flags set in `flag`, comma separated.
pub fn flag_str(flag: u64, flags: &[(u64, &str)]) -> String {
    flags
        .iter()
        .filter(|(m, _)| flag & m != 0)
        .map(|(_, s)| *s)
        .collect::<Vec<_>>()
        .join(",")
}

/// Like [`flag_str`] with one slot per flag, `.` when unset.
pub fn flag_strc(flag: u64, flags: &[(u64, &str)]) -> String {
    flags
        .iter()
        .map(|(m, s)| if flag & m != 0 { *s } else { "." })
        .collect()
}

/// Table lookup of a value. Unknown integers are shown in hex, other
/// unknown values as an empty string.
pub fn str_str(key: &Value, table: &[(Value, &str)]) -> String {
    match table.iter().find(|(k, _)| k == key) {
        Some((_, s)) => s.to_string(),
        None => match key {
            Value::Int(x) => format!("X'{x:02X}'"),
            _ => String::new(),
        },
    }
}

/// Presentation form of a decoded value: print function output, STCK as
/// a timestamp, `HEX` numbers as hex digits.
pub(crate) fn display_value(f: &Field, v: Value) -> Value {
    if let Some(pp) = &f.spec.ppfunc {
        return Value::Str(pp(&v));
    }
    let ftype = f.field_type();
    if ftype == FieldType::Bytes {
        return v;
    }
    if f.opts.contains(FieldOpts::STCK) {
        match (ftype, v.as_u64()) {
            (FieldType::Uint4, Some(x)) => {
                return Value::Str(dtconv::format_stck4(u32::try_from(x).unwrap_or(u32::MAX)))
            }
            (_, Some(x)) => return Value::Str(dtconv::format_stck(x)),
            _ => {}
        }
    }
    if f.opts.contains(FieldOpts::HEX) && !ftype.is_text() && ftype != FieldType::Char {
        if let Some(x) = v.as_i128() {
            let bits = 8 * f.size();
            let x = if bits < 128 {
                (x as u128) & ((1u128 << bits) - 1)
            } else {
                x as u128
            };
            return Value::Str(format!("{:0width$X}", x, width = 2 * f.size()));
        }
    }
    v
}

fn left_aligned(f: &Field) -> bool {
    matches!(
        f.field_type(),
        FieldType::String | FieldType::Utf8 | FieldType::Utf16
    )
}

fn column_width(f: &Field) -> usize {
    let min = if f.opts.contains(FieldOpts::STCK) {
        if f.field_type() == FieldType::Uint4 {
            19
        } else {
            26
        }
    } else {
        0
    };
    f.colsize().max(f.title().chars().count()).max(min)
}

fn listed(f: &Field) -> bool {
    !f.opts.contains(FieldOpts::NONE) && f.opts.readable()
}

fn pad(s: &str, width: usize, left: bool) -> String {
    if left {
        format!("{s:<width$}")
    } else {
        format!("{s:>width$}")
    }
}

impl Layout {
    /// Name line and column titles matching [`Record::line`].
    pub fn header_line(&self, indent: usize) -> String {
        let ind = " ".repeat(indent);
        let cols: Vec<String> = self
            .fields
            .iter()
            .filter(|f| listed(f) && !f.is_group())
            .map(|f| pad(f.title(), column_width(f), left_aligned(f)))
            .collect();
        format!("{ind}{}\n{ind}{}", self.name(), cols.join(" "))
    }
}

impl<'a> Record<'a> {
    /// All listed scalar fields on one line, in the columns of
    /// [`Layout::header_line`]. Groups are left out; repeating fields show
    /// their values comma separated.
    pub fn line(&self, indent: usize) -> Result<String> {
        let mut cols = Vec::new();
        for (i, f) in self.layout.fields.iter().enumerate() {
            if !listed(f) || f.is_group() {
                continue;
            }
            let text = if f.is_repeating() {
                (0..f.occurs())
                    .map(|ix| self.read_field(i, ix).map(|v| display_value(f, v).to_string()))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ")
            } else {
                display_value(f, self.read_field(i, 0)?).to_string()
            };
            cols.push(pad(&text, column_width(f), left_aligned(f)));
        }
        Ok(format!("{}{}", " ".repeat(indent), cols.join(" ")))
    }

    /// Detail listing: one `title = value` line per field, periodic groups
    /// as an indented table.
    pub fn describe(&mut self) -> Result<String> {
        let mut out = Vec::new();
        self.describe_into(&mut out, 0)?;
        Ok(out.join("\n"))
    }

    fn describe_into(&mut self, out: &mut Vec<String>, indent: usize) -> Result<()> {
        let ind = " ".repeat(indent);
        out.push(format!("{ind}{} at offset X'{:04X}'", self.layout.name(), self.offset()));
        let ks = self
            .layout
            .fields
            .iter()
            .filter(|f| listed(f))
            .map(|f| f.title().chars().count())
            .max()
            .unwrap_or(0);

        for i in 0..self.layout.fields.len() {
            let f = &self.layout.fields[i];
            if !listed(f) {
                continue;
            }
            let title = f.title().to_string();
            if f.is_group() {
                let header = match f.group() {
                    Some(sub) => sub.header_line(indent + 4),
                    None => continue,
                };
                out.push(String::new());
                out.push(header);
                for ix in 0..f.occurs() {
                    let rec = self.occurrence_record(i, ix)?;
                    out.push(rec.line(indent + 4)?);
                }
                out.push(String::new());
                continue;
            }
            let rendered = if f.is_repeating() {
                let vals = (0..f.occurs())
                    .map(|ix| self.read_field(i, ix).map(|v| quoted(f, v)))
                    .collect::<Result<Vec<_>>>()?;
                format!("[{}]", vals.join(", "))
            } else {
                quoted(f, self.read_field(i, 0)?)
            };
            out.push(format!("{ind}{title:<ks$} = {rendered}"));
        }
        Ok(())
    }
}

/// Value as shown by `describe`: text quoted, bytes as `X'..'`.
fn quoted(f: &Field, v: Value) -> String {
    match (f.field_type(), &v) {
        (FieldType::Bytes, Value::Bytes(b)) if f.spec.ppfunc.is_none() => {
            if b.is_empty() {
                format!("X'{}'", "00".repeat(f.size()))
            } else {
                format!("X'{v}'")
            }
        }
        (t, Value::Str(s)) if (t.is_text() || t == FieldType::Char) && f.spec.ppfunc.is_none() => {
            format!("'{s}'")
        }
        _ => display_value(f, v).to_string(),
    }
}
