//! Field codecs: conversion between [`Value`]s and a field's byte window.
//!
//! Every function here works on a slice that is exactly the field's window;
//! positioning and bounds are the caller's business. Errors are reported as
//! [`ErrorKind`] and wrapped with the layout name by the record.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::config::{ByteOrder, TextEncoding};
use crate::dtconv;
use crate::error::{DatamapError, ErrorKind};
use crate::field::{DtKind, FieldOpts, FieldType};
use crate::value::Value;

pub(crate) type CodecResult<T> = std::result::Result<T, ErrorKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// Conversion parameters of one field, resolved against its layout.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    pub field: &'a str,
    pub ftype: FieldType,
    pub opts: FieldOpts,
    pub dt: Option<DtKind>,
    pub endianness: Endianness,
    /// Effective text encoding; an EBCDIC page when the field is EBCDIC.
    pub encoding: TextEncoding,
}

impl<'a> Codec<'a> {
    pub fn ebcdic(&self) -> bool {
        self.encoding.is_ebcdic()
    }

    fn overflow(&self, detail: impl Into<String>) -> ErrorKind {
        ErrorKind::FieldOverflow {
            field: self.field.to_string(),
            detail: detail.into(),
        }
    }

    fn mismatch(&self, expected: &'static str, got: &Value) -> ErrorKind {
        ErrorKind::TypeMismatch {
            field: self.field.to_string(),
            expected,
            got: got.type_name(),
        }
    }

    fn invalid(&self, detail: impl Into<String>) -> ErrorKind {
        ErrorKind::InvalidData {
            field: self.field.to_string(),
            detail: detail.into(),
        }
    }

    fn check_width(&self, len: usize) -> CodecResult<()> {
        match self.ftype.fixed_size() {
            Some(n) if n != len => Err(ErrorKind::InvalidLength {
                field: self.field.to_string(),
                length: len,
            }),
            _ => Ok(()),
        }
    }

    /// Encode `value` into the whole of `dst`.
    pub fn encode(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        self.check_width(dst.len())?;
        match self.ftype {
            FieldType::String => {
                let b = self.string_bytes(value)?;
                fill_padded(dst, &b, self.encoding.space());
                Ok(())
            }
            FieldType::Utf8 => {
                let b = self.utf8_bytes(value)?;
                fill_padded(dst, &b, b' ');
                Ok(())
            }
            FieldType::Utf16 => self.encode_utf16(dst, value),
            FieldType::Char => self.encode_char(dst, value),
            FieldType::Bytes => self.encode_bytes(dst, value),
            FieldType::Packed => self.encode_packed(dst, value),
            FieldType::Unpacked => self.encode_unpacked(dst, value),
            FieldType::Float | FieldType::Double => self.encode_float(dst, value),
            FieldType::Group => Err(ErrorKind::Composite(self.field.to_string())),
            _ => self.encode_int(dst, value),
        }
    }

    /// Decode the whole of `src`.
    pub fn decode(&self, src: &[u8]) -> CodecResult<Value> {
        self.check_width(src.len())?;
        match self.ftype {
            FieldType::String => Ok(Value::Str(trim_blank(self.encoding.decode(src)))),
            FieldType::Utf8 => Ok(Value::Str(trim_blank(
                String::from_utf8_lossy(src).into_owned(),
            ))),
            FieldType::Utf16 => Ok(Value::Str(trim_blank(self.decode_utf16(src)))),
            FieldType::Char => Ok(Value::Str(self.encoding.decode(src))),
            FieldType::Bytes => Ok(Value::Bytes(src.to_vec())),
            FieldType::Packed => self.decode_packed(src),
            FieldType::Unpacked => self.decode_unpacked(src),
            FieldType::Float => Ok(Value::Float(match self.endianness {
                Endianness::Big => BigEndian::read_f32(src),
                Endianness::Little => LittleEndian::read_f32(src),
            })),
            FieldType::Double => Ok(Value::Double(match self.endianness {
                Endianness::Big => BigEndian::read_f64(src),
                Endianness::Little => LittleEndian::read_f64(src),
            })),
            FieldType::Group => Err(ErrorKind::Composite(self.field.to_string())),
            _ => self.decode_int(src),
        }
    }

    /// Unpadded encoding of a length-prefixed text or byte field.
    pub fn encode_variable(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match self.ftype {
            FieldType::String => self.string_bytes(value),
            FieldType::Utf8 => self.utf8_bytes(value),
            FieldType::Utf16 => {
                let units: Vec<u16> = self.utf16_source(value)?.encode_utf16().collect();
                let mut out = vec![0u8; units.len() * 2];
                self.write_units(&mut out, &units);
                Ok(out)
            }
            FieldType::Bytes => match value {
                Value::Bytes(b) => Ok(b.clone()),
                Value::Null => Ok(Vec::new()),
                Value::Int(_) => {
                    let x = self.non_negative(value)?;
                    let be = x.to_be_bytes();
                    let skip = be.iter().take_while(|&&b| b == 0).count();
                    let mut out = be[skip..].to_vec();
                    if self.endianness == Endianness::Little {
                        out.reverse();
                    }
                    Ok(out)
                }
                other => Err(self.mismatch("bytes", other)),
            },
            _ => Err(ErrorKind::TypeMismatch {
                field: self.field.to_string(),
                expected: "fixed-size value",
                got: value.type_name(),
            }),
        }
    }

    fn string_bytes(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match value {
            Value::Str(s) => self.encode_text(s),
            Value::Bytes(b) => Ok(match self.encoding.code_page() {
                Some(page) => page.from_latin1_bytes(b),
                None => b.clone(),
            }),
            Value::Null => Ok(Vec::new()),
            Value::List(_) => Err(self.mismatch("str", value)),
            other => self.encode_text(&other.to_string()),
        }
    }

    fn encode_text(&self, s: &str) -> CodecResult<Vec<u8>> {
        self.encoding.encode(s).map_err(|ch| ErrorKind::Unencodable {
            field: self.field.to_string(),
            ch,
            encoding: self.encoding.name(),
        })
    }

    fn utf8_bytes(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match value {
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            Value::Bytes(b) => Ok(b.clone()),
            Value::Null => Ok(Vec::new()),
            Value::List(_) => Err(self.mismatch("str", value)),
            other => Ok(other.to_string().into_bytes()),
        }
    }

    fn utf16_source(&self, value: &Value) -> CodecResult<String> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Bytes(b) => Ok(self.encoding.decode(b)),
            Value::Null => Ok(String::new()),
            Value::List(_) => Err(self.mismatch("str", value)),
            other => Ok(other.to_string()),
        }
    }

    fn write_units(&self, dst: &mut [u8], units: &[u16]) {
        for (chunk, &u) in dst.chunks_exact_mut(2).zip(units) {
            match self.endianness {
                Endianness::Big => BigEndian::write_u16(chunk, u),
                Endianness::Little => LittleEndian::write_u16(chunk, u),
            }
        }
    }

    fn encode_utf16(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let cap = dst.len() / 2;
        let mut units: Vec<u16> = self.utf16_source(value)?.encode_utf16().take(cap).collect();
        units.resize(cap, 0x20);
        self.write_units(dst, &units);
        if dst.len() % 2 == 1 {
            let last = dst.len() - 1;
            dst[last] = 0;
        }
        Ok(())
    }

    fn decode_utf16(&self, src: &[u8]) -> String {
        let units: Vec<u16> = src
            .chunks_exact(2)
            .map(|c| match self.endianness {
                Endianness::Big => BigEndian::read_u16(c),
                Endianness::Little => LittleEndian::read_u16(c),
            })
            .collect();
        String::from_utf16_lossy(&units)
    }

    fn encode_char(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let b = match value {
            Value::Null => Vec::new(),
            Value::Str(_) | Value::Bytes(_) => self.string_bytes(value)?,
            other => return Err(self.mismatch("single character", other)),
        };
        match b.as_slice() {
            [] => fill_padded(dst, &[], self.encoding.space()),
            [c] => fill_padded(dst, &[*c], self.encoding.space()),
            _ => return Err(self.overflow(format!("{} bytes do not fit a character", b.len()))),
        }
        Ok(())
    }

    fn non_negative(&self, value: &Value) -> CodecResult<u128> {
        match value {
            Value::Int(x) if *x < 0 => Err(self.overflow(format!("negative value {x}"))),
            Value::Int(x) => Ok(*x as u128),
            Value::Null => Ok(0),
            other => Err(self.mismatch("int", other)),
        }
    }

    fn encode_bytes(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        match value {
            Value::Bytes(b) => {
                fill_padded(dst, b, 0);
                Ok(())
            }
            Value::Null | Value::Int(0) => {
                dst.fill(0);
                Ok(())
            }
            Value::Int(_) => {
                let x = self.non_negative(value)?;
                match dst.len() {
                    n @ (1 | 2 | 4 | 8) => {
                        if x >> (8 * n) != 0 {
                            return Err(self.overflow(format!("{x} exceeds {n} bytes")));
                        }
                        self.write_uint(dst, x as u64);
                    }
                    n => {
                        let be = x.to_be_bytes();
                        let skip = be.iter().take_while(|&&b| b == 0).count();
                        let digits = &be[skip..];
                        if digits.len() > n {
                            return Err(self.overflow(format!("{x} exceeds {n} bytes")));
                        }
                        dst.fill(0);
                        dst[n - digits.len()..].copy_from_slice(digits);
                        if self.endianness == Endianness::Little {
                            dst.reverse();
                        }
                    }
                }
                Ok(())
            }
            Value::DateTime(dt) if self.opts.contains(FieldOpts::STCK) && dst.len() == 8 => {
                let tod = dtconv::datetime_to_stck(*dt)
                    .ok_or_else(|| self.overflow("date before 1900"))?;
                self.write_uint(dst, tod);
                Ok(())
            }
            other => Err(self.mismatch("bytes", other)),
        }
    }

    fn write_uint(&self, dst: &mut [u8], x: u64) {
        match self.endianness {
            Endianness::Big => BigEndian::write_uint(dst, x, dst.len()),
            Endianness::Little => LittleEndian::write_uint(dst, x, dst.len()),
        }
    }

    fn int_source(&self, value: &Value) -> CodecResult<i128> {
        match (value, self.dt) {
            (Value::Int(x), _) => Ok(*x),
            (Value::Null, _) => Ok(0),
            (Value::DateTime(_) | Value::Date(_), Some(DtKind::UnixTime)) => {
                let dt = value.as_datetime().ok_or_else(|| self.mismatch("datetime", value))?;
                Ok(i128::from(dtconv::datetime_to_unix(dt)))
            }
            (Value::DateTime(_) | Value::Date(_), Some(DtKind::XTimestamp)) => {
                let dt = value.as_datetime().ok_or_else(|| self.mismatch("datetime", value))?;
                dtconv::datetime_to_xts(dt)
                    .map(i128::from)
                    .ok_or_else(|| self.overflow("timestamp out of range"))
            }
            (Value::DateTime(dt), _) if self.opts.contains(FieldOpts::STCK) => {
                let tod = dtconv::datetime_to_stck(*dt)
                    .ok_or_else(|| self.overflow("date before 1900"))?;
                Ok(if self.ftype.fixed_size() == Some(4) {
                    i128::from(tod >> 32)
                } else {
                    i128::from(tod)
                })
            }
            (other, _) => Err(self.mismatch("int", other)),
        }
    }

    fn encode_int(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let x = self.int_source(value)?;
        let bits = 8 * dst.len() as u32;
        let (lo, hi) = if self.ftype.is_signed() {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        };
        if x < lo || x > hi {
            return Err(self.overflow(format!("{x} outside {lo}..={hi}")));
        }
        if self.ftype.is_signed() {
            let n = dst.len();
            match self.endianness {
                Endianness::Big => BigEndian::write_int(dst, x as i64, n),
                Endianness::Little => LittleEndian::write_int(dst, x as i64, n),
            }
        } else {
            self.write_uint(dst, x as u64);
        }
        Ok(())
    }

    fn decode_int(&self, src: &[u8]) -> CodecResult<Value> {
        let n = src.len();
        let x = if self.ftype.is_signed() {
            i128::from(match self.endianness {
                Endianness::Big => BigEndian::read_int(src, n),
                Endianness::Little => LittleEndian::read_int(src, n),
            })
        } else {
            i128::from(match self.endianness {
                Endianness::Big => BigEndian::read_uint(src, n),
                Endianness::Little => LittleEndian::read_uint(src, n),
            })
        };
        match self.dt {
            Some(DtKind::UnixTime) => i64::try_from(x)
                .ok()
                .and_then(dtconv::unix_to_datetime)
                .map(Value::DateTime)
                .ok_or_else(|| self.invalid(format!("unix time {x}"))),
            Some(DtKind::XTimestamp) if n == 8 => i64::try_from(x)
                .ok()
                .and_then(dtconv::xts_to_datetime)
                .map(Value::DateTime)
                .ok_or_else(|| self.invalid(format!("timestamp {x}"))),
            _ => Ok(Value::Int(x)),
        }
    }

    fn encode_float(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let x = match value {
            Value::Null => 0.0,
            Value::Float(_) | Value::Double(_) | Value::Int(_) => {
                value.as_f64().unwrap_or_default()
            }
            other => return Err(self.mismatch("float", other)),
        };
        match (self.ftype, self.endianness) {
            (FieldType::Float, Endianness::Big) => BigEndian::write_f32(dst, x as f32),
            (FieldType::Float, Endianness::Little) => LittleEndian::write_f32(dst, x as f32),
            (_, Endianness::Big) => BigEndian::write_f64(dst, x),
            (_, Endianness::Little) => LittleEndian::write_f64(dst, x),
        }
        Ok(())
    }

    /// Decimal digits and sign of a value bound for a packed or zoned field.
    fn decimal_source(&self, value: &Value) -> CodecResult<(String, bool)> {
        if let (Some(kind), false) = (self.dt, matches!(value, Value::Int(_))) {
            return self.dt_digits(kind, value).map(|d| (d, false));
        }
        match value {
            Value::Int(x) => Ok((x.unsigned_abs().to_string(), *x < 0)),
            Value::Null => Ok(("0".to_string(), false)),
            Value::Str(s) => {
                let x: i128 = s
                    .trim()
                    .parse()
                    .map_err(|_| self.mismatch("decimal number", value))?;
                Ok((x.unsigned_abs().to_string(), x < 0))
            }
            other => Err(self.mismatch("int", other)),
        }
    }

    fn dt_digits(&self, kind: DtKind, value: &Value) -> CodecResult<String> {
        if value.is_null() {
            return Ok("0".to_string());
        }
        let need_dt = |v: &Value| v.as_datetime().ok_or_else(|| self.mismatch("datetime", v));
        let s = match kind {
            DtKind::Date => {
                let d = value.as_date().ok_or_else(|| self.mismatch("date", value))?;
                format!("{:04}{:02}{:02}", d.year(), d.month(), d.day())
            }
            DtKind::Time => {
                let t = match value {
                    Value::Time(t) => *t,
                    Value::DateTime(dt) => dt.time(),
                    other => return Err(self.mismatch("time", other)),
                };
                format!("{:02}{:02}{:02}", t.hour(), t.minute(), t.second())
            }
            DtKind::DateTime => ymdhms(&need_dt(value)?),
            DtKind::Timestamp => {
                let dt = need_dt(value)?;
                format!("{}{:06}", ymdhms(&dt), dt.nanosecond() / 1000 % 1_000_000)
            }
            DtKind::NatDate => {
                let d = value.as_date().ok_or_else(|| self.mismatch("date", value))?;
                dtconv::date_to_natdate(d).to_string()
            }
            DtKind::NatTime => dtconv::datetime_to_nattime(need_dt(value)?).to_string(),
            DtKind::UnixTime => dtconv::datetime_to_unix(need_dt(value)?).to_string(),
            DtKind::XTimestamp => dtconv::datetime_to_xts(need_dt(value)?)
                .ok_or_else(|| self.overflow("timestamp out of range"))?
                .to_string(),
        };
        if s.starts_with('-') {
            return Err(self.overflow(format!("negative date value {s}")));
        }
        Ok(s)
    }

    fn encode_packed(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let (digits, negative) = self.decimal_source(value)?;
        let sign = if negative {
            0x0D
        } else if self.ebcdic() {
            0x0F
        } else {
            0x0C
        };
        let mut nibbles: Vec<u8> = Vec::with_capacity(digits.len() + 2);
        if digits.len() % 2 == 0 {
            nibbles.push(0);
        }
        nibbles.extend(digits.bytes().map(|b| b - b'0'));
        nibbles.push(sign);
        let packed: Vec<u8> = nibbles.chunks(2).map(|c| c[0] << 4 | c[1]).collect();
        if packed.len() > dst.len() {
            return Err(self.overflow(format!(
                "{} digits exceed packed length {}",
                digits.len(),
                dst.len()
            )));
        }
        let lead = dst.len() - packed.len();
        dst[..lead].fill(0);
        dst[lead..].copy_from_slice(&packed);
        Ok(())
    }

    fn decode_packed(&self, src: &[u8]) -> CodecResult<Value> {
        let Some((&last, head)) = src.split_last() else {
            return Err(self.invalid("empty packed field"));
        };
        let mut digits = String::with_capacity(src.len() * 2);
        for &b in head {
            push_digit(&mut digits, b >> 4).ok_or_else(|| self.invalid(format!("byte {b:02X}")))?;
            push_digit(&mut digits, b & 0x0F)
                .ok_or_else(|| self.invalid(format!("byte {b:02X}")))?;
        }
        push_digit(&mut digits, last >> 4)
            .ok_or_else(|| self.invalid(format!("byte {last:02X}")))?;
        let negative = matches!(last & 0x0F, 0x0B | 0x0D);
        self.decimal_value(&digits, negative)
    }

    fn encode_unpacked(&self, dst: &mut [u8], value: &Value) -> CodecResult<()> {
        let (digits, negative) = self.decimal_source(value)?;
        if digits.len() > dst.len() {
            return Err(self.overflow(format!(
                "{} digits exceed unpacked length {}",
                digits.len(),
                dst.len()
            )));
        }
        let zone = if self.ebcdic() { 0xF0 } else { 0x30 };
        let lead = dst.len() - digits.len();
        dst[..lead].fill(zone);
        for (d, b) in dst[lead..].iter_mut().zip(digits.bytes()) {
            *d = zone | (b - b'0');
        }
        if negative {
            if let Some(last) = dst.last_mut() {
                *last = if self.ebcdic() { 0xD0 } else { 0x70 } | (*last & 0x0F);
            }
        }
        Ok(())
    }

    fn decode_unpacked(&self, src: &[u8]) -> CodecResult<Value> {
        let Some((&last, head)) = src.split_last() else {
            return Err(self.invalid("empty unpacked field"));
        };
        let page = self.encoding.code_page();
        let mut digits = String::with_capacity(src.len());
        for &b in head {
            let b = page.map_or(b, |p| p.to_latin1(b));
            match b {
                b'0'..=b'9' => digits.push(char::from(b)),
                // leading blanks read as zeros
                b' ' if digits.is_empty() => {}
                _ => return Err(self.invalid(format!("zoned byte {b:02X}"))),
            }
        }
        let (zone, digit) = (last >> 4, last & 0x0F);
        if digit > 9 {
            return Err(self.invalid(format!("zoned byte {last:02X}")));
        }
        let negative = match (page.is_some(), zone) {
            (true, 0x0B | 0x0D) => true,
            (true, _) => false,
            (false, 3) => false,
            (false, 7) => true,
            (false, _) => return Err(self.invalid(format!("zoned byte {last:02X}"))),
        };
        digits.push(char::from(b'0' + digit));
        self.decimal_value(&digits, negative)
    }

    fn decimal_value(&self, digits: &str, negative: bool) -> CodecResult<Value> {
        if let Some(kind) = self.dt {
            return self.dt_from_digits(kind, digits);
        }
        let mut x: i128 = 0;
        for b in digits.bytes() {
            x = x
                .checked_mul(10)
                .and_then(|x| x.checked_add(i128::from(b - b'0')))
                .ok_or_else(|| self.invalid("too many digits"))?;
        }
        Ok(Value::Int(if negative { -x } else { x }))
    }

    fn dt_from_digits(&self, kind: DtKind, digits: &str) -> CodecResult<Value> {
        if digits.bytes().all(|b| b == b'0') {
            return Ok(Value::Null);
        }
        let bad = || self.invalid(format!("{kind:?} digits {digits}"));
        let num = |s: &str| s.parse::<u32>().map_err(|_| bad());
        let whole = || digits.trim_start_matches('0').parse::<i64>().map_err(|_| bad());
        match kind {
            DtKind::Date => {
                let s = right_digits(digits, 8);
                let dt = dtconv::from_parts(
                    num(&s[0..4])? as i32,
                    num(&s[4..6])?,
                    num(&s[6..8])?,
                    0,
                    0,
                    0,
                    0,
                )
                .ok_or_else(bad)?;
                Ok(Value::Date(dt.date()))
            }
            DtKind::Time => {
                let s = right_digits(digits, 6);
                dtconv::time_from_parts(num(&s[0..2])?, num(&s[2..4])?, num(&s[4..6])?)
                    .map(Value::Time)
                    .ok_or_else(bad)
            }
            DtKind::DateTime | DtKind::Timestamp => {
                let width = if kind == DtKind::DateTime { 14 } else { 20 };
                let s = right_digits(digits, width);
                let micro = if width == 20 { num(&s[14..20])? } else { 0 };
                dtconv::from_parts(
                    num(&s[0..4])? as i32,
                    num(&s[4..6])?,
                    num(&s[6..8])?,
                    num(&s[8..10])?,
                    num(&s[10..12])?,
                    num(&s[12..14])?,
                    micro,
                )
                .map(Value::DateTime)
                .ok_or_else(bad)
            }
            DtKind::NatDate => dtconv::natdate_to_date(whole()?)
                .map(Value::Date)
                .ok_or_else(bad),
            DtKind::NatTime => dtconv::nattime_to_datetime(whole()?)
                .map(Value::DateTime)
                .ok_or_else(bad),
            DtKind::UnixTime => dtconv::unix_to_datetime(whole()?)
                .map(Value::DateTime)
                .ok_or_else(bad),
            DtKind::XTimestamp => dtconv::xts_to_datetime(whole()?)
                .map(Value::DateTime)
                .ok_or_else(bad),
        }
    }
}

fn ymdhms(dt: &NaiveDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Rightmost `n` digits, zero-extended on the left.
fn right_digits(digits: &str, n: usize) -> String {
    if digits.len() >= n {
        digits[digits.len() - n..].to_string()
    } else {
        format!("{digits:0>n$}")
    }
}

fn push_digit(s: &mut String, nibble: u8) -> Option<()> {
    (nibble <= 9).then(|| s.push(char::from(b'0' + nibble)))
}

fn trim_blank(s: String) -> String {
    let n = s.trim_end_matches(' ').len();
    let mut s = s;
    s.truncate(n);
    s
}

/// Copy `src` into `dst`, truncating or right-padding with `pad`.
fn fill_padded(dst: &mut [u8], src: &[u8], pad: u8) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(pad);
}

/// Number formats of [`fpack`] and [`funpack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumFormat {
    /// `U`: zoned decimal, 1..=29 bytes.
    Unpacked,
    /// `P`: packed decimal, 1..=15 bytes.
    Packed,
    /// `B`: unsigned binary, 1..=126 bytes.
    Binary,
    /// `F`: signed integer of 1, 2, 4 or 8 bytes.
    Fixpoint,
    /// `u`: unsigned integer of 1, 2, 4 or 8 bytes.
    Unsigned,
}

impl NumFormat {
    pub fn from_char(c: char) -> Option<NumFormat> {
        match c {
            'U' => Some(NumFormat::Unpacked),
            'P' => Some(NumFormat::Packed),
            'B' => Some(NumFormat::Binary),
            'F' => Some(NumFormat::Fixpoint),
            'u' => Some(NumFormat::Unsigned),
            _ => None,
        }
    }

    fn field_type(self, length: usize) -> Option<FieldType> {
        let ft = match (self, length) {
            (NumFormat::Unpacked, 1..=29) => FieldType::Unpacked,
            (NumFormat::Packed, 1..=15) => FieldType::Packed,
            (NumFormat::Binary, 1..=126) => FieldType::Bytes,
            (NumFormat::Fixpoint, 1) => FieldType::Int1,
            (NumFormat::Fixpoint, 2) => FieldType::Int2,
            (NumFormat::Fixpoint, 4) => FieldType::Int4,
            (NumFormat::Fixpoint, 8) => FieldType::Int8,
            (NumFormat::Unsigned, 1) => FieldType::Uint1,
            (NumFormat::Unsigned, 2) => FieldType::Uint2,
            (NumFormat::Unsigned, 4) => FieldType::Uint4,
            (NumFormat::Unsigned, 8) => FieldType::Uint8,
            _ => return None,
        };
        Some(ft)
    }
}

fn standalone(
    format: NumFormat,
    length: usize,
    byte_order: ByteOrder,
    ebcdic: bool,
) -> crate::Result<Codec<'static>> {
    let ftype = format.field_type(length).ok_or_else(|| {
        DatamapError::new(
            "formats",
            ErrorKind::InvalidLength {
                field: format!("{format:?}"),
                length,
            },
        )
    })?;
    Ok(Codec {
        field: "value",
        ftype,
        opts: FieldOpts::INOUT,
        dt: None,
        endianness: byte_order.endianness(),
        encoding: if ebcdic {
            TextEncoding::Cp037
        } else {
            TextEncoding::Latin1
        },
    })
}

/// Pack a number into `length` bytes of the given format.
///
/// ```
/// use datamap::{fpack, ByteOrder, NumFormat};
/// assert_eq!(fpack(234, NumFormat::Packed, 2, ByteOrder::Native, false).unwrap(), vec![0x23, 0x4C]);
/// ```
pub fn fpack(
    value: impl Into<Value>,
    format: NumFormat,
    length: usize,
    byte_order: ByteOrder,
    ebcdic: bool,
) -> crate::Result<Vec<u8>> {
    let codec = standalone(format, length, byte_order, ebcdic)?;
    let mut out = vec![0u8; length];
    codec
        .encode(&mut out, &value.into())
        .map_err(|k| DatamapError::new("formats", k))?;
    Ok(out)
}

/// Unpack a number from bytes of the given format. `B` yields the bytes.
///
/// ```
/// use datamap::{funpack, ByteOrder, NumFormat, Value};
/// assert_eq!(funpack(&[0x23, 0x4D], NumFormat::Packed, ByteOrder::Native, false).unwrap(), Value::Int(-234));
/// ```
pub fn funpack(
    src: &[u8],
    format: NumFormat,
    byte_order: ByteOrder,
    ebcdic: bool,
) -> crate::Result<Value> {
    let codec = standalone(format, src.len(), byte_order, ebcdic)?;
    codec
        .decode(src)
        .map_err(|k| DatamapError::new("formats", k))
}
