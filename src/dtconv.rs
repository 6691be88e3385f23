//! Date and time conversions for the binary date encodings.
//!
//! * NATDATE: days since 0000-01-01 (0001-01-01 is day 365)
//! * NATTIME: tenths of seconds on the same epoch
//! * Unix seconds and XTIMESTAMP microseconds since 1970-01-01
//! * STCK: S/390 TOD clock, bit 51 = 1 µs, epoch 1900-01-01
//!
//! All values are naive UTC.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub const DAYSECS: i64 = 86_400;
/// Day offset between NATDATE and days since 0001-01-01.
pub const NATDATE_BASE: i64 = 365;
const NATTIME_BASE: i64 = NATDATE_BASE * DAYSECS * 10;

fn midnight(year: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn epoch0001() -> NaiveDateTime {
    midnight(1)
}

fn epoch1970() -> NaiveDateTime {
    midnight(1970)
}

fn epoch1900() -> NaiveDateTime {
    midnight(1900)
}

fn add_micros(base: NaiveDateTime, micros: i64) -> Option<NaiveDateTime> {
    base.checked_add_signed(Duration::microseconds(micros))
}

pub fn date_to_natdate(d: NaiveDate) -> i64 {
    d.signed_duration_since(epoch0001().date()).num_days() + NATDATE_BASE
}

pub fn natdate_to_date(n: i64) -> Option<NaiveDate> {
    let days = n.checked_sub(NATDATE_BASE)?;
    // beyond any representable date
    if days.abs() > 4_000_000 {
        return None;
    }
    epoch0001().date().checked_add_signed(Duration::days(days))
}

pub fn datetime_to_nattime(dt: NaiveDateTime) -> i64 {
    let micros = dt
        .signed_duration_since(epoch0001())
        .num_microseconds()
        .unwrap_or(0);
    micros.div_euclid(100_000) + NATTIME_BASE
}

pub fn nattime_to_datetime(nt: i64) -> Option<NaiveDateTime> {
    let tenths = nt.checked_sub(NATTIME_BASE)?;
    add_micros(epoch0001(), tenths.checked_mul(100_000)?)
}

/// A date at midnight as NATTIME.
pub fn date_to_nattime(d: NaiveDate) -> i64 {
    date_to_natdate(d) * DAYSECS * 10
}

pub fn datetime_to_unix(dt: NaiveDateTime) -> i64 {
    dt.signed_duration_since(epoch1970()).num_seconds()
}

pub fn unix_to_datetime(secs: i64) -> Option<NaiveDateTime> {
    add_micros(epoch1970(), secs.checked_mul(1_000_000)?)
}

pub fn datetime_to_xts(dt: NaiveDateTime) -> Option<i64> {
    dt.signed_duration_since(epoch1970()).num_microseconds()
}

pub fn xts_to_datetime(micros: i64) -> Option<NaiveDateTime> {
    add_micros(epoch1970(), micros)
}

/// Full 8-byte TOD clock value.
pub fn stck_to_datetime(tod: u64) -> Option<NaiveDateTime> {
    let micros = i64::try_from(tod >> 12).ok()?;
    add_micros(epoch1900(), micros)
}

/// High word of a TOD clock, 1.048576 seconds per unit.
pub fn stck4_to_datetime(high: u32) -> Option<NaiveDateTime> {
    add_micros(epoch1900(), i64::from(high) << 20)
}

pub fn datetime_to_stck(dt: NaiveDateTime) -> Option<u64> {
    let micros = dt.signed_duration_since(epoch1900()).num_microseconds()?;
    u64::try_from(micros).ok().map(|m| m << 12)
}

/// `YYYY-MM-DD HH:MM:SS.ffffff` rendering of a TOD clock value.
pub fn format_stck(tod: u64) -> String {
    match stck_to_datetime(tod) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        None => format!("{tod:016X}"),
    }
}

pub fn format_stck4(high: u32) -> String {
    match stck4_to_datetime(high) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{high:08X}"),
    }
}

/// Build a datetime from packed digit components, `None` if invalid.
pub fn from_parts(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
    micro: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_micro_opt(hour, min, sec, micro)
}

pub fn time_from_parts(hour: u32, min: u32, sec: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, min, sec)
}
