//! Timestamp conventions shared across the tracker.
//!
//! Documents carry minute-resolution timestamps (`YYYY-MM-DD HH:mm`), due
//! dates are bare dates (`YYYY-MM-DD`), and counter state records epoch
//! seconds.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::time::{SystemTime, UNIX_EPOCH};

pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATE_PREFIX_FORMAT: &str = "%Y%m%d";

/// Current local time in document timestamp format.
pub fn now_stamp() -> String {
    Local::now().format(STAMP_FORMAT).to_string()
}

/// Current local date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Seconds since the Unix epoch.
pub fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Digits-only rendering of a document timestamp. Used to build generated
/// ids, which follow the legacy `YYYYMMDDHHmm` numbering.
pub fn compact(stamp: &str) -> String {
    stamp.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[allow(dead_code)]
pub fn parse_stamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok()
}

pub fn is_valid_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()
}
