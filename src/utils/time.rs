use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Wire format of a turn timestamp, e.g. `19-10-2026 14:03:59`.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]-[month]-[year] [hour]:[minute]:[second]");

/// Display format of a history date, e.g. `19-10-2026`.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]-[month]-[year]");

const ISO_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Returns the local UTC offset, determined once per process.
///
/// The offset can only be read reliably while the process is single-threaded,
/// so binaries should call this before starting a runtime.  Falls back to UTC.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// The current local wall-clock time truncated to whole seconds.
pub fn now_local() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc().to_offset(local_offset());
    let now = now.replace_nanosecond(0).unwrap_or(now);
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Formats a date the way history buckets are labelled.
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Parses a user-supplied date in `DD-MM-YYYY` or `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    let s = s.trim();
    Date::parse(s, DATE_FORMAT).or_else(|err| Date::parse(s, ISO_DATE_FORMAT).map_err(|_| err))
}

/// Deserialize a `DD-MM-YYYY HH:MM:SS` string into a PrimitiveDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    PrimitiveDateTime::parse(s.trim(), TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
}

/// Serialize a PrimitiveDateTime into a `DD-MM-YYYY HH:MM:SS` string
pub fn serialize<S>(datetime: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(TIMESTAMP_FORMAT)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parse_both_date_spellings() {
        assert_eq!(parse_date("03-02-2025").unwrap(), date!(2025 - 02 - 03));
        assert_eq!(parse_date("2025-02-03").unwrap(), date!(2025 - 02 - 03));
        assert!(parse_date("3/2/2025").is_err());
    }

    #[test]
    fn format_date_is_day_first() {
        assert_eq!(format_date(date!(2025 - 02 - 03)), "03-02-2025");
    }

    #[test]
    fn now_has_no_subseconds() {
        assert_eq!(now_local().nanosecond(), 0);
    }
}
