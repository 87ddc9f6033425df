use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

use crate::utils::time::{TIMESTAMP_FORMAT, now_local};

/// The moment a turn was recorded, at second resolution in local time.
///
/// On the wire this is the string `DD-MM-YYYY HH:MM:SS`.  Ordering is
/// chronological, which the day-first wire form would not give lexically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(#[serde(with = "crate::utils::time")] PrimitiveDateTime);

impl Timestamp {
    /// Creates a timestamp from a date and time.
    pub fn new(datetime: PrimitiveDateTime) -> Self {
        Self(datetime)
    }

    /// The current local time.
    pub fn now() -> Self {
        Self(now_local())
    }

    /// The calendar date, used as the history bucket key.
    pub fn date(&self) -> Date {
        self.0.date()
    }

    /// The underlying date and time.
    pub fn datetime(&self) -> PrimitiveDateTime {
        self.0
    }
}

impl From<PrimitiveDateTime> for Timestamp {
    fn from(datetime: PrimitiveDateTime) -> Self {
        Self(datetime)
    }
}

impl FromStr for Timestamp {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrimitiveDateTime::parse(s.trim(), TIMESTAMP_FORMAT).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.format(TIMESTAMP_FORMAT) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}
