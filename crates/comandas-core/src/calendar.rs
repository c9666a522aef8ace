//! # Business Calendar
//!
//! Converts between UTC timestamps (what the database stores) and the café's
//! local business day.
//!
//! ## Why
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "Today" at the café is America/Sao_Paulo (UTC−03:00, no DST).         │
//! │                                                                         │
//! │  Local 2026-10-14 00:00  ==  UTC 2026-10-14 03:00                      │
//! │  Local 2026-10-14 23:59  ==  UTC 2026-10-15 02:59                      │
//! │                                                                         │
//! │  A sale at 22:30 local lands on the NEXT UTC date, so every           │
//! │  "today" / date-range filter goes through this module.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::error::ValidationError;

/// Default offset: America/Sao_Paulo.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcRange {
    /// Returns true if `at` falls inside the range.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Local-day arithmetic for a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Creates a calendar for a whole-hour offset from UTC.
    ///
    /// ## Errors
    /// `OutOfRange` if the offset is outside −12..=14.
    pub fn from_offset_hours(hours: i32) -> Result<Self, ValidationError> {
        if !(-12..=14).contains(&hours) {
            return Err(ValidationError::OutOfRange {
                field: "utc_offset_hours".to_string(),
                min: -12,
                max: 14,
            });
        }
        FixedOffset::east_opt(hours * 3600)
            .map(|offset| BusinessCalendar { offset })
            .ok_or_else(|| ValidationError::invalid_format("utc_offset_hours", "invalid offset"))
    }

    /// The configured offset.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Converts a UTC instant to local time.
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    /// The local business date for a UTC instant.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// Today's local business date.
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    /// UTC instant of local midnight starting `date`.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self.offset.from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            // Fixed offsets are never ambiguous; fall back to treating it as UTC
            None => Utc.from_utc_datetime(&midnight),
        }
    }

    /// The UTC range covering one local day.
    pub fn day(&self, date: NaiveDate) -> UtcRange {
        self.range(date, date)
    }

    /// The UTC range covering local days `start..=end`.
    ///
    /// ## Note
    /// An `end` earlier than `start` yields an empty range.
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> UtcRange {
        let start_utc = self.day_start(start);
        let end_utc = end
            .checked_add_days(Days::new(1))
            .map(|next| self.day_start(next))
            .unwrap_or(start_utc);
        UtcRange {
            start: start_utc,
            end: end_utc.max(start_utc),
        }
    }

    /// Formats an instant the way receipts show it: `14/10/2026 15:42`.
    pub fn format_short(&self, at: DateTime<Utc>) -> String {
        self.local(at).format("%d/%m/%Y %H:%M").to_string()
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        BusinessCalendar {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Parses a `YYYY-MM-DD` date parameter.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid_format(field, "expected YYYY-MM-DD"))
}

/// Number of days in `start..=end` (at least 1 when end >= start).
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

// =============================================================================
// Unit Tests
// =============================================================================
