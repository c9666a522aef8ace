//! HTTP handlers, one module per area.
//!
//! Every module exposes `routes() -> Router<AppState>`; [`crate::build_router`]
//! merges them under `/api`.

pub mod auth;
pub mod catalog;
pub mod checkouts;
pub mod financials;
pub mod health;
pub mod orders;
pub mod pinpads;
pub mod users;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use comandas_core::calendar::parse_date;
use comandas_core::{BusinessCalendar, Money};

use crate::error::ApiResult;

/// `?data_inicio=YYYY-MM-DD&data_fim=YYYY-MM-DD`
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
}

/// A date filter where unparseable input counts as absent.
pub(crate) fn lenient_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| parse_date("date", v).ok())
}

/// A date parameter that must parse when present, defaulting to today.
pub(crate) fn date_or_today(calendar: &BusinessCalendar, field: &str, value: Option<&str>) -> ApiResult<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(parse_date(field, v)?),
        None => Ok(calendar.today()),
    }
}

/// An amount with its display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Amount {
    pub cents: i64,
    #[serde(serialize_with = "serialize_display")]
    pub formatted: Money,
}

impl From<Money> for Amount {
    fn from(money: Money) -> Self {
        Amount {
            cents: money.cents(),
            formatted: money,
        }
    }
}

fn serialize_display<S: serde::Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(money)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_date_ignores_garbage() {
        assert_eq!(lenient_date(Some("2026-10-14")), NaiveDate::from_ymd_opt(2026, 10, 14));
        assert_eq!(lenient_date(Some("14/10/2026")), None);
        assert_eq!(lenient_date(Some("")), None);
        assert_eq!(lenient_date(None), None);
    }

    #[test]
    fn test_date_or_today_rejects_garbage() {
        let calendar = BusinessCalendar::default();
        assert!(date_or_today(&calendar, "start_date", Some("ontem")).is_err());
        assert_eq!(date_or_today(&calendar, "start_date", None).unwrap(), calendar.today());
    }

    #[test]
    fn test_amount_serializes_formatted() {
        let json = serde_json::to_value(Amount::from(Money::from_cents(123_456))).unwrap();
        assert_eq!(json, serde_json::json!({ "cents": 123456, "formatted": "R$ 1.234,56" }));
    }
}
