use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::reports::{self, ReportPeriod};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodPayload {
    /// `"YYYY-MM-DD"` for one day, `"month"` for month-to-date. Defaults to
    /// today.
    #[serde(default, alias = "dateRange")]
    date: Option<String>,
}

fn parse_period(payload: Option<Value>, today: NaiveDate) -> ReportPeriod {
    let parsed: PeriodPayload = payload
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    match parsed.date.as_deref() {
        Some("month") => ReportPeriod::MonthToDate(today),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(ReportPeriod::Day)
            .unwrap_or(ReportPeriod::Day(today)),
        None => ReportPeriod::Day(today),
    }
}

#[tauri::command]
pub async fn report_get_revenue(
    payload: Option<Value>,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let period = parse_period(payload, Local::now().date_naive());
    reports::revenue(&*client, period).await.map_err(String::from)
}

#[tauri::command]
pub async fn report_get_debt(
    payload: Option<Value>,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let period = parse_period(payload, Local::now().date_naive());
    reports::debt_report(&*client, period)
        .await
        .map_err(String::from)
}

#[tauri::command]
pub async fn report_get_inventory(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    reports::inventory_report(&*client)
        .await
        .map_err(String::from)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod dto_tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn missing_payload_defaults_to_today() {
        assert_eq!(parse_period(None, today()), ReportPeriod::Day(today()));
    }

    #[test]
    fn month_keyword_selects_month_to_date() {
        let period = parse_period(Some(serde_json::json!({ "date": "month" })), today());
        assert_eq!(period, ReportPeriod::MonthToDate(today()));
    }

    #[test]
    fn explicit_date_is_parsed_and_garbage_falls_back() {
        let period = parse_period(Some(serde_json::json!({ "date": "2026-08-01" })), today());
        assert_eq!(
            period,
            ReportPeriod::Day(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
        );
        let fallback = parse_period(Some(serde_json::json!({ "date": "not-a-date" })), today());
        assert_eq!(fallback, ReportPeriod::Day(today()));
    }
}
