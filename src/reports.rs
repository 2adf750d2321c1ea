//! Back-office reports: revenue, receivables, and stock intake.
//!
//! Date windows follow the source data's convention: `created_at >= day`
//! and `< next day` for a single day, or month-to-date from the first of
//! the current month. Timestamps are RFC-3339, so the backend's range
//! filters and plain date strings compare correctly.

use chrono::{Datelike, Duration, NaiveDate};
use serde_json::Value;

use crate::error::PosError;
use crate::models::{map_rows, CustomerDebt, DebtTransaction, Order};
use crate::store::{SelectQuery, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    /// One calendar day.
    Day(NaiveDate),
    /// From the 1st of the given date's month, open-ended.
    MonthToDate(NaiveDate),
}

impl ReportPeriod {
    /// `(gte, lt)` bounds as date strings; `lt` is absent for month-to-date.
    pub fn bounds(&self) -> (String, Option<String>) {
        match self {
            ReportPeriod::Day(day) => {
                let next = *day + Duration::days(1);
                (
                    day.format("%Y-%m-%d").to_string(),
                    Some(next.format("%Y-%m-%d").to_string()),
                )
            }
            ReportPeriod::MonthToDate(today) => {
                let first = today.with_day(1).unwrap_or(*today);
                (first.format("%Y-%m-%d").to_string(), None)
            }
        }
    }

    fn apply(&self, mut query: SelectQuery, column: &str) -> SelectQuery {
        let (gte, lt) = self.bounds();
        query = query.gte(column, gte);
        if let Some(lt) = lt {
            query = query.lt(column, lt);
        }
        query
    }
}

// ---------------------------------------------------------------------------
// Revenue
// ---------------------------------------------------------------------------

/// Orders in the period, newest first, with total revenue and order count.
pub async fn revenue(store: &dyn Store, period: ReportPeriod) -> Result<Value, PosError> {
    let query = period.apply(SelectQuery::new().order_desc("created_at"), "created_at");
    let rows = store.select("orders", query).await?;
    let orders: Vec<Order> = map_rows("order", rows)?;

    let total: i64 = orders.iter().map(|o| o.total_amount).sum();
    Ok(serde_json::json!({
        "orders": orders,
        "total": total,
        "count": orders.len(),
    }))
}

// ---------------------------------------------------------------------------
// Receivables
// ---------------------------------------------------------------------------

/// Receivables overview: every customer, aggregate outstanding balance,
/// debtor count, plus the ledger activity inside the period.
pub async fn debt_report(store: &dyn Store, period: ReportPeriod) -> Result<Value, PosError> {
    let customer_rows = store.select("customer_debts", SelectQuery::new()).await?;
    let customers: Vec<CustomerDebt> = map_rows("customer", customer_rows)?;

    let txn_query = period.apply(SelectQuery::new().order_desc("created_at"), "created_at");
    let txn_rows = store.select("debt_transactions", txn_query).await?;
    let transactions: Vec<DebtTransaction> = map_rows("debt transaction", txn_rows)?;

    let total_receivable: i64 = customers.iter().map(|c| c.amount.max(0)).sum();
    let debtor_count = customers.iter().filter(|c| c.amount > 0).count();

    Ok(serde_json::json!({
        "customers": customers,
        "totalReceivable": total_receivable,
        "debtorCount": debtor_count,
        "transactions": transactions,
    }))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Recent stock intake, newest first.
pub async fn inventory_report(store: &dyn Store) -> Result<Value, PosError> {
    let logs = crate::catalog::list_inventory_logs(store).await?;
    Ok(serde_json::json!({ "logs": logs }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn order_row(id: &str, total: i64, created_at: &str) -> Value {
        json!({
            "id": id,
            "total_amount": total,
            "payment_method": "cash",
            "created_at": created_at,
        })
    }

    #[test]
    fn day_bounds_cover_exactly_one_day() {
        let period = ReportPeriod::Day(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap());
        let (gte, lt) = period.bounds();
        assert_eq!(gte, "2026-08-07");
        assert_eq!(lt.as_deref(), Some("2026-08-08"));
    }

    #[test]
    fn month_to_date_starts_on_the_first() {
        let period = ReportPeriod::MonthToDate(NaiveDate::from_ymd_opt(2026, 8, 19).unwrap());
        let (gte, lt) = period.bounds();
        assert_eq!(gte, "2026-08-01");
        assert!(lt.is_none());
    }

    #[tokio::test]
    async fn revenue_sums_only_the_selected_day() {
        let store = MemoryStore::new();
        store.seed(
            "orders",
            vec![
                order_row("o1", 63000, "2026-08-07T02:00:00+00:00"),
                order_row("o2", 20000, "2026-08-07T09:30:00+00:00"),
                order_row("o3", 99000, "2026-08-06T10:00:00+00:00"),
            ],
        );
        let report = revenue(
            &store,
            ReportPeriod::Day(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(report["count"], 2);
        assert_eq!(report["total"], 83000);
        // Newest first.
        assert_eq!(report["orders"][0]["id"], "o2");
    }

    #[tokio::test]
    async fn debt_report_aggregates_outstanding_balances() {
        let store = MemoryStore::new();
        store.seed(
            "customer_debts",
            vec![
                json!({"id": "c1", "name": "A", "amount": 5200000, "status": "overdue"}),
                json!({"id": "c2", "name": "B", "amount": 350000, "status": "pending"}),
                json!({"id": "c3", "name": "C", "amount": -50000, "status": "paid"}),
            ],
        );
        store.seed(
            "debt_transactions",
            vec![json!({
                "id": "t1",
                "customer_id": "c1",
                "amount": 100000,
                "type": "debt",
                "created_at": "2026-08-07T01:00:00+00:00",
            })],
        );
        let report = debt_report(
            &store,
            ReportPeriod::Day(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()),
        )
        .await
        .unwrap();
        // Negative balances don't offset receivables.
        assert_eq!(report["totalReceivable"], 5550000);
        assert_eq!(report["debtorCount"], 2);
        assert_eq!(report["transactions"].as_array().unwrap().len(), 1);
    }
}
