//! Cake pre-orders: creation, delivery scheduling, and history.
//!
//! The dashboard view is derived data: pending orders are bucketed by how
//! soon delivery is due relative to "now". Past-due pending orders fall
//! into the urgent bucket rather than a separate overdue flag.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::models::{map_row, map_rows, CakeOrder, CakeOrderStatus, Product};
use crate::store::{Filter, SelectQuery, Store};

// ---------------------------------------------------------------------------
// Urgency bucketing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Due within 2 hours, or already past due.
    Urgent,
    /// Later today (more than 2 hours out, same calendar date as now).
    Today,
    /// Tomorrow onwards.
    Future,
}

/// Bucket a delivery time against `now`. Calendar-date comparison happens
/// in `now`'s timezone, so the commands pass local time and tests can pin
/// fixed instants.
pub fn urgency<Tz: TimeZone>(delivery: DateTime<Utc>, now: &DateTime<Tz>) -> Urgency {
    let diff = delivery - now.with_timezone(&Utc);
    if diff <= Duration::hours(2) {
        return Urgency::Urgent;
    }
    if delivery.with_timezone(&now.timezone()).date_naive() == now.date_naive() {
        Urgency::Today
    } else {
        Urgency::Future
    }
}

/// Sort completed orders most-recent-first, falling back to the scheduled
/// delivery time when `completed_at` is absent.
pub fn sort_history(orders: &mut [CakeOrder]) {
    orders.sort_by_key(|o| std::cmp::Reverse(o.completed_at.unwrap_or(o.delivery_date)));
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCakeOrder {
    #[serde(default, alias = "customer_name")]
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "product_id")]
    pub product_id: Option<String>,
    #[serde(default, alias = "product_name")]
    pub product_name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, alias = "deposit_amount")]
    pub deposit_amount: i64,
    #[serde(default, alias = "delivery_date")]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "delivery_address")]
    pub delivery_address: Option<String>,
    #[serde(default, alias = "created_by")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Create a pending pre-order. The total comes from the referenced catalog
/// product's retail price (0 for free-form cakes without a product link),
/// and `remaining = total - deposit` is fixed at creation time.
pub async fn create(
    store: &dyn Store,
    input: NewCakeOrder,
    now: DateTime<Utc>,
) -> Result<CakeOrder, PosError> {
    let customer_name = input.customer_name.trim().to_string();
    let product_name = input.product_name.trim().to_string();
    let delivery_date = input.delivery_date;
    if customer_name.is_empty() || product_name.is_empty() || delivery_date.is_none() {
        return Err(PosError::validation(
            "Vui lòng điền đầy đủ thông tin bắt buộc",
        ));
    }
    let delivery_date = delivery_date.expect("checked above");
    if input.quantity < 1 {
        return Err(PosError::validation("Số lượng không hợp lệ"));
    }
    if input.deposit_amount < 0 {
        return Err(PosError::validation("Tiền cọc không hợp lệ"));
    }

    let unit_price = match input.product_id.as_deref().filter(|s| !s.is_empty()) {
        Some(product_id) => {
            let rows = store
                .select("products", SelectQuery::new().eq("id", product_id).limit(1))
                .await?;
            rows.into_iter()
                .next()
                .map(Product::from_row)
                .transpose()?
                .map(|p| p.price)
                .unwrap_or(0)
        }
        None => 0,
    };
    let total_amount = unit_price * input.quantity;

    let order = CakeOrder {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        customer_name,
        phone: input.phone,
        product_id: input.product_id.filter(|s| !s.is_empty()),
        product_name,
        quantity: input.quantity,
        total_amount,
        deposit_amount: input.deposit_amount,
        remaining_amount: total_amount - input.deposit_amount,
        delivery_date,
        delivery_address: input.delivery_address,
        created_by: input.created_by,
        status: CakeOrderStatus::Pending,
        note: input.note,
        completed_at: None,
    };
    let created = store
        .insert(
            "cake_orders",
            serde_json::to_value(&order).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;

    info!(order_id = %order.id, delivery = %order.delivery_date, "cake order created");
    match created.into_iter().next() {
        Some(row) => map_row("cake order", row),
        None => Ok(order),
    }
}

// ---------------------------------------------------------------------------
// Schedule & transitions
// ---------------------------------------------------------------------------

pub async fn list_orders(store: &dyn Store) -> Result<Vec<CakeOrder>, PosError> {
    let rows = store
        .select("cake_orders", SelectQuery::new().order_asc("delivery_date"))
        .await?;
    map_rows("cake order", rows)
}

/// The dashboard schedule: pending orders split into urgency buckets, plus
/// the completed history (most recent first).
pub fn schedule_json<Tz: TimeZone>(orders: Vec<CakeOrder>, now: &DateTime<Tz>) -> Value {
    let mut urgent = Vec::new();
    let mut today = Vec::new();
    let mut future = Vec::new();
    let mut completed = Vec::new();

    for order in orders {
        match order.status {
            CakeOrderStatus::Pending => match urgency(order.delivery_date, now) {
                Urgency::Urgent => urgent.push(order),
                Urgency::Today => today.push(order),
                Urgency::Future => future.push(order),
            },
            CakeOrderStatus::Completed => completed.push(order),
            CakeOrderStatus::Canceled => {}
        }
    }
    sort_history(&mut completed);

    serde_json::json!({
        "urgent": urgent,
        "today": today,
        "future": future,
        "completed": completed,
    })
}

/// `pending -> completed`, stamping `completed_at`. Terminal: marking an
/// already-completed order again is a no-op success that keeps the original
/// completion time. Canceled orders cannot be delivered.
pub async fn mark_delivered(
    store: &dyn Store,
    order_id: &str,
    now: DateTime<Utc>,
) -> Result<CakeOrder, PosError> {
    let rows = store
        .select("cake_orders", SelectQuery::new().eq("id", order_id).limit(1))
        .await?;
    let order: CakeOrder = match rows.into_iter().next() {
        Some(row) => map_row("cake order", row)?,
        None => return Err(PosError::validation("Không tìm thấy đơn đặt bánh")),
    };

    match order.status {
        CakeOrderStatus::Completed => Ok(order),
        CakeOrderStatus::Canceled => Err(PosError::validation("Đơn đã bị hủy")),
        CakeOrderStatus::Pending => {
            let updated = store
                .update(
                    "cake_orders",
                    vec![Filter::eq("id", order_id)],
                    serde_json::json!({
                        "status": CakeOrderStatus::Completed,
                        "completed_at": now.to_rfc3339(),
                    }),
                )
                .await?;
            info!(order_id, "cake order delivered");
            match updated.into_iter().next() {
                Some(row) => map_row("cake order", row),
                None => Err(PosError::backend(format!(
                    "Cake order disappeared during update: {order_id}"
                ))),
            }
        }
    }
}

/// Completed orders only, most recent first.
pub async fn history(store: &dyn Store) -> Result<Vec<CakeOrder>, PosError> {
    let rows = store
        .select(
            "cake_orders",
            SelectQuery::new().eq("status", "completed"),
        )
        .await?;
    let mut orders: Vec<CakeOrder> = map_rows("cake order", rows)?;
    sort_history(&mut orders);
    Ok(orders)
}

// ===========================================================================
// Tests
// ===========================================================================
