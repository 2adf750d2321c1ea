//! Checkout / settlement.
//!
//! `settle` is the transaction script that turns the cart into persisted
//! records: one order, its line snapshot, and (for debt payments) a
//! ledger entry plus the customer's balance update. The backend offers no
//! multi-table transaction to a thin client, so the steps run sequentially
//! and any failure after the first write is reported as a partially-applied
//! settlement naming the failed step; callers must never mask it as a clean
//! failure.
//!
//! The cart itself is only cleared by the caller after full success.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

use crate::cart::Cart;
use crate::debt;
use crate::error::PosError;
use crate::invoice;
use crate::models::{
    map_row, CustomerDebt, Order, OrderLine, PaymentMethod, PriceMode,
};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub sub_total: i64,
    pub discount_percent: i64,
    pub discount_amount: i64,
    pub total: i64,
}

/// Discount arithmetic over integer VND. The percent is clamped to
/// [0, 100] before use, so `total <= sub_total` always holds.
pub fn compute_totals(sub_total: i64, discount_percent: i64) -> Totals {
    let discount_percent = discount_percent.clamp(0, 100);
    let discount_amount = sub_total * discount_percent / 100;
    Totals {
        sub_total,
        discount_percent,
        discount_amount,
        total: sub_total - discount_amount,
    }
}

// ---------------------------------------------------------------------------
// Double-submit guard
// ---------------------------------------------------------------------------

static SETTLE_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

/// Process-wide settlement lock. A second settle attempt while one is in
/// flight fails fast instead of double-writing the order.
#[derive(Debug)]
pub struct SettleGuard(());

impl SettleGuard {
    pub fn acquire() -> Result<Self, PosError> {
        SETTLE_IN_FLIGHT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PosError::validation("Đang xử lý thanh toán, vui lòng đợi"))?;
        Ok(SettleGuard(()))
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        SETTLE_IN_FLIGHT.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SettleOutcome {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub totals: Totals,
    pub invoice: Value,
}

/// Finalize the cart into persisted records.
///
/// Preconditions (each rejected with a validation error and zero writes):
/// the cart is non-empty; wholesale mode has a selected customer; debt
/// settlement has a selected customer and is only available in wholesale
/// mode.
pub async fn settle(
    store: &dyn Store,
    cart: &Cart,
    customer: Option<&CustomerDebt>,
    method: PaymentMethod,
    discount_percent: i64,
    now: DateTime<Utc>,
) -> Result<SettleOutcome, PosError> {
    if cart.is_empty() {
        return Err(PosError::validation("Giỏ hàng trống"));
    }
    if cart.mode() == PriceMode::Wholesale && customer.is_none() {
        return Err(PosError::validation(
            "Bán sỉ bắt buộc phải chọn khách hàng!",
        ));
    }
    if method == PaymentMethod::Debt {
        if customer.is_none() {
            return Err(PosError::validation("Ghi nợ bắt buộc phải chọn khách hàng!"));
        }
        if cart.mode() == PriceMode::Retail {
            return Err(PosError::validation("Ghi nợ chỉ áp dụng cho bán sỉ"));
        }
    }

    let totals = compute_totals(cart.sub_total(), discount_percent);

    // Step 1: the order row. A failure here is a clean failure: nothing
    // has been written yet.
    let order = Order {
        id: Uuid::new_v4().to_string(),
        total_amount: totals.total,
        payment_method: method,
        created_at: now,
        customer_id: customer.map(|c| c.id.clone()),
    };
    let created = store
        .insert(
            "orders",
            serde_json::to_value(&order).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;
    let order = match created.into_iter().next() {
        Some(row) => map_row("order", row)?,
        None => order,
    };

    // Step 2: line snapshot, captured at sale time and decoupled from later
    // catalog edits.
    let lines: Vec<OrderLine> = cart
        .lines()
        .iter()
        .map(|line| OrderLine {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: line.product_id.clone(),
            product_name: line.name.clone(),
            quantity: line.quantity,
            price: line.unit_price,
        })
        .collect();
    store
        .insert(
            "order_items",
            serde_json::to_value(&lines).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await
        .map_err(|e| PosError::PartiallyApplied {
            action: "settlement",
            step: "order lines insert",
            detail: e.to_string(),
        })?;

    // Step 3: the ledger entry for debt settlements. A 100%-discount sale
    // owes nothing, so it gets no ledger entry.
    if method == PaymentMethod::Debt && totals.total > 0 {
        let customer = customer.expect("validated above");
        let short_id = order.id.get(..8).unwrap_or(&order.id);
        let note = format!("Mua hàng (Sỉ) - HĐ #{short_id}");
        debt::record_transaction(
            store,
            customer,
            totals.total,
            crate::models::TransactionKind::Debt,
            Some(note),
            now,
        )
        .await
        .map_err(|e| match e {
            PosError::PartiallyApplied { step, detail, .. } => PosError::PartiallyApplied {
                action: "settlement",
                step,
                detail,
            },
            other => PosError::PartiallyApplied {
                action: "settlement",
                step: "debt transaction insert",
                detail: other.to_string(),
            },
        })?;
    }

    let invoice = invoice::build(&order, &lines, customer.map(|c| c.name.as_str()), &totals);

    info!(
        order_id = %order.id,
        method = ?method,
        total = totals.total,
        items = lines.len(),
        "settlement completed"
    );

    Ok(SettleOutcome {
        order,
        lines,
        totals,
        invoice,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DebtStatus, Product, Stock, TransactionKind};
    use crate::store::memory::MemoryStore;
    use serial_test::serial;

    fn product(id: &str, price: i64, wholesale: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            category: "Bánh ngọt".to_string(),
            price,
            wholesale_price: wholesale,
            stock: Stock::Limited(50),
            image: String::new(),
            base_product_id: None,
        }
    }

    fn customer(id: &str, balance: i64, status: DebtStatus) -> CustomerDebt {
        CustomerDebt {
            id: id.to_string(),
            name: "Tiệm Bánh Hạnh Phúc".to_string(),
            phone: "0987 654 321".to_string(),
            amount: balance,
            status,
            last_activity: None,
            image: None,
            initials: Some("T".to_string()),
            address: None,
        }
    }

    fn seeded_customer_store(c: &CustomerDebt) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed("customer_debts", vec![serde_json::to_value(c).unwrap()]);
        store
    }

    #[test]
    fn totals_match_the_worked_example() {
        let totals = compute_totals(70000, 10);
        assert_eq!(totals.discount_amount, 7000);
        assert_eq!(totals.total, 63000);
    }

    #[test]
    fn discount_percent_is_clamped() {
        assert_eq!(compute_totals(50000, 150).total, 0);
        assert_eq!(compute_totals(50000, -20).total, 50000);
        for pct in 0..=100 {
            let t = compute_totals(99999, pct);
            assert!(t.total <= t.sub_total);
            assert_eq!(t.total, t.sub_total - t.discount_amount);
        }
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_with_no_writes() {
        let store = MemoryStore::new();
        let cart = Cart::new();
        let err = settle(&store, &cart, None, PaymentMethod::Cash, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.row_count("orders"), 0);
    }

    #[tokio::test]
    async fn debt_without_customer_is_rejected_with_no_writes() {
        let store = MemoryStore::new();
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, Some(30000))];
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        cart.add_or_increment(&catalog[0], 1);

        // No customer at all: wholesale precondition fires first.
        let err = settle(&store, &cart, None, PaymentMethod::Debt, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.row_count("orders"), 0);
        assert_eq!(store.row_count("debt_transactions"), 0);
    }

    #[tokio::test]
    async fn debt_in_retail_mode_is_rejected() {
        let c = customer("c1", 0, DebtStatus::Paid);
        let store = seeded_customer_store(&c);
        let mut cart = Cart::new();
        cart.add_or_increment(&product("SP001", 35000, None), 1);

        let err = settle(&store, &cart, Some(&c), PaymentMethod::Debt, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bán sỉ"));
        assert_eq!(store.row_count("orders"), 0);
    }

    #[tokio::test]
    async fn cash_settlement_writes_order_and_line_snapshot() {
        let store = MemoryStore::new();
        let mut cart = Cart::new();
        cart.add_or_increment(&product("SP001", 35000, None), 2);

        let outcome = settle(&store, &cart, None, PaymentMethod::Cash, 10, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.totals.sub_total, 70000);
        assert_eq!(outcome.totals.total, 63000);
        assert_eq!(outcome.order.total_amount, 63000);
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].product_name, "Product SP001");
        assert_eq!(outcome.lines[0].price, 35000);

        assert_eq!(store.row_count("orders"), 1);
        assert_eq!(store.row_count("order_items"), 1);
        assert_eq!(store.row_count("debt_transactions"), 0);
    }

    #[tokio::test]
    async fn debt_settlement_appends_ledger_entry_and_updates_balance() {
        let c = customer("c1", 100000, DebtStatus::Pending);
        let store = seeded_customer_store(&c);
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, Some(30000))];
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        cart.add_or_increment(&catalog[0], 2);

        let outcome = settle(&store, &cart, Some(&c), PaymentMethod::Debt, 0, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.order.total_amount, 60000);

        let txns = store.rows("debt_transactions");
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0]["amount"], 60000);
        assert_eq!(txns[0]["type"], "debt");
        assert_eq!(txns[0]["customer_id"], "c1");

        let customers = store.rows("customer_debts");
        assert_eq!(customers[0]["amount"], 160000);
        assert_eq!(customers[0]["status"], "pending");
    }

    #[tokio::test]
    async fn line_insert_failure_is_reported_as_partially_applied() {
        let store = MemoryStore::new();
        store.fail_next("insert", "order_items");
        let mut cart = Cart::new();
        cart.add_or_increment(&product("SP001", 35000, None), 1);

        let err = settle(&store, &cart, None, PaymentMethod::Cash, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_partially_applied());
        assert!(err.to_string().contains("order lines insert"));
        // The orphan order exists; exactly what the error must surface.
        assert_eq!(store.row_count("orders"), 1);
        assert_eq!(store.row_count("order_items"), 0);
    }

    #[tokio::test]
    async fn balance_update_failure_is_reported_as_partially_applied() {
        let c = customer("c1", 0, DebtStatus::Paid);
        let store = seeded_customer_store(&c);
        store.fail_next("update", "customer_debts");
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, None)];
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        cart.add_or_increment(&catalog[0], 1);

        let err = settle(&store, &cart, Some(&c), PaymentMethod::Debt, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_partially_applied());
        assert!(err.to_string().contains("customer balance update"));
        assert_eq!(store.row_count("orders"), 1);
        assert_eq!(store.row_count("debt_transactions"), 1);
    }

    #[tokio::test]
    async fn full_discount_debt_sale_skips_the_ledger() {
        let c = customer("c1", 50000, DebtStatus::Pending);
        let store = seeded_customer_store(&c);
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, None)];
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        cart.add_or_increment(&catalog[0], 1);

        let outcome = settle(&store, &cart, Some(&c), PaymentMethod::Debt, 100, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.order.total_amount, 0);
        assert_eq!(store.row_count("debt_transactions"), 0);
    }

    #[test]
    #[serial]
    fn settle_guard_blocks_a_second_acquire() {
        let guard = SettleGuard::acquire().unwrap();
        let err = SettleGuard::acquire().unwrap_err();
        assert!(err.is_validation());
        drop(guard);
        // Released on drop.
        let again = SettleGuard::acquire();
        assert!(again.is_ok());
    }

    #[test]
    fn transaction_kind_sign_convention() {
        assert_eq!(TransactionKind::Debt.signed(500), 500);
        assert_eq!(TransactionKind::Repayment.signed(500), -500);
    }
}
