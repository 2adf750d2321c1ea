//! Customer debt ledger.
//!
//! The `debt_transactions` collection is an append-only audit trail; the
//! `amount` field on `customer_debts` is a denormalized running balance
//! that every mutation keeps in sync (balance == signed sum of the log).
//! No edit or delete of a recorded transaction exists anywhere in this
//! module. That is the point.
//!
//! Status rules: a balance at or below zero always derives `paid`; a paid
//! customer whose balance goes positive becomes `pending`. The `overdue`
//! flag is set by back-office tooling, never derived here, and survives
//! further debt while the balance stays positive.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::models::{
    map_row, map_rows, CustomerDebt, DebtStatus, DebtTransaction, TransactionKind,
};
use crate::store::{Filter, SelectQuery, Store};

// ---------------------------------------------------------------------------
// Status derivation
// ---------------------------------------------------------------------------

pub fn next_status(current: DebtStatus, new_balance: i64) -> DebtStatus {
    if new_balance <= 0 {
        DebtStatus::Paid
    } else if current == DebtStatus::Paid {
        DebtStatus::Pending
    } else {
        current
    }
}

/// First character of the customer's name, uppercased; used for the avatar
/// placeholder.
pub fn initials_for(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct LedgerUpdate {
    pub transaction: DebtTransaction,
    pub new_balance: i64,
    pub status: DebtStatus,
}

/// Append a ledger transaction and bring the customer's denormalized
/// balance, status, and `last_activity` in line with it.
///
/// A failure on the customer update after the transaction insert is
/// reported as partially applied: the log row exists and must not be
/// retried blindly.
pub async fn record_transaction(
    store: &dyn Store,
    customer: &CustomerDebt,
    amount: i64,
    kind: TransactionKind,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<LedgerUpdate, PosError> {
    if amount <= 0 {
        return Err(PosError::validation("Số tiền không hợp lệ"));
    }

    let transaction = DebtTransaction {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id.clone(),
        amount,
        kind,
        note: note.filter(|n| !n.trim().is_empty()),
        created_at: now,
    };
    store
        .insert(
            "debt_transactions",
            serde_json::to_value(&transaction).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;

    let new_balance = customer.amount + kind.signed(amount);
    let status = next_status(customer.status, new_balance);

    let updated = store
        .update(
            "customer_debts",
            vec![Filter::eq("id", customer.id.clone())],
            serde_json::json!({
                "amount": new_balance,
                "status": status,
                "last_activity": now.to_rfc3339(),
            }),
        )
        .await
        .map_err(|e| PosError::PartiallyApplied {
            action: "debt transaction",
            step: "customer balance update",
            detail: e.to_string(),
        })?;
    if updated.is_empty() {
        return Err(PosError::PartiallyApplied {
            action: "debt transaction",
            step: "customer balance update",
            detail: format!("customer row not found: {}", customer.id),
        });
    }

    info!(
        customer_id = %customer.id,
        kind = ?kind,
        amount,
        new_balance,
        "ledger transaction recorded"
    );

    Ok(LedgerUpdate {
        transaction,
        new_balance,
        status,
    })
}

/// Transaction history for one customer, newest first. Read-only.
pub async fn list_transactions(
    store: &dyn Store,
    customer_id: &str,
) -> Result<Vec<DebtTransaction>, PosError> {
    let rows = store
        .select(
            "debt_transactions",
            SelectQuery::new()
                .eq("customer_id", customer_id)
                .order_desc("created_at"),
        )
        .await?;
    map_rows("debt transaction", rows)
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

pub async fn list_customers(store: &dyn Store) -> Result<Vec<CustomerDebt>, PosError> {
    let rows = store
        .select(
            "customer_debts",
            SelectQuery::new().order_desc("last_activity"),
        )
        .await?;
    map_rows("customer", rows)
}

/// Case-insensitive name/phone filter over an already-fetched list.
pub fn search_customers(customers: &[CustomerDebt], term: &str) -> Vec<CustomerDebt> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return customers.to_vec();
    }
    customers
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&needle) || c.phone.contains(needle.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[serde(default, alias = "customer_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Create or update a customer. New customers start with a zero balance and
/// `paid` status; balances are only ever moved by ledger transactions.
pub async fn save_customer(
    store: &dyn Store,
    input: CustomerInput,
    now: DateTime<Utc>,
) -> Result<CustomerDebt, PosError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(PosError::validation("Vui lòng nhập tên khách hàng"));
    }
    let initials = initials_for(&name);

    if let Some(id) = input.id.as_deref().filter(|s| !s.trim().is_empty()) {
        let updated = store
            .update(
                "customer_debts",
                vec![Filter::eq("id", id)],
                serde_json::json!({
                    "name": name,
                    "phone": input.phone,
                    "image": input.image,
                    "initials": initials,
                    "address": input.address,
                }),
            )
            .await?;
        return match updated.into_iter().next() {
            Some(row) => map_row("customer", row),
            None => Err(PosError::validation("Không tìm thấy khách hàng")),
        };
    }

    let customer = CustomerDebt {
        id: Uuid::new_v4().to_string(),
        name,
        phone: input.phone,
        amount: 0,
        status: DebtStatus::Paid,
        last_activity: Some(now),
        image: input.image,
        initials: Some(initials),
        address: input.address,
    };
    let created = store
        .insert(
            "customer_debts",
            serde_json::to_value(&customer).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;
    match created.into_iter().next() {
        Some(row) => map_row("customer", row),
        None => Ok(customer),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
