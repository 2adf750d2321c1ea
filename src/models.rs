//! Typed records for every backend collection.
//!
//! The hosted backend returns loosely-shaped JSON rows; everything entering
//! the domain layer passes through [`map_row`] / [`map_rows`], which reject
//! malformed rows instead of letting untyped data propagate. Field names
//! match the backend column names (snake_case), so the structs serialize
//! directly into insert/update payloads.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::PosError;

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Deserialize a single backend row into a typed record.
pub fn map_row<T: DeserializeOwned>(entity: &'static str, row: Value) -> Result<T, PosError> {
    serde_json::from_value(row).map_err(|e| PosError::backend(format!("Malformed {entity} row: {e}")))
}

/// Deserialize a result set, failing on the first malformed row.
pub fn map_rows<T: DeserializeOwned>(
    entity: &'static str,
    rows: Vec<Value>,
) -> Result<Vec<T>, PosError> {
    rows.into_iter().map(|row| map_row(entity, row)).collect()
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Stock level: a counted quantity or the sentinel `"unlimited"` used for
/// made-to-order items (drinks, fresh bread).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    Limited(i64),
    Unlimited,
}

impl Stock {
    /// Counted quantity, treating `unlimited` as 0 (the intake flow restarts
    /// counting from the imported quantity).
    pub fn counted(&self) -> i64 {
        match self {
            Stock::Limited(n) => *n,
            Stock::Unlimited => 0,
        }
    }
}

impl Serialize for Stock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Stock::Limited(n) => serializer.serialize_i64(*n),
            Stock::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Stock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Number(n) => {
                let n = n
                    .as_i64()
                    .ok_or_else(|| serde::de::Error::custom("stock must be an integer"))?;
                if n < 0 {
                    return Err(serde::de::Error::custom("stock must not be negative"));
                }
                Ok(Stock::Limited(n))
            }
            Value::String(s) if s == "unlimited" => Ok(Stock::Unlimited),
            other => Err(serde::de::Error::custom(format!(
                "invalid stock value: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Retail unit price (VND).
    pub price: i64,
    /// Optional wholesale unit price; retail price applies when absent.
    #[serde(default)]
    pub wholesale_price: Option<i64>,
    pub stock: Stock,
    #[serde(default)]
    pub image: String,
    /// Set on composite products sold as a re-packaging of another product;
    /// composites carry no stock of their own.
    #[serde(default)]
    pub base_product_id: Option<String>,
}

impl Product {
    /// Unit price under the given pricing mode. Wholesale falls back to the
    /// retail price when no wholesale price is set.
    pub fn price_for(&self, mode: PriceMode) -> i64 {
        match mode {
            PriceMode::Retail => self.price,
            PriceMode::Wholesale => self.wholesale_price.unwrap_or(self.price),
        }
    }

    /// Strict mapping with the catalog invariants applied on top of the
    /// serde shape check.
    pub fn from_row(row: Value) -> Result<Self, PosError> {
        let product: Product = map_row("product", row)?;
        if product.price < 0 {
            return Err(PosError::backend(format!(
                "Malformed product row: negative price on {}",
                product.id
            )));
        }
        if product.wholesale_price.is_some_and(|p| p < 0) {
            return Err(PosError::backend(format!(
                "Malformed product row: negative wholesale price on {}",
                product.id
            )));
        }
        Ok(product)
    }

    pub fn rows_from(rows: Vec<Value>) -> Result<Vec<Self>, PosError> {
        rows.into_iter().map(Product::from_row).collect()
    }
}

/// Global pricing toggle applied to every cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    Retail,
    Wholesale,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Debt,
}

impl PaymentMethod {
    /// Label printed on the invoice.
    pub fn label_vi(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Tiền mặt",
            PaymentMethod::Transfer => "Chuyển khoản",
            PaymentMethod::Debt => "Ghi nợ",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Line item captured at settlement time, decoupled from later catalog
/// edits on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price: i64,
}

// ---------------------------------------------------------------------------
// Debt ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Overdue,
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDebt {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    /// Running balance (VND). Denormalized cache over the transaction log.
    #[serde(default)]
    pub amount: i64,
    pub status: DebtStatus,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub initials: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Increases the customer's balance.
    Debt,
    /// Decreases the customer's balance.
    Repayment,
}

impl TransactionKind {
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransactionKind::Debt => amount,
            TransactionKind::Repayment => -amount,
        }
    }
}

/// Append-only ledger row. Never updated or deleted once written; this is
/// the audit trail the denormalized balance is reconciled against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtTransaction {
    pub id: String,
    pub customer_id: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Cake pre-orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CakeOrderStatus {
    Pending,
    Completed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CakeOrder {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    pub total_amount: i64,
    #[serde(default)]
    pub deposit_amount: i64,
    /// Maintained as `total_amount - deposit_amount` at creation time.
    #[serde(default)]
    pub remaining_amount: i64,
    pub delivery_date: DateTime<Utc>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub status: CakeOrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Active,
    Upcoming,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub name: String,
    pub role: String,
    /// Display range, e.g. "06:00 - 14:00".
    pub time: String,
    pub status: ShiftStatus,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
    Baker,
    Sales,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Stock intake audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLog {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Purchase unit price at intake time (VND).
    pub price: i64,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stock_roundtrips_numbers_and_sentinel() {
        let limited: Stock = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(limited, Stock::Limited(12));
        assert_eq!(serde_json::to_value(limited).unwrap(), json!(12));

        let unlimited: Stock = serde_json::from_value(json!("unlimited")).unwrap();
        assert_eq!(unlimited, Stock::Unlimited);
        assert_eq!(serde_json::to_value(unlimited).unwrap(), json!("unlimited"));
    }

    #[test]
    fn stock_rejects_negative_and_garbage() {
        assert!(serde_json::from_value::<Stock>(json!(-1)).is_err());
        assert!(serde_json::from_value::<Stock>(json!("plenty")).is_err());
        assert!(serde_json::from_value::<Stock>(json!(true)).is_err());
    }

    #[test]
    fn product_mapping_rejects_negative_price() {
        let row = json!({
            "id": "SP001",
            "name": "Bánh Mì Pate",
            "category": "Bánh mì",
            "price": -5,
            "stock": 10,
            "image": ""
        });
        let err = Product::from_row(row).unwrap_err();
        assert!(err.to_string().contains("negative price"));
    }

    #[test]
    fn product_wholesale_falls_back_to_retail() {
        let row = json!({
            "id": "SP001",
            "name": "Bánh Mì Pate",
            "category": "Bánh mì",
            "price": 35000,
            "stock": "unlimited",
            "image": ""
        });
        let product = Product::from_row(row).unwrap();
        assert_eq!(product.price_for(PriceMode::Retail), 35000);
        assert_eq!(product.price_for(PriceMode::Wholesale), 35000);
    }

    #[test]
    fn malformed_row_is_rejected_not_skipped() {
        let rows = vec![
            json!({
                "id": "c1",
                "name": "Chị Lan",
                "amount": 0,
                "status": "paid"
            }),
            json!({ "id": "c2" }),
        ];
        let err = map_rows::<CustomerDebt>("customer", rows).unwrap_err();
        assert!(err.to_string().contains("Malformed customer row"));
    }

    #[test]
    fn debt_transaction_uses_type_column() {
        let row = json!({
            "id": "t1",
            "customer_id": "c1",
            "amount": 50000,
            "type": "repayment",
            "created_at": "2026-08-01T03:00:00Z"
        });
        let txn: DebtTransaction = map_row("debt transaction", row).unwrap();
        assert_eq!(txn.kind, TransactionKind::Repayment);
        assert_eq!(txn.kind.signed(txn.amount), -50000);
        let back = serde_json::to_value(&txn).unwrap();
        assert_eq!(back["type"], "repayment");
    }
}
