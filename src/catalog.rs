//! Product catalog and stock intake.
//!
//! Products are read-mostly: the POS screen fetches the full list and
//! filters client-side by category chip and search term, exactly the access
//! pattern the backend indexes for. Stock intake appends an audit log row
//! and bumps the product's counted stock.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::models::{map_rows, InventoryLog, Product, Stock};
use crate::store::{Filter, SelectQuery, Store};

/// Fixed category chips, in display order.
pub const CATEGORIES: &[&str] = &["Bánh mì", "Bánh bao", "Bánh ngọt", "Thực phẩm", "Đồ uống"];

/// How many intake rows the history tab shows.
const INVENTORY_HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn list_products(store: &dyn Store) -> Result<Vec<Product>, PosError> {
    let rows = store
        .select("products", SelectQuery::new().order_asc("name"))
        .await?;
    Product::rows_from(rows)
}

/// Category + name/id search filter over a fetched list.
pub fn filter_products(products: &[Product], category: Option<&str>, term: &str) -> Vec<Product> {
    let needle = term.trim().to_lowercase();
    products
        .iter()
        .filter(|p| category.map_or(true, |c| p.category == c))
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.id.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default, alias = "product_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default, alias = "wholesale_price")]
    pub wholesale_price: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, alias = "base_product_id")]
    pub base_product_id: Option<String>,
    #[serde(default, alias = "is_composite")]
    pub is_composite: bool,
}

/// Create or update a product. Composite products (re-packagings of a base
/// product) carry no stock of their own.
pub async fn save_product(
    store: &dyn Store,
    input: ProductInput,
) -> Result<Product, PosError> {
    let name = input.name.trim().to_string();
    if name.is_empty() || input.price <= 0 {
        return Err(PosError::validation("Vui lòng nhập tên và giá"));
    }
    if input.wholesale_price.is_some_and(|p| p < 0) || input.stock < 0 {
        return Err(PosError::validation("Giá hoặc tồn kho không hợp lệ"));
    }

    let base_product_id = if input.is_composite {
        input.base_product_id.filter(|s| !s.trim().is_empty())
    } else {
        None
    };
    let stock = if input.is_composite { 0 } else { input.stock };
    let category = if input.category.trim().is_empty() {
        CATEGORIES[0].to_string()
    } else {
        input.category
    };

    if let Some(id) = input.id.as_deref().filter(|s| !s.trim().is_empty()) {
        let updated = store
            .update(
                "products",
                vec![Filter::eq("id", id)],
                serde_json::json!({
                    "name": name,
                    "price": input.price,
                    "wholesale_price": input.wholesale_price.unwrap_or(input.price),
                    "image": input.image.unwrap_or_default(),
                    "category": category,
                    "stock": stock,
                    "base_product_id": base_product_id,
                }),
            )
            .await?;
        return match updated.into_iter().next() {
            Some(row) => Product::from_row(row),
            None => Err(PosError::validation("Không tìm thấy sản phẩm")),
        };
    }

    let product = Product {
        id: Uuid::new_v4().to_string(),
        name,
        category,
        price: input.price,
        wholesale_price: Some(input.wholesale_price.unwrap_or(input.price)),
        stock: Stock::Limited(stock),
        image: input.image.unwrap_or_default(),
        base_product_id,
    };
    let created = store
        .insert(
            "products",
            serde_json::to_value(&product).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;
    info!(product_id = %product.id, "product created");
    match created.into_iter().next() {
        Some(row) => Product::from_row(row),
        None => Ok(product),
    }
}

// ---------------------------------------------------------------------------
// Stock intake
// ---------------------------------------------------------------------------

/// Record a stock intake: append an inventory log row, then add the
/// quantity to the product's counted stock. An `unlimited` product restarts
/// counting from the imported quantity.
///
/// A stock-update failure after the log insert is partially applied: the
/// audit row exists, the counter does not reflect it.
pub async fn import_stock(
    store: &dyn Store,
    product: &Product,
    quantity: i64,
    price: i64,
    note: Option<String>,
    created_by: Option<String>,
    now: DateTime<Utc>,
) -> Result<InventoryLog, PosError> {
    if quantity < 1 {
        return Err(PosError::validation("Số lượng nhập không hợp lệ"));
    }
    if price < 0 {
        return Err(PosError::validation("Giá nhập không hợp lệ"));
    }

    let log = InventoryLog {
        id: Uuid::new_v4().to_string(),
        product_id: product.id.clone(),
        quantity,
        price,
        note: note.filter(|n| !n.trim().is_empty()),
        created_at: now,
        created_by,
    };
    store
        .insert(
            "inventory_logs",
            serde_json::to_value(&log).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;

    let new_stock = product.stock.counted() + quantity;
    store
        .update(
            "products",
            vec![Filter::eq("id", product.id.clone())],
            serde_json::json!({ "stock": new_stock }),
        )
        .await
        .map_err(|e| PosError::PartiallyApplied {
            action: "stock intake",
            step: "product stock update",
            detail: e.to_string(),
        })?;

    info!(product_id = %product.id, quantity, new_stock, "stock intake recorded");
    Ok(log)
}

/// Recent intake history, newest first.
pub async fn list_inventory_logs(store: &dyn Store) -> Result<Vec<InventoryLog>, PosError> {
    let rows = store
        .select(
            "inventory_logs",
            SelectQuery::new()
                .order_desc("created_at")
                .limit(INVENTORY_HISTORY_LIMIT),
        )
        .await?;
    map_rows("inventory log", rows)
}

/// Fetch one product by id.
pub async fn get_product(store: &dyn Store, product_id: &str) -> Result<Product, PosError> {
    let rows = store
        .select("products", SelectQuery::new().eq("id", product_id).limit(1))
        .await?;
    match rows.into_iter().next() {
        Some(row) => Product::from_row(row),
        None => Err(PosError::validation("Không tìm thấy sản phẩm")),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
