use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::cart::{parse_quantity_input, PosSession, PosState};
use crate::catalog;
use crate::checkout::{self, SettleGuard};
use crate::debt;
use crate::models::{map_row, CustomerDebt, PaymentMethod, PriceMode, Product};
use crate::store::{SelectQuery, Store};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartItemPayload {
    #[serde(alias = "product_id", alias = "id")]
    product_id: String,
    /// Increment for `cart_add_item` (defaults to 1).
    #[serde(default = "default_delta")]
    delta: i64,
}

fn default_delta() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartQuantityPayload {
    #[serde(alias = "product_id", alias = "id")]
    product_id: String,
    /// A number sets the exact quantity (zero or below removes the line);
    /// a string comes from the keypad and is parsed leniently, clamped to
    /// at least 1.
    quantity: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModePayload {
    mode: PriceMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscountPayload {
    #[serde(alias = "discount", alias = "discountPercent")]
    percent: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectCustomerPayload {
    #[serde(default, alias = "customer_id")]
    customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettlePayload {
    method: PaymentMethod,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// The POS screen's state snapshot. Totals are derived here on every call,
/// never cached.
fn session_view(session: &PosSession) -> Value {
    let totals = checkout::compute_totals(session.cart.sub_total(), session.discount_percent);
    serde_json::json!({
        "lines": session.cart.lines(),
        "priceMode": session.cart.mode(),
        "totalItems": session.cart.total_items(),
        "subTotal": totals.sub_total,
        "discountPercent": totals.discount_percent,
        "discountAmount": totals.discount_amount,
        "total": totals.total,
        "selectedCustomer": session.selected_customer,
    })
}

/// Resolve a product: catalog snapshot first, backend on a miss. The
/// fetched product is folded into the snapshot so a later price-mode toggle
/// can re-price its line.
async fn resolve_product(
    client: &SupabaseClient,
    pos: &PosState,
    product_id: &str,
) -> Result<Product, String> {
    {
        let session = pos.session.lock().map_err(|e| e.to_string())?;
        if let Some(product) = session.catalog.iter().find(|p| p.id == product_id) {
            return Ok(product.clone());
        }
    }
    let product = catalog::get_product(&*client, product_id)
        .await
        .map_err(String::from)?;
    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.catalog.push(product.clone());
    Ok(product)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Load everything the POS screen needs in one round trip pair: the catalog
/// and the customer list, plus the current cart view.
#[tauri::command]
pub async fn pos_get_state(
    client: tauri::State<'_, SupabaseClient>,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let products = catalog::list_products(&*client).await.map_err(String::from)?;
    let customers = debt::list_customers(&*client).await.map_err(String::from)?;

    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.catalog = products.clone();
    Ok(serde_json::json!({
        "products": products,
        "customers": customers,
        "pos": session_view(&session),
    }))
}

#[tauri::command]
pub async fn cart_add_item(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: CartItemPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid cart payload: {e}"))?;
    let product = resolve_product(&client, &pos, &parsed.product_id).await?;

    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.cart.add_or_increment(&product, parsed.delta);
    Ok(session_view(&session))
}

#[tauri::command]
pub async fn cart_set_quantity(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: CartQuantityPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid cart payload: {e}"))?;

    // Keypad free text clamps to >= 1; a plain number keeps remove-on-zero
    // semantics for the +/- steppers.
    let quantity = match &parsed.quantity {
        Value::String(_) => parse_quantity_input(&parsed.quantity),
        other => other.as_i64().unwrap_or(0),
    };

    if quantity <= 0 {
        let mut session = pos.session.lock().map_err(|e| e.to_string())?;
        session.cart.remove(&parsed.product_id);
        return Ok(session_view(&session));
    }

    let product = resolve_product(&client, &pos, &parsed.product_id).await?;
    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.cart.set_quantity(&product, quantity);
    Ok(session_view(&session))
}

#[tauri::command]
pub async fn cart_set_price_mode(
    payload: Value,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: PriceModePayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid price mode payload: {e}"))?;
    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    let catalog = session.catalog.clone();
    session.cart.set_price_mode(parsed.mode, &catalog);
    Ok(session_view(&session))
}

#[tauri::command]
pub async fn cart_set_discount(
    payload: Value,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: DiscountPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid discount payload: {e}"))?;
    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.discount_percent = parsed.percent.clamp(0, 100);
    Ok(session_view(&session))
}

#[tauri::command]
pub async fn cart_select_customer(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: SelectCustomerPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid customer payload: {e}"))?;

    let customer = match parsed.customer_id.as_deref().filter(|s| !s.is_empty()) {
        Some(customer_id) => {
            let rows = client
                .select(
                    "customer_debts",
                    SelectQuery::new().eq("id", customer_id).limit(1),
                )
                .await
                .map_err(String::from)?;
            match rows.into_iter().next() {
                Some(row) => {
                    let customer: CustomerDebt = map_row("customer", row).map_err(String::from)?;
                    Some(customer)
                }
                None => return Err("Không tìm thấy khách hàng".to_string()),
            }
        }
        None => None,
    };

    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.selected_customer = customer;
    Ok(session_view(&session))
}

#[tauri::command]
pub async fn cart_clear(pos: tauri::State<'_, PosState>) -> Result<Value, String> {
    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.cart.clear();
    session.discount_percent = 0;
    Ok(session_view(&session))
}

/// Finalize the cart. The in-flight guard makes a double tap on the pay
/// button fail fast instead of settling twice; the cart only clears after
/// the whole write sequence succeeded.
#[tauri::command]
pub async fn pos_settle(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    pos: tauri::State<'_, PosState>,
) -> Result<Value, String> {
    let parsed: SettlePayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid settle payload: {e}"))?;
    let _guard = SettleGuard::acquire().map_err(String::from)?;

    let (cart, customer, discount_percent) = {
        let session = pos.session.lock().map_err(|e| e.to_string())?;
        (
            session.cart.clone(),
            session.selected_customer.clone(),
            session.discount_percent,
        )
    };

    let outcome = checkout::settle(
        &*client,
        &cart,
        customer.as_ref(),
        parsed.method,
        discount_percent,
        Utc::now(),
    )
    .await
    .map_err(|e| {
        // A partially-applied settlement left writes behind; it must reach
        // the user as such, never as a clean failure.
        if e.is_partially_applied() {
            tracing::error!(error = %e, "settlement left partial writes");
        } else if !e.is_validation() {
            tracing::warn!(error = %e, "settlement failed");
        }
        String::from(e)
    })?;

    let mut session = pos.session.lock().map_err(|e| e.to_string())?;
    session.cart.clear();
    session.discount_percent = 0;
    if cart.mode() == PriceMode::Wholesale {
        session.selected_customer = None;
    }

    Ok(serde_json::json!({
        "success": true,
        "order": outcome.order,
        "orderLines": outcome.lines,
        "totals": outcome.totals,
        "invoice": outcome.invoice,
        "pos": session_view(&session),
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn cart_item_payload_defaults_delta_to_one() {
        let parsed: CartItemPayload =
            serde_json::from_value(serde_json::json!({ "productId": "SP001" })).unwrap();
        assert_eq!(parsed.delta, 1);

        let parsed: CartItemPayload =
            serde_json::from_value(serde_json::json!({ "product_id": "SP001", "delta": -1 }))
                .unwrap();
        assert_eq!(parsed.delta, -1);
    }

    #[test]
    fn quantity_payload_keeps_raw_value_shape() {
        let parsed: CartQuantityPayload = serde_json::from_value(serde_json::json!({
            "productId": "SP001",
            "quantity": "17"
        }))
        .unwrap();
        assert_eq!(parse_quantity_input(&parsed.quantity), 17);

        let parsed: CartQuantityPayload = serde_json::from_value(serde_json::json!({
            "productId": "SP001",
            "quantity": 0
        }))
        .unwrap();
        assert_eq!(parsed.quantity.as_i64(), Some(0));
    }

    #[test]
    fn settle_payload_rejects_unknown_methods() {
        assert!(serde_json::from_value::<SettlePayload>(
            serde_json::json!({ "method": "check" })
        )
        .is_err());
        let parsed: SettlePayload =
            serde_json::from_value(serde_json::json!({ "method": "debt" })).unwrap();
        assert_eq!(parsed.method, PaymentMethod::Debt);
    }
}
