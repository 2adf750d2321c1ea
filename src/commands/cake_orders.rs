use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::auth::AuthState;
use crate::cake_orders::{self, NewCakeOrder};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdPayload {
    #[serde(alias = "order_id", alias = "id")]
    order_id: String,
}

#[tauri::command]
pub async fn cake_order_create(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    auth: tauri::State<'_, AuthState>,
) -> Result<Value, String> {
    let mut input: NewCakeOrder =
        serde_json::from_value(payload).map_err(|e| format!("Invalid cake order payload: {e}"))?;
    if input.created_by.as_deref().map_or(true, str::is_empty) {
        input.created_by = auth.current_profile().map(|p| p.full_name);
    }
    let order = cake_orders::create(&*client, input, Utc::now())
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "order": order }))
}

/// Pending orders bucketed by urgency against the terminal's local clock,
/// plus the completed history.
#[tauri::command]
pub async fn cake_order_get_schedule(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let orders = cake_orders::list_orders(&*client)
        .await
        .map_err(String::from)?;
    Ok(cake_orders::schedule_json(orders, &Local::now()))
}

#[tauri::command]
pub async fn cake_order_mark_delivered(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: OrderIdPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid order payload: {e}"))?;
    let order = cake_orders::mark_delivered(&*client, &parsed.order_id, Utc::now())
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "order": order }))
}

#[tauri::command]
pub async fn cake_order_get_history(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let orders = cake_orders::history(&*client).await.map_err(String::from)?;
    serde_json::to_value(orders).map_err(|e| e.to_string())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn order_id_payload_accepts_aliases() {
        let parsed: OrderIdPayload =
            serde_json::from_value(serde_json::json!({ "order_id": "o1" })).unwrap();
        assert_eq!(parsed.order_id, "o1");
        let parsed: OrderIdPayload =
            serde_json::from_value(serde_json::json!({ "id": "o2" })).unwrap();
        assert_eq!(parsed.order_id, "o2");
    }

    #[test]
    fn new_order_payload_parses_iso_delivery_date() {
        let input: NewCakeOrder = serde_json::from_value(serde_json::json!({
            "customerName": "Chị Hoa",
            "productName": "Bánh Kem Dâu Tây",
            "quantity": 1,
            "depositAmount": 20000,
            "deliveryDate": "2026-08-08T05:00:00Z"
        }))
        .unwrap();
        assert!(input.delivery_date.is_some());
        assert_eq!(input.deposit_amount, 20000);
    }
}
