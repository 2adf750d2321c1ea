use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::auth::AuthState;
use crate::catalog::{self, ProductInput};
use crate::uploads;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductFilterPayload {
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "q", alias = "term")]
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportPayload {
    #[serde(alias = "product_id")]
    product_id: String,
    quantity: i64,
    price: i64,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadPayload {
    /// Base64 file contents, with or without a data-URL prefix.
    data: String,
    /// Object-name prefix: "prod" (default) or "cust".
    #[serde(default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    "prod".to_string()
}

#[tauri::command]
pub async fn product_get_all(
    payload: Option<Value>,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let filter: ProductFilterPayload = match payload {
        Some(v) => serde_json::from_value(v).unwrap_or_default(),
        None => ProductFilterPayload::default(),
    };
    let products = catalog::list_products(&*client).await.map_err(String::from)?;
    let filtered = catalog::filter_products(
        &products,
        filter.category.as_deref().filter(|c| !c.is_empty()),
        filter.search.as_deref().unwrap_or(""),
    );
    Ok(serde_json::json!({
        "products": filtered,
        "categories": catalog::CATEGORIES,
    }))
}

#[tauri::command]
pub async fn product_save(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let input: ProductInput =
        serde_json::from_value(payload).map_err(|e| format!("Invalid product payload: {e}"))?;
    let product = catalog::save_product(&*client, input)
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "product": product }))
}

/// Stock intake: audit log plus counter bump, stamped with the signed-in
/// user.
#[tauri::command]
pub async fn inventory_import(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
    auth: tauri::State<'_, AuthState>,
) -> Result<Value, String> {
    let parsed: ImportPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid import payload: {e}"))?;

    let product = catalog::get_product(&*client, &parsed.product_id)
        .await
        .map_err(String::from)?;
    let created_by = auth.current_profile().map(|p| p.id);
    let log = catalog::import_stock(
        &*client,
        &product,
        parsed.quantity,
        parsed.price,
        parsed.note,
        created_by,
        Utc::now(),
    )
    .await
    .map_err(String::from)?;

    Ok(serde_json::json!({ "success": true, "log": log }))
}

#[tauri::command]
pub async fn inventory_get_logs(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let logs = catalog::list_inventory_logs(&*client)
        .await
        .map_err(String::from)?;
    serde_json::to_value(logs).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn image_upload(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: UploadPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid upload payload: {e}"))?;
    let url = uploads::upload_image(&*client, &parsed.kind, &parsed.data)
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "publicUrl": url }))
}

// ===========================================================================
// Tests
// ===========================================================================
