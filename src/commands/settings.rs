use serde_json::Value;

use crate::{invoice, storage};

#[tauri::command]
pub async fn settings_is_configured() -> Result<Value, String> {
    Ok(serde_json::json!({ "configured": storage::is_configured() }))
}

#[tauri::command]
pub async fn settings_update_backend_credentials(payload: Value) -> Result<Value, String> {
    storage::update_backend_credentials(&payload)
}

#[tauri::command]
pub async fn settings_factory_reset() -> Result<Value, String> {
    storage::factory_reset()
}

/// Static store identity for the dashboard header and the printable invoice.
#[tauri::command]
pub async fn settings_get_store_info() -> Result<Value, String> {
    Ok(serde_json::json!({
        "name": invoice::SHOP_NAME,
        "address": invoice::SHOP_ADDRESS,
        "phone": invoice::SHOP_PHONE,
        "bank": {
            "bankId": invoice::BANK_ID,
            "accountNo": invoice::BANK_ACCOUNT_NO,
            "accountName": invoice::BANK_ACCOUNT_NAME,
        },
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
    }))
}
