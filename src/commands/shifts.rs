use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::shifts::{self, ShiftInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShiftIdPayload {
    #[serde(alias = "shift_id", alias = "id")]
    shift_id: String,
}

#[tauri::command]
pub async fn shift_get_all(client: tauri::State<'_, SupabaseClient>) -> Result<Value, String> {
    let shifts = shifts::list_shifts(&*client).await.map_err(String::from)?;
    Ok(serde_json::json!({
        "shifts": shifts,
        "summary": shifts::summary_counts(&shifts),
    }))
}

#[tauri::command]
pub async fn shift_save(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let input: ShiftInput =
        serde_json::from_value(payload).map_err(|e| format!("Invalid shift payload: {e}"))?;
    let shift = shifts::save_shift(&*client, input)
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "shift": shift }))
}

#[tauri::command]
pub async fn shift_delete(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: ShiftIdPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid shift payload: {e}"))?;
    shifts::delete_shift(&*client, &parsed.shift_id)
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub async fn shift_get_summary(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let shifts = shifts::list_shifts(&*client).await.map_err(String::from)?;
    Ok(shifts::summary_counts(&shifts))
}
