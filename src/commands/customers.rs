use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::SupabaseClient;
use crate::debt::{self, CustomerInput};
use crate::models::{map_row, CustomerDebt, TransactionKind};
use crate::store::{SelectQuery, Store};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerIdPayload {
    #[serde(alias = "customer_id", alias = "id")]
    customer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload {
    #[serde(default, alias = "q", alias = "term", alias = "search")]
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionPayload {
    #[serde(alias = "customer_id")]
    customer_id: String,
    /// Free-text amount from the modal input: numbers pass through, strings
    /// are parsed, anything else fails the positive-amount validation.
    amount: Value,
    #[serde(rename = "type")]
    kind: TransactionKind,
    #[serde(default)]
    note: Option<String>,
}

fn parse_amount(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

async fn fetch_customer(store: &dyn Store, customer_id: &str) -> Result<CustomerDebt, String> {
    let rows = store
        .select(
            "customer_debts",
            SelectQuery::new().eq("id", customer_id).limit(1),
        )
        .await
        .map_err(String::from)?;
    match rows.into_iter().next() {
        Some(row) => map_row("customer", row).map_err(String::from),
        None => Err("Không tìm thấy khách hàng".to_string()),
    }
}

#[tauri::command]
pub async fn customer_get_all(
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let customers = debt::list_customers(&*client).await.map_err(String::from)?;
    serde_json::to_value(customers).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn customer_search(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: SearchPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid search payload: {e}"))?;
    let customers = debt::list_customers(&*client).await.map_err(String::from)?;
    let matches = debt::search_customers(&customers, &parsed.query);
    serde_json::to_value(matches).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn customer_save(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let input: CustomerInput =
        serde_json::from_value(payload).map_err(|e| format!("Invalid customer payload: {e}"))?;
    let customer = debt::save_customer(&*client, input, Utc::now())
        .await
        .map_err(String::from)?;
    Ok(serde_json::json!({ "success": true, "customer": customer }))
}

/// Record a ledger transaction against the customer's *current* balance:
/// the row is re-fetched here so a stale list in the UI cannot corrupt the
/// running balance.
#[tauri::command]
pub async fn debt_record_transaction(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: TransactionPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid transaction payload: {e}"))?;
    let amount = parse_amount(&parsed.amount);

    let customer = fetch_customer(&*client, &parsed.customer_id).await?;
    let update = debt::record_transaction(
        &*client,
        &customer,
        amount,
        parsed.kind,
        parsed.note,
        Utc::now(),
    )
    .await
    .map_err(|e| {
        if e.is_partially_applied() {
            tracing::error!(error = %e, "ledger entry left partial writes");
        }
        String::from(e)
    })?;

    Ok(serde_json::json!({
        "success": true,
        "transaction": update.transaction,
        "newBalance": update.new_balance,
        "status": update.status,
    }))
}

#[tauri::command]
pub async fn debt_get_transactions(
    payload: Value,
    client: tauri::State<'_, SupabaseClient>,
) -> Result<Value, String> {
    let parsed: CustomerIdPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid customer payload: {e}"))?;
    let transactions = debt::list_transactions(&*client, &parsed.customer_id)
        .await
        .map_err(String::from)?;
    serde_json::to_value(transactions).map_err(|e| e.to_string())
}

// ===========================================================================
// Tests
// ===========================================================================
