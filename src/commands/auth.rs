use serde::Deserialize;
use zeroize::Zeroize;

use crate::api::SupabaseClient;
use crate::auth::{self, AuthState};

// No Debug derive: the payload carries the password.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    email: String,
    password: String,
}

impl Drop for LoginPayload {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

#[tauri::command]
pub async fn auth_login(
    payload: serde_json::Value,
    client: tauri::State<'_, SupabaseClient>,
    auth: tauri::State<'_, AuthState>,
) -> Result<serde_json::Value, String> {
    let mut parsed: LoginPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid login payload: {e}"))?;
    let password = std::mem::take(&mut parsed.password);
    auth::sign_in(&client, &auth, &parsed.email, password)
        .await
        .map_err(String::from)
}

#[tauri::command]
pub async fn auth_restore_session(
    client: tauri::State<'_, SupabaseClient>,
    auth: tauri::State<'_, AuthState>,
) -> Result<serde_json::Value, String> {
    auth::restore_session(&client, &auth)
        .await
        .map_err(String::from)
}

#[tauri::command]
pub async fn auth_logout(
    client: tauri::State<'_, SupabaseClient>,
    auth: tauri::State<'_, AuthState>,
) -> Result<serde_json::Value, String> {
    Ok(auth::sign_out(&client, &auth).await)
}

#[tauri::command]
pub async fn auth_get_session(
    auth: tauri::State<'_, AuthState>,
) -> Result<serde_json::Value, String> {
    Ok(auth::session_json(&auth))
}

#[tauri::command]
pub async fn auth_get_profile(
    auth: tauri::State<'_, AuthState>,
) -> Result<serde_json::Value, String> {
    match auth.current_profile() {
        Some(profile) => serde_json::to_value(profile).map_err(|e| e.to_string()),
        None => Ok(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn login_payload_parses_camel_case() {
        let parsed: LoginPayload = serde_json::from_value(serde_json::json!({
            "email": "mai@binhminh.vn",
            "password": "s3cret"
        }))
        .unwrap();
        assert_eq!(parsed.email, "mai@binhminh.vn");
        assert_eq!(parsed.password, "s3cret");
    }
}
