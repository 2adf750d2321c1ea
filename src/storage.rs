//! Secure backend configuration storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the Secret Service API. The backend URL and anon key can
//! also be supplied through `SUPABASE_URL` / `SUPABASE_ANON_KEY` environment
//! variables, which take effect when nothing is stored (useful for dev
//! shells and CI).

use keyring::Entry;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PosError;

const SERVICE_NAME: &str = "binh-minh-pos";

// Credential keys
const KEY_SUPABASE_URL: &str = "supabase_url";
const KEY_SUPABASE_ANON_KEY: &str = "supabase_anon_key";
const KEY_REFRESH_TOKEN: &str = "auth_refresh_token";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[KEY_SUPABASE_URL, KEY_SUPABASE_ANON_KEY, KEY_REFRESH_TOKEN];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Backend configuration
// ---------------------------------------------------------------------------

/// Normalise the backend URL: strip trailing slashes and ensure a scheme is
/// present (https, or http for localhost).
pub fn normalize_backend_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the backend base URL and anon key: keyring first, environment
/// variables second.
pub fn backend_config() -> Result<(String, String), PosError> {
    let url = get_credential(KEY_SUPABASE_URL)
        .or_else(|| env_nonempty("SUPABASE_URL"))
        .ok_or_else(|| PosError::backend("Backend not configured: missing URL"))?;
    let anon_key = get_credential(KEY_SUPABASE_ANON_KEY)
        .or_else(|| env_nonempty("SUPABASE_ANON_KEY"))
        .ok_or_else(|| PosError::backend("Backend not configured: missing anon key"))?;
    Ok((normalize_backend_url(&url), anon_key))
}

/// The terminal is considered configured when both backend credentials
/// resolve.
pub fn is_configured() -> bool {
    backend_config().is_ok()
}

/// Store backend credentials received during onboarding.
pub fn update_backend_credentials(payload: &Value) -> Result<Value, String> {
    let url = payload
        .get("supabaseUrl")
        .or_else(|| payload.get("supabase_url"))
        .or_else(|| payload.get("url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: supabaseUrl")?;
    let anon_key = payload
        .get("supabaseAnonKey")
        .or_else(|| payload.get("supabase_anon_key"))
        .or_else(|| payload.get("anonKey"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: supabaseAnonKey")?;

    set_credential(KEY_SUPABASE_URL, &normalize_backend_url(url))?;
    set_credential(KEY_SUPABASE_ANON_KEY, anon_key)?;

    info!("backend credentials updated");
    Ok(serde_json::json!({ "success": true }))
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<Value, String> {
    info!("performing factory reset – deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(serde_json::json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Session persistence
// ---------------------------------------------------------------------------

pub fn get_refresh_token() -> Option<String> {
    get_credential(KEY_REFRESH_TOKEN)
}

pub fn set_refresh_token(token: &str) {
    if let Err(e) = set_credential(KEY_REFRESH_TOKEN, token) {
        warn!(error = %e, "keyring: failed to persist refresh token");
    }
}

pub fn clear_refresh_token() {
    let _ = delete_credential(KEY_REFRESH_TOKEN);
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_scheme() {
        assert_eq!(
            normalize_backend_url("abc.supabase.co"),
            "https://abc.supabase.co"
        );
    }

    #[test]
    fn normalize_uses_http_for_localhost() {
        assert_eq!(
            normalize_backend_url("localhost:54321"),
            "http://localhost:54321"
        );
        assert_eq!(
            normalize_backend_url("127.0.0.1:54321"),
            "http://127.0.0.1:54321"
        );
    }

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_backend_url("https://abc.supabase.co///"),
            "https://abc.supabase.co"
        );
    }

    #[test]
    fn update_credentials_requires_both_fields() {
        let err = update_backend_credentials(&serde_json::json!({
            "supabaseUrl": "https://abc.supabase.co"
        }))
        .unwrap_err();
        assert!(err.contains("supabaseAnonKey"));
    }
}
