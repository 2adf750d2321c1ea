//! Hosted-backend API client.
//!
//! Implements the [`Store`] seam over the backend's REST surface
//! (`/rest/v1`), plus the auth (`/auth/v1`) and object-storage
//! (`/storage/v1`) endpoints the domain layer needs. Requests are
//! authenticated with the anon key, upgraded to the signed-in user's access
//! token once a session exists so row-level security applies.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::warn;

use crate::error::PosError;
use crate::storage;
use crate::store::{Filter, SelectQuery, Store};

/// Default timeout for API requests (20 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session expired or anon key invalid".to_string(),
        403 => "Not authorized for this operation".to_string(),
        404 => "Backend endpoint not found".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from backend (HTTP {s})"),
    }
}

/// Pull the most useful message out of an error response body.
fn body_error(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("message")
            .or_else(|| json.get("error_description"))
            .or_else(|| json.get("error"))
            .or_else(|| json.get("msg"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| status_error(status));
        return format!("{message} (HTTP {})", status.as_u16());
    }
    if !body.trim().is_empty() {
        return format!("{} (HTTP {}): {}", status_error(status), status.as_u16(), body.trim());
    }
    format!("{} (HTTP {})", status_error(status), status.as_u16())
}

// ---------------------------------------------------------------------------
// Query serialisation
// ---------------------------------------------------------------------------

/// Append a [`SelectQuery`] to a REST URL as PostgREST query parameters.
fn apply_select_query(url: &mut Url, query: &SelectQuery) {
    let mut qp = url.query_pairs_mut();
    qp.append_pair("select", "*");
    for filter in &query.filters {
        qp.append_pair(
            &filter.column,
            &format!("{}.{}", filter.op.as_postgrest(), filter.value),
        );
    }
    if let Some((column, ascending)) = &query.order {
        let direction = if *ascending { "asc" } else { "desc" };
        qp.append_pair("order", &format!("{column}.{direction}"));
    }
    if let Some(limit) = query.limit {
        qp.append_pair("limit", &limit.to_string());
    }
}

fn apply_filters(url: &mut Url, filters: &[Filter]) {
    let mut qp = url.query_pairs_mut();
    for filter in filters {
        qp.append_pair(
            &filter.column,
            &format!("{}.{}", filter.op.as_postgrest(), filter.value),
        );
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Tokens issued by the auth endpoint for a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user_id: String,
    pub email: String,
}

impl AuthTokens {
    fn from_response(body: Value) -> Result<Self, PosError> {
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| PosError::backend("Auth response missing access_token"))?
            .to_string();
        let refresh_token = body
            .get("refresh_token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_i64).unwrap_or(3600);
        let user = body
            .get("user")
            .ok_or_else(|| PosError::backend("Auth response missing user"))?;
        let user_id = user
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PosError::backend("Auth response missing user id"))?
            .to_string();
        let email = user
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in,
            user_id,
            email,
        })
    }
}

pub struct SupabaseClient {
    http: Client,
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        SupabaseClient {
            http,
            access_token: RwLock::new(None),
        }
    }

    /// Swap the bearer token used for data requests. `None` falls back to
    /// the anon key.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }

    fn bearer(&self, anon_key: &str) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| anon_key.to_string())
    }

    fn rest_url(base: &str, table: &str) -> Result<Url, PosError> {
        Url::parse(&format!("{base}/rest/v1/{table}"))
            .map_err(|e| PosError::backend(format!("Invalid backend URL: {e}")))
    }

    async fn read_rows(resp: reqwest::Response, base: &str) -> Result<Vec<Value>, PosError> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PosError::backend(body_error(status, &body)));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(single) => Ok(vec![single]),
            Err(e) => Err(PosError::backend(format!(
                "Invalid JSON from backend at {base}: {e}"
            ))),
        }
    }

    // -- Auth endpoints -----------------------------------------------------

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<AuthTokens, PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let url = format!("{base}/auth/v1/token?grant_type={grant_type}");
        let resp = self
            .http
            .post(&url)
            .header("apikey", &anon_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PosError::backend(body_error(status, &text)));
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| PosError::backend(format!("Invalid JSON from auth endpoint: {e}")))?;
        AuthTokens::from_response(json)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthTokens, PosError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthTokens, PosError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Revoke the current session on the backend. Local state is cleared by
    /// the caller regardless of the outcome.
    pub async fn sign_out(&self) -> Result<(), PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let token = self.bearer(&anon_key);
        let url = format!("{base}/auth/v1/logout");
        let resp = self
            .http
            .post(&url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            warn!(status = %resp.status(), "sign-out rejected by backend");
        }
        Ok(())
    }
}

impl Default for SupabaseClient {
    fn default() -> Self {
        SupabaseClient::new()
    }
}

#[async_trait]
impl Store for SupabaseClient {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>, PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let mut url = Self::rest_url(&base, table)?;
        apply_select_query(&mut url, &query);

        let resp = self
            .http
            .get(url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer(&anon_key)))
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        Self::read_rows(resp, &base).await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let url = Self::rest_url(&base, table)?;

        let resp = self
            .http
            .post(url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer(&anon_key)))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        Self::read_rows(resp, &base).await
    }

    async fn update(
        &self,
        table: &str,
        filters: Vec<Filter>,
        patch: Value,
    ) -> Result<Vec<Value>, PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let mut url = Self::rest_url(&base, table)?;
        apply_filters(&mut url, &filters);

        let resp = self
            .http
            .patch(url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer(&anon_key)))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        Self::read_rows(resp, &base).await
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<(), PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let mut url = Self::rest_url(&base, table)?;
        apply_filters(&mut url, &filters);

        let resp = self
            .http
            .delete(url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer(&anon_key)))
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PosError::backend(body_error(status, &body)));
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PosError> {
        let (base, anon_key) = storage::backend_config()?;
        let url = format!("{base}/storage/v1/object/{bucket}/{path}");

        let resp = self
            .http
            .post(&url)
            .header("apikey", &anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer(&anon_key)))
            .header("Content-Type", content_type.to_string())
            .body(bytes)
            .send()
            .await
            .map_err(|e| PosError::backend(friendly_error(&base, &e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PosError::backend(body_error(status, &body)));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, PosError> {
        let (base, _) = storage::backend_config()?;
        Ok(format!("{base}/storage/v1/object/public/{bucket}/{path}"))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_query_serialises_to_postgrest_params() {
        let mut url = Url::parse("https://abc.supabase.co/rest/v1/orders").unwrap();
        let query = SelectQuery::new()
            .eq("customer_id", "c1")
            .gte("created_at", "2026-08-07")
            .lt("created_at", "2026-08-08")
            .order_desc("created_at")
            .limit(50);
        apply_select_query(&mut url, &query);

        let qs = url.query().unwrap();
        assert!(qs.contains("select=*"));
        assert!(qs.contains("customer_id=eq.c1"));
        assert!(qs.contains("created_at=gte.2026-08-07"));
        assert!(qs.contains("created_at=lt.2026-08-08"));
        assert!(qs.contains("order=created_at.desc"));
        assert!(qs.contains("limit=50"));
    }

    #[test]
    fn auth_tokens_parse_and_reject_missing_fields() {
        let ok = AuthTokens::from_response(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": { "id": "u1", "email": "a@b.vn" }
        }))
        .unwrap();
        assert_eq!(ok.user_id, "u1");
        assert_eq!(ok.email, "a@b.vn");

        let err = AuthTokens::from_response(serde_json::json!({ "user": {} })).unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn body_error_prefers_backend_message() {
        let msg = body_error(
            StatusCode::BAD_REQUEST,
            r#"{"message":"duplicate key value"}"#,
        );
        assert!(msg.contains("duplicate key value"));
        assert!(msg.contains("400"));
    }
}
