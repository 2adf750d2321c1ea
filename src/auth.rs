//! Backend-delegated authentication and profile resolution.
//!
//! Sign-in goes through the hosted auth endpoint (password grant); the
//! resulting session lives in memory and its refresh token is persisted in
//! the OS keyring so the terminal can restore the session after a restart.
//! A missing profile row at login falls back to a default sales profile
//! instead of failing: profile rows are created by a backend trigger and
//! may lag the auth record.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::api::{AuthTokens, SupabaseClient};
use crate::error::PosError;
use crate::models::{map_row, Role, UserProfile};
use crate::storage;
use crate::store::{SelectQuery, Store};

/// Fallback profile used while the backend trigger has not yet materialised
/// a profile row for a fresh auth user.
const GUEST_FULL_NAME: &str = "Nhân viên Sales";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An active backend session. The access token itself lives on the HTTP
/// client; this tracks identity and expiry.
#[derive(Clone)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Tauri managed state for authentication.
pub struct AuthState {
    session: Mutex<Option<Session>>,
    profile: Mutex<Option<UserProfile>>,
}

impl AuthState {
    pub fn new() -> Self {
        AuthState {
            session: Mutex::new(None),
            profile: Mutex::new(None),
        }
    }

    pub fn current_profile(&self) -> Option<UserProfile> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        match session.as_ref() {
            Some(s) if !s.is_expired() => self
                .profile
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            _ => None,
        }
    }

    fn install(&self, session: Session, profile: UserProfile) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session);
        *self.profile.lock().unwrap_or_else(|e| e.into_inner()) = Some(profile);
    }

    fn clear(&self) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.profile.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::new()
    }
}

// ---------------------------------------------------------------------------
// Profile resolution
// ---------------------------------------------------------------------------

pub fn guest_profile(user_id: &str, email: &str) -> UserProfile {
    UserProfile {
        id: user_id.to_string(),
        email: email.to_string(),
        full_name: GUEST_FULL_NAME.to_string(),
        role: Role::Sales,
    }
}

/// Resolve a profile from a backend result set. An empty set is the
/// tolerated eventual-consistency case; a malformed row is not.
pub fn profile_from_rows(
    rows: Vec<Value>,
    user_id: &str,
    email: &str,
) -> Result<UserProfile, PosError> {
    match rows.into_iter().next() {
        Some(row) => {
            let mut profile: UserProfile = map_row("profile", row)?;
            // The auth record owns the email; profile rows may omit it.
            profile.email = email.to_string();
            Ok(profile)
        }
        None => {
            warn!(user_id, "profile row missing, falling back to guest profile");
            Ok(guest_profile(user_id, email))
        }
    }
}

async fn fetch_profile(
    store: &dyn Store,
    user_id: &str,
    email: &str,
) -> Result<UserProfile, PosError> {
    let rows = store
        .select("profiles", SelectQuery::new().eq("id", user_id).limit(1))
        .await?;
    profile_from_rows(rows, user_id, email)
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

async fn establish(
    client: &SupabaseClient,
    auth: &AuthState,
    tokens: AuthTokens,
) -> Result<Value, PosError> {
    client.set_access_token(Some(tokens.access_token.clone()));
    if !tokens.refresh_token.is_empty() {
        storage::set_refresh_token(&tokens.refresh_token);
    }

    let profile = match fetch_profile(client, &tokens.user_id, &tokens.email).await {
        Ok(profile) => profile,
        Err(e) => {
            // Roll the token back so a failed login leaves no half-session.
            client.set_access_token(None);
            return Err(e);
        }
    };

    let session = Session {
        user_id: tokens.user_id.clone(),
        email: tokens.email.clone(),
        expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
    };
    auth.install(session, profile.clone());

    info!(user_id = %tokens.user_id, "signed in");
    Ok(serde_json::json!({
        "success": true,
        "user": profile,
    }))
}

/// Email/password sign-in. The password buffer is wiped after the request.
pub async fn sign_in(
    client: &SupabaseClient,
    auth: &AuthState,
    email: &str,
    mut password: String,
) -> Result<Value, PosError> {
    if email.trim().is_empty() || password.is_empty() {
        password.zeroize();
        return Err(PosError::validation("Vui lòng nhập email và mật khẩu"));
    }

    let result = client.sign_in_with_password(email.trim(), &password).await;
    password.zeroize();

    establish(client, auth, result?).await
}

/// Restore the previous session from the persisted refresh token, if any.
pub async fn restore_session(client: &SupabaseClient, auth: &AuthState) -> Result<Value, PosError> {
    let refresh_token = match storage::get_refresh_token() {
        Some(t) => t,
        None => {
            return Ok(serde_json::json!({
                "success": false,
                "reason": "No saved session",
            }))
        }
    };

    match client.refresh_session(&refresh_token).await {
        Ok(tokens) => establish(client, auth, tokens).await,
        Err(e) => {
            // A dead refresh token is an expected state after password
            // changes or long downtime; clear it and report a clean miss.
            warn!(error = %e, "saved session could not be restored");
            storage::clear_refresh_token();
            Ok(serde_json::json!({
                "success": false,
                "reason": e.to_string(),
            }))
        }
    }
}

/// Sign out: revoke remotely (best effort), then clear all local state.
pub async fn sign_out(client: &SupabaseClient, auth: &AuthState) -> Value {
    if let Err(e) = client.sign_out().await {
        warn!(error = %e, "remote sign-out failed, clearing local session anyway");
    }
    client.set_access_token(None);
    auth.clear();
    storage::clear_refresh_token();
    info!("signed out");
    serde_json::json!({ "success": true })
}

/// Current session as the JSON shape the frontend expects, or null.
pub fn session_json(auth: &AuthState) -> Value {
    let session = auth
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    match (session, auth.current_profile()) {
        (Some(s), Some(profile)) => serde_json::json!({
            "user": profile,
            "userId": s.user_id,
            "email": s.email,
            "expiresAt": s.expires_at.to_rfc3339(),
        }),
        _ => Value::Null,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
