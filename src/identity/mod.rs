//! External identity-service boundary.
//!
//! The portal never owns credential or session truth — a hosted identity
//! service does. This module defines the trait the Session Gate consumes,
//! the auth-change subscription handle, and [`HostedIdentity`], an HTTP
//! implementation that persists the issued token under the data directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PortalConfig;

/// Fixed domain appended to a CPF to form the identity-service login email.
pub const PORTAL_LOGIN_DOMAIN: &str = "@portalcliente.com";

/// Map a CPF (with or without punctuation) onto the fixed-domain email the
/// identity service expects. Only `.` and `-` are stripped.
pub fn cpf_login_email(cpf: &str) -> String {
    let digits: String = cpf.chars().filter(|c| !matches!(c, '.' | '-')).collect();
    format!("{digits}{PORTAL_LOGIN_DOMAIN}")
}

// ─── Public types ─────────────────────────────────────────────────────────────

/// An authenticated session as issued by the identity service.
///
/// Carries the stable user identifier every other service keys by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
}

/// Row in the administrators table, keyed by the authenticated user id.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminRecord {
    pub id: Uuid,
}

/// Auth state transitions pushed to subscribers.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service not configured")]
    NotConfigured,
    #[error("identity service unreachable: {0}")]
    Unreachable(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity service error: {0}")]
    Service(String),
}

// ─── Auth-change subscription ─────────────────────────────────────────────────

/// Fan-out of auth state changes (login, logout, token refresh).
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Notify all subscribers. No subscribers is fine.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
    }

    pub fn watch(&self) -> AuthWatcher {
        AuthWatcher {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Subscription handle for auth state changes.
///
/// Consuming views must call [`AuthWatcher::release`] on teardown so no
/// callback fires into destroyed state; after release, `recv` returns `None`
/// deterministically.
pub struct AuthWatcher {
    rx: Option<broadcast::Receiver<AuthEvent>>,
}

impl AuthWatcher {
    /// Next auth transition, or `None` once released (or the provider is gone).
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                // Skipped events only mean we were slow; keep listening.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Cancel the subscription. No events are observable after this returns.
    pub fn release(&mut self) {
        self.rx = None;
    }
}

// ─── Provider trait ───────────────────────────────────────────────────────────

/// Identity-service operations the portal depends on.
///
/// The gate and the CLI consume this seam; tests substitute in-memory
/// implementations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, if any. `Ok(None)` is the normal signed-out outcome;
    /// `Err` means resolution itself failed (service unreachable).
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Look up the administrators record for `user_id`. `Ok(None)` means
    /// "no record found" — a normal outcome, not an error.
    async fn admin_record(&self, user_id: &Uuid) -> Result<Option<AdminRecord>, IdentityError>;

    /// Subscribe to future auth transitions.
    fn subscribe(&self) -> AuthWatcher;
}

// ─── Hosted implementation ────────────────────────────────────────────────────

/// What we persist between runs. The refresh token lets a stale access token
/// be renewed without another password prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    user_id: Uuid,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl StoredSession {
    fn session(&self) -> Session {
        Session {
            user_id: self.user_id,
            access_token: self.access_token.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: Uuid,
}

/// HTTP identity client.
///
/// Endpoints follow the hosted auth + REST convention the portal backend
/// uses: `/auth/v1/token`, `/auth/v1/user`, `/auth/v1/logout`, and
/// `/rest/v1/admins` for the role table.
pub struct HostedIdentity {
    base_url: Option<String>,
    api_key: Option<String>,
    data_dir: PathBuf,
    http: reqwest::Client,
    events: AuthEvents,
}

impl HostedIdentity {
    pub fn new(config: &PortalConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.identity_url.clone(),
            api_key: config.identity_api_key.clone(),
            data_dir: config.data_dir.clone(),
            http,
            events: AuthEvents::new(),
        })
    }

    fn base_url(&self) -> Result<&str, IdentityError> {
        self.base_url.as_deref().ok_or(IdentityError::NotConfigured)
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    fn load_stored(&self) -> Option<StoredSession> {
        let contents = std::fs::read_to_string(self.session_path()).ok()?;
        match serde_json::from_str(&contents) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!("discarding unreadable session file: {e}");
                self.clear_stored();
                None
            }
        }
    }

    /// Write the session file with user-only read/write permissions
    /// (mode 0600 on Unix) — it holds a live bearer token.
    fn store(&self, stored: &StoredSession) {
        let path = self.session_path();
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.data_dir)?;
            std::fs::write(&path, serde_json::to_string(stored).unwrap_or_default())?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
            }
            Ok(())
        };
        if let Err(e) = write() {
            warn!(path = %path.display(), "failed to persist session: {e}");
        }
    }

    fn clear_stored(&self) {
        let _ = std::fs::remove_file(self.session_path());
    }

    fn auth_headers(&self, req: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let req = req.bearer_auth(token);
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    /// Exchange the refresh token for a new session. Failure here is the
    /// normal "session expired" outcome, not an error.
    async fn refresh(&self, stored: &StoredSession) -> Result<Option<StoredSession>, IdentityError> {
        let Some(refresh_token) = &stored.refresh_token else {
            return Ok(None);
        };
        let base = self.base_url()?;
        let url = format!("{base}/auth/v1/token?grant_type=refresh_token");
        let mut req = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), "token refresh rejected");
            return Ok(None);
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?;
        Ok(Some(StoredSession {
            user_id: body.user.id,
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        }))
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let Some(stored) = self.load_stored() else {
            return Ok(None);
        };
        let base = self.base_url()?;

        // Revalidate the stored token before trusting it.
        let url = format!("{base}/auth/v1/user");
        let resp = self
            .auth_headers(self.http.get(&url), &stored.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Stale token — try one refresh, then give up cleanly.
            match self.refresh(&stored).await? {
                Some(renewed) => {
                    self.store(&renewed);
                    let session = renewed.session();
                    info!("session token refreshed");
                    self.events.emit(AuthEvent::TokenRefreshed(session.clone()));
                    return Ok(Some(session));
                }
                None => {
                    self.clear_stored();
                    return Ok(None);
                }
            }
        }
        if !resp.status().is_success() {
            return Err(IdentityError::Service(format!(
                "identity service returned {}",
                resp.status()
            )));
        }
        Ok(Some(stored.session()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let base = self.base_url()?;
        let url = format!("{base}/auth/v1/token?grant_type=password");
        let mut req = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }));
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(IdentityError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(IdentityError::Service(format!(
                "identity service returned {status}"
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?;
        let stored = StoredSession {
            user_id: body.user.id,
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        };
        self.store(&stored);
        let session = stored.session();
        info!(user_id = %session.user_id, "signed in");
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(stored) = self.load_stored() {
            if let Ok(base) = self.base_url() {
                // Best effort — the local session is gone either way.
                let url = format!("{base}/auth/v1/logout");
                let result = self
                    .auth_headers(self.http.post(&url), &stored.access_token)
                    .send()
                    .await;
                if let Err(e) = result {
                    warn!("logout call failed: {e} — clearing local session anyway");
                }
            }
        }
        self.clear_stored();
        self.events.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn admin_record(&self, user_id: &Uuid) -> Result<Option<AdminRecord>, IdentityError> {
        let stored = self.load_stored();
        let token = stored
            .as_ref()
            .map(|s| s.access_token.as_str())
            .unwrap_or_default();
        let base = self.base_url()?;
        let url = format!("{base}/rest/v1/admins?select=id&id=eq.{user_id}");
        let resp = self
            .auth_headers(self.http.get(&url), token)
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(IdentityError::Service(format!(
                "admin lookup returned {}",
                resp.status()
            )));
        }
        let rows: Vec<AdminRecord> = resp
            .json()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    fn subscribe(&self) -> AuthWatcher {
        self.events.watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_mapping_strips_punctuation() {
        assert_eq!(
            cpf_login_email("123.456.789-01"),
            "12345678901@portalcliente.com"
        );
        assert_eq!(cpf_login_email("12345678901"), "12345678901@portalcliente.com");
    }

    #[tokio::test]
    async fn watcher_receives_then_releases() {
        let events = AuthEvents::new();
        let mut watcher = events.watch();

        events.emit(AuthEvent::SignedOut);
        assert!(matches!(watcher.recv().await, Some(AuthEvent::SignedOut)));

        watcher.release();
        events.emit(AuthEvent::SignedOut);
        assert!(watcher.recv().await.is_none());
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_fine() {
        let events = AuthEvents::new();
        events.emit(AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn no_stored_session_resolves_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = PortalConfig::new(Some(dir.path().to_path_buf()), None, None);
        let identity = HostedIdentity::new(&config).unwrap();
        // No session file and no identity service: the normal signed-out case.
        assert!(identity.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_in_requires_a_configured_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = PortalConfig::new(Some(dir.path().to_path_buf()), None, None);
        let identity = HostedIdentity::new(&config).unwrap();
        let err = identity.sign_in("a@b", "pw").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
    }
}
