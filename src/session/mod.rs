//! Session Gate — resolves whether the visitor has an authenticated identity
//! and, if so, an administrative role.
//!
//! Authorization failure is a normal outcome here, never an exceptional one:
//! a visitor whose session cannot be resolved is simply unauthenticated and
//! gets redirected to login. While resolution is pending, dependents render a
//! neutral loading state rather than assuming either side.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::identity::{AuthWatcher, IdentityProvider, Session};

/// Resolved authorization state. Read-only, externally refreshed input for
/// every other component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRole {
    pub authenticated: bool,
    pub is_admin: bool,
}

impl SessionRole {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            is_admin: false,
        }
    }
}

/// Render decision for protected views.
#[derive(Debug)]
pub enum AccessDecision {
    /// Identity resolved — render the protected view.
    Grant { session: Session, role: SessionRole },
    /// No session, or resolution failed: the only correct render is the
    /// login entry point. No data fetch may happen on this path.
    RedirectToLogin,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Grant { .. })
    }
}

pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    /// Resolve the current access decision.
    ///
    /// A resolution failure (network/service error) is treated as
    /// unauthenticated — logged, never propagated.
    pub async fn resolve_access(&self) -> AccessDecision {
        match self.identity.get_session().await {
            Ok(Some(session)) => {
                let is_admin = self.resolve_admin(&session.user_id).await;
                AccessDecision::Grant {
                    role: SessionRole {
                        authenticated: true,
                        is_admin,
                    },
                    session,
                }
            }
            Ok(None) => {
                debug!("no session — redirecting to login");
                AccessDecision::RedirectToLogin
            }
            Err(e) => {
                warn!("session resolution failed: {e} — treating visitor as unauthenticated");
                AccessDecision::RedirectToLogin
            }
        }
    }

    /// Secondary, best-effort role elevation keyed by the authenticated
    /// identity. "No record found" is the normal non-admin outcome; any other
    /// failure is logged and elevation is denied — admin must never default
    /// to true on ambiguous failure.
    async fn resolve_admin(&self, user_id: &Uuid) -> bool {
        match self.identity.admin_record(user_id).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(%user_id, "admin lookup failed: {e} — denying elevation");
                false
            }
        }
    }

    /// Subscribe to future auth transitions (login, logout, token refresh).
    /// The caller owns the handle and must `release()` it on teardown.
    pub fn watch(&self) -> AuthWatcher {
        self.identity.subscribe()
    }
}
