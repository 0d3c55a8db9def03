//! Authentication session.
//!
//! The session is owned by an external auth provider. This crate only reads
//! it and reacts to its changes.

use tokio::sync::watch;
use tracing::info;

/// The current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Whether a user is logged in.
    pub is_authenticated: bool,

    /// Logged-in user, if any.
    pub identity: Option<String>,

    /// Bearer token, if any.
    pub token: Option<String>,
}

impl Session {
    /// Creates an authenticated session.
    #[must_use]
    pub fn authenticated(identity: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            identity: Some(identity.into()),
            token: Some(token.into()),
        }
    }

    /// Creates a logged-out session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns the token if the session is authenticated and the token is
    /// non-empty.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        if !self.is_authenticated {
            return None;
        }
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Supplies the current session and its changes.
pub trait AuthProvider: Send + Sync + 'static {
    /// Returns the current session.
    fn session(&self) -> Session;

    /// Returns a receiver that observes every session change.
    fn changes(&self) -> watch::Receiver<Session>;
}

/// In-process auth provider backed by a watch channel.
///
/// Hosts that own their login flow call [`AuthState::login`] and
/// [`AuthState::logout`]; the supervisor follows along.
#[derive(Debug)]
pub struct AuthState {
    tx: watch::Sender<Session>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    /// Creates a logged-out auth state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session::anonymous());
        Self { tx }
    }

    /// Logs a user in.
    pub fn login(&self, identity: impl Into<String>, token: impl Into<String>) {
        let session = Session::authenticated(identity, token);
        info!(identity = ?session.identity, "Session authenticated");
        self.tx.send_replace(session);
    }

    /// Replaces the token of the current session.
    ///
    /// Does nothing when logged out.
    pub fn renew_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.tx.send_if_modified(|session| {
            if !session.is_authenticated {
                return false;
            }
            session.token = Some(token);
            true
        });
    }

    /// Logs the current user out.
    pub fn logout(&self) {
        info!("Session logged out");
        self.tx.send_replace(Session::anonymous());
    }
}

impl AuthProvider for AuthState {
    fn session(&self) -> Session {
        self.tx.borrow().clone()
    }

    fn changes(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_bearer_token() {
        let session = Session::authenticated("agent@desk", "tok");
        assert_eq!(session.bearer_token(), Some("tok"));
    }

    #[test]
    fn test_session_bearer_token_empty() {
        let session = Session::authenticated("agent@desk", "");
        assert!(session.bearer_token().is_none());
    }

    #[test]
    fn test_session_bearer_token_logged_out() {
        let session = Session {
            is_authenticated: false,
            identity: None,
            token: Some("stale".to_string()),
        };
        assert!(session.bearer_token().is_none());
    }

    #[test]
    fn test_auth_state_login_logout() {
        let auth = AuthState::new();
        assert!(!auth.session().is_authenticated);

        auth.login("agent@desk", "tok");
        assert_eq!(auth.session(), Session::authenticated("agent@desk", "tok"));

        auth.logout();
        assert_eq!(auth.session(), Session::anonymous());
    }

    #[test]
    fn test_auth_state_renew_token() {
        let auth = AuthState::new();

        auth.renew_token("ignored");
        assert!(auth.session().token.is_none());

        auth.login("agent@desk", "old");
        auth.renew_token("new");
        assert_eq!(auth.session().bearer_token(), Some("new"));
    }

    #[tokio::test]
    async fn test_auth_state_changes_observed() {
        let auth = AuthState::new();
        let mut changes = auth.changes();

        auth.login("agent@desk", "tok");
        changes.changed().await.expect("changed");
        assert!(changes.borrow_and_update().is_authenticated);
    }
}
