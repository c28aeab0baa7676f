//! Session lifecycle controller
//!
//! Exchanges credentials for a session against the auth endpoint and
//! keeps the persisted session file in step: save on login, clear on
//! logout.

use std::sync::Arc;

use thiserror::Error;

use super::{Notice, Notifier};
use crate::crm::{Credentials, LoginResponse};
use crate::gateway::{Gateway, GatewayError};
use crate::session::{Session, SessionError, SessionStore};

/// Controller for login/logout
pub struct AuthController {
    gateway: Gateway,
    sessions: SessionStore,
    notifier: Arc<dyn Notifier>,
}

impl AuthController {
    /// The gateway here is unauthenticated; login is what produces the token
    pub fn new(gateway: Gateway, sessions: SessionStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gateway,
            sessions,
            notifier,
        }
    }

    /// Exchange credentials for a session and persist it
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response: LoginResponse = self.gateway.post("/auth/login/", &credentials).await?;
        let session: Session = response.into();
        self.sessions.save(&session)?;

        self.notifier.notify(Notice::success(format!(
            "Logged in as {}",
            session.user.username
        )));
        Ok(session)
    }

    /// Clear the persisted session
    pub fn logout(&self) -> Result<(), AuthError> {
        self.sessions.clear()?;
        self.notifier.notify(Notice::info("Logged out"));
        Ok(())
    }
}

/// Login/logout failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
