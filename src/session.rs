use crate::backend::StoreError;
use crate::models::User;
use crate::storage::Storage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Not signed in. Run `sahayak login` first.")]
    SignedOut,
}

/// Identity provider seam. The backend owns the session lifecycle; we only read and react.
pub trait AuthProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError>;
    fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session, StoreError>;
    fn sign_out(&self, session: &Session) -> Result<(), StoreError>;
}

/// Current-user context, passed explicitly to every view that talks to the backend.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn acquire(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn current(&self) -> Result<&Session, SessionError> {
        self.session.as_ref().ok_or(SessionError::SignedOut)
    }

    pub fn user(&self) -> Result<&User, SessionError> {
        self.current().map(|s| &s.user)
    }

    /// Drops the session; every later `current()` fails.
    pub fn invalidate(&mut self) -> Option<Session> {
        self.session.take()
    }
}

/// Route guard: loads the saved session or refuses with a sign-in hint.
pub fn require_session(storage: &Storage) -> Result<SessionContext> {
    let state = storage.load()?;
    match state.session {
        Some(session) => Ok(SessionContext::acquire(session)),
        None => Err(SessionError::SignedOut.into()),
    }
}

pub fn sign_in(
    auth: &dyn AuthProvider,
    storage: &Storage,
    email: &str,
    password: &str,
) -> Result<SessionContext> {
    let session = auth.sign_in(email, password)?;
    info!(user_id = %session.user.id, "signed in");
    let saved = session.clone();
    storage.update(|s| s.session = Some(saved))?;
    Ok(SessionContext::acquire(session))
}

pub fn sign_up(
    auth: &dyn AuthProvider,
    storage: &Storage,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<SessionContext> {
    let session = auth.sign_up(email, password, name)?;
    info!(user_id = %session.user.id, "signed up");
    let saved = session.clone();
    storage.update(|s| s.session = Some(saved))?;
    Ok(SessionContext::acquire(session))
}

/// Signs out remotely, then forgets the local session even if the remote call failed.
pub fn sign_out(
    auth: &dyn AuthProvider,
    storage: &Storage,
    context: &mut SessionContext,
) -> Result<()> {
    let remote = match context.invalidate() {
        Some(session) => auth.sign_out(&session),
        None => Ok(()),
    };
    storage.update(|s| s.session = None)?;
    info!("signed out");
    remote?;
    Ok(())
}
