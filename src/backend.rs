//! Client for the managed backend: row storage under `/rest/v1` and auth under `/auth/v1`.
//!
//! Every call is a single blocking request. Nothing is retried; failures are
//! returned to the caller, which decides how to surface them.

use crate::config::Config;
use crate::models::{Activity, NewActivity, User};
use crate::session::{AuthProvider, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const ACTIVITIES_PATH: &str = "/rest/v1/activities";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account created. Confirm your email address ({0}), then run `sahayak login`.")]
    ConfirmationPending(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if err.is_timeout() {
            StoreError::Network(format!("request timed out: {}", err))
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending by `start_time`.
    Ascending,
    Unordered,
}

/// Remote activity table, filtered to the signed-in user.
pub trait ActivityStore: Send + Sync {
    fn insert(&self, session: &Session, activity: &NewActivity) -> Result<(), StoreError>;

    /// Activities whose `start_time` lies in `[from, to]`.
    fn activities_between(
        &self,
        session: &Session,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        order: Order,
    ) -> Result<Vec<Activity>, StoreError>;
}

pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        config.ensure_backend()?;
        let client = Client::builder()
            .timeout(config.request_timeout()?)
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    fn send(&self, what: &str, builder: RequestBuilder) -> Result<Response, StoreError> {
        debug!(request = what, "sending backend request");
        let response = builder.send().map_err(|e| {
            warn!(request = what, error = %e, "backend request failed");
            StoreError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let err = map_status_error(status, &body);
        warn!(request = what, status = status.as_u16(), error = %err, "backend rejected request");
        Err(err)
    }

    fn session_from_auth(&self, body: AuthResponse) -> Result<Session, StoreError> {
        if let (Some(access_token), Some(user)) = (body.access_token, body.user) {
            return Ok(Session {
                access_token,
                refresh_token: body.refresh_token,
                user: user.into(),
            });
        }
        if body.id.is_some() {
            let email = body.email.unwrap_or_default();
            return Err(StoreError::ConfirmationPending(email));
        }
        Err(StoreError::Decode("auth response carried no session".to_string()))
    }
}

impl ActivityStore for RestBackend {
    fn insert(&self, session: &Session, activity: &NewActivity) -> Result<(), StoreError> {
        let builder = self
            .authorized(self.client.post(self.url(ACTIVITIES_PATH)), &session.access_token)
            .header("Prefer", "return=minimal")
            .json(&[activity]);
        self.send("insert activity", builder)?;
        Ok(())
    }

    fn activities_between(
        &self,
        session: &Session,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        order: Order,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", session.user.id)),
            ("start_time", format!("gte.{}", timestamp(from))),
            ("start_time", format!("lte.{}", timestamp(to))),
        ];
        if order == Order::Ascending {
            query.push(("order", "start_time.asc".to_string()));
        }

        let builder = self
            .authorized(self.client.get(self.url(ACTIVITIES_PATH)), &session.access_token)
            .query(&query);
        let activities: Vec<Activity> = self.send("query activities", builder)?.json()?;
        debug!(count = activities.len(), "fetched activities");
        Ok(activities)
    }
}

impl AuthProvider for RestBackend {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let builder = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }));
        let body: AuthResponse = self.send("sign in", builder)?.json()?;
        self.session_from_auth(body)
    }

    fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<Session, StoreError> {
        let builder = self
            .client
            .post(self.url("/auth/v1/signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            }));
        let body: AuthResponse = self.send("sign up", builder)?.json()?;
        self.session_from_auth(body)
    }

    fn sign_out(&self, session: &Session) -> Result<(), StoreError> {
        let builder =
            self.authorized(self.client.post(self.url("/auth/v1/logout")), &session.access_token);
        self.send("sign out", builder)?;
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn map_status_error(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.msg).or(b.error_description))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
    /// Present when signup returns the bare user awaiting email confirmation.
    id: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Deserialize, Default)]
struct UserMetadata {
    name: Option<String>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        User {
            id: user.id,
            email: user.email,
            name: user.user_metadata.name,
        }
    }
}
