//! HTTP client for the hosted backend: GoTrue-style auth under `/auth/v1`
//! and PostgREST tables under `/rest/v1`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use taxes_core::{Error, ExternalProvider, Identity, ProviderHandoff, Session};
use taxes_store::{AuthProvider, Profile, ProfilePatch, ProfileStore};
use tracing::{debug, info};

const PROFILE_COLUMNS: &str = "id,mobile_number,mobile_verified,otp_code,otp_expires_at";

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("no profile row for {0}")]
    MissingRow(String),
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Server { status: 401, .. } => Error::Unauthenticated,
            SyncError::Server { message, .. } => Error::Remote(message),
            other => Error::Remote(other.to_string()),
        }
    }
}

/// Client for one backend project.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<UserBody> for Identity {
    fn from(u: UserBody) -> Self {
        let display_name = u
            .user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        Identity {
            id: u.id,
            email: u.email.unwrap_or_default(),
            display_name,
        }
    }
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserBody,
}

impl TokenBody {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        Session {
            identity: self.user.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|s| now + Duration::seconds(s)),
        }
    }
}

/// Best human-readable message in an error body; the backends disagree on the key.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Sign-up answers with a session when auto-confirm is on, or with the bare
/// user when an e-mail confirmation is pending.
fn parse_sign_up(body: Value, now: DateTime<Utc>) -> Result<Option<Session>, SyncError> {
    if body.get("access_token").is_some() {
        let token: TokenBody = serde_json::from_value(body)?;
        Ok(Some(token.into_session(now)))
    } else {
        Ok(None)
    }
}

impl BackendClient {
    /// `base_url` like `https://xyz.supabase.co` (trailing slash tolerated).
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn profile_url(&self, user_id: &str) -> String {
        self.url(&format!("/rest/v1/profiles?id=eq.{user_id}"))
    }

    fn authorize_url(
        &self,
        provider: ExternalProvider,
        redirect_to: &str,
    ) -> Result<String, SyncError> {
        let url = Url::parse_with_params(
            &self.url("/auth/v1/authorize"),
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|e| SyncError::Url(e.to_string()))?;
        Ok(url.into())
    }

    fn anon(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
    }

    fn authed(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        self.anon(req).bearer_auth(&session.access_token)
    }

    /// Send and turn non-2xx into [`SyncError::Server`].
    async fn send(req: RequestBuilder) -> Result<reqwest::Response, SyncError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(resp)
    }

    async fn token_grant(&self, grant: &str, body: Value) -> Result<Session, SyncError> {
        let url = self.url(&format!("/auth/v1/token?grant_type={grant}"));
        let resp = Self::send(self.anon(self.client.post(&url)).json(&body)).await?;
        let token: TokenBody = resp.json().await?;
        Ok(token.into_session(Utc::now()))
    }
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> taxes_core::Result<Option<Session>> {
        let url = self.url("/auth/v1/signup");
        info!(url = %url, "signing up");
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": display_name },
        });
        let resp = Self::send(self.anon(self.client.post(&url)).json(&body)).await?;
        let value: Value = resp.json().await.map_err(SyncError::from)?;
        Ok(parse_sign_up(value, Utc::now())?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> taxes_core::Result<Session> {
        info!(base = %self.base_url, "password sign-in");
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        Ok(session)
    }

    async fn sign_in_with_provider(
        &self,
        provider: ExternalProvider,
        redirect_to: &str,
    ) -> taxes_core::Result<ProviderHandoff> {
        Ok(ProviderHandoff {
            provider,
            authorize_url: self.authorize_url(provider, redirect_to)?,
        })
    }

    async fn sign_out(&self, session: &Session) -> taxes_core::Result<()> {
        let url = self.url("/auth/v1/logout");
        Self::send(self.authed(self.client.post(&url), session)).await?;
        Ok(())
    }

    async fn current_identity(&self, session: &Session) -> taxes_core::Result<Identity> {
        let url = self.url("/auth/v1/user");
        let resp = Self::send(self.authed(self.client.get(&url), session)).await?;
        let user: UserBody = resp.json().await.map_err(SyncError::from)?;
        Ok(user.into())
    }

    async fn refresh(&self, session: &Session) -> taxes_core::Result<Session> {
        let token = session
            .refresh_token
            .as_deref()
            .ok_or(Error::Unauthenticated)?;
        let refreshed = self
            .token_grant("refresh_token", json!({ "refresh_token": token }))
            .await?;
        Ok(refreshed)
    }
}

#[async_trait]
impl ProfileStore for BackendClient {
    async fn fetch(&self, session: &Session) -> taxes_core::Result<Profile> {
        let url = format!(
            "{}&select={PROFILE_COLUMNS}",
            self.profile_url(session.user_id())
        );
        debug!(url = %url, "fetching profile");
        let resp = Self::send(self.authed(self.client.get(&url), session)).await?;
        let rows: Vec<Profile> = resp.json().await.map_err(SyncError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::MissingRow(session.user_id().to_string()))?;
        Ok(row)
    }

    async fn update(&self, session: &Session, patch: &ProfilePatch) -> taxes_core::Result<()> {
        let url = self.profile_url(session.user_id());
        debug!(url = %url, "patching profile");
        let req = self
            .authed(self.client.patch(&url), session)
            .header("Prefer", "return=minimal")
            .json(patch);
        Self::send(req).await?;
        Ok(())
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
