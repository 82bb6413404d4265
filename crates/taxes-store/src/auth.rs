//! Authentication seam and the explicitly passed session context.
//!
//! There is no process-wide "current user". Whoever needs the signed-in
//! identity is handed a [`SessionContext`], which owns the session from
//! sign-in until sign-out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use taxes_core::auth::{validate_display_name, validate_email, validate_password};
use taxes_core::{Error, ExternalProvider, Identity, ProviderHandoff, Result, Session};
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::StoreError;

/// Backend-as-a-service authentication operations.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register an account. `None` means the backend wants the e-mail
    /// confirmed before it hands out a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_in_with_provider(
        &self,
        provider: ExternalProvider,
        redirect_to: &str,
    ) -> Result<ProviderHandoff>;

    async fn sign_out(&self, session: &Session) -> Result<()>;

    async fn current_identity(&self, session: &Session) -> Result<Identity>;

    async fn refresh(&self, session: &Session) -> Result<Session>;
}

/// Owns the signed-in session for one user interaction surface.
pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    session: Option<Session>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            session: None,
        }
    }

    /// Start-up: adopt a previously saved session if the backend still
    /// recognises it, exchanging the refresh token when the access token
    /// has lapsed. Any failure there starts the context signed out.
    pub async fn acquire(provider: Arc<dyn AuthProvider>, restored: Option<Session>) -> Result<Self> {
        let mut ctx = Self::new(provider);
        let Some(saved) = restored else {
            return Ok(ctx);
        };

        let live = if saved.is_expired(Utc::now()) {
            Err(Error::Unauthenticated)
        } else {
            ctx.provider.current_identity(&saved).await
        };
        match live {
            Ok(identity) => {
                info!(user_id = %identity.id, "restored session");
                ctx.session = Some(Session { identity, ..saved });
            }
            Err(Error::Unauthenticated) if saved.refresh_token.is_some() => {
                match ctx.provider.refresh(&saved).await {
                    Ok(fresh) => {
                        info!(user_id = fresh.user_id(), "saved session refreshed");
                        ctx.session = Some(fresh);
                    }
                    Err(e) => warn!(error = %e, "saved session could not be refreshed, starting signed out"),
                }
            }
            Err(Error::Unauthenticated) => {
                warn!("saved session rejected, starting signed out");
            }
            Err(e) => return Err(e),
        }
        Ok(ctx)
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    /// Guard for signed-in-only operations.
    pub fn require(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::Unauthenticated)
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Option<&Session>> {
        validate_email(email)?;
        validate_password(password)?;
        let name = validate_display_name(display_name)?;

        let session = self
            .provider
            .sign_up(email.trim(), password, &name)
            .await?;
        match session {
            Some(s) => {
                info!(user_id = s.user_id(), "signed up");
                Ok(Some(&*self.session.insert(s)))
            }
            None => {
                info!(email = email.trim(), "signed up, awaiting e-mail confirmation");
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(Error::validation("Please enter your password"));
        }
        let session = self.provider.sign_in(email.trim(), password).await?;
        info!(user_id = session.user_id(), "signed in");
        Ok(&*self.session.insert(session))
    }

    pub async fn sign_in_with_provider(
        &self,
        provider: ExternalProvider,
        redirect_to: &str,
    ) -> Result<ProviderHandoff> {
        self.provider
            .sign_in_with_provider(provider, redirect_to)
            .await
    }

    /// Auth-event hook: take over the tokens an external provider hands
    /// back on its redirect. The identity comes from the backend.
    pub async fn adopt(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<&Session> {
        let mut session = Session {
            identity: Identity {
                id: String::new(),
                email: String::new(),
                display_name: None,
            },
            access_token,
            refresh_token,
            expires_at: None,
        };
        session.identity = self.provider.current_identity(&session).await?;
        info!(user_id = session.user_id(), "session adopted");
        Ok(&*self.session.insert(session))
    }

    /// Exchange the refresh token and re-read the identity.
    pub async fn refresh(&mut self) -> Result<&Session> {
        let current = self.require()?;
        let refreshed = self.provider.refresh(current).await?;
        Ok(&*self.session.insert(refreshed))
    }

    /// Tear down. The local session is dropped even if the backend call fails.
    pub async fn sign_out(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        info!(user_id = session.user_id(), "signing out");
        self.provider.sign_out(&session).await
    }
}

struct Account {
    identity: Identity,
    password: String,
}

/// In-process auth backend. Accounts are confirmed immediately.
pub struct MemoryAuthProvider {
    rng: SystemRandom,
    accounts: Mutex<HashMap<String, Account>>,
    // access token -> user id
    sessions: Mutex<HashMap<String, String>>,
    // refresh token -> user id
    refresh_tokens: Mutex<HashMap<String, String>>,
    session_ttl: Duration,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            accounts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            session_ttl: Duration::hours(1),
        }
    }

    fn token(&self) -> Result<String> {
        let mut buf = [0u8; 16];
        self.rng.fill(&mut buf).map_err(|_| StoreError::Random)?;
        Ok(buf.iter().map(|b| format!("{b:02x}")).collect())
    }

    async fn issue(&self, identity: Identity) -> Result<Session> {
        let access = self.token()?;
        let refresh = self.token()?;
        self.sessions
            .lock()
            .await
            .insert(access.clone(), identity.id.clone());
        self.refresh_tokens
            .lock()
            .await
            .insert(refresh.clone(), identity.id.clone());
        Ok(Session {
            identity,
            access_token: access,
            refresh_token: Some(refresh),
            expires_at: Some(Utc::now() + self.session_ttl),
        })
    }

    async fn identity_by_id(&self, user_id: &str) -> Result<Identity> {
        self.accounts
            .lock()
            .await
            .values()
            .find(|a| a.identity.id == user_id)
            .map(|a| a.identity.clone())
            .ok_or_else(|| StoreError::UnknownAccount(user_id.to_string()).into())
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Option<Session>> {
        let key = email.to_ascii_lowercase();
        let identity = {
            let mut accounts = self.accounts.lock().await;
            if accounts.contains_key(&key) {
                return Err(StoreError::AlreadyRegistered.into());
            }
            let identity = Identity {
                id: format!("user-{}", self.token()?),
                email: email.to_string(),
                display_name: Some(display_name.to_string()),
            };
            accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password: password.to_string(),
                },
            );
            identity
        };
        self.issue(identity).await.map(Some)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let identity = {
            let accounts = self.accounts.lock().await;
            match accounts.get(&email.to_ascii_lowercase()) {
                Some(a) if a.password == password => a.identity.clone(),
                _ => return Err(StoreError::InvalidCredentials.into()),
            }
        };
        self.issue(identity).await
    }

    async fn sign_in_with_provider(
        &self,
        provider: ExternalProvider,
        redirect_to: &str,
    ) -> Result<ProviderHandoff> {
        let url = Url::parse_with_params(
            "memory://authorize",
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(ProviderHandoff {
            provider,
            authorize_url: url.into(),
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.sessions.lock().await.remove(&session.access_token);
        if let Some(refresh) = &session.refresh_token {
            self.refresh_tokens.lock().await.remove(refresh);
        }
        Ok(())
    }

    async fn current_identity(&self, session: &Session) -> Result<Identity> {
        let user_id = self
            .sessions
            .lock()
            .await
            .get(&session.access_token)
            .cloned()
            .ok_or(StoreError::UnknownSession)?;
        self.identity_by_id(&user_id).await
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let refresh = session
            .refresh_token
            .as_deref()
            .ok_or(StoreError::UnknownSession)?;
        let user_id = self
            .refresh_tokens
            .lock()
            .await
            .remove(refresh)
            .ok_or(StoreError::UnknownSession)?;
        self.sessions.lock().await.remove(&session.access_token);
        let identity = self.identity_by_id(&user_id).await?;
        self.issue(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SessionContext {
        SessionContext::new(Arc::new(MemoryAuthProvider::new()))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let mut ctx = ctx();
        let s = ctx
            .sign_up("asha@example.com", "hunter22", " Asha ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s.identity.display_name.as_deref(), Some("Asha"));
        let id = s.identity.id.clone();

        ctx.sign_out().await.unwrap();
        assert!(ctx.current().is_none());
        assert_eq!(ctx.require().unwrap_err(), Error::Unauthenticated);

        let s = ctx.sign_in("ASHA@example.com", "hunter22").await.unwrap();
        assert_eq!(s.identity.id, id);
    }

    #[tokio::test]
    async fn validation_happens_before_the_provider() {
        let mut ctx = ctx();
        assert!(matches!(
            ctx.sign_up("not-an-email", "hunter22", "A").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ctx.sign_up("a@b.in", "123", "A").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ctx.sign_up("a@b.in", "hunter22", "  ").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_a_remote_error() {
        let mut ctx = ctx();
        ctx.sign_up("a@b.in", "hunter22", "A").await.unwrap();
        let err = ctx.sign_in("a@b.in", "wrong-pass").await.unwrap_err();
        assert_eq!(err, Error::Remote("Invalid login credentials".into()));
    }

    #[tokio::test]
    async fn duplicate_sign_up_rejected() {
        let mut ctx = ctx();
        ctx.sign_up("a@b.in", "hunter22", "A").await.unwrap();
        let err = ctx.sign_up("a@b.in", "hunter22", "A").await.unwrap_err();
        assert_eq!(err, Error::Remote("User already registered".into()));
    }

    #[tokio::test]
    async fn acquire_restores_live_session_and_drops_dead_one() {
        let provider: Arc<dyn AuthProvider> = Arc::new(MemoryAuthProvider::new());
        let mut first = SessionContext::new(provider.clone());
        let saved = first
            .sign_up("a@b.in", "hunter22", "A")
            .await
            .unwrap()
            .unwrap()
            .clone();

        let restored = SessionContext::acquire(provider.clone(), Some(saved.clone()))
            .await
            .unwrap();
        assert_eq!(restored.identity().unwrap().email, "a@b.in");

        first.sign_out().await.unwrap();
        let after = SessionContext::acquire(provider, Some(saved)).await.unwrap();
        assert!(after.current().is_none());
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let mut ctx = ctx();
        let before = ctx
            .sign_up("a@b.in", "hunter22", "A")
            .await
            .unwrap()
            .unwrap()
            .clone();
        let after = ctx.refresh().await.unwrap().clone();
        assert_ne!(before.access_token, after.access_token);
        assert_eq!(before.identity, after.identity);
    }

    #[tokio::test]
    async fn external_provider_handoff() {
        let ctx = ctx();
        let handoff = ctx
            .sign_in_with_provider(ExternalProvider::Google, "http://localhost/dashboard?tab=docs")
            .await
            .unwrap();
        assert_eq!(
            handoff.authorize_url,
            "memory://authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%2Fdashboard%3Ftab%3Ddocs"
        );
    }

    async fn saved_session(provider: &Arc<dyn AuthProvider>) -> Session {
        let mut ctx = SessionContext::new(provider.clone());
        ctx.sign_up("a@b.in", "hunter22", "A")
            .await
            .unwrap()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn acquire_refreshes_lapsed_session() {
        let provider: Arc<dyn AuthProvider> = Arc::new(MemoryAuthProvider::new());
        let saved = saved_session(&provider).await;
        let lapsed = Session {
            expires_at: Some(Utc::now() - Duration::minutes(1)),
            ..saved.clone()
        };

        let ctx = SessionContext::acquire(provider, Some(lapsed)).await.unwrap();
        let fresh = ctx.current().unwrap();
        assert_ne!(fresh.access_token, saved.access_token);
        assert_ne!(fresh.refresh_token, saved.refresh_token);
        assert_eq!(fresh.identity, saved.identity);
    }

    #[tokio::test]
    async fn acquire_refreshes_when_access_token_rejected() {
        let provider: Arc<dyn AuthProvider> = Arc::new(MemoryAuthProvider::new());
        let saved = saved_session(&provider).await;
        let stale = Session {
            access_token: "stale".into(),
            ..saved.clone()
        };

        let ctx = SessionContext::acquire(provider.clone(), Some(stale.clone()))
            .await
            .unwrap();
        assert_eq!(ctx.identity(), Some(&saved.identity));

        // The refresh token was spent above, so a second restore has nothing left.
        let again = SessionContext::acquire(provider, Some(stale)).await.unwrap();
        assert!(again.current().is_none());
    }

    #[tokio::test]
    async fn adopt_takes_over_redirect_tokens() {
        let provider: Arc<dyn AuthProvider> = Arc::new(MemoryAuthProvider::new());
        let saved = saved_session(&provider).await;

        let mut ctx = SessionContext::new(provider);
        let adopted = ctx
            .adopt(saved.access_token.clone(), saved.refresh_token.clone())
            .await
            .unwrap();
        assert_eq!(adopted.identity, saved.identity);

        let err = ctx.adopt("bogus".into(), None).await.unwrap_err();
        assert_eq!(err, Error::Unauthenticated);
        // The earlier session survives a failed adopt.
        assert_eq!(ctx.identity(), Some(&saved.identity));
    }
}
