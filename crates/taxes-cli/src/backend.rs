//! Collaborator wiring: hosted backend when a URL is configured, in-memory
//! stand-ins otherwise.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use taxes_core::{Error, Session};
use taxes_store::{
    AuthProvider, CodeDelivery, LogDelivery, MemoryAuthProvider, MemoryProfileStore,
    ProfileStore, SessionContext,
};
use taxes_sync::{BackendClient, SmsGateway};
use tracing::{info, warn};

use crate::cli::{BackendArgs, Credentials};

const DEMO_EMAIL: &str = "demo@taxes.local";
const DEMO_PASSWORD: &str = "demo-password";
const DEMO_NAME: &str = "Demo Filer";

pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub delivery: Arc<dyn CodeDelivery>,
    pub demo: bool,
}

impl Backend {
    pub fn connect(args: &BackendArgs) -> anyhow::Result<Self> {
        let Some(url) = &args.backend_url else {
            info!("no backend configured, running in demo mode");
            return Ok(Self {
                auth: Arc::new(MemoryAuthProvider::new()),
                profiles: Arc::new(MemoryProfileStore::new()),
                delivery: Arc::new(LogDelivery),
                demo: true,
            });
        };
        let anon_key = args
            .anon_key
            .clone()
            .context("TAXES_ANON_KEY is required when a backend URL is set")?;

        let client = Arc::new(BackendClient::new(url.clone(), anon_key));
        let delivery: Arc<dyn CodeDelivery> = match &args.sms_gateway {
            Some(gateway) => Arc::new(SmsGateway::new(gateway.clone(), args.sms_key.clone())),
            None => {
                warn!("no SMS gateway configured, OTP codes go to the log");
                Arc::new(LogDelivery)
            }
        };
        info!(url = %url, "using hosted backend");
        Ok(Self {
            auth: client.clone(),
            profiles: client,
            delivery,
            demo: false,
        })
    }

    /// A signed-in context: the saved session if the backend still accepts
    /// it (refreshed if need be), else a fresh sign-in. Demo mode signs up a
    /// throwaway account. The resulting session is written back to
    /// `session_file` so rotated tokens survive the run.
    pub async fn signed_in(
        &self,
        creds: &Credentials,
        session_file: Option<&Path>,
    ) -> anyhow::Result<SessionContext> {
        let restored = match session_file {
            Some(path) => load_session(path)?,
            None => None,
        };
        let mut ctx = SessionContext::acquire(self.auth.clone(), restored).await?;
        if ctx.current().is_none() {
            match (&creds.email, &creds.password) {
                (Some(email), Some(password)) if !self.demo => {
                    ctx.sign_in(email, password).await?;
                }
                (Some(email), Some(password)) => {
                    ctx.sign_up(email, password, DEMO_NAME).await?;
                }
                _ if self.demo => {
                    ctx.sign_up(DEMO_EMAIL, DEMO_PASSWORD, DEMO_NAME).await?;
                }
                _ => bail!(Error::Unauthenticated),
            }
        }

        if let Some(path) = session_file {
            save_session(path, ctx.require()?)?;
        }
        Ok(ctx)
    }
}

pub fn load_session(path: &Path) -> anyhow::Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading session file {}", path.display()))?;
    let session = serde_json::from_str(&raw)
        .with_context(|| format!("parsing session file {}", path.display()))?;
    Ok(Some(session))
}

pub fn save_session(path: &Path, session: &Session) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(session)?;
    std::fs::write(path, raw).with_context(|| format!("writing session file {}", path.display()))
}

pub fn forget_session(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing session file {}", path.display())),
    }
}
