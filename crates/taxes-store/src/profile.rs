//! The remote profile row and the store seam that reads and patches it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxes_core::{MobileNumber, OtpRecord, Result, Session};
use tokio::sync::Mutex;
use tracing::debug;

/// Columns of the `profiles` row this crate reads or writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub mobile_verified: bool,
    #[serde(default)]
    pub otp_code: Option<String>,
    #[serde(default)]
    pub otp_expires_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.mobile_number {
            self.mobile_number = Some(v.clone());
        }
        if let Some(v) = patch.mobile_verified {
            self.mobile_verified = v;
        }
        if let Some(v) = &patch.otp_code {
            self.otp_code = v.clone();
        }
        if let Some(v) = patch.otp_expires_at {
            self.otp_expires_at = v;
        }
    }
}

/// Partial update. `None` leaves a column alone; `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_expires_at: Option<Option<DateTime<Utc>>>,
}

impl ProfilePatch {
    /// Store a freshly issued code, replacing any earlier one.
    pub fn pending_otp(record: &OtpRecord, mobile: &MobileNumber) -> Self {
        Self {
            mobile_number: Some(mobile.as_str().to_string()),
            otp_code: Some(Some(record.code.expose().to_string())),
            otp_expires_at: Some(Some(record.expires_at)),
            ..Default::default()
        }
    }

    /// Mark the number verified and burn the code.
    pub fn verified() -> Self {
        Self {
            mobile_verified: Some(true),
            otp_code: Some(None),
            otp_expires_at: Some(None),
            ..Default::default()
        }
    }
}

/// Read/update access to the signed-in user's profile row.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, session: &Session) -> Result<Profile>;

    async fn update(&self, session: &Session, patch: &ProfilePatch) -> Result<()>;
}

/// Process-local profile table. Rows appear on first touch, the way the
/// hosted backend provisions one per account at sign-up.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    rows: Mutex<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, user_id: &str) -> Option<Profile> {
        self.rows.lock().await.get(user_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(&self, session: &Session) -> Result<Profile> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .entry(session.user_id().to_string())
            .or_insert_with(|| Profile::new(session.user_id()));
        Ok(row.clone())
    }

    async fn update(&self, session: &Session, patch: &ProfilePatch) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.entry(session.user_id().to_string())
            .or_insert_with(|| Profile::new(session.user_id()))
            .apply(patch);
        debug!(user_id = session.user_id(), "profile patched");
        Ok(())
    }
}
