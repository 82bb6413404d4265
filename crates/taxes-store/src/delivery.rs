//! Private channels for getting a code to the phone it was issued for.

use std::collections::HashMap;

use async_trait::async_trait;
use taxes_core::{MobileNumber, OtpCode, Result};
use tokio::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, to: &MobileNumber, code: &OtpCode) -> Result<()>;
}

/// Demo channel: writes the code to the log instead of sending an SMS.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn deliver(&self, to: &MobileNumber, code: &OtpCode) -> Result<()> {
        info!(to = %to, code = code.expose(), "demo OTP (no SMS gateway configured)");
        Ok(())
    }
}

/// Keeps the last code sent to each number. Stands in for the handset in tests.
#[derive(Debug, Default)]
pub struct OutboxDelivery {
    sent: Mutex<HashMap<String, OtpCode>>,
}

impl OutboxDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_code(&self, to: &MobileNumber) -> Option<OtpCode> {
        self.sent.lock().await.get(to.as_str()).cloned()
    }
}

#[async_trait]
impl CodeDelivery for OutboxDelivery {
    async fn deliver(&self, to: &MobileNumber, code: &OtpCode) -> Result<()> {
        self.sent
            .lock()
            .await
            .insert(to.as_str().to_string(), code.clone());
        Ok(())
    }
}
