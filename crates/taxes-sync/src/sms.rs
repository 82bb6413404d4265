//! SMS delivery for one-time codes through an HTTP gateway.

use async_trait::async_trait;
use serde::Serialize;
use taxes_core::otp::otp_ttl;
use taxes_core::{MobileNumber, OtpCode};
use taxes_store::CodeDelivery;
use tracing::info;

use crate::SyncError;

#[derive(Serialize)]
struct SmsRequest<'a> {
    to: String,
    message: &'a str,
}

/// Posts `{ "to", "message" }` to a gateway endpoint.
pub struct SmsGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl SmsGateway {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
        }
    }
}

pub fn otp_message(code: &OtpCode) -> String {
    format!(
        "{} is your TaxES verification code. It expires in {} minutes. Do not share it.",
        code.expose(),
        otp_ttl().num_minutes()
    )
}

#[async_trait]
impl CodeDelivery for SmsGateway {
    async fn deliver(&self, to: &MobileNumber, code: &OtpCode) -> taxes_core::Result<()> {
        let message = otp_message(code);
        let body = SmsRequest {
            to: to.e164(),
            message: &message,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(SyncError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        info!(to = %to.masked(), "OTP handed to SMS gateway");
        Ok(())
    }
}
