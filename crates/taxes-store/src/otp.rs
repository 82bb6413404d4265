//! Mobile-number verification: send a code, then check what the user typed.
//!
//! Two steps, `AwaitingMobile` then `AwaitingCode`. The flow finishes when
//! the caller sees [`FlowOutcome::Verified`] or chooses to skip. A failed
//! verify leaves the step where it was so the user can retry or ask for a
//! new code.
//!
//! One pending code per account: a new send overwrites whatever was there.

use std::sync::Arc;

use ring::rand::SystemRandom;
use serde::Serialize;
use taxes_core::otp::check_pending;
use taxes_core::{Clock, Error, MobileNumber, OtpCode, OtpRecord, Result, Session};
use tracing::{info, warn};

use crate::delivery::CodeDelivery;
use crate::profile::{ProfilePatch, ProfileStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum VerificationStep {
    AwaitingMobile,
    AwaitingCode { mobile: MobileNumber },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    Verified,
    Skipped,
}

pub struct OtpFlow {
    profiles: Arc<dyn ProfileStore>,
    delivery: Arc<dyn CodeDelivery>,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
    step: VerificationStep,
    outcome: Option<FlowOutcome>,
}

impl OtpFlow {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        delivery: Arc<dyn CodeDelivery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            delivery,
            clock,
            rng: SystemRandom::new(),
            step: VerificationStep::AwaitingMobile,
            outcome: None,
        }
    }

    pub fn step(&self) -> &VerificationStep {
        &self.step
    }

    pub fn outcome(&self) -> Option<FlowOutcome> {
        self.outcome
    }

    /// Issue a code for `mobile`, store it on the caller's profile and hand
    /// it to the delivery channel. The code itself never comes back.
    pub async fn send(&mut self, session: &Session, mobile: &str) -> Result<()> {
        self.ensure_open()?;
        let mobile = MobileNumber::parse(mobile)
            .inspect_err(|e| warn!(error = %e, "rejected mobile number"))?;

        let code = OtpCode::generate(&self.rng)?;
        let record = OtpRecord::issue(session.user_id(), code, self.clock.now());

        self.profiles
            .update(session, &ProfilePatch::pending_otp(&record, &mobile))
            .await?;
        self.delivery.deliver(&mobile, &record.code).await?;

        info!(
            user_id = session.user_id(),
            mobile = %mobile.masked(),
            expires_at = %record.expires_at,
            "OTP issued"
        );
        self.step = VerificationStep::AwaitingCode { mobile };
        Ok(())
    }

    /// Issue a fresh code to the number already entered.
    pub async fn resend(&mut self, session: &Session) -> Result<()> {
        let VerificationStep::AwaitingCode { mobile } = &self.step else {
            return Err(Error::validation("Enter your mobile number first"));
        };
        let mobile = mobile.as_str().to_string();
        self.send(session, &mobile).await
    }

    /// Check `code` against the profile's pending code. On success the
    /// number is marked verified and the code is cleared.
    pub async fn verify(&mut self, session: &Session, code: &str) -> Result<()> {
        self.ensure_open()?;
        let code = OtpCode::parse(code)?;
        let profile = self.profiles.fetch(session).await?;

        check_pending(
            profile.otp_code.as_deref(),
            profile.otp_expires_at,
            &code,
            self.clock.now(),
        )
        .inspect_err(|e| {
            warn!(user_id = session.user_id(), kind = e.kind(), "OTP rejected");
        })?;

        self.profiles
            .update(session, &ProfilePatch::verified())
            .await?;
        info!(user_id = session.user_id(), "mobile number verified");
        self.outcome = Some(FlowOutcome::Verified);
        Ok(())
    }

    /// Back to number entry. Any code already sent stays valid until it
    /// expires or is replaced.
    pub fn change_number(&mut self) {
        self.step = VerificationStep::AwaitingMobile;
    }

    pub fn skip(&mut self) -> FlowOutcome {
        info!("mobile verification skipped");
        *self.outcome.get_or_insert(FlowOutcome::Skipped)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.outcome {
            Some(_) => Err(Error::validation("Mobile verification already finished")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::OutboxDelivery;
    use crate::profile::MemoryProfileStore;
    use chrono::{Duration, TimeZone, Utc};
    use taxes_core::{Identity, ManualClock};

    struct Harness {
        profiles: Arc<MemoryProfileStore>,
        outbox: Arc<OutboxDelivery>,
        clock: Arc<ManualClock>,
        flow: OtpFlow,
        session: Session,
    }

    fn harness() -> Harness {
        let profiles = Arc::new(MemoryProfileStore::new());
        let outbox = Arc::new(OutboxDelivery::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
        ));
        let flow = OtpFlow::new(profiles.clone(), outbox.clone(), clock.clone());
        let session = Session {
            identity: Identity {
                id: "user-1".into(),
                email: "filer@example.com".into(),
                display_name: None,
            },
            access_token: "token".into(),
            refresh_token: None,
            expires_at: None,
        };
        Harness {
            profiles,
            outbox,
            clock,
            flow,
            session,
        }
    }

    fn mobile() -> MobileNumber {
        MobileNumber::parse("9876543210").unwrap()
    }

    #[tokio::test]
    async fn happy_path() {
        let mut h = harness();
        assert_eq!(h.flow.step(), &VerificationStep::AwaitingMobile);

        h.flow.send(&h.session, "9876543210").await.unwrap();
        assert_eq!(
            h.flow.step(),
            &VerificationStep::AwaitingCode { mobile: mobile() }
        );

        let code = h.outbox.last_code(&mobile()).await.unwrap();
        h.flow.verify(&h.session, code.expose()).await.unwrap();
        assert_eq!(h.flow.outcome(), Some(FlowOutcome::Verified));

        let row = h.profiles.snapshot("user-1").await.unwrap();
        assert!(row.mobile_verified);
        assert_eq!(row.otp_code, None);
        assert_eq!(row.otp_expires_at, None);
        assert_eq!(row.mobile_number.as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn verify_before_send_is_not_found() {
        let mut h = harness();
        let err = h.flow.verify(&h.session, "123456").await.unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[tokio::test]
    async fn expired_code_fails_even_when_it_matches() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        let code = h.outbox.last_code(&mobile()).await.unwrap();

        h.clock.advance(Duration::minutes(10) + Duration::seconds(1));
        let err = h.flow.verify(&h.session, code.expose()).await.unwrap_err();
        assert_eq!(err, Error::Expired);
        assert_eq!(h.flow.outcome(), None);
    }

    #[tokio::test]
    async fn code_valid_right_up_to_expiry() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        let code = h.outbox.last_code(&mobile()).await.unwrap();
        h.clock.advance(Duration::minutes(10));
        h.flow.verify(&h.session, code.expose()).await.unwrap();
    }

    #[tokio::test]
    async fn second_send_invalidates_first_code() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        let first = h.outbox.last_code(&mobile()).await.unwrap();

        // Redraw until the codes differ; equal draws are 1 in 900k.
        let mut second = first.clone();
        while second == first {
            h.flow.resend(&h.session).await.unwrap();
            second = h.outbox.last_code(&mobile()).await.unwrap();
        }

        let err = h.flow.verify(&h.session, first.expose()).await.unwrap_err();
        assert_eq!(err, Error::Mismatch);
        h.flow.verify(&h.session, second.expose()).await.unwrap();
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        let code = h.outbox.last_code(&mobile()).await.unwrap();
        h.flow.verify(&h.session, code.expose()).await.unwrap();

        // A fresh flow for the same account cannot replay the burned code.
        let mut again = OtpFlow::new(h.profiles.clone(), h.outbox.clone(), h.clock.clone());
        let err = again.verify(&h.session, code.expose()).await.unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[tokio::test]
    async fn mismatch_keeps_step_for_retry() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        let code = h.outbox.last_code(&mobile()).await.unwrap();
        let wrong = if code.expose() == "111111" { "222222" } else { "111111" };

        assert_eq!(
            h.flow.verify(&h.session, wrong).await.unwrap_err(),
            Error::Mismatch
        );
        assert!(matches!(h.flow.step(), VerificationStep::AwaitingCode { .. }));
        h.flow.verify(&h.session, code.expose()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_input_is_validation() {
        let mut h = harness();
        assert!(matches!(
            h.flow.send(&h.session, "12345").await,
            Err(Error::Validation(_))
        ));
        assert_eq!(h.flow.step(), &VerificationStep::AwaitingMobile);
        assert!(matches!(
            h.flow.verify(&h.session, "12ab56").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            h.flow.resend(&h.session).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn change_number_and_skip() {
        let mut h = harness();
        h.flow.send(&h.session, "9876543210").await.unwrap();
        h.flow.change_number();
        assert_eq!(h.flow.step(), &VerificationStep::AwaitingMobile);

        assert_eq!(h.flow.skip(), FlowOutcome::Skipped);
        assert!(matches!(
            h.flow.send(&h.session, "9876543210").await,
            Err(Error::Validation(_))
        ));
    }
}
