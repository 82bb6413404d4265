//! One-time password values and the pending-code check.
//!
//! The remote profile row owns the pending code; this module only knows how
//! to mint a code, how long it lives, and how to judge a candidate against
//! what was stored.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MOBILE_DIGITS: usize = 10;
pub const OTP_DIGITS: usize = 6;
pub const COUNTRY_PREFIX: &str = "+91";

const CODE_MIN: u32 = 100_000;
const CODE_SPAN: u32 = 900_000;

/// Validity window of an issued code.
pub fn otp_ttl() -> Duration {
    Duration::minutes(10)
}

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Ten-digit Indian mobile number, without the country prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MobileNumber(String);

impl MobileNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if !all_digits(raw, MOBILE_DIGITS) {
            return Err(Error::validation(
                "Please enter a valid 10-digit mobile number",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `+91XXXXXXXXXX`, as an SMS gateway expects it.
    pub fn e164(&self) -> String {
        format!("{COUNTRY_PREFIX}{}", self.0)
    }

    /// Last four digits only, for logs.
    pub fn masked(&self) -> String {
        format!("******{}", &self.0[MOBILE_DIGITS - 4..])
    }
}

impl fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{COUNTRY_PREFIX} {}", self.0)
    }
}

impl TryFrom<String> for MobileNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MobileNumber> for String {
    fn from(value: MobileNumber) -> String {
        value.0
    }
}

/// Six-digit numeric code.
///
/// No `Display`; the only ways out are [`OtpCode::expose`]
/// and serialisation into the profile row.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if !all_digits(raw, OTP_DIGITS) {
            return Err(Error::validation("Please enter the 6-digit code"));
        }
        Ok(Self(raw.to_string()))
    }

    /// Draw a code uniformly from 100000..=999999.
    ///
    /// Rejection sampling over `u32` keeps the distribution flat.
    pub fn generate(rng: &dyn SecureRandom) -> Result<Self> {
        let zone = u32::MAX - (u32::MAX % CODE_SPAN);
        loop {
            let mut buf = [0u8; 4];
            rng.fill(&mut buf)
                .map_err(|_| Error::Internal("system random source unavailable".into()))?;
            let v = u32::from_le_bytes(buf);
            if v < zone {
                return Ok(Self((CODE_MIN + v % CODE_SPAN).to_string()));
            }
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

impl TryFrom<String> for OtpCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(value: OtpCode) -> String {
        value.0
    }
}

/// A freshly issued code, as written to the caller's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: OtpCode,
    pub expires_at: DateTime<Utc>,
    pub owner_id: String,
}

impl OtpRecord {
    pub fn issue(owner_id: impl Into<String>, code: OtpCode, now: DateTime<Utc>) -> Self {
        Self {
            code,
            expires_at: now + otp_ttl(),
            owner_id: owner_id.into(),
        }
    }
}

/// Judge `candidate` against the code stored on the profile.
///
/// A stored code without an expiry counts as expired.
pub fn check_pending(
    stored_code: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    candidate: &OtpCode,
    now: DateTime<Utc>,
) -> Result<()> {
    let stored = match stored_code {
        Some(code) if !code.is_empty() => code,
        _ => return Err(Error::NotFound),
    };
    match expires_at {
        Some(at) if now <= at => {}
        _ => return Err(Error::Expired),
    }
    if stored != candidate.expose() {
        return Err(Error::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ring::rand::SystemRandom;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn mobile_requires_ten_digits() {
        assert!(MobileNumber::parse("9876543210").is_ok());
        assert!(MobileNumber::parse(" 9876543210 ").is_ok());
        assert!(MobileNumber::parse("987654321").is_err());
        assert!(MobileNumber::parse("98765432100").is_err());
        assert!(MobileNumber::parse("98765-4321").is_err());
        assert!(MobileNumber::parse("").is_err());
    }

    #[test]
    fn mobile_formats() {
        let m = MobileNumber::parse("9876543210").unwrap();
        assert_eq!(m.to_string(), "+91 9876543210");
        assert_eq!(m.e164(), "+919876543210");
        assert_eq!(m.masked(), "******3210");
    }

    #[test]
    fn code_requires_six_digits() {
        assert!(OtpCode::parse("012345").is_ok());
        assert!(OtpCode::parse("12345").is_err());
        assert!(OtpCode::parse("1234567").is_err());
        assert!(OtpCode::parse("12a456").is_err());
    }

    #[test]
    fn code_debug_is_redacted() {
        let code = OtpCode::parse("123456").unwrap();
        assert!(!format!("{code:?}").contains("123456"));
    }

    #[test]
    fn generated_codes_are_in_range() {
        let rng = SystemRandom::new();
        for _ in 0..1_000 {
            let code = OtpCode::generate(&rng).unwrap();
            let n: u32 = code.expose().parse().unwrap();
            assert!((100_000..=999_999).contains(&n), "{n}");
            assert_eq!(code.expose().len(), OTP_DIGITS);
        }
    }

    #[test]
    fn issue_sets_ten_minute_expiry() {
        let rec = OtpRecord::issue("user-1", OtpCode::parse("654321").unwrap(), t0());
        assert_eq!(rec.expires_at - t0(), Duration::minutes(10));
        assert_eq!(rec.owner_id, "user-1");
    }

    #[test]
    fn check_order_not_found_expired_mismatch() {
        let good = OtpCode::parse("111111").unwrap();
        let bad = OtpCode::parse("222222").unwrap();
        let exp = Some(t0() + otp_ttl());

        assert_eq!(check_pending(None, exp, &good, t0()), Err(Error::NotFound));
        assert_eq!(check_pending(Some(""), exp, &good, t0()), Err(Error::NotFound));
        assert_eq!(
            check_pending(Some("111111"), exp, &good, t0() + Duration::minutes(11)),
            Err(Error::Expired)
        );
        assert_eq!(
            check_pending(Some("111111"), None, &good, t0()),
            Err(Error::Expired)
        );
        assert_eq!(
            check_pending(Some("111111"), exp, &bad, t0()),
            Err(Error::Mismatch)
        );
        assert_eq!(check_pending(Some("111111"), exp, &good, t0()), Ok(()));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let code = OtpCode::parse("111111").unwrap();
        let at = t0() + otp_ttl();
        assert_eq!(check_pending(Some("111111"), Some(at), &code, at), Ok(()));
        assert_eq!(
            check_pending(Some("111111"), Some(at), &code, at + Duration::milliseconds(1)),
            Err(Error::Expired)
        );
    }
}
