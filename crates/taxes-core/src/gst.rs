//! GST calculator.
//!
//! Maps an amount, one of the statutory GST slabs and an inclusive/exclusive
//! flag to a [`TaxBreakdown`].
//!
//! # Modes
//!
//! - Exclusive: the amount is the pre-tax base; GST is added on top.
//! - Inclusive: the amount already contains GST; the base is backed out.
//!
//! # Intra-state vs inter-state
//!
//! The same total is shown two ways: split evenly into CGST + SGST for
//! intra-state supply, or as a single IGST line for inter-state supply.
//! Only one of the two applies to a real transaction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

/// Statutory GST slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GstRate {
    Zero,
    Five,
    Twelve,
    Eighteen,
    TwentyEight,
}

impl GstRate {
    pub const ALL: [GstRate; 5] = [
        Self::Zero,
        Self::Five,
        Self::Twelve,
        Self::Eighteen,
        Self::TwentyEight,
    ];

    pub fn percent(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::Five => 5,
            Self::Twelve => 12,
            Self::Eighteen => 18,
            Self::TwentyEight => 28,
        }
    }

    /// Rate applied to each of CGST and SGST.
    pub fn half_percent(self) -> f64 {
        f64::from(self.percent()) / 2.0
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Zero => "Exempt",
            Self::Five => "Essential goods",
            Self::Twelve | Self::Eighteen => "Standard rate",
            Self::TwentyEight => "Luxury items",
        }
    }

    fn fraction(self) -> f64 {
        f64::from(self.percent()) / 100.0
    }
}

impl fmt::Display for GstRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% - {}", self.percent(), self.label())
    }
}

impl TryFrom<u8> for GstRate {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|r| r.percent() == value)
            .ok_or_else(|| Error::validation(format!("unsupported GST rate: {value}%")))
    }
}

impl From<GstRate> for u8 {
    fn from(rate: GstRate) -> u8 {
        rate.percent()
    }
}

impl FromStr for GstRate {
    type Err = Error;

    /// Accepts "18" or "18%".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_suffix('%').unwrap_or(s).trim();
        let value: u8 = digits
            .parse()
            .map_err(|_| Error::validation(format!("unsupported GST rate: {s:?}")))?;
        Self::try_from(value)
    }
}

/// Whether the entered amount already includes GST.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GstMode {
    Inclusive,
    #[default]
    Exclusive,
}

impl FromStr for GstMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(Self::Inclusive),
            "exclusive" => Ok(Self::Exclusive),
            other => Err(Error::validation(format!("unknown GST mode: {other:?}"))),
        }
    }
}

/// Result of a GST calculation. Every field is rounded to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub base_amount: f64,
    pub cgst: f64,
    pub sgst: f64,
    pub igst: f64,
    pub total_gst: f64,
    pub final_amount: f64,
}

/// Compute the tax breakdown for `amount` at `rate`.
pub fn calculate(amount: f64, rate: GstRate, mode: GstMode) -> TaxBreakdown {
    let r = rate.fraction();

    let (base, gst, total) = match mode {
        GstMode::Inclusive => {
            let base = amount / (1.0 + r);
            (base, amount - base, amount)
        }
        GstMode::Exclusive => {
            let gst = amount * r;
            (amount, gst, amount + gst)
        }
    };

    TaxBreakdown {
        base_amount: round2(base),
        cgst: round2(gst / 2.0),
        sgst: round2(gst / 2.0),
        igst: round2(gst),
        total_gst: round2(gst),
        final_amount: round2(total),
    }
}

/// Form-boundary variant of [`calculate`].
///
/// Returns `None` without computing anything when the amount is empty,
/// non-numeric, negative or non-finite, or when the rate is unset or not a
/// supported slab.
pub fn calculate_input(amount: &str, rate: &str, mode: GstMode) -> Option<TaxBreakdown> {
    let amount = amount.trim();
    if amount.is_empty() || rate.trim().is_empty() {
        return None;
    }
    let amount: f64 = amount.parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        debug!(amount, "amount out of range");
        return None;
    }
    let rate: GstRate = rate.parse().ok()?;
    Some(calculate(amount, rate, mode))
}

/// Round half up on the value scaled to paise.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}
