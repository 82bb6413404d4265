use thiserror::Error;

/// Errors surfaced at the interaction boundary.
///
/// None of these are fatal: callers show the message and let the user retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed input: wrong digit count, wrong file type or size, bad credentials shape.
    #[error("{0}")]
    Validation(String),

    #[error("No OTP found. Please request a new one.")]
    NotFound,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    #[error("Invalid OTP. Please try again.")]
    Mismatch,

    #[error("You must be signed in to do that.")]
    Unauthenticated,

    /// The backing store or auth service itself failed.
    #[error("remote failure: {0}")]
    Remote(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn remote(msg: impl std::fmt::Display) -> Self {
        Self::Remote(msg.to_string())
    }

    /// Stable machine-readable kind, used in `--json` output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Mismatch => "mismatch",
            Self::Unauthenticated => "unauthenticated",
            Self::Remote(_) => "remote_failure",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
