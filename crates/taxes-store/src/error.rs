use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no account for {0}")]
    UnknownAccount(String),

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("session token not recognised")]
    UnknownSession,

    #[error("random source unavailable")]
    Random,
}

impl From<StoreError> for taxes_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownSession => Self::Unauthenticated,
            StoreError::Random => Self::Internal(err.to_string()),
            other => Self::Remote(other.to_string()),
        }
    }
}
