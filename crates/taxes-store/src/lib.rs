//! Collaborator seams and in-memory state: profile store, auth session,
//! OTP verification flow and the dashboard's document vault.

pub mod auth;
pub mod delivery;
mod error;
pub mod otp;
pub mod profile;
pub mod vault;

pub use auth::{AuthProvider, MemoryAuthProvider, SessionContext};
pub use delivery::{CodeDelivery, LogDelivery, OutboxDelivery};
pub use error::StoreError;
pub use otp::{FlowOutcome, OtpFlow, VerificationStep};
pub use profile::{MemoryProfileStore, Profile, ProfilePatch, ProfileStore};
pub use vault::DocumentVault;
