pub mod auth;
pub mod clock;
pub mod document;
mod error;
pub mod gst;
pub mod otp;
pub mod pan;

pub use auth::{ExternalProvider, Identity, ProviderHandoff, Session};
pub use clock::{Clock, ManualClock, SystemClock};
pub use document::{DocumentCategory, DocumentId, UploadedDocument};
pub use error::{Error, Result};
pub use gst::{GstMode, GstRate, TaxBreakdown};
pub use otp::{MobileNumber, OtpCode, OtpRecord};
pub use pan::PanDetails;
