//! Sync layer: the hosted backend's auth and table endpoints over HTTP, and
//! SMS delivery for one-time codes.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod sms;

#[cfg(feature = "http")]
pub use http::{BackendClient, SyncError};
#[cfg(feature = "http")]
pub use sms::SmsGateway;
