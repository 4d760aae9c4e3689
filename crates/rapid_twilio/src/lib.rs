//! Twilio SMS channel for RapidNotify.
//!
//! Attempted only for urgent envelopes, and only when the deployment has
//! SMS enabled.

pub mod service;
pub mod sms;

pub use service::TwilioSmsService;
pub use sms::{TwilioError, TwilioSmsClient};
