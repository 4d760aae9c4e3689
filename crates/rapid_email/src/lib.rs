//! Transactional email channel for RapidNotify.
//!
//! Email is the universal fallback: the dispatcher attempts it on every
//! send regardless of how push or SMS fared, so the notification always
//! reaches the customer somewhere.

pub mod client;
pub mod service;

pub use client::{EmailClient, EmailError};
pub use service::HttpEmailService;
