//! Firebase Cloud Messaging integration for RapidNotify
//!
//! This crate provides the push delivery channel, built on the Firebase
//! Cloud Messaging (FCM) HTTP v1 API.
//!
//! # Features
//!
//! - Authentication with Firebase using service account credentials
//! - Sending push notifications to specific devices using FCM tokens
//! - Fan-out across every token registered for an owner, with per-token
//!   failures tolerated
//! - Support for notification payload (title, body, icon) and a custom
//!   data payload for deep-linking

pub mod auth;
pub mod client;
pub mod service;

// Re-export the service implementation for the composition root
pub use client::{FcmClient, FcmError};
pub use service::FcmPushService;
