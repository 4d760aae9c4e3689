//! Multi-channel notification core for RapidNotify.
//!
//! This crate owns the notification domain end to end: runtime capability
//! classification, the permission and token recovery flow, token and
//! preference storage, multi-channel dispatch (presence, push, email, SMS),
//! persisted history, task-event adaptation, and a diagnostics walk. It
//! talks to storage only through [`rapid_store::DocumentStore`] and to the
//! delivery providers only through the channel traits in `rapid_common`, so
//! every piece is testable against in-memory doubles.

pub mod capability;
pub mod diagnostics;
pub mod dispatch;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod history;
pub mod models;
pub mod permission;
pub mod presence;
pub mod registry;
pub mod routes;
pub mod tasks;

pub use capability::{classify_environment, Capability, ClientRuntime, PushSupport};
pub use dispatch::MultiChannelDispatcher;
pub use error::NotifyError;
pub use history::NotificationHistory;
pub use permission::{EnableOutcome, PermissionOrchestrator, PermissionState, PushPlatform};
pub use presence::PresenceTracker;
pub use registry::TokenRegistry;
pub use tasks::TaskEventNotifier;
