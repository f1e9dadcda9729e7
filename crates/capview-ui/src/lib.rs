//! capview-ui: Dialog machinery for capture-handling dialogs
//!
//! This crate provides the lifecycle layer every tap dialog is built on:
//! - Hook traits concrete dialogs implement ([`CaptureDialog`], [`Alerts`])
//! - The deferred self-destruction state machine ([`DialogLifecycle`]) and
//!   its RAII retap scope guard ([`RetapScope`])

pub mod dialog;
pub mod traits;

pub use dialog::{CloseOutcome, DialogLifecycle, RetapScope};
pub use traits::{Alerts, CaptureDialog, LogAlerts};
