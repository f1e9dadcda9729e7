//! capview-core: Capture file and tap plumbing
//!
//! This crate provides the data layer the dialog machinery sits on:
//! - Capture records and the display-filter language
//! - The capture file source and its open/closing/closed notifications
//! - The tap registry (named analyses with reset/packet/draw listeners)

pub mod capture;
pub mod filter;
pub mod record;
pub mod tap;

pub use capture::{CaptureEvent, CaptureFile, CaptureFileSource, ObserverId};
pub use filter::{DisplayFilter, FilterError};
pub use record::Record;
pub use tap::{TapCallbacks, TapError, TapFlags, TapHandle, TapRegistry};
