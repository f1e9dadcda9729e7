//! Dialog abstraction traits
//!
//! These traits define the surface concrete dialogs implement to work with
//! the lifecycle machinery. Variants implement the hooks they care about;
//! every hook defaults to a no-op.

/// Hooks a capture-handling dialog implements
///
/// [`DialogLifecycle`](crate::dialog::DialogLifecycle) invokes these from
/// its notification transitions. `update_widgets` runs after every
/// file-closing/file-closed notification, never from inside the retap scope
/// markers themselves.
pub trait CaptureDialog {
    /// The capture file is about to close; taps are still valid.
    /// Disconnect anything that reads the file here.
    fn capture_file_closing(&mut self) {}

    /// The capture file is gone. Enable/disable widgets from
    /// [`DialogLifecycle::file_closed`](crate::dialog::DialogLifecycle::file_closed)
    /// in `update_widgets` instead if that is all that is needed.
    fn capture_file_closed(&mut self) {}

    /// Refresh control state from the current lifecycle state
    fn update_widgets(&mut self) {}
}

/// User-visible warning surface
///
/// The lifecycle reports non-fatal problems (a tap listener that failed to
/// register) through this trait rather than committing to a widget toolkit.
pub trait Alerts {
    /// Show a warning to the user
    fn show_warning(&self, title: &str, message: &str);
}

/// Fallback [`Alerts`] sink that routes warnings to the log
///
/// Used when no toolkit-backed sink is wired up, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerts;

impl Alerts for LogAlerts {
    fn show_warning(&self, title: &str, message: &str) {
        log::warn!("{title}: {message}");
    }
}
