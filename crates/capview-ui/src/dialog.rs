//! Dialog lifecycle
//!
//! Capture-handling dialogs must stay alive while a retap is replaying
//! records through their tap listeners, yet go away cleanly once the user
//! has closed them. [`DialogLifecycle`] owns that decision: it tracks the
//! user's close intent, the nesting depth of active retap scopes, and the
//! tap listeners registered on the dialog's behalf, and it runs teardown
//! exactly once, when the dialog is closed and no retap scope remains.
//!
//! Destruction is signalled, not performed: a Rust object cannot free
//! itself, so the owning host drops the dialog widget when [`close`]
//! returns [`CloseOutcome::Destroyed`] or [`is_destroyed`] flips true after
//! a retap scope ends.
//!
//! All of this runs on the one UI event-processing thread. "Concurrency"
//! here is re-entrancy: a tap draw callback may close the dialog while the
//! retap that invoked it is still on the stack. The state machine therefore
//! re-checks its destruction guard at both the close transition and every
//! scope exit, and no internal borrow is ever held across a hook, callback,
//! or collaborator call.
//!
//! [`close`]: DialogLifecycle::close
//! [`is_destroyed`]: DialogLifecycle::is_destroyed

use std::cell::RefCell;
use std::rc::Rc;

use capview_core::capture::{CaptureEvent, CaptureFileSource, ObserverId};
use capview_core::tap::{TapCallbacks, TapFlags, TapHandle, TapRegistry};

use crate::traits::{Alerts, CaptureDialog, LogAlerts};

/// What happened to the dialog when the user closed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// A retap scope is active; the dialog should hide itself and stay
    /// allocated until the scope balances out
    Deferred,
    /// Teardown ran; the host must drop the dialog now
    Destroyed,
}

#[derive(Default)]
struct LifecycleInner {
    subtitle: String,
    closed_by_user: bool,
    file_closed: bool,
    retap_depth: u32,
    torn_down: bool,
    tap_handles: Vec<TapHandle>,
    observer: Option<ObserverId>,
}

/// Lifecycle controller for one capture-handling dialog
///
/// Cheap cloneable handle over shared state, so scope guards and tap
/// callbacks can carry their own reference without borrowing the dialog.
#[derive(Clone)]
pub struct DialogLifecycle {
    source: CaptureFileSource,
    registry: TapRegistry,
    alerts: Rc<dyn Alerts>,
    inner: Rc<RefCell<LifecycleInner>>,
}

impl DialogLifecycle {
    /// Create a lifecycle bound to a capture source and tap registry,
    /// reporting warnings to the log
    pub fn new(source: CaptureFileSource, registry: TapRegistry) -> Self {
        Self::with_alerts(source, registry, Rc::new(LogAlerts))
    }

    /// Create a lifecycle with a toolkit-backed warning sink
    pub fn with_alerts(
        source: CaptureFileSource,
        registry: TapRegistry,
        alerts: Rc<dyn Alerts>,
    ) -> Self {
        Self {
            source,
            registry,
            alerts,
            inner: Rc::new(RefCell::new(LifecycleInner::default())),
        }
    }

    /// Record the observer id the host attached to the capture source on
    /// this dialog's behalf, so teardown can detach it
    pub fn bind_observer(&self, id: ObserverId) {
        self.inner.borrow_mut().observer = Some(id);
    }

    /// The user closed (or accepted, or rejected) the dialog
    ///
    /// The toolkit's own close handling has already run at this point. If no
    /// retap scope is active the dialog is torn down immediately; otherwise
    /// the close is recorded and honored when the last scope ends. The
    /// in-flight retap is not cancelled.
    pub fn close(&self) -> CloseOutcome {
        let destroy_now = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return CloseOutcome::Destroyed;
            }
            inner.closed_by_user = true;
            inner.retap_depth == 0
        };
        if destroy_now {
            self.teardown();
            CloseOutcome::Destroyed
        } else {
            log::debug!("dialog close deferred; retap in progress");
            CloseOutcome::Deferred
        }
    }

    /// Mark the start of a code block that retaps packets
    ///
    /// Re-entrant; scopes nest. Prefer [`RetapScope::enter`], which cannot
    /// leave the scope unbalanced.
    pub fn begin_retap_packets(&self) {
        self.inner.borrow_mut().retap_depth += 1;
    }

    /// Mark the end of a code block that retaps packets
    ///
    /// If the user closed the dialog while scopes were active and this was
    /// the last one, the dialog is torn down here; check
    /// [`is_destroyed`](Self::is_destroyed) afterwards. Calling without a
    /// matching [`begin_retap_packets`](Self::begin_retap_packets) is a
    /// contract violation and panics rather than masking a premature
    /// destruction.
    pub fn end_retap_packets(&self) {
        let destroy_now = {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.retap_depth > 0,
                "end_retap_packets without matching begin_retap_packets"
            );
            inner.retap_depth -= 1;
            inner.retap_depth == 0 && inner.closed_by_user && !inner.torn_down
        };
        if destroy_now {
            self.teardown();
        }
    }

    /// Dispatch a capture source notification to the dialog's hooks
    pub fn capture_event(&self, event: CaptureEvent, dialog: &mut dyn CaptureDialog) {
        match event {
            CaptureEvent::Closing => self.capture_file_closing(dialog),
            CaptureEvent::Closed => self.capture_file_closed(dialog),
            _ => {}
        }
    }

    /// The capture file is about to close
    ///
    /// Invokes the dialog's hook, then `update_widgets`. Does not close the
    /// dialog.
    pub fn capture_file_closing(&self, dialog: &mut dyn CaptureDialog) {
        if self.is_destroyed() {
            log::warn!("dropping capture-closing notification for torn-down dialog");
            return;
        }
        dialog.capture_file_closing();
        dialog.update_widgets();
    }

    /// The capture file was closed
    ///
    /// Records the fact, invokes the dialog's hook, then `update_widgets`.
    pub fn capture_file_closed(&self, dialog: &mut dyn CaptureDialog) {
        if self.is_destroyed() {
            log::warn!("dropping capture-closed notification for torn-down dialog");
            return;
        }
        self.inner.borrow_mut().file_closed = true;
        dialog.capture_file_closed();
        dialog.update_widgets();
    }

    /// Register a tap listener on the dialog's behalf
    ///
    /// On success the handle is kept and unregistered automatically during
    /// teardown (or earlier via
    /// [`remove_tap_listeners`](Self::remove_tap_listeners)). On failure a
    /// warning is shown to the user and the lifecycle state is untouched.
    pub fn register_tap_listener(
        &self,
        tap_name: &str,
        filter: &str,
        flags: TapFlags,
        callbacks: TapCallbacks,
    ) -> bool {
        match self.registry.register_listener(tap_name, filter, flags, callbacks) {
            Ok(handle) => {
                self.inner.borrow_mut().tap_handles.push(handle);
                true
            }
            Err(err) => {
                self.alerts
                    .show_warning("Unable to register tap listener", &format!("{tap_name}: {err}"));
                false
            }
        }
    }

    /// Remove every tap listener registered via
    /// [`register_tap_listener`](Self::register_tap_listener)
    ///
    /// Best-effort resource cleanup, separate from the retap scope
    /// accounting; callable any number of times.
    pub fn remove_tap_listeners(&self) {
        let handles = std::mem::take(&mut self.inner.borrow_mut().tap_handles);
        for handle in handles {
            if !self.registry.unregister(handle) {
                log::warn!("tap listener {handle:?} was already unregistered");
            }
        }
    }

    /// Set the window subtitle, e.g. "Foo Timeouts"
    ///
    /// The full title is composed lazily in
    /// [`window_title`](Self::window_title); nothing is recomputed here.
    pub fn set_window_subtitle(&self, subtitle: &str) {
        self.inner.borrow_mut().subtitle = subtitle.to_string();
    }

    /// The current subtitle
    pub fn window_subtitle(&self) -> String {
        self.inner.borrow().subtitle.clone()
    }

    /// Compose the window title from the subtitle and the capture file's
    /// current display name
    pub fn window_title(&self) -> String {
        let subtitle = self.window_subtitle();
        match (subtitle.is_empty(), self.source.display_name()) {
            (false, Some(name)) => format!("{subtitle} - {name}"),
            (false, None) => subtitle,
            (true, Some(name)) => name,
            (true, None) => String::new(),
        }
    }

    /// True if the user has closed (not minimized) the dialog
    pub fn dialog_closed(&self) -> bool {
        self.inner.borrow().closed_by_user
    }

    /// True if the capture file has been closed
    pub fn file_closed(&self) -> bool {
        self.inner.borrow().file_closed
    }

    /// True once teardown has run; the host must drop the dialog
    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().torn_down
    }

    /// Current retap scope nesting depth
    pub fn retap_depth(&self) -> u32 {
        self.inner.borrow().retap_depth
    }

    /// Number of tap listener handles currently held
    pub fn tap_listener_count(&self) -> usize {
        self.inner.borrow().tap_handles.len()
    }

    /// Release everything the dialog holds
    ///
    /// Idempotent; the guard flips before any collaborator is touched, so a
    /// second entry (from whichever of the close or end-of-retap paths runs
    /// later) is a no-op. Safe to run from inside a tap callback or a
    /// capture notification: both collaborators dispatch from snapshots.
    fn teardown(&self) {
        let observer = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            inner.observer.take()
        };
        if let Some(id) = observer {
            self.source.detach(id);
        }
        self.remove_tap_listeners();
        log::debug!("dialog torn down");
    }
}

/// RAII marker for a code block that retaps packets
///
/// Calls [`DialogLifecycle::begin_retap_packets`] on entry and
/// [`DialogLifecycle::end_retap_packets`] on drop, so every exit path
/// (normal return, early return, panic unwind) balances the scope. An
/// unbalanced scope would keep a closed dialog allocated forever.
pub struct RetapScope {
    lifecycle: DialogLifecycle,
}

impl RetapScope {
    /// Enter a retap scope
    pub fn enter(lifecycle: &DialogLifecycle) -> Self {
        lifecycle.begin_retap_packets();
        Self {
            lifecycle: lifecycle.clone(),
        }
    }
}

impl Drop for RetapScope {
    fn drop(&mut self) {
        self.lifecycle.end_retap_packets();
    }
}
