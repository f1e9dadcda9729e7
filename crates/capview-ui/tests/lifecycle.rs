//! End-to-end dialog lifecycle tests
//!
//! Wires a capture source, a tap registry, and a statistics dialog together
//! the way a host application would, and drives the deferred-destruction
//! paths that only show up with everything connected: closing the dialog
//! from inside a tap draw callback, and capture-file notifications arriving
//! after teardown.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use capview_core::capture::{CaptureFile, CaptureFileSource};
use capview_core::record::Record;
use capview_core::tap::{TapCallbacks, TapFlags, TapRegistry};
use capview_ui::{CaptureDialog, CloseOutcome, DialogLifecycle, RetapScope};

/// Minimal protocol-statistics dialog
struct StatsDialog {
    lifecycle: DialogLifecycle,
    counts: Rc<RefCell<BTreeMap<String, u32>>>,
    controls_enabled: bool,
    closed_hook_calls: u32,
}

impl StatsDialog {
    fn new(lifecycle: DialogLifecycle) -> Self {
        Self {
            lifecycle,
            counts: Rc::new(RefCell::new(BTreeMap::new())),
            controls_enabled: true,
            closed_hook_calls: 0,
        }
    }

    /// Register this dialog's tap listener
    fn register_taps(&self) -> bool {
        let counts = Rc::clone(&self.counts);
        let reset_counts = Rc::clone(&self.counts);
        self.lifecycle.register_tap_listener(
            "frame",
            "",
            TapFlags::empty(),
            TapCallbacks {
                reset: Box::new(move || reset_counts.borrow_mut().clear()),
                packet: Box::new(move |record| {
                    *counts.borrow_mut().entry(record.protocol.clone()).or_insert(0) += 1;
                }),
                draw: Box::new(|| {}),
            },
        )
    }
}

impl CaptureDialog for StatsDialog {
    fn capture_file_closed(&mut self) {
        self.closed_hook_calls += 1;
    }

    fn update_widgets(&mut self) {
        self.controls_enabled = !self.lifecycle.file_closed();
    }
}

fn test_capture() -> CaptureFile {
    CaptureFile::new(
        "office.pcap",
        vec![
            Record::new(1, 60, "tcp", "SYN"),
            Record::new(2, 60, "tcp", "SYN, ACK"),
            Record::new(3, 342, "dns", "Standard query"),
            Record::new(4, 98, "icmp", "Echo request"),
        ],
    )
}

fn test_fixture() -> (CaptureFileSource, TapRegistry, DialogLifecycle) {
    let _ = env_logger::builder().is_test(true).try_init();

    let source = CaptureFileSource::new();
    source.open(test_capture());
    let registry = TapRegistry::new();
    registry.register_tap("frame");
    let lifecycle = DialogLifecycle::new(source.clone(), registry.clone());
    (source, registry, lifecycle)
}

#[test]
fn stats_dialog_full_session() {
    let (source, registry, lifecycle) = test_fixture();
    let dialog = StatsDialog::new(lifecycle.clone());
    lifecycle.set_window_subtitle("Protocol Statistics");
    assert!(dialog.register_taps());
    assert_eq!(lifecycle.window_title(), "Protocol Statistics - office.pcap");

    {
        let _scope = RetapScope::enter(&lifecycle);
        assert_eq!(registry.retap(&source), 4);
    }

    {
        let counts = dialog.counts.borrow();
        assert_eq!(counts.get("tcp"), Some(&2));
        assert_eq!(counts.get("dns"), Some(&1));
        assert_eq!(counts.get("icmp"), Some(&1));
    }

    assert_eq!(lifecycle.close(), CloseOutcome::Destroyed);
    assert_eq!(registry.listener_count(), 0);
}

#[test]
fn close_from_inside_draw_callback_defers_destruction() {
    let (source, registry, lifecycle) = test_fixture();

    // A draw callback that closes its own dialog, e.g. a nested
    // confirmation dialog the user dismisses while the retap is running
    let closer = lifecycle.clone();
    let outcome: Rc<RefCell<Option<CloseOutcome>>> = Rc::new(RefCell::new(None));
    let draw_outcome = Rc::clone(&outcome);
    assert!(lifecycle.register_tap_listener(
        "frame",
        "",
        TapFlags::empty(),
        TapCallbacks {
            reset: Box::new(|| {}),
            packet: Box::new(|_| {}),
            draw: Box::new(move || {
                *draw_outcome.borrow_mut() = Some(closer.close());
            }),
        },
    ));

    {
        let _scope = RetapScope::enter(&lifecycle);
        registry.retap(&source);

        // The close happened mid-retap and was deferred
        assert_eq!(*outcome.borrow(), Some(CloseOutcome::Deferred));
        assert!(lifecycle.dialog_closed());
        assert!(!lifecycle.is_destroyed());
        assert_eq!(registry.listener_count(), 1);
    }

    // The scope balanced out; teardown ran exactly once
    assert!(lifecycle.is_destroyed());
    assert_eq!(registry.listener_count(), 0);
    assert_eq!(lifecycle.tap_listener_count(), 0);
}

#[test]
fn capture_notifications_stop_after_teardown() {
    let (source, _, lifecycle) = test_fixture();
    let dialog = Rc::new(RefCell::new(StatsDialog::new(lifecycle.clone())));

    let observer_lifecycle = lifecycle.clone();
    let observer_dialog = Rc::clone(&dialog);
    let id = source.attach(Box::new(move |event| {
        observer_lifecycle.capture_event(event, &mut *observer_dialog.borrow_mut());
    }));
    lifecycle.bind_observer(id);

    source.close();
    assert_eq!(dialog.borrow().closed_hook_calls, 1);
    assert!(!dialog.borrow().controls_enabled);
    assert!(lifecycle.file_closed());

    // Destroy the dialog, then generate more file events; none may reach it
    source.open(test_capture());
    assert_eq!(lifecycle.close(), CloseOutcome::Destroyed);
    source.close();
    assert_eq!(dialog.borrow().closed_hook_calls, 1);
}
