//! Capture file source
//!
//! `CaptureFileSource` represents the currently loaded capture and pushes
//! open/closing/closed notifications to attached observers. It is a cheap
//! cloneable handle over shared state; everything runs on the one UI
//! event-processing thread.
//!
//! Dispatch is snapshot-based: the observer list is copied out before any
//! callback runs, and no internal borrow is held across a callback. An
//! observer may therefore detach itself (or tear down the dialog that owns
//! it) from inside its own notification without deadlocking the source.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::record::Record;

/// Lifecycle notifications pushed by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A capture file was loaded
    Opened,
    /// The capture file is about to close; taps are still valid
    Closing,
    /// The capture file is gone
    Closed,
}

/// A loaded capture file
///
/// Records are behind an `Rc` so the tap engine can iterate them without
/// keeping the source borrowed while listener callbacks run.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    display_name: String,
    records: Rc<[Record]>,
}

impl CaptureFile {
    /// Create a capture file from dissected records
    pub fn new(display_name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            display_name: display_name.into(),
            records: records.into(),
        }
    }

    /// The name shown in window titles, usually the file name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The dissected records, in capture order
    pub fn records(&self) -> Rc<[Record]> {
        Rc::clone(&self.records)
    }

    /// Number of records in the capture
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Token identifying one attached observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

struct ObserverEntry {
    id: ObserverId,
    callback: RefCell<Box<dyn FnMut(CaptureEvent)>>,
    detached: Cell<bool>,
}

#[derive(Default)]
struct SourceInner {
    file: Option<CaptureFile>,
    observers: Vec<Rc<ObserverEntry>>,
    next_observer: u64,
}

/// Shared handle to the capture file state
#[derive(Clone, Default)]
pub struct CaptureFileSource {
    inner: Rc<RefCell<SourceInner>>,
}

impl CaptureFileSource {
    /// Create a source with no file loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a capture file, replacing any current one
    ///
    /// Replacing an open file emits its Closing/Closed pair first.
    pub fn open(&self, file: CaptureFile) {
        if self.is_open() {
            self.close();
        }
        log::debug!("capture opened: {}", file.display_name());
        self.inner.borrow_mut().file = Some(file);
        self.emit(CaptureEvent::Opened);
    }

    /// Close the current capture file, if any
    ///
    /// Emits Closing while the file is still present, then drops it and
    /// emits Closed.
    pub fn close(&self) {
        if !self.is_open() {
            return;
        }
        self.emit(CaptureEvent::Closing);
        let file = self.inner.borrow_mut().file.take();
        if let Some(file) = file {
            log::debug!("capture closed: {}", file.display_name());
        }
        self.emit(CaptureEvent::Closed);
    }

    /// True if a capture file is loaded
    pub fn is_open(&self) -> bool {
        self.inner.borrow().file.is_some()
    }

    /// The current file, if any
    pub fn file(&self) -> Option<CaptureFile> {
        self.inner.borrow().file.clone()
    }

    /// Display name of the current file, if any
    pub fn display_name(&self) -> Option<String> {
        self.inner
            .borrow()
            .file
            .as_ref()
            .map(|f| f.display_name().to_string())
    }

    /// Attach an observer; it receives every subsequent event
    pub fn attach(&self, callback: Box<dyn FnMut(CaptureEvent)>) -> ObserverId {
        let mut inner = self.inner.borrow_mut();
        inner.next_observer += 1;
        let id = ObserverId(inner.next_observer);
        inner.observers.push(Rc::new(ObserverEntry {
            id,
            callback: RefCell::new(callback),
            detached: Cell::new(false),
        }));
        id
    }

    /// Detach an observer; no events are delivered to it afterwards
    ///
    /// Safe to call from inside the observer's own callback. Returns false
    /// if the id was not attached.
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let mut found = false;
        for entry in &inner.observers {
            if entry.id == id && !entry.detached.get() {
                entry.detached.set(true);
                found = true;
            }
        }
        inner.observers.retain(|e| !e.detached.get());
        found
    }

    fn emit(&self, event: CaptureEvent) {
        // Snapshot so callbacks can attach/detach without a borrow conflict
        let observers: Vec<Rc<ObserverEntry>> = self.inner.borrow().observers.clone();
        for entry in observers {
            if entry.detached.get() {
                continue;
            }
            match entry.callback.try_borrow_mut() {
                Ok(mut callback) => callback(event),
                // The observer is already running; delivering a nested event
                // into it would require a second mutable borrow
                Err(_) => log::warn!("dropping re-entrant {event:?} for observer {:?}", entry.id),
            }
        }
    }
}
