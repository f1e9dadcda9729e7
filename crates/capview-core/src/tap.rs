//! Tap registry
//!
//! A tap is a named analysis point that dissectors feed records into.
//! Listeners attach a (reset, packet, draw) callback triple to a tap,
//! optionally restricted by a display filter. Retapping replays every record
//! of the loaded capture through the listeners: reset first, then the
//! records, then draw.
//!
//! Like [`crate::capture::CaptureFileSource`], the registry dispatches from
//! a snapshot and never holds its internal borrow across a callback, so a
//! listener may unregister itself (or other listeners) mid-retap.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;

use crate::capture::CaptureFileSource;
use crate::filter::{DisplayFilter, FilterError};
use crate::record::Record;

bitflags! {
    /// What a listener needs from dissection
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TapFlags: u32 {
        /// The listener reads the full protocol tree
        const REQUIRES_PROTO_TREE = 1 << 0;
        /// The listener reads the column text
        const REQUIRES_COLUMNS = 1 << 1;
    }
}

/// Error produced when listener registration fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TapError {
    /// No dissector has registered a tap under this name
    #[error("tap {0:?} is not registered")]
    UnknownTap(String),
    /// The listener's display filter does not parse
    #[error("invalid filter: {0}")]
    BadFilter(#[from] FilterError),
}

/// The callback triple a listener attaches to a tap
pub struct TapCallbacks {
    /// Called once before records are replayed
    pub reset: Box<dyn FnMut()>,
    /// Called for every record that passes the listener's filter
    pub packet: Box<dyn FnMut(&Record)>,
    /// Called once after all records, to redraw the listener's output
    pub draw: Box<dyn FnMut()>,
}

impl TapCallbacks {
    /// Callbacks that do nothing; useful as a starting point
    pub fn noop() -> Self {
        Self {
            reset: Box::new(|| {}),
            packet: Box::new(|_| {}),
            draw: Box::new(|| {}),
        }
    }
}

/// Opaque token identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapHandle(u64);

struct ListenerEntry {
    handle: TapHandle,
    tap: String,
    filter: DisplayFilter,
    flags: TapFlags,
    callbacks: RefCell<TapCallbacks>,
    removed: Cell<bool>,
}

#[derive(Default)]
struct RegistryInner {
    taps: Vec<String>,
    listeners: Vec<Rc<ListenerEntry>>,
    next_handle: u64,
}

/// Shared handle to the tap registry
#[derive(Clone, Default)]
pub struct TapRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl TapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a tap; dissectors call this at startup
    pub fn register_tap(&self, name: &str) {
        let mut inner = self.inner.borrow_mut();
        if !inner.taps.iter().any(|t| t == name) {
            inner.taps.push(name.to_string());
        }
    }

    /// True if a tap with this name has been declared
    pub fn has_tap(&self, name: &str) -> bool {
        self.inner.borrow().taps.iter().any(|t| t == name)
    }

    /// Attach a listener to a named tap
    ///
    /// The filter is parsed here; registration fails without side effects if
    /// the tap is unknown or the filter is malformed. Repeated registrations
    /// for the same tap are independent and each yield a fresh handle.
    pub fn register_listener(
        &self,
        tap_name: &str,
        filter: &str,
        flags: TapFlags,
        callbacks: TapCallbacks,
    ) -> Result<TapHandle, TapError> {
        if !self.has_tap(tap_name) {
            return Err(TapError::UnknownTap(tap_name.to_string()));
        }
        let filter = DisplayFilter::parse(filter)?;

        let mut inner = self.inner.borrow_mut();
        inner.next_handle += 1;
        let handle = TapHandle(inner.next_handle);
        inner.listeners.push(Rc::new(ListenerEntry {
            handle,
            tap: tap_name.to_string(),
            filter,
            flags,
            callbacks: RefCell::new(callbacks),
            removed: Cell::new(false),
        }));
        log::debug!("tap listener {handle:?} registered on {tap_name:?}");
        Ok(handle)
    }

    /// Remove a listener
    ///
    /// Safe to call from inside one of the listener's own callbacks: the
    /// entry is flagged so an in-flight retap skips it from the next
    /// invocation on. Returns false if the handle is unknown.
    pub fn unregister(&self, handle: TapHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let mut found = false;
        for entry in &inner.listeners {
            if entry.handle == handle && !entry.removed.get() {
                entry.removed.set(true);
                found = true;
            }
        }
        inner.listeners.retain(|e| !e.removed.get());
        if found {
            log::debug!("tap listener {handle:?} unregistered");
        }
        found
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// True if any listener needs the full protocol tree
    ///
    /// The host uses this to decide how much dissection a retap has to do.
    pub fn requires_proto_tree(&self) -> bool {
        self.inner
            .borrow()
            .listeners
            .iter()
            .any(|l| l.flags.contains(TapFlags::REQUIRES_PROTO_TREE))
    }

    /// Replay the loaded capture through every listener
    ///
    /// Runs all reset callbacks, feeds each record to each listener whose
    /// filter matches, then runs all draw callbacks. Returns the number of
    /// records replayed; zero (and no callbacks) if no capture is loaded.
    pub fn retap(&self, source: &CaptureFileSource) -> usize {
        let Some(file) = source.file() else {
            log::debug!("retap requested with no capture loaded");
            return 0;
        };
        let records = file.records();
        let listeners: Vec<Rc<ListenerEntry>> = self.inner.borrow().listeners.clone();

        for entry in &listeners {
            entry.invoke(|callbacks| (callbacks.reset)());
        }
        for record in records.iter() {
            for entry in &listeners {
                if entry.filter.matches(record) {
                    entry.invoke(|callbacks| (callbacks.packet)(record));
                }
            }
        }
        for entry in &listeners {
            entry.invoke(|callbacks| (callbacks.draw)());
        }

        records.len()
    }
}

impl ListenerEntry {
    /// Run one callback unless the listener was removed or is already on
    /// the stack
    fn invoke(&self, f: impl FnOnce(&mut TapCallbacks)) {
        if self.removed.get() {
            return;
        }
        match self.callbacks.try_borrow_mut() {
            Ok(mut callbacks) => f(&mut callbacks),
            Err(_) => log::warn!(
                "skipping re-entrant callback for tap listener {:?} on {:?}",
                self.handle,
                self.tap
            ),
        }
    }
}
