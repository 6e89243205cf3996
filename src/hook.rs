// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Global key event capture.
//!
//! A hook backend produces raw key events on its own thread; the shared
//! KeyTracker deduplicates held keys, normalizes raw events to canonical
//! codes, and enqueues them for the dispatch loop. Nothing on the capture
//! path may block: the queue is bounded and overflow drops the newest event
//! with a warning, because stalling a global OS hook stalls everyone's
//! keyboard, not just ours.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::keys;

pub mod mock;
pub mod rdev;

/// Capacity of the canonical code queue between capture and dispatch.
pub const KEY_QUEUE_CAPACITY: usize = 100;

/// A raw key event as delivered by an input backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Backend specific raw key identifier.
    pub raw: u32,
    /// True for key-down, false for key-up.
    pub is_down: bool,
    /// The printable character carried by the event, when there is one.
    pub character: Option<char>,
}

/// Typed error for hook lifecycle misuse.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HookError {
    #[error("key hook already started")]
    AlreadyStarted,

    #[error("key hook not started")]
    NotStarted,
}

/// A global key hook. Starting hands the hook the sending half of the key
/// code queue; stopping makes the hook inert. Both return lifecycle errors to
/// the caller instead of crashing anything.
pub trait Hook: fmt::Display + Send + Sync {
    fn start(&self, keys_tx: Sender<String>) -> Result<(), HookError>;
    fn stop(&self) -> Result<(), HookError>;
}

/// Gets a hook backend by name: the rdev-backed global hook by default, or a
/// mock hook when the name starts with "mock".
pub fn get_hook(name: Option<&str>) -> Arc<dyn Hook> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Arc::new(mock::Hook::get(name));
        }
    }

    Arc::new(rdev::Hook::new())
}

/// Per-key Up/Down state machine plus normalization and enqueueing, shared by
/// every backend. Exactly one canonical code is emitted per physical
/// key-down; OS auto-repeat while a key is held emits nothing.
pub struct KeyTracker {
    pressed: Mutex<HashSet<u32>>,
    keys_tx: Sender<String>,
}

impl KeyTracker {
    /// Creates a tracker that emits into the given queue.
    pub fn new(keys_tx: Sender<String>) -> KeyTracker {
        KeyTracker {
            pressed: Mutex::new(HashSet::new()),
            keys_tx,
        }
    }

    /// Handles one raw event. O(1) and non-blocking; called directly from the
    /// backend's capture thread.
    pub fn handle(&self, event: RawKeyEvent) {
        if !event.is_down {
            self.pressed.lock().remove(&event.raw);
            return;
        }

        // A key already down is OS auto-repeat and must not re-emit.
        if !self.pressed.lock().insert(event.raw) {
            return;
        }

        let Some(code) = keys::normalize_char(event.raw, event.character) else {
            debug!(raw = event.raw, "Dropping unrecognized key event");
            return;
        };

        match self.keys_tx.try_send(code) {
            Ok(()) => {}
            Err(TrySendError::Full(code)) => {
                warn!(code = %code, "Key queue full, dropping event");
            }
            // Dispatch has gone away; we're shutting down.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn down(raw: u32) -> RawKeyEvent {
        RawKeyEvent {
            raw,
            is_down: true,
            character: None,
        }
    }

    fn up(raw: u32) -> RawKeyEvent {
        RawKeyEvent {
            raw,
            is_down: false,
            character: None,
        }
    }

    #[test]
    fn test_one_emit_per_physical_key_down() {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(KEY_QUEUE_CAPACITY);
        let tracker = KeyTracker::new(keys_tx);

        // Key-down followed by auto-repeat downs: one emit.
        tracker.handle(down(30));
        tracker.handle(down(30));
        tracker.handle(down(30));
        assert_eq!(Ok("a".to_string()), keys_rx.try_recv());
        assert!(keys_rx.try_recv().is_err());

        // After the matching key-up, the next down emits again.
        tracker.handle(up(30));
        tracker.handle(down(30));
        assert_eq!(Ok("a".to_string()), keys_rx.try_recv());

        // Key-up itself emits nothing.
        tracker.handle(up(30));
        assert!(keys_rx.try_recv().is_err());
    }

    #[test]
    fn test_distinct_keys_tracked_separately() {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(KEY_QUEUE_CAPACITY);
        let tracker = KeyTracker::new(keys_tx);

        tracker.handle(down(30));
        tracker.handle(down(31));
        assert_eq!(Ok("a".to_string()), keys_rx.try_recv());
        assert_eq!(Ok("s".to_string()), keys_rx.try_recv());
    }

    #[test]
    fn test_unrecognized_events_dropped_silently() {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(KEY_QUEUE_CAPACITY);
        let tracker = KeyTracker::new(keys_tx);

        tracker.handle(down(999_999));
        assert!(keys_rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_newest_without_blocking() {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(1);
        let tracker = KeyTracker::new(keys_tx);

        tracker.handle(down(30));
        // The queue is full; this must drop the event rather than block.
        tracker.handle(down(31));

        assert_eq!(Ok("a".to_string()), keys_rx.try_recv());
        assert!(keys_rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_queue_is_tolerated() {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(1);
        let tracker = KeyTracker::new(keys_tx);
        drop(keys_rx);

        // Must not panic.
        tracker.handle(down(30));
    }

    #[test]
    fn test_get_hook_dispatches_to_mock() {
        let hook = get_hook(Some("mock"));
        assert!(hook.to_string().contains("mock"));
    }
}
