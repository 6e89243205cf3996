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
use std::fmt;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::{HookError, KeyTracker, RawKeyEvent};

/// A mock hook. Tests inject raw events synchronously instead of capturing
/// them from the OS; everything downstream of the backend (dedup,
/// normalization, the bounded queue) behaves exactly as in production.
pub struct Hook {
    name: String,
    tracker: Mutex<Option<KeyTracker>>,
}

impl Hook {
    /// Gets a mock hook with the given name.
    pub fn get(name: &str) -> Hook {
        Hook {
            name: name.to_string(),
            tracker: Mutex::new(None),
        }
    }

    /// Injects a key-down for the given raw code. Events sent while the hook
    /// is stopped are dropped, mirroring a stopped OS hook.
    pub fn press(&self, raw: u32) {
        self.send(RawKeyEvent {
            raw,
            is_down: true,
            character: None,
        });
    }

    /// Injects a key-up for the given raw code.
    pub fn release(&self, raw: u32) {
        self.send(RawKeyEvent {
            raw,
            is_down: false,
            character: None,
        });
    }

    /// Injects an arbitrary raw event.
    pub fn send(&self, event: RawKeyEvent) {
        if let Some(tracker) = self.tracker.lock().as_ref() {
            tracker.handle(event);
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mock hook)", self.name)
    }
}

impl super::Hook for Hook {
    fn start(&self, keys_tx: Sender<String>) -> Result<(), HookError> {
        let mut tracker = self.tracker.lock();
        if tracker.is_some() {
            return Err(HookError::AlreadyStarted);
        }
        *tracker = Some(KeyTracker::new(keys_tx));
        Ok(())
    }

    fn stop(&self) -> Result<(), HookError> {
        let mut tracker = self.tracker.lock();
        if tracker.is_none() {
            return Err(HookError::NotStarted);
        }
        *tracker = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::super::Hook as HookTrait;
    use super::*;

    #[test]
    fn test_lifecycle_errors() {
        let hook = Hook::get("mock");
        let (keys_tx, _keys_rx) = crossbeam_channel::bounded(10);

        assert_eq!(Err(HookError::NotStarted), hook.stop());
        assert!(hook.start(keys_tx.clone()).is_ok());
        assert_eq!(Err(HookError::AlreadyStarted), hook.start(keys_tx));
        assert!(hook.stop().is_ok());
        assert_eq!(Err(HookError::NotStarted), hook.stop());
    }

    #[test]
    fn test_events_dropped_when_stopped() {
        let hook = Hook::get("mock");
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(10);

        hook.press(30);
        assert!(keys_rx.try_recv().is_err());

        hook.start(keys_tx).expect("start");
        hook.press(30);
        assert_eq!(Ok("a".to_string()), keys_rx.try_recv());

        hook.stop().expect("stop");
        hook.press(31);
        assert!(keys_rx.try_recv().is_err());
    }
}
