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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rdev::{listen, EventType, Key};
use tracing::{error, info, span, Level};

use super::{HookError, KeyTracker, RawKeyEvent};

/// The rdev-backed global key hook. rdev's listener takes over a thread for
/// the life of the process and cannot be unhooked, so stop() flips the hook
/// inert: the capture thread stays parked in the OS loop but every further
/// event is discarded before it reaches the tracker.
pub struct Hook {
    state: Mutex<State>,
}

struct State {
    started: bool,
    /// Shared with the capture callback; cleared on stop.
    active: Option<Arc<AtomicBool>>,
}

impl Hook {
    /// Creates a new (unstarted) rdev hook.
    pub fn new() -> Hook {
        Hook {
            state: Mutex::new(State {
                started: false,
                active: None,
            }),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rdev (global key hook)")
    }
}

impl super::Hook for Hook {
    fn start(&self, keys_tx: Sender<String>) -> Result<(), HookError> {
        let mut state = self.state.lock();
        if state.started {
            return Err(HookError::AlreadyStarted);
        }

        let active = Arc::new(AtomicBool::new(true));
        state.started = true;
        state.active = Some(Arc::clone(&active));

        let tracker = KeyTracker::new(keys_tx);
        thread::spawn(move || {
            let span = span!(Level::INFO, "key hook");
            let _enter = span.enter();

            info!("Global key hook started.");

            let result = listen(move |event| {
                if !active.load(Ordering::Relaxed) {
                    return;
                }

                let (key, is_down) = match event.event_type {
                    EventType::KeyPress(key) => (key, true),
                    EventType::KeyRelease(key) => (key, false),
                    _ => return,
                };

                tracker.handle(RawKeyEvent {
                    raw: raw_code(key),
                    is_down,
                    character: event.name.as_ref().and_then(|name| name.chars().next()),
                });
            });

            if let Err(e) = result {
                error!(error = ?e, "Global key hook failed");
            }
        });

        Ok(())
    }

    fn stop(&self) -> Result<(), HookError> {
        let mut state = self.state.lock();
        if !state.started {
            return Err(HookError::NotStarted);
        }

        if let Some(active) = state.active.take() {
            active.store(false, Ordering::Relaxed);
        }
        state.started = false;
        info!("Global key hook stopped.");
        Ok(())
    }
}

/// Maps an rdev key onto the PS/2-domain raw code the normalizer's table is
/// written against. Keys with no table entry map to 0, which normalization
/// drops.
fn raw_code(key: Key) -> u32 {
    match key {
        Key::Escape => 1,
        Key::Num1 => 2,
        Key::Num2 => 3,
        Key::Num3 => 4,
        Key::Num4 => 5,
        Key::Num5 => 6,
        Key::Num6 => 7,
        Key::Num7 => 8,
        Key::Num8 => 9,
        Key::Num9 => 10,
        Key::Num0 => 11,
        Key::Minus => 12,
        Key::Equal => 13,
        Key::Backspace => 14,
        Key::Tab => 15,
        Key::KeyQ => 16,
        Key::KeyW => 17,
        Key::KeyE => 18,
        Key::KeyR => 19,
        Key::KeyT => 20,
        Key::KeyY => 21,
        Key::KeyU => 22,
        Key::KeyI => 23,
        Key::KeyO => 24,
        Key::KeyP => 25,
        Key::LeftBracket => 26,
        Key::RightBracket => 27,
        Key::Return => 28,
        Key::ControlLeft => 29,
        Key::KeyA => 30,
        Key::KeyS => 31,
        Key::KeyD => 32,
        Key::KeyF => 33,
        Key::KeyG => 34,
        Key::KeyH => 35,
        Key::KeyJ => 36,
        Key::KeyK => 37,
        Key::KeyL => 38,
        Key::SemiColon => 39,
        Key::Quote => 40,
        Key::BackQuote => 41,
        Key::ShiftLeft => 42,
        Key::BackSlash => 43,
        Key::KeyZ => 44,
        Key::KeyX => 45,
        Key::KeyC => 46,
        Key::KeyV => 47,
        Key::KeyB => 48,
        Key::KeyN => 49,
        Key::KeyM => 50,
        Key::Comma => 51,
        Key::Dot => 52,
        Key::Slash => 53,
        Key::ShiftRight => 54,
        Key::KpMultiply => 55,
        Key::Alt => 56,
        Key::Space => 57,
        Key::CapsLock => 58,
        Key::F1 => 59,
        Key::F2 => 60,
        Key::F3 => 61,
        Key::F4 => 62,
        Key::F5 => 63,
        Key::F6 => 64,
        Key::F7 => 65,
        Key::F8 => 66,
        Key::F9 => 67,
        Key::F10 => 68,
        Key::NumLock => 69,
        Key::ScrollLock => 70,
        Key::Kp7 => 71,
        Key::Kp8 => 72,
        Key::Kp9 => 73,
        Key::KpMinus => 74,
        Key::Kp4 => 75,
        Key::Kp5 => 76,
        Key::Kp6 => 77,
        Key::KpPlus => 78,
        Key::Kp1 => 79,
        Key::Kp2 => 80,
        Key::Kp3 => 81,
        Key::Kp0 => 82,
        Key::KpDelete => 83,
        Key::F11 => 87,
        Key::F12 => 88,
        Key::KpReturn => 0xE01C,
        Key::ControlRight => 0xE01D,
        Key::KpDivide => 0xE035,
        Key::PrintScreen => 0xE037,
        Key::AltGr => 0xE038,
        Key::Home => 0xE047,
        Key::UpArrow => 0xE048,
        Key::PageUp => 0xE049,
        Key::LeftArrow => 0xE04B,
        Key::RightArrow => 0xE04D,
        Key::End => 0xE04F,
        Key::DownArrow => 0xE050,
        Key::PageDown => 0xE051,
        Key::Insert => 0xE052,
        Key::Delete => 0xE053,
        Key::MetaLeft => 0xE05B,
        Key::MetaRight => 0xE05C,
        _ => 0,
    }
}

#[cfg(test)]
mod test {
    use crate::keys;

    use super::*;

    #[test]
    fn test_raw_codes_agree_with_normalizer() {
        let expectations = [
            (Key::KeyA, "a"),
            (Key::Num1, "1"),
            (Key::Return, "enter"),
            (Key::Backspace, "backspace"),
            (Key::ShiftLeft, "lshift"),
            (Key::UpArrow, "up"),
            (Key::Kp1, "num_1"),
            (Key::KpReturn, "num_enter"),
            (Key::Space, "space"),
            (Key::MetaRight, "rmeta"),
        ];

        for (key, expected) in expectations {
            assert_eq!(Some(expected), keys::normalize(raw_code(key)));
        }
    }

    #[test]
    fn test_unmapped_keys_drop() {
        assert_eq!(None, keys::normalize(raw_code(Key::Function)));
    }
}
