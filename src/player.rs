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
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, span, Level, Span};

use crate::audio;
use crate::config::SoundPack;
use crate::keys;
use crate::samples::PackCache;

/// Volume percent at unity gain.
pub const UNITY_VOLUME_PERCENT: u32 = 100;

/// Maximum volume percent.
pub const MAX_VOLUME_PERCENT: u32 = 200;

/// Lead-in to skip at the start of every sample. Many key sound recordings
/// carry a few milliseconds of silence before the transient; skipping it
/// keeps the audible click lined up with the key press.
const SAMPLE_LEAD_IN: Duration = Duration::from_millis(15);

/// Bounds of the gain domain. The floor is rendered as hard silence.
const GAIN_MIN: f32 = -2.0;
const GAIN_MAX: f32 = 2.0;

/// Typed error for trigger failures.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("no sound available for key code {0}")]
    NoSoundAvailable(String),
}

/// The active pack and its decoded buffers. Kept in one Arc so a reader can
/// never observe a pack paired with another pack's cache.
struct ActivePack {
    pack: SoundPack,
    cache: PackCache,
}

/// Turns canonical key codes into playback instances on the output device.
pub struct Player {
    /// The output device. Owned here explicitly; constructed once at startup.
    device: Arc<dyn audio::Device>,
    /// The active (pack, cache) pair, swapped wholesale on pack switch.
    active: RwLock<Option<Arc<ActivePack>>>,
    /// Volume percent, 0-200 with 100 as unity.
    volume_percent: AtomicU32,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player on the given device with no active pack and the
    /// volume at unity.
    pub fn new(device: Arc<dyn audio::Device>) -> Player {
        Player {
            device,
            active: RwLock::new(None),
            volume_percent: AtomicU32::new(UNITY_VOLUME_PERCENT),
            span: span!(Level::INFO, "player"),
        }
    }

    /// Triggers the sound for a canonical key code. The playback instance is
    /// handed to the device's mixer; this never waits on rendering, and
    /// overlapping triggers (same code included) play independently.
    pub fn trigger(&self, code: &str) -> Result<(), PlayerError> {
        let active = self.active.read().clone();
        let Some(active) = active else {
            return Err(PlayerError::NoSoundAvailable(code.to_string()));
        };

        let code = if active.pack.includes_numpad() {
            code
        } else {
            keys::fold_numpad(code)
        };

        let sample = active.cache.buffer_for(&active.pack, code);
        let amplitude = gain_amplitude(volume_gain(
            self.volume_percent.load(Ordering::Relaxed) as f32
        ));
        let source = sample.create_source(amplitude, SAMPLE_LEAD_IN);

        debug!(parent: &self.span, code, source_id = source.id(), "Triggering sound");

        // The send only fails when the device's mixer is gone, which means
        // we're tearing down anyway.
        let _ = self.device.source_sender().send(source);
        Ok(())
    }

    /// Sets the volume percent, clamped to 0-200. Only affects subsequent
    /// triggers; sounds already rendering keep their amplitude.
    pub fn set_volume(&self, percent: u32) {
        let percent = percent.min(MAX_VOLUME_PERCENT);
        self.volume_percent.store(percent, Ordering::Relaxed);
        info!(parent: &self.span, percent, "Volume changed");
    }

    /// Returns the current volume percent.
    pub fn volume(&self) -> u32 {
        self.volume_percent.load(Ordering::Relaxed)
    }

    /// Atomically replaces the active pack and cache. In-flight playback from
    /// the previous pack keeps rendering; its instances hold their own buffer
    /// references.
    pub fn switch_pack(&self, pack: SoundPack, cache: PackCache) {
        info!(parent: &self.span, pack = pack.name(), mapped_codes = cache.mapped_codes(),
            "Switching sound pack");
        *self.active.write() = Some(Arc::new(ActivePack { pack, cache }));
    }

    /// Returns the name of the active pack, if any.
    pub fn active_pack_name(&self) -> Option<String> {
        self.active
            .read()
            .as_ref()
            .map(|active| active.pack.name().to_string())
    }

    /// Releases the active pack and cache. Safe to call while playback
    /// instances are still draining.
    pub fn shutdown(&self) {
        info!(parent: &self.span, "Player shutting down");
        *self.active.write() = None;
    }
}

/// Maps a volume percent (0-200, 100 = unity) onto the gain domain:
/// linear from GAIN_MIN to GAIN_MAX, clamped at both ends.
fn volume_gain(percent: f32) -> f32 {
    ((percent / 100.0 - 1.0) * 2.0).clamp(GAIN_MIN, GAIN_MAX)
}

/// Converts a gain to a linear amplitude (base 2). The gain floor means
/// silence, not merely very quiet.
fn gain_amplitude(gain: f32) -> f32 {
    if gain <= GAIN_MIN {
        0.0
    } else {
        2f32.powf(gain)
    }
}
