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

use parking_lot::Mutex;

use crate::audio::mixer::{AudioMixer, PlaybackSource};
use crate::audio::SourceSender;

const MOCK_SAMPLE_RATE: u32 = 44100;
const MOCK_CHANNELS: u16 = 2;

/// A mock output device. Instead of a real-time stream, tests pump the mixer
/// by hand and inspect the rendered frames.
pub struct Device {
    name: String,
    mixer: Mutex<AudioMixer>,
    source_tx: SourceSender,
}

impl Device {
    /// Gets a mock device with the given name.
    pub fn get(name: &str) -> Device {
        let (mixer, source_tx) = AudioMixer::new(MOCK_CHANNELS, MOCK_SAMPLE_RATE);
        Device {
            name: name.to_string(),
            mixer: Mutex::new(mixer),
            source_tx,
        }
    }

    /// Renders the given number of frames and returns them interleaved.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * usize::from(MOCK_CHANNELS)];
        self.mixer.lock().mix_into(&mut output);
        output
    }

    /// Returns the number of playback instances currently rendering,
    /// including ones submitted since the last render.
    pub fn active_count(&self) -> usize {
        let mut mixer = self.mixer.lock();
        mixer.drain_incoming();
        mixer.active_count()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mock)", self.name)
    }
}

impl crate::audio::Device for Device {
    fn source_sender(&self) -> crossbeam_channel::Sender<PlaybackSource> {
        self.source_tx.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.lock().sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.mixer.lock().channel_count()
    }
}
