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
use std::{error::Error, fmt, sync::Arc};

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod sample_source;
mod thread_priority;

/// Sender half of the mixer's playback instance channel.
pub type SourceSender = crossbeam_channel::Sender<mixer::PlaybackSource>;

/// An audio output device. Constructed once at startup and owned explicitly
/// by the player; there is no package level speaker state. Submitting a
/// playback instance never blocks on rendering.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns a sender that feeds playback instances to the device's mixer.
    fn source_sender(&self) -> SourceSender;

    /// The device's output sample rate.
    fn sample_rate(&self) -> u32;

    /// The device's output channel count.
    fn channel_count(&self) -> u16;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets an output device by name, the default output device when no name is
/// given, or a mock device when the name starts with "mock".
pub fn get_device(name: Option<&str>) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Device::get(name)));
        }
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}
