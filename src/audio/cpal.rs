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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::Sender;
use tracing::{error, info, span, Level};

use crate::audio::mixer::{AudioMixer, PlaybackSource};
use crate::audio::thread_priority::promote_output_thread;
use crate::audio::SourceSender;

/// A wrapper around a cpal output device. The device owns one continuous
/// output stream for its whole lifetime; playback instances are fed to the
/// stream's mixer over a channel, so triggering never touches the stream
/// itself.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host the device belongs to.
    host_id: cpal::HostId,
    /// The stream's output sample rate.
    sample_rate: u32,
    /// The stream's output channel count.
    channel_count: u16,
    /// Sender for new playback instances.
    source_tx: SourceSender,
    /// Dropping this ends the stream thread.
    _shutdown_tx: Sender<()>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channel_count,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists the names of all output devices known to cpal.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let mut names = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id)?;
            for device in host.output_devices()? {
                names.push(format!("{} ({})", device.name()?, host_id.name()));
            }
        }
        Ok(names)
    }

    /// Opens the output device with the given name, or the default output
    /// device when no name is given, and starts its continuous stream.
    pub fn get(name: Option<&str>) -> Result<Device, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = match name {
            Some(name) => host
                .output_devices()?
                .find(|device| {
                    device
                        .name()
                        .map(|device_name| device_name == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| format!("no output device named {}", name))?,
            None => host
                .default_output_device()
                .ok_or("no default output device")?,
        };

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate();
        let channel_count = config.channels();
        let device_name = device.name()?;

        let (mixer, source_tx) = AudioMixer::new(channel_count, sample_rate);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        info!(
            device = device_name,
            sample_rate, channels = channel_count, "Opening output stream"
        );

        // cpal streams aren't Send, so the stream lives on its own thread
        // which parks on the shutdown channel until the device is dropped.
        let stream_device_name = device_name.clone();
        thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            promote_output_thread();

            let stream = match config.sample_format() {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), mixer),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), mixer),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), mixer),
                format => Err(format!("unsupported output sample format {:?}", format).into()),
            };

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        error!(err = %e, device = stream_device_name, "Error starting stream");
                        return;
                    }
                    // Held until the owning Device is dropped.
                    let _ = shutdown_rx.recv();
                }
                Err(e) => {
                    error!(err = %e, device = stream_device_name, "Error building stream")
                }
            }
        });

        Ok(Device {
            name: device_name,
            host_id: host.id(),
            sample_rate,
            channel_count,
            source_tx,
            _shutdown_tx: shutdown_tx,
        })
    }
}

/// Builds the output stream for the given sample type. The mixer renders f32
/// into a scratch buffer which is then converted to the stream's native
/// format.
fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.mix_into(&mut scratch);
            for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        move |e| error!(err = %e, "Output stream error"),
        None,
    )?;
    Ok(stream)
}

impl crate::audio::Device for Device {
    fn source_sender(&self) -> Sender<PlaybackSource> {
        self.source_tx.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }
}
