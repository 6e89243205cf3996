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

//! Sample loading and caching.
//!
//! Samples are decoded entirely into memory at load time for zero-latency
//! triggering. The loader caches by path, so a file referenced by many key
//! codes is decoded exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::audio::mixer::PlaybackSource;
use crate::audio::sample_source::{create_sample_source_from_file, SampleSourceError};

/// A fully decoded sample. The PCM data is behind an Arc so that any number
/// of concurrent playback instances can share it without copying.
#[derive(Clone)]
pub struct LoadedSample {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the decoded data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a playback instance over this sample, skipping the given lead-in
    /// and playing at the given amplitude.
    pub fn create_source(&self, amplitude: f32, skip: Duration) -> PlaybackSource {
        let skip_frames = (skip.as_secs_f64() * self.sample_rate as f64).round() as usize;
        PlaybackSource::new(
            Arc::clone(&self.data),
            self.channel_count,
            amplitude,
            skip_frames,
        )
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the sample duration.
    pub fn duration(&self) -> Duration {
        let frames = self.data.len() / usize::from(self.channel_count.max(1));
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    #[cfg(test)]
    pub fn data(&self) -> &Arc<Vec<f32>> {
        &self.data
    }
}

/// Loads samples and caches them by path.
pub struct SampleLoader {
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate, matching the output device.
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader targeting the given output rate.
    pub fn new(target_sample_rate: u32) -> SampleLoader {
        SampleLoader {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample from a file into memory, returning the cached copy if
    /// the file was loaded before.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, SampleSourceError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = %path.display(), "Using cached sample");
            return Ok(sample.clone());
        }

        let mut source = create_sample_source_from_file(path)?;
        let source_sample_rate = source.sample_rate();
        let channel_count = source.channel_count();

        let mut samples = Vec::new();
        while let Some(sample) = source.next_sample()? {
            samples.push(sample);
        }

        // One-shot key sounds don't warrant a polyphase resampler; linear
        // interpolation to the device rate is plenty.
        let samples = if source_sample_rate != self.target_sample_rate {
            resample(
                &samples,
                channel_count,
                source_sample_rate,
                self.target_sample_rate,
            )
        } else {
            samples
        };

        let loaded = LoadedSample {
            data: Arc::new(samples),
            channel_count,
            sample_rate: self.target_sample_rate,
        };

        info!(
            path = %path.display(),
            channels = channel_count,
            source_rate = source_sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(LoadedSample::memory_size).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Resamples interleaved audio between rates using linear interpolation.
fn resample(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = usize::from(channel_count.max(1));
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }
    output
}

#[cfg(test)]
pub mod test {
    use std::path::Path;

    use super::*;

    /// Writes a mono 16-bit WAV of the given length at the given rate, filled
    /// with a constant value. Used across the crate's tests as a fixture.
    pub fn write_wav(path: &Path, sample_rate: u32, frames: usize, value: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for _ in 0..frames {
            writer
                .write_sample((value * i16::MAX as f32) as i16)
                .expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn test_load_and_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("click.wav");
        write_wav(&path, 44100, 128, 0.5);

        let mut loader = SampleLoader::new(44100);
        let first = loader.load(&path).expect("load");
        assert_eq!(1, first.channel_count());
        assert_eq!(44100, first.sample_rate());
        assert_eq!(128, first.data().len());

        // Second load must come from the cache: same underlying allocation.
        let second = loader.load(&path).expect("load again");
        assert!(Arc::ptr_eq(first.data(), second.data()));
        assert_eq!(first.memory_size(), loader.total_memory_usage());
    }

    #[test]
    fn test_load_resamples_to_target_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("click.wav");
        write_wav(&path, 22050, 100, 0.25);

        let mut loader = SampleLoader::new(44100);
        let loaded = loader.load(&path).expect("load");
        assert_eq!(44100, loaded.sample_rate());
        assert_eq!(200, loaded.data().len());
    }

    #[test]
    fn test_load_missing_file() {
        let mut loader = SampleLoader::new(44100);
        assert!(loader.load(Path::new("/nope/click.wav")).is_err());
    }

    #[test]
    fn test_resample_preserves_constant_signal() {
        let samples = vec![0.5f32; 441];
        let out = resample(&samples, 1, 44100, 48000);
        assert_eq!(480, out.len());
        for sample in out {
            assert!((sample - 0.5).abs() < 0.001);
        }
    }

    #[test]
    fn test_resample_stereo_keeps_channels_apart() {
        // L=1.0, R=-1.0 throughout.
        let samples: Vec<f32> = [1.0f32, -1.0].repeat(64);
        let out = resample(&samples, 2, 44100, 88200);
        assert_eq!(256, out.len());
        for frame in out.chunks(2) {
            assert!(frame[0] > 0.9);
            assert!(frame[1] < -0.9);
        }
    }

    #[test]
    fn test_create_source_skips_lead_in() {
        let loaded = LoadedSample {
            data: Arc::new(vec![1.0; 4410]),
            channel_count: 1,
            sample_rate: 44100,
        };

        // 15ms at 44.1kHz is 662 frames (rounded); the source should render
        // exactly that many fewer frames.
        let (mut mixer, tx) = crate::audio::mixer::AudioMixer::new(1, 44100);
        tx.send(loaded.create_source(1.0, Duration::from_millis(15)))
            .expect("send");
        let mut output = vec![0.0f32; 4410];
        mixer.mix_into(&mut output);

        let rendered = output.iter().filter(|sample| **sample != 0.0).count();
        assert_eq!(4410 - 662, rendered);
    }
}
