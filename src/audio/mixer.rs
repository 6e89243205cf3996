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

//! Core mixing logic shared by the CPAL and mock output devices.
//!
//! The mixer owns the receiving end of the source channel. New playback
//! instances arrive over the channel and are summed into the output until
//! their cursor runs off the end of their buffer; every instance progresses
//! independently and holds its own reference to the (immutable) sample data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

/// Global counter for playback instance IDs, mostly useful in logs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns the next playback instance ID.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// One in-flight rendering of a shared sample buffer. The instance owns its
/// read cursor and amplitude; the buffer itself is shared read-only, so any
/// number of instances can play the same buffer at once.
pub struct PlaybackSource {
    id: u64,
    data: Arc<Vec<f32>>,
    channel_count: usize,
    cursor: usize,
    amplitude: f32,
}

impl PlaybackSource {
    /// Creates a playback instance over shared sample data, starting at the
    /// given frame offset. An offset past the end yields an already-finished
    /// instance rather than a panic.
    pub fn new(
        data: Arc<Vec<f32>>,
        channel_count: u16,
        amplitude: f32,
        start_frame: usize,
    ) -> PlaybackSource {
        let channel_count = usize::from(channel_count.max(1));
        let cursor = (start_frame * channel_count).min(data.len());
        PlaybackSource {
            id: next_source_id(),
            data,
            channel_count,
            cursor,
            amplitude,
        }
    }

    /// Returns this instance's ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True once the cursor has consumed the whole buffer.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// Mixes one frame into the output frame and advances the cursor. Mono
    /// sources fan out to every output channel; other layouts map source
    /// channels onto output channels index-modulo.
    fn mix_frame(&mut self, out_frame: &mut [f32]) {
        if self.is_finished() {
            return;
        }

        if self.channel_count == 1 {
            let sample = self.data[self.cursor] * self.amplitude;
            for out in out_frame.iter_mut() {
                *out += sample;
            }
        } else {
            let remaining = self.data.len() - self.cursor;
            for (out_channel, out) in out_frame.iter_mut().enumerate() {
                let source_channel = out_channel % self.channel_count;
                if source_channel < remaining {
                    *out += self.data[self.cursor + source_channel] * self.amplitude;
                }
            }
        }
        self.cursor += self.channel_count;
    }
}

/// Sums active playback instances into interleaved output buffers.
pub struct AudioMixer {
    channel_count: usize,
    sample_rate: u32,
    source_rx: Receiver<PlaybackSource>,
    active: Vec<PlaybackSource>,
}

impl AudioMixer {
    /// Creates a mixer and the sender half of its source channel. The channel
    /// is unbounded so that trigger submission never blocks; sources are tiny
    /// (a cursor over an Arc) and drain on every callback.
    pub fn new(channel_count: u16, sample_rate: u32) -> (AudioMixer, Sender<PlaybackSource>) {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        (
            AudioMixer {
                channel_count: usize::from(channel_count),
                sample_rate,
                source_rx,
                active: Vec::new(),
            },
            source_tx,
        )
    }

    /// Fills the interleaved output buffer with the sum of all active
    /// instances, zeroing it first. Newly submitted instances are picked up at
    /// the start of the call; finished instances are dropped in place.
    pub fn mix_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);

        while let Ok(source) = self.source_rx.try_recv() {
            self.active.push(source);
        }

        if self.active.is_empty() {
            return;
        }

        for out_frame in output.chunks_mut(self.channel_count) {
            for source in self.active.iter_mut() {
                source.mix_frame(out_frame);
            }
        }
        self.active.retain(|source| !source.is_finished());
    }

    /// Picks up pending instances without producing output. Lets callers
    /// observe the active set before any audio has been rendered.
    pub fn drain_incoming(&mut self) {
        while let Ok(source) = self.source_rx.try_recv() {
            self.active.push(source);
        }
    }

    /// The number of instances currently rendering.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// The number of output channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count as u16
    }

    /// The output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mix_frames(mixer: &mut AudioMixer, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * usize::from(mixer.channel_count())];
        mixer.mix_into(&mut output);
        output
    }

    #[test]
    fn test_mono_fan_out() {
        let (mut mixer, source_tx) = AudioMixer::new(2, 44100);
        source_tx
            .send(PlaybackSource::new(
                Arc::new(vec![0.5, 0.8]),
                1,
                1.0,
                0,
            ))
            .expect("send source");

        let output = mix_frames(&mut mixer, 2);
        assert_eq!(vec![0.5, 0.5, 0.8, 0.8], output);

        // Source is exhausted and dropped.
        assert_eq!(0, mixer.active_count());
        assert_eq!(vec![0.0, 0.0, 0.0, 0.0], mix_frames(&mut mixer, 2));
    }

    #[test]
    fn test_two_sources_mix_and_progress_independently() {
        let (mut mixer, source_tx) = AudioMixer::new(1, 44100);
        let shared = Arc::new(vec![0.25, 0.5, 0.75]);

        // Two instances over the same buffer, one offset by a frame.
        source_tx
            .send(PlaybackSource::new(Arc::clone(&shared), 1, 1.0, 0))
            .expect("send source");
        source_tx
            .send(PlaybackSource::new(Arc::clone(&shared), 1, 1.0, 1))
            .expect("send source");

        let output = mix_frames(&mut mixer, 4);
        // frame 0: 0.25 + 0.5, frame 1: 0.5 + 0.75, frame 2: 0.75 + done.
        assert_eq!(vec![0.75, 1.25, 0.75, 0.0], output);
        assert_eq!(0, mixer.active_count());
    }

    #[test]
    fn test_amplitude_applied() {
        let (mut mixer, source_tx) = AudioMixer::new(1, 44100);
        source_tx
            .send(PlaybackSource::new(Arc::new(vec![1.0]), 1, 0.5, 0))
            .expect("send source");

        assert_eq!(vec![0.5], mix_frames(&mut mixer, 1));
    }

    #[test]
    fn test_offset_past_end_is_finished() {
        let source = PlaybackSource::new(Arc::new(vec![1.0, 1.0]), 1, 1.0, 10);
        assert!(source.is_finished());
    }

    #[test]
    fn test_stereo_to_mono() {
        let (mut mixer, source_tx) = AudioMixer::new(1, 44100);
        source_tx
            .send(PlaybackSource::new(
                Arc::new(vec![0.5, 0.9, 0.1, 0.3]),
                2,
                1.0,
                0,
            ))
            .expect("send source");

        // Index-modulo mapping takes the left channel for the single output.
        assert_eq!(vec![0.5, 0.1], mix_frames(&mut mixer, 2));
    }

    #[test]
    fn test_drain_incoming() {
        let (mut mixer, source_tx) = AudioMixer::new(2, 44100);
        source_tx
            .send(PlaybackSource::new(Arc::new(vec![1.0; 64]), 1, 1.0, 0))
            .expect("send source");

        assert_eq!(0, mixer.active_count());
        mixer.drain_incoming();
        assert_eq!(1, mixer.active_count());
    }
}
