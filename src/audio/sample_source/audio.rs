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
use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::SampleSourceError;
use super::traits::SampleSource;

/// A sample source that decodes audio files through symphonia. One type covers
/// every container the probe recognizes (WAV, OGG/Vorbis, MP3, FLAC).
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    /// Decoded interleaved samples not yet handed out.
    pending: VecDeque<f32>,
    channels: u16,
    sample_rate: u32,
    duration: Option<std::time::Duration>,
}

impl SampleSource for AudioSampleSource {
    fn next_sample(&mut self) -> Result<Option<f32>, SampleSourceError> {
        while self.pending.is_empty() {
            if self.is_finished {
                return Ok(None);
            }
            self.decode_more()?;
        }
        Ok(self.pending.pop_front())
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<std::time::Duration> {
        self.duration
    }
}

impl AudioSampleSource {
    /// Opens an audio file and prepares it for decoding. The file extension is
    /// passed to the probe as a hint but the container is sniffed either way.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", display, e)))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SampleSourceError::DecodeFailed(display.clone(), e.to_string()))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::DecodeFailed(display.clone(), "no audio track".to_string())
            })?;
        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::DecodeFailed(display.clone(), "sample rate unknown".to_string())
        })?;
        let duration = params
            .n_frames
            .map(|frames| std::time::Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let mut decoder = get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| SampleSourceError::DecodeFailed(display.clone(), e.to_string()))?;

        // Channel metadata may be absent for some containers; in that case
        // decode ahead until the first audio packet reveals the layout.
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut pending = VecDeque::new();
        let channels = if channels > 0 {
            channels
        } else {
            match Self::decode_next_for_track(format_reader.as_mut(), decoder.as_mut(), track_id)? {
                Some((samples, decoded_channels)) => {
                    pending.extend(samples);
                    decoded_channels as u16
                }
                None => {
                    return Err(SampleSourceError::DecodeFailed(
                        display,
                        "channel count unknown".to_string(),
                    ))
                }
            }
        };

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending,
            channels,
            sample_rate,
            duration,
        })
    }

    /// Decodes packets until more samples land in the pending buffer or the
    /// stream ends.
    fn decode_more(&mut self) -> Result<(), SampleSourceError> {
        match Self::decode_next_for_track(
            self.format_reader.as_mut(),
            self.decoder.as_mut(),
            self.track_id,
        )? {
            Some((samples, _)) => self.pending.extend(samples),
            None => self.is_finished = true,
        }
        Ok(())
    }

    /// Reads and decodes the next non-empty packet for the given track.
    /// Returns Ok(None) on end of stream. ResetRequired is handled by
    /// resetting the decoder and retrying.
    fn decode_next_for_track(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
    ) -> Result<Option<(Vec<f32>, usize)>, SampleSourceError> {
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                // Some decoders signal end of stream as a decode error.
                Err(SymphoniaError::DecodeError(_)) => return Ok(None),
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };

            let (samples, channels) = Self::interleave(decoded);
            // Header packets (e.g. Ogg) decode to zero frames; keep reading.
            if channels > 0 && !samples.is_empty() {
                return Ok(Some((samples, channels)));
            }
        }
    }

    /// Converts a decoded buffer of any sample format into interleaved f32
    /// samples, returning the channel count observed in the buffer.
    fn interleave(decoded: AudioBufferRef) -> (Vec<f32>, usize) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::interleave_planar(&buf, |sample| sample),
            AudioBufferRef::F64(buf) => Self::interleave_planar(&buf, |sample| sample as f32),
            AudioBufferRef::S8(buf) => Self::interleave_planar(&buf, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::interleave_planar(&buf, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::interleave_planar(&buf, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::interleave_planar(&buf, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::interleave_planar(&buf, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::interleave_planar(&buf, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::interleave_planar(&buf, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::interleave_planar(&buf, Self::scale_u32),
        }
    }

    fn interleave_planar<T, F>(buf: &AudioBuffer<T>, convert: F) -> (Vec<f32>, usize)
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let channels = buf.spec().channels.count();
        let planes = buf.planes();
        let mut samples = Vec::with_capacity(frames * channels);
        for frame_idx in 0..frames {
            for ch_idx in 0..channels {
                samples.push(convert(planes.planes()[ch_idx][frame_idx]));
            }
        }
        (samples, channels)
    }

    // Scaling helpers for the integer formats.

    #[inline]
    fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
