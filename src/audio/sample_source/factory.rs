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
use std::path::Path;

use super::audio::AudioSampleSource;
use super::error::SampleSourceError;
use super::traits::SampleSource;

/// Extensions a sound pack is allowed to reference. Decoder selection happens
/// by suffix; anything else is a per-file error, not a fatal one.
const SUPPORTED_EXTENSIONS: [&str; 4] = ["wav", "ogg", "mp3", "flac"];

/// Create a SampleSource for the given file, selecting the decoder by file
/// suffix.
pub fn create_sample_source_from_file<P: AsRef<Path>>(
    path: P,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SampleSourceError::UnsupportedFormat(extension));
    }

    Ok(Box::new(AudioSampleSource::from_file(path)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rejects_unknown_suffix() {
        assert!(matches!(
            create_sample_source_from_file("sound.aiff"),
            Err(SampleSourceError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            create_sample_source_from_file("noext"),
            Err(SampleSourceError::UnsupportedFormat(_))
        ));
    }
}
