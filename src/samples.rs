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

//! The per-pack audio buffer cache.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use crate::config::{ConfigType, SoundPack};

pub mod loader;

pub use loader::{LoadedSample, SampleLoader};

/// Typed error for cache construction.
#[derive(Debug, thiserror::Error)]
pub enum SamplesError {
    #[error("no sounds could be loaded for pack {0}")]
    NoSoundsLoaded(String),
}

/// The decoded buffers for one sound pack, keyed by canonical key code. Built
/// once when a pack is activated and immutable afterwards; switching packs
/// replaces the whole cache.
pub struct PackCache {
    /// Buffers for exactly mapped codes.
    by_code: BTreeMap<String, LoadedSample>,
    /// Buffers by pack-relative file reference, for resolving the pack's
    /// fallback rule against files that did decode.
    by_file: HashMap<String, LoadedSample>,
    /// The first successfully decoded buffer in define order; used whenever
    /// nothing more specific matches.
    default: LoadedSample,
}

impl PackCache {
    /// Decodes every sample the pack references, one decode per distinct
    /// file. Files that fail to decode are logged and their codes left
    /// unmapped; the build only fails when nothing decoded at all.
    pub fn build(pack: &SoundPack, loader: &mut SampleLoader) -> Result<PackCache, SamplesError> {
        let mut by_code = BTreeMap::new();
        let mut by_file = HashMap::new();
        let mut default = None;

        match pack.config_type() {
            ConfigType::Single => match loader.load(&pack.sample_path(pack.sound())) {
                Ok(sample) => {
                    by_file.insert(pack.sound().to_string(), sample.clone());
                    default = Some(sample);
                }
                Err(e) => {
                    warn!(pack = pack.id(), sound = pack.sound(), error = %e,
                        "Failed to decode pack sound");
                }
            },
            ConfigType::Multiple => {
                // Define order is lexicographic by code, which makes the
                // default buffer deterministic.
                for (code, sample_file) in pack.defines() {
                    let Some(sample_file) = sample_file else {
                        continue;
                    };

                    match loader.load(&pack.sample_path(sample_file)) {
                        Ok(sample) => {
                            by_code.insert(code.clone(), sample.clone());
                            by_file.insert(sample_file.clone(), sample.clone());
                            default.get_or_insert(sample);
                        }
                        Err(e) => {
                            warn!(pack = pack.id(), code = %code, file = %sample_file, error = %e,
                                "Failed to decode sample, leaving code unmapped");
                        }
                    }
                }
            }
        }

        let Some(default) = default else {
            return Err(SamplesError::NoSoundsLoaded(pack.id().to_string()));
        };

        info!(
            pack = pack.id(),
            mapped_codes = by_code.len(),
            distinct_files = by_file.len(),
            "Pack cache built"
        );

        Ok(PackCache {
            by_code,
            by_file,
            default,
        })
    }

    /// Resolves a canonical key code to a buffer: exact cache hit first, then
    /// the pack's own fallback rule looked up by file, then the default
    /// buffer.
    pub fn buffer_for(&self, pack: &SoundPack, code: &str) -> &LoadedSample {
        if let Some(sample) = self.by_code.get(code) {
            return sample;
        }
        if let Some(sample) = pack
            .resolve(code)
            .and_then(|sample_file| self.by_file.get(sample_file))
        {
            return sample;
        }
        &self.default
    }

    /// The number of exactly mapped codes.
    pub fn mapped_codes(&self) -> usize {
        self.by_code.len()
    }
}
