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
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;

/// How a pack maps keys to samples.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// One sample triggers on any key.
    Single,
    /// Per-key samples via the defines mapping.
    Multiple,
}

/// A JSON representation of one sound pack descriptor (config.json).
///
/// The defines mapping is ordered so that the "first non-null sample" fallback
/// is deterministic: lexicographic by canonical key code.
#[derive(Deserialize, Clone, Debug)]
pub struct SoundPack {
    /// Stable identifier for the pack.
    id: String,

    /// Human readable pack name.
    name: String,

    /// The pack kind.
    #[serde(rename = "sound_key_type")]
    config_type: ConfigType,

    /// Whether numpad keys are mapped distinctly from the main row.
    #[serde(default)]
    includes_numpad: bool,

    /// Demo sample; for single packs this is the one sample.
    #[serde(default)]
    sound: String,

    /// Canonical key code to sample file. An explicit null means "no sound
    /// for this key", which is distinct from the key being unmapped.
    #[serde(default)]
    defines: BTreeMap<String, Option<String>>,

    /// The directory this pack was loaded from; sample paths are relative
    /// to it.
    #[serde(skip)]
    directory: PathBuf,
}

impl SoundPack {
    /// Loads a sound pack descriptor from the given file and validates it.
    pub fn load(path: &Path) -> Result<SoundPack, ConfigError> {
        let mut pack: SoundPack = serde_json::from_str(&fs::read_to_string(path)?)?;
        pack.directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        pack.validate()?;
        Ok(pack)
    }

    /// A pack must be able to produce at least one sound or it's useless:
    /// single packs need a sound file, multiple packs need at least one
    /// non-null define.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.config_type {
            ConfigType::Single => {
                if self.sound.is_empty() {
                    return Err(ConfigError::InvalidConfig(format!(
                        "single pack {} has no sound file",
                        self.id
                    )));
                }
            }
            ConfigType::Multiple => {
                if !self.defines.values().any(|sample| sample.is_some()) {
                    return Err(ConfigError::InvalidConfig(format!(
                        "pack {} defines no usable sounds",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolves a canonical key code to a sample file. An exact non-null match
    /// wins; otherwise the first non-null sample in lexicographic code order
    /// is the deterministic default. Single packs always resolve to their one
    /// sound.
    pub fn resolve(&self, code: &str) -> Option<&str> {
        match self.config_type {
            ConfigType::Single => Some(&self.sound),
            ConfigType::Multiple => self
                .defines
                .get(code)
                .and_then(|sample| sample.as_deref())
                .or_else(|| {
                    self.defines
                        .values()
                        .find_map(|sample| sample.as_deref())
                }),
        }
    }

    /// Returns the pack identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the pack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pack kind.
    pub fn config_type(&self) -> ConfigType {
        self.config_type
    }

    /// Returns whether this pack maps numpad keys distinctly.
    pub fn includes_numpad(&self) -> bool {
        self.includes_numpad
    }

    /// Returns the demo/single sample file.
    pub fn sound(&self) -> &str {
        &self.sound
    }

    /// Returns the defines mapping.
    pub fn defines(&self) -> &BTreeMap<String, Option<String>> {
        &self.defines
    }

    /// Resolves a pack-relative sample file to a full path.
    pub fn sample_path(&self, file: &str) -> PathBuf {
        self.directory.join(file)
    }
}

#[cfg(test)]
impl SoundPack {
    /// Creates a pack directly (test only).
    pub fn new(
        id: &str,
        name: &str,
        config_type: ConfigType,
        includes_numpad: bool,
        sound: &str,
        defines: BTreeMap<String, Option<String>>,
        directory: PathBuf,
    ) -> SoundPack {
        SoundPack {
            id: id.to_string(),
            name: name.to_string(),
            config_type,
            includes_numpad,
            sound: sound.to_string(),
            defines,
            directory,
        }
    }
}
