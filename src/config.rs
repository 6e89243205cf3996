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
use std::fs;
use std::path::Path;

use tracing::warn;

pub mod error;
mod pack;

pub use error::ConfigError;
pub use pack::{ConfigType, SoundPack};

/// The descriptor file that marks a directory as a sound pack.
const PACK_DESCRIPTOR: &str = "config.json";

/// Recurses into the given directory and returns all valid sound packs found,
/// sorted by name. Individual bad packs are logged and skipped; the scan only
/// fails when nothing usable was found at all.
pub fn scan_packs(root: &Path) -> Result<Vec<SoundPack>, ConfigError> {
    let mut packs = Vec::new();
    scan_into(root, &mut packs)?;

    if packs.is_empty() {
        return Err(ConfigError::NoPacksFound(root.to_path_buf()));
    }

    packs.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(packs)
}

fn scan_into(dir: &Path, packs: &mut Vec<SoundPack>) -> Result<(), ConfigError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            scan_into(&path, packs)?;
        } else if path.file_name().is_some_and(|name| name == PACK_DESCRIPTOR) {
            match SoundPack::load(&path) {
                Ok(pack) => packs.push(pack),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid sound pack")
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn write_pack(root: &Path, dir: &str, contents: &str) {
        let pack_dir = root.join(dir);
        fs::create_dir_all(&pack_dir).expect("create pack dir");
        fs::write(pack_dir.join(PACK_DESCRIPTOR), contents).expect("write descriptor");
    }

    #[test]
    fn test_scan_finds_nested_packs_and_skips_invalid() {
        let root = tempfile::tempdir().expect("tempdir");
        write_pack(
            root.path(),
            "typewriter",
            r#"{"id": "tw", "name": "Typewriter", "sound_key_type": "multiple",
                "defines": {"a": "a.wav"}}"#,
        );
        write_pack(
            root.path(),
            "more/blue-switch",
            r#"{"id": "blue", "name": "Blue Switch", "sound_key_type": "single",
                "sound": "click.wav"}"#,
        );
        // Structurally broken, should be skipped rather than failing the scan.
        write_pack(root.path(), "broken", "{not json");

        let packs = scan_packs(root.path()).expect("scan");
        let names: Vec<&str> = packs.iter().map(SoundPack::name).collect();
        assert_eq!(vec!["Blue Switch", "Typewriter"], names);
    }

    #[test]
    fn test_scan_fails_when_no_packs() {
        let root = tempfile::tempdir().expect("tempdir");
        write_pack(root.path(), "broken", "{not json");

        assert!(matches!(
            scan_packs(root.path()),
            Err(ConfigError::NoPacksFound(_))
        ));
    }
}
