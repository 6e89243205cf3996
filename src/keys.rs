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

//! Canonical key codes.
//!
//! Sound pack defines are keyed by a platform independent code: printable keys
//! use their lowercase character ("a", "1", ";"), everything else uses a fixed
//! sentinel name ("enter", "lshift", "num_1"). Sentinels are always at least
//! two characters long, so they can never collide with the single character
//! printable space.
//!
//! Raw key identifiers arrive in one of three domains depending on the input
//! backend: PS/2 style make codes (low numbers, extended keys in the 0xE000
//! range), evdev style codes (offset by 3000), and macOS virtual key codes
//! (offset by 61000). The table below is the single source of truth for all
//! three; the same physical key normalizes to the same canonical code no
//! matter which domain it arrives in.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Offset applied to the PS/2 column for evdev-domain raw codes.
const EVDEV_OFFSET: u32 = 3000;

/// Offset applied to macOS virtual key codes.
const MACOS_OFFSET: u32 = 61000;

/// One physical key: its PS/2 make code, its macOS virtual key code (when the
/// key exists on that platform), and its canonical code.
struct KeyMapping {
    ps2: u32,
    macos: Option<u32>,
    code: &'static str,
}

const fn key(ps2: u32, macos: u32, code: &'static str) -> KeyMapping {
    KeyMapping {
        ps2,
        macos: Some(macos),
        code,
    }
}

const fn pc_key(ps2: u32, code: &'static str) -> KeyMapping {
    KeyMapping {
        ps2,
        macos: None,
        code,
    }
}

/// The fixed mapping table. PS/2 values are standard set 1 make codes with
/// extended (0xE0-prefixed) keys written out as their full 16-bit value, which
/// is also the convention sound pack authors use.
const KEY_TABLE: &[KeyMapping] = &[
    key(1, 53, "esc"),
    key(2, 18, "1"),
    key(3, 19, "2"),
    key(4, 20, "3"),
    key(5, 21, "4"),
    key(6, 23, "5"),
    key(7, 22, "6"),
    key(8, 26, "7"),
    key(9, 28, "8"),
    key(10, 25, "9"),
    key(11, 29, "0"),
    key(12, 27, "-"),
    key(13, 24, "="),
    key(14, 51, "backspace"),
    key(15, 48, "tab"),
    key(16, 12, "q"),
    key(17, 13, "w"),
    key(18, 14, "e"),
    key(19, 15, "r"),
    key(20, 17, "t"),
    key(21, 16, "y"),
    key(22, 32, "u"),
    key(23, 34, "i"),
    key(24, 31, "o"),
    key(25, 35, "p"),
    key(26, 33, "["),
    key(27, 30, "]"),
    key(28, 36, "enter"),
    key(29, 59, "lctrl"),
    key(30, 0, "a"),
    key(31, 1, "s"),
    key(32, 2, "d"),
    key(33, 3, "f"),
    key(34, 5, "g"),
    key(35, 4, "h"),
    key(36, 38, "j"),
    key(37, 40, "k"),
    key(38, 37, "l"),
    key(39, 41, ";"),
    key(40, 39, "'"),
    key(41, 50, "`"),
    key(42, 56, "lshift"),
    key(43, 42, "\\"),
    key(44, 6, "z"),
    key(45, 7, "x"),
    key(46, 8, "c"),
    key(47, 9, "v"),
    key(48, 11, "b"),
    key(49, 45, "n"),
    key(50, 46, "m"),
    key(51, 43, ","),
    key(52, 47, "."),
    key(53, 44, "/"),
    key(54, 60, "rshift"),
    key(55, 67, "num_multiply"),
    key(56, 58, "lalt"),
    key(57, 49, "space"),
    key(58, 57, "caps"),
    key(59, 122, "f1"),
    key(60, 120, "f2"),
    key(61, 99, "f3"),
    key(62, 118, "f4"),
    key(63, 96, "f5"),
    key(64, 97, "f6"),
    key(65, 98, "f7"),
    key(66, 100, "f8"),
    key(67, 101, "f9"),
    key(68, 109, "f10"),
    key(69, 71, "numlock"),
    pc_key(70, "scrolllock"),
    key(71, 89, "num_7"),
    key(72, 91, "num_8"),
    key(73, 92, "num_9"),
    key(74, 78, "num_minus"),
    key(75, 86, "num_4"),
    key(76, 87, "num_5"),
    key(77, 88, "num_6"),
    key(78, 69, "num_plus"),
    key(79, 83, "num_1"),
    key(80, 84, "num_2"),
    key(81, 85, "num_3"),
    key(82, 82, "num_0"),
    key(83, 65, "num_dot"),
    key(87, 103, "f11"),
    key(88, 111, "f12"),
    key(0xE01C, 76, "num_enter"),
    key(0xE01D, 62, "rctrl"),
    key(0xE035, 75, "num_divide"),
    pc_key(0xE037, "prtsc"),
    key(0xE038, 61, "ralt"),
    key(0xE047, 115, "home"),
    key(0xE048, 126, "up"),
    key(0xE049, 116, "pgup"),
    key(0xE04B, 123, "left"),
    key(0xE04D, 124, "right"),
    key(0xE04F, 119, "end"),
    key(0xE050, 125, "down"),
    key(0xE051, 121, "pgdn"),
    pc_key(0xE052, "insert"),
    key(0xE053, 117, "delete"),
    key(0xE05B, 55, "lmeta"),
    key(0xE05C, 54, "rmeta"),
    pc_key(0xE05D, "menu"),
];

/// Numpad sentinels and the main-row code each folds onto when a pack does not
/// distinguish the numpad.
const NUMPAD_FOLDS: &[(&str, &str)] = &[
    ("num_0", "0"),
    ("num_1", "1"),
    ("num_2", "2"),
    ("num_3", "3"),
    ("num_4", "4"),
    ("num_5", "5"),
    ("num_6", "6"),
    ("num_7", "7"),
    ("num_8", "8"),
    ("num_9", "9"),
    ("num_dot", "."),
    ("num_minus", "-"),
    ("num_divide", "/"),
    ("num_enter", "enter"),
];

fn raw_index() -> &'static HashMap<u32, &'static str> {
    static INDEX: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for mapping in KEY_TABLE {
            index.insert(mapping.ps2, mapping.code);
            index.insert(mapping.ps2 + EVDEV_OFFSET, mapping.code);
            if let Some(macos) = mapping.macos {
                index.insert(macos + MACOS_OFFSET, mapping.code);
            }
        }
        index
    })
}

/// Normalizes a raw key identifier from any of the three supported domains
/// into its canonical code. Unknown raw codes return None; it's the caller's
/// job to drop (and optionally log) the event.
pub fn normalize(raw: u32) -> Option<&'static str> {
    raw_index().get(&raw).copied()
}

/// Character mode normalization: when the platform event carries a printable
/// character, the canonical code is that character, lowercased. Whitespace and
/// control characters fall through to the sentinel table, as do events with no
/// character at all.
pub fn normalize_char(raw: u32, character: Option<char>) -> Option<String> {
    if let Some(c) = character {
        if !c.is_whitespace() && !c.is_control() {
            return Some(c.to_lowercase().collect());
        }
    }
    normalize(raw).map(str::to_string)
}

/// Folds a numpad sentinel onto its main-row equivalent. Codes that are not
/// numpad sentinels pass through unchanged.
pub fn fold_numpad(code: &str) -> &str {
    NUMPAD_FOLDS
        .iter()
        .find(|(numpad, _)| *numpad == code)
        .map(|(_, folded)| *folded)
        .unwrap_or(code)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_same_key_across_domains() {
        for mapping in KEY_TABLE {
            assert_eq!(Some(mapping.code), normalize(mapping.ps2));
            assert_eq!(Some(mapping.code), normalize(mapping.ps2 + EVDEV_OFFSET));
            if let Some(macos) = mapping.macos {
                assert_eq!(Some(mapping.code), normalize(macos + MACOS_OFFSET));
            }
        }
    }

    #[test]
    fn test_unknown_raw_code() {
        assert_eq!(None, normalize(0));
        assert_eq!(None, normalize(999));
        assert_eq!(None, normalize(u32::MAX));
    }

    #[test]
    fn test_one_code_per_key() {
        let mut seen = HashSet::new();
        for mapping in KEY_TABLE {
            assert!(
                seen.insert(mapping.code),
                "duplicate canonical code {}",
                mapping.code
            );
        }
    }

    #[test]
    fn test_sentinels_never_collide_with_printables() {
        // Printable codes are exactly one character; every sentinel is longer.
        for mapping in KEY_TABLE {
            if mapping.code.chars().count() > 1 {
                assert!(mapping.code.len() >= 2);
                assert!(mapping.code.chars().all(|c| c.is_ascii_lowercase()
                    || c.is_ascii_digit()
                    || c == '_'));
            }
        }
    }

    #[test]
    fn test_normalize_char_prefers_character() {
        assert_eq!(Some("a".to_string()), normalize_char(30, Some('A')));
        assert_eq!(Some(";".to_string()), normalize_char(39, Some(';')));

        // Whitespace and control characters fall back to sentinels.
        assert_eq!(Some("space".to_string()), normalize_char(57, Some(' ')));
        assert_eq!(Some("enter".to_string()), normalize_char(28, Some('\r')));
        assert_eq!(
            Some("backspace".to_string()),
            normalize_char(14, Some('\u{8}'))
        );

        // No character, no sentinel: dropped.
        assert_eq!(None, normalize_char(999, None));
    }

    #[test]
    fn test_fold_numpad() {
        assert_eq!("1", fold_numpad("num_1"));
        assert_eq!(".", fold_numpad("num_dot"));
        assert_eq!("enter", fold_numpad("num_enter"));
        assert_eq!("a", fold_numpad("a"));
        assert_eq!("enter", fold_numpad("enter"));
    }
}
