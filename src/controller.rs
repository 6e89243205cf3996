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

//! The dispatch loop: connects the key hook's bounded queue to the player.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tokio::task::JoinHandle;
use tracing::{info, span, warn, Level};

use crate::hook::{Hook, HookError, KEY_QUEUE_CAPACITY};
use crate::player::Player;
use crate::playsync::CancelHandle;

/// How often the dispatch loop wakes up to check for cancellation.
const DISPATCH_TICK: Duration = Duration::from_millis(100);

/// Commands the shell can issue while the daemon runs.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Sets the volume percent.
    Volume(u32),
    /// Switches to the named pack.
    Pack(String),
    /// Shuts the daemon down.
    Quit,
}

/// Parses a shell command line. Unrecognized input yields None.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (command, argument) = match line.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command.to_lowercase().as_str() {
        "volume" => argument.parse().ok().map(Command::Volume),
        "pack" if !argument.is_empty() => Some(Command::Pack(argument.to_string())),
        "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

/// Owns the hook and the dispatch loop that consumes its queue.
pub struct Controller {
    hook: Arc<dyn Hook>,
    dispatch: JoinHandle<()>,
}

impl Controller {
    /// Starts the hook and the dispatch loop. The cancel handle stops both:
    /// the hook goes inert immediately and the loop exits on its next tick.
    pub fn new(
        player: Arc<Player>,
        hook: Arc<dyn Hook>,
        cancel_handle: CancelHandle,
    ) -> Result<Controller, HookError> {
        let (keys_tx, keys_rx) = crossbeam_channel::bounded(KEY_QUEUE_CAPACITY);
        hook.start(keys_tx)?;

        let dispatch = tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "dispatch");
            let _enter = span.enter();

            info!("Dispatch loop started.");

            loop {
                if cancel_handle.is_cancelled() {
                    break;
                }

                match keys_rx.recv_timeout(DISPATCH_TICK) {
                    Ok(code) => {
                        if let Err(e) = player.trigger(&code) {
                            // Not fatal; keep dispatching.
                            warn!(error = %e, "Trigger failed");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            info!("Dispatch loop stopped.");
        });

        Ok(Controller { hook, dispatch })
    }

    /// Waits for the dispatch loop to finish, then stops the hook.
    pub async fn join(self) -> Result<(), Box<dyn Error>> {
        self.dispatch.await?;
        if let Err(e) = self.hook.stop() {
            warn!(error = %e, "Error stopping key hook");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use crate::audio::mock as mock_audio;
    use crate::config::{ConfigType, SoundPack};
    use crate::hook::mock as mock_hook;
    use crate::samples::loader::test::write_wav;
    use crate::samples::{PackCache, SampleLoader};
    use crate::test::eventually;

    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(Some(Command::Volume(150)), parse_command("volume 150"));
        assert_eq!(Some(Command::Volume(0)), parse_command(" volume 0 "));
        assert_eq!(
            Some(Command::Pack("Cherry MX".to_string())),
            parse_command("pack Cherry MX")
        );
        assert_eq!(Some(Command::Quit), parse_command("quit"));
        assert_eq!(Some(Command::Quit), parse_command("EXIT"));

        assert_eq!(None, parse_command(""));
        assert_eq!(None, parse_command("pack"));
        assert_eq!(None, parse_command("volume loud"));
        assert_eq!(None, parse_command("unknown"));
    }

    fn player_with_pack(device: Arc<mock_audio::Device>) -> Arc<Player> {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wav(&dir.path().join("key.wav"), 44100, 4096, 0.5);
        let pack = SoundPack::new(
            "pack",
            "pack",
            ConfigType::Multiple,
            false,
            "",
            BTreeMap::from([("a".to_string(), Some("key.wav".to_string()))]),
            dir.path().to_path_buf(),
        );
        let mut loader = SampleLoader::new(44100);
        let cache = PackCache::build(&pack, &mut loader).expect("build cache");

        let player = Arc::new(Player::new(device as Arc<dyn crate::audio::Device>));
        player.switch_pack(pack, cache);
        player
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_key_events_trigger_playback() {
        let device = Arc::new(mock_audio::Device::get("mock"));
        let player = player_with_pack(Arc::clone(&device));
        let hook = Arc::new(mock_hook::Hook::get("mock"));
        let cancel_handle = CancelHandle::new();

        let controller = Controller::new(
            Arc::clone(&player),
            Arc::clone(&hook) as Arc<dyn Hook>,
            cancel_handle.clone(),
        )
        .expect("controller");

        // One held key with auto-repeat: exactly one playback instance.
        hook.press(30);
        hook.press(30);
        hook.press(30);
        eventually(
            || device.active_count() == 1,
            "expected one playback instance",
        );

        // Release and press again: a second, overlapping instance.
        hook.release(30);
        hook.press(30);
        eventually(
            || device.active_count() == 2,
            "expected two playback instances",
        );

        cancel_handle.cancel();
        controller.join().await.expect("join");

        // The hook was stopped by join.
        assert_eq!(Err(HookError::NotStarted), hook.stop());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_terminates_dispatch() {
        let device = Arc::new(mock_audio::Device::get("mock"));
        let player = player_with_pack(device);
        let hook = Arc::new(mock_hook::Hook::get("mock"));
        let cancel_handle = CancelHandle::new();

        let controller = Controller::new(player, hook, cancel_handle.clone()).expect("controller");

        cancel_handle.cancel();
        // join resolves promptly once cancelled; a hang here fails the test
        // via the harness timeout.
        controller.join().await.expect("join");
    }
}
