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
mod audio;
mod config;
mod controller;
mod hook;
mod keys;
mod player;
mod playsync;
mod samples;
#[cfg(test)]
mod test;

use std::error::Error;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::SoundPack;
use crate::controller::{Command, Controller};
use crate::player::Player;
use crate::playsync::CancelHandle;
use crate::samples::{PackCache, SampleLoader};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A mechanical keyboard sound simulator."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the sound packs found in the given directory.
    Packs {
        /// The path to the sound pack repository on disk.
        path: String,
    },
    /// Start will start the keyboard sound daemon.
    Start {
        /// The path to the sound pack repository on disk.
        path: String,
        /// The output device name to play through. Defaults to the system
        /// default output device.
        #[arg(short, long)]
        device: Option<String>,
        /// The name of the sound pack to start with. Defaults to the first
        /// pack found.
        #[arg(short, long)]
        pack: Option<String>,
        /// The initial volume percent (0-200, 100 = unity).
        #[arg(short, long)]
        volume: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Packs { path } => {
            let packs = config::scan_packs(&PathBuf::from(&path))?;

            println!("Sound packs (count: {}):", packs.len());
            for pack in packs {
                println!(
                    "- {} (id: {}, keys: {:?}, defines: {})",
                    pack.name(),
                    pack.id(),
                    pack.config_type(),
                    pack.defines().len(),
                );
            }
        }
        Commands::Start {
            path,
            device,
            pack,
            volume,
        } => {
            start(path, device, pack, volume).await?;
        }
    }

    Ok(())
}

/// Runs the daemon until Ctrl-C or a quit command.
async fn start(
    path: String,
    device_name: Option<String>,
    pack_name: Option<String>,
    volume: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let packs = config::scan_packs(&PathBuf::from(&path))?;
    let device = audio::get_device(device_name.as_deref())?;
    let mut loader = SampleLoader::new(device.sample_rate());

    let initial = match &pack_name {
        Some(name) => packs
            .iter()
            .find(|pack| pack.name() == name)
            .ok_or_else(|| format!("no sound pack named {}", name))?
            .clone(),
        None => packs[0].clone(),
    };
    let cache = PackCache::build(&initial, &mut loader)?;

    let player = Arc::new(Player::new(device));
    if let Some(volume) = volume {
        player.set_volume(volume);
    }
    player.switch_pack(initial.clone(), cache);

    let cancel_handle = CancelHandle::new();
    let controller = Controller::new(
        Arc::clone(&player),
        hook::get_hook(None),
        cancel_handle.clone(),
    )?;

    monitor_commands(
        Arc::clone(&player),
        packs,
        Mutex::new(loader),
        cancel_handle.clone(),
    );

    info!(
        pack = initial.name(),
        volume = player.volume(),
        "keyclack started. Type 'volume <0-200>', 'pack <name>' or 'quit'; Ctrl-C exits."
    );

    loop {
        if cancel_handle.is_cancelled() {
            break;
        }
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                cancel_handle.cancel();
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    controller.join().await?;
    player.shutdown();
    Ok(())
}

/// Watches stdin for shell commands on a plain thread; the thread dies with
/// the process.
fn monitor_commands(
    player: Arc<Player>,
    packs: Vec<SoundPack>,
    loader: Mutex<SampleLoader>,
    cancel_handle: CancelHandle,
) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                return;
            };

            match controller::parse_command(&line) {
                Some(Command::Volume(percent)) => player.set_volume(percent),
                Some(Command::Pack(name)) => switch_pack(&player, &packs, &loader, &name),
                Some(Command::Quit) => {
                    cancel_handle.cancel();
                    return;
                }
                None => {
                    if !line.trim().is_empty() {
                        warn!(input = line, "Unrecognized command");
                    }
                }
            }
        }
    });
}

/// Builds the named pack's cache and makes it active. Failures are logged and
/// the previous pack stays active.
fn switch_pack(player: &Player, packs: &[SoundPack], loader: &Mutex<SampleLoader>, name: &str) {
    let Some(pack) = packs.iter().find(|pack| pack.name() == name) else {
        warn!(name, "No such sound pack");
        return;
    };

    match PackCache::build(pack, &mut loader.lock()) {
        Ok(cache) => player.switch_pack(pack.clone(), cache),
        Err(e) => error!(pack = pack.name(), error = %e, "Could not activate sound pack"),
    }
}
