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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the audio output thread when KEYCLACK_THREAD_PRIORITY is unset.
const DEFAULT_OUTPUT_THREAD_PRIORITY: u8 = 70;

/// Reads KEYCLACK_THREAD_PRIORITY (0-99) once, before the stream starts, so we
/// don't touch env in the callback path.
fn output_thread_priority() -> ThreadPriorityValue {
    std::env::var("KEYCLACK_THREAD_PRIORITY")
        .ok()
        .and_then(|v| {
            let n = v.parse::<u8>().ok()?;
            (n < 100).then(|| ThreadPriorityValue::try_from(n).ok())?
        })
        .unwrap_or_else(|| {
            ThreadPriorityValue::try_from(DEFAULT_OUTPUT_THREAD_PRIORITY)
                .expect("default priority is valid")
        })
}

/// Raises the calling thread's priority for audio output. Failure is logged
/// and tolerated; playback still works at normal priority, just with less
/// headroom against scheduling jitter.
pub fn promote_output_thread() {
    let priority = ThreadPriority::Crossplatform(output_thread_priority());
    match set_current_thread_priority(priority) {
        Ok(()) => info!("Raised audio output thread priority"),
        Err(e) => warn!(error = ?e, "Failed to raise audio output thread priority"),
    }
}
