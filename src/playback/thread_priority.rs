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
use tracing::info;

/// Default priority for the render thread when RESLICER_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// The render thread's scheduling request, resolved from the environment
/// once when the output stream is built so the callback never touches env.
pub(crate) struct RenderPriority {
    priority: ThreadPriority,
    #[cfg_attr(not(unix), allow(dead_code))]
    rt_audio: bool,
}

impl RenderPriority {
    /// Reads RESLICER_THREAD_PRIORITY and RESLICER_DISABLE_RT_AUDIO. Call
    /// from the controlling thread, not the render path.
    pub(crate) fn from_env() -> RenderPriority {
        let priority = match ThreadPriorityValue::try_from(configured_priority()) {
            Ok(value) => ThreadPriority::Crossplatform(value),
            Err(_) => ThreadPriority::Max,
        };
        RenderPriority {
            priority,
            rt_audio: rt_audio_enabled(),
        }
    }

    /// Promotes the calling thread for audio rendering. Runs once, on the
    /// first callback invocation, which is why it holds the `priority_set`
    /// guard; every value it needs was resolved up front.
    pub(crate) fn promote(&self, priority_set: &mut bool) {
        if *priority_set {
            return;
        }
        *priority_set = true;

        let tp = self.priority;
        let _ = set_current_thread_priority(tp);

        #[cfg(unix)]
        if self.rt_audio {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            let tid = thread_native_id();
            match set_thread_priority_and_policy(
                tid,
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => {
                    info!("Enabled RT SCHED_FIFO for audio render thread");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to set RT SCHED_FIFO for audio render thread"
                    );
                }
            }
        }
    }
}

/// Reads RESLICER_THREAD_PRIORITY, falling back to the default for unset,
/// unparseable, or out-of-range (>= 100) values.
fn configured_priority() -> u8 {
    std::env::var("RESLICER_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_RENDER_THREAD_PRIORITY)
}

/// Whether to attempt RT (SCHED_FIFO) scheduling for the render thread.
/// Default: enabled. Opt out with RESLICER_DISABLE_RT_AUDIO=1.
fn rt_audio_enabled() -> bool {
    !std::env::var("RESLICER_DISABLE_RT_AUDIO")
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_configured_priority_parsing() {
        std::env::remove_var("RESLICER_THREAD_PRIORITY");
        assert_eq!(configured_priority(), DEFAULT_RENDER_THREAD_PRIORITY);
        std::env::set_var("RESLICER_THREAD_PRIORITY", "42");
        assert_eq!(configured_priority(), 42);
        // Out-of-range and garbage fall back to the default.
        std::env::set_var("RESLICER_THREAD_PRIORITY", "150");
        assert_eq!(configured_priority(), DEFAULT_RENDER_THREAD_PRIORITY);
        std::env::set_var("RESLICER_THREAD_PRIORITY", "loud");
        assert_eq!(configured_priority(), DEFAULT_RENDER_THREAD_PRIORITY);
        std::env::remove_var("RESLICER_THREAD_PRIORITY");
    }
}
