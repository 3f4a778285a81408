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

//! A mock output backend: a paced thread driving the render path at real
//! time, without any audio hardware. Used in tests and headless setups.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;

use super::device::OutputHandle;
use super::Renderer;
use crate::playsync::CancelFlag;

/// Frames rendered per mock callback.
const BLOCK_FRAMES: usize = 512;

/// Starts the mock output. It invokes the renderer at the cadence a real
/// device would, so timing-sensitive behavior (advisory stop, buffer-swap
/// acknowledgement) is exercised the same way.
pub fn start(name: &str, sample_rate: u32, mut renderer: Renderer) -> OutputHandle {
    let cancel = Arc::new(CancelFlag::new());
    let block_duration = Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate.max(1) as f64);

    let thread = {
        let cancel = cancel.clone();
        let name = name.to_string();
        thread::spawn(move || {
            info!(device = name, sample_rate, "Mock output started");
            let mut block = vec![0.0f32; BLOCK_FRAMES];
            while !cancel.is_cancelled() {
                renderer.render(&mut block);
                spin_sleep::sleep(block_duration);
            }
            info!(device = name, "Mock output stopped");
        })
    };

    OutputHandle::new(format!("{} (mock)", name), cancel, thread)
}
