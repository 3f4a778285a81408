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

//! Output backends. A [`Renderer`] is handed to either a cpal stream or a
//! mock output thread; both keep the stream alive until the handle is
//! dropped.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::{mock, thread_priority, PlaybackError, Renderer};
use crate::playsync::CancelFlag;

/// Device name selecting the default output device.
pub const DEFAULT_DEVICE_NAME: &str = "default";

/// A running output stream. Dropping the handle stops the stream and joins
/// its thread.
pub struct OutputHandle {
    name: String,
    cancel: Arc<CancelFlag>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputHandle {
    pub(crate) fn new(
        name: String,
        cancel: Arc<CancelFlag>,
        thread: thread::JoinHandle<()>,
    ) -> OutputHandle {
        OutputHandle {
            name,
            cancel,
            thread: Some(thread),
        }
    }
}

impl fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A resolved output target. Resolution is the fallible part of starting a
/// stream; keeping it separate lets the caller hold on to its renderer until
/// the device is known to exist.
pub struct ResolvedDevice(Target);

enum Target {
    Mock {
        name: String,
    },
    Cpal {
        device: cpal::Device,
        name: String,
        channels: u16,
    },
}

/// Resolves a device name. Names starting with `mock` select the mock
/// backend (a paced thread driving the same render path), anything else a
/// cpal output device with an f32 default format.
pub fn resolve(device_name: &str) -> Result<ResolvedDevice, PlaybackError> {
    if device_name.starts_with("mock") {
        return Ok(ResolvedDevice(Target::Mock {
            name: device_name.to_string(),
        }));
    }

    let host = cpal::default_host();
    let device = if device_name == DEFAULT_DEVICE_NAME {
        host.default_output_device()
            .ok_or(PlaybackError::NoDefaultDevice)?
    } else {
        host.output_devices()?
            .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| PlaybackError::NoDevice(device_name.to_string()))?
    };

    let supported = device.default_output_config()?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(PlaybackError::UnsupportedFormat(
            supported.sample_format().to_string(),
        ));
    }
    let channels = supported.channels();
    let name = device.name()?;
    Ok(ResolvedDevice(Target::Cpal {
        device,
        name,
        channels,
    }))
}

impl ResolvedDevice {
    /// Starts the output stream. Backend errors after this point surface in
    /// the stream thread's logs, not as a result; the renderer is consumed
    /// either way.
    pub fn start(self, sample_rate: u32, renderer: Renderer) -> OutputHandle {
        match self.0 {
            Target::Mock { name } => mock::start(&name, sample_rate, renderer),
            Target::Cpal {
                device,
                name,
                channels,
            } => start_cpal(device, name, channels, sample_rate, renderer),
        }
    }
}

/// Lists the names of the available cpal output devices.
pub fn list_devices() -> Result<Vec<String>, PlaybackError> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.output_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}

fn start_cpal(
    device: cpal::Device,
    name: String,
    channels: u16,
    sample_rate: u32,
    mut renderer: Renderer,
) -> OutputHandle {
    let config = cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    // Resolve the scheduling request here, on the controlling thread; the
    // callback only applies it.
    let priority = thread_priority::RenderPriority::from_env();

    let cancel = Arc::new(CancelFlag::new());
    // The stream is created and kept on a dedicated thread: cpal streams are
    // not Send, the handle is.
    let thread = {
        let cancel = cancel.clone();
        let name = name.clone();
        thread::spawn(move || {
            let mut priority_set = false;
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    priority.promote(&mut priority_set);
                    renderer.render_block(data, channels as usize);
                },
                |err| error!(error = %err, "Output stream error"),
                None,
            );

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!(device = name, error = %e, "Failed to build output stream");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!(device = name, error = %e, "Failed to start output stream");
                return;
            }
            info!(device = name, sample_rate, channels, "Output stream started");

            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
            info!(device = name, "Output stream stopped");
        })
    };

    OutputHandle::new(name, cancel, thread)
}
