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

//! The immutable mono sample buffer shared between the engine and the audio thread.

use std::time::Duration;

use tracing::warn;

/// Fallback rate when a decoder hands us a zero sample rate.
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// A single-channel audio recording. Created once at load time and never
/// mutated afterwards, which is what makes sharing it with the audio render
/// thread safe without any locking.
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a new sample buffer. A zero sample rate is replaced with
    /// 44.1kHz so that duration math stays defined.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> SampleBuffer {
        let sample_rate = if sample_rate == 0 {
            warn!(
                fallback = FALLBACK_SAMPLE_RATE,
                "Zero sample rate on buffer load, using fallback"
            );
            FALLBACK_SAMPLE_RATE
        } else {
            sample_rate
        };
        SampleBuffer {
            samples,
            sample_rate,
        }
    }

    /// An empty buffer, the engine's initial state.
    pub fn empty() -> SampleBuffer {
        SampleBuffer::new(Vec::new(), FALLBACK_SAMPLE_RATE)
    }

    /// The raw mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// The number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer holds no audio.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sample rate in Hz. Always positive.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The buffer duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// The buffer duration as a `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds())
    }
}
