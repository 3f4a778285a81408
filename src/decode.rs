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

//! The decoder collaborator: WAV in, mono [`SampleBuffer`] out. The engine
//! itself never parses file formats; this module is the one place the CLI
//! turns a file into samples.

use std::path::Path;

use tracing::info;

use crate::buffer::SampleBuffer;
use crate::util;

/// Errors from decoding an audio file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("file has no audio channels")]
    NoChannels,
}

/// Reads a WAV file and mixes it down to a mono sample buffer at the file's
/// native sample rate. Multi-channel input is averaged across channels.
pub fn decode_wav_mono(path: &Path) -> Result<SampleBuffer, DecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(DecodeError::UnsupportedBitDepth(spec.bits_per_sample));
            }
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let mono: Vec<f32> = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    info!(
        file = util::filename_display(path),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        frames = mono.len(),
        "Decoded audio file"
    );
    Ok(SampleBuffer::new(mono, spec.sample_rate))
}
