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

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Generates a quiet signal with short full-scale bursts at the given times,
/// the kind of material the onset detector is meant to find.
pub fn generate_impulse_train(times: &[f64], sample_rate: u32, len: usize) -> Vec<f32> {
    let mut samples = vec![0.0; len];
    for t in times {
        let start = (t * f64::from(sample_rate)).round() as usize;
        for sample in samples.iter_mut().skip(start).take(32) {
            *sample = 1.0;
        }
    }
    samples
}

/// Writes interleaved samples to a 16-bit integer WAV file. Panics on I/O
/// errors; this only runs in tests.
pub fn write_wav(path: &Path, samples: &[f32], channels: u16, sample_rate: u32) {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )
    .unwrap();
    for sample in samples {
        let scaled = (sample * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(scaled).unwrap();
    }
    writer.finalize().unwrap();
}
