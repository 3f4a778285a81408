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

//! Onset/tempo detection as a capability interface. The engine treats the
//! detector as a black box: anything that can turn a sample buffer into raw
//! onset timestamps (and optionally a tempo estimate) plugs in here, from a
//! full signal-processing library down to a fixed stub in tests.

/// The result of analyzing a sample buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    /// Raw (unquantized) onset timestamps in seconds, ascending.
    pub onsets: Vec<f64>,
    /// Estimated tempo in beats per minute, when the detector produced one.
    pub bpm: Option<f64>,
}

/// A detector capable of finding onsets (and possibly a tempo) in a mono
/// recording.
pub trait OnsetDetector {
    fn analyze(&self, samples: &[f32], sample_rate: u32) -> Analysis;
}

/// A deterministic energy-rise detector. It scans the signal hop by hop and
/// reports an onset wherever the short-term energy jumps above a multiple of
/// its trailing average, with a refractory window to avoid double triggers.
/// Deliberately simple; it stands in for a real analysis library behind the
/// same interface.
pub struct EnergyDetector {
    hop_size: usize,
    /// An onset fires when hop energy exceeds the trailing average by this factor.
    threshold: f32,
    /// Minimum spacing between reported onsets, in seconds.
    refractory_seconds: f64,
}

impl Default for EnergyDetector {
    fn default() -> EnergyDetector {
        EnergyDetector {
            hop_size: 512,
            threshold: 4.0,
            refractory_seconds: 0.05,
        }
    }
}

impl OnsetDetector for EnergyDetector {
    fn analyze(&self, samples: &[f32], sample_rate: u32) -> Analysis {
        if samples.is_empty() || sample_rate == 0 {
            return Analysis::default();
        }

        let mut onsets = Vec::new();
        let mut trailing: f32 = 0.0;
        let mut hops_seen: u32 = 0;
        let mut last_onset = f64::NEG_INFINITY;

        for (hop_index, hop) in samples.chunks(self.hop_size).enumerate() {
            let energy =
                hop.iter().map(|s| s * s).sum::<f32>() / hop.len() as f32;
            let t = (hop_index * self.hop_size) as f64 / sample_rate as f64;

            let average = if hops_seen > 0 {
                trailing / hops_seen as f32
            } else {
                0.0
            };
            let floor = 1e-6;
            if energy > (average.max(floor)) * self.threshold
                && t - last_onset >= self.refractory_seconds
            {
                onsets.push(t);
                last_onset = t;
            }

            trailing += energy;
            hops_seen += 1;
        }

        let bpm = estimate_bpm(&onsets);
        Analysis { onsets, bpm }
    }
}

/// A rough tempo estimate from the median inter-onset interval, folded into
/// the 40-240 bpm range. None with fewer than two onsets.
fn estimate_bpm(onsets: &[f64]) -> Option<f64> {
    if onsets.len() < 2 {
        return None;
    }
    let mut intervals: Vec<f64> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(f64::total_cmp);
    let median = intervals[intervals.len() / 2];
    if median <= 0.0 {
        return None;
    }
    let mut bpm = 60.0 / median;
    while bpm < 40.0 {
        bpm *= 2.0;
    }
    while bpm > 240.0 {
        bpm /= 2.0;
    }
    Some(bpm)
}

/// A detector returning preset results. The standard collaborator stub for
/// tests and for feeding externally computed analyses through the engine.
#[derive(Clone, Debug, Default)]
pub struct FixedDetector {
    pub onsets: Vec<f64>,
    pub bpm: Option<f64>,
}

impl OnsetDetector for FixedDetector {
    fn analyze(&self, _samples: &[f32], _sample_rate: u32) -> Analysis {
        Analysis {
            onsets: self.onsets.clone(),
            bpm: self.bpm,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::generate_impulse_train;

    #[test]
    fn test_detects_impulses_in_silence() {
        let rate = 44100;
        let expected = [0.5, 1.0, 1.5, 2.0];
        let samples = generate_impulse_train(&expected, rate, rate as usize * 3);

        let analysis = EnergyDetector::default().analyze(&samples, rate);
        assert_eq!(analysis.onsets.len(), expected.len());
        for (found, expected) in analysis.onsets.iter().zip(expected.iter()) {
            // Hop granularity: within ~12ms at 44.1kHz.
            assert!((found - expected).abs() < 0.015, "{} vs {}", found, expected);
        }
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let analysis = EnergyDetector::default().analyze(&vec![0.0; 44100], 44100);
        assert!(analysis.onsets.is_empty());
        assert!(analysis.bpm.is_none());
    }

    #[test]
    fn test_empty_input() {
        let analysis = EnergyDetector::default().analyze(&[], 44100);
        assert_eq!(analysis, Analysis::default());
    }

    #[test]
    fn test_bpm_from_even_spacing() {
        // Onsets every 0.5s: 120 bpm.
        let bpm = estimate_bpm(&[0.5, 1.0, 1.5, 2.0]).unwrap();
        assert!((bpm - 120.0).abs() < 1e-9);
        // Every 2s is 30 bpm, doubled up into range: 60.
        let folded = estimate_bpm(&[0.0, 2.0, 4.0]).unwrap();
        assert!((folded - 60.0).abs() < 1e-9);
        assert!(estimate_bpm(&[1.0]).is_none());
    }

    #[test]
    fn test_fixed_detector_passthrough() {
        let detector = FixedDetector {
            onsets: vec![0.101, 0.198, 0.401],
            bpm: Some(120.0),
        };
        let analysis = detector.analyze(&[], 0);
        assert_eq!(analysis.onsets, vec![0.101, 0.198, 0.401]);
        assert_eq!(analysis.bpm, Some(120.0));
    }
}
