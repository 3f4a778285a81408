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

//! Region derivation: turning the marker list into disjoint, contiguous
//! sample spans covering the whole buffer, one MIDI key per region.

/// The highest assignable MIDI key.
pub const MAX_MIDI_KEY: u8 = 127;

/// A contiguous sample span between two consecutive markers (or the buffer
/// edges), tagged with the MIDI key it maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// First sample of the region, inclusive.
    pub start_sample: usize,
    /// One past the last sample of the region.
    pub end_sample: usize,
    /// The MIDI key assigned to this region.
    pub pitch: u8,
}

impl Region {
    /// The region length in samples.
    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.end_sample == self.start_sample
    }

    /// Formats the region the way the sampler export consumes it:
    /// `<region> sample=<name> key=<pitch> offset=<start> end=<end>`.
    pub fn export_line(&self, sample_name: &str) -> String {
        format!(
            "<region> sample={} key={} offset={} end={}",
            sample_name, self.pitch, self.start_sample, self.end_sample
        )
    }
}

/// Derives the region list from the marker times. Pure; recomputed wholesale
/// whenever the marker store changes so the partition invariant can never be
/// violated by an incremental update.
///
/// With no markers the whole buffer is one region at the base pitch.
/// Otherwise region boundaries are the markers' sample indices (rounded,
/// clamped into the buffer), each region ending at the next boundary and the
/// last at the buffer end. When the first marker is past sample zero an
/// extra leading region spans the gap, so the output always covers the whole
/// buffer. An empty buffer yields no regions.
pub fn derive_regions(
    markers: &[f64],
    sample_rate: u32,
    buffer_len: usize,
    base_pitch: u8,
) -> Vec<Region> {
    if buffer_len == 0 {
        return Vec::new();
    }

    let pitch_of = |index: usize| {
        (base_pitch as usize + index).min(MAX_MIDI_KEY as usize) as u8
    };

    if markers.is_empty() {
        return vec![Region {
            start_sample: 0,
            end_sample: buffer_len,
            pitch: base_pitch,
        }];
    }

    let mut starts: Vec<usize> = markers
        .iter()
        .map(|t| ((t.max(0.0) * sample_rate as f64).round() as usize).min(buffer_len))
        .collect();
    if starts[0] > 0 {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = match starts.get(i + 1) {
                Some(&next) => next.max(start),
                None => buffer_len,
            };
            Region {
                start_sample: start,
                end_sample: end,
                pitch: pitch_of(i),
            }
        })
        .collect()
}

/// Returns the conventional note name for a MIDI key, e.g. 36 -> "C2".
pub fn note_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_partition(regions: &[Region], buffer_len: usize) {
        assert_eq!(regions[0].start_sample, 0);
        assert_eq!(regions[regions.len() - 1].end_sample, buffer_len);
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_sample, pair[1].start_sample);
        }
    }

    #[test]
    fn test_region_export_scenario() {
        // 5s buffer at 10Hz, markers at 1s and 3s, base pitch 36.
        let regions = derive_regions(&[1.0, 3.0], 10, 50, 36);
        assert_eq!(
            regions,
            vec![
                Region {
                    start_sample: 0,
                    end_sample: 10,
                    pitch: 36
                },
                Region {
                    start_sample: 10,
                    end_sample: 30,
                    pitch: 37
                },
                Region {
                    start_sample: 30,
                    end_sample: 50,
                    pitch: 38
                },
            ]
        );
        assert_partition(&regions, 50);
    }

    #[test]
    fn test_no_markers_yields_single_region() {
        let regions = derive_regions(&[], 44100, 1000, 48);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start_sample, 0);
        assert_eq!(regions[0].end_sample, 1000);
        assert_eq!(regions[0].pitch, 48);
    }

    #[test]
    fn test_empty_buffer_yields_no_regions() {
        assert!(derive_regions(&[1.0], 44100, 0, 36).is_empty());
        assert!(derive_regions(&[], 44100, 0, 36).is_empty());
    }

    #[test]
    fn test_marker_past_buffer_end_is_clamped() {
        // 4.999s rounds to sample 50 at 10Hz on a 45-sample buffer; the
        // region collapses to an empty span at the buffer end rather than
        // reaching past it.
        let regions = derive_regions(&[1.0, 4.999], 10, 45, 36);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[2].start_sample, 45);
        assert_eq!(regions[2].end_sample, 45);
        assert!(regions[2].is_empty());
        assert_partition(&regions, 45);
    }

    #[test]
    fn test_partition_invariant() {
        // A marker at zero means one region per marker; otherwise a leading
        // region fills the gap before the first marker.
        let markers = [0.0, 0.5, 0.75, 1.2, 3.33];
        let regions = derive_regions(&markers, 44100, 200000, 36);
        assert_eq!(regions.len(), markers.len());
        assert_partition(&regions, 200000);
        for (i, region) in regions.iter().enumerate() {
            assert_eq!(region.pitch, 36 + i as u8);
        }

        let offset = [0.013, 0.5, 0.75, 1.2, 3.33];
        let regions = derive_regions(&offset, 44100, 200000, 36);
        assert_eq!(regions.len(), offset.len() + 1);
        assert_partition(&regions, 200000);
    }

    #[test]
    fn test_pitch_saturates_at_midi_range() {
        let regions = derive_regions(&[0.0, 1.0, 2.0], 10, 30, 126);
        assert_eq!(regions[0].pitch, 126);
        assert_eq!(regions[1].pitch, 127);
        assert_eq!(regions[2].pitch, 127);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(36), "C2");
        assert_eq!(note_name(37), "C#2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn test_export_line_format() {
        let region = Region {
            start_sample: 10,
            end_sample: 30,
            pitch: 37,
        };
        assert_eq!(
            region.export_line("loop.wav"),
            "<region> sample=loop.wav key=37 offset=10 end=30"
        );
    }
}
