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

//! Tempo grid math: conversions between seconds, sample indices, and musical
//! grid positions. All free functions here are pure.

use tracing::warn;

/// Default tempo when nothing has been detected or configured yet.
pub const DEFAULT_BPM: f64 = 140.0;
/// Default number of tracker rows per bar.
pub const DEFAULT_SUBDIVISIONS_PER_BAR: u32 = 16;

/// The musical grid markers are quantized against: a tempo plus a row
/// subdivision count. Invalid updates are rejected and the previous value is
/// retained, so a grid is always usable.
#[derive(Clone, Debug, PartialEq)]
pub struct TempoGrid {
    bpm: f64,
    subdivisions_per_bar: u32,
}

impl Default for TempoGrid {
    fn default() -> TempoGrid {
        TempoGrid {
            bpm: DEFAULT_BPM,
            subdivisions_per_bar: DEFAULT_SUBDIVISIONS_PER_BAR,
        }
    }
}

impl TempoGrid {
    /// Creates a grid, falling back to the defaults for invalid values.
    pub fn new(bpm: f64, subdivisions_per_bar: u32) -> TempoGrid {
        let mut grid = TempoGrid::default();
        grid.set_bpm(bpm);
        grid.set_subdivisions_per_bar(subdivisions_per_bar);
        grid
    }

    /// The current tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// The number of rows per bar.
    pub fn subdivisions_per_bar(&self) -> u32 {
        self.subdivisions_per_bar
    }

    /// Updates the tempo. Non-positive or non-finite values are rejected and
    /// the previous tempo is kept. Returns whether the update was accepted.
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !bpm.is_finite() || bpm <= 0.0 {
            warn!(bpm, kept = self.bpm, "Rejecting invalid tempo");
            return false;
        }
        self.bpm = bpm;
        true
    }

    /// Updates the row subdivision count. Zero is rejected and the previous
    /// count is kept. Returns whether the update was accepted.
    pub fn set_subdivisions_per_bar(&mut self, subdivisions_per_bar: u32) -> bool {
        if subdivisions_per_bar == 0 {
            warn!(
                kept = self.subdivisions_per_bar,
                "Rejecting zero subdivisions per bar"
            );
            return false;
        }
        self.subdivisions_per_bar = subdivisions_per_bar;
        true
    }

    /// The duration of one tracker row in seconds: a bar is four beats.
    pub fn seconds_per_row(&self) -> f64 {
        (240.0 / self.bpm) / self.subdivisions_per_bar as f64
    }

    /// The tick resolution onsets are quantized at. Quantization runs at 4x
    /// row resolution: with 120 bpm and 4 rows per bar the quantize unit is
    /// 0.125s while a row is 0.5s.
    pub fn ticks_per_bar(&self) -> u32 {
        self.subdivisions_per_bar.saturating_mul(4)
    }

    /// Snaps a time to the nearest grid tick.
    pub fn quantize_time(&self, t: f64) -> f64 {
        quantize(t, self.bpm, self.ticks_per_bar())
    }

    /// The tracker row a sample index falls in.
    pub fn row_of_sample(&self, sample_index: usize, sample_rate: u32) -> usize {
        row_of_sample(sample_index, sample_rate, self.seconds_per_row())
    }

    /// The start time of a tracker row.
    pub fn row_to_seconds(&self, row: usize) -> f64 {
        row as f64 * self.seconds_per_row()
    }
}

/// Whether the grid parameters produce a usable quantization unit.
fn grid_valid(bpm: f64, ticks_per_bar: u32) -> bool {
    bpm.is_finite() && bpm > 0.0 && ticks_per_bar > 0
}

/// Converts a time in seconds to the nearest grid tick, rounding half away
/// from zero. A bar is four beats, so one tick is `(240 / bpm) / ticks_per_bar`
/// seconds. Invalid grid parameters yield tick zero.
pub fn seconds_to_grid_ticks(t: f64, bpm: f64, ticks_per_bar: u32) -> i64 {
    if !grid_valid(bpm, ticks_per_bar) || !t.is_finite() {
        return 0;
    }
    (t * (bpm / 60.0) * ticks_per_bar as f64 / 4.0).round() as i64
}

/// Converts a grid tick back to seconds. Invalid grid parameters yield zero.
pub fn grid_ticks_to_seconds(ticks: i64, bpm: f64, ticks_per_bar: u32) -> f64 {
    if !grid_valid(bpm, ticks_per_bar) {
        return 0.0;
    }
    (ticks as f64 / ticks_per_bar as f64) * (240.0 / bpm)
}

/// Snaps a time to the nearest grid tick. With invalid grid parameters this
/// is a no-op returning the input unchanged: callers rely on "quantization
/// disabled" behavior when the tempo is unknown.
pub fn quantize(t: f64, bpm: f64, ticks_per_bar: u32) -> f64 {
    if !grid_valid(bpm, ticks_per_bar) || !t.is_finite() {
        return t;
    }
    grid_ticks_to_seconds(seconds_to_grid_ticks(t, bpm, ticks_per_bar), bpm, ticks_per_bar)
}

/// The tracker row a sample index falls in, given the row duration. Returns
/// row zero when the row duration or sample rate is degenerate.
pub fn row_of_sample(sample_index: usize, sample_rate: u32, seconds_per_row: f64) -> usize {
    if sample_rate == 0 || !seconds_per_row.is_finite() || seconds_per_row <= 0.0 {
        return 0;
    }
    ((sample_index as f64 / sample_rate as f64) / seconds_per_row).floor() as usize
}
