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

//! The ordered set of slice markers. This store is the single source of truth
//! for slice boundaries; regions are always derived from it.

/// Markers closer than this are considered the same boundary and coalesce.
pub const MARKER_EPSILON: f64 = 0.001;

/// An ordered, duplicate-free set of marker times in seconds. Every mutating
/// operation leaves the store strictly ascending with no two entries within
/// [`MARKER_EPSILON`] of each other.
#[derive(Clone, Debug, Default)]
pub struct MarkerStore {
    times: Vec<f64>,
}

impl MarkerStore {
    pub fn new() -> MarkerStore {
        MarkerStore::default()
    }

    /// The marker times, strictly ascending.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Removes all markers.
    pub fn clear(&mut self) {
        self.times.clear();
    }

    /// Replaces the whole store, typically with the detector's quantized
    /// output. Non-finite times are dropped; the rest are sorted and
    /// coalesced, keeping the first of each run of near-duplicates.
    pub fn replace_all<I: IntoIterator<Item = f64>>(&mut self, times: I) {
        self.times = times.into_iter().filter(|t| t.is_finite()).collect();
        self.normalize();
    }

    /// Inserts a marker. A time within [`MARKER_EPSILON`] of an existing
    /// marker is a no-op, not an error. Returns whether a marker was added.
    pub fn insert(&mut self, t: f64) -> bool {
        if !t.is_finite() {
            return false;
        }
        if self.times.iter().any(|m| (m - t).abs() < MARKER_EPSILON) {
            return false;
        }
        let index = self.times.partition_point(|m| *m < t);
        self.times.insert(index, t);
        true
    }

    /// Removes every marker in `[start, start + window)`, e.g. all markers on
    /// one grid row. Returns the number removed; zero is a no-op, not an
    /// error.
    pub fn remove_near(&mut self, start: f64, window: f64) -> usize {
        let before = self.times.len();
        self.times.retain(|m| *m < start || *m >= start + window);
        before - self.times.len()
    }

    /// Removes the single marker closest to `t` (point-and-click deletion
    /// without row context). No-op on an empty store. Returns the removed
    /// time.
    pub fn remove_closest(&mut self, t: f64) -> Option<f64> {
        let (index, _) = self
            .times
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))?;
        Some(self.times.remove(index))
    }

    /// Reassigns a marker's time, clamping into `[0, max_time)`, then
    /// restores ordering. An out-of-range index is a no-op. Returns whether
    /// a marker moved.
    pub fn move_marker(&mut self, index: usize, new_time: f64, max_time: f64) -> bool {
        if index >= self.times.len() || !new_time.is_finite() {
            return false;
        }
        let upper = (max_time - MARKER_EPSILON).max(0.0);
        self.times[index] = new_time.clamp(0.0, upper);
        self.normalize();
        true
    }

    /// Sorts ascending and coalesces runs of markers within the epsilon,
    /// keeping the first of each run.
    fn normalize(&mut self) {
        self.times.sort_by(f64::total_cmp);
        self.times
            .dedup_by(|b, a| (*b - *a).abs() < MARKER_EPSILON);
    }
}
