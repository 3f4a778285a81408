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

//! The engine façade: owns the sample buffer, marker store, tempo grid, and
//! playback controller, and exposes the whole marker/region/playback API to
//! the renderer and exporter collaborators. All engine state lives here;
//! nothing is a free-standing global.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::buffer::SampleBuffer;
use crate::config::ProjectConfig;
use crate::detect::{Analysis, OnsetDetector};
use crate::grid::TempoGrid;
use crate::markers::{MarkerStore, MARKER_EPSILON};
use crate::playback::device::OutputHandle;
use crate::playback::{self, Controller, PlaybackError, Renderer};
use crate::regions::{derive_regions, Region};

/// How long a buffer load waits for the audio thread to acknowledge the swap.
const LOAD_QUIESCE_TIMEOUT: Duration = Duration::from_secs(1);

/// The slicing and playback engine. Interior mutability throughout: the
/// controlling thread calls every method through a shared reference, and a
/// detector may run against a snapshot off the event loop.
pub struct Engine {
    buffer: Mutex<Arc<SampleBuffer>>,
    markers: Mutex<MarkerStore>,
    grid: Mutex<TempoGrid>,
    base_pitch: AtomicU8,
    playback: Controller,
    /// Taken by `attach_output`; present only until a stream is attached.
    renderer: Mutex<Option<Renderer>>,
    output: Mutex<Option<OutputHandle>>,
}

impl Engine {
    /// Creates an engine with an empty buffer and the configured defaults.
    /// No output stream is attached yet; see [`Engine::attach_output`].
    pub fn new(config: &ProjectConfig) -> Engine {
        let buffer = Arc::new(SampleBuffer::empty());
        let (controller, renderer) = playback::pair(buffer.clone(), config.volume());
        Engine {
            buffer: Mutex::new(buffer),
            markers: Mutex::new(MarkerStore::new()),
            grid: Mutex::new(TempoGrid::new(config.bpm(), config.subdivisions_per_bar())),
            base_pitch: AtomicU8::new(config.base_pitch()),
            playback: controller,
            renderer: Mutex::new(Some(renderer)),
            output: Mutex::new(None),
        }
    }

    /// Attaches an output stream for the current buffer's sample rate.
    /// Attach after loading so the stream rate matches the recording. A
    /// failed attach (bad device name, unusable format) leaves the engine
    /// attachable: the renderer is only handed over once the device has
    /// resolved.
    pub fn attach_output(&self, device_name: &str) -> Result<(), PlaybackError> {
        if self.renderer.lock().is_none() {
            return Err(PlaybackError::AlreadyAttached);
        }
        let resolved = playback::device::resolve(device_name)?;
        let renderer = self
            .renderer
            .lock()
            .take()
            .ok_or(PlaybackError::AlreadyAttached)?;
        let sample_rate = self.buffer.lock().sample_rate();
        let handle = resolved.start(sample_rate, renderer);
        info!(output = %handle, "Output attached");
        *self.output.lock() = Some(handle);
        Ok(())
    }

    /// Replaces the sample buffer, clearing the marker store and resetting
    /// playback to idle. When an output stream is attached this blocks until
    /// the audio thread has acknowledged the swap, so it can never be
    /// mid-callback against the old buffer. Returns false when the swap was
    /// not confirmed (the command queue stayed saturated or the audio thread
    /// never acknowledged); the engine state still reflects the requested
    /// load, so callers can retry or bail out.
    pub fn load_buffer(&self, buffer: SampleBuffer) -> bool {
        let buffer = Arc::new(buffer);
        let quiesce = self.output.lock().is_some().then_some(LOAD_QUIESCE_TIMEOUT);
        let swapped = self.playback.swap_buffer(buffer.clone(), quiesce);
        if !swapped {
            error!(
                frames = buffer.len(),
                "Buffer swap was not confirmed by the playback side"
            );
        }
        info!(
            frames = buffer.len(),
            sample_rate = buffer.sample_rate(),
            duration = crate::util::duration_minutes_seconds(buffer.duration()),
            "Buffer loaded"
        );
        *self.buffer.lock() = buffer;
        self.markers.lock().clear();
        swapped
    }

    /// The current sample buffer.
    pub fn buffer(&self) -> Arc<SampleBuffer> {
        self.buffer.lock().clone()
    }

    /// The buffer duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.buffer.lock().duration_seconds()
    }

    // ── Detection ────────────────────────────────────────────────────────

    /// Runs a detector against the current buffer and applies its analysis.
    pub fn detect(&self, detector: &dyn OnsetDetector) -> Analysis {
        let buffer = self.buffer();
        let analysis = detector.analyze(buffer.samples(), buffer.sample_rate());
        self.auto_detect(&analysis);
        analysis
    }

    /// Applies raw detector output: a valid tempo estimate updates the grid,
    /// then every onset is quantized with the current grid and the marker
    /// store is replaced wholesale. Post-quantization collisions coalesce.
    pub fn auto_detect(&self, analysis: &Analysis) {
        if let Some(bpm) = analysis.bpm {
            self.grid.lock().set_bpm(bpm);
        }

        let duration = self.buffer.lock().duration_seconds();
        if duration <= 0.0 {
            self.markers.lock().clear();
            return;
        }

        let grid = self.grid.lock().clone();
        let quantized = analysis
            .onsets
            .iter()
            .filter(|t| t.is_finite())
            .map(|t| clamp_time(grid.quantize_time(clamp_time(*t, duration)), duration));
        let mut markers = self.markers.lock();
        markers.replace_all(quantized);
        info!(
            onsets = analysis.onsets.len(),
            markers = markers.len(),
            bpm = grid.bpm(),
            "Applied detector analysis"
        );
    }

    // ── Markers ──────────────────────────────────────────────────────────

    /// Adds a marker, clamped into the buffer. No-op within a millisecond of
    /// an existing marker or on an empty buffer. Returns whether one was
    /// added.
    pub fn insert_marker(&self, t: f64) -> bool {
        let duration = self.buffer.lock().duration_seconds();
        if duration <= 0.0 {
            return false;
        }
        self.markers.lock().insert(clamp_time(t, duration))
    }

    /// Removes every marker on the given tracker row.
    pub fn remove_markers_on_row(&self, row: usize) -> usize {
        let (start, window) = {
            let grid = self.grid.lock();
            (grid.row_to_seconds(row), grid.seconds_per_row())
        };
        let removed = self.markers.lock().remove_near(start, window);
        debug!(row, removed, "Removed markers on row");
        removed
    }

    /// Removes the marker closest to `t` (point-and-click deletion).
    pub fn remove_closest_marker(&self, t: f64) -> Option<f64> {
        self.markers.lock().remove_closest(t)
    }

    /// Moves a marker to a new time, clamped into the buffer.
    pub fn move_marker(&self, index: usize, new_time: f64) -> bool {
        let duration = self.buffer.lock().duration_seconds();
        self.markers.lock().move_marker(index, new_time, duration)
    }

    /// Removes all markers.
    pub fn clear_markers(&self) {
        self.markers.lock().clear();
    }

    /// A snapshot of the marker times, ascending.
    pub fn markers(&self) -> Vec<f64> {
        self.markers.lock().times().to_vec()
    }

    // ── Grid and pitch ───────────────────────────────────────────────────

    /// Updates the tempo; invalid values are rejected and the previous kept.
    pub fn set_bpm(&self, bpm: f64) -> bool {
        self.grid.lock().set_bpm(bpm)
    }

    /// Updates the row subdivision count; zero is rejected.
    pub fn set_subdivisions_per_bar(&self, subdivisions: u32) -> bool {
        self.grid.lock().set_subdivisions_per_bar(subdivisions)
    }

    /// A snapshot of the tempo grid.
    pub fn grid(&self) -> TempoGrid {
        self.grid.lock().clone()
    }

    pub fn set_base_pitch(&self, pitch: u8) {
        self.base_pitch.store(pitch, Ordering::Relaxed);
    }

    pub fn base_pitch(&self) -> u8 {
        self.base_pitch.load(Ordering::Relaxed)
    }

    // ── Regions ──────────────────────────────────────────────────────────

    /// Derives the region list for export or display. The marker lock is
    /// held for the duration, so the result is a point-in-time consistent
    /// snapshot even with a detector running off the event loop.
    pub fn export_regions(&self) -> Vec<Region> {
        let buffer = self.buffer();
        let markers = self.markers.lock();
        derive_regions(
            markers.times(),
            buffer.sample_rate(),
            buffer.len(),
            self.base_pitch(),
        )
    }

    // ── Playback ─────────────────────────────────────────────────────────

    /// Previews one derived region. Returns false for an out-of-range index
    /// or an empty region.
    pub fn play_region(&self, index: usize) -> bool {
        let regions = self.export_regions();
        let Some(region) = regions.get(index) else {
            return false;
        };
        if region.is_empty() {
            return false;
        }
        info!(
            index,
            key = region.pitch,
            offset = region.start_sample,
            end = region.end_sample,
            "Playing region"
        );
        self.playback
            .play_samples(region.start_sample, region.end_sample);
        true
    }

    /// Previews an arbitrary time range; degenerate ranges are repaired, not
    /// rejected.
    pub fn play_range(&self, start_seconds: f64, end_seconds: f64) {
        self.playback.play_range(start_seconds, end_seconds);
    }

    /// Previews the whole buffer.
    pub fn play_all(&self) {
        self.playback.play_all();
    }

    /// Requests a stop; the audio thread observes it on its next callback.
    pub fn stop(&self) {
        self.playback.stop();
    }

    pub fn set_volume(&self, volume: f32) {
        self.playback.set_volume(volume);
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// The playhead sample position while playing.
    pub fn playhead(&self) -> Option<usize> {
        self.playback.position()
    }
}

/// Clamps a time into `[0, duration)`, the valid marker range.
fn clamp_time(t: f64, duration: f64) -> f64 {
    t.clamp(0.0, (duration - MARKER_EPSILON).max(0.0))
}
