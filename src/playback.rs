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

//! Real-time preview playback.
//!
//! The controlling thread talks to the audio render thread exclusively
//! through a bounded command channel plus a couple of atomics. A play request
//! ships the whole `{start, end}` pair as one message, so the render side can
//! never observe a torn triple; the render side publishes its cursor and
//! playing flag back through atomics for the playhead display. The render
//! path never allocates, locks, logs, or blocks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::SampleBuffer;
use crate::playsync::AckEpoch;

pub mod device;
pub mod mock;
mod thread_priority;

/// Default preview volume.
pub const DEFAULT_VOLUME: f32 = 0.8;
/// Length of the substitute window when a play request is degenerate.
const DEFAULT_PREVIEW_SECONDS: f64 = 0.5;
/// Capacity of the control command channel.
const COMMAND_QUEUE_CAPACITY: usize = 64;
/// Capacity of the channel returning retired buffers to the controlling
/// thread, so the audio thread never frees a large allocation itself. Sized
/// to the command queue: it can never hold more retired buffers than there
/// were queued `SetBuffer` commands, so the audio-side send cannot fail.
const RECLAIM_QUEUE_CAPACITY: usize = COMMAND_QUEUE_CAPACITY;
/// How long the controlling thread waits for space in the command queue.
/// The controlling thread may block; only the audio thread may not.
const COMMAND_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors from output device setup.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no output device named {0}")]
    NoDevice(String),

    #[error("no default output device")]
    NoDefaultDevice,

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("device name error: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("stream config error: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("an output stream is already attached")]
    AlreadyAttached,
}

/// Control messages crossing to the audio thread. Each message is a complete,
/// self-consistent request.
enum Command {
    Play { start: usize, end: usize },
    Stop,
    SetVolume(f32),
    SetBuffer(Arc<SampleBuffer>),
}

/// State the audio thread publishes back to the controlling thread.
struct Shared {
    playing: AtomicBool,
    cursor: AtomicUsize,
    ack: AckEpoch,
}

/// Creates a connected controller/renderer pair. The renderer goes to an
/// output backend (see [`device::resolve`]); the controller stays with the
/// engine.
pub fn pair(buffer: Arc<SampleBuffer>, volume: f32) -> (Controller, Renderer) {
    let (tx, rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
    let (reclaim_tx, reclaim_rx) = crossbeam_channel::bounded(RECLAIM_QUEUE_CAPACITY);
    let shared = Arc::new(Shared {
        playing: AtomicBool::new(false),
        cursor: AtomicUsize::new(0),
        ack: AckEpoch::new(),
    });

    let controller = Controller {
        tx,
        reclaim_rx,
        shared: shared.clone(),
        buffer: Mutex::new(buffer.clone()),
    };
    let renderer = Renderer {
        buffer,
        rx,
        reclaim_tx,
        shared,
        start: 0,
        end: 0,
        cursor: 0,
        volume: volume.clamp(0.0, 1.0),
        playing: false,
    };
    (controller, renderer)
}

/// The controlling-thread side of playback. All methods return immediately.
pub struct Controller {
    tx: Sender<Command>,
    reclaim_rx: Receiver<Arc<SampleBuffer>>,
    shared: Arc<Shared>,
    /// Snapshot of the buffer the renderer is (or will be) playing, used for
    /// second-to-sample conversion and range clamping.
    buffer: Mutex<Arc<SampleBuffer>>,
}

impl Controller {
    /// Requests playback of `[start_seconds, end_seconds)`. Degenerate or
    /// out-of-range requests are repaired, never rejected: a zero-length
    /// range plays a half-second window instead, and everything is clamped
    /// to the buffer. A request against an empty buffer stays Idle.
    pub fn play_range(&self, start_seconds: f64, end_seconds: f64) {
        let buffer = self.buffer.lock().clone();
        let rate = buffer.sample_rate() as f64;
        let start = (start_seconds.max(0.0) * rate).round() as usize;
        let end = (end_seconds.max(0.0) * rate).round() as usize;
        self.play_samples(start, end);
    }

    /// Requests playback of a sample index range, applying the same repair
    /// rules as [`Controller::play_range`].
    pub fn play_samples(&self, start: usize, mut end: usize) {
        let buffer = self.buffer.lock().clone();
        let len = buffer.len();
        if len == 0 {
            debug!("Ignoring play request against an empty buffer");
            return;
        }
        let start = start.min(len);
        if end <= start {
            // Zero-length request: substitute a short preview window.
            let preview = (buffer.sample_rate() as f64 * DEFAULT_PREVIEW_SECONDS) as usize;
            end = start.saturating_add(preview);
        }
        end = end.min(len);
        if end <= start {
            return;
        }
        self.send(Command::Play { start, end });
    }

    /// Plays the entire buffer.
    pub fn play_all(&self) {
        let len = self.buffer.lock().len();
        self.play_samples(0, len);
    }

    /// Requests a stop. Advisory: the audio thread silences its output on
    /// the next callback at the latest, which may be up to one buffer of
    /// audio away.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Sets the preview volume, clamped into `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        self.send(Command::SetVolume(volume.clamp(0.0, 1.0)));
    }

    /// Whether a region is currently being rendered.
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// The playhead position while playing, for the renderer's indicator.
    pub fn position(&self) -> Option<usize> {
        self.is_playing()
            .then(|| self.shared.cursor.load(Ordering::Relaxed))
    }

    /// Replaces the sample buffer. Playback is force-stopped first, and when
    /// `quiesce` is set this blocks until the audio thread acknowledges the
    /// swap, guaranteeing it is no longer mid-callback against the old
    /// buffer. Pass `None` when no output stream is attached. Returns false
    /// when the swap could not be delivered (the renderer keeps its old
    /// buffer and the snapshot stays with it) or the acknowledgement timed
    /// out.
    pub fn swap_buffer(&self, buffer: Arc<SampleBuffer>, quiesce: Option<Duration>) -> bool {
        self.reclaim();
        let observed = self.shared.ack.current();
        self.send(Command::Stop);
        if !self.send(Command::SetBuffer(buffer.clone())) {
            warn!("Buffer swap not delivered, command queue saturated");
            return false;
        }
        *self.buffer.lock() = buffer;

        let acknowledged = match quiesce {
            Some(timeout) => {
                let ok = self.shared.ack.wait_past(observed, timeout);
                if !ok {
                    warn!("Audio thread did not acknowledge buffer swap");
                }
                ok
            }
            None => true,
        };
        self.reclaim();
        acknowledged
    }

    /// Drops buffers the audio thread has retired.
    fn reclaim(&self) {
        while self.reclaim_rx.try_recv().is_ok() {}
    }

    /// Queues a command, waiting for space if the queue is momentarily full.
    /// Returns whether the command was delivered; a failure means the queue
    /// stayed saturated for the whole timeout and is logged.
    fn send(&self, command: Command) -> bool {
        if self.tx.send_timeout(command, COMMAND_SEND_TIMEOUT).is_err() {
            warn!("Playback command queue full, dropping command");
            return false;
        }
        true
    }
}

/// The audio-thread side of playback. [`Renderer::render_block`] is the only
/// place samples are read during playback; it is driven by an output backend
/// and must stay allocation- and lock-free.
pub struct Renderer {
    buffer: Arc<SampleBuffer>,
    rx: Receiver<Command>,
    reclaim_tx: Sender<Arc<SampleBuffer>>,
    shared: Arc<Shared>,
    start: usize,
    end: usize,
    cursor: usize,
    volume: f32,
    playing: bool,
}

impl Renderer {
    /// Renders one block of interleaved output, fanning the mono signal out
    /// to every channel. Control commands are drained at block start, so a
    /// stop or play issued mid-block takes effect on the next one.
    pub fn render_block(&mut self, data: &mut [f32], channels: usize) {
        self.apply_commands();
        if channels == 0 {
            return;
        }
        for frame in data.chunks_mut(channels) {
            let sample = self.next_sample();
            for out in frame.iter_mut() {
                *out = sample;
            }
        }
        self.shared.cursor.store(self.cursor, Ordering::Relaxed);
    }

    /// Mono convenience wrapper for tests and the mock backend.
    pub fn render(&mut self, data: &mut [f32]) {
        self.render_block(data, 1);
    }

    /// Produces the next output sample and advances the cursor. Reaching the
    /// end of the requested range clears the playing flag (natural
    /// completion); everything out of range is silence.
    fn next_sample(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let samples = self.buffer.samples();
        if self.cursor >= self.end || self.cursor >= samples.len() {
            self.set_playing(false);
            return 0.0;
        }
        let sample = samples[self.cursor] * self.volume;
        self.cursor += 1;
        if self.cursor >= self.end {
            self.set_playing(false);
        }
        sample
    }

    fn apply_commands(&mut self) {
        let mut applied = false;
        while let Ok(command) = self.rx.try_recv() {
            applied = true;
            match command {
                Command::Play { start, end } => {
                    self.start = start;
                    self.end = end;
                    self.cursor = start;
                    self.set_playing(true);
                }
                Command::Stop => self.set_playing(false),
                Command::SetVolume(volume) => self.volume = volume,
                Command::SetBuffer(buffer) => {
                    let old = std::mem::replace(&mut self.buffer, buffer);
                    // Hand the old buffer back so it isn't freed here. The
                    // reclaim queue matches the command queue capacity, so
                    // there is always room for every retired buffer.
                    let _ = self.reclaim_tx.try_send(old);
                    self.set_playing(false);
                    self.start = 0;
                    self.end = 0;
                    self.cursor = 0;
                }
            }
        }
        if applied {
            self.shared.cursor.store(self.cursor, Ordering::Relaxed);
            self.shared.ack.advance();
        }
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        self.shared.playing.store(playing, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::playsync::CancelFlag;
    use std::thread;

    fn ramp_buffer(len: usize, sample_rate: u32) -> Arc<SampleBuffer> {
        let samples = (0..len).map(|i| (i % 100) as f32 / 100.0).collect();
        Arc::new(SampleBuffer::new(samples, sample_rate))
    }

    #[test]
    fn test_playback_completion() {
        let buffer = ramp_buffer(44100 * 3, 44100);
        let (controller, mut renderer) = pair(buffer, 1.0);

        controller.play_range(1.0, 2.0);
        let mut out = vec![0.0f32; 44100];
        renderer.render(&mut out);

        // Exactly one second of frames consumes the whole region.
        assert!(!controller.is_playing());
        assert_eq!(out[1], (44101 % 100) as f32 / 100.0);

        // Further reads emit silence.
        let mut tail = vec![1.0f32; 64];
        renderer.render(&mut tail);
        assert!(tail.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_playing_until_region_end() {
        let buffer = ramp_buffer(44100, 44100);
        let (controller, mut renderer) = pair(buffer, 1.0);

        controller.play_range(0.0, 0.5);
        let mut out = vec![0.0f32; 512];
        renderer.render(&mut out);
        assert!(controller.is_playing());
        assert_eq!(controller.position(), Some(512));
    }

    #[test]
    fn test_degenerate_range_plays_half_second() {
        let buffer = ramp_buffer(44100 * 2, 44100);
        let (controller, mut renderer) = pair(buffer, 1.0);

        // end <= start substitutes a half-second window.
        controller.play_range(1.0, 1.0);
        let mut out = vec![0.0f32; 22050];
        renderer.render(&mut out);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_degenerate_range_clamped_to_buffer() {
        // Buffer shorter than the substitute window.
        let buffer = ramp_buffer(1000, 44100);
        let (controller, mut renderer) = pair(buffer, 1.0);

        controller.play_samples(500, 500);
        let mut out = vec![0.0f32; 500];
        renderer.render(&mut out);
        assert!(!controller.is_playing());

        // A degenerate request at the very end has nothing to play.
        controller.play_samples(1000, 1000);
        renderer.render(&mut out);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_stop_is_advisory_next_block_silent() {
        let buffer = ramp_buffer(44100, 44100);
        let (controller, mut renderer) = pair(buffer, 1.0);

        controller.play_all();
        let mut out = vec![0.0f32; 256];
        renderer.render(&mut out);
        assert!(controller.is_playing());

        controller.stop();
        // The stop is observed at the start of the next block.
        renderer.render(&mut out);
        assert!(!controller.is_playing());
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_volume_applied() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 1000], 44100));
        let (controller, mut renderer) = pair(buffer, 1.0);

        controller.set_volume(0.5);
        controller.play_samples(0, 4);
        let mut out = vec![0.0f32; 4];
        renderer.render(&mut out);
        assert_eq!(out, vec![0.25; 4]);
    }

    #[test]
    fn test_empty_buffer_stays_idle() {
        let (controller, mut renderer) = pair(Arc::new(SampleBuffer::empty()), 1.0);
        controller.play_range(0.0, 1.0);
        let mut out = vec![1.0f32; 16];
        renderer.render(&mut out);
        assert!(!controller.is_playing());
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_swap_buffer_stops_and_switches() {
        let (controller, mut renderer) = pair(ramp_buffer(1000, 44100), 1.0);
        controller.play_all();
        let mut out = vec![0.0f32; 16];
        renderer.render(&mut out);
        assert!(controller.is_playing());

        let replacement = Arc::new(SampleBuffer::new(vec![0.25; 2000], 44100));
        controller.swap_buffer(replacement, None);
        renderer.render(&mut out);
        assert!(!controller.is_playing());
        assert!(out.iter().all(|s| *s == 0.0));

        // The new buffer is what plays now.
        controller.play_samples(0, 16);
        renderer.render(&mut out);
        assert_eq!(out, vec![0.25; 16]);
    }

    #[test]
    fn test_saturated_queue_reports_undelivered_swap() {
        let (controller, mut renderer) = pair(ramp_buffer(100, 44100), 1.0);

        // Nothing drains the queue yet; every swap queues a Stop/SetBuffer
        // pair, so 32 swaps fill all 64 slots.
        for _ in 0..COMMAND_QUEUE_CAPACITY / 2 {
            let next = Arc::new(SampleBuffer::new(vec![0.0; 8], 44100));
            assert!(controller.swap_buffer(next, None));
        }

        // The next swap cannot be delivered and must say so rather than
        // silently leaving the renderer on a stale buffer.
        let replacement = Arc::new(SampleBuffer::new(vec![0.5; 8], 44100));
        assert!(!controller.swap_buffer(replacement.clone(), None));

        // Once the renderer drains the queue, delivery works again.
        let mut out = vec![0.0f32; 4];
        renderer.render(&mut out);
        assert!(controller.swap_buffer(replacement, None));
    }

    #[test]
    fn test_retired_buffers_cross_reclaim_channel() {
        let (controller, mut renderer) = pair(ramp_buffer(8, 44100), 1.0);
        let swaps = COMMAND_QUEUE_CAPACITY / 2;
        for _ in 0..swaps {
            let next = Arc::new(SampleBuffer::new(vec![0.0; 8], 44100));
            assert!(controller.swap_buffer(next, None));
        }

        // One drain applies every queued swap; each retired buffer must come
        // back over the reclaim channel instead of being dropped in the
        // render path.
        let mut out = vec![0.0f32; 4];
        renderer.render(&mut out);
        let mut reclaimed = 0;
        while controller.reclaim_rx.try_recv().is_ok() {
            reclaimed += 1;
        }
        assert_eq!(reclaimed, swaps);
    }

    #[test]
    fn test_swap_buffer_quiesce_barrier() {
        let (controller, mut renderer) = pair(ramp_buffer(44100, 44100), 1.0);
        let cancel = Arc::new(CancelFlag::new());

        // A stand-in audio thread rendering continuously.
        let join = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                let mut out = vec![0.0f32; 256];
                while !cancel.is_cancelled() {
                    renderer.render(&mut out);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        controller.play_all();
        let replacement = Arc::new(SampleBuffer::new(vec![0.0; 100], 44100));
        assert!(controller.swap_buffer(replacement, Some(Duration::from_secs(2))));
        assert!(!controller.is_playing());

        cancel.cancel();
        join.join().unwrap();
    }
}
