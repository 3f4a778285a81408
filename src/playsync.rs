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

//! Synchronization primitives for the controlling-thread/audio-thread
//! boundary. The audio side of these is wait-free: the render callback may
//! never lock, block, or allocate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How often the waiting side re-checks an acknowledgement.
const ACK_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// A monotonically increasing acknowledgement counter. The audio thread
/// advances it after applying control commands; the controlling thread polls
/// it to know the audio thread has moved past a given point (e.g. that a
/// buffer swap has been observed and the old buffer can no longer be read).
#[derive(Default)]
pub struct AckEpoch {
    counter: AtomicU64,
}

impl AckEpoch {
    pub fn new() -> AckEpoch {
        AckEpoch::default()
    }

    /// The current epoch.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Advances the epoch. Called from the audio thread; a single atomic
    /// store, never blocks.
    pub fn advance(&self) {
        self.counter.fetch_add(1, Ordering::Release);
    }

    /// Waits until the epoch has advanced past `observed`, polling at a
    /// short interval. Returns false on timeout, which callers treat as
    /// "no audio thread is running" rather than an error.
    pub fn wait_past(&self, observed: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.current() <= observed {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(ACK_POLL_INTERVAL);
        }
        true
    }
}

/// A one-way stop flag for output stream threads. Cancelling is sticky.
#[derive(Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_ack_epoch_wait() {
        let epoch = Arc::new(AckEpoch::new());
        let observed = epoch.current();

        let join = {
            let epoch = epoch.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                epoch.advance();
            })
        };

        assert!(epoch.wait_past(observed, Duration::from_secs(1)));
        join.join().unwrap();
    }

    #[test]
    fn test_ack_epoch_timeout() {
        let epoch = AckEpoch::new();
        let observed = epoch.current();
        assert!(!epoch.wait_past(observed, Duration::from_millis(10)));
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }
}
