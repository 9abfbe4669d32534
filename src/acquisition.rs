//! Background frame acquisition.
//!
//! `AcquisitionThread` owns a `FrameSource` exclusively on a dedicated
//! thread and publishes every successful read into the shared `FrameSlot`.
//! Capture cadence is decoupled from consumption: old frames are simply
//! superseded, never queued.
//!
//! A read failure from a real (non-synthetic) source is terminal: the
//! thread logs it, releases the source by exiting, and flips the stopped
//! flag. Consumers keep polling `latest()` and see "no new frame" instead
//! of an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::frame::{Frame, FrameSlot};
use crate::source::FrameSource;

pub struct AcquisitionThread {
    slot: Arc<FrameSlot>,
    stop: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl AcquisitionThread {
    /// Take ownership of the source and start the capture loop.
    pub fn spawn(mut source: Box<dyn FrameSource>) -> Self {
        let slot = Arc::new(FrameSlot::new());
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));

        let thread_slot = slot.clone();
        let thread_stop = stop.clone();
        let thread_stopped = stopped.clone();
        let join = std::thread::spawn(move || {
            let synthetic = source.is_synthetic();
            let describe = source.describe();
            loop {
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                match source.read() {
                    Ok(frame) => thread_slot.publish(frame),
                    Err(err) if synthetic => {
                        // Synthetic sources are contractually infallible;
                        // treat an error as a bug worth surfacing, not a stop.
                        log::error!("synthetic source {} read error: {:#}", describe, err);
                    }
                    Err(err) => {
                        log::warn!("camera {} read failed, stopping capture: {:#}", describe, err);
                        break;
                    }
                }
            }
            // Dropping `source` here releases the device handle on every
            // exit path, including terminal read failures.
            drop(source);
            thread_stopped.store(true, Ordering::SeqCst);
        });

        Self {
            slot,
            stop,
            stopped,
            join: Some(join),
        }
    }

    /// Most recent published frame, non-blocking. Remains readable after
    /// the capture loop stops (last frame sticks).
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Shared handle to the latest-frame slot for stream loops.
    pub fn slot(&self) -> Arc<FrameSlot> {
        self.slot.clone()
    }

    /// True once the capture loop has exited and released its source.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Idempotent. Signals the loop and waits for the source to be released.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("acquisition thread panicked");
            }
        }
    }
}

impl Drop for AcquisitionThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::{Duration, Instant};

    /// Scripted source: yields `good` frames then fails.
    struct FailingSource {
        good: u64,
        produced: u64,
    }

    impl FrameSource for FailingSource {
        fn read(&mut self) -> anyhow::Result<Frame> {
            if self.produced >= self.good {
                return Err(anyhow!("device unplugged"));
            }
            self.produced += 1;
            Ok(Frame::black(8, 8, self.produced))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn read_failure_stops_the_thread_and_keeps_last_frame() {
        let mut acq = AcquisitionThread::spawn(Box::new(FailingSource {
            good: 3,
            produced: 0,
        }));

        assert!(wait_until(Duration::from_secs(2), || acq.is_stopped()));
        let last = acq.latest().expect("frames were published before failure");
        assert_eq!(last.seq, 3);
        acq.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let mut acq = AcquisitionThread::spawn(Box::new(FailingSource {
            good: 0,
            produced: 0,
        }));
        acq.stop();
        acq.stop();
        assert!(acq.is_stopped());
    }
}
