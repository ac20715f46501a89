//! Shared state between the decoder and analyzer threads.
//!
//! The sample ring itself carries no synchronization; ordering comes from the
//! watermark handoff. The decoder publishes a watermark and then blocks until
//! the analyzer reports the batch consumed, so at most one publication is in
//! flight and ring slots are never rewritten while the analyzer reads them.
//! Acknowledgments carry the consumed watermark itself, so an analyzer whose
//! first wait arrives late cannot be mistaken for having consumed a batch.

use crate::config::PipelineConfig;
use anyhow::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Watermark value marking the end of the sample stream.
pub const END_OF_STREAM: i64 = -1;

/// Blocked waiters re-check the running flag at this cadence so a stop
/// request never strands a thread on a condvar.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// Fixed-capacity sample ring. Slots hold f64 bit patterns; the watermark
/// handshake provides the happens-before edge between writer and reader, so
/// relaxed ordering on the slots themselves is enough.
pub struct RingBuffer {
    slots: Box<[AtomicU64]>,
}

impl RingBuffer {
    pub fn new(len: usize) -> Self {
        assert!(len > 0);
        Self {
            slots: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn store(&self, index: usize, value: f64) {
        self.slots[index].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self, index: usize) -> f64 {
        f64::from_bits(self.slots[index].load(Ordering::Relaxed))
    }
}

pub struct SharedContext {
    pub config: PipelineConfig,
    pub ring: RingBuffer,
    running: AtomicBool,
    /// Last watermark the analyzer has fully consumed; `i64::MIN` before
    /// its first wait.
    consumed: Mutex<i64>,
    batch_consumed: Condvar,
    /// Ring position one past the last published sample, or [`END_OF_STREAM`].
    watermark: Mutex<i64>,
    batch_published: Condvar,
    failure: Mutex<Option<Error>>,
}

impl SharedContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            ring: RingBuffer::new(config.ring_len()),
            config,
            running: AtomicBool::new(true),
            consumed: Mutex::new(i64::MIN),
            batch_consumed: Condvar::new(),
            watermark: Mutex::new(0),
            batch_published: Condvar::new(),
            failure: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask both threads to wind down and wake anyone blocked on a handoff.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.batch_consumed.notify_all();
        self.batch_published.notify_all();
    }

    /// Publish a watermark for the analyzer. Blocks until the analyzer has
    /// acknowledged this publisher's previous watermark (the very first
    /// publication therefore waits for the analyzer's first wait); returns
    /// false if the pipeline stopped while waiting, in which case nothing
    /// was published.
    pub fn signal_worker(&self, position: i64) -> bool {
        let previous = *self.watermark.lock().expect("watermark poisoned");
        let mut consumed = self.consumed.lock().expect("consumed poisoned");
        while *consumed != previous {
            if !self.is_running() {
                return false;
            }
            (consumed, _) = self
                .batch_consumed
                .wait_timeout(consumed, WAIT_TICK)
                .expect("consumed poisoned");
        }
        drop(consumed);

        *self.watermark.lock().expect("watermark poisoned") = position;
        self.batch_published.notify_one();
        true
    }

    /// Acknowledge `previous` as fully consumed, then block until a
    /// watermark different from it is published. `None` means the pipeline
    /// stopped before new work arrived.
    pub fn await_work(&self, previous: i64) -> Option<i64> {
        {
            let mut consumed = self.consumed.lock().expect("consumed poisoned");
            *consumed = previous;
            self.batch_consumed.notify_one();
        }

        let mut mark = self.watermark.lock().expect("watermark poisoned");
        while *mark == previous {
            if !self.is_running() {
                return None;
            }
            (mark, _) = self
                .batch_published
                .wait_timeout(mark, WAIT_TICK)
                .expect("watermark poisoned");
        }
        Some(*mark)
    }

    /// Record the first failure; later ones are logged by their thread and
    /// dropped here.
    pub fn record_failure(&self, error: Error) {
        let mut slot = self.failure.lock().expect("failure poisoned");
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn has_failure(&self) -> bool {
        self.failure.lock().expect("failure poisoned").is_some()
    }

    pub fn take_failure(&self) -> Option<Error> {
        self.failure.lock().expect("failure poisoned").take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisSettings;
    use crate::source::PcmSpec;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn test_context() -> Arc<SharedContext> {
        let settings = AnalysisSettings {
            chunk_size: 8,
            lookahead_chunks: 2,
            ..AnalysisSettings::default()
        };
        let spec = PcmSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            bytes_per_frame: 2,
            big_endian: false,
            total_frames: 64,
        };
        let config = PipelineConfig::derive(&settings, &spec, 4).unwrap();
        Arc::new(SharedContext::new(config))
    }

    #[test]
    fn handoff_delivers_watermarks_in_order() {
        let ctx = test_context();
        let producer = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                assert!(ctx.signal_worker(16));
                assert!(ctx.signal_worker(32));
                assert!(ctx.signal_worker(END_OF_STREAM));
            })
        };

        assert_eq!(ctx.await_work(0), Some(16));
        assert_eq!(ctx.await_work(16), Some(32));
        assert_eq!(ctx.await_work(32), Some(END_OF_STREAM));
        producer.join().unwrap();
    }

    #[test]
    fn publisher_blocks_until_batch_is_consumed() {
        let ctx = test_context();
        let (tx, rx) = mpsc::channel();
        let producer = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                ctx.signal_worker(16);
                ctx.signal_worker(32);
                tx.send(()).unwrap();
            })
        };

        // Second publication must not land before the first is consumed.
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        assert_eq!(ctx.await_work(0), Some(16));
        assert_eq!(ctx.await_work(16), Some(32));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
    }

    #[test]
    fn stop_releases_a_blocked_consumer() {
        let ctx = test_context();
        let waiter = {
            let ctx = ctx.clone();
            thread::spawn(move || ctx.await_work(0))
        };
        thread::sleep(Duration::from_millis(50));
        ctx.request_stop();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn stop_releases_a_blocked_publisher() {
        let ctx = test_context();
        // No analyzer ever waits, so even the first publication blocks.
        let publisher = {
            let ctx = ctx.clone();
            thread::spawn(move || ctx.signal_worker(16))
        };
        thread::sleep(Duration::from_millis(50));
        ctx.request_stop();
        assert!(!publisher.join().unwrap());
    }

    #[test]
    fn late_first_wait_is_not_mistaken_for_an_acknowledgment() {
        let ctx = test_context();
        let publisher = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                assert!(ctx.signal_worker(16));
                // Must not land before the 16 batch is acknowledged.
                assert!(ctx.signal_worker(32));
            })
        };
        // The analyzer's first wait arrives well after the publisher.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(ctx.await_work(0), Some(16));
        assert_eq!(*ctx.watermark.lock().unwrap(), 16);
        assert_eq!(ctx.await_work(16), Some(32));
        publisher.join().unwrap();
    }

    #[test]
    fn only_first_failure_is_kept() {
        let ctx = test_context();
        ctx.record_failure(anyhow::anyhow!("first"));
        ctx.record_failure(anyhow::anyhow!("second"));
        assert!(ctx.has_failure());
        assert_eq!(ctx.take_failure().unwrap().to_string(), "first");
        assert!(ctx.take_failure().is_none());
    }

    #[test]
    fn ring_round_trips_sample_values() {
        let ring = RingBuffer::new(4);
        ring.store(0, -1.5);
        ring.store(3, 12_345.0);
        assert_eq!(ring.load(0), -1.5);
        assert_eq!(ring.load(3), 12_345.0);
        assert_eq!(ring.load(1), 0.0);
        assert_eq!(ring.len(), 4);
    }
}
