//! Ring buffer tap between the decoder and the output sink
//!
//! The producer (audio callback) writes every delivered batch into a fixed
//! ring; the consumer (render tick) copies out the most recent frames. Both
//! sides share one `RwLock`, held only for the duration of a copy.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::source::{Frame, FrameSource, SILENCE};

struct Ring {
    frames: Box<[Frame]>,
    /// Next slot to write
    cursor: usize,
    /// Valid frames, saturates at capacity
    filled: usize,
    /// Frames ever written, used as the snapshot epoch
    written: u64,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            frames: vec![SILENCE; capacity].into_boxed_slice(),
            cursor: 0,
            filled: 0,
            written: 0,
        }
    }

    fn write(&mut self, batch: &[Frame]) {
        let capacity = self.frames.len();

        // Only the newest `capacity` frames of an oversized batch can survive,
        // but the cursor still advances once per incoming frame.
        let skipped = batch.len().saturating_sub(capacity);
        let batch = &batch[skipped..];
        self.cursor = (self.cursor + skipped) % capacity;

        let head = (capacity - self.cursor).min(batch.len());
        self.frames[self.cursor..self.cursor + head].copy_from_slice(&batch[..head]);
        let tail = batch.len() - head;
        self.frames[..tail].copy_from_slice(&batch[head..]);

        self.cursor = (self.cursor + batch.len()) % capacity;
        self.filled = (self.filled + skipped + batch.len()).min(capacity);
        self.written += (skipped + batch.len()) as u64;
    }

    fn read_latest(&self, n: usize, out: &mut Vec<Frame>) {
        let capacity = self.frames.len();
        let n = n.min(self.filled);
        let start = (self.cursor + capacity - n) % capacity;

        if start + n <= capacity {
            out.extend_from_slice(&self.frames[start..start + n]);
        } else {
            out.extend_from_slice(&self.frames[start..]);
            out.extend_from_slice(&self.frames[..n - (capacity - start)]);
        }
    }
}

/// Shared handle to the visual ring buffer.
///
/// Cloning is cheap: every clone refers to the same ring, so one handle can
/// live in the producer path while another is read by the consumer. The
/// capacity is fixed at construction; a different size needs a new tap.
#[derive(Clone)]
pub struct RingBufferTap {
    ring: Arc<RwLock<Ring>>,
    capacity: usize,
}

impl RingBufferTap {
    /// Create a tap holding up to `capacity` frames (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(RwLock::new(Ring::new(capacity))),
            capacity,
        }
    }

    /// Record a batch of frames, oldest data is overwritten once full.
    ///
    /// Never allocates; the write lock is held only while copying the batch.
    pub fn push(&self, frames: &[Frame]) {
        if frames.is_empty() {
            return;
        }
        self.ring.write().write(frames);
    }

    /// The last `min(n, capacity)` frames in chronological order.
    ///
    /// Returns fewer frames (possibly none) until the ring has filled up.
    pub fn snapshot(&self, n: usize) -> Vec<Frame> {
        let mut out = Vec::with_capacity(n.min(self.capacity));
        self.snapshot_into(n, &mut out);
        out
    }

    /// Like [`snapshot`](Self::snapshot) but reuses `out`'s allocation.
    ///
    /// Returns the epoch of the copy: the total number of frames written
    /// to the ring at the moment it was taken.
    pub fn snapshot_into(&self, n: usize, out: &mut Vec<Frame>) -> u64 {
        out.clear();
        let n = n.min(self.capacity);
        out.reserve(n);

        let ring = self.ring.read();
        ring.read_latest(n, out);
        ring.written
    }

    /// Maximum number of frames retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid frames currently retained
    pub fn len(&self) -> usize {
        self.ring.read().filled
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames pushed since construction
    pub fn frames_written(&self) -> u64 {
        self.ring.read().written
    }
}

/// Pass-through stage that records everything flowing from `inner` to the sink.
///
/// `read_frames` returns exactly what the upstream source produced: the same
/// frames, in the same order, with the same continuation flag.
pub struct TappedSource<S> {
    inner: S,
    tap: RingBufferTap,
}

impl<S: FrameSource> TappedSource<S> {
    pub fn new(inner: S, tap: RingBufferTap) -> Self {
        Self { inner, tap }
    }

    pub fn tap(&self) -> &RingBufferTap {
        &self.tap
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for TappedSource<S> {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let (n, more) = self.inner.read_frames(buf);
        let n = n.min(buf.len());
        self.tap.push(&buf[..n]);
        (n, more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(i: usize) -> Frame {
        let v = i as f32 / 100.0;
        [v, -v]
    }

    fn frames(range: std::ops::Range<usize>) -> Vec<Frame> {
        range.map(frame).collect()
    }

    struct Counter {
        next: usize,
        end: usize,
    }

    impl FrameSource for Counter {
        fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
            let n = buf.len().min(self.end - self.next);
            for (i, slot) in buf[..n].iter_mut().enumerate() {
                *slot = frame(self.next + i);
            }
            self.next += n;
            (n, self.next < self.end)
        }
    }

    #[test]
    fn test_single_frame_pushes_wrap_oldest_first() {
        let tap = RingBufferTap::new(4);
        for i in 1..=6 {
            tap.push(&[frame(i)]);
        }

        assert_eq!(tap.snapshot(4), frames(3..7));
    }

    #[test]
    fn test_snapshot_before_wrap_is_chronological() {
        let tap = RingBufferTap::new(16);
        tap.push(&frames(0..5));
        tap.push(&frames(5..9));

        assert_eq!(tap.snapshot(9), frames(0..9));
        assert_eq!(tap.snapshot(3), frames(6..9));
    }

    #[test]
    fn test_overflow_keeps_most_recent_capacity() {
        let tap = RingBufferTap::new(8);
        for chunk in frames(0..29).chunks(3) {
            tap.push(chunk);
        }

        assert_eq!(tap.snapshot(8), frames(21..29));
        assert_eq!(tap.frames_written(), 29);
    }

    #[test]
    fn test_batch_larger_than_capacity() {
        let tap = RingBufferTap::new(4);
        tap.push(&frames(0..2));
        tap.push(&frames(2..12));

        assert_eq!(tap.snapshot(4), frames(8..12));

        // Cursor must keep advancing per frame after an oversized batch
        tap.push(&[frame(12)]);
        assert_eq!(tap.snapshot(4), frames(9..13));
    }

    #[test]
    fn test_request_larger_than_capacity_is_clamped() {
        let tap = RingBufferTap::new(4);
        tap.push(&frames(0..10));

        let snapshot = tap.snapshot(1000);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot, frames(6..10));
    }

    #[test]
    fn test_empty_tap_snapshot_is_empty() {
        let tap = RingBufferTap::new(8);
        assert!(tap.snapshot(8).is_empty());
        assert!(tap.is_empty());

        tap.push(&[]);
        assert!(tap.snapshot(8).is_empty());
    }

    #[test]
    fn test_partial_fill_returns_only_written_frames() {
        let tap = RingBufferTap::new(8);
        tap.push(&frames(0..3));

        assert_eq!(tap.snapshot(8), frames(0..3));
        assert_eq!(tap.len(), 3);
    }

    #[test]
    fn test_snapshot_into_reports_epoch_and_reuses_buffer() {
        let tap = RingBufferTap::new(8);
        let mut out = vec![frame(99); 20];

        tap.push(&frames(0..5));
        let epoch = tap.snapshot_into(2, &mut out);

        assert_eq!(epoch, 5);
        assert_eq!(out, frames(3..5));
    }

    #[test]
    fn test_tapped_source_is_transparent() {
        let tap = RingBufferTap::new(64);
        let mut tapped = TappedSource::new(Counter { next: 0, end: 10 }, tap.clone());

        let mut delivered = Vec::new();
        let mut buf = [SILENCE; 4];
        loop {
            let (n, more) = tapped.read_frames(&mut buf);
            delivered.extend_from_slice(&buf[..n]);
            if !more {
                break;
            }
        }

        assert_eq!(delivered, frames(0..10));
        assert_eq!(tap.snapshot(64), delivered);
    }

    #[test]
    fn test_concurrent_push_and_snapshot() {
        let tap = RingBufferTap::new(256);
        let writer = tap.clone();

        let handle = std::thread::spawn(move || {
            for chunk in frames(0..10_000).chunks(32) {
                writer.push(chunk);
            }
        });

        for _ in 0..200 {
            let snapshot = tap.snapshot(256);
            // Every snapshot is a contiguous, increasing run
            for pair in snapshot.windows(2) {
                assert!(pair[1][0] > pair[0][0]);
            }
        }

        handle.join().unwrap();
        assert_eq!(tap.snapshot(256), frames(9_744..10_000));
    }
}
