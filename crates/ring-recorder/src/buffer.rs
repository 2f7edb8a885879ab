//! Segment ring implementation

use crate::VideoSegment;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

struct RingInner {
    /// Live rolling window, oldest first. Single writer: the recorder loop.
    live: VecDeque<VideoSegment>,
    /// Pin count per segment handle id (one pin per snapshot referencing it)
    pins: HashMap<Uuid, usize>,
    /// Evicted from the live window while pinned; released on unpin
    parked: Vec<VideoSegment>,
}

/// Bounded FIFO ring of video segments with snapshot pinning.
///
/// `push` evicts strictly FIFO past capacity. A `snapshot` is a point-in-time
/// copy of the live window that pins every copied segment: a pinned segment
/// evicted from the window is parked instead of released, so an in-flight
/// evidence recording keeps its backing storage until `unpin`.
pub struct SegmentRing {
    capacity: usize,
    inner: Mutex<RingInner>,
}

impl SegmentRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            capacity,
            inner: Mutex::new(RingInner {
                live: VecDeque::with_capacity(capacity),
                pins: HashMap::new(),
                parked: Vec::new(),
            }),
        }
    }

    /// Append a freshly recorded segment.
    ///
    /// Returns the segments whose backing storage may be released now
    /// (unpinned FIFO evictions).
    pub fn push(&self, segment: VideoSegment) -> Vec<VideoSegment> {
        let mut inner = self.inner.lock().expect("segment ring poisoned");
        inner.live.push_back(segment);

        let mut releasable = Vec::new();
        while inner.live.len() > self.capacity {
            let evicted = inner.live.pop_front().expect("len checked above");
            if inner.pins.contains_key(&evicted.handle.id) {
                debug!(segment = %evicted.handle.id, "evicted segment parked (pinned)");
                inner.parked.push(evicted);
            } else {
                releasable.push(evicted);
            }
        }
        releasable
    }

    /// Point-in-time copy of the live window, oldest first. Pins every
    /// returned segment.
    pub fn snapshot(&self) -> Vec<VideoSegment> {
        let mut inner = self.inner.lock().expect("segment ring poisoned");
        let copy: Vec<VideoSegment> = inner.live.iter().cloned().collect();
        for segment in &copy {
            *inner.pins.entry(segment.handle.id).or_insert(0) += 1;
        }
        copy
    }

    /// Drop one pin per given segment.
    ///
    /// Returns parked segments that are no longer pinned and may now be
    /// released. Segments still in the live window stay owned by the ring.
    pub fn unpin(&self, segments: &[VideoSegment]) -> Vec<VideoSegment> {
        let mut inner = self.inner.lock().expect("segment ring poisoned");
        for segment in segments {
            if let Some(count) = inner.pins.get_mut(&segment.handle.id) {
                *count -= 1;
                if *count == 0 {
                    inner.pins.remove(&segment.handle.id);
                }
            }
        }

        let mut releasable = Vec::new();
        let mut i = 0;
        while i < inner.parked.len() {
            if inner.pins.contains_key(&inner.parked[i].handle.id) {
                i += 1;
            } else {
                releasable.push(inner.parked.swap_remove(i));
            }
        }
        releasable
    }

    /// Number of segments in the live window
    pub fn len(&self) -> usize {
        self.inner.lock().expect("segment ring poisoned").live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of evicted-but-pinned segments awaiting release
    pub fn parked_count(&self) -> usize {
        self.inner.lock().expect("segment ring poisoned").parked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentHandle;

    fn segment(n: u64) -> VideoSegment {
        VideoSegment {
            handle: SegmentHandle {
                id: Uuid::new_v4(),
                uri: format!("/tmp/seg-{n}.mp4"),
            },
            timestamp_ms: n * 5_000,
            duration_secs: 5,
        }
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_fifo() {
        let ring = SegmentRing::new(6);
        let segments: Vec<_> = (0..10).map(segment).collect();

        let mut evicted = Vec::new();
        for s in &segments {
            evicted.extend(ring.push(s.clone()));
            assert!(ring.len() <= 6);
        }

        // Oldest four evicted, in order
        let evicted_ids: Vec<_> = evicted.iter().map(|s| s.handle.id).collect();
        let expected: Vec<_> = segments[..4].iter().map(|s| s.handle.id).collect();
        assert_eq!(evicted_ids, expected);

        // Window holds the newest six, oldest first
        let window = ring.snapshot();
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].handle.id, segments[4].handle.id);
        assert_eq!(window[5].handle.id, segments[9].handle.id);
    }

    #[test]
    fn snapshot_survives_continued_rotation() {
        let ring = SegmentRing::new(3);
        for n in 0..3 {
            ring.push(segment(n));
        }

        let snap = ring.snapshot();
        assert_eq!(snap.len(), 3);

        // Rotate well past a full window: snapshot segments must be parked,
        // never released.
        let mut released = Vec::new();
        for n in 3..10 {
            released.extend(ring.push(segment(n)));
        }
        for s in &snap {
            assert!(
                !released.iter().any(|r| r.handle.id == s.handle.id),
                "pinned segment was released during rotation"
            );
        }
        assert_eq!(ring.parked_count(), 3);

        // Upload finished: unpin frees exactly the parked snapshot segments
        let releasable = ring.unpin(&snap);
        let mut ids: Vec<_> = releasable.iter().map(|s| s.handle.id).collect();
        let mut expected: Vec<_> = snap.iter().map(|s| s.handle.id).collect();
        ids.sort();
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(ring.parked_count(), 0);
    }

    #[test]
    fn overlapping_snapshots_release_only_after_last_unpin() {
        let ring = SegmentRing::new(2);
        ring.push(segment(0));
        ring.push(segment(1));

        let first = ring.snapshot();
        let second = ring.snapshot();

        // Evict both pinned segments
        ring.push(segment(2));
        ring.push(segment(3));
        assert_eq!(ring.parked_count(), 2);

        assert!(ring.unpin(&first).is_empty());
        let released = ring.unpin(&second);
        assert_eq!(released.len(), 2);
    }

    #[test]
    fn unpin_of_live_segment_does_not_release_it() {
        let ring = SegmentRing::new(4);
        ring.push(segment(0));
        let snap = ring.snapshot();

        // Still in the live window: nothing to release on unpin
        assert!(ring.unpin(&snap).is_empty());
        assert_eq!(ring.len(), 1);
    }
}
