//! Chronological N-way merge.
//!
//! [`Multiplexer`] interleaves pre-sorted per-file sources into one stream
//! ordered by `(ts_recv, ts_event)`, with the source index as the final
//! tie-break so equal timestamps never depend on heap insertion accidents.
//! The heap holds at most one pending event per still-active source, so the
//! working set is O(sources) regardless of how long the files are.
//!
//! Refilling is deferred: the slot freed by a yielded event is only re-pulled
//! at the start of the next call. Until then the yielding source's market
//! still reflects exactly the events up to and including the yielded one,
//! which is what keeps exported top-of-book snapshots self-inclusive.
use crate::book::Market;
use crate::record::Event;
use crate::source::{EventSource, LabeledEvent};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Total order for merged events. Payloads are never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeKey {
    pub ts_recv: u64,
    pub ts_event: u64,
    pub source: usize,
}

impl PartialOrd for MergeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ts_recv
            .cmp(&other.ts_recv)
            .then_with(|| self.ts_event.cmp(&other.ts_event))
            .then_with(|| self.source.cmp(&other.source))
    }
}

struct HeapEntry {
    key: MergeKey,
    item: LabeledEvent,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior on BinaryHeap.
        other.key.cmp(&self.key)
    }
}

/// One event out of the merged stream, tagged with the source it came from.
#[derive(Debug, Clone)]
pub struct Merged {
    pub event: Event,
    pub label: String,
    pub source: usize,
}

pub struct Multiplexer {
    sources: Vec<EventSource>,
    heap: BinaryHeap<HeapEntry>,
    refill: Option<usize>,
}

impl Multiplexer {
    /// Prime the heap with one event per source; already-empty sources
    /// contribute nothing.
    pub fn new(mut sources: Vec<EventSource>) -> Self {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, src) in sources.iter_mut().enumerate() {
            if let Some(item) = src.next_event() {
                heap.push(HeapEntry {
                    key: key_for(&item, source),
                    item,
                });
            }
        }
        Self {
            sources,
            heap,
            refill: None,
        }
    }

    /// Pop the next event in global `(ts_recv, ts_event)` order.
    ///
    /// Returns `None` once every source is exhausted.
    pub fn next(&mut self) -> Option<Merged> {
        if let Some(source) = self.refill.take() {
            if let Some(item) = self.sources[source].next_event() {
                self.heap.push(HeapEntry {
                    key: key_for(&item, source),
                    item,
                });
            }
        }
        let entry = self.heap.pop()?;
        let source = entry.key.source;
        self.refill = Some(source);
        Some(Merged {
            event: entry.item.event,
            label: entry.item.label,
            source,
        })
    }

    /// Market state of one source, as of its most recently pulled event.
    pub fn market(&self, source: usize) -> &Market {
        self.sources[source].market()
    }

    /// Number of pending, not-yet-yielded events (at most one per active
    /// source).
    pub fn pending_len(&self) -> usize {
        self.heap.len()
    }
}

fn key_for(item: &LabeledEvent, source: usize) -> MergeKey {
    MergeKey {
        ts_recv: item.event.ts_recv,
        ts_event: item.event.ts_event,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_orders_by_recv_then_event_then_source() {
        let k = |ts_recv, ts_event, source| MergeKey {
            ts_recv,
            ts_event,
            source,
        };
        assert!(k(1, 9, 1) < k(2, 0, 0));
        assert!(k(1, 1, 1) < k(1, 2, 0));
        assert!(k(1, 1, 0) < k(1, 1, 1));
        assert_eq!(k(1, 1, 0), k(1, 1, 0));
    }
}
