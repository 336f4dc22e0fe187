//! Spike events and the time-ordered queue buffering them until their tick.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::synapse::SynapseId;

/// Side of the synapse on which a spike occurs.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SpikeKind {
    /// A spike of the source, arriving along one synapse.
    Pre,
    /// A spike of the post-synaptic target, seen by every synapse of the handler.
    Post,
}

/// Origin of a queued event.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum EventSource {
    Pre(SynapseId),
    Post,
}

impl EventSource {
    pub fn kind(&self) -> SpikeKind {
        match self {
            EventSource::Pre(_) => SpikeKind::Pre,
            EventSource::Post => SpikeKind::Post,
        }
    }
}

/// A spike event waiting to be processed.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub source: EventSource,
    /// Arrival time, delay included.
    pub time: f64,
    /// Value carried by the event, e.g., 1.0 for a plain spike.
    pub value: f64,
}

impl SpikeEvent {
    pub fn pre(synapse_id: SynapseId, time: f64, value: f64) -> Self {
        SpikeEvent {
            source: EventSource::Pre(synapse_id),
            time,
            value,
        }
    }

    pub fn post(time: f64) -> Self {
        SpikeEvent {
            source: EventSource::Post,
            time,
            value: 1.0,
        }
    }
}

/// A queued event with its insertion rank.
#[derive(Debug, Clone, Copy)]
struct QueuedEvent {
    event: SpikeEvent,
    seq: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed so that the max-heap pops the earliest event, then the first inserted one.
impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Events pending for future ticks, popped in nondecreasing time order.
/// Events sharing a timestamp are popped in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    /// Queue an event, regardless of the order in which events are produced.
    pub fn push(&mut self, event: SpikeEvent) {
        self.heap.push(QueuedEvent {
            event,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Pop the earliest event if it arrives no later than `until`.
    pub fn pop_due(&mut self, until: f64) -> Option<SpikeEvent> {
        match self.heap.peek() {
            Some(queued) if queued.event.time <= until => self.heap.pop().map(|q| q.event),
            _ => None,
        }
    }

    /// Pop every event arriving no later than `until`, in processing order.
    pub fn drain_due(&mut self, until: f64) -> Vec<SpikeEvent> {
        std::iter::from_fn(|| self.pop_due(until)).collect()
    }

    /// Returns the arrival time of the earliest pending event, if any.
    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|queued| queued.event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Discard every pending event and restart the insertion ranks.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
