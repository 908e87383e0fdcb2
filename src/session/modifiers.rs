//! Modifier-key channel
//!
//! The global keyboard hook runs on its own thread. It only reports modifier
//! transitions, which travel through a lock-free SPSC ring buffer (`rtrb`) to
//! the session. The session drains the buffer between operations and folds the
//! events into a [`ModifierState`], so the flags are never read half-updated.
//!
//! - Producer (keyboard hook): never blocks, drops events when full
//! - Consumer (session): drains in batches

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Default channel capacity (must be power of 2)
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Control,
    Shift,
}

/// One modifier transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierEvent {
    pub modifier: Modifier,
    pub pressed: bool,
}

impl ModifierEvent {
    pub fn pressed(modifier: Modifier) -> Self {
        Self {
            modifier,
            pressed: true,
        }
    }

    pub fn released(modifier: Modifier) -> Self {
        Self {
            modifier,
            pressed: false,
        }
    }
}

/// Folded modifier flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub control: bool,
    pub shift: bool,
}

impl ModifierState {
    pub fn apply(&mut self, event: ModifierEvent) {
        match event.modifier {
            Modifier::Control => self.control = event.pressed,
            Modifier::Shift => self.shift = event.pressed,
        }
    }
}

/// Channel statistics for monitoring
#[derive(Debug, Default)]
pub struct ChannelStats {
    pub events_pushed: AtomicU64,
    pub events_dropped: AtomicU64,
    pub events_consumed: AtomicU64,
}

/// Modifier event channel before it is split
pub struct ModifierChannel {
    producer: Producer<ModifierEvent>,
    consumer: Consumer<ModifierEvent>,
    stats: Arc<ChannelStats>,
}

impl ModifierChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// # Panics
    /// Panics if capacity is not a power of 2
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "Channel capacity must be a power of 2"
        );
        let (producer, consumer) = RingBuffer::new(capacity);
        Self {
            producer,
            consumer,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    /// Separate the hook side from the session side
    pub fn split(self) -> (ModifierProducer, ModifierConsumer) {
        (
            ModifierProducer {
                inner: self.producer,
                stats: Arc::clone(&self.stats),
            },
            ModifierConsumer {
                inner: self.consumer,
                stats: self.stats,
            },
        )
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for ModifierChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Hook side of the channel
pub struct ModifierProducer {
    inner: Producer<ModifierEvent>,
    stats: Arc<ChannelStats>,
}

impl ModifierProducer {
    /// Push an event without blocking.
    ///
    /// Returns false if the channel was full and the event was dropped.
    #[inline]
    pub fn push(&mut self, event: ModifierEvent) -> bool {
        match self.inner.push(event) {
            Ok(()) => {
                self.stats.events_pushed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

/// Session side of the channel
pub struct ModifierConsumer {
    inner: Consumer<ModifierEvent>,
    stats: Arc<ChannelStats>,
}

impl ModifierConsumer {
    #[inline]
    pub fn pop(&mut self) -> Option<ModifierEvent> {
        let event = self.inner.pop().ok()?;
        self.stats.events_consumed.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Fold every pending event into `state`, returning how many were applied
    pub fn drain_into(&mut self, state: &mut ModifierState) -> usize {
        let mut applied = 0;
        while let Some(event) = self.pop() {
            state.apply(event);
            applied += 1;
        }
        applied
    }
}

/// Global keyboard hook registration
pub trait KeyHook {
    /// Install the hook; it reports modifier transitions through `producer`.
    fn start(&mut self, producer: ModifierProducer) -> Result<()>;

    /// Remove the hook
    fn stop(&mut self) {}
}
