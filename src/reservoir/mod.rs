//! Bounded per-subscriber tuple buffers.
//!
//! A reservoir sits between one producer and one downstream [`Sink`]. The
//! producer enqueues tuples through a [`ReservoirWriter`] and never blocks: a
//! full reservoir rejects the tuple and hands it back. The consumer drains the
//! reservoir with [`Reservoir::sweep`], which pushes data tuples into the sink
//! and stops at the first control tuple so the caller can react to the window
//! boundary before resuming.
//!
//! ```
//! use std::sync::{Arc, mpsc};
//!
//! use sluice::{ControlKind, ControlTuple, Tuple};
//!
//! let (mut writer, mut reservoir) = sluice::reservoir::<u32>("sub-1").capacity(8).build();
//! let (tx, rx) = mpsc::channel();
//! reservoir.set_sink(Arc::new(tx));
//!
//! writer.add(Tuple::Data(1)).unwrap();
//! writer.add(Tuple::Data(2)).unwrap();
//! writer.add(ControlTuple::cached(ControlKind::EndWindow, 0).into()).unwrap();
//! writer.add(Tuple::Data(3)).unwrap();
//!
//! let control = reservoir.sweep().unwrap().unwrap();
//! assert_eq!(control.kind(), ControlKind::EndWindow);
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), [1, 2]);
//! assert_eq!(reservoir.len(), 1);
//! ```
use std::{
    fmt,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use arc_swap::ArcSwapOption;

use crate::{
    ringbuf::{RingBufferReaderSPSC, RingBufferWriterSPSC, ringbuffer_spsc},
    tuple::{ControlTuple, Tuple},
};

mod error;
mod sink;

pub use error::ReservoirError;
pub use sink::Sink;

/// Default number of tuples a reservoir holds.
pub const DEFAULT_CAPACITY: usize = 1024;

type SinkSlot<T> = ArcSwapOption<Arc<dyn Sink<T>>>;

struct Shared<T> {
    id: String,
    sink: SinkSlot<T>,
}

impl<T> Shared<T> {
    fn set_sink(&self, sink: Arc<dyn Sink<T>>) -> Option<Arc<dyn Sink<T>>> {
        let previous = self.sink.swap(Some(Arc::new(sink)));
        tracing::debug!(
            "Reservoir {}: sink {}",
            self.id,
            if previous.is_some() { "replaced" } else { "registered" }
        );
        previous.map(Arc::unwrap_or_clone)
    }
}

/// Producer side of a reservoir.
pub struct ReservoirWriter<T> {
    shared: Arc<Shared<T>>,
    tx: RingBufferWriterSPSC<Tuple<T>>,
}

impl<T> ReservoirWriter<T> {
    /// Enqueues `tuple` at the back of the reservoir.
    ///
    /// # Errors
    ///
    /// Returns [`ReservoirError::CapacityExceeded`] with the tuple when the
    /// reservoir is full. Nothing is retried: applying backpressure or
    /// dropping is up to the producer.
    pub fn add(&mut self, tuple: Tuple<T>) -> Result<(), ReservoirError<T>> {
        match self.tx.push(tuple) {
            None => Ok(()),
            Some(tuple) => {
                tracing::trace!("Reservoir {}: capacity exceeded", self.shared.id);
                Err(ReservoirError::CapacityExceeded(tuple))
            }
        }
    }

    /// Number of tuples that can be added before the reservoir is full.
    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }
}

/// Consumer side of a reservoir.
///
/// Only the consumer sweeps, while the sink may be swapped from anywhere
/// through a [`SinkSwitch`].
pub struct Reservoir<T> {
    shared: Arc<Shared<T>>,
    rx: RingBufferReaderSPSC<Tuple<T>>,
    count: AtomicUsize,
}

impl<T> Reservoir<T> {
    /// Registers `sink` and returns the one it replaces, if any.
    ///
    /// Tuples already enqueued are left untouched. A sweep in progress
    /// finishes with the sink it started with.
    pub fn set_sink(&self, sink: Arc<dyn Sink<T>>) -> Option<Arc<dyn Sink<T>>> {
        self.shared.set_sink(sink)
    }

    /// Returns a handle for changing the sink from another thread.
    pub fn sink_switch(&self) -> SinkSwitch<T> {
        SinkSwitch {
            shared: self.shared.clone(),
        }
    }

    /// Drains data tuples into the sink until a control tuple is found.
    ///
    /// The control tuple is removed from the reservoir and returned. `None`
    /// means every tuple present when the sweep started was delivered. A
    /// sweep never waits for tuples to arrive: tuples enqueued while it runs
    /// are left for the next one.
    ///
    /// The running [`count`](Self::count) grows by the 1-based position of the
    /// control tuple when one is found, by the number of tuples swept
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ReservoirError::IllegalState`] when a data tuple is pending
    /// and no sink was ever registered. The data tuple stays queued.
    pub fn sweep(&mut self) -> Result<Option<ControlTuple>, ReservoirError<T>> {
        let size = self.rx.len();
        let sink = self.shared.sink.load_full();

        for i in 1..=size {
            let is_control = match self.rx.peek() {
                Some(tuple) => tuple.is_control(),
                None => break,
            };

            if is_control {
                if let Some(Tuple::Control(c)) = self.rx.pull() {
                    self.count.fetch_add(i, Ordering::AcqRel);
                    tracing::trace!("Reservoir {}: swept {} tuples, stopped at {c}", self.shared.id, i - 1);
                    return Ok(Some(c));
                }
                break;
            }

            let Some(sink) = sink.as_deref() else {
                tracing::debug!("Reservoir {}: data tuple pending with no sink", self.shared.id);
                return Err(ReservoirError::IllegalState);
            };
            if let Some(Tuple::Data(t)) = self.rx.pull() {
                sink.put(t);
            }
        }

        self.count.fetch_add(size, Ordering::AcqRel);
        if size > 0 {
            tracing::trace!("Reservoir {}: swept {size} tuples", self.shared.id);
        }
        Ok(None)
    }

    /// Returns the running count, zeroing it afterwards when `reset` is set.
    pub fn count(&self, reset: bool) -> usize {
        if reset {
            self.count.swap(0, Ordering::AcqRel)
        } else {
            self.count.load(Ordering::Acquire)
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Number of tuples waiting to be swept.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity()
    }

    pub fn has_sink(&self) -> bool {
        self.shared.sink.load().is_some()
    }
}

impl<T> fmt::Display for Reservoir<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reservoir{{id={}, count={}, sink={}}}",
            self.id(),
            self.count(false),
            if self.has_sink() { "set" } else { "none" }
        )
    }
}

impl<T> fmt::Debug for Reservoir<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservoir")
            .field("id", &self.id())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("count", &self.count(false))
            .field("sink", &self.has_sink())
            .finish()
    }
}

/// Swaps the sink of a [`Reservoir`] concurrently with its sweeps.
pub struct SinkSwitch<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SinkSwitch<T> {
    /// See [`Reservoir::set_sink`].
    pub fn set_sink(&self, sink: Arc<dyn Sink<T>>) -> Option<Arc<dyn Sink<T>>> {
        self.shared.set_sink(sink)
    }
}

impl<T> Clone for SinkSwitch<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Builder for a reservoir, see [`reservoir`](crate::reservoir()).
pub struct ReservoirBuilder<T> {
    id: String,
    capacity: usize,
    sink: Option<Arc<dyn Sink<T>>>,
    _tuple: PhantomData<fn(T)>,
}

impl<T> ReservoirBuilder<T> {
    /// Sets the maximum number of tuples the reservoir holds.
    ///
    /// Default: 1024
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Registers a sink up front.
    ///
    /// Default: none, call [`Reservoir::set_sink`] before the first data tuple
    /// is swept.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn Sink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the reservoir.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is 0.
    pub fn build(self) -> (ReservoirWriter<T>, Reservoir<T>) {
        let Self { id, capacity, sink, .. } = self;
        let (tx, rx) = ringbuffer_spsc(capacity);

        tracing::debug!("Reservoir {id}: created with capacity {capacity}");
        let shared = Arc::new(Shared {
            id,
            sink: ArcSwapOption::new(sink.map(Arc::new)),
        });

        let writer = ReservoirWriter {
            shared: shared.clone(),
            tx,
        };
        let reservoir = Reservoir {
            shared,
            rx,
            count: AtomicUsize::new(0),
        };
        (writer, reservoir)
    }
}

/// Creates a [`ReservoirBuilder`] for a reservoir identified by `id`.
pub fn reservoir<T>(id: impl Into<String>) -> ReservoirBuilder<T> {
    ReservoirBuilder {
        id: id.into(),
        capacity: DEFAULT_CAPACITY,
        sink: None,
        _tuple: PhantomData,
    }
}
