//! Stream ownership on top of a reservoir.
//!
//! A reservoir does not care which kind of control tuple it returns. The
//! stream does: window ids must never go backwards and nothing may follow the
//! end of the stream. [`Publisher`] and [`Subscriber`] wrap the two sides of a
//! reservoir and enforce both.
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;

use crate::{
    reservoir::{Reservoir, ReservoirError, ReservoirWriter, Sink},
    tuple::{ControlTuple, Tuple},
};

/// Error returned by [`Publisher::publish`].
#[derive(Debug, Error)]
pub enum StreamError<T> {
    #[error("Stream has ended")]
    Ended(Tuple<T>),

    #[error("Window id {found:#x} is lower than the last published {last:#x}")]
    WindowRegression { last: u64, found: u64 },

    #[error(transparent)]
    Reservoir(#[from] ReservoirError<T>),
}

/// Producer side of a stream.
pub struct Publisher<T> {
    writer: ReservoirWriter<T>,
    ended: Arc<AtomicBool>,
    closed: bool,
    window_id: Option<u64>,
}

impl<T> Publisher<T> {
    /// Enqueues `tuple` on the stream.
    ///
    /// # Errors
    ///
    /// Fails once the stream has ended, when a control tuple carries a lower
    /// window id than the previous one, or when the reservoir is full. The
    /// stream is left unchanged in every case.
    pub fn publish(&mut self, tuple: Tuple<T>) -> Result<(), StreamError<T>> {
        if self.is_ended() {
            return Err(StreamError::Ended(tuple));
        }

        let control = tuple.as_control().map(|c| (c.window_id(), c.is_end_stream()));
        if let (Some((found, _)), Some(last)) = (control, self.window_id) {
            if found < last {
                return Err(StreamError::WindowRegression { last, found });
            }
        }

        self.writer.add(tuple)?;

        if let Some((window_id, end)) = control {
            self.window_id = Some(window_id);
            if end {
                tracing::debug!("Stream {}: end of stream published at {window_id:#x}", self.writer.id());
                self.closed = true;
            }
        }
        Ok(())
    }

    /// Whether the stream accepts no more tuples.
    pub fn is_ended(&self) -> bool {
        self.closed || self.ended.load(Ordering::Acquire)
    }

    /// Last window id published.
    pub fn window_id(&self) -> Option<u64> {
        self.window_id
    }

    pub fn remaining(&self) -> usize {
        self.writer.remaining()
    }
}

/// Consumer side of a stream.
pub struct Subscriber<T> {
    reservoir: Reservoir<T>,
    ended: Arc<AtomicBool>,
}

impl<T> Subscriber<T> {
    /// See [`Reservoir::set_sink`].
    pub fn set_sink(&self, sink: Arc<dyn Sink<T>>) -> Option<Arc<dyn Sink<T>>> {
        self.reservoir.set_sink(sink)
    }

    /// Sweeps the underlying reservoir, see [`Reservoir::sweep`].
    ///
    /// Returning an end of stream tuple marks the stream as ended: the
    /// publisher rejects anything published afterwards.
    pub fn sweep(&mut self) -> Result<Option<ControlTuple>, ReservoirError<T>> {
        let control = self.reservoir.sweep()?;
        if let Some(c) = control.as_ref().filter(|c| c.is_end_stream()) {
            if !self.ended.swap(true, Ordering::AcqRel) {
                tracing::debug!("Stream {}: ended at {c}", self.reservoir.id());
            }
        }
        Ok(control)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub fn reservoir(&self) -> &Reservoir<T> {
        &self.reservoir
    }
}

/// Creates both sides of a stream over a reservoir of `capacity` tuples.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub fn stream<T>(id: impl Into<String>, capacity: usize) -> (Publisher<T>, Subscriber<T>) {
    let (writer, reservoir) = crate::reservoir(id).capacity(capacity).build();
    let ended = Arc::new(AtomicBool::new(false));
    (
        Publisher {
            writer,
            ended: ended.clone(),
            closed: false,
            window_id: None,
        },
        Subscriber { reservoir, ended },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::ControlKind;

    fn control(kind: ControlKind, window_id: u64) -> Tuple<u32> {
        ControlTuple::cached(kind, window_id).into()
    }

    #[test]
    fn window_regression() {
        let (mut p, _s) = stream::<u32>("s", 8);
        p.publish(control(ControlKind::BeginWindow, 10)).unwrap();
        p.publish(Tuple::Data(1)).unwrap();
        p.publish(control(ControlKind::EndWindow, 10)).unwrap();

        let err = p.publish(control(ControlKind::BeginWindow, 9)).unwrap_err();
        assert!(matches!(err, StreamError::WindowRegression { last: 10, found: 9 }));
        assert_eq!(p.window_id(), Some(10));

        p.publish(control(ControlKind::BeginWindow, 11)).unwrap();
    }

    #[test]
    fn end_stream_is_terminal() {
        let (mut p, mut s) = stream::<u32>("s", 8);
        s.set_sink(Arc::new(|_: u32| {}));

        p.publish(Tuple::Data(1)).unwrap();
        p.publish(control(ControlKind::EndStream, 3)).unwrap();
        assert!(p.is_ended());
        assert!(!s.is_ended());

        assert!(matches!(p.publish(Tuple::Data(2)), Err(StreamError::Ended(Tuple::Data(2)))));

        let c = s.sweep().unwrap().unwrap();
        assert!(c.is_end_stream());
        assert!(s.is_ended());
        assert!(s.reservoir().is_empty());
    }

    #[test]
    fn capacity_exceeded() {
        let (mut p, _s) = stream::<u32>("s", 1);
        p.publish(Tuple::Data(1)).unwrap();
        assert_eq!(p.remaining(), 0);
        assert!(matches!(
            p.publish(control(ControlKind::EndStream, 0)),
            Err(StreamError::Reservoir(ReservoirError::CapacityExceeded(Tuple::Control(_))))
        ));
        // Rejected tuples leave the stream open
        assert!(!p.is_ended());
    }
}
