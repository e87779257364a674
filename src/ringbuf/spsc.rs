use std::sync::Arc;

use super::common::{RingBuffer, RingBufferReader, RingBufferWriter};

/// Creates a single-producer single-consumer ringbuffer holding at most
/// `capacity` elements.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub(crate) fn ringbuffer_spsc<T>(capacity: usize) -> (RingBufferWriterSPSC<T>, RingBufferReaderSPSC<T>) {
    let rb = Arc::new(RingBuffer::new(capacity));
    (
        RingBufferWriterSPSC(RingBufferWriter::new(rb.clone())),
        RingBufferReaderSPSC(RingBufferReader::new(rb)),
    )
}

#[repr(transparent)]
pub(crate) struct RingBufferWriterSPSC<T>(RingBufferWriter<T>);

impl<T> RingBufferWriterSPSC<T> {
    pub(crate) fn push(&mut self, t: T) -> Option<T> {
        self.0.push(t)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.inner().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.0.inner().capacity()
    }
}

#[repr(transparent)]
pub(crate) struct RingBufferReaderSPSC<T>(RingBufferReader<T>);

impl<T> RingBufferReaderSPSC<T> {
    pub(crate) fn pull(&mut self) -> Option<T> {
        self.0.pull()
    }

    pub(crate) fn peek(&mut self) -> Option<&T> {
        self.0.peek()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.inner().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.0.inner().capacity()
    }
}
