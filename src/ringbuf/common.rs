use std::{
    mem::{self, MaybeUninit},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam_utils::CachePadded;

/// Internal ringbuffer storage. This type is private to the crate.
///
/// Indices grow monotonically and wrap on overflow. The number of slots is a
/// power of two so that a mask converts an index into a position, while the
/// number of elements admitted is bounded by the logical `capacity`.
pub(super) struct RingBuffer<T> {
    ptr: *mut [MaybeUninit<T>],
    mask: usize,
    capacity: usize,
    idx_r: CachePadded<AtomicUsize>,
    idx_w: CachePadded<AtomicUsize>,
}

impl<T> RingBuffer<T> {
    pub(super) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        let slots = capacity
            .checked_next_power_of_two()
            .unwrap_or_else(|| panic!("Capacity {capacity} is too large"));

        let ptr = Box::into_raw(
            (0..slots)
                .map(|_| MaybeUninit::uninit())
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        );

        RingBuffer {
            ptr,
            // Since slots is a power of two, slots-1 is a mask covering N slots. Indexes are left growing
            // indefinitely and naturally wrap around once they reach usize::MAX.
            mask: slots - 1,
            capacity,
            idx_r: CachePadded::new(AtomicUsize::new(0)),
            idx_w: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    const fn len_of(r: usize, w: usize) -> usize {
        w.wrapping_sub(r)
    }

    pub(super) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements currently stored, as seen from any thread.
    pub(super) fn len(&self) -> usize {
        let r = self.idx_r.load(Ordering::Acquire);
        let w = self.idx_w.load(Ordering::Acquire);
        Self::len_of(r, w)
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn get_elem_mut(&self, idx: usize) -> &mut MaybeUninit<T> {
        unsafe { (&mut *self.ptr).get_unchecked_mut(idx & self.mask) }
    }
}

// The internal `RingBuffer` is stored inside an `Arc` and will be deallocated
// when the last writer or reader handle is dropped (i.e., when the `Arc`
// reference count reaches zero).
impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        let mut idx_r = self.idx_r.load(Ordering::Acquire);
        let idx_w = self.idx_w.load(Ordering::Acquire);

        while idx_r != idx_w {
            // SAFETY: we are in Drop, both handles are gone and every element
            // between `idx_r` and `idx_w` is initialized and owned by the
            // buffer.
            let t = unsafe { mem::replace(self.get_elem_mut(idx_r), MaybeUninit::uninit()).assume_init() };
            mem::drop(t);
            idx_r = idx_r.wrapping_add(1);
        }

        // Every element has been dropped exactly once, the slots can be freed.
        let ptr = unsafe { Box::from_raw(self.ptr) };
        mem::drop(ptr);
    }
}

/// Writer handle of the ringbuffer.
pub(super) struct RingBufferWriter<T> {
    inner: Arc<RingBuffer<T>>,
    cached_idx_r: usize,
    local_idx_w: usize,
}

unsafe impl<T: Send> Send for RingBufferWriter<T> {}
unsafe impl<T: Send> Sync for RingBufferWriter<T> {}

impl<T> RingBufferWriter<T> {
    pub(super) fn new(inner: Arc<RingBuffer<T>>) -> Self {
        Self {
            inner,
            cached_idx_r: 0,
            local_idx_w: 0,
        }
    }

    pub(super) fn inner(&self) -> &RingBuffer<T> {
        &self.inner
    }

    #[inline]
    fn is_full(&mut self) -> bool {
        let capacity = self.inner.capacity();
        let mut is_full = RingBuffer::<T>::len_of(self.cached_idx_r, self.local_idx_w) >= capacity;
        if is_full {
            self.cached_idx_r = self.inner.idx_r.load(Ordering::Acquire);
            is_full = RingBuffer::<T>::len_of(self.cached_idx_r, self.local_idx_w) >= capacity;
        }
        is_full
    }

    /// Push an element into the RingBuffer.
    ///
    /// Returns `Some(T)` when the buffer is full (giving back ownership of the value), otherwise returns `None` on
    /// success.
    #[inline]
    pub(super) fn push(&mut self, t: T) -> Option<T> {
        if self.is_full() {
            return Some(t);
        }

        let _ = mem::replace(unsafe { self.inner.get_elem_mut(self.local_idx_w) }, MaybeUninit::new(t));

        self.local_idx_w = self.local_idx_w.wrapping_add(1);
        self.inner.idx_w.store(self.local_idx_w, Ordering::Release);

        None
    }
}

/// Reader handle of the ringbuffer.
pub(super) struct RingBufferReader<T> {
    inner: Arc<RingBuffer<T>>,
    local_idx_r: usize,
    cached_idx_w: usize,
}

unsafe impl<T: Send> Send for RingBufferReader<T> {}
unsafe impl<T: Send> Sync for RingBufferReader<T> {}

impl<T> RingBufferReader<T> {
    pub(super) fn new(inner: Arc<RingBuffer<T>>) -> Self {
        Self {
            inner,
            local_idx_r: 0,
            cached_idx_w: 0,
        }
    }

    pub(super) fn inner(&self) -> &RingBuffer<T> {
        &self.inner
    }

    #[inline]
    fn is_empty(&mut self) -> bool {
        let mut is_empty = self.local_idx_r == self.cached_idx_w;
        if is_empty {
            self.cached_idx_w = self.inner.idx_w.load(Ordering::Acquire);
            is_empty = self.local_idx_r == self.cached_idx_w;
        }
        is_empty
    }

    /// Pull an element from the ringbuffer.
    ///
    /// Returns `Some(T)` if an element is available, otherwise `None` when the buffer is empty.
    #[inline]
    pub(super) fn pull(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let t = unsafe { mem::replace(self.inner.get_elem_mut(self.local_idx_r), MaybeUninit::uninit()).assume_init() };
        // Let the counter grow indefinitely and potentially overflow resetting it to 0.
        self.local_idx_r = self.local_idx_r.wrapping_add(1);
        self.inner.idx_r.store(self.local_idx_r, Ordering::Release);

        Some(t)
    }

    /// Peek an element from the ringbuffer without pulling it out.
    ///
    /// Returns `Some(&T)` when at least one element is present, or `None` when the buffer is empty.
    #[inline]
    pub(super) fn peek(&mut self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let t = unsafe { self.inner.get_elem_mut(self.local_idx_r).assume_init_ref() };
        Some(t)
    }
}
