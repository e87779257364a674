use core::{
    fmt,
    hash::{Hash, Hasher},
    ops::{Bound, Deref, RangeBounds},
};
use std::sync::Arc;

use super::reader::{DidntRead, HasReader, Reader};

/// A byte buffer that can back a [`Slice`].
///
/// The trait requires `Send + Sync` so that the buffer can be shared across
/// the producer and consumer threads of a reservoir via [`Arc`].
pub trait DynBuf: Send + Sync {
    /// Returns a byte slice view of the entire buffer.
    fn as_slice(&self) -> &[u8];
}

impl DynBuf for Vec<u8> {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

impl DynBuf for Box<[u8]> {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

impl<const N: usize> DynBuf for [u8; N] {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

impl DynBuf for &'static [u8] {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

/// A cheaply cloneable view over a contiguous region of bytes.
///
/// Tuples received from the transport are handed to the core as a shared
/// buffer plus an offset and a length. [`Slice`] keeps that buffer alive
/// through an [`Arc`] and only tracks the bounds, so creating a control tuple
/// or a payload from received bytes never copies them.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use sluice::Slice;
///
/// let frame = Slice::new(Arc::new(vec![9, 4, 2, 7]), 1, 2).unwrap_or_else(|_| panic!("Out of bound"));
/// assert_eq!(frame.as_slice(), &[4, 2]);
///
/// // Views share the underlying buffer
/// let tail = frame.view(1..).unwrap();
/// assert_eq!(&*tail, &[2]);
/// ```
#[derive(Clone)]
pub struct Slice {
    buf: Arc<dyn DynBuf>,
    start: usize,
    end: usize,
}

impl Slice {
    /// Creates a view of `length` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns the original buffer if the requested region does not fit.
    pub fn new(buf: Arc<dyn DynBuf>, offset: usize, length: usize) -> Result<Slice, Arc<dyn DynBuf>> {
        match offset.checked_add(length) {
            Some(end) if end <= buf.as_slice().len() => Ok(Self {
                buf,
                start: offset,
                end,
            }),
            _ => Err(buf),
        }
    }

    /// Returns the length of the view in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the view has a length of 0.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the viewed bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `start <= end <= buf.len()` holds for every constructor:
        // `new` validates it and `view` only ever narrows an already valid range.
        unsafe { self.buf.as_slice().get_unchecked(self.start..self.end) }
    }

    /// Creates a view into a subrange of this view, relative to its start.
    ///
    /// Returns `None` if the range is out of bounds.
    #[must_use]
    pub fn view(&self, range: impl RangeBounds<usize>) -> Option<Self> {
        let start_delta = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.checked_add(1)?,
            Bound::Unbounded => 0,
        };
        let end_delta = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1)?,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len(),
        };
        (start_delta <= end_delta && end_delta <= self.len()).then(|| Slice {
            buf: Arc::clone(&self.buf),
            start: self.start + start_delta,
            end: self.start + end_delta,
        })
    }
}

impl Deref for Slice {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl<Rhs: AsRef<[u8]> + ?Sized> PartialEq<Rhs> for Slice {
    fn eq(&self, other: &Rhs) -> bool {
        self.as_slice() == other.as_ref()
    }
}

impl Eq for Slice {}

impl Hash for Slice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x?}", self.as_slice())
    }
}

impl<T> From<Arc<T>> for Slice
where
    T: DynBuf + 'static,
{
    fn from(buf: Arc<T>) -> Self {
        let end = buf.as_slice().len();
        Self { buf, start: 0, end }
    }
}

impl<T> From<T> for Slice
where
    T: DynBuf + 'static,
{
    fn from(buf: T) -> Self {
        Self::from(Arc::new(buf))
    }
}

// Reader
impl HasReader for &mut Slice {
    type Reader = Self;

    fn reader(self) -> Self::Reader {
        self
    }
}

impl Reader for &mut Slice {
    fn read_exact(&mut self, into: &mut [u8]) -> Result<(), DidntRead> {
        let mut reader = self.as_slice();
        reader.read_exact(into)?;
        self.start += into.len();
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DidntRead> {
        let byte = *self.as_slice().first().ok_or(DidntRead)?;
        self.start += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> Result<Slice, DidntRead> {
        let res = self.view(..len).ok_or(DidntRead)?;
        self.start += len;
        Ok(res)
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash() {
        use std::collections::hash_map::DefaultHasher;

        let buf = vec![1u8, 2, 3, 4, 5];
        let mut buf_hasher = DefaultHasher::new();
        buf.as_slice().hash(&mut buf_hasher);

        let slice: Slice = buf.clone().into();
        let mut slice_hasher = DefaultHasher::new();
        slice.hash(&mut slice_hasher);

        assert_eq!(buf_hasher.finish(), slice_hasher.finish());
    }

    #[test]
    fn slice_new_bounds() {
        let buf: Arc<dyn DynBuf> = Arc::new(vec![0u8, 1, 2, 3, 4, 5]);

        let s = Slice::new(buf.clone(), 2, 3).unwrap_or_else(|_| panic!());
        assert_eq!(s.as_slice(), &[2, 3, 4]);

        let s = Slice::new(buf.clone(), 6, 0).unwrap_or_else(|_| panic!());
        assert!(s.is_empty());

        assert!(Slice::new(buf.clone(), 4, 3).is_err());
        assert!(Slice::new(buf.clone(), 7, 0).is_err());
        assert!(Slice::new(buf, usize::MAX, 2).is_err());
    }

    #[test]
    fn slice_view() {
        let slice: Slice = vec![0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9].into();

        assert_eq!(slice.view(..).unwrap().as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(slice.view(2..6).unwrap().as_slice(), &[2, 3, 4, 5]);
        assert_eq!(slice.view(..3).unwrap().as_slice(), &[0, 1, 2]);
        assert_eq!(slice.view(7..).unwrap().as_slice(), &[7, 8, 9]);
        assert_eq!(slice.view(1..=4).unwrap().as_slice(), &[1, 2, 3, 4]);
        assert!(slice.view(3..3).unwrap().is_empty());

        // Nested views are relative to the parent view
        let outer = slice.view(2..8).unwrap();
        let inner = outer.view(1..4).unwrap();
        assert_eq!(inner.as_slice(), &[3, 4, 5]);
        assert!(outer.view(0..10).is_none());

        assert!(slice.view(0..20).is_none());
        assert!(slice.view(15..).is_none());
        assert!(slice.view(..=usize::MAX).is_none());

        assert_eq!(slice.view(2..5).unwrap(), slice.view(2..5).unwrap());
        assert_ne!(slice.view(2..5).unwrap(), slice.view(3..5).unwrap());
    }

    #[test]
    fn slice_from_static() {
        static BYTES: &[u8] = &[6, 0];
        let slice = Slice::from(BYTES);
        assert_eq!(slice, [6u8, 0]);
        assert_eq!(slice.len(), 2);
    }
}
