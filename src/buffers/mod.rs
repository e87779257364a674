mod raw;
pub(crate) mod slice;
mod vec;

pub use slice::*;

/// Traits for writing data to buffers.
pub(crate) mod writer {
    use core::num::NonZeroUsize;

    use super::Slice;

    /// Error type indicating a write operation failed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct DidntWrite;

    /// A trait for writing bytes into a buffer.
    pub(crate) trait Writer {
        /// Writes all bytes from `bytes` into the buffer.
        ///
        /// # Errors
        ///
        /// Returns `DidntWrite` if the buffer has insufficient space to write
        /// all bytes.
        fn write_exact(&mut self, bytes: &[u8]) -> Result<(), DidntWrite>;

        /// Returns the number of bytes that can still be written to this
        /// buffer.
        fn remaining(&self) -> usize;

        /// Writes a single byte to the buffer.
        fn write_u8(&mut self, byte: u8) -> Result<(), DidntWrite> {
            self.write_exact(core::slice::from_ref(&byte))
        }

        /// Writes the contents of a [`Slice`] to the buffer.
        fn write_slice(&mut self, slice: &Slice) -> Result<(), DidntWrite> {
            self.write_exact(slice.as_slice())
        }

        /// Provides a buffer of exactly `len` uninitialized bytes to `write` to
        /// allow in-place writing.
        ///
        /// The closure receives a mutable slice and must return the number of
        /// bytes it actually wrote.
        ///
        /// # Safety
        ///
        /// Caller must ensure that `write` returns an integer less than or
        /// equal to the length of the slice passed as argument.
        unsafe fn with_slot<F>(&mut self, len: usize, write: F) -> Result<NonZeroUsize, DidntWrite>
        where
            F: FnOnce(&mut [u8]) -> usize;
    }

    /// A trait for types that can provide a writer.
    pub(crate) trait HasWriter {
        type Writer: Writer;

        fn writer(self) -> Self::Writer;
    }
}

/// Traits for reading data from buffers.
pub(crate) mod reader {
    use super::Slice;

    /// Error type indicating a read operation failed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct DidntRead;

    /// A trait for reading bytes from a buffer.
    pub(crate) trait Reader {
        /// Reads exactly enough bytes to fill `into`.
        ///
        /// # Errors
        ///
        /// Returns `DidntRead` if the buffer has insufficient data.
        fn read_exact(&mut self, into: &mut [u8]) -> Result<(), DidntRead>;

        /// Returns the number of bytes remaining to be read from this buffer.
        fn remaining(&self) -> usize;

        /// Reads exactly `len` bytes, returning them as a single [`Slice`].
        ///
        /// Readers backed by a [`Slice`] hand out a view without copying.
        fn read_slice(&mut self, len: usize) -> Result<Slice, DidntRead>;

        /// Reads a single byte from the buffer.
        fn read_u8(&mut self) -> Result<u8, DidntRead> {
            let mut byte = 0;
            self.read_exact(core::slice::from_mut(&mut byte))?;
            Ok(byte)
        }

        /// Returns `true` if there is more data to read.
        fn can_read(&self) -> bool {
            self.remaining() != 0
        }
    }

    /// A trait for types that can provide a reader.
    pub(crate) trait HasReader {
        type Reader: Reader;

        fn reader(self) -> Self::Reader;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Slice,
        reader::{HasReader, Reader},
        writer::{HasWriter, Writer},
    };

    const BYTES: usize = 14;

    const WBS0: u8 = 0;
    const WBS1: u8 = 1;
    const WBS2: [u8; 4] = [2, 3, 4, 5];
    const WBS3: [u8; 4] = [6, 7, 8, 9];
    const WBS4: [u8; 4] = [10, 11, 12, 13];

    macro_rules! run_write {
        ($buffer:expr) => {{
            let mut writer = $buffer.writer();
            writer.write_u8(WBS0).unwrap();
            writer.write_u8(WBS1).unwrap();
            writer.write_exact(&WBS2).unwrap();
            writer.write_exact(&WBS3).unwrap();

            // SAFETY: callback returns the length of the buffer
            unsafe {
                writer.with_slot(4, |buffer| {
                    buffer.copy_from_slice(&WBS4);
                    WBS4.len()
                })
            }
            .unwrap();
        }};
    }

    macro_rules! run_read {
        ($buffer:expr) => {
            let mut reader = $buffer.reader();

            assert_eq!(WBS0, reader.read_u8().unwrap());
            assert_eq!(BYTES - 1, reader.remaining());
            assert_eq!(WBS1, reader.read_u8().unwrap());
            assert_eq!(BYTES - 2, reader.remaining());

            let mut rbs = [0u8; 4];
            reader.read_exact(&mut rbs).unwrap();
            assert_eq!(WBS2, rbs);

            let slice = reader.read_slice(4).unwrap();
            assert_eq!(slice, WBS3);

            reader.read_exact(&mut rbs).unwrap();
            assert_eq!(WBS4, rbs);

            assert!(!reader.can_read());
            assert!(reader.read_u8().is_err());
            assert!(reader.read_exact(&mut rbs).is_err());
            assert!(reader.read_slice(1).is_err());
        };
    }

    #[test]
    fn buffer_array() {
        let mut sbuf = [0u8; BYTES];
        run_write!(sbuf.as_mut());
        run_read!(sbuf.as_ref());

        let mut small = [0u8; 2];
        let mut writer = small.as_mut().writer();
        assert!(writer.write_exact(&WBS2).is_err());
    }

    #[test]
    fn buffer_vec() {
        let mut vbuf = vec![];
        run_write!(&mut vbuf);
        run_read!(&vbuf);
    }

    #[test]
    fn buffer_slice() {
        let mut vbuf = vec![];
        run_write!(&mut vbuf);

        let mut slice = Slice::from(vbuf);
        run_read!(&mut slice);
        assert!(slice.is_empty());
    }
}
