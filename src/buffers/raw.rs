use core::{mem, num::NonZeroUsize};

use super::{
    Slice,
    reader::{DidntRead, HasReader, Reader},
    writer::{DidntWrite, HasWriter, Writer},
};

// Writer implementations
impl HasWriter for &mut [u8] {
    type Writer = Self;

    fn writer(self) -> Self::Writer {
        self
    }
}

impl Writer for &mut [u8] {
    fn write_exact(&mut self, bytes: &[u8]) -> Result<(), DidntWrite> {
        if self.len() < bytes.len() {
            return Err(DidntWrite);
        }
        let (to_write, remain) = mem::take(self).split_at_mut(bytes.len());
        to_write.copy_from_slice(bytes);
        *self = remain;
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.len()
    }

    unsafe fn with_slot<F>(&mut self, len: usize, write: F) -> Result<NonZeroUsize, DidntWrite>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if len > self.len() {
            return Err(DidntWrite);
        }
        let written = write(&mut self[..len]);
        // SAFETY: `written` <= `len` is guaranteed by function contract
        *self = unsafe { mem::take(self).get_unchecked_mut(written..) };
        NonZeroUsize::new(written).ok_or(DidntWrite)
    }
}

// Reader implementations
impl HasReader for &[u8] {
    type Reader = Self;

    fn reader(self) -> Self::Reader {
        self
    }
}

impl Reader for &[u8] {
    fn read_exact(&mut self, into: &mut [u8]) -> Result<(), DidntRead> {
        let len = into.len();
        if self.len() < len {
            return Err(DidntRead);
        }
        let (to_read, remain) = self.split_at(len);
        into.copy_from_slice(to_read);
        *self = remain;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DidntRead> {
        let (&first, remain) = self.split_first().ok_or(DidntRead)?;
        *self = remain;
        Ok(first)
    }

    // Borrowed bytes cannot be shared, the slice is copied out.
    fn read_slice(&mut self, len: usize) -> Result<Slice, DidntRead> {
        let mut buffer = vec![0u8; len];
        self.read_exact(&mut buffer)?;
        Ok(buffer.into())
    }

    fn remaining(&self) -> usize {
        self.len()
    }

    fn can_read(&self) -> bool {
        !self.is_empty()
    }
}
