use core::{mem, num::NonZeroUsize};

use super::{
    reader::HasReader,
    writer::{DidntWrite, HasWriter, Writer},
};

// Writer implementations
impl HasWriter for &mut Vec<u8> {
    type Writer = Self;

    fn writer(self) -> Self::Writer {
        self
    }
}

impl Writer for &mut Vec<u8> {
    fn write_exact(&mut self, bytes: &[u8]) -> Result<(), DidntWrite> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn write_u8(&mut self, byte: u8) -> Result<(), DidntWrite> {
        self.push(byte);
        Ok(())
    }

    fn remaining(&self) -> usize {
        usize::MAX
    }

    unsafe fn with_slot<F>(&mut self, len: usize, write: F) -> Result<NonZeroUsize, DidntWrite>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        self.reserve(len);

        let spare = &mut self.spare_capacity_mut()[..len];
        // SAFETY: the closure only writes into the reserved region and reports
        // how many bytes it initialized, the length is updated accordingly.
        let written = unsafe { write(&mut *(spare as *mut [mem::MaybeUninit<u8>] as *mut [u8])) };
        // SAFETY: `written` <= `len` bytes have been initialized above.
        unsafe { self.set_len(self.len() + written) };

        NonZeroUsize::new(written).ok_or(DidntWrite)
    }
}

// Reader implementations
impl<'a> HasReader for &'a Vec<u8> {
    type Reader = &'a [u8];

    fn reader(self) -> Self::Reader {
        self
    }
}
