//! Variable-length unsigned integers.
//!
//! Values are written in groups of 7 bits, least significant group first, with
//! the high bit of each byte flagging a continuation. The ninth byte, if
//! reached, carries the remaining 8 bits verbatim so that a `u64` never takes
//! more than [`VLE_LEN_MAX`] bytes.
use super::{LCodec, RCodec, SluiceCodec, WCodec};
use crate::buffers::{
    reader::{DidntRead, Reader},
    writer::{DidntWrite, Writer},
};

pub(crate) const VLE_LEN_MAX: usize = vle_len(u64::MAX);

const CONTINUE: u8 = 0x80;
const GROUP: u64 = 0x7f;

pub(crate) const fn vle_len(x: u64) -> usize {
    let bits = (u64::BITS - x.leading_zeros()) as usize;
    if bits <= 7 {
        1
    } else if bits > 7 * 8 {
        9
    } else {
        bits.div_ceil(7)
    }
}

/// Maps signed integers onto unsigned ones so that small magnitudes stay short.
pub(crate) const fn zigzag_encode(x: i64) -> u64 {
    ((x << 1) ^ (x >> 63)) as u64
}

pub(crate) const fn zigzag_decode(x: u64) -> i64 {
    ((x >> 1) as i64) ^ -((x & 1) as i64)
}

impl LCodec<u64> for SluiceCodec {
    fn w_len(self, x: u64) -> usize {
        vle_len(x)
    }
}

impl LCodec<usize> for SluiceCodec {
    fn w_len(self, x: usize) -> usize {
        vle_len(x as u64)
    }
}

impl LCodec<u8> for SluiceCodec {
    fn w_len(self, _: u8) -> usize {
        1
    }
}

// u8
impl<W> WCodec<u8, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: u8) -> Self::Output {
        writer.write_u8(x)
    }
}

impl<R> RCodec<u8, &mut R> for SluiceCodec
where
    R: Reader,
{
    type Error = DidntRead;

    fn read(self, reader: &mut R) -> Result<u8, Self::Error> {
        reader.read_u8()
    }
}

// u64
impl<W> WCodec<u64, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: u64) -> Self::Output {
        let len = vle_len(x);
        let write = move |buffer: &mut [u8]| {
            let mut v = x;
            for byte in buffer.iter_mut().take(len - 1) {
                *byte = (v & GROUP) as u8 | CONTINUE;
                v >>= 7;
            }
            // Either the last 7-bit group or, for the ninth byte, the last 8 bits.
            buffer[len - 1] = v as u8;
            len
        };
        // SAFETY: the closure writes exactly `len` bytes.
        unsafe { writer.with_slot(len, write)? };
        Ok(())
    }
}

impl<R> RCodec<u64, &mut R> for SluiceCodec
where
    R: Reader,
{
    type Error = DidntRead;

    fn read(self, reader: &mut R) -> Result<u64, Self::Error> {
        let mut v = 0;
        for i in 0..VLE_LEN_MAX - 1 {
            let b = reader.read_u8()?;
            v |= ((b as u64) & GROUP) << (7 * i);
            if b & CONTINUE == 0 {
                return Ok(v);
            }
        }
        let b = reader.read_u8()?;
        Ok(v | ((b as u64) << (7 * (VLE_LEN_MAX - 1))))
    }
}

// Derive impls
macro_rules! uint_impl {
    ($uint:ty) => {
        impl<W> WCodec<$uint, &mut W> for SluiceCodec
        where
            W: Writer,
        {
            type Output = Result<(), DidntWrite>;

            fn write(self, writer: &mut W, x: $uint) -> Self::Output {
                self.write(writer, x as u64)
            }
        }

        impl<W> WCodec<&$uint, &mut W> for SluiceCodec
        where
            W: Writer,
        {
            type Output = Result<(), DidntWrite>;

            fn write(self, writer: &mut W, x: &$uint) -> Self::Output {
                self.write(writer, *x as u64)
            }
        }

        impl<R> RCodec<$uint, &mut R> for SluiceCodec
        where
            R: Reader,
        {
            type Error = DidntRead;

            fn read(self, reader: &mut R) -> Result<$uint, Self::Error> {
                let x: u64 = self.read(reader)?;
                <$uint>::try_from(x).map_err(|_| DidntRead)
            }
        }
    };
}

uint_impl!(u32);
uint_impl!(usize);

impl<W> WCodec<&u64, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &u64) -> Self::Output {
        self.write(writer, *x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vle_len_boundaries() {
        assert_eq!(vle_len(0), 1);
        assert_eq!(vle_len(0x7f), 1);
        assert_eq!(vle_len(0x80), 2);
        assert_eq!(vle_len((1 << 14) - 1), 2);
        assert_eq!(vle_len(1 << 14), 3);
        assert_eq!(vle_len((1 << 56) - 1), 8);
        assert_eq!(vle_len(1 << 56), 9);
        assert_eq!(VLE_LEN_MAX, 9);
    }

    #[test]
    fn zigzag() {
        for x in [0i64, -1, 1, -64, 64, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(x)), x);
        }
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
    }
}
