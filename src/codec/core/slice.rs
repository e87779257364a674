use super::{LCodec, RCodec, SluiceCodec, WCodec};
use crate::buffers::{
    Slice,
    reader::{DidntRead, Reader},
    writer::{DidntWrite, Writer},
};

// Length-prefixed bytes
impl LCodec<&[u8]> for SluiceCodec {
    fn w_len(self, x: &[u8]) -> usize {
        self.w_len(x.len()) + x.len()
    }
}

impl<W> WCodec<&[u8], &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &[u8]) -> Self::Output {
        if writer.remaining() < self.w_len(x) {
            return Err(DidntWrite);
        }
        self.write(&mut *writer, x.len())?;
        writer.write_exact(x)
    }
}

impl LCodec<&Slice> for SluiceCodec {
    fn w_len(self, x: &Slice) -> usize {
        self.w_len(x.as_slice())
    }
}

impl<W> WCodec<&Slice, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &Slice) -> Self::Output {
        self.write(&mut *writer, x.len())?;
        writer.write_slice(x)
    }
}

impl<R> RCodec<Slice, &mut R> for SluiceCodec
where
    R: Reader,
{
    type Error = DidntRead;

    fn read(self, reader: &mut R) -> Result<Slice, Self::Error> {
        let len: usize = self.read(&mut *reader)?;
        if len > reader.remaining() {
            return Err(DidntRead);
        }
        reader.read_slice(len)
    }
}
