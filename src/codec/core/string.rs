use super::{LCodec, RCodec, SluiceCodec, WCodec};
use crate::buffers::{
    reader::{DidntRead, Reader},
    writer::{DidntWrite, Writer},
};

impl LCodec<&str> for SluiceCodec {
    fn w_len(self, x: &str) -> usize {
        self.w_len(x.as_bytes())
    }
}

impl<W> WCodec<&str, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &str) -> Self::Output {
        self.write(&mut *writer, x.as_bytes())
    }
}

impl<W> WCodec<&String, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &String) -> Self::Output {
        self.write(&mut *writer, x.as_str())
    }
}

impl<R> RCodec<String, &mut R> for SluiceCodec
where
    R: Reader,
{
    type Error = DidntRead;

    fn read(self, reader: &mut R) -> Result<String, Self::Error> {
        let len: usize = self.read(&mut *reader)?;
        if len > reader.remaining() {
            return Err(DidntRead);
        }
        let mut buff = vec![0u8; len];
        reader.read_exact(&mut buff)?;
        String::from_utf8(buff).map_err(|_| DidntRead)
    }
}
