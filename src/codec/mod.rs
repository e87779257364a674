//! Wire encoding of tuples.
//!
//! Every encoder and decoder in the crate is expressed through the
//! [`WCodec`]/[`RCodec`]/[`LCodec`] traits implemented on the [`SluiceCodec`]
//! unit type, so that the same routine works on any [`Writer`] or [`Reader`].
//!
//! [`Writer`]: crate::buffers::writer::Writer
//! [`Reader`]: crate::buffers::reader::Reader
pub(crate) mod control;
pub(crate) mod core;
pub mod frame;
pub mod stateful;

pub(crate) trait WCodec<Message, Buffer> {
    type Output;
    fn write(self, buffer: Buffer, message: Message) -> Self::Output;
}

pub(crate) trait RCodec<Message, Buffer> {
    type Error;
    fn read(self, buffer: Buffer) -> Result<Message, Self::Error>;
}

// Calculate the length of the value once serialized
pub(crate) trait LCodec<Message> {
    fn w_len(self, message: Message) -> usize;
}

#[derive(Clone, Copy, Default)]
pub(crate) struct SluiceCodec;

impl SluiceCodec {
    pub(crate) const fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use rand::{
        Rng,
        distr::{Alphanumeric, SampleString},
    };

    use super::*;
    use crate::buffers::{
        Slice,
        reader::{HasReader, Reader},
        writer::HasWriter,
    };

    const NUM_ITER: usize = 100;

    macro_rules! run {
        ($type:ty, $rand:expr) => {
            let codec = SluiceCodec::new();
            for _ in 0..NUM_ITER {
                let x: $type = $rand;

                let mut buffer = vec![];
                codec.write(&mut buffer.writer(), &x).unwrap();

                // Contiguous read
                let mut reader = buffer.as_slice().reader();
                let y: $type = codec.read(&mut reader).unwrap();
                assert_eq!(x, y);
                assert!(!reader.can_read());

                // Zero-copy read
                let mut slice = Slice::from(buffer);
                let mut reader = (&mut slice).reader();
                let y: $type = codec.read(&mut reader).unwrap();
                assert_eq!(x, y);
                assert!(!reader.can_read());
            }
        };
    }

    #[test]
    fn codec_vle() {
        let mut rng = rand::rng();

        run!(u64, u64::MIN);
        run!(u64, u64::MAX);
        run!(u64, rng.random::<u64>());
        run!(u32, rng.random::<u32>());
        run!(usize, rng.random_range(usize::MIN..=usize::MAX));
    }

    #[test]
    fn codec_vle_len() {
        let codec = SluiceCodec::new();

        for n in [0u64, 0x7f, 0x80, 16_000, u32::MAX as u64, u64::MAX] {
            let mut buff = vec![];
            codec.write(&mut buff.writer(), n).unwrap();
            assert_eq!(codec.w_len(n), buff.len(), "vle len: {n} {buff:02x?}");
        }
        assert_eq!(codec.w_len(u64::MAX), 9);
    }

    #[test]
    fn codec_vle_truncated() {
        let codec = SluiceCodec::new();
        let mut reader: &[u8] = &[0x80, 0x80];
        let res: Result<u64, _> = codec.read(&mut reader);
        assert!(res.is_err());
    }

    #[test]
    fn codec_string() {
        let mut rng = rand::rng();
        run!(String, {
            let len = rng.random_range(0..16);
            Alphanumeric.sample_string(&mut rng, len)
        });
    }

    #[test]
    fn codec_slice() {
        let mut rng = rand::rng();
        run!(Slice, {
            let len = rng.random_range(0..64);
            Slice::from((0..len).map(|_| rng.random::<u8>()).collect::<Vec<u8>>())
        });
    }
}
