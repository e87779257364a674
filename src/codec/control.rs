use super::{LCodec, RCodec, SluiceCodec, WCodec};
use crate::{
    buffers::{
        reader::Reader,
        writer::{DidntWrite, HasWriter, Writer},
    },
    codec::frame::FrameError,
    tuple::{ControlKind, id},
};

/// Decoded form of a window-id carrying control tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowIdHeader {
    pub(crate) kind: ControlKind,
    pub(crate) window_id: u64,
}

impl WindowIdHeader {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let codec = SluiceCodec::new();
        let mut buffer = Vec::with_capacity(codec.w_len(self));
        let res = codec.write(&mut buffer.writer(), self);
        debug_assert!(res.is_ok(), "Vec writers are unbounded");
        buffer
    }
}

/// Reads the rest of a control tuple once the message type byte is known.
#[derive(Clone, Copy)]
pub(crate) struct SluiceCodecHeader {
    pub(crate) header: u8,
}

impl LCodec<&WindowIdHeader> for SluiceCodec {
    fn w_len(self, x: &WindowIdHeader) -> usize {
        1 + self.w_len(x.window_id)
    }
}

impl<W> WCodec<&WindowIdHeader, &mut W> for SluiceCodec
where
    W: Writer,
{
    type Output = Result<(), DidntWrite>;

    fn write(self, writer: &mut W, x: &WindowIdHeader) -> Self::Output {
        let WindowIdHeader { kind, window_id } = x;

        self.write(&mut *writer, kind.message_type())?;
        self.write(&mut *writer, window_id)?;

        Ok(())
    }
}

impl<R> RCodec<WindowIdHeader, &mut R> for SluiceCodec
where
    R: Reader,
{
    type Error = FrameError;

    fn read(self, reader: &mut R) -> Result<WindowIdHeader, Self::Error> {
        let header: u8 = self.read(&mut *reader).map_err(|_| FrameError::Empty)?;
        let codec = SluiceCodecHeader { header };
        codec.read(&mut *reader)
    }
}

impl<R> RCodec<WindowIdHeader, &mut R> for SluiceCodecHeader
where
    R: Reader,
{
    type Error = FrameError;

    fn read(self, reader: &mut R) -> Result<WindowIdHeader, Self::Error> {
        let kind = match ControlKind::from_message_type(self.header) {
            Some(kind) => kind,
            None if matches!(self.header, id::PAYLOAD | id::CODEC_STATE) => {
                return Err(FrameError::NotControl(self.header));
            }
            None => return Err(FrameError::UnknownType(self.header)),
        };
        let window_id: u64 = SluiceCodec::new()
            .read(&mut *reader)
            .map_err(|_| FrameError::Malformed(self.header))?;

        Ok(WindowIdHeader { kind, window_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = WindowIdHeader {
            kind: ControlKind::EndStream,
            window_id: 300,
        };
        let bytes = header.encode();
        assert_eq!(bytes, [id::END_STREAM, 0xac, 0x02]);
        assert_eq!(SluiceCodec::new().w_len(&header), bytes.len());

        let mut reader = bytes.as_slice();
        let decoded: WindowIdHeader = SluiceCodec::new().read(&mut reader).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_widest_window_id() {
        for kind in ControlKind::ALL {
            let header = WindowIdHeader {
                kind,
                window_id: u64::MAX,
            };
            let bytes = header.encode();
            assert_eq!(bytes.len(), SluiceCodec::new().w_len(&header));
            assert_eq!(bytes[0], kind.message_type());

            let mut reader = bytes.as_slice();
            let decoded: WindowIdHeader = SluiceCodec::new().read(&mut reader).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn header_rejects_data_frames() {
        let mut reader: &[u8] = &[id::CODEC_STATE, 0];
        let res: Result<WindowIdHeader, _> = SluiceCodec::new().read(&mut reader);
        assert_eq!(res, Err(FrameError::NotControl(id::CODEC_STATE)));

        let mut reader: &[u8] = &[];
        let res: Result<WindowIdHeader, _> = SluiceCodec::new().read(&mut reader);
        assert_eq!(res, Err(FrameError::Empty));
    }
}
