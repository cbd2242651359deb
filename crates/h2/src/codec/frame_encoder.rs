use bytes::BytesMut;
use tokio_util::codec::Encoder;

use super::FrameError;
use super::frame::Frame;

/// Serializes typed frames; splitting to the peer's maximum frame size is the writer's job.
#[derive(Debug, Default)]
pub struct FrameEncoder;

impl FrameEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Frame> for FrameEncoder {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.encode(dst);
        Ok(())
    }
}
