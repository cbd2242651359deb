use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::FrameError;

/// The fixed octets every client sends before its first frame.
pub const CONNECTION_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Consumes the client connection preface and nothing else.
///
/// Mismatches are reported as soon as the received prefix diverges, without
/// waiting for all 24 octets.
#[derive(Debug, Default)]
pub struct PrefaceDecoder;

impl Decoder for PrefaceDecoder {
    type Item = ();
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let available = src.len().min(CONNECTION_PREFACE.len());
        if src[..available] != CONNECTION_PREFACE[..available] {
            return Err(FrameError::InvalidPreface);
        }
        if available < CONNECTION_PREFACE.len() {
            return Ok(None);
        }

        src.advance(CONNECTION_PREFACE.len());
        Ok(Some(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_preface_and_keeps_the_rest() {
        let mut buf = BytesMut::from(&b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n\0\0\0\x04"[..]);
        assert_eq!(PrefaceDecoder.decode(&mut buf).unwrap(), Some(()));
        assert_eq!(&buf[..], b"\0\0\0\x04");
    }

    #[test]
    fn waits_for_more_octets() {
        let mut buf = BytesMut::from(&b"PRI * HTTP/2"[..]);
        assert_eq!(PrefaceDecoder.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn rejects_http1_requests_early() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert!(matches!(PrefaceDecoder.decode(&mut buf), Err(FrameError::InvalidPreface)));
    }
}
