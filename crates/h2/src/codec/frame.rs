//! Typed HTTP/2 frames.
//!
//! [`FrameDecoder`](super::FrameDecoder) only splits the byte stream into [`RawFrame`]s.
//! Giving a raw frame its meaning happens in [`Frame::decode`], whose failures are
//! protocol errors scoped to a stream or to the connection, never codec failures, so a
//! malformed PRIORITY does not tear down the transport.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ensure;
use crate::protocol::{ErrorCode, H2Error};

pub const FRAME_HEADER_LEN: usize = 9;
pub const STREAM_ID_MASK: u32 = 0x7fff_ffff;
/// The largest length the 24-bit length field can carry.
pub const MAX_FRAME_LEN: u32 = (1 << 24) - 1;

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl From<u8> for FrameKind {
    fn from(kind: u8) -> Self {
        match kind {
            0x0 => FrameKind::Data,
            0x1 => FrameKind::Headers,
            0x2 => FrameKind::Priority,
            0x3 => FrameKind::RstStream,
            0x4 => FrameKind::Settings,
            0x5 => FrameKind::PushPromise,
            0x6 => FrameKind::Ping,
            0x7 => FrameKind::GoAway,
            0x8 => FrameKind::WindowUpdate,
            0x9 => FrameKind::Continuation,
            other => FrameKind::Unknown(other),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Data => 0x0,
            FrameKind::Headers => 0x1,
            FrameKind::Priority => 0x2,
            FrameKind::RstStream => 0x3,
            FrameKind::Settings => 0x4,
            FrameKind::PushPromise => 0x5,
            FrameKind::Ping => 0x6,
            FrameKind::GoAway => 0x7,
            FrameKind::WindowUpdate => 0x8,
            FrameKind::Continuation => 0x9,
            FrameKind::Unknown(other) => other,
        }
    }
}

/// The fixed 9-octet frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: FrameKind,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    /// Parses the header from exactly [`FRAME_HEADER_LEN`] octets, masking the reserved bit.
    pub fn parse(src: &[u8; FRAME_HEADER_LEN]) -> Self {
        let length = u32::from_be_bytes([0, src[0], src[1], src[2]]);
        let stream_id = u32::from_be_bytes([src[5], src[6], src[7], src[8]]) & STREAM_ID_MASK;
        Self { length, kind: FrameKind::from(src[3]), flags: src[4], stream_id }
    }

    pub fn write(&self, dst: &mut BytesMut) {
        let length = self.length.to_be_bytes();
        dst.put_slice(&length[1..]);
        dst.put_u8(self.kind.into());
        dst.put_u8(self.flags);
        dst.put_u32(self.stream_id & STREAM_ID_MASK);
    }
}

/// A length-delimited frame whose payload has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// Stream dependency declared by HEADERS or PRIORITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityBlock {
    pub exclusive: bool,
    pub dependency: u32,
    /// wire value; the effective weight is `weight + 1`
    pub weight: u8,
}

impl PriorityBlock {
    const LEN: usize = 5;

    fn parse(src: &mut Bytes) -> Self {
        let word = src.get_u32();
        let weight = src.get_u8();
        Self { exclusive: word & !STREAM_ID_MASK != 0, dependency: word & STREAM_ID_MASK, weight }
    }

    fn write(&self, dst: &mut BytesMut) {
        let exclusive = if self.exclusive { !STREAM_ID_MASK } else { 0 };
        dst.put_u32((self.dependency & STREAM_ID_MASK) | exclusive);
        dst.put_u8(self.weight);
    }
}

impl Default for PriorityBlock {
    fn default() -> Self {
        Self { exclusive: false, dependency: 0, weight: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub end_stream: bool,
    pub pad_length: Option<u8>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub end_stream: bool,
    pub end_headers: bool,
    pub pad_length: Option<u8>,
    pub priority: Option<PriorityBlock>,
    pub fragment: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    pub ack: bool,
    pub params: Vec<(u16, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    pub end_headers: bool,
    pub pad_length: Option<u8>,
    pub promised_stream_id: u32,
    pub fragment: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    pub ack: bool,
    pub opaque: [u8; 8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub last_stream_id: u32,
    pub error_code: ErrorCode,
    pub debug_data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    pub end_headers: bool,
    pub fragment: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityBlock),
    RstStream(ErrorCode),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(u32),
    Continuation(ContinuationFrame),
    /// Extension frames are length-consumed and otherwise ignored.
    Unknown { kind: u8, flags: u8, payload: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream_id: u32,
    pub payload: FramePayload,
}

impl Frame {
    pub fn new(stream_id: u32, payload: FramePayload) -> Self {
        Self { stream_id: stream_id & STREAM_ID_MASK, payload }
    }

    pub fn settings(params: Vec<(u16, u32)>) -> Self {
        Self::new(0, FramePayload::Settings(SettingsFrame { ack: false, params }))
    }

    pub fn settings_ack() -> Self {
        Self::new(0, FramePayload::Settings(SettingsFrame { ack: true, params: Vec::new() }))
    }

    pub fn ping_ack(opaque: [u8; 8]) -> Self {
        Self::new(0, FramePayload::Ping(PingFrame { ack: true, opaque }))
    }

    pub fn rst_stream(stream_id: u32, code: ErrorCode) -> Self {
        Self::new(stream_id, FramePayload::RstStream(code))
    }

    pub fn window_update(stream_id: u32, increment: u32) -> Self {
        Self::new(stream_id, FramePayload::WindowUpdate(increment))
    }

    pub fn go_away(last_stream_id: u32, error_code: ErrorCode, debug_data: Bytes) -> Self {
        Self::new(0, FramePayload::GoAway(GoAwayFrame { last_stream_id, error_code, debug_data }))
    }

    pub fn kind(&self) -> FrameKind {
        match &self.payload {
            FramePayload::Data(_) => FrameKind::Data,
            FramePayload::Headers(_) => FrameKind::Headers,
            FramePayload::Priority(_) => FrameKind::Priority,
            FramePayload::RstStream(_) => FrameKind::RstStream,
            FramePayload::Settings(_) => FrameKind::Settings,
            FramePayload::PushPromise(_) => FrameKind::PushPromise,
            FramePayload::Ping(_) => FrameKind::Ping,
            FramePayload::GoAway(_) => FrameKind::GoAway,
            FramePayload::WindowUpdate(_) => FrameKind::WindowUpdate,
            FramePayload::Continuation(_) => FrameKind::Continuation,
            FramePayload::Unknown { kind, .. } => FrameKind::Unknown(*kind),
        }
    }

    pub fn flags(&self) -> u8 {
        fn set(condition: bool, flag: u8) -> u8 {
            if condition { flag } else { 0 }
        }

        match &self.payload {
            FramePayload::Data(f) => set(f.end_stream, flags::END_STREAM) | set(f.pad_length.is_some(), flags::PADDED),
            FramePayload::Headers(f) => {
                set(f.end_stream, flags::END_STREAM)
                    | set(f.end_headers, flags::END_HEADERS)
                    | set(f.pad_length.is_some(), flags::PADDED)
                    | set(f.priority.is_some(), flags::PRIORITY)
            }
            FramePayload::Settings(f) => set(f.ack, flags::ACK),
            FramePayload::PushPromise(f) => set(f.end_headers, flags::END_HEADERS) | set(f.pad_length.is_some(), flags::PADDED),
            FramePayload::Ping(f) => set(f.ack, flags::ACK),
            FramePayload::Continuation(f) => set(f.end_headers, flags::END_HEADERS),
            FramePayload::Unknown { flags, .. } => *flags,
            FramePayload::Priority(_) | FramePayload::RstStream(_) | FramePayload::GoAway(_) | FramePayload::WindowUpdate(_) => 0,
        }
    }

    /// The value of the length field once encoded.
    pub fn payload_len(&self) -> usize {
        fn padded(pad_length: Option<u8>, inner: usize) -> usize {
            pad_length.map_or(inner, |pad| inner + 1 + pad as usize)
        }

        match &self.payload {
            FramePayload::Data(f) => padded(f.pad_length, f.data.len()),
            FramePayload::Headers(f) => {
                let priority = if f.priority.is_some() { PriorityBlock::LEN } else { 0 };
                padded(f.pad_length, priority + f.fragment.len())
            }
            FramePayload::Priority(_) => PriorityBlock::LEN,
            FramePayload::RstStream(_) | FramePayload::WindowUpdate(_) => 4,
            FramePayload::Settings(f) => f.params.len() * 6,
            FramePayload::PushPromise(f) => padded(f.pad_length, 4 + f.fragment.len()),
            FramePayload::Ping(_) => 8,
            FramePayload::GoAway(f) => 8 + f.debug_data.len(),
            FramePayload::Continuation(f) => f.fragment.len(),
            FramePayload::Unknown { payload, .. } => payload.len(),
        }
    }

    /// Interprets a raw frame, validating every length and stream-id precondition.
    pub fn decode(raw: RawFrame) -> Result<Frame, H2Error> {
        let RawFrame { header, mut payload } = raw;
        let stream_id = header.stream_id;
        let len = payload.len();

        let connection_error = |code, reason: &str| H2Error::connection(code, format!("{:?}: {reason}", header.kind));

        let frame_payload = match header.kind {
            FrameKind::Data => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                let pad_length = strip_padding(&mut payload, header)?;
                FramePayload::Data(DataFrame { end_stream: header.flags & flags::END_STREAM != 0, pad_length, data: payload })
            }

            FrameKind::Headers => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                let pad_length = strip_padding(&mut payload, header)?;
                let priority = if header.flags & flags::PRIORITY != 0 {
                    ensure!(
                        payload.len() >= PriorityBlock::LEN,
                        connection_error(ErrorCode::FrameSizeError, "priority block truncated")
                    );
                    Some(PriorityBlock::parse(&mut payload))
                } else {
                    None
                };
                FramePayload::Headers(HeadersFrame {
                    end_stream: header.flags & flags::END_STREAM != 0,
                    end_headers: header.flags & flags::END_HEADERS != 0,
                    pad_length,
                    priority,
                    fragment: payload,
                })
            }

            FrameKind::Priority => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                ensure!(
                    len == PriorityBlock::LEN,
                    H2Error::stream(stream_id, ErrorCode::FrameSizeError, "PRIORITY length must be 5")
                );
                let priority = PriorityBlock::parse(&mut payload);
                ensure!(
                    priority.dependency != stream_id,
                    H2Error::stream(stream_id, ErrorCode::ProtocolError, "stream depends on itself")
                );
                FramePayload::Priority(priority)
            }

            FrameKind::RstStream => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                ensure!(len == 4, connection_error(ErrorCode::FrameSizeError, "length must be 4"));
                FramePayload::RstStream(ErrorCode::from(payload.get_u32()))
            }

            FrameKind::Settings => {
                ensure!(stream_id == 0, connection_error(ErrorCode::ProtocolError, "stream id must be 0"));
                let ack = header.flags & flags::ACK != 0;
                if ack {
                    ensure!(len == 0, connection_error(ErrorCode::FrameSizeError, "ACK must be empty"));
                }
                ensure!(len % 6 == 0, connection_error(ErrorCode::FrameSizeError, "length must be a multiple of 6"));
                let params = (0..len / 6).map(|_| (payload.get_u16(), payload.get_u32())).collect();
                FramePayload::Settings(SettingsFrame { ack, params })
            }

            FrameKind::PushPromise => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                let pad_length = strip_padding(&mut payload, header)?;
                ensure!(payload.len() >= 4, connection_error(ErrorCode::FrameSizeError, "promised stream id truncated"));
                let promised_stream_id = payload.get_u32() & STREAM_ID_MASK;
                FramePayload::PushPromise(PushPromiseFrame {
                    end_headers: header.flags & flags::END_HEADERS != 0,
                    pad_length,
                    promised_stream_id,
                    fragment: payload,
                })
            }

            FrameKind::Ping => {
                ensure!(stream_id == 0, connection_error(ErrorCode::ProtocolError, "stream id must be 0"));
                ensure!(len == 8, connection_error(ErrorCode::FrameSizeError, "length must be 8"));
                let mut opaque = [0u8; 8];
                payload.copy_to_slice(&mut opaque);
                FramePayload::Ping(PingFrame { ack: header.flags & flags::ACK != 0, opaque })
            }

            FrameKind::GoAway => {
                ensure!(stream_id == 0, connection_error(ErrorCode::ProtocolError, "stream id must be 0"));
                ensure!(len >= 8, connection_error(ErrorCode::FrameSizeError, "length must be at least 8"));
                let last_stream_id = payload.get_u32() & STREAM_ID_MASK;
                let error_code = ErrorCode::from(payload.get_u32());
                FramePayload::GoAway(GoAwayFrame { last_stream_id, error_code, debug_data: payload })
            }

            FrameKind::WindowUpdate => {
                ensure!(len == 4, connection_error(ErrorCode::FrameSizeError, "length must be 4"));
                let increment = payload.get_u32() & STREAM_ID_MASK;
                if increment == 0 {
                    return Err(if stream_id == 0 {
                        connection_error(ErrorCode::ProtocolError, "increment must not be 0")
                    } else {
                        H2Error::stream(stream_id, ErrorCode::ProtocolError, "WINDOW_UPDATE increment must not be 0")
                    });
                }
                FramePayload::WindowUpdate(increment)
            }

            FrameKind::Continuation => {
                ensure!(stream_id != 0, connection_error(ErrorCode::ProtocolError, "stream id must not be 0"));
                FramePayload::Continuation(ContinuationFrame {
                    end_headers: header.flags & flags::END_HEADERS != 0,
                    fragment: payload,
                })
            }

            FrameKind::Unknown(kind) => FramePayload::Unknown { kind, flags: header.flags, payload },
        };

        Ok(Frame { stream_id, payload: frame_payload })
    }

    /// Appends the wire form of this frame, header included.
    pub fn encode(&self, dst: &mut BytesMut) {
        let length = self.payload_len();
        dst.reserve(FRAME_HEADER_LEN + length);

        let header = FrameHeader { length: length as u32, kind: self.kind(), flags: self.flags(), stream_id: self.stream_id };
        header.write(dst);

        match &self.payload {
            FramePayload::Data(f) => write_padded(dst, f.pad_length, |dst| dst.put_slice(&f.data)),
            FramePayload::Headers(f) => write_padded(dst, f.pad_length, |dst| {
                if let Some(priority) = &f.priority {
                    priority.write(dst);
                }
                dst.put_slice(&f.fragment);
            }),
            FramePayload::Priority(priority) => priority.write(dst),
            FramePayload::RstStream(code) => dst.put_u32((*code).into()),
            FramePayload::Settings(f) => {
                for (id, value) in &f.params {
                    dst.put_u16(*id);
                    dst.put_u32(*value);
                }
            }
            FramePayload::PushPromise(f) => write_padded(dst, f.pad_length, |dst| {
                dst.put_u32(f.promised_stream_id & STREAM_ID_MASK);
                dst.put_slice(&f.fragment);
            }),
            FramePayload::Ping(f) => dst.put_slice(&f.opaque),
            FramePayload::GoAway(f) => {
                dst.put_u32(f.last_stream_id & STREAM_ID_MASK);
                dst.put_u32(f.error_code.into());
                dst.put_slice(&f.debug_data);
            }
            FramePayload::WindowUpdate(increment) => dst.put_u32(increment & STREAM_ID_MASK),
            FramePayload::Continuation(f) => dst.put_slice(&f.fragment),
            FramePayload::Unknown { payload, .. } => dst.put_slice(payload),
        }
    }
}

/// Removes the pad-length octet and the trailing padding when PADDED is set.
fn strip_padding(payload: &mut Bytes, header: FrameHeader) -> Result<Option<u8>, H2Error> {
    if header.flags & flags::PADDED == 0 {
        return Ok(None);
    }

    ensure!(
        !payload.is_empty(),
        H2Error::connection(ErrorCode::FrameSizeError, format!("{:?}: missing pad length", header.kind))
    );
    let pad_length = payload.get_u8();
    ensure!(
        (pad_length as usize) <= payload.len(),
        H2Error::connection(ErrorCode::ProtocolError, format!("{:?}: padding exceeds payload", header.kind))
    );
    payload.truncate(payload.len() - pad_length as usize);
    Ok(Some(pad_length))
}

fn write_padded(dst: &mut BytesMut, pad_length: Option<u8>, body: impl FnOnce(&mut BytesMut)) {
    if let Some(pad) = pad_length {
        dst.put_u8(pad);
    }
    body(dst);
    if let Some(pad) = pad_length {
        dst.put_bytes(0, pad as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: Frame) -> Frame {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        assert_eq!(buf.len(), FRAME_HEADER_LEN + frame.payload_len());

        let header = FrameHeader::parse(&buf[..FRAME_HEADER_LEN].try_into().unwrap());
        assert_eq!(header.length as usize, frame.payload_len());
        let payload = buf.split_off(FRAME_HEADER_LEN).freeze();
        Frame::decode(RawFrame { header, payload }).unwrap()
    }

    fn raw(kind: FrameKind, flags: u8, stream_id: u32, payload: &[u8]) -> RawFrame {
        RawFrame {
            header: FrameHeader { length: payload.len() as u32, kind, flags, stream_id },
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        FrameHeader { length: 0x010203, kind: FrameKind::Headers, flags: 0x25, stream_id: 0xffff_ffff }.write(&mut buf);
        // reserved bit is never written
        assert_eq!(&buf[..], &[0x01, 0x02, 0x03, 0x01, 0x25, 0x7f, 0xff, 0xff, 0xff]);

        let parsed = FrameHeader::parse(&[0, 0, 8, 6, 1, 0x80, 0, 0, 0]);
        // and is masked on read
        assert_eq!(parsed, FrameHeader { length: 8, kind: FrameKind::Ping, flags: 1, stream_id: 0 });
    }

    #[test]
    fn every_kind_survives_a_round_trip() {
        let frames = vec![
            Frame::new(1, FramePayload::Data(DataFrame { end_stream: true, pad_length: Some(3), data: Bytes::from_static(b"hello") })),
            Frame::new(
                3,
                FramePayload::Headers(HeadersFrame {
                    end_stream: false,
                    end_headers: true,
                    pad_length: Some(0),
                    priority: Some(PriorityBlock { exclusive: true, dependency: 1, weight: 200 }),
                    fragment: Bytes::from_static(&[0x82, 0x84]),
                }),
            ),
            Frame::new(5, FramePayload::Priority(PriorityBlock { exclusive: false, dependency: 3, weight: 15 })),
            Frame::rst_stream(7, ErrorCode::Cancel),
            Frame::settings(vec![(1, 4096), (3, 100), (0xff, 7)]),
            Frame::settings_ack(),
            Frame::new(
                1,
                FramePayload::PushPromise(PushPromiseFrame {
                    end_headers: true,
                    pad_length: None,
                    promised_stream_id: 2,
                    fragment: Bytes::from_static(&[0x82]),
                }),
            ),
            Frame::ping_ack(*b"12345678"),
            Frame::go_away(9, ErrorCode::EnhanceYourCalm, Bytes::from_static(b"slow down")),
            Frame::window_update(0, 0x7fff_ffff),
            Frame::new(3, FramePayload::Continuation(ContinuationFrame { end_headers: false, fragment: Bytes::from_static(b"abc") })),
            Frame::new(0, FramePayload::Unknown { kind: 0xfa, flags: 0x3, payload: Bytes::from_static(b"ext") }),
        ];

        for frame in frames {
            assert_eq!(round_trip(frame.clone()), frame);
        }
    }

    #[test]
    fn settings_length_must_be_multiple_of_six() {
        let err = Frame::decode(raw(FrameKind::Settings, 0, 0, &[0, 1, 0, 0, 0x10, 0, 0])).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::FrameSizeError);

        let err = Frame::decode(raw(FrameKind::Settings, flags::ACK, 0, &[0; 6])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FrameSizeError);

        let err = Frame::decode(raw(FrameKind::Settings, 0, 1, &[])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn fixed_length_frames() {
        let err = Frame::decode(raw(FrameKind::Priority, 0, 3, &[0; 4])).unwrap_err();
        assert_eq!(err, H2Error::stream(3, ErrorCode::FrameSizeError, "PRIORITY length must be 5"));

        let err = Frame::decode(raw(FrameKind::RstStream, 0, 3, &[0; 5])).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::FrameSizeError);

        let err = Frame::decode(raw(FrameKind::Ping, 0, 0, &[0; 7])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FrameSizeError);

        let err = Frame::decode(raw(FrameKind::WindowUpdate, 0, 0, &[0; 3])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FrameSizeError);

        let err = Frame::decode(raw(FrameKind::GoAway, 0, 0, &[0; 7])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FrameSizeError);
    }

    #[test]
    fn zero_window_increment() {
        let err = Frame::decode(raw(FrameKind::WindowUpdate, 0, 0, &[0; 4])).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::ProtocolError);

        let err = Frame::decode(raw(FrameKind::WindowUpdate, 0, 5, &[0; 4])).unwrap_err();
        assert!(!err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn padding_is_validated() {
        // pad length 5 but only 2 octets follow
        let err = Frame::decode(raw(FrameKind::Data, flags::PADDED, 1, &[5, b'a', b'b'])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);

        let frame = Frame::decode(raw(FrameKind::Data, flags::PADDED, 1, &[2, b'a', 0, 0])).unwrap();
        assert_eq!(
            frame.payload,
            FramePayload::Data(DataFrame { end_stream: false, pad_length: Some(2), data: Bytes::from_static(b"a") })
        );
    }

    #[test]
    fn stream_zero_rules() {
        for kind in [FrameKind::Data, FrameKind::Headers, FrameKind::RstStream, FrameKind::Continuation] {
            let err = Frame::decode(raw(kind, 0, 0, &[0; 4])).unwrap_err();
            assert!(err.is_connection_error(), "{kind:?}");
            assert_eq!(err.code(), ErrorCode::ProtocolError);
        }
        let err = Frame::decode(raw(FrameKind::Ping, 0, 1, &[0; 8])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn unknown_frames_are_kept_opaque() {
        let frame = Frame::decode(raw(FrameKind::Unknown(0x20), 0xff, 9, b"whatever")).unwrap();
        assert_eq!(frame.kind(), FrameKind::Unknown(0x20));
        assert_eq!(frame.stream_id, 9);
    }
}
