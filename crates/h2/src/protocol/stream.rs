//! Per-stream state (RFC 9113 §5.1).

use bytes::{Bytes, BytesMut};

use crate::codec::PriorityBlock;
use crate::hpack::HeaderField;

use super::settings::MAX_WINDOW_SIZE;
use super::{ErrorCode, H2Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// One exchange multiplexed on the connection.
///
/// Inbound transitions are driven by the read loop, outbound ones by the writer.
/// Both reach the stream through the connection's stream table lock.
#[derive(Debug)]
pub struct Stream {
    id: u32,
    state: StreamState,
    priority: PriorityBlock,
    fields: Vec<HeaderField>,
    body: BytesMut,
    send_window: i64,
}

impl Stream {
    /// A stream the peer is about to open.
    pub fn idle(id: u32, send_window: u32) -> Self {
        Self::with_state(id, StreamState::Idle, send_window)
    }

    /// A stream promised by us to the peer.
    pub fn reserved_local(id: u32, send_window: u32) -> Self {
        Self::with_state(id, StreamState::ReservedLocal, send_window)
    }

    fn with_state(id: u32, state: StreamState, send_window: u32) -> Self {
        Self {
            id,
            state,
            priority: PriorityBlock::default(),
            fields: Vec::new(),
            body: BytesMut::new(),
            send_window: i64::from(send_window),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn priority(&self) -> PriorityBlock {
        self.priority
    }

    pub fn set_priority(&mut self, priority: PriorityBlock) {
        self.priority = priority;
    }

    pub fn send_window(&self) -> i64 {
        self.send_window
    }

    /// Counts toward MAX_CONCURRENT_STREAMS.
    pub fn is_active(&self) -> bool {
        matches!(self.state, StreamState::Open | StreamState::HalfClosedLocal | StreamState::HalfClosedRemote)
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// A complete header block arrived for this stream.
    ///
    /// On an idle stream these are the request headers; on an open one they are trailers,
    /// which must end the stream. Trailers are not kept.
    pub fn recv_headers(&mut self, fields: Vec<HeaderField>, end_stream: bool) -> Result<(), H2Error> {
        self.state = match (self.state, end_stream) {
            (StreamState::Idle, false) => StreamState::Open,
            (StreamState::Idle, true) => StreamState::HalfClosedRemote,
            (StreamState::Open, true) => StreamState::HalfClosedRemote,
            (StreamState::HalfClosedLocal, true) => StreamState::Closed,
            (StreamState::Open | StreamState::HalfClosedLocal, false) => {
                return Err(self.error(ErrorCode::ProtocolError, "trailers without END_STREAM"));
            }
            (StreamState::HalfClosedRemote | StreamState::Closed, _) => {
                return Err(self.error(ErrorCode::StreamClosed, "HEADERS after END_STREAM"));
            }
            (StreamState::ReservedLocal | StreamState::ReservedRemote, _) => {
                return Err(self.error(ErrorCode::ProtocolError, "HEADERS on a reserved stream"));
            }
        };

        if self.fields.is_empty() {
            self.fields = fields;
        }
        Ok(())
    }

    pub fn recv_data(&mut self, data: &[u8], end_stream: bool) -> Result<(), H2Error> {
        match self.state {
            StreamState::Open | StreamState::HalfClosedLocal => {}
            _ => return Err(self.error(ErrorCode::StreamClosed, format!("DATA in state {:?}", self.state))),
        }

        self.body.extend_from_slice(data);
        if end_stream {
            self.state = match self.state {
                StreamState::HalfClosedLocal => StreamState::Closed,
                _ => StreamState::HalfClosedRemote,
            };
        }
        Ok(())
    }

    pub fn recv_reset(&mut self) {
        self.state = StreamState::Closed;
    }

    /// We are about to send a HEADERS frame on this stream.
    pub fn send_headers(&mut self, end_stream: bool) {
        if self.state == StreamState::ReservedLocal {
            self.state = StreamState::HalfClosedRemote;
        }
        if end_stream {
            self.send_end_stream();
        }
    }

    /// We sent a frame carrying END_STREAM.
    pub fn send_end_stream(&mut self) {
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote | StreamState::HalfClosedLocal | StreamState::Closed => StreamState::Closed,
            other => other,
        };
    }

    /// Takes the request the peer finished sending.
    pub fn take_request(&mut self) -> (Vec<HeaderField>, Bytes) {
        (std::mem::take(&mut self.fields), self.body.split().freeze())
    }

    pub fn credit_send_window(&mut self, increment: u32) -> Result<(), H2Error> {
        let next = self.send_window + i64::from(increment);
        if next > i64::from(MAX_WINDOW_SIZE) {
            return Err(self.error(ErrorCode::FlowControlError, "send window overflow"));
        }
        self.send_window = next;
        Ok(())
    }

    /// Applies a change of the peer's INITIAL_WINDOW_SIZE; the window may go negative.
    pub fn adjust_send_window(&mut self, delta: i64) -> Result<(), H2Error> {
        let next = self.send_window + delta;
        if next > i64::from(MAX_WINDOW_SIZE) {
            return Err(H2Error::connection(ErrorCode::FlowControlError, format!("stream {} window overflow", self.id)));
        }
        self.send_window = next;
        Ok(())
    }

    pub fn consume_send_window(&mut self, len: usize) {
        self.send_window -= len as i64;
    }

    fn error<S: ToString>(&self, code: ErrorCode, reason: S) -> H2Error {
        H2Error::stream(self.id, code, reason)
    }
}
