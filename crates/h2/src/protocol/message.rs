use bytes::Bytes;

use crate::codec::PriorityBlock;
use crate::hpack::HeaderField;

/// A stream the peer finished sending, on its way from the read loop to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStream {
    pub id: u32,
    pub fields: Vec<HeaderField>,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    /// HEADERS (+ CONTINUATION) and DATA answering stream `id`
    Response,
    /// PUSH_PROMISE on stream `id` reserving `promised_id`
    Promise { promised_id: u32 },
}

/// Everything the writer needs to put one header block, and possibly a body, on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundStream {
    pub id: u32,
    pub kind: OutboundKind,
    pub fields: Vec<HeaderField>,
    pub body: Bytes,
    pub priority: Option<PriorityBlock>,
}

impl OutboundStream {
    pub fn response(id: u32, fields: Vec<HeaderField>, body: Bytes) -> Self {
        Self { id, kind: OutboundKind::Response, fields, body, priority: None }
    }

    pub fn promise(id: u32, promised_id: u32, fields: Vec<HeaderField>) -> Self {
        Self { id, kind: OutboundKind::Promise { promised_id }, fields, body: Bytes::new(), priority: None }
    }
}
