use std::fmt;
use std::io;

use thiserror::Error;

use crate::codec::FrameError;
use crate::hpack::HpackError;

/// Error codes carried by RST_STREAM and GOAWAY frames.
///
/// Unregistered values are kept as [`ErrorCode::Unknown`] so that they survive a
/// decode/encode round trip; a peer sending them must not be treated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NoError => 0x0,
            ErrorCode::ProtocolError => 0x1,
            ErrorCode::InternalError => 0x2,
            ErrorCode::FlowControlError => 0x3,
            ErrorCode::SettingsTimeout => 0x4,
            ErrorCode::StreamClosed => 0x5,
            ErrorCode::FrameSizeError => 0x6,
            ErrorCode::RefusedStream => 0x7,
            ErrorCode::Cancel => 0x8,
            ErrorCode::CompressionError => 0x9,
            ErrorCode::ConnectError => 0xa,
            ErrorCode::EnhanceYourCalm => 0xb,
            ErrorCode::InadequateSecurity => 0xc,
            ErrorCode::Http11Required => 0xd,
            ErrorCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
            ErrorCode::Unknown(code) => return write!(f, "UNKNOWN({code:#x})"),
        };
        f.write_str(name)
    }
}

/// A protocol violation, already classified by its blast radius.
///
/// Frame parsing and the stream state machine only build these; the connection's
/// read loop decides what to put on the wire (RST_STREAM or GOAWAY).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum H2Error {
    #[error("connection error {code}: {reason}")]
    Connection { code: ErrorCode, reason: String },

    #[error("stream {stream_id} error {code}: {reason}")]
    Stream { stream_id: u32, code: ErrorCode, reason: String },
}

impl H2Error {
    pub fn connection<S: ToString>(code: ErrorCode, reason: S) -> Self {
        Self::Connection { code, reason: reason.to_string() }
    }

    pub fn stream<S: ToString>(stream_id: u32, code: ErrorCode, reason: S) -> Self {
        Self::Stream { stream_id, code, reason: reason.to_string() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            H2Error::Connection { code, .. } | H2Error::Stream { code, .. } => *code,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, H2Error::Connection { .. })
    }
}

/// HPACK failures desynchronise both dynamic tables, so they always end the connection.
impl From<HpackError> for H2Error {
    fn from(e: HpackError) -> Self {
        H2Error::connection(ErrorCode::CompressionError, e)
    }
}

/// The error a connection finishes with.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: io::Error,
    },

    #[error("handshake error: {reason}")]
    Handshake { reason: String },

    #[error("handshake did not finish within {millis}ms")]
    Timeout { millis: u128 },

    #[error("connection error {code}: {reason}")]
    Connection { code: ErrorCode, reason: String },

    #[error("peer sent GOAWAY with {code}, last stream {last_stream_id}")]
    GoAway { code: ErrorCode, last_stream_id: u32 },
}

impl HttpError {
    pub fn handshake<S: ToString>(reason: S) -> Self {
        Self::Handshake { reason: reason.to_string() }
    }
}

impl From<FrameError> for HttpError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io { source } => HttpError::Transport { source },
            FrameError::InvalidPreface => HttpError::handshake("invalid connection preface"),
            e @ FrameError::TooLarge { .. } => HttpError::Connection { code: ErrorCode::FrameSizeError, reason: e.to_string() },
        }
    }
}

impl From<H2Error> for HttpError {
    fn from(e: H2Error) -> Self {
        match e {
            H2Error::Connection { code, reason } => HttpError::Connection { code, reason },
            H2Error::Stream { stream_id, code, reason } => {
                HttpError::Connection { code, reason: format!("stream {stream_id}: {reason}") }
            }
        }
    }
}
