//! The read loop: the only place inbound frames change connection or stream state.

use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::stream_table::StreamTable;
use crate::codec::{
    ContinuationFrame, DataFrame, Frame, FrameDecoder, FrameError, FramePayload, GoAwayFrame, HeadersFrame,
    PriorityBlock, PushPromiseFrame,
};
use crate::ensure;
use crate::hpack::{HeaderField, HpackDecoder};
use crate::protocol::{ErrorCode, H2Error, HttpError, RequestStream, Settings, Stream, StreamState};

/// Upper bound for one header block across all of its CONTINUATION frames.
const MAX_HEADER_BLOCK_LEN: usize = 1 << 20;

/// A header block still waiting for END_HEADERS. At most one exists per connection.
#[derive(Debug)]
struct HeaderBlock {
    stream_id: u32,
    end_stream: bool,
    target: BlockTarget,
    fragment: BytesMut,
}

/// What happens once the block is complete. The block is decoded in every case,
/// otherwise our dynamic table would drift from the peer's.
#[derive(Debug)]
enum BlockTarget {
    Accept,
    Reject(H2Error),
    Discard,
}

enum Flow {
    Continue,
    GoAway(GoAwayFrame),
}

pub(crate) struct Reader<R> {
    framed_read: FramedRead<R, FrameDecoder>,
    decoder: HpackDecoder,
    local_settings: Settings,
    peer_settings: Arc<ArcSwap<Settings>>,
    table: Arc<StreamTable>,
    control_tx: mpsc::Sender<Frame>,
    request_tx: mpsc::Sender<RequestStream>,
    cancel: CancellationToken,
    last_peer_stream_id: u32,
    open_block: Option<HeaderBlock>,
}

impl<R> Reader<R>
where
    R: AsyncRead + Unpin,
{
    #[allow(clippy::too_many_arguments, reason = "wires the read loop to every shared part of the connection")]
    pub(crate) fn new(
        framed_read: FramedRead<R, FrameDecoder>,
        decoder: HpackDecoder,
        local_settings: Settings,
        peer_settings: Arc<ArcSwap<Settings>>,
        table: Arc<StreamTable>,
        control_tx: mpsc::Sender<Frame>,
        request_tx: mpsc::Sender<RequestStream>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            framed_read,
            decoder,
            local_settings,
            peer_settings,
            table,
            control_tx,
            request_tx,
            cancel,
            last_peer_stream_id: 0,
            open_block: None,
        }
    }

    pub(crate) async fn run(mut self) -> Result<(), HttpError> {
        loop {
            let next = select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                next = self.framed_read.next() => next,
            };

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(e @ FrameError::TooLarge { .. })) => {
                    error!(cause = %e, "frame too large");
                    self.go_away(ErrorCode::FrameSizeError, &e.to_string()).await;
                    return Err(e.into());
                }
                Some(Err(e)) => {
                    error!(cause = %e, "can't read next frame");
                    return Err(e.into());
                }
                None => {
                    info!("peer closed the connection");
                    return Ok(());
                }
            };

            let result = match Frame::decode(raw) {
                Ok(frame) => self.handle_frame(frame).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::GoAway(go_away)) if go_away.error_code == ErrorCode::NoError => {
                    info!(last_stream_id = go_away.last_stream_id, "peer sent GOAWAY, shutting down gracefully");
                    return Ok(());
                }
                Ok(Flow::GoAway(go_away)) => {
                    error!(
                        code = %go_away.error_code,
                        last_stream_id = go_away.last_stream_id,
                        debug_data = %String::from_utf8_lossy(&go_away.debug_data),
                        "peer sent GOAWAY"
                    );
                    return Err(HttpError::GoAway { code: go_away.error_code, last_stream_id: go_away.last_stream_id });
                }
                Err(H2Error::Stream { stream_id, code, reason }) => {
                    warn!(stream_id, %code, reason, "resetting stream");
                    self.table.lock().await.remove(stream_id);
                    self.send_control(Frame::rst_stream(stream_id, code)).await?;
                }
                Err(e @ H2Error::Connection { .. }) => {
                    error!(cause = %e, "connection error");
                    self.go_away(e.code(), &e.to_string()).await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<Flow, H2Error> {
        let stream_id = frame.stream_id;

        if let Some(block) = &self.open_block {
            let continues = matches!(frame.payload, FramePayload::Continuation(_)) && stream_id == block.stream_id;
            ensure!(
                continues,
                H2Error::connection(
                    ErrorCode::ProtocolError,
                    format!("expected CONTINUATION for stream {}, got {:?} on stream {stream_id}", block.stream_id, frame.kind())
                )
            );
        }

        trace!(kind = ?frame.kind(), stream_id, "received frame");
        match frame.payload {
            FramePayload::Data(data) => self.on_data(stream_id, data).await?,
            FramePayload::Headers(headers) => self.on_headers(stream_id, headers).await?,
            FramePayload::Priority(priority) => self.on_priority(stream_id, priority).await,
            FramePayload::RstStream(code) => {
                debug!(stream_id, %code, "peer reset stream");
                self.table.lock().await.remove(stream_id);
            }
            FramePayload::Settings(settings) if settings.ack => trace!("peer acknowledged our SETTINGS"),
            FramePayload::Settings(settings) => self.on_settings(&settings.params).await?,
            FramePayload::PushPromise(promise) => self.on_push_promise(stream_id, promise).await?,
            FramePayload::Ping(ping) if ping.ack => trace!("PING ACK"),
            FramePayload::Ping(ping) => self.send_control(Frame::ping_ack(ping.opaque)).await?,
            FramePayload::GoAway(go_away) => return Ok(Flow::GoAway(go_away)),
            FramePayload::WindowUpdate(increment) => self.on_window_update(stream_id, increment).await?,
            FramePayload::Continuation(continuation) => self.on_continuation(stream_id, continuation).await?,
            FramePayload::Unknown { kind, .. } => trace!(kind, "ignoring unknown frame type"),
        }

        Ok(Flow::Continue)
    }

    async fn on_headers(&mut self, stream_id: u32, headers: HeadersFrame) -> Result<(), H2Error> {
        let HeadersFrame { end_stream, end_headers, priority, fragment, .. } = headers;
        let target = self.headers_target(stream_id, priority).await?;

        self.open_block = Some(HeaderBlock { stream_id, end_stream, target, fragment: BytesMut::from(&fragment[..]) });
        if end_headers { self.finish_block().await } else { Ok(()) }
    }

    /// Decides, before the block is complete, whether this HEADERS opens a stream,
    /// carries trailers, or must be refused.
    async fn headers_target(&mut self, stream_id: u32, priority: Option<PriorityBlock>) -> Result<BlockTarget, H2Error> {
        if priority.is_some_and(|p| p.dependency == stream_id) {
            return Ok(BlockTarget::Reject(H2Error::stream(stream_id, ErrorCode::ProtocolError, "stream depends on itself")));
        }

        let mut streams = self.table.lock().await;
        let known_state = streams.get(stream_id).map(Stream::state);
        if known_state.is_some_and(|state| state != StreamState::Idle) {
            // trailers, or a transition error reported once the block is decoded
            return Ok(BlockTarget::Accept);
        }

        ensure!(
            stream_id % 2 == 1,
            H2Error::connection(ErrorCode::ProtocolError, format!("client opened even stream {stream_id}"))
        );
        if stream_id <= self.last_peer_stream_id {
            // an idle stream below the newest opened one is implicitly closed
            streams.remove(stream_id);
            return Ok(BlockTarget::Reject(H2Error::stream(stream_id, ErrorCode::StreamClosed, "HEADERS on a closed stream")));
        }
        self.last_peer_stream_id = stream_id;

        let max = self.local_settings.max_concurrent_streams.map_or(usize::MAX, |max| max as usize);
        if streams.active_count() >= max {
            streams.remove(stream_id);
            return Ok(BlockTarget::Reject(H2Error::stream(
                stream_id,
                ErrorCode::RefusedStream,
                format!("MAX_CONCURRENT_STREAMS {max} reached"),
            )));
        }

        let peer_window = self.peer_settings.load().initial_window_size;
        let mut stream = streams.remove(stream_id).unwrap_or_else(|| Stream::idle(stream_id, peer_window));
        if let Some(priority) = priority {
            stream.set_priority(priority);
        }
        streams.insert(stream);
        Ok(BlockTarget::Accept)
    }

    async fn on_push_promise(&mut self, stream_id: u32, promise: PushPromiseFrame) -> Result<(), H2Error> {
        debug!(stream_id, promised_stream_id = promise.promised_stream_id, "ignoring PUSH_PROMISE from a client");
        self.open_block = Some(HeaderBlock {
            stream_id,
            end_stream: false,
            target: BlockTarget::Discard,
            fragment: BytesMut::from(&promise.fragment[..]),
        });
        if promise.end_headers { self.finish_block().await } else { Ok(()) }
    }

    async fn on_continuation(&mut self, stream_id: u32, continuation: ContinuationFrame) -> Result<(), H2Error> {
        let Some(block) = self.open_block.as_mut() else {
            return Err(H2Error::connection(
                ErrorCode::ProtocolError,
                format!("CONTINUATION on stream {stream_id} without an open header block"),
            ));
        };

        ensure!(
            block.fragment.len() + continuation.fragment.len() <= MAX_HEADER_BLOCK_LEN,
            H2Error::connection(ErrorCode::EnhanceYourCalm, "header block too large")
        );
        block.fragment.extend_from_slice(&continuation.fragment);

        if continuation.end_headers { self.finish_block().await } else { Ok(()) }
    }

    /// Decodes the completed block and applies it to its stream.
    async fn finish_block(&mut self) -> Result<(), H2Error> {
        let Some(block) = self.open_block.take() else {
            return Ok(());
        };
        let HeaderBlock { stream_id, end_stream, target, fragment } = block;

        let fields = self.decoder.decode(&fragment)?;

        match target {
            BlockTarget::Discard => return Ok(()),
            BlockTarget::Reject(e) => return Err(e),
            BlockTarget::Accept => {}
        }

        if let Some(max) = self.local_settings.max_header_list_size {
            let list_size: usize = fields.iter().map(HeaderField::size).sum();
            ensure!(
                list_size <= max as usize,
                H2Error::stream(stream_id, ErrorCode::ProtocolError, format!("header list of {list_size} octets above {max}"))
            );
        }

        let request = {
            let mut streams = self.table.lock().await;
            let Some(stream) = streams.get_mut(stream_id) else {
                return Err(H2Error::stream(stream_id, ErrorCode::StreamClosed, "stream reset while its headers arrived"));
            };
            stream.recv_headers(fields, end_stream)?;
            Self::ready_request(stream)
        };

        self.dispatch(request).await
    }

    async fn on_data(&mut self, stream_id: u32, data_frame: DataFrame) -> Result<(), H2Error> {
        // padding counts against flow control as well
        let flow_len = data_frame.pad_length.map_or(0, |pad| pad as usize + 1) + data_frame.data.len();
        if flow_len > 0 {
            self.send_control(Frame::window_update(0, flow_len as u32)).await?;
        }

        let request = {
            let mut streams = self.table.lock().await;
            let Some(stream) = streams.get_mut(stream_id) else {
                return Err(H2Error::stream(stream_id, ErrorCode::StreamClosed, "DATA on a closed or idle stream"));
            };
            stream.recv_data(&data_frame.data, data_frame.end_stream)?;
            Self::ready_request(stream)
        };

        if flow_len > 0 && !data_frame.end_stream {
            self.send_control(Frame::window_update(stream_id, flow_len as u32)).await?;
        }
        self.dispatch(request).await
    }

    async fn on_priority(&mut self, stream_id: u32, priority: PriorityBlock) {
        let mut streams = self.table.lock().await;
        if let Some(stream) = streams.get_mut(stream_id) {
            stream.set_priority(priority);
            return;
        }

        // a PRIORITY may name a stream before it is opened
        let max = self.local_settings.max_concurrent_streams.unwrap_or(100) as usize;
        if stream_id > self.last_peer_stream_id && stream_id % 2 == 1 && streams.len() < max * 2 {
            let mut stream = Stream::idle(stream_id, self.peer_settings.load().initial_window_size);
            stream.set_priority(priority);
            streams.insert(stream);
        }
    }

    async fn on_settings(&mut self, params: &[(u16, u32)]) -> Result<(), H2Error> {
        let current = self.peer_settings.load_full();
        let next = current.merged(params)?;

        let delta = i64::from(next.initial_window_size) - i64::from(current.initial_window_size);
        if delta != 0 {
            self.table.lock().await.adjust_initial_window(delta)?;
        }

        debug!(?params, "applied peer SETTINGS");
        self.peer_settings.store(Arc::new(next));
        self.table.notify_window_update();
        self.send_control(Frame::settings_ack()).await
    }

    async fn on_window_update(&mut self, stream_id: u32, increment: u32) -> Result<(), H2Error> {
        {
            let mut streams = self.table.lock().await;
            if stream_id == 0 {
                streams.credit_connection(increment)?;
            } else {
                streams.credit_stream(stream_id, increment)?;
            }
        }
        self.table.notify_window_update();
        Ok(())
    }

    /// Takes the request out of a stream whose remote side just closed.
    fn ready_request(stream: &mut Stream) -> Option<RequestStream> {
        if stream.state() != StreamState::HalfClosedRemote {
            return None;
        }
        let (fields, body) = stream.take_request();
        Some(RequestStream { id: stream.id(), fields, body })
    }

    async fn dispatch(&self, request: Option<RequestStream>) -> Result<(), H2Error> {
        let Some(request) = request else {
            return Ok(());
        };
        trace!(stream_id = request.id, "request complete, dispatching");
        self.request_tx
            .send(request)
            .await
            .map_err(|_| H2Error::connection(ErrorCode::InternalError, "dispatcher stopped"))
    }

    async fn send_control(&self, frame: Frame) -> Result<(), H2Error> {
        self.control_tx
            .send(frame)
            .await
            .map_err(|_| H2Error::connection(ErrorCode::InternalError, "writer stopped"))
    }

    async fn go_away(&self, code: ErrorCode, reason: &str) {
        let frame = Frame::go_away(self.last_peer_stream_id, code, Bytes::copy_from_slice(reason.as_bytes()));
        if self.control_tx.send(frame).await.is_err() {
            debug!("writer already stopped, GOAWAY not sent");
        }
    }
}
