//! The single funnel every outbound frame passes through.
//!
//! The writer owns the transport's write half and the HPACK encoder. It drains
//! two bounded channels: control frames from the read loop and dispatcher, and
//! complete outbound streams from the dispatcher. Header blocks are encoded and
//! written in one go, so a HEADERS/PUSH_PROMISE and its CONTINUATIONs are never
//! interleaved with anything else. Bodies wait in a queue until flow control
//! lets them out.

use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::stream_table::StreamTable;
use crate::codec::{ContinuationFrame, DataFrame, Frame, FrameEncoder, FramePayload, HeadersFrame, PriorityBlock, PushPromiseFrame};
use crate::hpack::HpackEncoder;
use crate::protocol::{HttpError, OutboundKind, OutboundStream, Settings};

#[derive(Debug)]
struct PendingData {
    stream_id: u32,
    data: Bytes,
}

pub(crate) struct Writer<W> {
    framed_write: FramedWrite<W, FrameEncoder>,
    encoder: HpackEncoder,
    control_rx: mpsc::Receiver<Frame>,
    outbound_rx: mpsc::Receiver<OutboundStream>,
    table: Arc<StreamTable>,
    peer_settings: Arc<ArcSwap<Settings>>,
    cancel: CancellationToken,
    pending: VecDeque<PendingData>,
}

impl<W> Writer<W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(
        framed_write: FramedWrite<W, FrameEncoder>,
        encoder: HpackEncoder,
        control_rx: mpsc::Receiver<Frame>,
        outbound_rx: mpsc::Receiver<OutboundStream>,
        table: Arc<StreamTable>,
        peer_settings: Arc<ArcSwap<Settings>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { framed_write, encoder, control_rx, outbound_rx, table, peer_settings, cancel, pending: VecDeque::new() }
    }

    /// Runs until the connection is cancelled or every producer is gone and the
    /// queued bodies are written; a write failure cancels the connection.
    pub(crate) async fn run(mut self) -> Result<(), HttpError> {
        let result = self.write_loop().await;
        if let Err(e) = &result {
            debug!(cause = %e, "writer stopped");
            self.cancel.cancel();
        }
        result
    }

    async fn write_loop(&mut self) -> Result<(), HttpError> {
        let mut control_open = true;
        let mut outbound_open = true;

        loop {
            select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return self.shutdown().await;
                }

                frame = self.control_rx.recv(), if control_open => match frame {
                    Some(frame) => {
                        trace!(kind = ?frame.kind(), stream_id = frame.stream_id, "write control frame");
                        self.framed_write.feed(frame).await?;
                    }
                    None => control_open = false,
                },

                outbound = self.outbound_rx.recv(), if outbound_open => match outbound {
                    Some(outbound) => self.write_stream(outbound).await?,
                    None => outbound_open = false,
                },

                _ = self.table.window_updated(), if !self.pending.is_empty() => {}
            }

            self.write_pending().await?;
            self.framed_write.flush().await?;

            if !control_open && !outbound_open && self.pending.is_empty() {
                debug!("every producer finished, closing the connection");
                return self.shutdown().await;
            }
        }
    }

    /// Writes whatever control frames are still queued (a final GOAWAY among them) and closes the transport.
    async fn shutdown(&mut self) -> Result<(), HttpError> {
        while let Ok(frame) = self.control_rx.try_recv() {
            self.framed_write.feed(frame).await?;
        }
        if let Err(e) = self.framed_write.close().await {
            debug!(cause = %e, "closing transport failed");
        }
        Ok(())
    }

    async fn write_stream(&mut self, outbound: OutboundStream) -> Result<(), HttpError> {
        let OutboundStream { id, kind, fields, body, priority } = outbound;
        let end_stream = kind == OutboundKind::Response && body.is_empty();

        {
            let mut streams = self.table.lock().await;
            match kind {
                OutboundKind::Response => match streams.get_mut(id) {
                    Some(stream) if !stream.is_closed() => stream.send_headers(false),
                    _ => {
                        debug!(stream_id = id, "stream reset before its response was written, dropping it");
                        return Ok(());
                    }
                },
                OutboundKind::Promise { promised_id } => {
                    if !streams.contains(id) {
                        debug!(stream_id = id, promised_id, "parent stream gone, dropping promise");
                        streams.remove(promised_id);
                        return Ok(());
                    }
                }
            }
            if end_stream {
                streams.end_stream_sent(id);
            }
        }

        let settings = *self.peer_settings.load_full();
        let table_size = settings.header_table_size as usize;
        if table_size != self.encoder.table().max_size() {
            debug!(table_size, "peer changed HEADER_TABLE_SIZE");
            self.encoder.set_max_table_size(table_size);
        }

        let mut block = Vec::new();
        self.encoder.encode(&fields, &mut block);

        let frames = header_block_frames(id, kind, priority, Bytes::from(block), end_stream, settings.max_frame_size as usize);
        trace!(stream_id = id, ?kind, frames = frames.len(), "write header block");
        for frame in frames {
            self.framed_write.feed(frame).await?;
        }

        if kind == OutboundKind::Response && !body.is_empty() {
            self.pending.push_back(PendingData { stream_id: id, data: body });
        }
        Ok(())
    }

    /// Writes queued bodies as far as the send windows allow, keeping the rest queued in order.
    async fn write_pending(&mut self) -> Result<(), HttpError> {
        let max_frame_size = self.peer_settings.load().max_frame_size as usize;
        let mut blocked = VecDeque::new();

        while let Some(mut pending) = self.pending.pop_front() {
            loop {
                let wanted = pending.data.len().min(max_frame_size);
                let (granted, end_stream) = {
                    let mut streams = self.table.lock().await;
                    let Some(granted) = streams.reserve_send(pending.stream_id, wanted) else {
                        debug!(stream_id = pending.stream_id, "stream gone, dropping queued data");
                        break;
                    };
                    let end_stream = granted == pending.data.len();
                    if end_stream {
                        streams.end_stream_sent(pending.stream_id);
                    }
                    (granted, end_stream)
                };

                if granted == 0 {
                    trace!(stream_id = pending.stream_id, "waiting for WINDOW_UPDATE");
                    blocked.push_back(pending);
                    break;
                }

                let data = pending.data.split_to(granted);
                let frame = Frame::new(pending.stream_id, FramePayload::Data(DataFrame { end_stream, pad_length: None, data }));
                self.framed_write.feed(frame).await?;

                if end_stream {
                    break;
                }
            }
        }

        self.pending = blocked;
        Ok(())
    }
}

/// Splits an encoded header block into a HEADERS or PUSH_PROMISE frame followed by
/// as many CONTINUATION frames as `max_frame_size` requires.
///
/// Only the last frame carries END_HEADERS; END_STREAM, when set, rides on the first.
pub(crate) fn header_block_frames(
    stream_id: u32,
    kind: OutboundKind,
    priority: Option<PriorityBlock>,
    mut block: Bytes,
    end_stream: bool,
    max_frame_size: usize,
) -> Vec<Frame> {
    let first_capacity = match kind {
        OutboundKind::Response => max_frame_size - priority.map_or(0, |_| 5),
        OutboundKind::Promise { .. } => max_frame_size - 4,
    };

    let fragment = block.split_to(first_capacity.min(block.len()));
    let end_headers = block.is_empty();
    let first = match kind {
        OutboundKind::Response => {
            FramePayload::Headers(HeadersFrame { end_stream, end_headers, pad_length: None, priority, fragment })
        }
        OutboundKind::Promise { promised_id } => FramePayload::PushPromise(PushPromiseFrame {
            end_headers,
            pad_length: None,
            promised_stream_id: promised_id,
            fragment,
        }),
    };

    let mut frames = vec![Frame::new(stream_id, first)];
    while !block.is_empty() {
        let fragment = block.split_to(max_frame_size.min(block.len()));
        let end_headers = block.is_empty();
        frames.push(Frame::new(stream_id, FramePayload::Continuation(ContinuationFrame { end_headers, fragment })));
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::{HeaderField, HpackContext};
    use crate::protocol::Stream;

    fn fragments(frames: &[Frame]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|frame| match &frame.payload {
                FramePayload::Headers(f) => f.fragment.to_vec(),
                FramePayload::PushPromise(f) => f.fragment.to_vec(),
                FramePayload::Continuation(f) => f.fragment.to_vec(),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    fn end_headers(frame: &Frame) -> bool {
        match &frame.payload {
            FramePayload::Headers(f) => f.end_headers,
            FramePayload::PushPromise(f) => f.end_headers,
            FramePayload::Continuation(f) => f.end_headers,
            _ => false,
        }
    }

    #[test]
    fn small_block_fits_one_frame() {
        let frames = header_block_frames(1, OutboundKind::Response, None, Bytes::from_static(&[0x88]), true, 16_384);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].payload,
            FramePayload::Headers(HeadersFrame {
                end_stream: true,
                end_headers: true,
                pad_length: None,
                priority: None,
                fragment: Bytes::from_static(&[0x88]),
            })
        );
    }

    #[test]
    fn large_block_is_split_into_continuations() {
        let mut hpack = HpackContext::new(4096);
        let fields: Vec<HeaderField> = (0..40)
            .map(|i| HeaderField::new(format!("x-header-{i}"), "v".repeat(1000)))
            .chain(std::iter::once(HeaderField::new(":status", "200")))
            .collect();
        let block = hpack.encode(&fields);
        assert!(block.len() > 16_384 * 2);

        let frames = header_block_frames(1, OutboundKind::Response, None, Bytes::from(block.clone()), false, 16_384);
        assert!(frames.len() >= 3);
        assert_eq!(frames[0].kind(), crate::codec::FrameKind::Headers);
        assert!(frames[1..].iter().all(|f| f.kind() == crate::codec::FrameKind::Continuation));
        assert!(frames.iter().all(|f| f.payload_len() <= 16_384));

        // only the last frame ends the block
        let flags: Vec<bool> = frames.iter().map(end_headers).collect();
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert!(flags[flags.len() - 1]);

        let mut peer = HpackContext::new(4096);
        assert_eq!(fragments(&frames), block);
        assert_eq!(peer.decode(&fragments(&frames)).unwrap(), fields);
    }

    fn writer(table: Arc<StreamTable>) -> Writer<Vec<u8>> {
        let (_control_tx, control_rx) = mpsc::channel(1);
        let (_outbound_tx, outbound_rx) = mpsc::channel(1);
        Writer::new(
            FramedWrite::new(Vec::new(), FrameEncoder::new()),
            HpackEncoder::new(4096),
            control_rx,
            outbound_rx,
            table,
            Arc::new(ArcSwap::from_pointee(Settings::default())),
            CancellationToken::new(),
        )
    }

    fn response(stream_id: u32) -> OutboundStream {
        let fields = vec![HeaderField::new(":status", "200"), HeaderField::new("x-handler", "slow")];
        OutboundStream::response(stream_id, fields, Bytes::from_static(b"late"))
    }

    #[tokio::test]
    async fn response_for_a_reset_stream_is_never_encoded() {
        let table = Arc::new(StreamTable::new());
        let mut writer = writer(Arc::clone(&table));

        writer.write_stream(response(1)).await.unwrap();

        assert!(writer.encoder.table().is_empty());
        assert!(writer.pending.is_empty());
        assert!(writer.framed_write.get_ref().is_empty());
    }

    #[tokio::test]
    async fn response_for_a_live_stream_is_encoded() {
        let table = Arc::new(StreamTable::new());
        let mut stream = Stream::idle(1, 65_535);
        stream.recv_headers(vec![HeaderField::new(":method", "GET")], true).unwrap();
        table.lock().await.insert(stream);
        let mut writer = writer(Arc::clone(&table));

        writer.write_stream(response(1)).await.unwrap();
        writer.framed_write.flush().await.unwrap();

        assert_eq!(writer.encoder.table().len(), 1);
        assert_eq!(writer.pending.len(), 1);
        assert!(!writer.framed_write.get_ref().is_empty());
    }

    #[test]
    fn priority_and_promise_overhead_is_reserved() {
        let block = Bytes::from(vec![0u8; 100]);
        let priority = Some(PriorityBlock { exclusive: false, dependency: 0, weight: 255 });

        let frames = header_block_frames(1, OutboundKind::Response, priority, block.clone(), false, 50);
        assert_eq!(frames[0].payload_len(), 50);
        assert!(frames.iter().all(|f| f.payload_len() <= 50));

        let frames = header_block_frames(1, OutboundKind::Promise { promised_id: 2 }, None, block, false, 50);
        assert_eq!(frames[0].kind(), crate::codec::FrameKind::PushPromise);
        assert_eq!(frames[0].payload_len(), 50);
        assert_eq!(fragments(&frames).len(), 100);
    }
}
