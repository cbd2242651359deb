use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::H2Config;
use super::dispatcher::Dispatcher;
use super::reader::Reader;
use super::stream_table::StreamTable;
use super::writer::Writer;
use crate::codec::{Frame, FrameDecoder, FrameEncoder, FramePayload, PrefaceDecoder};
use crate::handler::Handler;
use crate::hpack::HpackContext;
use crate::protocol::settings::DEFAULT_HEADER_TABLE_SIZE;
use crate::protocol::{ErrorCode, HttpError, Settings};

/// A server-side HTTP/2 connection.
///
/// `H2Connection` performs the connection handshake and then runs three cooperating parts
/// until the connection ends:
/// - the read loop on the calling task, which owns the HPACK decoder and every
///   inbound state transition
/// - a dispatcher task, which runs the handler for each completed request stream
/// - a writer task, which owns the write half and serializes every outbound frame
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
///
#[derive(Debug)]
pub struct H2Connection<R, W> {
    framed_read: FramedRead<R, PrefaceDecoder>,
    framed_write: FramedWrite<W, FrameEncoder>,
    config: H2Config,
}

impl<R, W> H2Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, H2Config::default())
    }

    pub fn with_config(reader: R, writer: W, config: H2Config) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, PrefaceDecoder, 16 * 1024),
            framed_write: FramedWrite::new(writer, FrameEncoder::new()),
            config,
        }
    }

    /// Serves the connection until the peer goes away or a connection error occurs.
    pub async fn process<H>(self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + 'static,
    {
        let Self { framed_read, mut framed_write, config } = self;
        let local_settings = config.local_settings();

        let handshake_timeout = config.get_handshake_timeout();
        let (framed_read, peer_settings) =
            match timeout(handshake_timeout, handshake(framed_read, &mut framed_write, &local_settings)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout = ?handshake_timeout, "handshake timed out");
                    return Err(HttpError::Timeout { millis: handshake_timeout.as_millis() });
                }
            };
        debug!(?peer_settings, "handshake finished");

        let (mut decoder, encoder) = HpackContext::new(DEFAULT_HEADER_TABLE_SIZE as usize).into_parts();
        decoder.set_max_table_size(local_settings.header_table_size as usize);

        let capacity = config.get_channel_capacity();
        let (control_tx, control_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (request_tx, request_rx) = mpsc::channel(capacity);

        let table = Arc::new(StreamTable::new());
        let peer_settings = Arc::new(ArcSwap::from_pointee(peer_settings));
        let cancel = CancellationToken::new();

        let writer = Writer::new(
            framed_write,
            encoder,
            control_rx,
            outbound_rx,
            Arc::clone(&table),
            Arc::clone(&peer_settings),
            cancel.clone(),
        );
        let writer_handle = tokio::spawn(writer.run());

        let dispatcher = Dispatcher::new(
            handler,
            request_rx,
            outbound_tx,
            control_tx.clone(),
            Arc::clone(&table),
            Arc::clone(&peer_settings),
            cancel.clone(),
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run());

        let reader = Reader::new(
            framed_read,
            decoder,
            local_settings,
            peer_settings,
            table,
            control_tx,
            request_tx,
            cancel.clone(),
        );
        let result = reader.run().await;
        if result.is_err() {
            cancel.cancel();
        }

        // the read loop is gone: running exchanges may still finish and be written
        let shutdown_timeout = config.get_shutdown_timeout();
        let drained = timeout(shutdown_timeout, async {
            if let Err(e) = dispatcher_handle.await {
                error!(cause = %e, "dispatcher task failed");
            }
            writer_handle.await
        })
        .await;
        cancel.cancel();

        let written = match drained {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => Err(HttpError::Transport { source: io::Error::other(e) }),
            Err(_) => {
                warn!(timeout = ?shutdown_timeout, "exchanges still running at shutdown, dropping them");
                Ok(())
            }
        };

        result.and(written)
    }
}

/// Reads the client preface and SETTINGS, then answers with our SETTINGS and the ACK.
async fn handshake<R, W>(
    mut framed_read: FramedRead<R, PrefaceDecoder>,
    framed_write: &mut FramedWrite<W, FrameEncoder>,
    local_settings: &Settings,
) -> Result<(FramedRead<R, FrameDecoder>, Settings), HttpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match framed_read.next().await {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            error!(cause = %e, "can't read connection preface");
            return Err(e.into());
        }
        None => return Err(HttpError::handshake("connection closed before the preface")),
    }

    let max_frame_size = local_settings.max_frame_size;
    let mut framed_read = framed_read.map_decoder(|_| FrameDecoder::new(max_frame_size));

    let raw = match framed_read.next().await {
        Some(Ok(raw)) => raw,
        Some(Err(e)) => return Err(e.into()),
        None => return Err(HttpError::handshake("connection closed before SETTINGS")),
    };

    let params = match Frame::decode(raw) {
        Ok(Frame { payload: FramePayload::Settings(settings), .. }) if !settings.ack => settings.params,
        Ok(frame) => {
            let reason = format!("expected SETTINGS, got {:?}", frame.kind());
            reject(framed_write, ErrorCode::ProtocolError, &reason).await;
            return Err(HttpError::handshake(reason));
        }
        Err(e) => {
            reject(framed_write, e.code(), &e.to_string()).await;
            return Err(e.into());
        }
    };

    let peer_settings = match Settings::default().merged(&params) {
        Ok(settings) => settings,
        Err(e) => {
            reject(framed_write, e.code(), &e.to_string()).await;
            return Err(e.into());
        }
    };

    framed_write.feed(Frame::settings(local_settings.to_params())).await?;
    framed_write.send(Frame::settings_ack()).await?;
    info!("http/2 connection established");

    Ok((framed_read, peer_settings))
}

async fn reject<W>(framed_write: &mut FramedWrite<W, FrameEncoder>, code: ErrorCode, reason: &str)
where
    W: AsyncWrite + Unpin,
{
    let go_away = Frame::go_away(0, code, Bytes::copy_from_slice(reason.as_bytes()));
    if let Err(e) = framed_write.send(go_away).await {
        debug!(cause = %e, "can't send GOAWAY");
    }
}
