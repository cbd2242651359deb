//! Runs handlers for completed request streams and hands their responses to the writer.

use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures::FutureExt;
use http::{Method, Request, Response};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::stream_table::StreamTable;
use crate::codec::{Frame, STREAM_ID_MASK};
use crate::handler::Handler;
use crate::protocol::{
    H2Error, OutboundStream, PushRequests, RequestStream, Settings, Stream, internal_server_error, response_fields,
};

type HandlerResult = Result<Response<Bytes>, Box<dyn Error + Send + Sync>>;

/// What the dispatcher remembers about a running handler task.
#[derive(Debug)]
struct Exchange {
    stream_id: u32,
    method: Method,
    path: String,
    /// responses to pushed streams may not push again
    pushed: bool,
}

pub(crate) struct Dispatcher<H> {
    handler: Arc<H>,
    request_rx: mpsc::Receiver<RequestStream>,
    outbound_tx: mpsc::Sender<OutboundStream>,
    control_tx: mpsc::Sender<Frame>,
    table: Arc<StreamTable>,
    peer_settings: Arc<ArcSwap<Settings>>,
    cancel: CancellationToken,
    tasks: JoinSet<(Exchange, HandlerResult)>,
    next_push_id: u32,
}

impl<H> Dispatcher<H>
where
    H: Handler + 'static,
{
    pub(crate) fn new(
        handler: Arc<H>,
        request_rx: mpsc::Receiver<RequestStream>,
        outbound_tx: mpsc::Sender<OutboundStream>,
        control_tx: mpsc::Sender<Frame>,
        table: Arc<StreamTable>,
        peer_settings: Arc<ArcSwap<Settings>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handler,
            request_rx,
            outbound_tx,
            control_tx,
            table,
            peer_settings,
            cancel,
            tasks: JoinSet::new(),
            next_push_id: 2,
        }
    }

    /// Runs until cancelled, or until the read loop is gone and every handler finished.
    ///
    /// Dropping the dispatcher aborts the handlers still running.
    pub(crate) async fn run(mut self) {
        let mut receiving = true;

        loop {
            select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if !self.complete(joined).await {
                        break;
                    }
                }

                request = self.request_rx.recv(), if receiving => match request {
                    Some(request) => self.start(request).await,
                    None => receiving = false,
                },
            }

            if !receiving && self.tasks.is_empty() {
                break;
            }
        }
    }

    async fn start(&mut self, stream: RequestStream) {
        let stream_id = stream.id;
        match stream.into_request() {
            Ok(request) => self.spawn(stream_id, request, false),
            Err(e) => {
                warn!(stream_id, cause = %e, "malformed request");
                self.reset(e).await;
            }
        }
    }

    fn spawn(&mut self, stream_id: u32, request: Request<Bytes>, pushed: bool) {
        let exchange = Exchange { stream_id, method: request.method().clone(), path: request.uri().path().to_string(), pushed };
        let handler = Arc::clone(&self.handler);
        self.tasks.spawn(async move {
            let result: HandlerResult = match AssertUnwindSafe(handler.call(request)).catch_unwind().await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err("handler panicked".into()),
            };
            (exchange, result)
        });
    }

    /// Sends the finished response; returns false once the writer is gone.
    async fn complete(&mut self, joined: Result<(Exchange, HandlerResult), JoinError>) -> bool {
        let (exchange, result) = match joined {
            Ok(joined) => joined,
            Err(e) => {
                debug!(cause = %e, "handler task cancelled");
                return true;
            }
        };
        let stream_id = exchange.stream_id;

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(stream_id, cause = %e, "handler failed, responding with 500");
                internal_server_error()
            }
        };

        let pushes = response.extensions_mut().remove::<PushRequests>().unwrap_or_default();
        let promised = if exchange.pushed || pushes.is_empty() { Vec::new() } else { self.promise(stream_id, pushes).await };

        info!(stream_id, method = %exchange.method, path = %exchange.path, status = response.status().as_u16(), "exchange completed");

        let fields = response_fields(&response);
        let outbound = OutboundStream::response(stream_id, fields, response.into_body());
        if self.outbound_tx.send(outbound).await.is_err() {
            debug!(stream_id, "writer stopped, dropping response");
            return false;
        }

        for (promised_id, request) in promised {
            self.spawn(promised_id, request, true);
        }
        true
    }

    /// Reserves a stream and sends a PUSH_PROMISE for every acceptable push.
    ///
    /// Promises go out before the parent response so the peer learns about the
    /// resources before it could request them itself.
    async fn promise(&mut self, parent_id: u32, pushes: PushRequests) -> Vec<(u32, Request<Bytes>)> {
        let settings = *self.peer_settings.load_full();
        if !settings.enable_push {
            debug!(stream_id = parent_id, pushes = pushes.len(), "peer disabled push, skipping");
            return Vec::new();
        }

        let mut promised = Vec::new();
        for push in pushes {
            if !push.is_pushable() {
                warn!(stream_id = parent_id, method = %push.method, path = %push.path, "only GET and HEAD can be pushed");
                continue;
            }
            let request = match push.to_request() {
                Ok(request) => request,
                Err(e) => {
                    warn!(stream_id = parent_id, path = %push.path, cause = %e, "invalid push request");
                    continue;
                }
            };
            if self.next_push_id > STREAM_ID_MASK {
                warn!("push stream ids exhausted");
                break;
            }

            let promised_id = self.next_push_id;
            {
                let mut streams = self.table.lock().await;
                if !streams.contains(parent_id) {
                    break;
                }
                if settings.max_concurrent_streams.is_some_and(|max| streams.pushed_count() >= max as usize) {
                    debug!(stream_id = parent_id, "peer concurrency limit reached, skipping remaining pushes");
                    break;
                }
                streams.insert(Stream::reserved_local(promised_id, settings.initial_window_size));
            }
            self.next_push_id += 2;

            debug!(stream_id = parent_id, promised_id, path = %push.path, "promising push");
            if self.outbound_tx.send(OutboundStream::promise(parent_id, promised_id, push.fields())).await.is_err() {
                break;
            }
            promised.push((promised_id, request));
        }
        promised
    }

    async fn reset(&self, error: H2Error) {
        if let H2Error::Stream { stream_id, code, .. } = error {
            self.table.lock().await.remove(stream_id);
            if self.control_tx.send(Frame::rst_stream(stream_id, code)).await.is_err() {
                debug!(stream_id, "writer already stopped, RST_STREAM not sent");
            }
        }
    }
}
