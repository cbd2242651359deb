use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard, Notify};

use crate::protocol::settings::{DEFAULT_INITIAL_WINDOW_SIZE, MAX_WINDOW_SIZE};
use crate::protocol::{ErrorCode, H2Error, Stream};

/// Streams of one connection, shared by the read loop, the dispatcher and the writer.
///
/// Every access goes through [`StreamTable::lock`]. The writer parks on
/// [`StreamTable::window_updated`] while its DATA is blocked by flow control.
#[derive(Debug)]
pub struct StreamTable {
    inner: Mutex<Streams>,
    window_updated: Notify,
}

#[derive(Debug)]
pub struct Streams {
    streams: HashMap<u32, Stream>,
    /// connection-level send window, independent of SETTINGS
    connection_window: i64,
}

impl StreamTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Streams { streams: HashMap::new(), connection_window: i64::from(DEFAULT_INITIAL_WINDOW_SIZE) }),
            window_updated: Notify::new(),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Streams> {
        self.inner.lock().await
    }

    /// Wakes the writer after send capacity grew.
    pub fn notify_window_update(&self) {
        self.window_updated.notify_one();
    }

    pub async fn window_updated(&self) {
        self.window_updated.notified().await;
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Streams {
    pub fn get(&self, id: u32) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.streams.contains_key(&id)
    }

    pub fn insert(&mut self, stream: Stream) {
        self.streams.insert(stream.id(), stream);
    }

    pub fn remove(&mut self, id: u32) -> Option<Stream> {
        self.streams.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Peer-initiated streams counting against our MAX_CONCURRENT_STREAMS.
    pub fn active_count(&self) -> usize {
        self.streams.values().filter(|s| s.id() % 2 == 1 && s.is_active()).count()
    }

    /// Server-initiated streams still in flight.
    pub fn pushed_count(&self) -> usize {
        self.streams.keys().filter(|id| *id % 2 == 0).count()
    }

    pub fn connection_window(&self) -> i64 {
        self.connection_window
    }

    pub fn credit_connection(&mut self, increment: u32) -> Result<(), H2Error> {
        let next = self.connection_window + i64::from(increment);
        if next > i64::from(MAX_WINDOW_SIZE) {
            return Err(H2Error::connection(ErrorCode::FlowControlError, "connection send window overflow"));
        }
        self.connection_window = next;
        Ok(())
    }

    /// A WINDOW_UPDATE for a stream we no longer track is ignored.
    pub fn credit_stream(&mut self, id: u32, increment: u32) -> Result<(), H2Error> {
        match self.streams.get_mut(&id) {
            Some(stream) => stream.credit_send_window(increment),
            None => Ok(()),
        }
    }

    /// Shifts every stream window after the peer changed INITIAL_WINDOW_SIZE.
    pub fn adjust_initial_window(&mut self, delta: i64) -> Result<(), H2Error> {
        for stream in self.streams.values_mut() {
            stream.adjust_send_window(delta)?;
        }
        Ok(())
    }

    /// Reserves up to `wanted` octets of send capacity on both windows.
    ///
    /// `None` means the stream is gone and its data should be dropped.
    pub fn reserve_send(&mut self, id: u32, wanted: usize) -> Option<usize> {
        let connection_window = self.connection_window;
        let stream = self.streams.get_mut(&id)?;

        let available = connection_window.min(stream.send_window()).max(0);
        let granted = (wanted as i64).min(available) as usize;

        stream.consume_send_window(granted);
        self.connection_window -= granted as i64;
        Some(granted)
    }

    /// Records that END_STREAM went out, dropping the stream once both sides are done.
    pub fn end_stream_sent(&mut self, id: u32) {
        let closed = match self.streams.get_mut(&id) {
            Some(stream) => {
                stream.send_end_stream();
                stream.is_closed()
            }
            None => false,
        };
        if closed {
            self.streams.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::HeaderField;

    fn open_stream(id: u32, window: u32) -> Stream {
        let mut stream = Stream::idle(id, window);
        stream.recv_headers(vec![HeaderField::new(":method", "GET")], true).unwrap();
        stream
    }

    #[tokio::test]
    async fn reserve_respects_both_windows() {
        let table = StreamTable::new();
        let mut streams = table.lock().await;
        streams.insert(open_stream(1, 100));
        streams.insert(open_stream(3, 70_000));

        assert_eq!(streams.reserve_send(1, 500), Some(100));
        assert_eq!(streams.reserve_send(1, 500), Some(0));
        assert_eq!(streams.connection_window(), 65_435);

        // stream 3 is limited by what is left of the connection window
        assert_eq!(streams.reserve_send(3, 70_000), Some(65_435));
        assert_eq!(streams.reserve_send(3, 1), Some(0));
        assert_eq!(streams.reserve_send(5, 1), None);
    }

    #[tokio::test]
    async fn window_updates_and_overflow() {
        let table = StreamTable::new();
        let mut streams = table.lock().await;
        streams.insert(open_stream(1, 0));

        streams.credit_stream(1, 10).unwrap();
        assert_eq!(streams.get(1).unwrap().send_window(), 10);
        // unknown streams are ignored
        streams.credit_stream(99, 10).unwrap();

        let err = streams.credit_connection(MAX_WINDOW_SIZE).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::FlowControlError);
    }

    #[tokio::test]
    async fn initial_window_delta_applies_to_every_stream() {
        let table = StreamTable::new();
        let mut streams = table.lock().await;
        streams.insert(open_stream(1, 65_535));
        streams.insert(open_stream(3, 65_535));

        streams.adjust_initial_window(-65_535).unwrap();
        assert_eq!(streams.reserve_send(1, 10), Some(0));
        streams.adjust_initial_window(20).unwrap();
        assert_eq!(streams.reserve_send(3, 100), Some(20));
    }

    #[tokio::test]
    async fn stream_leaves_the_table_after_end_stream() {
        let table = StreamTable::new();
        let mut streams = table.lock().await;
        streams.insert(open_stream(1, 65_535));
        assert_eq!(streams.active_count(), 1);

        streams.end_stream_sent(1);
        assert!(!streams.contains(1));
        assert!(streams.is_empty());
    }
}
