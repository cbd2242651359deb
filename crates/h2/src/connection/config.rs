use std::time::Duration;

use crate::protocol::Settings;
use crate::protocol::settings::{DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_FRAME_SIZE};

/// Per-connection tunables: the settings we advertise plus pipeline limits.
///
/// ```
/// use std::time::Duration;
/// use micro_h2::connection::H2Config;
///
/// let config = H2Config::default()
///     .max_concurrent_streams(32)
///     .handshake_timeout(Duration::from_secs(3));
/// assert_eq!(config.local_settings().max_concurrent_streams, Some(32));
/// ```
#[derive(Debug, Clone)]
pub struct H2Config {
    header_table_size: u32,
    max_concurrent_streams: u32,
    initial_window_size: u32,
    max_frame_size: u32,
    max_header_list_size: Option<u32>,
    handshake_timeout: Duration,
    shutdown_timeout: Duration,
    channel_capacity: usize,
}

impl Default for H2Config {
    fn default() -> Self {
        Self {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            max_concurrent_streams: 100,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
            handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            channel_capacity: 10,
        }
    }
}

impl H2Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_table_size(mut self, size: u32) -> Self {
        self.header_table_size = size;
        self
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.initial_window_size = size;
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn max_header_list_size(mut self, size: u32) -> Self {
        self.max_header_list_size = Some(size);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long in-flight exchanges may keep running after the peer stopped sending.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Capacity of each bounded channel between the reader, dispatcher and writer.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn get_handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn get_shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn get_channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// The settings we send in our connection preface and hold the peer to.
    pub fn local_settings(&self) -> Settings {
        Settings {
            header_table_size: self.header_table_size,
            enable_push: false,
            max_concurrent_streams: Some(self.max_concurrent_streams),
            initial_window_size: self.initial_window_size,
            max_frame_size: self.max_frame_size,
            max_header_list_size: self.max_header_list_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::settings::{SETTINGS_HEADER_TABLE_SIZE, SETTINGS_MAX_CONCURRENT_STREAMS, SETTINGS_MAX_HEADER_LIST_SIZE};

    #[test]
    fn defaults_advertise_protocol_values() {
        let params = H2Config::default().local_settings().to_params();
        assert_eq!(params[0], (SETTINGS_HEADER_TABLE_SIZE, 4096));
        assert!(params.contains(&(SETTINGS_MAX_CONCURRENT_STREAMS, 100)));
        assert!(!params.iter().any(|(id, _)| *id == SETTINGS_MAX_HEADER_LIST_SIZE));
    }

    #[test]
    fn builder_overrides() {
        let config = H2Config::new().max_header_list_size(8192).channel_capacity(0);
        assert_eq!(config.local_settings().max_header_list_size, Some(8192));
        assert_eq!(config.get_channel_capacity(), 1);
    }
}
