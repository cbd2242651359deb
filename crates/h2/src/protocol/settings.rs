//! SETTINGS parameters (RFC 9113 §6.5.2).

use crate::ensure;

use super::{ErrorCode, H2Error};

pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4_096;
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const MAX_WINDOW_SIZE: u32 = (1 << 31) - 1;
pub const MAX_FRAME_SIZE_UPPER_BOUND: u32 = (1 << 24) - 1;

/// One side's settings; starts at the protocol defaults until a SETTINGS frame says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    /// `None` means unlimited
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    /// `None` means unlimited
    pub max_header_list_size: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}

impl Settings {
    /// Applies one parameter. Unknown identifiers are ignored.
    pub fn apply(&mut self, id: u16, value: u32) -> Result<(), H2Error> {
        match id {
            SETTINGS_HEADER_TABLE_SIZE => self.header_table_size = value,
            SETTINGS_ENABLE_PUSH => {
                ensure!(value <= 1, H2Error::connection(ErrorCode::ProtocolError, format!("ENABLE_PUSH must be 0 or 1, got {value}")));
                self.enable_push = value == 1;
            }
            SETTINGS_MAX_CONCURRENT_STREAMS => self.max_concurrent_streams = Some(value),
            SETTINGS_INITIAL_WINDOW_SIZE => {
                ensure!(
                    value <= MAX_WINDOW_SIZE,
                    H2Error::connection(ErrorCode::FlowControlError, format!("INITIAL_WINDOW_SIZE {value} above 2^31-1"))
                );
                self.initial_window_size = value;
            }
            SETTINGS_MAX_FRAME_SIZE => {
                ensure!(
                    (DEFAULT_MAX_FRAME_SIZE..=MAX_FRAME_SIZE_UPPER_BOUND).contains(&value),
                    H2Error::connection(ErrorCode::ProtocolError, format!("MAX_FRAME_SIZE {value} out of range"))
                );
                self.max_frame_size = value;
            }
            SETTINGS_MAX_HEADER_LIST_SIZE => self.max_header_list_size = Some(value),
            _ => {}
        }
        Ok(())
    }

    /// Applies a whole frame's worth of parameters in order, returning the updated copy.
    pub fn merged(&self, params: &[(u16, u32)]) -> Result<Settings, H2Error> {
        let mut next = *self;
        for (id, value) in params {
            next.apply(*id, *value)?;
        }
        Ok(next)
    }

    /// The parameters to advertise; values equal to the protocol default are still sent
    /// except for the unlimited ones.
    pub fn to_params(&self) -> Vec<(u16, u32)> {
        let mut params = vec![(SETTINGS_HEADER_TABLE_SIZE, self.header_table_size)];
        if let Some(max) = self.max_concurrent_streams {
            params.push((SETTINGS_MAX_CONCURRENT_STREAMS, max));
        }
        params.push((SETTINGS_INITIAL_WINDOW_SIZE, self.initial_window_size));
        params.push((SETTINGS_MAX_FRAME_SIZE, self.max_frame_size));
        if let Some(max) = self.max_header_list_size {
            params.push((SETTINGS_MAX_HEADER_LIST_SIZE, max));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_known_and_ignores_unknown() {
        let settings = Settings::default().merged(&[(1, 8192), (2, 0), (3, 10), (0x99, 1), (6, 1024)]).unwrap();
        assert_eq!(settings.header_table_size, 8192);
        assert!(!settings.enable_push);
        assert_eq!(settings.max_concurrent_streams, Some(10));
        assert_eq!(settings.max_header_list_size, Some(1024));
        assert_eq!(settings.initial_window_size, DEFAULT_INITIAL_WINDOW_SIZE);
    }

    #[test]
    fn later_values_win() {
        let settings = Settings::default().merged(&[(4, 100), (4, 200)]).unwrap();
        assert_eq!(settings.initial_window_size, 200);
    }

    #[test]
    fn validates_ranges() {
        let mut settings = Settings::default();
        assert_eq!(settings.apply(SETTINGS_ENABLE_PUSH, 2).unwrap_err().code(), ErrorCode::ProtocolError);
        assert_eq!(settings.apply(SETTINGS_INITIAL_WINDOW_SIZE, 1 << 31).unwrap_err().code(), ErrorCode::FlowControlError);
        assert_eq!(settings.apply(SETTINGS_MAX_FRAME_SIZE, 16_383).unwrap_err().code(), ErrorCode::ProtocolError);
        assert_eq!(settings.apply(SETTINGS_MAX_FRAME_SIZE, 1 << 24).unwrap_err().code(), ErrorCode::ProtocolError);
        assert!(settings.apply(SETTINGS_MAX_FRAME_SIZE, MAX_FRAME_SIZE_UPPER_BOUND).is_ok());
        assert_eq!(settings, Settings { max_frame_size: MAX_FRAME_SIZE_UPPER_BOUND, ..Settings::default() });
    }

    #[test]
    fn failed_merge_leaves_original_untouched() {
        let settings = Settings::default();
        assert!(settings.merged(&[(1, 0), (2, 7)]).is_err());
        assert_eq!(settings.header_table_size, DEFAULT_HEADER_TABLE_SIZE);
    }
}
