//! Utility macros shared by the codec, HPACK and connection layers.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but the failure path is an `Err` instead of a panic, which is
/// what every peer-controlled length or state check in this crate needs.
///
/// # Example
///
/// ```ignore
/// ensure!(payload.len() == 8, H2Error::connection(ErrorCode::FrameSizeError, "PING length must be 8"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
