// src/common/error.rs

use super::types::Channel;

/// Crate-wide error taxonomy.
///
/// Transport-level failures carry their underlying cause to the log at the
/// failure site; what propagates to the caller is the category, which is
/// all a retry policy needs. No internal retries are performed; retry
/// policy belongs to the surrounding application.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Timeout elapsed with no qualifying frame observed; the sensor is
    /// unresponsive, disconnected, or simply has nothing new. Recoverable:
    /// the caller may retry the fetch.
    #[error("no data received before the timeout elapsed")]
    NoData,

    /// Checksum mismatch on a length-complete frame: line noise or a stale
    /// desync. The previously validated measurement is retained.
    #[error("checksum mismatch: frame carries {expected:#04x}, calculated {calculated:#04x}")]
    ChecksumMismatch { expected: u8, calculated: u8 },

    /// The requested channel is not exposed by this sensor family. A caller
    /// bug; retrying does not help.
    #[error("unsupported channel: {0:?}")]
    UnsupportedChannel(Channel),

    /// The bound transport failed to initialize. Fatal for the instance;
    /// construction fails.
    #[error("transport failed to initialize")]
    TransportUnavailable,

    /// Request transmission failed in query mode. The caller may retry the
    /// whole fetch.
    #[error("request transmission failed")]
    SendFailure,
}
