// error.rs

use std::fmt;

/// Failure of a single probe attempt.
///
/// All four variants are recoverable within the retry loop: the scheduler
/// retries up to `max_retries` times before giving up on the cycle.
#[derive(Debug, Clone)]
pub enum ProbeError {
    /// Transport-level failure: DNS, TCP, TLS, connection reset mid-headers.
    Connect(String),
    /// Response received but status code was not 200.
    HttpStatus(u16),
    /// Sampling completed without observing any video packet.
    NoVideo,
    /// Any non-EOF error surfaced by the FLV demuxer.
    Demux(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Connect(msg) => write!(f, "connect failed: {msg}"),
            ProbeError::HttpStatus(code) => write!(f, "unexpected HTTP status: {code}"),
            ProbeError::NoVideo => write!(f, "no video packets observed in sample window"),
            ProbeError::Demux(msg) => write!(f, "demux error: {msg}"),
        }
    }
}

impl std::error::Error for ProbeError {}
