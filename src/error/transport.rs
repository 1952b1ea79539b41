//! Transient transport failures
//!
//! These never leave the probe driver: a failed send is skipped and not
//! counted, a failed read is retried.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No reply arrived before the read deadline
    #[error("read timed out")]
    Timeout,

    /// A datagram arrived but was not a usable echo reply
    #[error("malformed reply: {0}")]
    Parse(String),

    /// A request reported sent turned out never to have left the host
    #[error("send of sequence {sequence} failed: {reason}")]
    SendFailed { sequence: u16, reason: String },

    /// Any other socket-level failure
    #[error("transport I/O failure: {0}")]
    Io(String),

    /// The transport has been shut down
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn send_failed<S: Into<String>>(sequence: u16, reason: S) -> Self {
        Self::SendFailed {
            sequence,
            reason: reason.into(),
        }
    }

    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Parse(_) => "parse",
            Self::SendFailed { .. } => "send_failed",
            Self::Io(_) => "io",
            Self::Closed => "closed",
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::io(error.to_string())
        }
    }
}
