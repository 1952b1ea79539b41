//! Type definitions and aliases

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Identity of one measurement session
///
/// Every probe of a session derives its ICMP identifier from this value, so
/// replies belonging to another session (or another process) are rejected
/// by an exact comparison instead of relying on the process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u16);

impl SessionId {
    /// Draw a fresh session identity from a random UUID
    pub fn random() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        Self(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// Identity of one probe stream within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeIdentity {
    pub session: SessionId,
    pub index: u16,
}

impl ProbeIdentity {
    pub fn new(session: SessionId, index: u16) -> Self {
        Self { session, index }
    }

    /// ICMP echo identifier carried on the wire
    pub fn icmp_identifier(&self) -> u16 {
        self.session.0.wrapping_add(self.index)
    }
}

impl fmt::Display for ProbeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.index)
    }
}

/// Performance classification of a one-way latency
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    /// Good performance (< 50 ms)
    Good,
    /// Moderate performance (50-150 ms)
    Moderate,
    /// Poor performance (> 150 ms)
    Poor,
}

impl PerformanceLevel {
    /// Classify performance based on one-way latency
    pub fn from_latency(latency: Duration) -> Self {
        let ms = latency.as_secs_f64() * 1000.0;
        if ms < 50.0 {
            Self::Good
        } else if ms < 150.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}
