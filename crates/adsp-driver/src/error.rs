//! Error types for cluster operations

use thiserror::Error;

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, DspError>;

/// Errors that can occur while driving the cluster
#[derive(Debug, Error)]
pub enum DspError {
    /// DSP id outside the configured topology, rejected before any hardware
    /// access
    #[error("dsp id {id} out of range")]
    InvalidId {
        /// Rejected raw id
        id: u8,
    },

    /// Resource already owned by a different client, rejected before mutation
    #[error("dsp{id} is owned by client {owner}")]
    Busy {
        /// Contended DSP id
        id: u8,
        /// Current owner
        owner: u64,
    },

    /// Client handle is unknown (never attached, or already detached)
    #[error("unknown client {client}")]
    UnknownClient {
        /// Rejected client handle
        client: u64,
    },

    /// A bounded status poll exhausted its iteration budget. The hardware is
    /// left as-is; most sequences are themselves recovery paths, so there is
    /// no automatic rollback.
    #[error("timed out waiting for {op} ({iters} polls)")]
    Timeout {
        /// What was being waited for
        op: &'static str,
        /// Iterations spent before giving up
        iters: u32,
    },

    /// An injected instruction raised an exception; the in-flight composite
    /// operation is aborted
    #[error("dsp{id}: exception while executing {instr:#08x}")]
    Exception {
        /// DSP that faulted
        id: u8,
        /// Instruction word that was in flight
        instr: u32,
    },

    /// Breakpoint index outside the per-core breakpoint count
    #[error("breakpoint index {index} out of range")]
    InvalidBreakpoint {
        /// Rejected index
        index: usize,
    },

    /// The external clock-rate transport refused a request
    #[error("clock transport: {reason}")]
    Transport {
        /// Reason reported by the transport
        reason: String,
    },

    /// I/O error while setting up the register mapping
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl DspError {
    /// Create an invalid-id error
    pub const fn invalid_id(id: u8) -> Self {
        Self::InvalidId { id }
    }

    /// Create a timeout error
    pub const fn timeout(op: &'static str, iters: u32) -> Self {
        Self::Timeout { op, iters }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}
