//! Error types for probes.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors that can end a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The host identifier was empty or whitespace.
    #[error("Host name is empty")]
    EmptyHost,

    /// The ping program could not be launched.
    #[error("Failed to start ping for {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: io::Error,
    },

    /// The ping program printed nothing within the start timeout.
    #[error("Ping for {host} produced no output within {waited:?}")]
    StartTimeout { host: String, waited: Duration },

    /// The ping program exited unsuccessfully before any reply was parsed.
    #[error("Ping for {host} exited before any reply ({status})")]
    EarlyExit { host: String, status: String },

    /// The output stream ended after the probe was running.
    #[error("Ping output for {host} ended ({status})")]
    StreamEnded { host: String, status: String },

    /// Reading the output stream failed.
    #[error("Failed reading ping output for {host}: {source}")]
    Read {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification the coordinator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The probe never got going; the host is marked stalled for good.
    Start,
    /// The probe was running and its stream died; eligible for restart.
    Io,
}

impl ProbeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::EmptyHost
            | ProbeError::Spawn { .. }
            | ProbeError::StartTimeout { .. }
            | ProbeError::EarlyExit { .. } => FailureKind::Start,
            ProbeError::StreamEnded { .. } | ProbeError::Read { .. } => FailureKind::Io,
        }
    }
}
