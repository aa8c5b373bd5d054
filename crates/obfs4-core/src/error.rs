//! Connection-level errors.
//!
//! The transport has a flat, fatal error model: every variant here ends
//! the connection (a transition to [`ConnectionState::Broken`]). There
//! is no transient/retryable category — a peer that triggers any of
//! these has either desynchronized or is actively malicious, and there
//! is no partial-credit recovery for a framed, encrypted stream.

use std::io;

use obfs4_crypto::CryptoError;
use obfs4_proto::ProtoError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur while driving a [`Connection`](crate::Connection).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A frame's plaintext was too short to hold a packet header, or a
    /// packet header's own fields (seed, node id) were malformed.
    #[error(transparent)]
    InvalidPacketLength(ProtoError),

    /// A packet declared a payload length that overruns either the
    /// frame it was decoded from or the frame it would be encoded into.
    #[error(transparent)]
    InvalidPayloadLength(ProtoError),

    /// AEAD authentication failed, or the handshake's MAC/replay check
    /// failed.
    #[error(transparent)]
    AeadFailure(#[from] CryptoError),

    /// A write to the carrier completed with fewer bytes than requested.
    #[error("short write: wrote {wrote} of {requested} bytes")]
    ShortWrite {
        /// Bytes actually written.
        wrote: usize,
        /// Bytes the caller asked to write.
        requested: usize,
    },

    /// The carrier returned an I/O error.
    #[error("carrier I/O error: {0}")]
    CarrierIo(#[source] io::Error),

    /// The operation is not valid in the connection's current state
    /// (e.g. `read`/`write` before the handshake has completed, or any
    /// operation after the connection has entered [`ConnectionState::Broken`]).
    #[error("invalid operation {operation} in state {state:?}")]
    InvalidState {
        /// State the connection was in when the operation was attempted.
        state: ConnectionState,
        /// Name of the attempted operation.
        operation: &'static str,
    },
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        Self::CarrierIo(err)
    }
}

impl From<ProtoError> for ConnectionError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::InvalidPayloadLength { .. } => Self::InvalidPayloadLength(err),
            ProtoError::InvalidLength { .. } | ProtoError::PacketTruncated { .. } => {
                Self::InvalidPacketLength(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_io_wraps_the_source_error() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof mid-frame");
        let err: ConnectionError = io_err.into();
        assert!(matches!(err, ConnectionError::CarrierIo(_)));
    }

    #[test]
    fn invalid_state_reports_state_and_operation() {
        let err =
            ConnectionError::InvalidState { state: ConnectionState::New, operation: "read" };
        assert_eq!(err.to_string(), "invalid operation read in state New");
    }

    #[test]
    fn payload_length_and_packet_length_proto_errors_stay_distinct() {
        let overrun = ProtoError::InvalidPayloadLength { length: 2000, max: 1445 };
        let truncated = ProtoError::PacketTruncated { expected: 3, actual: 2 };

        assert!(matches!(
            ConnectionError::from(overrun),
            ConnectionError::InvalidPayloadLength(_)
        ));
        assert!(matches!(
            ConnectionError::from(truncated),
            ConnectionError::InvalidPacketLength(_)
        ));
    }
}
