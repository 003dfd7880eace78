//! Error types for `AirPlay` streaming operations.

/// Main error type for `AirPlay` operations.
#[derive(Debug, thiserror::Error)]
pub enum AirPlayError {
    /// SRP proof mismatch, 401/403 RTSP, tag/MAC mismatch, or bad credentials length.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Human-readable description.
        message: String,
        /// Whether the caller may retry (e.g. a fresh pairing attempt).
        recoverable: bool,
    },

    /// Malformed packet, unexpected RTSP status, CSeq timeout, or invalid TXT audio properties.
    #[error("RTSP error: {message}")]
    RtspError {
        /// Human-readable description.
        message: String,
        /// RTSP status code, when the error originated from a response.
        status_code: Option<u16>,
    },

    /// A fixed-field packet failed to decode.
    #[error(transparent)]
    PacketDecode(#[from] crate::protocol::rtp::RtpDecodeError),

    /// SRP/HKDF/AEAD primitive failure underlying a pairing step.
    #[error(transparent)]
    Crypto(#[from] crate::protocol::crypto::CryptoError),

    /// Pair-Setup/Pair-Verify handshake failure.
    #[error(transparent)]
    Pairing(#[from] crate::protocol::pairing::PairingError),

    /// Requested operation unavailable on this channel (e.g. encryption keys
    /// requested from the legacy Pair-Verify procedure).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// API misuse: operation attempted from the wrong session/stream state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Receiver returned an error body during playback, or retries were
    /// exhausted waking a sleeping receiver.
    #[error("playback error: {0}")]
    Playback(String),

    /// TCP reset or UDP host-unreachable.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AirPlayError>();
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: AirPlayError = io_err.into();
        assert!(matches!(err, AirPlayError::Io(_)));
    }
}
