//! Top-level facade tying device, config, and the streaming scheduler together.

use crate::streaming::{AudioSource, StreamClient};
use crate::types::Metadata;
use crate::{AirPlayConfig, AirPlayDevice, AirPlayError};

/// Entry point for streaming audio to a single receiver.
///
/// Owns the paced [`StreamClient`] scheduler; connecting performs
/// Pair-Verify, `ANNOUNCE`, and `SETUP` against the receiver's RTSP port.
pub struct AirPlayClient {
    stream: StreamClient,
}

impl AirPlayClient {
    /// Connect to an `AirPlay` receiver and complete pairing/session setup.
    ///
    /// # Errors
    ///
    /// Returns an error if pairing, verification, or RTSP session setup
    /// fails.
    pub async fn connect(device: &AirPlayDevice, config: AirPlayConfig) -> Result<Self, AirPlayError> {
        let stream = StreamClient::initialize(device, config).await?;
        Ok(Self { stream })
    }

    /// Stream audio from `source` until exhausted (plus latency padding).
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver rejects a request during setup or
    /// the connection is lost mid-stream.
    pub async fn send_audio(
        &mut self,
        source: &mut dyn AudioSource,
        metadata: Option<&Metadata>,
        volume: Option<f32>,
    ) -> Result<(), AirPlayError> {
        self.stream.send_audio(source, metadata, volume).await
    }
}
