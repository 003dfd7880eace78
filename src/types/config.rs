use super::credentials::HapCredentials;
use std::time::Duration;

/// Configuration recognized by the core streaming pipeline.
///
/// Audio parameters default to CD quality and are overridden by the
/// receiver's TXT record during `initialize` when not explicitly set.
#[derive(Debug, Clone)]
pub struct AirPlayConfig {
    /// Sample rate in Hz (default 44100).
    pub sample_rate: u32,

    /// Channel count (default 2).
    pub channels: u8,

    /// Bytes per channel sample, derived from the TXT record's `ss` (bits)
    /// field divided by 8 when discovered; default 2.
    pub bytes_per_channel: u8,

    /// Password enabling RTSP digest auth on an `ANNOUNCE` 401 challenge.
    pub password: Option<String>,

    /// Pairing credentials selecting the Pair-Verify family; `None` behaves
    /// as `HapCredentials::no_credentials()`.
    pub credentials: Option<HapCredentials>,

    /// Local control-channel UDP bind port; 0 = ephemeral.
    pub control_port: u16,

    /// Local timing-channel UDP bind port; 0 = ephemeral.
    pub timing_port: u16,

    /// Timeout for an RTSP request/response exchange (default 4 seconds).
    pub rtsp_timeout: Duration,

    /// Connection establishment timeout (default 10 seconds).
    pub connection_timeout: Duration,

    /// Enable debug logging of protocol messages.
    pub debug_protocol: bool,
}

impl Default for AirPlayConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bytes_per_channel: 2,
            password: None,
            credentials: None,
            control_port: 0,
            timing_port: 0,
            rtsp_timeout: Duration::from_secs(4),
            connection_timeout: Duration::from_secs(10),
            debug_protocol: false,
        }
    }
}

impl AirPlayConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> AirPlayConfigBuilder {
        AirPlayConfigBuilder::default()
    }

    /// Bytes per PCM frame (all channels for one sample).
    #[must_use]
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_channel)
    }
}

/// Builder for `AirPlayConfig`.
#[derive(Debug, Clone, Default)]
pub struct AirPlayConfigBuilder {
    config: AirPlayConfig,
}

impl AirPlayConfigBuilder {
    /// Set the sample rate in Hz.
    #[must_use]
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Set the channel count.
    #[must_use]
    pub fn channels(mut self, channels: u8) -> Self {
        self.config.channels = channels;
        self
    }

    /// Set bytes per channel sample.
    #[must_use]
    pub fn bytes_per_channel(mut self, bytes: u8) -> Self {
        self.config.bytes_per_channel = bytes;
        self
    }

    /// Set the digest-auth password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set pairing credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: HapCredentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Set the local control-channel bind port.
    #[must_use]
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.control_port = port;
        self
    }

    /// Set the local timing-channel bind port.
    #[must_use]
    pub fn timing_port(mut self, port: u16) -> Self {
        self.config.timing_port = port;
        self
    }

    /// Set the RTSP exchange timeout.
    #[must_use]
    pub fn rtsp_timeout(mut self, timeout: Duration) -> Self {
        self.config.rtsp_timeout = timeout;
        self
    }

    /// Set the connection establishment timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Enable protocol debug logging.
    #[must_use]
    pub fn debug_protocol(mut self, enable: bool) -> Self {
        self.config.debug_protocol = enable;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> AirPlayConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cd_quality() {
        let config = AirPlayConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.bytes_per_channel, 2);
        assert_eq!(config.frame_size(), 4);
        assert_eq!(config.rtsp_timeout, Duration::from_secs(4));
    }

    #[test]
    fn builder_overrides_fields() {
        let config = AirPlayConfig::builder()
            .sample_rate(48000)
            .channels(1)
            .password("secret")
            .build();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.password.as_deref(), Some("secret"));
    }
}
