//! Async RTSP exchange layer: owns the TCP connection and the optional HAP
//! encrypted record layer, and drives the sans-IO codec/session types in
//! `protocol::rtsp`.

use crate::error::AirPlayError;
use crate::net::secure::HapSecureSession;
use crate::protocol::rtsp::{Method, RtspCodec, RtspRequest, RtspResponse, RtspSession, headers::names};
use std::time::Duration;
use crate::net::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// How long to wait for a matching response before failing the exchange.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(4);

/// Owns the single multiplexed RTSP/1.0 TCP connection to a receiver.
pub struct RtspConnection {
    stream: TcpStream,
    codec: RtspCodec,
    secure: Option<HapSecureSession>,
    recv_buf: [u8; 4096],
}

impl RtspConnection {
    /// Connect to the receiver's RTSP port.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection cannot be established.
    pub async fn connect(addr: (std::net::IpAddr, u16)) -> Result<Self, AirPlayError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            codec: RtspCodec::new(),
            secure: None,
            recv_buf: [0u8; 4096],
        })
    }

    /// Enable the HAP encrypted record layer for all subsequent traffic,
    /// after a successful Pair-Verify.
    pub fn enable_encryption(&mut self, encrypt_key: &[u8; 32], decrypt_key: &[u8; 32]) {
        self.secure = Some(HapSecureSession::new(encrypt_key, decrypt_key));
    }

    async fn write_request(&mut self, request: &RtspRequest) -> Result<(), AirPlayError> {
        let bytes = request.encode();
        let framed = match &mut self.secure {
            Some(session) => session.encrypt(&bytes)?,
            None => bytes,
        };
        self.stream.write_all(&framed).await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<RtspResponse, AirPlayError> {
        loop {
            if let Some(response) = self.codec.decode().map_err(|e| AirPlayError::RtspError {
                message: e.to_string(),
                status_code: None,
            })? {
                return Ok(response);
            }

            let n = self.stream.read(&mut self.recv_buf).await?;
            if n == 0 {
                return Err(AirPlayError::ConnectionLost(
                    "RTSP connection closed by peer".to_string(),
                ));
            }

            let plaintext = match &mut self.secure {
                Some(session) => session.feed_decrypt(&self.recv_buf[..n])?,
                None => self.recv_buf[..n].to_vec(),
            };
            self.codec
                .feed(&plaintext)
                .map_err(|e| AirPlayError::RtspError {
                    message: e.to_string(),
                    status_code: None,
                })?;
        }
    }

    /// Send `request` and wait for its matching response, retrying with
    /// digest authentication if the receiver challenges an `ANNOUNCE` with a
    /// 401 and `password` is configured.
    ///
    /// Non-2xx responses surface as [`AirPlayError::AuthenticationFailed`]
    /// for 401/403 or [`AirPlayError::RtspError`] otherwise, unless
    /// `allow_error` is set.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, connection loss, or a non-2xx response
    /// when `allow_error` is false.
    pub async fn exchange(
        &mut self,
        request: RtspRequest,
        password: Option<&str>,
        allow_error: bool,
    ) -> Result<RtspResponse, AirPlayError> {
        let method = request.method;
        let response = self.exchange_once(request.clone()).await?;

        let response = if response.status.as_u16() == 401 && method == Method::Announce {
            if let (Some(password), Some(challenge)) =
                (password, response.headers.get(names::WWW_AUTHENTICATE))
            {
                let (realm, nonce) = parse_digest_challenge(challenge).ok_or_else(|| {
                    AirPlayError::RtspError {
                        message: "malformed WWW-Authenticate header".to_string(),
                        status_code: Some(401),
                    }
                })?;
                let retried = RtspSession::with_digest_auth(
                    request,
                    crate::protocol::rtsp::session::DIGEST_USERNAME,
                    password,
                    &realm,
                    &nonce,
                );
                self.exchange_once(retried).await?
            } else {
                response
            }
        } else {
            response
        };

        if !allow_error && !response.is_success() {
            let status = response.status.as_u16();
            return Err(if status == 401 || status == 403 {
                AirPlayError::AuthenticationFailed {
                    message: format!("{} rejected: {} {}", method.as_str(), status, response.reason),
                    recoverable: false,
                }
            } else {
                AirPlayError::RtspError {
                    message: format!("{} failed: {} {}", method.as_str(), status, response.reason),
                    status_code: Some(status),
                }
            });
        }

        Ok(response)
    }

    async fn exchange_once(&mut self, request: RtspRequest) -> Result<RtspResponse, AirPlayError> {
        self.write_request(&request).await?;
        tokio::time::timeout(EXCHANGE_TIMEOUT, self.read_response())
            .await
            .map_err(|_| AirPlayError::RtspError {
                message: format!("{} timed out waiting for CSeq response", request.method.as_str()),
                status_code: None,
            })?
    }
}

/// Parse `Digest realm="...", nonce="..."` out of a `WWW-Authenticate` value.
fn parse_digest_challenge(header: &str) -> Option<(String, String)> {
    let mut realm = None;
    let mut nonce = None;
    for part in header.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("realm=") {
            realm = Some(v.trim_matches('"').to_string());
        } else if let Some(v) = part.strip_prefix("Digest realm=") {
            realm = Some(v.trim_matches('"').to_string());
        } else if let Some(v) = part.strip_prefix("nonce=") {
            nonce = Some(v.trim_matches('"').to_string());
        }
    }
    Some((realm?, nonce?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digest_challenge() {
        let header = r#"Digest realm="airplay", nonce="abc123""#;
        let (realm, nonce) = parse_digest_challenge(header).unwrap();
        assert_eq!(realm, "airplay");
        assert_eq!(nonce, "abc123");
    }
}
