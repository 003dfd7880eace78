//! Version-specific session setup: legacy SRP verification and plain SDP for
//! AirPlay 1, HAP Pair-Verify and plist `SETUP` exchanges for AirPlay 2.

use crate::error::AirPlayError;
use crate::net::rtsp::RtspConnection;
use crate::protocol::crypto::HkdfSha512;
use crate::protocol::pairing::{PairVerify, PairingKeys, PairingStepResult, TransientPairing};
use crate::protocol::plist::PlistValue;
use crate::protocol::rtsp::RtspSession;
use crate::streaming::{AudioSender, StreamContext};
use crate::types::{CredentialsKind, HapCredentials};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keep-alive interval for AirPlay 1's `/feedback` ping, once the receiver
/// has shown it supports it.
pub const V1_KEEP_ALIVE_INTERVAL_SECS: u64 = 25;
/// Unconditional `/feedback` interval for AirPlay 2.
pub const V2_FEEDBACK_INTERVAL_SECS: u64 = 2;

const EVENTS_SALT: &[u8] = b"Events-Salt";
const EVENTS_WRITE_INFO: &[u8] = b"Events-Write-Encryption-Key";
const EVENTS_READ_INFO: &[u8] = b"Events-Read-Encryption-Key";

/// Outcome of a protocol adapter's `setup`: nothing beyond the mutated
/// [`StreamContext`] and the configured [`AudioSender`] is needed by the
/// scheduler, but `start_feedback` needs to know whether a caller-driven
/// keep-alive loop should run at all (AirPlay 1 gates it on a 200 response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMode {
    /// No keep-alive required.
    None,
    /// Run a periodic `/feedback` POST at the given interval (seconds).
    Periodic(u64),
}

/// Per-version session setup and audio packet framing.
pub trait StreamProtocol {
    /// Pair-Verify (or legacy SRP verify), `ANNOUNCE`/`SETUP`, and populate
    /// `context`'s remote port fields.
    ///
    /// # Errors
    ///
    /// Returns an error if pairing or RTSP negotiation fails.
    fn setup<'a>(
        &'a mut self,
        conn: &'a mut RtspConnection,
        session: &'a mut RtspSession,
        context: &'a Arc<Mutex<StreamContext>>,
        timing_port: u16,
        control_port: u16,
        password: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AirPlayError>> + Send + 'a>>;

    /// Probe (and, for AirPlay 1, conditionally enable) the keep-alive loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the feedback probe request fails outright.
    fn start_feedback<'a>(
        &'a mut self,
        conn: &'a mut RtspConnection,
        session: &'a mut RtspSession,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<FeedbackMode, AirPlayError>> + Send + 'a>>;

    /// Frame one outgoing audio packet.
    fn send_audio_packet(
        &mut self,
        first_packet: bool,
        seqno: u16,
        timestamp: u32,
        ssrc: u32,
        pcm: &[u8],
        channels: u8,
    ) -> Vec<u8>;
}

/// AirPlay 1 (legacy RAOP): SRP pin-pairing, SDP `ANNOUNCE`, ALAC-lite audio.
pub struct AirPlayV1 {
    credentials: HapCredentials,
    sender: AudioSender,
}

impl AirPlayV1 {
    #[must_use]
    pub fn new(credentials: HapCredentials) -> Self {
        Self { credentials, sender: AudioSender::alac_lite() }
    }
}

impl StreamProtocol for AirPlayV1 {
    fn setup<'a>(
        &'a mut self,
        conn: &'a mut RtspConnection,
        session: &'a mut RtspSession,
        context: &'a Arc<Mutex<StreamContext>>,
        timing_port: u16,
        control_port: u16,
        password: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AirPlayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.credentials.kind == CredentialsKind::Legacy {
                crate::protocol::pairing::legacy::verify_legacy(conn, session, &self.credentials)
                    .await?;
            }

            let sdp = {
                let ctx = context.lock().expect("stream context lock poisoned");
                build_sdp(session, &ctx)
            };
            let announce = session.announce_request(&sdp);
            conn.exchange(announce, password, false).await?;

            let transport = format!(
                "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={control_port};timing_port={timing_port}"
            );
            let request = session.setup_stream_request(&transport);
            let response = conn.exchange(request, None, false).await?;

            let header = response
                .headers
                .get("Transport")
                .ok_or_else(|| AirPlayError::RtspError {
                    message: "SETUP response missing Transport header".to_string(),
                    status_code: None,
                })?;
            let options = parse_transport_options(header);

            let server_port = parse_port(&options, "server_port")?;
            let control_port = parse_port(&options, "control_port")?;
            let timing_port = options.get("timing_port").and_then(|v| v.parse().ok()).unwrap_or(0);
            let session_id = response.session().map(str::to_string);

            let mut ctx = context.lock().expect("stream context lock poisoned");
            ctx.server_port = server_port;
            ctx.control_port = control_port;
            ctx.timing_port = timing_port;
            ctx.session = session_id;

            Ok(())
        })
    }

    fn start_feedback<'a>(
        &'a mut self,
        conn: &'a mut RtspConnection,
        session: &'a mut RtspSession,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<FeedbackMode, AirPlayError>> + Send + 'a>> {
        Box::pin(async move {
            let request = session.feedback_request();
            let response = conn.exchange(request, None, true).await?;
            if response.is_success() {
                Ok(FeedbackMode::Periodic(V1_KEEP_ALIVE_INTERVAL_SECS))
            } else {
                tracing::debug!("keep-alive not supported, not starting task");
                Ok(FeedbackMode::None)
            }
        })
    }

    fn send_audio_packet(
        &mut self,
        first_packet: bool,
        seqno: u16,
        timestamp: u32,
        ssrc: u32,
        pcm: &[u8],
        channels: u8,
    ) -> Vec<u8> {
        self.sender.build_packet(0x60, first_packet, seqno, timestamp, ssrc, pcm, channels)
    }
}

/// AirPlay 2: HAP Pair-Verify, plist `SETUP` exchanges, raw PCM audio with
/// optional `ChaCha20-Poly1305` encryption.
pub struct AirPlayV2 {
    credentials: HapCredentials,
    sender: AudioSender,
}

impl AirPlayV2 {
    #[must_use]
    pub fn new(credentials: HapCredentials) -> Self {
        Self { credentials, sender: AudioSender::raw(None) }
    }
}

impl StreamProtocol for AirPlayV2 {
    fn setup<'a>(
        &'a mut self,
        conn: &'a mut RtspConnection,
        session: &'a mut RtspSession,
        context: &'a Arc<Mutex<StreamContext>>,
        timing_port: u16,
        control_port: u16,
        _password: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AirPlayError>> + Send + 'a>> {
        Box::pin(async move {
            let session_keys = pair_verify(conn, session, &self.credentials).await?;

            let device_id = "AA:BB:CC:DD:EE:FF";
            let session_uuid = random_uuid_string();
            let mut body = HashMap::new();
            body.insert("deviceID".to_string(), PlistValue::String(device_id.to_string()));
            body.insert("sessionUUID".to_string(), PlistValue::String(session_uuid));
            body.insert("timingPort".to_string(), PlistValue::Integer(i64::from(timing_port)));
            body.insert("timingProtocol".to_string(), PlistValue::String("NTP".to_string()));
            body.insert("isMultiSelectAirPlay".to_string(), PlistValue::Boolean(true));
            body.insert("groupContainsGroupLeader".to_string(), PlistValue::Boolean(false));
            body.insert("macAddress".to_string(), PlistValue::String(device_id.to_string()));
            body.insert("model".to_string(), PlistValue::String("iPhone14,3".to_string()));
            body.insert("name".to_string(), PlistValue::String("airplay-stream".to_string()));
            body.insert("osBuildVersion".to_string(), PlistValue::String("20F66".to_string()));
            body.insert("osName".to_string(), PlistValue::String("iPhone OS".to_string()));
            body.insert("osVersion".to_string(), PlistValue::String("16.5".to_string()));
            body.insert("senderSupportsRelay".to_string(), PlistValue::Boolean(false));
            body.insert("sourceVersion".to_string(), PlistValue::String("690.7.1".to_string()));
            body.insert("statsCollectionEnabled".to_string(), PlistValue::Boolean(false));

            let request = session.setup_session_request(&PlistValue::Dictionary(body), None);
            let response = conn.exchange(request, None, false).await?;
            let reply = response.body_as_plist().map_err(|e| AirPlayError::RtspError { message: format!("malformed plist SETUP response: {e}"), status_code: None })?;

            let _event_port = dict_get(&reply, "eventPort").and_then(PlistValue::as_i64).unwrap_or(0);

            // Event channel keys are derived but the event channel itself is a
            // best-effort side connection: a receiver that never opens it must
            // not block the audio stream setup that follows.
            let hkdf = HkdfSha512::new(Some(EVENTS_SALT), &session_keys.raw_shared_secret);
            let event_write_key = hkdf
                .expand_fixed::<32>(EVENTS_WRITE_INFO)
                .map_err(AirPlayError::from)?;
            let _event_read_key = hkdf
                .expand_fixed::<32>(EVENTS_READ_INFO)
                .map_err(AirPlayError::from)?;
            let shared_key = event_write_key;

            let mut stream = HashMap::new();
            stream.insert("audioFormat".to_string(), PlistValue::Integer(0x800));
            stream.insert("audioMode".to_string(), PlistValue::String("default".to_string()));
            stream.insert("controlPort".to_string(), PlistValue::Integer(i64::from(control_port)));
            stream.insert("ct".to_string(), PlistValue::Integer(1));
            stream.insert("isMedia".to_string(), PlistValue::Boolean(true));
            stream.insert("latencyMax".to_string(), PlistValue::Integer(88200));
            stream.insert("latencyMin".to_string(), PlistValue::Integer(11025));
            stream.insert("shk".to_string(), PlistValue::Data(shared_key.to_vec()));
            stream.insert("spf".to_string(), PlistValue::Integer(352));
            stream.insert("sr".to_string(), PlistValue::Integer(44100));
            stream.insert("type".to_string(), PlistValue::Integer(0x60));
            stream.insert("supportsDynamicStreamID".to_string(), PlistValue::Boolean(false));
            stream.insert(
                "streamConnectionID".to_string(),
                PlistValue::String(session.client_session_id().to_string()),
            );

            let mut streams_body = HashMap::new();
            streams_body.insert("streams".to_string(), PlistValue::Array(vec![PlistValue::Dictionary(stream)]));

            let request = session.setup_session_request(&PlistValue::Dictionary(streams_body), None);
            let response = conn.exchange(request, None, false).await?;
            let reply = response.body_as_plist().map_err(|e| AirPlayError::RtspError { message: format!("malformed plist SETUP response: {e}"), status_code: None })?;

            let streams = dict_get(&reply, "streams").and_then(PlistValue::as_array).ok_or_else(|| {
                AirPlayError::RtspError { message: "SETUP response missing streams array".to_string(), status_code: None }
            })?;
            let stream = streams.first().ok_or_else(|| AirPlayError::RtspError {
                message: "SETUP response streams array is empty".to_string(),
                status_code: None,
            })?;

            let remote_control_port = dict_get(stream, "controlPort").and_then(PlistValue::as_i64).unwrap_or(0) as u16;
            let server_port = dict_get(stream, "dataPort").and_then(PlistValue::as_i64).unwrap_or(0) as u16;
            let session_id = response.session().map(str::to_string);

            let mut ctx = context.lock().expect("stream context lock poisoned");
            ctx.control_port = remote_control_port;
            ctx.server_port = server_port;
            ctx.session = session_id;
            drop(ctx);

            self.sender = AudioSender::raw(Some(&shared_key));
            Ok(())
        })
    }

    fn start_feedback<'a>(
        &'a mut self,
        _conn: &'a mut RtspConnection,
        _session: &'a mut RtspSession,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<FeedbackMode, AirPlayError>> + Send + 'a>> {
        Box::pin(async move { Ok(FeedbackMode::Periodic(V2_FEEDBACK_INTERVAL_SECS)) })
    }

    fn send_audio_packet(
        &mut self,
        first_packet: bool,
        seqno: u16,
        timestamp: u32,
        ssrc: u32,
        pcm: &[u8],
        channels: u8,
    ) -> Vec<u8> {
        self.sender.build_packet(0x80, first_packet, seqno, timestamp, ssrc, pcm, channels)
    }
}

/// Sum type wrapping the two protocol implementations, avoiding a trait
/// object where the concrete set is closed.
pub enum StreamProtocolKind {
    /// AirPlay 1 (legacy RAOP).
    V1(AirPlayV1),
    /// AirPlay 2 (HAP-based).
    V2(AirPlayV2),
}

impl StreamProtocolKind {
    /// Select a protocol implementation from the receiver's pairing
    /// credentials kind.
    #[must_use]
    pub fn for_credentials(credentials: HapCredentials) -> Self {
        match credentials.kind {
            CredentialsKind::Legacy => Self::V1(AirPlayV1::new(credentials)),
            CredentialsKind::Null | CredentialsKind::Hap | CredentialsKind::Transient => {
                Self::V2(AirPlayV2::new(credentials))
            }
        }
    }

    pub async fn setup(
        &mut self,
        conn: &mut RtspConnection,
        session: &mut RtspSession,
        context: &Arc<Mutex<StreamContext>>,
        timing_port: u16,
        control_port: u16,
        password: Option<&str>,
    ) -> Result<(), AirPlayError> {
        match self {
            Self::V1(v) => v.setup(conn, session, context, timing_port, control_port, password).await,
            Self::V2(v) => v.setup(conn, session, context, timing_port, control_port, password).await,
        }
    }

    pub async fn start_feedback(
        &mut self,
        conn: &mut RtspConnection,
        session: &mut RtspSession,
    ) -> Result<FeedbackMode, AirPlayError> {
        match self {
            Self::V1(v) => v.start_feedback(conn, session).await,
            Self::V2(v) => v.start_feedback(conn, session).await,
        }
    }

    #[must_use]
    pub fn send_audio_packet(
        &mut self,
        first_packet: bool,
        seqno: u16,
        timestamp: u32,
        ssrc: u32,
        pcm: &[u8],
        channels: u8,
    ) -> Vec<u8> {
        match self {
            Self::V1(v) => v.send_audio_packet(first_packet, seqno, timestamp, ssrc, pcm, channels),
            Self::V2(v) => v.send_audio_packet(first_packet, seqno, timestamp, ssrc, pcm, channels),
        }
    }
}

/// Drive a HAP Pair-Verify (full or transient, depending on `credentials`)
/// over `conn`'s `/pair-verify` endpoint.
async fn pair_verify(
    conn: &mut RtspConnection,
    session: &mut RtspSession,
    credentials: &HapCredentials,
) -> Result<crate::protocol::pairing::SessionKeys, AirPlayError> {
    if credentials.kind == CredentialsKind::Transient || credentials.long_term_public_key.is_empty() {
        let mut verifier = TransientPairing::new()?;
        return drive_pairing(conn, session, |data| verifier.step(data)).await;
    }

    let our_keys = PairingKeys {
        identifier: credentials.client_id.clone(),
        secret_key: to_array32(&credentials.long_term_secret)?,
        public_key: to_array32(&credentials.long_term_public_key)?,
        device_public_key: to_array32(&credentials.receiver_id)?,
    };
    let mut verifier = PairVerify::new(our_keys, &credentials.receiver_id)?;
    drive_pairing(conn, session, |data| verifier.step(data)).await
}

/// Generic driver for any sans-IO pairing state machine's
/// `step(Option<&[u8]>)` interface over `/pair-verify` POST exchanges.
async fn drive_pairing<F>(
    conn: &mut RtspConnection,
    session: &mut RtspSession,
    mut step: F,
) -> Result<crate::protocol::pairing::SessionKeys, AirPlayError>
where
    F: FnMut(Option<&[u8]>) -> Result<PairingStepResult, crate::protocol::pairing::PairingError>,
{
    let mut incoming: Option<Vec<u8>> = None;
    loop {
        match step(incoming.as_deref())? {
            PairingStepResult::SendData(bytes) => {
                let request = session.post_request("/pair-verify", "application/octet-stream", bytes);
                let response = conn.exchange(request, None, false).await?;
                incoming = Some(response.body);
            }
            PairingStepResult::Complete(keys) => return Ok(keys),
            PairingStepResult::NeedData => {
                return Err(AirPlayError::AuthenticationFailed {
                    message: "pair-verify ended without producing session keys".to_string(),
                    recoverable: false,
                });
            }
            PairingStepResult::Failed(err) => return Err(err.into()),
        }
    }
}

fn to_array32(bytes: &[u8]) -> Result<[u8; 32], AirPlayError> {
    bytes.try_into().map_err(|_| AirPlayError::AuthenticationFailed {
        message: format!("expected 32-byte key material, got {} bytes", bytes.len()),
        recoverable: false,
    })
}

fn build_sdp(session: &RtspSession, context: &StreamContext) -> String {
    let bits_per_channel = 8 * u32::from(context.bytes_per_channel);
    format!(
        "v=0\r\n\
         o=iTunes {session_id} 0 IN IP4 0.0.0.0\r\n\
         s=iTunes\r\n\
         c=IN IP4 0.0.0.0\r\n\
         t=0 0\r\n\
         m=audio 0 RTP/AVP 96\r\n\
         a=rtpmap:96 AppleLossless\r\n\
         a=fmtp:96 352 0 {bits_per_channel} 40 10 14 {channels} 255 0 0 {sample_rate}\r\n",
        session_id = session.client_session_id(),
        channels = context.channels,
        sample_rate = context.sample_rate,
    )
}

fn parse_transport_options(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse_port(options: &HashMap<String, String>, key: &str) -> Result<u16, AirPlayError> {
    options
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AirPlayError::RtspError {
            message: format!("Transport header missing or invalid {key}"),
            status_code: None,
        })
}

fn dict_get<'a>(value: &'a PlistValue, key: &str) -> Option<&'a PlistValue> {
    value.as_dict().and_then(|map| map.get(key))
}

fn random_uuid_string() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}
