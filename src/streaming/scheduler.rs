//! The paced real-time sender: owns the RTSP session, the UDP sidechannels,
//! and the send loop that keeps packet emission in lockstep with wall-clock
//! time.

use crate::error::AirPlayError;
use crate::net::rtsp::RtspConnection;
use crate::protocol::daap::{Artwork, DmapProgress, TrackMetadata};
use crate::protocol::pairing::AuthSetup;
use crate::protocol::rtsp::RtspSession;
use crate::streaming::context::FRAMES_PER_PACKET;
use crate::streaming::protocol_adapter::FeedbackMode;
use crate::streaming::{AudioSource, ControlEndpoint, PacketFifo, StreamContext, StreamProtocolKind, StreamStats, TimingEndpoint};
use crate::types::{AirPlayConfig, AirPlayDevice, HapCredentials, Metadata};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

/// Receiver supports unencrypted MFi-SAP authentication.
const ENCRYPTION_MFISAP: u32 = 1 << 3;
/// Receiver accepts DMAP text metadata.
const METADATA_TEXT: u32 = 1 << 0;
/// Receiver accepts album artwork.
const METADATA_ARTWORK: u32 = 1 << 1;
/// Receiver accepts playback progress updates.
const METADATA_PROGRESS: u32 = 1 << 2;
/// Cap on extra packets sent in one catch-up burst when behind schedule.
const MAX_PACKETS_COMPENSATE: u32 = 3;

/// Owns a single receiver's session and drives real-time audio delivery.
///
/// Built by [`initialize`](StreamClient::initialize); [`send_audio`](StreamClient::send_audio)
/// streams one source to completion (plus latency padding) and may be called
/// again on the same instance for a subsequent track.
pub struct StreamClient {
    conn: RtspConnection,
    session: RtspSession,
    device_address: IpAddr,
    password: Option<String>,
    context: Arc<Mutex<StreamContext>>,
    backlog: Arc<Mutex<PacketFifo>>,
    protocol: StreamProtocolKind,
    local_control_port: u16,
    local_timing_port: u16,
    metadata_types: u32,
    ssrc: u32,
}

impl StreamClient {
    /// Connect to `device`, complete pairing/verification, and negotiate an
    /// RTSP session: `GET /info`, optional `/auth-setup`, then `ANNOUNCE`
    /// and `SETUP` via the version-appropriate [`StreamProtocolKind`].
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection, pairing, or RTSP negotiation
    /// fails.
    pub async fn initialize(device: &AirPlayDevice, config: AirPlayConfig) -> Result<Self, AirPlayError> {
        let mut conn = RtspConnection::connect((device.address, device.port)).await?;
        let mut session = RtspSession::new(&device.address.to_string(), device.port);

        let credentials = config.credentials.clone().unwrap_or_else(HapCredentials::no_credentials);
        let mut protocol = StreamProtocolKind::for_credentials(credentials);

        let bind_addr = unspecified_addr(device.address);
        let local_control_port = if config.control_port != 0 {
            config.control_port
        } else {
            ControlEndpoint::reserve_port(bind_addr).await?
        };
        let local_timing_port = if config.timing_port != 0 {
            config.timing_port
        } else {
            TimingEndpoint::reserve_port(bind_addr).await?
        };

        let info_request = session.info_request();
        conn.exchange(info_request, config.password.as_deref(), true).await?;

        let encryption_types = parse_encryption_types(&device.txt_records);
        let metadata_types = parse_metadata_types(&device.txt_records);

        // At least for AirPort Express, skipping this leaves some receivers
        // silently refusing to play audio later.
        if encryption_types & ENCRYPTION_MFISAP != 0 && device.is_airport() {
            let auth = AuthSetup::new();
            let request = session.post_request("/auth-setup", "application/octet-stream", auth.start());
            conn.exchange(request, config.password.as_deref(), true).await?;
        }

        let mut initial_context = StreamContext::new();
        initial_context.sample_rate =
            device.txt_records.get("sr").and_then(|v| v.parse().ok()).unwrap_or(config.sample_rate);
        initial_context.channels =
            device.txt_records.get("ch").and_then(|v| v.parse().ok()).unwrap_or(config.channels);
        initial_context.bytes_per_channel = device
            .txt_records
            .get("ss")
            .and_then(|v| v.parse::<u32>().ok())
            .map(|bits| (bits / 8) as u8)
            .unwrap_or(config.bytes_per_channel);
        let context = Arc::new(Mutex::new(initial_context));

        protocol
            .setup(&mut conn, &mut session, &context, local_timing_port, local_control_port, config.password.as_deref())
            .await?;

        Ok(Self {
            conn,
            session,
            device_address: device.address,
            password: config.password,
            context,
            backlog: Arc::new(Mutex::new(PacketFifo::new())),
            protocol,
            local_control_port,
            local_timing_port,
            metadata_types,
            ssrc: rand::random(),
        })
    }

    /// Stream `source` to the receiver until exhausted, then pad with
    /// silence until the receiver's buffer has drained, and tear down the
    /// session. Cleans up the backlog and sidechannels even if streaming
    /// fails partway through.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver rejects a setup request during
    /// streaming or the connection is lost mid-stream.
    pub async fn send_audio(
        &mut self,
        source: &mut dyn AudioSource,
        metadata: Option<&Metadata>,
        volume: Option<f32>,
    ) -> Result<(), AirPlayError> {
        {
            let mut ctx = self.context.lock().expect("stream context lock poisoned");
            ctx.reset();
        }

        let (server_port, remote_control_port, remote_timing_port) = {
            let ctx = self.context.lock().expect("stream context lock poisoned");
            (ctx.server_port, ctx.control_port, ctx.timing_port)
        };

        let bind_addr = unspecified_addr(self.device_address);
        let audio_socket = UdpSocket::bind((bind_addr, 0)).await?;
        audio_socket.connect((self.device_address, server_port)).await?;

        let control = if remote_control_port != 0 {
            Some(
                ControlEndpoint::start(
                    bind_addr,
                    self.local_control_port,
                    SocketAddr::new(self.device_address, remote_control_port),
                    self.context.clone(),
                    self.backlog.clone(),
                )
                .await?,
            )
        } else {
            None
        };
        let timing = if remote_timing_port != 0 {
            Some(TimingEndpoint::start(bind_addr, self.local_timing_port, SocketAddr::new(self.device_address, remote_timing_port)).await?)
        } else {
            None
        };

        let result = self.run_stream(source, metadata, volume, &audio_socket).await;

        self.backlog.lock().expect("packet backlog lock poisoned").clear();
        drop(control);
        drop(timing);
        let teardown = self.session.teardown_request();
        let _ = self.conn.exchange(teardown, self.password.as_deref(), true).await;

        result
    }

    async fn run_stream(
        &mut self,
        source: &mut dyn AudioSource,
        metadata: Option<&Metadata>,
        volume: Option<f32>,
        audio_socket: &UdpSocket,
    ) -> Result<(), AirPlayError> {
        let (rtp_seq, rtptime, sample_rate) = {
            let ctx = self.context.lock().expect("stream context lock poisoned");
            (ctx.rtp_seq, ctx.rtptime(), ctx.sample_rate)
        };

        if self.metadata_types & METADATA_PROGRESS != 0 {
            if let Some(duration_secs) = metadata.and_then(|m| m.duration_secs) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let end = rtptime.wrapping_add((duration_secs * f64::from(sample_rate)) as u32);
                let progress = DmapProgress::new(rtptime, rtptime, end);
                let request = self.session.set_parameter_request("text/parameters", progress.encode().into_bytes());
                self.conn.exchange(request, self.password.as_deref(), true).await?;
            }
        }

        if self.metadata_types & METADATA_TEXT != 0 {
            if let Some(meta) = metadata {
                let track = TrackMetadata::builder().title(meta.title.clone()).artist(meta.artist.clone()).album(meta.album.clone()).build();
                let request = self.session.set_parameter_request("application/x-dmap-tagged", track.encode_dmap());
                self.conn.exchange(request, self.password.as_deref(), true).await?;
            }
        }

        if self.metadata_types & METADATA_ARTWORK != 0 {
            if let Some(bytes) = metadata.and_then(|m| m.artwork.clone()) {
                if let Some(artwork) = Artwork::from_data(bytes) {
                    let mime_type = artwork.mime_type();
                    let mut request = self.session.set_parameter_request(mime_type, artwork.data);
                    request.headers.insert("RTP-Info", format!("seq={rtp_seq};rtptime={rtptime}"));
                    self.conn.exchange(request, self.password.as_deref(), true).await?;
                }
            }
        }

        let feedback_mode = self.protocol.start_feedback(&mut self.conn, &mut self.session).await?;
        let feedback_interval = match feedback_mode {
            FeedbackMode::Periodic(secs) => Some(Duration::from_secs(secs)),
            FeedbackMode::None => None,
        };
        let mut last_feedback = Instant::now();

        let record = self.session.record_request(rtp_seq, rtptime);
        self.conn.exchange(record, self.password.as_deref(), false).await?;

        if let Some(volume) = volume {
            let request = self.session.set_parameter_request("text/parameters", format!("volume: {volume}\r\n").into_bytes());
            self.conn.exchange(request, self.password.as_deref(), true).await?;
        }

        self.stream_data(source, audio_socket, sample_rate, feedback_interval, &mut last_feedback).await
    }

    async fn stream_data(
        &mut self,
        source: &mut dyn AudioSource,
        audio_socket: &UdpSocket,
        sample_rate: u32,
        feedback_interval: Option<Duration>,
        last_feedback: &mut Instant,
    ) -> Result<(), AirPlayError> {
        let mut stats = StreamStats::new();
        let mut consecutive_late: u32 = 0;

        loop {
            let first_packet = stats.total_frames == 0;
            let sent = self.send_packet(source, first_packet, audio_socket).await?;
            if sent == 0 {
                break;
            }
            stats.record(u64::from(sent));

            let expected = stats.expected_frame_count(sample_rate);
            let frames_behind = expected.saturating_sub(stats.total_frames);
            if frames_behind >= u64::from(FRAMES_PER_PACKET) {
                let max_packets = (frames_behind / u64::from(FRAMES_PER_PACKET)).min(u64::from(MAX_PACKETS_COMPENSATE));
                #[allow(clippy::cast_possible_truncation)]
                let (extra_sent, has_more) = self.send_number_of_packets(source, audio_socket, max_packets as u32).await?;
                stats.record(u64::from(extra_sent));
                if !has_more {
                    break;
                }
            }

            if stats.interval_completed(sample_rate) {
                tracing::debug!(total_frames = stats.total_frames, "completed a one-second audio interval");
                stats.reset_interval();
            }

            if let Some(interval) = feedback_interval {
                if last_feedback.elapsed() >= interval {
                    let request = self.session.feedback_request();
                    let _ = self.conn.exchange(request, self.password.as_deref(), true).await;
                    *last_feedback = Instant::now();
                }
            }

            #[allow(clippy::cast_precision_loss)]
            let abs_time_stream = stats.total_frames as f64 / f64::from(sample_rate);
            let rel_to_start = stats.start_time.elapsed().as_secs_f64();
            let diff = abs_time_stream - rel_to_start;
            if diff > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(diff)).await;
                consecutive_late = 0;
            } else {
                consecutive_late += 1;
                if consecutive_late <= 5 {
                    tracing::debug!(abs_time_stream, rel_to_start, consecutive_late, "too slow to keep up");
                } else {
                    tracing::warn!(abs_time_stream, rel_to_start, consecutive_late, "too slow to keep up");
                }
            }
        }

        Ok(())
    }

    /// Send one packet's worth of audio, padding with silence once `source`
    /// is exhausted; returns 0 once latency-worth of padding has been sent,
    /// ending the stream.
    async fn send_packet(&mut self, source: &mut dyn AudioSource, first_packet: bool, audio_socket: &UdpSocket) -> Result<u32, AirPlayError> {
        let (packet_size, seqno, timestamp, channels, padding_sent, latency) = {
            let ctx = self.context.lock().expect("stream context lock poisoned");
            (ctx.packet_size(), ctx.rtp_seq, ctx.rtptime(), ctx.channels, ctx.padding_sent, ctx.latency())
        };
        if padding_sent >= latency {
            return Ok(0);
        }

        let mut buf = vec![0u8; packet_size];
        let read = source.read(&mut buf).map_err(|e| AirPlayError::Playback(e.to_string()))?;
        if read == 0 {
            buf.fill(0);
            let mut ctx = self.context.lock().expect("stream context lock poisoned");
            ctx.padding_sent += FRAMES_PER_PACKET;
        } else if read < packet_size {
            buf[read..].fill(0);
        }

        let packet = self.protocol.send_audio_packet(first_packet, seqno, timestamp, self.ssrc, &buf, channels);

        {
            let mut backlog = self.backlog.lock().expect("packet backlog lock poisoned");
            let _ = backlog.insert(seqno, packet.clone());
        }

        if let Err(err) = audio_socket.send(&packet).await {
            tracing::warn!(error = %err, "failed to send audio packet");
        }

        {
            let mut ctx = self.context.lock().expect("stream context lock poisoned");
            ctx.advance(FRAMES_PER_PACKET);
        }

        Ok(FRAMES_PER_PACKET)
    }

    /// Send up to `count` additional packets to catch up to real time.
    /// Returns the total frames sent and whether the source still has more
    /// audio left (`false` once padding begins).
    async fn send_number_of_packets(&mut self, source: &mut dyn AudioSource, audio_socket: &UdpSocket, count: u32) -> Result<(u32, bool), AirPlayError> {
        let mut total = 0;
        for _ in 0..count {
            let sent = self.send_packet(source, false, audio_socket).await?;
            total += sent;
            if sent == 0 {
                return Ok((total, false));
            }
        }
        Ok((total, true))
    }
}

fn unspecified_addr(remote: IpAddr) -> IpAddr {
    match remote {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// Parse the `et=0,1,3` TXT field into a bitmask: `0`=unencrypted (bit 0),
/// `1`=RSA (bit 1), `3`=`FairPlay` (bit 2), `4`=MFi-SAP (bit 3), `5`=`FairPlay`
/// SAPv2.5 (bit 4). Unknown codes and a missing field contribute nothing.
fn parse_encryption_types(txt: &HashMap<String, String>) -> u32 {
    let Some(et) = txt.get("et") else { return 0 };
    et.split(',').filter_map(|s| s.trim().parse::<i64>().ok()).fold(0, |acc, code| {
        acc | match code {
            0 => 1 << 0,
            1 => 1 << 1,
            3 => 1 << 2,
            4 => ENCRYPTION_MFISAP,
            5 => 1 << 4,
            _ => 0,
        }
    })
}

/// Parse the `md=0,1,2` TXT field into a bitmask: `0`=text (bit 0),
/// `1`=artwork (bit 1), `2`=progress (bit 2).
fn parse_metadata_types(txt: &HashMap<String, String>) -> u32 {
    let Some(md) = txt.get("md") else { return 0 };
    md.split(',').filter_map(|s| s.trim().parse::<i64>().ok()).fold(0, |acc, code| {
        acc | match code {
            0 => METADATA_TEXT,
            1 => METADATA_ARTWORK,
            2 => METADATA_PROGRESS,
            _ => 0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn parses_encryption_types_from_csv() {
        let flags = parse_encryption_types(&txt(&[("et", "0,4")]));
        assert_eq!(flags, 1 | ENCRYPTION_MFISAP);
    }

    #[test]
    fn missing_encryption_field_yields_zero() {
        assert_eq!(parse_encryption_types(&txt(&[])), 0);
    }

    #[test]
    fn parses_metadata_types_from_csv() {
        let flags = parse_metadata_types(&txt(&[("md", "0,1,2")]));
        assert_eq!(flags, METADATA_TEXT | METADATA_ARTWORK | METADATA_PROGRESS);
    }

    #[test]
    fn ignores_unknown_metadata_codes() {
        let flags = parse_metadata_types(&txt(&[("md", "9")]));
        assert_eq!(flags, 0);
    }

    #[test]
    fn unspecified_addr_matches_family() {
        assert_eq!(unspecified_addr("192.168.1.5".parse().unwrap()), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(unspecified_addr("::1".parse().unwrap()), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
    }
}
