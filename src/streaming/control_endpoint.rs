//! UDP control sidechannel: periodic sync packets and retransmit replies.

use crate::protocol::rtp::{ntp_to_parts, ts_to_ntp, RetransmitRequest, RtpHeader, SyncPacket};
use crate::streaming::{PacketFifo, StreamContext};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Control-channel packet type tag, marker bit cleared.
const RETRANSMIT_REQUEST_TYPE: u8 = 0x55;

/// Owns the control UDP socket: sends a sync packet every second and answers
/// retransmit requests from the backlog.
pub struct ControlEndpoint {
    local_port: u16,
    handle: JoinHandle<()>,
}

impl ControlEndpoint {
    /// Bind a control socket on `local_port` (0 for ephemeral), connect it
    /// to `dest`, and start the sync and retransmit-reply loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or connected.
    pub async fn start(
        bind_addr: IpAddr,
        local_port: u16,
        dest: SocketAddr,
        context: Arc<Mutex<StreamContext>>,
        backlog: Arc<Mutex<PacketFifo>>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_addr, local_port)).await?;
        socket.connect(dest).await?;
        let local_port = socket.local_addr()?.port();

        let handle = tokio::spawn(run(socket, context, backlog));

        Ok(Self { local_port, handle })
    }

    /// Reserve an ephemeral UDP port on `bind_addr` without starting the
    /// sync loop, so its number can be quoted in the `SETUP` request before
    /// the receiver's control port is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn reserve_port(bind_addr: IpAddr) -> std::io::Result<u16> {
        let socket = UdpSocket::bind((bind_addr, 0)).await?;
        socket.local_addr().map(|a| a.port())
    }

    /// Local UDP port the receiver should send retransmit requests to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_port
    }
}

impl Drop for ControlEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(socket: UdpSocket, context: Arc<Mutex<StreamContext>>, backlog: Arc<Mutex<PacketFifo>>) {
    let mut first_packet = true;
    let mut sync_tick = tokio::time::interval(Duration::from_secs(1));
    let mut buf = [0u8; 1500];

    loop {
        tokio::select! {
            _ = sync_tick.tick() => {
                let packet = build_sync_packet(&context, first_packet);
                first_packet = false;
                if let Err(err) = socket.send(&packet).await {
                    tracing::warn!(error = %err, "failed to send control sync packet");
                }
            }
            received = socket.recv(&mut buf) => {
                match received {
                    Ok(n) => handle_incoming(&socket, &buf[..n], &backlog).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "control socket read failed");
                        break;
                    }
                }
            }
        }
    }
}

fn build_sync_packet(context: &Mutex<StreamContext>, first_packet: bool) -> Vec<u8> {
    let ctx = context.lock().expect("stream context lock poisoned");
    let (last_sync_sec, last_sync_frac) = ntp_to_parts(ts_to_ntp(ctx.head_ts, ctx.sample_rate));
    let rtptime = ctx.rtptime();
    SyncPacket {
        header: RtpHeader {
            proto: if first_packet { 0x90 } else { 0x80 },
            kind: 0xD4,
            seqno: 0x0007,
        },
        now_without_latency: rtptime.wrapping_sub(ctx.latency()),
        last_sync_sec,
        last_sync_frac,
        now: rtptime,
    }
    .encode()
}

async fn handle_incoming(socket: &UdpSocket, data: &[u8], backlog: &Mutex<PacketFifo>) {
    if data.len() < RtpHeader::SIZE {
        return;
    }
    let marker_cleared = data[1] & 0x7F;
    if marker_cleared != RETRANSMIT_REQUEST_TYPE {
        tracing::debug!(kind = marker_cleared, "unhandled control packet");
        return;
    }

    let Ok(request) = RetransmitRequest::decode(data, true) else {
        tracing::debug!("malformed retransmit request");
        return;
    };

    for offset in 0..request.lost_packets {
        let seq = request.lost_seqno.wrapping_add(offset);
        let resend = {
            let fifo = backlog.lock().expect("packet backlog lock poisoned");
            fifo.get(seq).map(<[u8]>::to_vec)
        };
        let Some(packet) = resend else {
            tracing::debug!(seq, "retransmit request for packet not in backlog");
            continue;
        };

        let mut resp = Vec::with_capacity(packet.len() + 4);
        resp.push(0x80);
        resp.push(0xD6);
        resp.extend_from_slice(&packet[2..4]);
        resp.extend_from_slice(&packet);

        if let Err(err) = socket.send(&resp).await {
            tracing::warn!(error = %err, seq, "failed to resend retransmitted packet");
        }
    }
}
