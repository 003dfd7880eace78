//! UDP timing sidechannel: passively answers the receiver's NTP probes.

use crate::protocol::rtp::{ntp_now, ntp_to_parts, RtpHeader, TimingPacket};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Owns the timing UDP socket and answers every incoming [`TimingPacket`]
/// with the current wall-clock time.
pub struct TimingEndpoint {
    local_port: u16,
    handle: JoinHandle<()>,
}

impl TimingEndpoint {
    /// Bind a timing socket on `local_port` (0 for ephemeral), connect it
    /// to `dest`, and start responding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or connected.
    pub async fn start(bind_addr: IpAddr, local_port: u16, dest: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_addr, local_port)).await?;
        socket.connect(dest).await?;
        let local_port = socket.local_addr()?.port();

        let handle = tokio::spawn(run(socket));

        Ok(Self { local_port, handle })
    }

    /// Reserve an ephemeral UDP port on `bind_addr` without starting the
    /// reply loop, so its number can be quoted in the `SETUP` request
    /// before the receiver's timing port is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn reserve_port(bind_addr: IpAddr) -> std::io::Result<u16> {
        let socket = UdpSocket::bind((bind_addr, 0)).await?;
        socket.local_addr().map(|a| a.port())
    }

    /// Local UDP port the receiver should send timing requests to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_port
    }
}

impl Drop for TimingEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(socket: UdpSocket) {
    let mut buf = [0u8; 1500];
    loop {
        let n = match socket.recv(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "timing socket read failed");
                break;
            }
        };

        let Ok(request) = TimingPacket::decode(&buf[..n], true) else {
            tracing::debug!("malformed timing request");
            continue;
        };

        let (sec, frac) = ntp_to_parts(ntp_now());
        let reply = TimingPacket {
            header: RtpHeader {
                proto: request.header.proto,
                kind: 0x53 | 0x80,
                seqno: 7,
            },
            reftime: request.sendtime,
            recvtime: (sec, frac),
            sendtime: (sec, frac),
        }
        .encode();

        if let Err(err) = socket.send(&reply).await {
            tracing::warn!(error = %err, "failed to send timing reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_echoes_proto_and_reftime() {
        let request = TimingPacket {
            header: RtpHeader { proto: 0x12, kind: 0, seqno: 0 },
            reftime: (0, 0),
            recvtime: (0, 0),
            sendtime: (111, 222),
        };
        let (sec, frac) = (333u32, 444u32);
        let reply = TimingPacket {
            header: RtpHeader { proto: request.header.proto, kind: 0x53 | 0x80, seqno: 7 },
            reftime: request.sendtime,
            recvtime: (sec, frac),
            sendtime: (sec, frac),
        };
        assert_eq!(reply.reftime, (111, 222));
        assert_eq!(reply.recvtime, reply.sendtime);
        let bytes = reply.encode();
        assert_eq!(&bytes[0..4], &[0x12, 0xD3, 0x00, 0x07]);
    }
}
