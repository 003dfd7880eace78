//! Fixed-field binary codecs for the RTP-like control/timing/audio packets.
//!
//! All fields are big-endian. Each packet type exposes a pure `encode`
//! (fields → bytes) and `decode` (bytes → fields); `decode` accepts longer
//! buffers than its fixed size when `allow_excessive` is set, for
//! header-only parsing on streams that carry a variable-length payload.

use thiserror::Error;

/// Errors decoding a fixed-field RTP-like packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpDecodeError {
    /// Buffer was shorter than the packet's fixed size.
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes required to decode the packet.
        needed: usize,
        /// Bytes actually present.
        have: usize,
    },
    /// Buffer was longer than the packet's fixed size and `allow_excessive`
    /// was not set.
    #[error("buffer too large: expected exactly {expected} bytes, have {have}")]
    BufferTooLarge {
        /// Exact size expected.
        expected: usize,
        /// Bytes actually present.
        have: usize,
    },
}

fn check_len(buf: &[u8], fixed: usize, allow_excessive: bool) -> Result<(), RtpDecodeError> {
    if buf.len() < fixed {
        return Err(RtpDecodeError::BufferTooSmall {
            needed: fixed,
            have: buf.len(),
        });
    }
    if !allow_excessive && buf.len() != fixed {
        return Err(RtpDecodeError::BufferTooLarge {
            expected: fixed,
            have: buf.len(),
        });
    }
    Ok(())
}

fn u32_be(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn u16_be(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

/// Common 4-byte header shared by every RTP-like packet: `proto`, `type`,
/// and a 16-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol/version byte. High bit is the marker bit.
    pub proto: u8,
    /// Packet type byte.
    pub kind: u8,
    /// 16-bit sequence number.
    pub seqno: u16,
}

impl RtpHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4;

    /// Encode the header.
    #[must_use]
    pub fn encode(self) -> [u8; Self::SIZE] {
        let s = self.seqno.to_be_bytes();
        [self.proto, self.kind, s[0], s[1]]
    }

    /// Decode a header from the first 4 bytes of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError::BufferTooSmall`] if `buf` has fewer than 4
    /// bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        check_len(buf, Self::SIZE, true)?;
        Ok(Self {
            proto: buf[0],
            kind: buf[1],
            seqno: u16_be(buf, 2),
        })
    }
}

/// NTP-style timing request/response: header plus padding and three
/// (sec, frac) timestamp pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPacket {
    /// Common header.
    pub header: RtpHeader,
    /// Reference time (sec, frac).
    pub reftime: (u32, u32),
    /// Receive time (sec, frac).
    pub recvtime: (u32, u32),
    /// Send time (sec, frac).
    pub sendtime: (u32, u32),
}

impl TimingPacket {
    /// Encoded size in bytes.
    pub const SIZE: usize = RtpHeader::SIZE + 4 + 8 * 3;

    /// Encode the packet.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&[0u8; 4]);
        for (sec, frac) in [self.reftime, self.recvtime, self.sendtime] {
            out.extend_from_slice(&sec.to_be_bytes());
            out.extend_from_slice(&frac.to_be_bytes());
        }
        out
    }

    /// Decode a timing packet.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is shorter than [`Self::SIZE`], or (when
    /// `allow_excessive` is `false`) not exactly [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8], allow_excessive: bool) -> Result<Self, RtpDecodeError> {
        check_len(buf, Self::SIZE, allow_excessive)?;
        let header = RtpHeader::decode(buf)?;
        let base = RtpHeader::SIZE + 4;
        let pair = |at: usize| (u32_be(buf, at), u32_be(buf, at + 4));
        Ok(Self {
            header,
            reftime: pair(base),
            recvtime: pair(base + 8),
            sendtime: pair(base + 16),
        })
    }
}

/// Control-channel sync packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacket {
    /// Common header.
    pub header: RtpHeader,
    /// RTP time minus the stream's latency.
    pub now_without_latency: u32,
    /// Seconds half of the last sync's NTP timestamp.
    pub last_sync_sec: u32,
    /// Fraction half of the last sync's NTP timestamp.
    pub last_sync_frac: u32,
    /// Current RTP time.
    pub now: u32,
}

impl SyncPacket {
    /// Encoded size in bytes.
    pub const SIZE: usize = RtpHeader::SIZE + 4 * 4;

    /// Encode the packet.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.now_without_latency.to_be_bytes());
        out.extend_from_slice(&self.last_sync_sec.to_be_bytes());
        out.extend_from_slice(&self.last_sync_frac.to_be_bytes());
        out.extend_from_slice(&self.now.to_be_bytes());
        out
    }

    /// Decode a sync packet.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is shorter than [`Self::SIZE`], or (when
    /// `allow_excessive` is `false`) not exactly [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8], allow_excessive: bool) -> Result<Self, RtpDecodeError> {
        check_len(buf, Self::SIZE, allow_excessive)?;
        Ok(Self {
            header: RtpHeader::decode(buf)?,
            now_without_latency: u32_be(buf, 4),
            last_sync_sec: u32_be(buf, 8),
            last_sync_frac: u32_be(buf, 12),
            now: u32_be(buf, 16),
        })
    }
}

/// Audio packet header: common header plus RTP timestamp and SSRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPacketHeader {
    /// Common header.
    pub header: RtpHeader,
    /// RTP timestamp of this packet's first frame.
    pub timestamp: u32,
    /// Synchronization source identifier (the session id).
    pub ssrc: u32,
}

impl AudioPacketHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = RtpHeader::SIZE + 8;

    /// Build and encode an audio packet header.
    #[must_use]
    pub fn encode(proto: u8, kind: u8, seqno: u16, timestamp: u32, ssrc: u32) -> [u8; Self::SIZE] {
        let header = RtpHeader { proto, kind, seqno };
        let mut out = [0u8; Self::SIZE];
        out[..RtpHeader::SIZE].copy_from_slice(&header.encode());
        out[4..8].copy_from_slice(&timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&ssrc.to_be_bytes());
        out
    }

    /// Decode an audio packet header.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is shorter than [`Self::SIZE`], or (when
    /// `allow_excessive` is `false`) not exactly [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8], allow_excessive: bool) -> Result<Self, RtpDecodeError> {
        check_len(buf, Self::SIZE, allow_excessive)?;
        Ok(Self {
            header: RtpHeader::decode(buf)?,
            timestamp: u32_be(buf, 4),
            ssrc: u32_be(buf, 8),
        })
    }
}

/// Retransmit request sent by the receiver over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitRequest {
    /// Common header.
    pub header: RtpHeader,
    /// First missing sequence number.
    pub lost_seqno: u16,
    /// Count of consecutive missing packets starting at `lost_seqno`.
    pub lost_packets: u16,
}

impl RetransmitRequest {
    /// Encoded size in bytes.
    pub const SIZE: usize = RtpHeader::SIZE + 4;

    /// Encode the request.
    #[must_use]
    pub fn encode(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..RtpHeader::SIZE].copy_from_slice(&self.header.encode());
        out[4..6].copy_from_slice(&self.lost_seqno.to_be_bytes());
        out[6..8].copy_from_slice(&self.lost_packets.to_be_bytes());
        out
    }

    /// Decode a retransmit request.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is shorter than [`Self::SIZE`], or (when
    /// `allow_excessive` is `false`) not exactly [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8], allow_excessive: bool) -> Result<Self, RtpDecodeError> {
        check_len(buf, Self::SIZE, allow_excessive)?;
        Ok(Self {
            header: RtpHeader::decode(buf)?,
            lost_seqno: u16_be(buf, 4),
            lost_packets: u16_be(buf, 6),
        })
    }
}

/// AirPlay 2 remote-control data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Message type, exactly 12 bytes.
    pub message_type: [u8; 12],
    /// Command, exactly 4 bytes.
    pub command: [u8; 4],
    /// Monotonically increasing sequence number.
    pub seqno: u64,
}

impl DataFrame {
    /// Encoded size in bytes, excluding the payload the `size` field
    /// accounts for.
    pub const HEADER_SIZE: usize = 4 + 12 + 4 + 8 + 4;

    /// Encode the frame header for a payload of `payload_len` bytes.
    #[must_use]
    pub fn encode(&self, payload_len: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE);
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(&self.message_type);
        out.extend_from_slice(&self.command);
        out.extend_from_slice(&self.seqno.to_be_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out
    }

    /// Decode the frame header.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is shorter than [`Self::HEADER_SIZE`].
    pub fn decode(buf: &[u8]) -> Result<(Self, u32), RtpDecodeError> {
        check_len(buf, Self::HEADER_SIZE, true)?;
        let size = u32_be(buf, 0);
        let mut message_type = [0u8; 12];
        message_type.copy_from_slice(&buf[4..16]);
        let mut command = [0u8; 4];
        command.copy_from_slice(&buf[16..20]);
        let seqno = u64::from_be_bytes(buf[20..28].try_into().unwrap());
        Ok((
            Self {
                message_type,
                command,
                seqno,
            },
            size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtp_header_round_trip() {
        let header = RtpHeader {
            proto: 0x80,
            kind: 0xE0,
            seqno: 4242,
        };
        let decoded = RtpHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn sync_packet_shape() {
        let head_ts: u32 = 10_000;
        let start_ts: u32 = 5_000;
        let latency: u32 = 22_050 + 44_100;
        let rtptime = head_ts.wrapping_sub(start_ts).wrapping_add(latency);
        assert_eq!(rtptime, 71_150);

        let first = SyncPacket {
            header: RtpHeader {
                proto: 0x90,
                kind: 0xD4,
                seqno: 7,
            },
            now_without_latency: rtptime.wrapping_sub(latency),
            last_sync_sec: 0,
            last_sync_frac: 0,
            now: rtptime,
        };
        assert_eq!(first.now_without_latency, 5_000);
        let encoded = first.encode();
        assert_eq!(&encoded[0..4], &[0x90, 0xD4, 0x00, 0x07]);

        let second = SyncPacket {
            header: RtpHeader {
                proto: 0x80,
                ..first.header
            },
            ..first
        };
        assert_eq!(&second.encode()[0..2], &[0x80, 0xD4]);
    }

    #[test]
    fn timing_reply_shape() {
        let request = TimingPacket {
            header: RtpHeader {
                proto: 0x12,
                kind: 0,
                seqno: 0,
            },
            reftime: (0, 0),
            recvtime: (0, 0),
            sendtime: (111, 222),
        };
        let reply = TimingPacket {
            header: RtpHeader {
                proto: request.header.proto,
                kind: 0x53 | 0x80,
                seqno: 7,
            },
            reftime: request.sendtime,
            recvtime: (333, 444),
            sendtime: (333, 444),
        };
        let bytes = reply.encode();
        assert_eq!(&bytes[0..4], &[0x12, 0xD3, 0x00, 0x07]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn retransmit_request_round_trip() {
        let req = RetransmitRequest {
            header: RtpHeader {
                proto: 0x80,
                kind: 0x55,
                seqno: 0,
            },
            lost_seqno: 100,
            lost_packets: 2,
        };
        let decoded = RetransmitRequest::decode(&req.encode(), false).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let err = AudioPacketHeader::decode(&[0u8; 4], false).unwrap_err();
        assert!(matches!(err, RtpDecodeError::BufferTooSmall { .. }));
    }

    #[test]
    fn decode_allows_excessive_when_flagged() {
        let bytes = AudioPacketHeader::encode(0x80, 0x60, 1, 2, 3);
        let mut extended = bytes.to_vec();
        extended.extend_from_slice(&[0xFF; 16]);
        assert!(AudioPacketHeader::decode(&extended, true).is_ok());
        assert!(AudioPacketHeader::decode(&extended, false).is_err());
    }
}
