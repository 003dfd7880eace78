//! Audio packet framing: RTP header, ALAC-lite/raw PCM body, and the
//! optional AirPlay 2 per-packet encryption.

use crate::protocol::rtp::AudioPacketHeader;
use byteorder::{ByteOrder, LittleEndian};
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};

/// How the PCM payload is framed before being wrapped in an RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFraming {
    /// AirPlay 1: a handwritten ALAC bitstream wrapping raw PCM samples.
    AlacLite,
    /// AirPlay 2: raw PCM, optionally encrypted.
    Raw,
}

/// Builds outgoing audio packets: RTP header + framed body, with AirPlay 2
/// per-packet `ChaCha20-Poly1305` encryption when a cipher key is set.
pub struct AudioSender {
    framing: AudioFraming,
    cipher: Option<ChaCha20Poly1305>,
    out_nonce: u64,
}

impl AudioSender {
    /// Build a sender for AirPlay 1's unencrypted ALAC-lite framing.
    #[must_use]
    pub fn alac_lite() -> Self {
        Self {
            framing: AudioFraming::AlacLite,
            cipher: None,
            out_nonce: 0,
        }
    }

    /// Build a sender for AirPlay 2's raw-PCM framing, encrypted with
    /// `shared_key` if set.
    #[must_use]
    pub fn raw(shared_key: Option<&[u8; 32]>) -> Self {
        Self {
            framing: AudioFraming::Raw,
            cipher: shared_key.map(|key| ChaCha20Poly1305::new(Key::from_slice(key))),
            out_nonce: 0,
        }
    }

    /// Build one RTP audio packet for `pcm`, a full or final (zero-padded)
    /// frame's worth of PCM samples.
    #[must_use]
    pub fn build_packet(
        &mut self,
        proto: u8,
        first_packet: bool,
        seqno: u16,
        timestamp: u32,
        ssrc: u32,
        pcm: &[u8],
        channels: u8,
    ) -> Vec<u8> {
        let kind = if first_packet { 0xE0 } else { 0x60 };
        let header = AudioPacketHeader::encode(proto, kind, seqno, timestamp, ssrc);

        let body = match self.framing {
            AudioFraming::AlacLite => encode_alac_lite(pcm, channels),
            AudioFraming::Raw => pcm.to_vec(),
        };

        let mut packet = Vec::with_capacity(header.len() + body.len() + 24);
        packet.extend_from_slice(&header);

        if let Some(cipher) = &mut self.cipher {
            let mut nonce_bytes = [0u8; 12];
            LittleEndian::write_u64(&mut nonce_bytes[4..12], self.out_nonce);
            let nonce = Nonce::from_slice(&nonce_bytes);

            let mut buffer = body;
            let tag = cipher
                .encrypt_in_place_detached(nonce, &header[4..12], &mut buffer)
                .expect("chacha20poly1305 encryption is infallible for this payload size");

            packet.extend_from_slice(&buffer);
            packet.extend_from_slice(tag.as_slice());
            packet.extend_from_slice(&self.out_nonce.to_le_bytes());

            self.out_nonce += 1;
        } else {
            packet.extend_from_slice(&body);
        }

        packet
    }
}

/// Pack PCM samples into the handwritten ALAC bitstream AirPlay 1 expects:
/// a 23-bit header (`00`, a channel-count bit, 19 zero bits, a trailing `1`)
/// followed by each 16-bit little-endian sample byte-swapped and packed
/// bit-for-bit, then a `111` end tag, byte-aligned with zero padding.
fn encode_alac_lite(pcm: &[u8], channels: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm.len() + 4);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;

    macro_rules! push_bits {
        ($bits:expr, $n:expr) => {{
            acc = (acc << $n) | ($bits & ((1u32 << $n) - 1));
            acc_bits += $n;
            while acc_bits >= 8 {
                let shift = acc_bits - 8;
                out.push(((acc >> shift) & 0xFF) as u8);
                acc_bits -= 8;
            }
        }};
    }

    let channel_bit = u32::from((channels.max(1) - 1) & 1);
    push_bits!(0b00, 2);
    push_bits!(channel_bit, 1);
    push_bits!(0, 19);
    push_bits!(1, 1);

    for chunk in pcm.chunks_exact(2) {
        let swapped = (u32::from(chunk[1]) << 8) | u32::from(chunk[0]);
        push_bits!(swapped, 16);
    }

    push_bits!(0b111, 3);

    if acc_bits > 0 {
        let pad = 8 - acc_bits;
        out.push(((acc << pad) & 0xFF) as u8);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alac_lite_prefix_matches_stereo_layout() {
        let out = encode_alac_lite(&[], 2);
        assert_eq!(out, vec![0x20, 0x00, 0x03, 0xC0]);
    }

    #[test]
    fn alac_lite_prefix_matches_mono_layout() {
        let out = encode_alac_lite(&[], 1);
        assert_eq!(out, vec![0x00, 0x00, 0x03, 0xC0]);
    }

    #[test]
    fn unencrypted_packet_has_no_trailing_nonce() {
        let mut sender = AudioSender::raw(None);
        let pcm = vec![0u8; 8];
        let packet = sender.build_packet(0x80, true, 1, 1000, 42, &pcm, 2);
        assert_eq!(packet.len(), AudioPacketHeader::SIZE + pcm.len());
    }

    #[test]
    fn encrypted_packet_appends_tag_and_nonce() {
        let key = [7u8; 32];
        let mut sender = AudioSender::raw(Some(&key));
        let pcm = vec![0u8; 8];
        let packet = sender.build_packet(0x80, true, 1, 1000, 42, &pcm, 2);
        // header + ciphertext(same len as plaintext) + 16-byte tag + 8-byte nonce
        assert_eq!(packet.len(), AudioPacketHeader::SIZE + pcm.len() + 16 + 8);
    }

    #[test]
    fn encrypted_packets_use_distinct_incrementing_nonces() {
        let key = [3u8; 32];
        let mut sender = AudioSender::raw(Some(&key));
        let pcm = vec![1u8; 8];
        let first = sender.build_packet(0x80, true, 1, 1000, 42, &pcm, 2);
        let second = sender.build_packet(0x80, false, 2, 1352, 42, &pcm, 2);
        let first_nonce = &first[first.len() - 8..];
        let second_nonce = &second[second.len() - 8..];
        assert_eq!(first_nonce, &0u64.to_le_bytes());
        assert_eq!(second_nonce, &1u64.to_le_bytes());
    }
}
