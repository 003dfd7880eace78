//! Per-session mutable state: RTP sequencing, timestamps, and pacing stats.

use crate::protocol::rtp::ntp_to_ts;
use rand::Rng;
use std::time::Instant;

/// Frames per audio packet; fixed by the protocol.
pub const FRAMES_PER_PACKET: u32 = 352;

/// Per-receiver streaming state.
///
/// Must be [`reset`](StreamContext::reset) before sending audio and whenever
/// `sample_rate`, `channels`, or `bytes_per_channel` change.
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
    /// Bytes per channel sample.
    pub bytes_per_channel: u8,

    /// 16-bit RTP sequence counter.
    pub rtp_seq: u16,
    /// 32-bit timestamp the stream started at.
    pub start_ts: u32,
    /// 32-bit timestamp of the next frame to be produced.
    pub head_ts: u32,
    /// Frames of silence emitted after the source was exhausted.
    pub padding_sent: u32,

    /// Remote UDP audio port from SETUP.
    pub server_port: u16,
    /// Remote UDP control port from SETUP.
    pub control_port: u16,
    /// Remote UDP timing port from SETUP.
    pub timing_port: u16,
    /// RTSP session token.
    pub session: Option<String>,
}

impl StreamContext {
    /// Create a context with CD-quality defaults (44100 Hz, 2 channels, 16-bit).
    #[must_use]
    pub fn new() -> Self {
        let mut ctx = Self {
            sample_rate: 44100,
            channels: 2,
            bytes_per_channel: 2,
            rtp_seq: 0,
            start_ts: 0,
            head_ts: 0,
            padding_sent: 0,
            server_port: 0,
            control_port: 0,
            timing_port: 0,
            session: None,
        };
        ctx.reset();
        ctx
    }

    /// Bytes per PCM frame (all channels for one sample).
    #[must_use]
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_channel)
    }

    /// Bytes per audio packet (352 frames).
    #[must_use]
    pub fn packet_size(&self) -> usize {
        FRAMES_PER_PACKET as usize * self.frame_size()
    }

    /// Lead time in frames between the timestamp being produced and the one
    /// the receiver should be playing.
    #[must_use]
    pub fn latency(&self) -> u32 {
        22050 + self.sample_rate
    }

    /// `rtptime` = `head_ts − (start_ts − latency)`.
    #[must_use]
    pub fn rtptime(&self) -> u32 {
        self.head_ts.wrapping_sub(self.start_ts.wrapping_sub(self.latency()))
    }

    /// Playback position in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn position(&self) -> f64 {
        f64::from(self.head_ts.wrapping_sub(self.start_ts)) / f64::from(self.sample_rate)
    }

    /// Re-initialize sequence/timestamp state for a new track. Must be
    /// called before sending audio and whenever the format fields change.
    pub fn reset(&mut self) {
        let mut rng = rand::thread_rng();
        self.rtp_seq = rng.r#gen();
        self.start_ts = ntp_to_ts(crate::protocol::rtp::ntp_now(), self.sample_rate);
        self.head_ts = self.start_ts;
        self.padding_sent = 0;
    }

    /// Advance `head_ts` and `rtp_seq` by one emitted packet.
    pub fn advance(&mut self, frames: u32) {
        self.head_ts = self.head_ts.wrapping_add(frames);
        self.rtp_seq = self.rtp_seq.wrapping_add(1);
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic pacing counters used to detect drift against wall-clock time.
#[derive(Debug)]
pub struct StreamStats {
    /// Total PCM frames sent this stream.
    pub total_frames: u64,
    /// Frames sent in the current one-second logging interval.
    pub interval_frames: u64,
    /// When the stream started.
    pub start_time: Instant,
    /// When the current interval started.
    pub interval_start: Instant,
}

impl StreamStats {
    /// Start a fresh set of counters.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            total_frames: 0,
            interval_frames: 0,
            start_time: now,
            interval_start: now,
        }
    }

    /// Record `frames` frames sent.
    pub fn record(&mut self, frames: u64) {
        self.total_frames += frames;
        self.interval_frames += frames;
    }

    /// Frames that should have been sent by now at `sample_rate`, used to
    /// detect drift.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn expected_frame_count(&self, sample_rate: u32) -> u64 {
        (self.start_time.elapsed().as_secs_f64() * f64::from(sample_rate)) as u64
    }

    /// Whether the current interval has accumulated a full second of audio.
    #[must_use]
    pub fn interval_completed(&self, sample_rate: u32) -> bool {
        self.interval_frames >= u64::from(sample_rate)
    }

    /// Reset the interval counter, keeping the total.
    pub fn reset_interval(&mut self) {
        self.interval_frames = 0;
        self.interval_start = Instant::now();
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cd_quality() {
        let ctx = StreamContext::new();
        assert_eq!(ctx.frame_size(), 4);
        assert_eq!(ctx.packet_size(), 352 * 4);
        assert_eq!(ctx.latency(), 22050 + 44100);
    }

    #[test]
    fn reset_initializes_head_ts_to_start_ts() {
        let ctx = StreamContext::new();
        assert_eq!(ctx.head_ts, ctx.start_ts);
        assert_eq!(ctx.padding_sent, 0);
    }

    #[test]
    fn advance_moves_head_ts_and_wraps_seq() {
        let mut ctx = StreamContext::new();
        ctx.rtp_seq = 65535;
        ctx.advance(352);
        assert_eq!(ctx.rtp_seq, 0);
        assert_eq!(ctx.head_ts, ctx.start_ts.wrapping_add(352));
    }

    #[test]
    fn rtptime_matches_worked_example() {
        let mut ctx = StreamContext::new();
        ctx.sample_rate = 44100;
        ctx.start_ts = 5_000;
        ctx.head_ts = 10_000;
        assert_eq!(ctx.latency(), 66_150);
        assert_eq!(ctx.rtptime(), 71_150);
    }
}
