//! NTP⇄RTP timestamp conversions.
//!
//! NTP time is a 64-bit quantity: the high 32 bits are seconds since the
//! 1900 epoch, the low 32 bits are fractional seconds (× 2³²). RTP time is a
//! 32-bit counter advancing at the stream's sample rate. All conversions use
//! 64-bit intermediate math so the final 32-bit truncation wraps the way the
//! wire format expects.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch.
const NTP_UNIX_EPOCH_DELTA: u64 = 0x83AA_7E80;

/// Current wall-clock time as a 64-bit NTP timestamp.
#[must_use]
pub fn ntp_now() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let sec = now.as_secs() + NTP_UNIX_EPOCH_DELTA;
    let frac = ((u64::from(now.subsec_micros())) << 32) / 1_000_000;
    (sec << 32) | frac
}

/// Convert a 64-bit NTP timestamp to a 32-bit RTP timestamp at `rate` Hz.
#[must_use]
pub fn ntp_to_ts(ntp: u64, rate: u32) -> u32 {
    (((ntp >> 16) * u64::from(rate)) >> 16) as u32
}

/// Convert a 32-bit RTP timestamp at `rate` Hz back to a 64-bit NTP
/// timestamp.
#[must_use]
pub fn ts_to_ntp(ts: u32, rate: u32) -> u64 {
    ((u64::from(ts) << 16) / u64::from(rate)) << 16
}

/// Split a 64-bit NTP timestamp into its (seconds, fraction) halves.
#[must_use]
pub fn ntp_to_parts(ntp: u64) -> (u32, u32) {
    ((ntp >> 32) as u32, ntp as u32)
}

/// Join an NTP (seconds, fraction) pair into a 64-bit timestamp.
#[must_use]
pub fn ntp_from_parts(sec: u32, frac: u32) -> u64 {
    (u64::from(sec) << 32) | u64::from(frac)
}
