//! RTP-like fixed-field packet codecs and NTP⇄RTP timestamp conversions.

mod packet;
mod timing;

pub use packet::{
    AudioPacketHeader, DataFrame, RetransmitRequest, RtpDecodeError, RtpHeader, SyncPacket,
    TimingPacket,
};
pub use timing::{ntp_from_parts, ntp_now, ntp_to_parts, ntp_to_ts, ts_to_ntp};
