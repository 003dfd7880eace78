//! Real-time audio streaming: packetization, pacing, and the UDP sidechannels.

mod context;
mod control_endpoint;
mod fifo;
mod protocol_adapter;
mod scheduler;
mod sender;
pub mod source;
mod timing_endpoint;


pub use context::{StreamContext, StreamStats};
pub use control_endpoint::ControlEndpoint;
pub use fifo::PacketFifo;
pub use protocol_adapter::{AirPlayV1, AirPlayV2, StreamProtocol, StreamProtocolKind};
pub use scheduler::StreamClient;
pub use sender::AudioSender;
pub use source::{AudioSource, CallbackSource, SilenceSource, SliceSource};
pub use timing_endpoint::TimingEndpoint;
