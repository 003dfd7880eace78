//! # airplay-stream
//!
//! A pure Rust client library for streaming PCM audio to Apple `AirPlay`
//! receivers (`AirPort` Express, Apple TV, `HomePod`, third-party `AirPlay` 2
//! speakers).
//!
//! Covers pairing/verification (legacy SRP pin-pairing and `HomeKit`
//! Accessory Protocol), RTSP session setup, real-time PCM packetization, the
//! UDP control/timing sidechannels with retransmission, and the paced
//! real-time sender loop. Device discovery, metadata extraction, and audio
//! decoding are deliberately external collaborators: callers supply an
//! [`AirPlayDevice`] and an [`streaming::AudioSource`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use airplay_stream::{AirPlayClient, AirPlayConfig, AirPlayDevice};
//!
//! # async fn example(device: AirPlayDevice) -> Result<(), airplay_stream::AirPlayError> {
//! let config = AirPlayConfig::default();
//! let mut client = AirPlayClient::connect(&device, config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Audio format types shared between the source adapter and the sender.
pub mod audio;
mod client;
/// Error types.
pub mod error;
/// Runtime-agnostic networking primitives and the HAP encrypted record layer.
pub mod net;
/// Pairing, RTSP, packet codecs, and other wire protocol implementations.
pub mod protocol;
/// Real-time audio streaming: packetization, pacing, and the UDP sidechannels.
pub mod streaming;
/// Core types shared across the streaming pipeline.
pub mod types;

pub use client::AirPlayClient;
pub use error::AirPlayError;
pub use types::{AirPlayConfig, AirPlayDevice, HapCredentials, Metadata};
