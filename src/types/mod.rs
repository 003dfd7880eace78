//! Core types shared across the streaming pipeline.

mod config;
mod credentials;
mod device;
mod metadata;

pub use config::{AirPlayConfig, AirPlayConfigBuilder};
pub use credentials::{CredentialsKind, CredentialsParseError, HapCredentials};
pub use device::AirPlayDevice;
pub use metadata::Metadata;
