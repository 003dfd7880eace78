//! Audio format types shared between the source adapter and the sender.

pub mod format;

#[cfg(test)]
mod tests;

pub use format::{AudioCodec, AudioFormat, SampleFormat, SampleRate};
