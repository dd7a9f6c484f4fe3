//! depthlink-audio
//!
//! Audio amplitude for the audio-reactive sketch. The render loop only sees
//! [`AudioLevel`]; capture (behind the `microphone` feature) writes into a
//! [`SharedAmplitude`] from the device thread.

pub mod level;
pub mod meter;
#[cfg(feature = "microphone")]
pub mod microphone;

pub use level::{AudioLevel, SharedAmplitude, Silence};
pub use meter::{AmplitudeMeter, MeterConfig, BIN_COUNT, FFT_SIZE};
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneCapture;
