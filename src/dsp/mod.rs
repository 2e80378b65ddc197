//! DSP — sample-level realization of tone timelines.
//!
//! All synthesis runs in Rust so the offline renderer, the WASM sample
//! export and the device sink produce the same audio.

#[cfg(feature = "device")]
pub mod device;
pub mod engine;
pub mod envelope;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
pub mod voice;
