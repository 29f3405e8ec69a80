//! # Audio Processing Module
//!
//! Everything sample-level for the bridge: the μ-law codec, the linear
//! resampler, and the frame pipeline that composes them into the uplink
//! (telephony → model) and downlink (model → telephony) transforms.
//!
//! ## Audio contracts:
//! - **Telephony side**: 8kHz, 8-bit G.711 μ-law, base64 in JSON frames,
//!   nominally 160 bytes (20ms) per frame.
//! - **Model side**: 24kHz, 16-bit little-endian linear PCM, base64 in
//!   JSON events.

pub mod codec; // G.711 μ-law encode/decode
pub mod pipeline; // Uplink/downlink frame transforms
pub mod resample; // Linear-interpolation rate conversion
