//! # Frame Pipeline
//!
//! Composes the μ-law codec and the resampler into the two one-way frame
//! transforms the bridge runs on every media message:
//!
//! - **Downlink** (model → telephony): base64 PCM16-LE at the model rate →
//!   base64 μ-law at the telephony rate, zero-padded up to the minimum
//!   frame the telephony transport expects.
//! - **Uplink** (telephony → model): base64 μ-law at the telephony rate →
//!   base64 PCM16-LE at the model rate.
//!
//! Both transforms are pure and stateless; the only failure mode is
//! undecodable base64, which the caller drops along with the message.

use crate::audio::{codec, resample::resample};
use crate::config::AudioConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::{DecodeError, Engine};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// The two sample-format transforms for one call, parameterized by the
/// configured rates and minimum telephony frame size.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    /// Companded sample rate on the telephony side (nominally 8000 Hz).
    telephony_rate: u32,

    /// Linear PCM sample rate on the model side (nominally 24000 Hz).
    model_rate: u32,

    /// Minimum outbound telephony frame in companded bytes; shorter frames
    /// are right-padded with zero bytes, never truncated.
    min_frame_bytes: usize,
}

impl FramePipeline {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            telephony_rate: config.telephony_rate,
            model_rate: config.model_rate,
            min_frame_bytes: config.min_frame_bytes,
        }
    }

    /// Uplink transform: telephony media payload → model audio buffer.
    ///
    /// Decodes base64 companded bytes, expands each through the μ-law
    /// decoder, resamples up to the model rate, and re-serializes as
    /// base64 little-endian PCM16. Empty input yields empty output.
    pub fn uplink(&self, payload: &str) -> Result<String, DecodeError> {
        let companded = BASE64.decode(payload)?;

        let linear: Vec<i16> = companded.iter().map(|&b| codec::decode(b)).collect();
        let normalized = pcm_to_float(&linear);
        let resampled = resample(&normalized, self.telephony_rate, self.model_rate);
        let samples = float_to_pcm(&resampled);

        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        Ok(BASE64.encode(bytes))
    }

    /// Downlink transform: model audio delta → telephony media payload.
    ///
    /// Decodes base64 little-endian PCM16, resamples down to the telephony
    /// rate, compresses each sample through the μ-law encoder, and pads the
    /// companded frame to the configured minimum size. Empty input yields
    /// empty output (there is nothing to pad or transmit).
    pub fn downlink(&self, delta: &str) -> Result<String, DecodeError> {
        let bytes = BASE64.decode(delta)?;

        let mut cursor = Cursor::new(&bytes);
        let mut linear = Vec::with_capacity(bytes.len() / 2);
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            linear.push(sample);
        }

        let normalized = pcm_to_float(&linear);
        let resampled = resample(&normalized, self.model_rate, self.telephony_rate);
        let samples = float_to_pcm(&resampled);

        let mut companded: Vec<u8> = samples.iter().map(|&s| codec::encode(s)).collect();
        if !companded.is_empty() && companded.len() < self.min_frame_bytes {
            companded.resize(self.min_frame_bytes, 0);
        }

        Ok(BASE64.encode(companded))
    }
}

/// Convert 16-bit samples to normalized floats in [-1.0, 1.0].
fn pcm_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Convert normalized floats back to 16-bit samples, clamping to [-1, 1]
/// before scaling so interpolation overshoot saturates instead of wrapping.
fn float_to_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> FramePipeline {
        FramePipeline::new(&AudioConfig {
            telephony_rate: 8000,
            model_rate: 24000,
            min_frame_bytes: 160,
        })
    }

    fn encode_pcm16(samples: &[i16]) -> String {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        BASE64.encode(bytes)
    }

    #[test]
    fn test_uplink_length_and_format() {
        // One 20ms telephony frame (160 companded bytes) becomes 480
        // samples at 24kHz, i.e. 960 little-endian bytes.
        let frame = BASE64.encode(vec![0xFFu8; 160]);
        let out = pipeline().uplink(&frame).unwrap();
        let bytes = BASE64.decode(out).unwrap();
        assert_eq!(bytes.len(), 960);
        // μ-law 0xFF is digital silence, so every output sample is zero.
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_downlink_pads_short_frames() {
        // 120 samples of silence at 24kHz resample to 40 companded bytes,
        // well short of the 160-byte minimum.
        let delta = encode_pcm16(&vec![0i16; 120]);
        let out = pipeline().downlink(&delta).unwrap();
        let bytes = BASE64.decode(out).unwrap();
        assert_eq!(bytes.len(), 160);
        // The encoded silence itself is 0xFF; the padding is zero bytes.
        assert!(bytes[..40].iter().all(|&b| b == 0xFF));
        assert!(bytes[40..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_downlink_never_truncates() {
        // 1200 samples at 24kHz resample to 400 companded bytes.
        let delta = encode_pcm16(&vec![0i16; 1200]);
        let out = pipeline().downlink(&delta).unwrap();
        assert_eq!(BASE64.decode(out).unwrap().len(), 400);
    }

    #[test]
    fn test_empty_input_produces_empty_output() {
        let p = pipeline();
        assert_eq!(p.uplink("").unwrap(), "");
        assert_eq!(p.downlink("").unwrap(), "");
    }

    #[test]
    fn test_malformed_base64_is_an_error() {
        let p = pipeline();
        assert!(p.uplink("not base64!!!").is_err());
        assert!(p.downlink("@@@").is_err());
    }

    /// Count sign changes as a cheap frequency estimate.
    fn zero_crossings(samples: &[i16]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] >= 0) != (w[1] >= 0))
            .count()
    }

    #[test]
    fn test_tone_frequency_survives_uplink_then_downlink() {
        // One second of a 440Hz tone at 8kHz, half amplitude.
        let tone: Vec<i16> = (0..8000)
            .map(|i| {
                let t = i as f32 / 8000.0;
                ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 16000.0) as i16
            })
            .collect();
        let companded: Vec<u8> = tone.iter().map(|&s| codec::encode(s)).collect();
        let payload = BASE64.encode(&companded);

        let p = pipeline();
        let up = p.uplink(&payload).unwrap();
        let down = p.downlink(&up).unwrap();

        let bytes = BASE64.decode(down).unwrap();
        let round_trip: Vec<i16> = bytes.iter().map(|&b| codec::decode(b)).collect();

        // A 440Hz tone crosses zero 880 times per second. Linear
        // interpolation and companding blur the edges a little, so allow a
        // small tolerance around both counts.
        let original = zero_crossings(&tone);
        let recovered = zero_crossings(&round_trip[..tone.len().min(round_trip.len())]);
        let diff = (original as i64 - recovered as i64).unsigned_abs();
        assert!(
            diff <= original as u64 / 50,
            "zero crossings drifted: {} vs {}",
            original,
            recovered
        );
    }
}
