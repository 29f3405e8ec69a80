//! # Sample-rate Conversion
//!
//! Converts normalized floating-point sample sequences between arbitrary
//! rates using linear interpolation. This is a causal, zero-latency,
//! non-band-limited resampler: no anti-aliasing filter is applied, so
//! content above the new Nyquist frequency aliases. That is an accepted
//! approximation for narrowband telephone speech, not a bug.

/// Resample a normalized sample sequence from one rate to another.
///
/// ## Behavior:
/// - Equal rates return the input unchanged (required fast path, since
///   some deployments run both peers at the same rate).
/// - Output length is exactly `floor(len * to_rate / from_rate)`.
/// - Each output sample linearly interpolates between the two bracketing
///   input samples; the upper index is clamped at the sequence tail.
/// - Empty input produces empty output.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    if input.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (input.len() as f64 * ratio).floor() as usize;
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let position = i as f64 / ratio;
        let index = position.floor() as usize;
        let fraction = (position - index as f64) as f32;

        let lower = input[index.min(last)];
        let upper = input[(index + 1).min(last)];
        output.push(lower + (upper - lower) * fraction);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_rates_match() {
        let input = vec![0.1, -0.5, 0.9, 0.0];
        assert_eq!(resample(&input, 8000, 8000), input);
        assert_eq!(resample(&input, 24000, 24000), input);
    }

    #[test]
    fn test_output_length_exact() {
        let input = vec![0.0f32; 160];
        assert_eq!(resample(&input, 8000, 24000).len(), 480);
        assert_eq!(resample(&input, 24000, 8000).len(), 53); // floor(160 / 3)

        let input = vec![0.0f32; 7];
        assert_eq!(resample(&input, 8000, 24000).len(), 21);
        assert_eq!(resample(&input, 24000, 8000).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 8000, 24000).is_empty());
        assert!(resample(&[], 24000, 8000).is_empty());
    }

    #[test]
    fn test_upsample_interpolates_linearly() {
        // Tripling the rate of a ramp keeps it a ramp: every output sample
        // sits exactly a third of a step from its neighbor.
        let input = vec![0.0, 0.3, 0.6, 0.9];
        let output = resample(&input, 8000, 24000);
        assert_eq!(output.len(), 12);
        for (i, sample) in output.iter().enumerate().take(10) {
            let expected = 0.1 * i as f32;
            assert!(
                (sample - expected).abs() < 1e-5,
                "sample {} was {}, expected {}",
                i,
                sample,
                expected
            );
        }
        // Past the last input sample the tail value holds.
        assert!((output[10] - 0.9).abs() < 1e-5);
        assert!((output[11] - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_downsample_picks_bracketed_values() {
        let input: Vec<f32> = (0..12).map(|i| i as f32 / 12.0).collect();
        let output = resample(&input, 24000, 8000);
        assert_eq!(output.len(), 4);
        for (i, sample) in output.iter().enumerate() {
            // Every third input sample, exactly on an input index.
            let expected = (3 * i) as f32 / 12.0;
            assert!((sample - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tail_clamp_no_out_of_bounds() {
        // A two-sample input upsampled by 3 must read past the last index
        // logically without panicking.
        let output = resample(&[1.0, -1.0], 8000, 24000);
        assert_eq!(output.len(), 6);
        assert_eq!(output[0], 1.0);
        assert_eq!(*output.last().unwrap(), -1.0);
    }
}
