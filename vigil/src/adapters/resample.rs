//! Linear-interpolation resampling for model input.

/// Resample mono f32 audio between rates by linear interpolation.
///
/// Good enough for speech-to-text input; this is not a mastering-grade
/// resampler and deliberately avoids pulling in a DSP dependency.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;

        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_downsample_halves_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample_linear(&samples, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        // A linear ramp stays a linear ramp.
        assert!((out[10] - samples[20]).abs() < 1e-6);
    }

    #[test]
    fn test_upsample_doubles_length() {
        let samples = vec![0.0, 1.0];
        let out = resample_linear(&samples, 8_000, 16_000);
        // Interpolated midpoint between the two input samples; the tail
        // clamps to the last sample.
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }
}
