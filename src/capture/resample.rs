//! Channel mixing and sample-rate conversion for captured audio.
//!
//! Device callbacks deliver interleaved samples at the hardware rate
//! (commonly 44.1 or 48 kHz, often stereo).  The analysis service only
//! needs speech, so every callback buffer is downmixed to mono and converted
//! to the configured target rate before it enters the [`SampleBuffer`].
//!
//! [`SampleBuffer`]: crate::capture::SampleBuffer

/// Average interleaved channels down to mono.
///
/// ```rust
/// use interview_coach::capture::downmix;
///
/// let stereo = [0.5_f32, -0.5, 0.2, 0.4];
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Convert `samples` from `source_rate` to `target_rate` with linear
/// interpolation.
///
/// Output length is `ceil(len * target / source)`.  Equal rates return a
/// copy; a zero rate on either side yields an empty vector.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == 0 || target_rate == 0 || samples.is_empty() {
        return Vec::new();
    }
    if source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Convert a signed 16-bit sample to `f32` in `[-1.0, 1.0]`.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// Convert an unsigned 16-bit sample (midpoint 32768) to `f32`.
pub fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 - 32_768.0) / 32_768.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_passthrough() {
        let input = [0.1_f32, 0.2, 0.3];
        assert_eq!(downmix(&input, 1), input.to_vec());
    }

    #[test]
    fn downmix_drops_partial_frame() {
        // 5 samples of stereo: the trailing half-frame is ignored
        let out = downmix(&[1.0, 1.0, 0.0, 0.0, 0.7], 2);
        assert_eq!(out, vec![1.0, 0.0]);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn resample_48k_to_16k_length() {
        let out = resample(&vec![0.5_f32; 480], 48_000, 16_000);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-5));
    }

    #[test]
    fn resample_44100_one_second() {
        let out = resample(&vec![0.0_f32; 44_100], 44_100, 16_000);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn resample_upsamples() {
        let out = resample(&vec![0.0_f32; 80], 8_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn resample_degenerate_rates() {
        assert!(resample(&[0.1, 0.2], 0, 16_000).is_empty());
        assert!(resample(&[0.1, 0.2], 16_000, 0).is_empty());
        assert_eq!(resample(&[0.1, 0.2], 16_000, 16_000), vec![0.1, 0.2]);
    }

    #[test]
    fn integer_sample_conversion() {
        assert!((i16_to_f32(i16::MAX) - 1.0).abs() < 1e-6);
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(u16_to_f32(32_768), 0.0);
        assert!((u16_to_f32(0) + 1.0).abs() < 1e-6);
    }
}
