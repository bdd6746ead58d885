//! 48 kHz capture → 16 kHz wire format.
//!
//! Plain 3:1 decimation with channel averaging: every third frame is kept
//! and its channels are averaged to mono. No low-pass filter — this
//! reproduces the conversion the recognition models were tuned against;
//! a windowed-sinc resampler could be swapped in here without touching any
//! caller.

/// Converts interleaved 48 kHz audio to mono 16 kHz.
pub fn downmix_48k_to_16k(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 0 {
        return Vec::new();
    }
    interleaved
        .chunks_exact(channels)
        .step_by(3)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_keeps_every_third_sample() {
        let input: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(downmix_48k_to_16k(&input, 1), vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn stereo_averages_channels() {
        // Frames: (0,2) (10,12) (20,22) (30,32) (40,42) (50,52)
        let input: Vec<f32> = vec![
            0.0, 2.0, 10.0, 12.0, 20.0, 22.0, 30.0, 32.0, 40.0, 42.0, 50.0, 52.0,
        ];
        assert_eq!(downmix_48k_to_16k(&input, 2), vec![1.0, 31.0]);
    }

    #[test]
    fn output_rate_is_one_third() {
        let input = vec![0.0f32; 48_000 * 2];
        assert_eq!(downmix_48k_to_16k(&input, 2).len(), 16_000);
    }
}
