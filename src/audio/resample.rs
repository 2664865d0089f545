//! Audio resampling using rubato

use crate::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use super::AudioData;

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio to the target sample rate
pub fn resample(audio: &AudioData, target_sr: u32) -> Result<AudioData> {
    if audio.sample_rate == target_sr {
        return Ok(audio.clone());
    }
    if audio.sample_rate == 0 || target_sr == 0 {
        return Err(Error::Audio("Sample rate must be > 0".into()));
    }
    if audio.is_empty() {
        return Ok(AudioData::new(Vec::new(), target_sr));
    }

    let resample_ratio = target_sr as f64 / audio.sample_rate as f64;

    let mut resampler = FastFixedIn::<f32>::new(
        resample_ratio,
        1.0,
        PolynomialDegree::Cubic,
        CHUNK_SIZE,
        1,
    )
    .map_err(|e| Error::Audio(format!("Failed to create resampler: {}", e)))?;

    let input_frames_needed = resampler.input_frames_next();
    let mut input_buffer = vec![vec![0.0f32; input_frames_needed]];
    let expected_len = (audio.samples.len() as f64 * resample_ratio).ceil() as usize;
    let mut output_samples = Vec::with_capacity(expected_len + CHUNK_SIZE);

    let mut pos = 0;
    while pos < audio.samples.len() {
        let end = (pos + input_frames_needed).min(audio.samples.len());
        let chunk_size = end - pos;

        input_buffer[0][..chunk_size].copy_from_slice(&audio.samples[pos..end]);
        if chunk_size < input_frames_needed {
            input_buffer[0][chunk_size..].fill(0.0);
        }

        let output = resampler
            .process(&input_buffer, None)
            .map_err(|e| Error::Audio(format!("Resampling failed: {}", e)))?;

        output_samples.extend_from_slice(&output[0]);
        pos += chunk_size;
    }

    // The final chunk is zero padded; pad or trim to the exact length.
    output_samples.resize(expected_len, 0.0);

    Ok(AudioData::new(output_samples, target_sr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_length() {
        for source in [8_000u32, 16_000, 22_050, 44_100] {
            let audio = AudioData::new(vec![0.1; source as usize / 2], source);
            let out = resample(&audio, 48_000).unwrap();
            assert_eq!(out.sample_rate, 48_000);
            assert_eq!(out.len(), 24_000);
        }
    }

    #[test]
    fn test_same_rate_is_identity() {
        let audio = AudioData::new(vec![0.5, -0.5, 0.25], 48_000);
        let out = resample(&audio, 48_000).unwrap();
        assert_eq!(out.samples, audio.samples);
    }

    #[test]
    fn test_empty_audio() {
        let out = resample(&AudioData::new(Vec::new(), 22_050), 48_000).unwrap();
        assert!(out.is_empty());
    }
}
