//! WAV I/O operations

use crate::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

/// Audio data container
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (mono, normalized to [-1, 1])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioData {
    /// Create new audio data
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Load audio from WAV file
///
/// # Arguments
/// * `path` - Path to WAV file
/// * `target_sr` - Optional target sample rate (will resample if different)
///
/// # Returns
/// Mono audio data with samples normalized to [-1, 1]
pub fn load_audio<P: AsRef<Path>>(path: P, target_sr: Option<u32>) -> Result<AudioData> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }

    let reader =
        WavReader::open(path).map_err(|e| Error::Audio(format!("Failed to open WAV: {}", e)))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Audio(format!("Failed to read samples: {}", e)))?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let samples: Vec<i32> = reader
                .into_samples::<i32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Audio(format!("Failed to read samples: {}", e)))?;

            let max_val = (1i64 << (bits - 1)) as f32;
            samples.iter().map(|&s| s as f32 / max_val).collect()
        }
    };

    // Downmix
    let mono_samples = if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    let mut audio = AudioData::new(mono_samples, sample_rate);

    if let Some(target) = target_sr {
        if target != sample_rate {
            audio = super::resample::resample(&audio, target)?;
        }
    }

    Ok(audio)
}

/// Encode audio as a mono 16-bit PCM WAV byte buffer
pub fn encode_wav(audio: &AudioData) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Audio(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in &audio.samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| Error::Audio(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::Audio(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Save audio to a 16-bit PCM WAV file
pub fn save_audio<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let bytes = encode_wav(audio)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, seconds: f32) -> AudioData {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        AudioData::new(samples, sample_rate)
    }

    #[test]
    fn test_encode_header_and_length() {
        let audio = tone(16_000, 0.25);
        let bytes = encode_wav(&audio).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + audio.len() * 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let audio = tone(22_050, 0.5);
        save_audio(&path, &audio).unwrap();

        let loaded = load_audio(&path, None).unwrap();
        assert_eq!(loaded.sample_rate, 22_050);
        assert_eq!(loaded.len(), audio.len());
        assert!((loaded.samples[100] - audio.samples[100]).abs() < 1e-3);
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(i16::MAX / 2).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load_audio(&path, None).unwrap();
        assert_eq!(loaded.len(), 800);
        assert!((loaded.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_audio("/nonexistent/clip.wav", None),
            Err(Error::FileNotFound(_))
        ));
    }
}
