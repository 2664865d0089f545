//! External program capabilities
//!
//! The pipeline never spawns processes directly. It talks to a
//! [`SpeechEngine`] and an [`AudioTools`] implementation, which lets tests
//! substitute in-process fakes for Piper and ffmpeg.

mod ffmpeg;
mod piper;

pub use ffmpeg::Ffmpeg;
pub use piper::{engine_args, Piper};

use crate::voice::VoiceDescriptor;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Engine default for `length_scale`
pub const DEFAULT_LENGTH_SCALE: f32 = 1.0;
/// Engine default for `noise_scale`
pub const DEFAULT_NOISE_SCALE: f32 = 0.667;
/// Engine default for `noise_w`
pub const DEFAULT_NOISE_W: f32 = 0.8;
/// Engine default for `sentence_silence` in seconds
pub const DEFAULT_SENTENCE_SILENCE: f32 = 0.2;
/// Engine default speaker index
pub const DEFAULT_SPEAKER: u32 = 0;

/// Engine parameters as requested
///
/// `None` leaves the engine default in place; only explicit values are
/// passed on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineParams {
    pub speaker: Option<u32>,
    pub length_scale: Option<f32>,
    pub noise_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub sentence_silence: Option<f32>,
}

/// A text-to-speech program
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Path of the engine executable, `None` when it is not installed
    fn locate(&self) -> Option<PathBuf>;

    /// Speak the UTF-8 text in `input` with `voice`, writing a WAV to `output`
    async fn render(
        &self,
        voice: &VoiceDescriptor,
        input: &Path,
        output: &Path,
        params: &EngineParams,
    ) -> Result<()>;
}

/// Audio post-processing program
///
/// Every operation reads `input` and writes a new file at `output`; an error
/// leaves the caller free to keep using `input`.
#[async_trait]
pub trait AudioTools: Send + Sync {
    fn locate(&self) -> Option<PathBuf>;

    /// EBU R128 loudness normalization
    async fn loudnorm(&self, input: &Path, output: &Path) -> Result<()>;

    async fn encode_mp3(&self, input: &Path, output: &Path, bitrate: &str) -> Result<()>;

    /// Convert any supported audio file to mono 16-bit PCM WAV at `sample_rate`
    async fn to_canonical(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()>;
}

/// Find `command` on `PATH`, or check it directly when it contains a path
pub fn find_executable(command: &str) -> Option<PathBuf> {
    if command.is_empty() {
        return None;
    }

    let direct = Path::new(command);
    if direct.components().count() > 1 || direct.is_absolute() {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;

    #[cfg(windows)]
    let exts: Vec<String> = std::env::var_os("PATHEXT")
        .map(|v| {
            v.to_string_lossy()
                .split(';')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| vec![".exe".to_string(), ".bat".to_string(), ".cmd".to_string()]);

    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(command);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            for ext in &exts {
                let with_ext = dir.join(format!("{command}{ext}"));
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }
    }

    None
}

/// Whether `path` exists and holds at least one byte
pub(crate) async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_missing_executable() {
        assert!(find_executable("").is_none());
        assert!(find_executable("definitely-not-a-real-binary-5f1c").is_none());
        assert!(find_executable("/nonexistent/dir/piper").is_none());
    }

    #[test]
    fn test_find_direct_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("piper");
        std::fs::write(&bin, b"#!/bin/sh\n").unwrap();
        assert_eq!(find_executable(bin.to_str().unwrap()), Some(bin));
    }

    #[tokio::test]
    async fn test_has_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        assert!(!has_content(&path).await);
        std::fs::write(&path, b"").unwrap();
        assert!(!has_content(&path).await);
        std::fs::write(&path, b"RIFF").unwrap();
        assert!(has_content(&path).await);
    }
}
