//! ffmpeg-backed audio tools

use super::{find_executable, has_content, AudioTools};
use crate::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Loudness target used by `loudnorm`
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: String,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, input: &Path, filter_args: &[&str], output: &Path) -> Result<()> {
        let program = self
            .locate()
            .ok_or_else(|| Error::Audio(format!("ffmpeg not found: {}", self.binary)))?;

        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.into(),
        ];
        args.extend(filter_args.iter().map(OsString::from));
        args.push(output.into());

        let result = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            return Err(Error::Audio(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !has_content(output).await {
            return Err(Error::Audio("ffmpeg produced no output".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioTools for Ffmpeg {
    fn locate(&self) -> Option<PathBuf> {
        find_executable(&self.binary)
    }

    async fn loudnorm(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(input, &["-af", LOUDNORM_FILTER], output).await
    }

    async fn encode_mp3(&self, input: &Path, output: &Path, bitrate: &str) -> Result<()> {
        self.run(input, &["-codec:a", "libmp3lame", "-b:a", bitrate], output)
            .await
    }

    async fn to_canonical(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
        let rate = sample_rate.to_string();
        self.run(
            input,
            &["-ac", "1", "-ar", &rate, "-c:a", "pcm_s16le"],
            output,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_ffmpeg_errors() {
        let tools = Ffmpeg::new("/nonexistent/ffmpeg");
        assert!(tools.locate().is_none());

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.mp3");
        let err = tools.encode_mp3(&input, &output, "128k").await.unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
        assert!(!output.exists());
    }
}
