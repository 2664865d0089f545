//! Piper command-line engine

use super::{find_executable, has_content, EngineParams, SpeechEngine};
use crate::voice::VoiceDescriptor;
use crate::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct Piper {
    binary: String,
}

impl Piper {
    /// `binary` is a command name looked up on `PATH` or a path to the executable
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Command-line arguments for one render
///
/// Optional parameters appear only when set.
pub fn engine_args(
    voice: &VoiceDescriptor,
    input: &Path,
    output: &Path,
    params: &EngineParams,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--model".into(),
        voice.model_path.clone().into(),
        "--config".into(),
        voice.config_path.clone().into(),
        "--input_file".into(),
        input.into(),
        "--output_file".into(),
        output.into(),
        "-q".into(),
    ];

    if let Some(speaker) = params.speaker {
        args.push("--speaker".into());
        args.push(speaker.to_string().into());
    }

    let floats = [
        ("--length_scale", params.length_scale),
        ("--noise_scale", params.noise_scale),
        ("--noise_w", params.noise_w),
        ("--sentence_silence", params.sentence_silence),
    ];
    for (flag, value) in floats {
        if let Some(value) = value {
            args.push(flag.into());
            args.push(value.to_string().into());
        }
    }

    args
}

#[async_trait]
impl SpeechEngine for Piper {
    fn locate(&self) -> Option<PathBuf> {
        find_executable(&self.binary)
    }

    async fn render(
        &self,
        voice: &VoiceDescriptor,
        input: &Path,
        output: &Path,
        params: &EngineParams,
    ) -> Result<()> {
        let program = self
            .locate()
            .ok_or_else(|| Error::EngineUnavailable(self.binary.clone()))?;

        log::debug!("Running {} for voice {}", program.display(), voice.id);

        let result = Command::new(&program)
            .args(engine_args(voice, input, output, params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::EngineFailed(format!("failed to spawn {}: {}", program.display(), e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::EngineFailed(format!(
                "{} exited with {}: {}",
                program.display(),
                result.status,
                stderr.trim()
            )));
        }

        if !has_content(output).await {
            return Err(Error::EngineFailed("engine produced no output".into()));
        }

        Ok(())
    }
}
