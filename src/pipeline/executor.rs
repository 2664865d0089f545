//! Engine invocation and post-processing
//!
//! Every temporary file lives in a [`TempPath`] guard, so artifacts are
//! removed on success, on error and on cancellation alike.

use super::params::SynthesisParams;
use crate::audio::{AudioMime, OutputFormat, MIN_AUDIO_BYTES};
use crate::engine::{has_content, AudioTools, EngineParams, SpeechEngine};
use crate::voice::VoiceDescriptor;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::sync::Semaphore;

/// Encoded output and its actual MIME type
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub mime: AudioMime,
}

/// An engine-rendered WAV and the artifacts backing it
#[derive(Debug)]
pub struct RenderedWav {
    path: PathBuf,
    _artifacts: Vec<TempPath>,
}

impl RenderedWav {
    /// Final WAV, normalized when normalization was requested and succeeded
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct Executor {
    engine: Arc<dyn SpeechEngine>,
    tools: Arc<dyn AudioTools>,
    limiter: Arc<Semaphore>,
    max_concurrency: usize,
    scratch_dir: PathBuf,
}

impl Executor {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        tools: Arc<dyn AudioTools>,
        max_concurrency: usize,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            engine,
            tools,
            limiter: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            scratch_dir: scratch_dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn engine(&self) -> &dyn SpeechEngine {
        self.engine.as_ref()
    }

    pub fn tools(&self) -> &dyn AudioTools {
        self.tools.as_ref()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Engine slots not currently in use
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Reserve an empty scratch file, deleted when the guard drops
    pub(crate) fn scratch(&self, suffix: &str) -> Result<TempPath> {
        let file = tempfile::Builder::new()
            .prefix("piperline-")
            .suffix(suffix)
            .tempfile_in(&self.scratch_dir)?;
        Ok(file.into_temp_path())
    }

    /// Run the engine once under the concurrency limit
    pub async fn render_wav(
        &self,
        voice: &VoiceDescriptor,
        text: &str,
        params: &EngineParams,
        normalize: bool,
    ) -> Result<RenderedWav> {
        if self.engine.locate().is_none() {
            return Err(Error::EngineUnavailable(
                "executable not found on PATH".into(),
            ));
        }

        let input = self.scratch(".txt")?;
        tokio::fs::write(&input, format!("{text}\n")).await?;
        let output = self.scratch(".wav")?;

        {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| Error::EngineFailed("engine limiter closed".into()))?;
            log::debug!("Rendering {} chars with {}", text.chars().count(), voice.id);
            self.engine.render(voice, &input, &output, params).await?;
        }

        if !has_content(&output).await {
            return Err(Error::EngineFailed("engine produced no output".into()));
        }

        let mut path = output.to_path_buf();
        let mut artifacts = vec![input, output];

        if normalize {
            let normalized = self.scratch(".norm.wav")?;
            match self.tools.loudnorm(&path, &normalized).await {
                Ok(()) => {
                    if has_content(&normalized).await {
                        path = normalized.to_path_buf();
                        artifacts.push(normalized);
                    } else {
                        log::warn!("Loudness normalization produced no output, keeping input");
                    }
                }
                Err(e) => log::warn!("Loudness normalization failed, keeping input: {}", e),
            }
        }

        Ok(RenderedWav {
            path,
            _artifacts: artifacts,
        })
    }

    /// Transcode a WAV file to `format`
    ///
    /// An MP3 encoding failure falls back to the WAV bytes; the returned MIME
    /// always describes what was actually produced.
    pub async fn encode(&self, wav: &Path, format: OutputFormat, bitrate: &str) -> Result<EncodedAudio> {
        if format == OutputFormat::Mp3 {
            let mp3 = self.scratch(".mp3")?;
            match self.tools.encode_mp3(wav, &mp3, bitrate).await {
                Ok(()) => match tokio::fs::read(&mp3).await {
                    Ok(bytes) if !bytes.is_empty() => {
                        return Ok(EncodedAudio {
                            bytes,
                            mime: AudioMime::Mpeg,
                        })
                    }
                    Ok(_) => log::warn!("MP3 encoder produced no output, returning WAV"),
                    Err(e) => log::warn!("Failed to read MP3 output, returning WAV: {}", e),
                },
                Err(e) => log::warn!("MP3 encoding failed, returning WAV: {}", e),
            }
        }

        Ok(EncodedAudio {
            bytes: tokio::fs::read(wav).await?,
            mime: AudioMime::Wav,
        })
    }

    /// Render, post-process and encode one utterance
    pub async fn synthesize(&self, params: &SynthesisParams) -> Result<EncodedAudio> {
        let rendered = self
            .render_wav(&params.voice, &params.text, &params.engine, params.normalize)
            .await?;
        let audio = self
            .encode(rendered.path(), params.format, &params.bitrate)
            .await?;
        ensure_audible(audio)
    }
}

/// Reject output too small to hold any samples
pub(crate) fn ensure_audible(audio: EncodedAudio) -> Result<EncodedAudio> {
    if audio.bytes.len() <= MIN_AUDIO_BYTES {
        return Err(Error::EmptyAudio);
    }
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{save_audio, AudioData};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes a short tone and records peak concurrency
    #[derive(Default)]
    struct ToneEngine {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SpeechEngine for ToneEngine {
        fn locate(&self) -> Option<PathBuf> {
            Some(PathBuf::from("tone"))
        }

        async fn render(
            &self,
            _voice: &VoiceDescriptor,
            _input: &Path,
            output: &Path,
            _params: &EngineParams,
        ) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            save_audio(output, &AudioData::new(vec![0.25; 2205], 22050))
        }
    }

    struct NoTools;

    #[async_trait]
    impl AudioTools for NoTools {
        fn locate(&self) -> Option<PathBuf> {
            None
        }
        async fn loudnorm(&self, _: &Path, _: &Path) -> Result<()> {
            Err(Error::Audio("no tools".into()))
        }
        async fn encode_mp3(&self, _: &Path, _: &Path, _: &str) -> Result<()> {
            Err(Error::Audio("no tools".into()))
        }
        async fn to_canonical(&self, _: &Path, _: &Path, _: u32) -> Result<()> {
            Err(Error::Audio("no tools".into()))
        }
    }

    fn voice() -> VoiceDescriptor {
        VoiceDescriptor {
            id: "tone".into(),
            model_path: PathBuf::from("tone.onnx"),
            config_path: PathBuf::from("tone.onnx.json"),
            sample_rate: 22050,
            speakers: 1,
            language: String::new(),
            inference: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_limiter_bounds_engine_calls() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ToneEngine::default());
        let executor = Arc::new(Executor::new(
            engine.clone(),
            Arc::new(NoTools),
            2,
            Some(dir.path().to_path_buf()),
        ));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                let rendered = executor
                    .render_wav(&voice(), "hi", &EngineParams::default(), false)
                    .await
                    .unwrap();
                assert!(rendered.path().exists());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(engine.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(executor.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_failed_normalize_keeps_engine_output() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new(
            Arc::new(ToneEngine::default()),
            Arc::new(NoTools),
            1,
            Some(dir.path().to_path_buf()),
        );

        let rendered = executor
            .render_wav(&voice(), "hi", &EngineParams::default(), true)
            .await
            .unwrap();
        assert!(rendered.path().to_string_lossy().ends_with(".wav"));
        assert!(!rendered.path().to_string_lossy().ends_with(".norm.wav"));
        drop(rendered);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_tiny_output_is_empty_audio() {
        let tiny = EncodedAudio {
            bytes: vec![0; MIN_AUDIO_BYTES],
            mime: AudioMime::Wav,
        };
        assert!(matches!(ensure_audible(tiny), Err(Error::EmptyAudio)));
    }
}
