//! Request and resolved synthesis parameters

use crate::audio::OutputFormat;
use crate::cache::CacheKey;
use crate::engine::{EngineParams, DEFAULT_SENTENCE_SILENCE, DEFAULT_SPEAKER};
use crate::voice::VoiceDescriptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Incoming synthesis request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsRequest {
    pub text: String,
    /// Voice id or alias; empty selects the default voice
    pub voice: Option<String>,
    pub preset: Option<String>,
    /// `wav` or `mp3`
    pub format: Option<String>,
    pub length_scale: Option<f32>,
    pub noise_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub sentence_silence: Option<f32>,
    pub speaker_id: Option<u32>,
    pub normalize: Option<bool>,
    pub bitrate: Option<String>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format.as_str().to_string());
        self
    }
}

/// Everything needed to produce audio for one request
#[derive(Debug, Clone)]
pub struct SynthesisParams {
    pub voice: Arc<VoiceDescriptor>,
    pub text: String,
    pub format: OutputFormat,
    pub engine: EngineParams,
    pub normalize: bool,
    pub bitrate: String,
    /// Selected preset name, empty when none
    pub preset: String,
}

impl SynthesisParams {
    /// Key with every unset engine parameter replaced by the value the
    /// engine falls back to for this voice
    pub fn cache_key(&self) -> CacheKey {
        let e = &self.engine;
        let voice = &self.voice.inference;
        CacheKey {
            voice: self.voice.id.clone(),
            text: self.text.clone(),
            format: self.format,
            length_scale: e.length_scale.unwrap_or(voice.length_scale).to_bits(),
            noise_scale: e.noise_scale.unwrap_or(voice.noise_scale).to_bits(),
            noise_w: e.noise_w.unwrap_or(voice.noise_w).to_bits(),
            sentence_silence: e
                .sentence_silence
                .unwrap_or(DEFAULT_SENTENCE_SILENCE)
                .to_bits(),
            speaker: e.speaker.unwrap_or(DEFAULT_SPEAKER),
            normalize: self.normalize,
            bitrate: self.bitrate.clone(),
            preset: self.preset.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params(engine: EngineParams) -> SynthesisParams {
        SynthesisParams {
            voice: Arc::new(VoiceDescriptor {
                id: "v".into(),
                model_path: PathBuf::from("v.onnx"),
                config_path: PathBuf::from("v.onnx.json"),
                sample_rate: 22050,
                speakers: 1,
                language: String::new(),
                inference: Default::default(),
            }),
            text: "hello".into(),
            format: OutputFormat::Wav,
            engine,
            normalize: false,
            bitrate: "128k".into(),
            preset: String::new(),
        }
    }

    #[test]
    fn test_unset_equals_explicit_default() {
        let unset = params(EngineParams::default()).cache_key();
        let explicit = params(EngineParams {
            speaker: Some(0),
            length_scale: Some(1.0),
            noise_scale: Some(0.667),
            noise_w: Some(0.8),
            sentence_silence: Some(0.2),
        })
        .cache_key();
        assert_eq!(unset, explicit);
    }

    #[test]
    fn test_unset_resolves_to_voice_inference() {
        let with_voice_defaults = |engine: EngineParams| {
            let mut p = params(engine);
            Arc::make_mut(&mut p.voice).inference.noise_scale = 0.333;
            p.cache_key()
        };

        let unset = with_voice_defaults(EngineParams::default());
        let global = with_voice_defaults(EngineParams {
            noise_scale: Some(0.667),
            ..Default::default()
        });
        let voice = with_voice_defaults(EngineParams {
            noise_scale: Some(0.333),
            ..Default::default()
        });
        assert_ne!(unset, global);
        assert_eq!(unset, voice);
    }

    #[test]
    fn test_request_from_json() {
        let req: TtsRequest =
            serde_json::from_str(r#"{"text": "hi", "format": "wav", "speaker_id": 2}"#).unwrap();
        assert_eq!(req.text, "hi");
        assert_eq!(req.format.as_deref(), Some("wav"));
        assert_eq!(req.speaker_id, Some(2));
        assert_eq!(req.voice, None);
    }
}
