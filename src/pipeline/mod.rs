//! Synthesis request pipeline
//!
//! Coordinates sanitization, moderation, directive parsing, voice
//! resolution, caching and audio production.

mod assembler;
mod executor;
mod params;
mod synthesis;

pub use assembler::{assemble, AssembledAudio};
pub use executor::{EncodedAudio, Executor, RenderedWav};
pub use params::{SynthesisParams, TtsRequest};
pub use synthesis::{Health, Metrics, Synthesizer, SynthesizerBuilder, TtsResponse};

/// Pipeline stage enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Sanitize,
    Moderate,
    Directives,
    VoiceResolution,
    CacheLookup,
    Render,
    Assemble,
}

impl PipelineStage {
    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Sanitize => "sanitize",
            PipelineStage::Moderate => "moderate",
            PipelineStage::Directives => "directives",
            PipelineStage::VoiceResolution => "voice",
            PipelineStage::CacheLookup => "cache",
            PipelineStage::Render => "render",
            PipelineStage::Assemble => "assemble",
        }
    }
}

/// Concatenate audio segments with silence
pub fn concatenate_audio(segments: &[Vec<f32>], silence_duration_ms: u32, sample_rate: u32) -> Vec<f32> {
    let silence_samples = (silence_duration_ms as usize * sample_rate as usize) / 1000;
    let silence = vec![0.0f32; silence_samples];

    let total: usize = segments.iter().map(Vec::len).sum::<usize>()
        + silence_samples * segments.len().saturating_sub(1);
    let mut result = Vec::with_capacity(total);

    for (i, segment) in segments.iter().enumerate() {
        result.extend_from_slice(segment);
        if i + 1 < segments.len() {
            result.extend_from_slice(&silence);
        }
    }

    result
}
