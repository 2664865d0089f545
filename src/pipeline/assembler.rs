//! Speech interleaved with sound effects
//!
//! Every segment is decoded to the canonical format (mono, 48 kHz) and the
//! clips are appended in source order. A segment that cannot be produced is
//! dropped; only a missing engine aborts the whole utterance.

use super::concatenate_audio;
use super::executor::{ensure_audible, EncodedAudio, Executor};
use super::params::SynthesisParams;
use crate::audio::{encode_wav, load_audio, AudioData, CANONICAL_SAMPLE_RATE};
use crate::effects::{EffectCatalog, Segment};
use crate::{Error, Result};
use std::path::Path;

/// Assembled output and how many effect clips went into it
#[derive(Debug, Clone)]
pub struct AssembledAudio {
    pub audio: EncodedAudio,
    pub effects_used: usize,
}

pub async fn assemble(
    executor: &Executor,
    effects: &dyn EffectCatalog,
    params: &SynthesisParams,
    max_effects: usize,
) -> Result<AssembledAudio> {
    let mut clips: Vec<Vec<f32>> = Vec::new();
    let mut effects_used = 0;

    for segment in effects.parse_segments(&params.text) {
        match segment {
            Segment::Effect(tag) => {
                if effects_used >= max_effects {
                    log::debug!("Effect limit {} reached, skipping '{}'", max_effects, tag);
                    continue;
                }
                let Some(path) = effects.resolve(&tag) else {
                    log::warn!("Unknown sound effect '{}'", tag);
                    continue;
                };
                match canonical_clip(executor, &path).await {
                    Ok(clip) => {
                        clips.push(clip);
                        effects_used += 1;
                    }
                    Err(e) => log::warn!("Dropping effect '{}': {}", tag, e),
                }
            }
            Segment::Speech(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let rendered = match executor
                    .render_wav(&params.voice, text, &params.engine, params.normalize)
                    .await
                {
                    Ok(rendered) => rendered,
                    Err(e) if !e.is_segment_local() => return Err(e),
                    Err(e) => {
                        log::warn!("Dropping speech segment: {}", e);
                        continue;
                    }
                };
                match canonical_clip(executor, rendered.path()).await {
                    Ok(clip) => clips.push(clip),
                    Err(e) => log::warn!("Dropping speech segment: {}", e),
                }
            }
        }
    }

    if clips.is_empty() {
        return Err(Error::EmptySegments);
    }

    let merged = AudioData::new(
        concatenate_audio(&clips, 0, CANONICAL_SAMPLE_RATE),
        CANONICAL_SAMPLE_RATE,
    );
    log::debug!(
        "Assembled {} clips, {:.2}s",
        clips.len(),
        merged.duration()
    );

    let wav = executor.scratch(".wav")?;
    tokio::fs::write(&wav, encode_wav(&merged)?).await?;
    let audio = executor.encode(&wav, params.format, &params.bitrate).await?;

    Ok(AssembledAudio {
        audio: ensure_audible(audio)?,
        effects_used,
    })
}

/// Decode `path` as canonical samples, converting through the audio tools
/// when it is not a WAV the in-process decoder understands
async fn canonical_clip(executor: &Executor, path: &Path) -> Result<Vec<f32>> {
    match decode_canonical(path).await {
        Ok(samples) => return Ok(samples),
        Err(e) => log::debug!(
            "{} not decodable in-process ({}), converting",
            path.display(),
            e
        ),
    }

    let converted = executor.scratch(".wav")?;
    executor
        .tools()
        .to_canonical(path, &converted, CANONICAL_SAMPLE_RATE)
        .await?;
    decode_canonical(&converted).await
}

async fn decode_canonical(path: &Path) -> Result<Vec<f32>> {
    let owned = path.to_path_buf();
    let audio =
        tokio::task::spawn_blocking(move || load_audio(&owned, Some(CANONICAL_SAMPLE_RATE)))
            .await??;
    if audio.is_empty() {
        return Err(Error::Audio(format!("{} holds no samples", path.display())));
    }
    Ok(audio.samples)
}
