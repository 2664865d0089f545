//! Request orchestration

use super::assembler::assemble;
use super::executor::{EncodedAudio, Executor};
use super::params::{SynthesisParams, TtsRequest};
use super::PipelineStage;
use crate::audio::{AudioMime, OutputFormat};
use crate::auth::{AccessGate, FileSecretStore, SecretStore};
use crate::cache::{CacheSnapshot, CachedAudio, SynthesisCache};
use crate::config::{Config, Preset};
use crate::effects::{EffectCatalog, SoundDirectory};
use crate::engine::{AudioTools, EngineParams, Ffmpeg, Piper, SpeechEngine};
use crate::moderation::{ModerationFlags, ModerationMode, Moderator};
use crate::text::{parse_directives, resolve_length_scale, sanitize};
use crate::voice::{VoiceCatalog, VoiceDescriptor};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Synthesized audio plus response metadata
#[derive(Debug, Clone)]
pub struct TtsResponse {
    pub audio: Arc<[u8]>,
    pub mime: AudioMime,
    /// Response headers in emission order
    pub headers: Vec<(String, String)>,
}

impl TtsResponse {
    /// First header named `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_cache_hit(&self) -> bool {
        self.header("X-Cache") == Some("hit")
    }
}

/// Service health report
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub ok: bool,
    pub piper: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub voices: usize,
    pub max_concurrency: usize,
    pub cpus: usize,
    pub cache: CacheSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub cache: CacheSnapshot,
    pub max_concurrency: usize,
    pub available_permits: usize,
    pub voices: usize,
}

/// How the audio for a response was obtained
#[derive(Clone, Copy)]
enum Source {
    Hit,
    Miss { sample_rate: u32 },
    Assembled { effects: usize },
}

/// Per-request values echoed in headers
struct RequestEcho<'a> {
    req_id: &'a str,
    params: &'a SynthesisParams,
    requested_voice: &'a str,
    used_fallback: bool,
    flags: ModerationFlags,
}

/// Process-wide synthesis context, shared by all requests
pub struct Synthesizer {
    config: Config,
    catalog: VoiceCatalog,
    presets: BTreeMap<String, Preset>,
    moderator: Arc<Moderator>,
    cache: SynthesisCache,
    executor: Executor,
    effects: Arc<dyn EffectCatalog>,
    gate: AccessGate,
    secrets: Option<Arc<dyn SecretStore>>,
}

/// Builder for [`Synthesizer`]; unset capabilities default to the real programs
pub struct SynthesizerBuilder {
    config: Config,
    engine: Option<Arc<dyn SpeechEngine>>,
    tools: Option<Arc<dyn AudioTools>>,
    effects: Option<Arc<dyn EffectCatalog>>,
    secrets: Option<Arc<dyn SecretStore>>,
    scratch_dir: Option<PathBuf>,
}

impl SynthesizerBuilder {
    pub fn engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn audio_tools(mut self, tools: Arc<dyn AudioTools>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn effects(mut self, effects: Arc<dyn EffectCatalog>) -> Self {
        self.effects = Some(effects);
        self
    }

    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Directory for temporary artifacts, the system temp dir by default
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<Synthesizer> {
        let config = self.config;
        config.validate()?;

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(Piper::new(config.piper_bin.clone())));
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(Ffmpeg::new(config.ffmpeg_bin.clone())));
        let effects = self
            .effects
            .unwrap_or_else(|| Arc::new(SoundDirectory::new(&config.sounds_dir)));

        let secrets = match self.secrets {
            Some(store) => Some(store),
            None if config.auth.enabled => {
                let store: Arc<dyn SecretStore> =
                    Arc::new(FileSecretStore::new(config.auth.secrets_path()));
                Some(store)
            }
            None => None,
        };
        let gate = match &secrets {
            Some(store) if config.auth.enabled => AccessGate::from_store(store.as_ref())?,
            _ => {
                log::info!("Access keys disabled");
                AccessGate::disabled()
            }
        };

        let presets = config
            .presets
            .iter()
            .map(|(name, preset)| (name.trim().to_lowercase(), preset.clone()))
            .collect();

        let synthesizer = Synthesizer {
            catalog: VoiceCatalog::new(&config.voices_dir, config.aliases.clone()),
            presets,
            moderator: Arc::new(Moderator::new(&config.moderation)?),
            cache: SynthesisCache::new(config.cache_size, Duration::from_secs(config.cache_ttl_s)),
            executor: Executor::new(engine, tools, config.max_concurrency, self.scratch_dir),
            effects,
            gate,
            secrets,
            config,
        };

        // Scan before serving so requests never walk the directory themselves
        let voices = synthesizer.catalog.scan();

        log::info!(
            "Synthesizer ready: {} voices in {}, max_concurrency={}, cache={}x{}s",
            voices.len(),
            synthesizer.config.voices_dir.display(),
            synthesizer.config.max_concurrency,
            synthesizer.config.cache_size,
            synthesizer.config.cache_ttl_s
        );

        Ok(synthesizer)
    }
}

impl Synthesizer {
    /// Synthesizer using Piper, ffmpeg and the configured sounds directory
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> SynthesizerBuilder {
        SynthesizerBuilder {
            config,
            engine: None,
            tools: None,
            effects: None,
            secrets: None,
            scratch_dir: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Turn one request into audio
    pub async fn tts(&self, request: &TtsRequest) -> Result<TtsResponse> {
        let started = Instant::now();
        let req_id = format!("{:08x}", rand::random::<u32>());

        let format = match request.format.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => f.parse::<OutputFormat>()?,
            _ => self.config.default_format,
        };

        log::debug!("[{}] {}", req_id, PipelineStage::Sanitize.name());
        let text = sanitize(&request.text, self.config.max_text_chars);
        if text.is_empty() {
            return Err(Error::EmptyText);
        }

        log::debug!("[{}] {}", req_id, PipelineStage::Moderate.name());
        // A changed blocklist is re-read and recompiled inside filter
        let moderator = self.moderator.clone();
        let (text, flags) =
            tokio::task::spawn_blocking(move || moderator.filter(&text, ModerationMode::Drop))
                .await?;
        if text.is_empty() {
            return Err(Error::EmptyText);
        }

        log::debug!("[{}] {}", req_id, PipelineStage::Directives.name());
        let directives = parse_directives(&text, &self.catalog.aliases(), &self.presets)?;

        log::debug!("[{}] {}", req_id, PipelineStage::VoiceResolution.name());
        let requested_voice = match directives.alias_voice.clone() {
            Some(voice) => voice,
            None => {
                let raw = request.voice.as_deref().unwrap_or("").trim();
                self.catalog
                    .alias_target(raw)
                    .unwrap_or_else(|| raw.to_string())
            }
        };
        let resolved = self.catalog.resolve(&requested_voice)?;

        let preset_name = request
            .preset
            .as_deref()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .or(directives.preset)
            .unwrap_or_default();
        let preset = self.presets.get(&preset_name).cloned().unwrap_or_default();

        let engine = EngineParams {
            speaker: request.speaker_id,
            length_scale: resolve_length_scale(
                request.length_scale.or(preset.length_scale),
                directives.speed,
            ),
            noise_scale: request.noise_scale.or(preset.noise_scale),
            noise_w: request.noise_w.or(preset.noise_w),
            sentence_silence: request.sentence_silence.or(preset.sentence_silence),
        };

        let params = SynthesisParams {
            voice: resolved.voice,
            text: directives.text,
            format,
            engine,
            normalize: request.normalize.unwrap_or(self.config.normalize),
            bitrate: request
                .bitrate
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .unwrap_or(self.config.mp3_bitrate.as_str())
                .to_string(),
            preset: preset_name,
        };

        let echo = RequestEcho {
            req_id: &req_id,
            params: &params,
            requested_voice: &requested_voice,
            used_fallback: resolved.used_fallback,
            flags,
        };

        if self.effects.has_effect_tags(&params.text) {
            log::debug!("[{}] {}", req_id, PipelineStage::Assemble.name());
            let assembled = assemble(
                &self.executor,
                self.effects.as_ref(),
                &params,
                self.config.max_sfx_per_request,
            )
            .await?;
            let EncodedAudio { bytes, mime } = assembled.audio;
            let audio: Arc<[u8]> = Arc::from(bytes);
            let headers = response_headers(
                &echo,
                mime,
                audio.len(),
                Source::Assembled {
                    effects: assembled.effects_used,
                },
                elapsed_ms(started),
            );
            return Ok(TtsResponse {
                audio,
                mime,
                headers,
            });
        }

        log::debug!("[{}] {}", req_id, PipelineStage::CacheLookup.name());
        let key = params.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            let headers = response_headers(&echo, hit.mime, hit.bytes.len(), Source::Hit, 0);
            return Ok(TtsResponse {
                audio: hit.bytes,
                mime: hit.mime,
                headers,
            });
        }

        log::debug!("[{}] {}", req_id, PipelineStage::Render.name());
        let EncodedAudio { bytes, mime } = self.executor.synthesize(&params).await?;
        let audio: Arc<[u8]> = Arc::from(bytes);
        self.cache.put(
            key,
            CachedAudio {
                bytes: audio.clone(),
                mime,
            },
        );

        let headers = response_headers(
            &echo,
            mime,
            audio.len(),
            Source::Miss {
                sample_rate: params.voice.sample_rate,
            },
            elapsed_ms(started),
        );
        log::info!(
            "[{}] {} chars as {} -> {} bytes {}",
            req_id,
            params.text.chars().count(),
            params.voice.id,
            audio.len(),
            mime
        );

        Ok(TtsResponse {
            audio,
            mime,
            headers,
        })
    }

    /// Installed voices ordered by id
    pub fn voices(&self) -> Vec<Arc<VoiceDescriptor>> {
        self.catalog.list()
    }

    pub fn reload_voices(&self) -> usize {
        self.catalog.reload()
    }

    pub fn aliases(&self) -> BTreeMap<String, String> {
        self.catalog.aliases()
    }

    pub fn set_alias(&self, name: &str, voice: &str) {
        self.catalog.set_alias(name, voice);
    }

    pub fn remove_alias(&self, name: &str) -> bool {
        self.catalog.remove_alias(name)
    }

    pub fn presets(&self) -> &BTreeMap<String, Preset> {
        &self.presets
    }

    /// Moderate text without synthesizing it
    pub fn moderate(&self, text: &str, mode: ModerationMode) -> (String, ModerationFlags) {
        self.moderator.filter(text, mode)
    }

    /// Raw blocklist terms currently enforced
    pub fn blocklist_terms(&self) -> Vec<String> {
        self.moderator.blocklist().terms()
    }

    pub fn reload_blocklist(&self) -> usize {
        self.moderator.blocklist().reload()
    }

    pub fn health(&self) -> Health {
        Health {
            ok: true,
            piper: self.executor.engine().locate(),
            ffmpeg: self.executor.tools().locate(),
            voices: self.catalog.len(),
            max_concurrency: self.executor.max_concurrency(),
            cpus: num_cpus::get(),
            cache: self.cache.snapshot(),
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            cache: self.cache.snapshot(),
            max_concurrency: self.executor.max_concurrency(),
            available_permits: self.executor.available_permits(),
            voices: self.catalog.len(),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn access_gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn authorize(&self, role: &str, key: Option<&str>) -> Result<()> {
        self.gate.authorize(role, key)
    }

    pub fn secrets(&self) -> Option<&Arc<dyn SecretStore>> {
        self.secrets.as_ref()
    }
}

fn elapsed_ms(started: Instant) -> u128 {
    started.elapsed().as_millis()
}

fn response_headers(
    echo: &RequestEcho<'_>,
    mime: AudioMime,
    bytes: usize,
    source: Source,
    duration_ms: u128,
) -> Vec<(String, String)> {
    let params = echo.params;
    let mut headers: Vec<(String, String)> = Vec::with_capacity(20);
    let mut push = |name: &str, value: String| headers.push((name.to_string(), value));

    push("X-Req-Id", echo.req_id.to_string());
    push("X-Voice", params.voice.id.clone());
    push("X-Format", mime.as_str().to_string());
    push(
        "X-Cache",
        if matches!(source, Source::Hit) { "hit" } else { "miss" }.to_string(),
    );
    if let Source::Miss { sample_rate } = source {
        push("X-Sample-Rate", sample_rate.to_string());
    }
    if !matches!(source, Source::Hit) {
        push("X-Bytes", bytes.to_string());
    }
    push("X-Text-Chars", params.text.chars().count().to_string());
    push("X-Duration-MS", duration_ms.to_string());
    push("X-Preset", params.preset.clone());
    if let Source::Assembled { effects } = source {
        push("X-SFX-Count", effects.to_string());
    }
    push("Cache-Control", "no-store".to_string());
    push("X-Mod-Urls", echo.flags.urls.to_string());
    push("X-Mod-Emojis", echo.flags.emojis.to_string());
    push("X-Mod-Slurs", echo.flags.slurs.to_string());
    push(
        "Content-Disposition",
        format!(
            "inline; filename=\"{}-{}.{}\"",
            params.voice.id,
            echo.req_id,
            mime.extension()
        ),
    );
    push("X-Voice-Requested", echo.requested_voice.to_string());
    push(
        "X-Voice-Fallback",
        if echo.used_fallback { "1" } else { "0" }.to_string(),
    );

    headers
}
