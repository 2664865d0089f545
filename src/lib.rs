//! piperline - concurrent text-to-speech request pipeline around Piper
//!
//! Turns short user messages into spoken audio for interactive settings such
//! as chat overlays: text is sanitized and moderated, in-text directives pick
//! the voice, preset and speed, identical requests are served from a cache,
//! and `[sfx:name]` tags splice sound effects between speech.
//!
//! # Features
//! - Obfuscation-tolerant blocklist (leetspeak, diacritics, filler) with hot reload
//! - Voice aliases with graceful fallback to a default voice
//! - Bounded, time-expiring result cache keyed by every output-affecting parameter
//! - Concurrency-limited engine invocation with RAII cleanup of temporary files
//! - Loudness normalization and MP3 transcoding through ffmpeg, with WAV fallback
//!
//! # Example
//! ```no_run
//! use piperline::{Config, Synthesizer, TtsRequest};
//!
//! # async fn run() -> piperline::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let synthesizer = Synthesizer::new(config)?;
//!
//! let response = synthesizer.tts(&TtsRequest::new("hello [fast] world")).await?;
//! std::fs::write("hello.mp3", &response.audio)?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod auth;
pub mod cache;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod moderation;
pub mod pipeline;
pub mod text;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Synthesizer, SynthesizerBuilder, TtsRequest, TtsResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate assumed for voices whose metadata names none
pub const DEFAULT_SAMPLE_RATE: u32 = voice::DEFAULT_SAMPLE_RATE;
