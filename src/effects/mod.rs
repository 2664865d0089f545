//! Sound-effect tags inside speech text
//!
//! Text such as `hello [sfx:airhorn] world` is split into speech and effect
//! segments; each effect tag names a clip in the sounds directory.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref SFX_TAG_REGEX: Regex = Regex::new(r"(?i)\[sfx:([a-z0-9_]+)\]").unwrap();
}

/// Clip extensions tried in order when resolving a tag
pub const SOUND_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "flac"];

/// One unit of an assembled utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Speech(String),
    /// Lowercased effect name
    Effect(String),
}

/// Effect-tag handling injected into the synthesizer
pub trait EffectCatalog: Send + Sync {
    fn has_effect_tags(&self, text: &str) -> bool;

    /// Split `text` into segments in source order
    fn parse_segments(&self, text: &str) -> Vec<Segment>;

    /// Clip file for an effect name, `None` when it is not installed
    fn resolve(&self, tag: &str) -> Option<PathBuf>;
}

/// Split on `[sfx:name]` tags, keeping speech between them
///
/// Speech runs are trimmed; whitespace-only runs are dropped.
pub fn split_sfx_tags(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in SFX_TAG_REGEX.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_speech(&mut segments, &text[last..whole.start()]);
        segments.push(Segment::Effect(caps[1].to_lowercase()));
        last = whole.end();
    }
    push_speech(&mut segments, &text[last..]);

    segments
}

fn push_speech(segments: &mut Vec<Segment>, run: &str) {
    let run = run.trim();
    if !run.is_empty() {
        segments.push(Segment::Speech(run.to_string()));
    }
}

/// Effects stored as `<dir>/<name>.<ext>`
#[derive(Debug, Clone)]
pub struct SoundDirectory {
    root: PathBuf,
}

impl SoundDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EffectCatalog for SoundDirectory {
    fn has_effect_tags(&self, text: &str) -> bool {
        SFX_TAG_REGEX.is_match(text)
    }

    fn parse_segments(&self, text: &str) -> Vec<Segment> {
        split_sfx_tags(text)
    }

    fn resolve(&self, tag: &str) -> Option<PathBuf> {
        let name = tag.trim().to_lowercase();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        SOUND_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }
}
