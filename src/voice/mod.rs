//! Installed voice discovery and resolution
//!
//! A voice is a Piper model `NAME.onnx` next to its metadata `NAME.onnx.json`.
//! The catalog is scanned lazily on first use and replaced wholesale on
//! reload; descriptors are never edited in place.

use crate::engine::{DEFAULT_LENGTH_SCALE, DEFAULT_NOISE_SCALE, DEFAULT_NOISE_W};
use crate::{Error, Result};
use jwalk::WalkDir;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sample rate assumed when metadata names none
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

const METADATA_SUFFIX: &str = ".onnx.json";

/// One installed voice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceDescriptor {
    pub id: String,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
    pub sample_rate: u32,
    pub speakers: u32,
    pub language: String,
    /// Values the engine uses for parameters left off its command line
    pub inference: InferenceDefaults,
}

/// Per-voice synthesis defaults from the metadata `inference` section
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InferenceDefaults {
    pub length_scale: f32,
    pub noise_scale: f32,
    pub noise_w: f32,
}

impl Default for InferenceDefaults {
    fn default() -> Self {
        Self {
            length_scale: DEFAULT_LENGTH_SCALE,
            noise_scale: DEFAULT_NOISE_SCALE,
            noise_w: DEFAULT_NOISE_W,
        }
    }
}

impl VoiceDescriptor {
    /// Build a descriptor from the metadata sidecar path
    ///
    /// Returns `None` when the companion model file is missing.
    pub fn from_metadata_path(config_path: &Path) -> Option<Self> {
        let name = config_path.file_name()?.to_str()?;
        let model_name = name.strip_suffix(".json")?;
        let model_path = config_path.with_file_name(model_name);
        if !model_path.is_file() {
            return None;
        }

        let id = model_name.strip_suffix(".onnx")?.to_string();
        let meta = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
            .unwrap_or(Value::Null);

        Some(Self {
            id,
            model_path,
            config_path: config_path.to_path_buf(),
            sample_rate: metadata_sample_rate(&meta),
            speakers: metadata_speakers(&meta),
            language: metadata_language(&meta),
            inference: metadata_inference(&meta),
        })
    }
}

fn metadata_sample_rate(meta: &Value) -> u32 {
    meta.get("sample_rate")
        .or_else(|| meta.pointer("/audio/sample_rate"))
        .and_then(Value::as_u64)
        .map(|sr| sr as u32)
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

fn metadata_speakers(meta: &Value) -> u32 {
    let count = match meta.get("speakers").or_else(|| meta.get("speaker_id_map")) {
        Some(Value::Array(list)) => list.len() as u64,
        Some(Value::Object(map)) => map.len() as u64,
        _ => meta.get("num_speakers").and_then(Value::as_u64).unwrap_or(1),
    };
    count.max(1) as u32
}

fn metadata_language(meta: &Value) -> String {
    let lang = match meta.get("language") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Object(obj)) => obj.get("code").and_then(Value::as_str),
        _ => None,
    };
    lang.or_else(|| meta.pointer("/espeak/voice").and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

fn metadata_inference(meta: &Value) -> InferenceDefaults {
    let value = |key: &str, default: f32| {
        meta.pointer(&format!("/inference/{key}"))
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(default)
    };
    let defaults = InferenceDefaults::default();
    InferenceDefaults {
        length_scale: value("length_scale", defaults.length_scale),
        noise_scale: value("noise_scale", defaults.noise_scale),
        noise_w: value("noise_w", defaults.noise_w),
    }
}

/// Scan `root` recursively for voices
///
/// Ids come from file names, so two models with the same name in different
/// subdirectories collide; the one visited later wins.
pub fn scan_voices(root: &Path) -> BTreeMap<String, Arc<VoiceDescriptor>> {
    let mut voices = BTreeMap::new();

    if !root.is_dir() {
        log::warn!("Voices directory not found: {}", root.display());
        return voices;
    }

    let entries = WalkDir::new(root)
        .sort(true)
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|e| log::warn!("Error reading voices directory entry: {e}"))
                .ok()
        })
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(METADATA_SUFFIX))
        });

    for path in entries {
        let Some(voice) = VoiceDescriptor::from_metadata_path(&path) else {
            continue;
        };
        if let Some(previous) = voices.insert(voice.id.clone(), Arc::new(voice)) {
            log::warn!(
                "Voice id '{}' from {} replaced by a later model",
                previous.id,
                previous.model_path.display()
            );
        }
    }

    voices
}

/// Outcome of resolving a requested voice
#[derive(Debug, Clone)]
pub struct ResolvedVoice {
    pub voice: Arc<VoiceDescriptor>,
    /// A non-empty request named no known voice
    pub used_fallback: bool,
}

pub struct VoiceCatalog {
    root: PathBuf,
    voices: RwLock<Option<Arc<BTreeMap<String, Arc<VoiceDescriptor>>>>>,
    aliases: RwLock<BTreeMap<String, String>>,
}

impl VoiceCatalog {
    pub fn new<P: AsRef<Path>>(root: P, aliases: BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(name, voice)| (name.trim().to_lowercase(), voice))
            .collect();
        Self {
            root: root.as_ref().to_path_buf(),
            voices: RwLock::new(None),
            aliases: RwLock::new(aliases),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan now, replacing the current catalog
    pub fn scan(&self) -> Arc<BTreeMap<String, Arc<VoiceDescriptor>>> {
        let voices = Arc::new(scan_voices(&self.root));
        log::info!(
            "Scanned {}: {} voices",
            self.root.display(),
            voices.len()
        );
        *self.voices.write() = Some(voices.clone());
        voices
    }

    fn snapshot(&self) -> Arc<BTreeMap<String, Arc<VoiceDescriptor>>> {
        if let Some(voices) = self.voices.read().as_ref() {
            return voices.clone();
        }
        self.scan()
    }

    /// All voices ordered by id
    pub fn list(&self) -> Vec<Arc<VoiceDescriptor>> {
        self.snapshot().values().cloned().collect()
    }

    /// Rescan and swap in the result, returning the new voice count
    ///
    /// Readers keep the previous catalog until the new one is complete.
    pub fn reload(&self) -> usize {
        self.scan().len()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Arc<VoiceDescriptor>> {
        self.snapshot().get(id).cloned()
    }

    /// Resolve a requested id through aliases, falling back to the first voice
    pub fn resolve(&self, requested: &str) -> Result<ResolvedVoice> {
        let requested = requested.trim();
        let id = self
            .alias_target(requested)
            .unwrap_or_else(|| requested.to_string());

        let voices = self.snapshot();
        if let Some(voice) = voices.get(&id) {
            return Ok(ResolvedVoice {
                voice: voice.clone(),
                used_fallback: false,
            });
        }

        let default = voices
            .values()
            .next()
            .cloned()
            .ok_or(Error::NoVoicesAvailable)?;

        if !requested.is_empty() {
            log::debug!("Unknown voice '{}', using '{}'", requested, default.id);
        }

        Ok(ResolvedVoice {
            voice: default,
            used_fallback: !requested.is_empty(),
        })
    }

    /// Voice id an alias points at
    pub fn alias_target(&self, name: &str) -> Option<String> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        self.aliases.read().get(&name).cloned()
    }

    pub fn aliases(&self) -> BTreeMap<String, String> {
        self.aliases.read().clone()
    }

    pub fn set_alias(&self, name: &str, voice: &str) {
        let name = name.trim().to_lowercase();
        log::info!("Alias '{}' -> '{}'", name, voice);
        self.aliases.write().insert(name, voice.trim().to_string());
    }

    pub fn remove_alias(&self, name: &str) -> bool {
        self.aliases
            .write()
            .remove(&name.trim().to_lowercase())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(root: &Path, rel: &str, meta: &str) {
        let model = root.join(format!("{rel}.onnx"));
        std::fs::create_dir_all(model.parent().unwrap()).unwrap();
        std::fs::write(&model, b"onnx").unwrap();
        std::fs::write(root.join(format!("{rel}.onnx.json")), meta).unwrap();
    }

    #[test]
    fn test_scan_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        install(
            dir.path(),
            "en/en_US-amy-low",
            r#"{"audio": {"sample_rate": 16000}, "num_speakers": 1, "language": {"code": "en_US"}}"#,
        );
        install(
            dir.path(),
            "de_DE-thorsten-medium",
            r#"{"sample_rate": 22050, "speaker_id_map": {"a": 0, "b": 1}, "espeak": {"voice": "de"}}"#,
        );
        // metadata without a model is ignored
        std::fs::write(dir.path().join("orphan.onnx.json"), "{}").unwrap();

        let catalog = VoiceCatalog::new(dir.path(), BTreeMap::new());
        let voices = catalog.list();
        let ids: Vec<&str> = voices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["de_DE-thorsten-medium", "en_US-amy-low"]);

        assert_eq!(voices[0].speakers, 2);
        assert_eq!(voices[0].language, "de");
        assert_eq!(voices[1].sample_rate, 16000);
        assert_eq!(voices[1].language, "en_US");
    }

    #[test]
    fn test_bad_metadata_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "broken", "not json");
        let catalog = VoiceCatalog::new(dir.path(), BTreeMap::new());
        let voice = catalog.get("broken").unwrap();
        assert_eq!(voice.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(voice.speakers, 1);
        assert_eq!(voice.language, "");
        assert_eq!(voice.inference, InferenceDefaults::default());
    }

    #[test]
    fn test_inference_defaults_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        install(
            dir.path(),
            "whisper",
            r#"{"inference": {"noise_scale": 0.333, "length_scale": 1.2}}"#,
        );
        let voice = VoiceCatalog::new(dir.path(), BTreeMap::new())
            .get("whisper")
            .unwrap();
        assert_eq!(voice.inference.noise_scale, 0.333);
        assert_eq!(voice.inference.length_scale, 1.2);
        assert_eq!(voice.inference.noise_w, DEFAULT_NOISE_W);
    }

    #[test]
    fn test_resolve_fallback_policy() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "b-voice", "{}");
        install(dir.path(), "a-voice", "{}");
        let catalog = VoiceCatalog::new(dir.path(), BTreeMap::new());

        let known = catalog.resolve(" b-voice ").unwrap();
        assert_eq!(known.voice.id, "b-voice");
        assert!(!known.used_fallback);

        let unknown = catalog.resolve("nope").unwrap();
        assert_eq!(unknown.voice.id, "a-voice");
        assert!(unknown.used_fallback);

        let empty = catalog.resolve("").unwrap();
        assert_eq!(empty.voice.id, "a-voice");
        assert!(!empty.used_fallback);
    }

    #[test]
    fn test_resolve_alias() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "a-voice", "{}");
        install(dir.path(), "b-voice", "{}");
        let mut aliases = BTreeMap::new();
        aliases.insert("Bee".to_string(), "b-voice".to_string());
        let catalog = VoiceCatalog::new(dir.path(), aliases);

        let resolved = catalog.resolve("bee").unwrap();
        assert_eq!(resolved.voice.id, "b-voice");
        assert!(!resolved.used_fallback);

        catalog.set_alias("ay", "a-voice");
        assert_eq!(catalog.resolve("AY").unwrap().voice.id, "a-voice");
        assert!(catalog.remove_alias("ay"));
        assert!(!catalog.remove_alias("ay"));
    }

    #[test]
    fn test_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VoiceCatalog::new(dir.path(), BTreeMap::new());
        assert!(matches!(catalog.resolve(""), Err(Error::NoVoicesAvailable)));
    }

    #[test]
    fn test_reload_picks_up_new_voices() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "a-voice", "{}");
        let catalog = VoiceCatalog::new(dir.path(), BTreeMap::new());
        assert_eq!(catalog.len(), 1);

        install(dir.path(), "b-voice", "{}");
        // list() does not rescan on its own
        assert_eq!(catalog.list().len(), 1);
        assert_eq!(catalog.reload(), 2);
    }
}
