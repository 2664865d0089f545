//! Configuration management for piperline

use crate::audio::OutputFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration for piperline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned (recursively) for `*.onnx` + `*.onnx.json` voices
    pub voices_dir: PathBuf,
    /// Directory holding sound-effect clips
    pub sounds_dir: PathBuf,
    /// Speech engine binary name or path
    pub piper_bin: String,
    /// ffmpeg binary name or path
    pub ffmpeg_bin: String,
    /// Maximum concurrent engine invocations
    pub max_concurrency: usize,
    /// Maximum cached results
    pub cache_size: usize,
    /// Cache time-to-live in seconds
    pub cache_ttl_s: u64,
    /// Input text is truncated to this many characters
    pub max_text_chars: usize,
    /// Output format when the request names none
    pub default_format: OutputFormat,
    /// Loudness-normalize when the request does not say
    pub normalize: bool,
    /// MP3 bitrate when the request names none
    pub mp3_bitrate: String,
    /// Effect clips allowed in one request
    pub max_sfx_per_request: usize,
    /// Short name -> voice id
    pub aliases: BTreeMap<String, String>,
    /// Preset name -> synthesis parameters
    pub presets: BTreeMap<String, Preset>,
    /// Content moderation settings
    pub moderation: ModerationConfig,
    /// Access key settings
    pub auth: AuthConfig,
}

/// Bundle of synthesis parameters selectable by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub length_scale: Option<f32>,
    pub noise_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub sentence_silence: Option<f32>,
}

/// Content moderation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Replace links with a placeholder
    pub strip_urls: bool,
    /// Remove emoji code points
    pub strip_emojis: bool,
    /// Enforce the blocklist
    pub censor_slurs: bool,
    /// Blocklist file, one term per line; re-read when it changes
    pub blocklist_path: Option<PathBuf>,
    /// Unicode `emoji-data.txt` replacing the bundled table
    pub emoji_data_path: Option<PathBuf>,
}

/// Access key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Secrets file holding role keys
    pub file: Option<PathBuf>,
}

/// Secrets file used when `auth.file` is unset
pub const DEFAULT_SECRETS_FILE: &str = "private/secrets.yaml";

impl AuthConfig {
    pub fn secrets_path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FILE))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voices_dir: PathBuf::from("voices"),
            sounds_dir: PathBuf::from("sounds"),
            piper_bin: "piper".into(),
            ffmpeg_bin: "ffmpeg".into(),
            max_concurrency: 2,
            cache_size: 64,
            cache_ttl_s: 300,
            max_text_chars: 500,
            default_format: OutputFormat::Mp3,
            normalize: false,
            mp3_bitrate: "128k".into(),
            max_sfx_per_request: 10,
            aliases: BTreeMap::new(),
            presets: BTreeMap::new(),
            moderation: ModerationConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            strip_urls: true,
            strip_emojis: true,
            censor_slurs: true,
            blocklist_path: None,
            emoji_data_path: None,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Create default configuration and save to file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Make relative directory and file paths relative to `base_dir`
    ///
    /// An unset secrets file becomes the default one under `base_dir`.
    pub fn resolve_paths<P: AsRef<Path>>(&mut self, base_dir: P) {
        let base = base_dir.as_ref();
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        rebase(&mut self.voices_dir);
        rebase(&mut self.sounds_dir);
        if let Some(p) = self.moderation.blocklist_path.as_mut() {
            rebase(p);
        }
        if let Some(p) = self.moderation.emoji_data_path.as_mut() {
            rebase(p);
        }
        let secrets = self
            .auth
            .file
            .get_or_insert_with(|| PathBuf::from(DEFAULT_SECRETS_FILE));
        rebase(secrets);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.voices_dir.exists() {
            log::warn!(
                "Voices directory does not exist: {}",
                self.voices_dir.display()
            );
        }

        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be > 0".into()));
        }
        if self.cache_size == 0 {
            return Err(Error::Config("cache_size must be > 0".into()));
        }
        if self.max_text_chars == 0 {
            return Err(Error::Config("max_text_chars must be > 0".into()));
        }
        if self.mp3_bitrate.trim().is_empty() {
            return Err(Error::Config("mp3_bitrate must not be empty".into()));
        }

        for (name, preset) in &self.presets {
            if preset.length_scale.is_some_and(|v| v <= 0.0) {
                return Err(Error::Config(format!(
                    "preset '{}': length_scale must be > 0",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.default_format, OutputFormat::Mp3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
max_concurrency: 4
default_format: wav
aliases:
  bob: en_US-ryan-high
presets:
  whisper:
    length_scale: 1.3
    noise_scale: 0.4
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.default_format, OutputFormat::Wav);
        assert_eq!(config.cache_size, 64);
        assert_eq!(config.aliases["bob"], "en_US-ryan-high");
        assert_eq!(config.presets["whisper"].length_scale, Some(1.3));
        assert_eq!(config.presets["whisper"].noise_w, None);
        assert!(config.moderation.strip_urls);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = Config {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "voices_dir: v\nmoderation:\n  blocklist_path: lists/block.txt\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.voices_dir, dir.path().join("v"));
        assert_eq!(
            config.moderation.blocklist_path,
            Some(dir.path().join("lists/block.txt"))
        );
        assert_eq!(config.sounds_dir, dir.path().join("sounds"));
        assert_eq!(
            config.auth.secrets_path(),
            dir.path().join(DEFAULT_SECRETS_FILE)
        );
    }

    #[test]
    fn test_explicit_secrets_file_is_rebased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "auth:\n  enabled: true\n  file: keys.yaml\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.secrets_path(), dir.path().join("keys.yaml"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/piperline.yaml"),
            Err(Error::FileNotFound(_))
        ));
    }
}
