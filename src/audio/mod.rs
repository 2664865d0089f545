//! Audio containers, WAV I/O and resampling
//!
//! Segment assembly decodes every clip into [`AudioData`], resamples it to the
//! canonical intermediate format and appends the samples in order.

mod io;
mod resample;

pub use io::{encode_wav, load_audio, save_audio, AudioData};
pub use resample::resample;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sample rate of the canonical intermediate format
pub const CANONICAL_SAMPLE_RATE: u32 = 48_000;

/// Audio smaller than this cannot hold more than a WAV header
pub const MIN_AUDIO_BYTES: usize = 44;

/// Requested output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(Error::BadFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME type of the bytes actually produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioMime {
    Wav,
    Mpeg,
}

impl AudioMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMime::Wav => "audio/wav",
            AudioMime::Mpeg => "audio/mpeg",
        }
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            AudioMime::Wav => "wav",
            AudioMime::Mpeg => "mp3",
        }
    }
}

impl fmt::Display for AudioMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
