//! piperline CLI
//!
//! Command-line front end for the synthesis pipeline

use clap::{Parser, Subcommand};
use piperline::{
    auth::{FileSecretStore, SecretStore, KEYLESS_ROLES, ROLES},
    moderation::ModerationMode,
    Config, Result, Synthesizer, TtsRequest,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "piperline",
    about = "Moderated, cached text-to-speech around the Piper engine",
    version,
    author
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize speech from text
    Synthesize {
        /// Text to synthesize; may contain directives and [sfx:name] tags
        #[arg(short, long)]
        text: String,

        /// Voice id or alias
        #[arg(short = 'v', long)]
        voice: Option<String>,

        /// Preset name
        #[arg(short, long)]
        preset: Option<String>,

        /// Output format (wav or mp3)
        #[arg(short, long)]
        format: Option<String>,

        /// Output audio file path, derived from the response when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        length_scale: Option<f32>,

        #[arg(long)]
        noise_scale: Option<f32>,

        #[arg(long)]
        noise_w: Option<f32>,

        /// Seconds of silence after each sentence
        #[arg(long)]
        sentence_silence: Option<f32>,

        /// Speaker index for multi-speaker voices
        #[arg(long)]
        speaker: Option<u32>,

        /// Loudness-normalize the result
        #[arg(long)]
        normalize: bool,

        /// MP3 bitrate, e.g. 96k
        #[arg(long)]
        bitrate: Option<String>,
    },

    /// List installed voices
    Voices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run content moderation over text
    Moderate {
        /// Text to moderate
        text: String,

        /// Mask blocklisted terms instead of dropping them
        #[arg(long)]
        mask: bool,
    },

    /// Print service health as JSON
    Health,

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Create missing role keys in the secrets file
    Keys {
        /// Secrets file, defaults to the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the key values
        #[arg(long)]
        show: bool,
    },

    /// Show information about the system
    Info,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Synthesize {
            text,
            voice,
            preset,
            format,
            output,
            length_scale,
            noise_scale,
            noise_w,
            sentence_silence,
            speaker,
            normalize,
            bitrate,
        } => {
            let synthesizer = Synthesizer::new(load_config(config_path)?)?;

            let request = TtsRequest {
                text,
                voice,
                preset,
                format,
                length_scale,
                noise_scale,
                noise_w,
                sentence_silence,
                speaker_id: speaker,
                normalize: normalize.then_some(true),
                bitrate,
            };

            let response = synthesizer.tts(&request).await?;

            let output = output.unwrap_or_else(|| {
                let voice = response.header("X-Voice").unwrap_or("output");
                let req_id = response.header("X-Req-Id").unwrap_or("0");
                PathBuf::from(format!("{}-{}.{}", voice, req_id, response.mime.extension()))
            });
            std::fs::write(&output, &response.audio)?;

            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!("✓ Synthesis complete: {}", output.display());
        }

        Commands::Voices { json } => {
            let synthesizer = Synthesizer::new(load_config(config_path)?)?;
            let voices = synthesizer.voices();

            if json {
                let list: Vec<_> = voices.iter().map(|v| v.as_ref()).collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for voice in &voices {
                    println!(
                        "{:<40} {:>6} Hz  speakers={:<3} {}",
                        voice.id, voice.sample_rate, voice.speakers, voice.language
                    );
                }
                println!("{} voices", voices.len());
            }
        }

        Commands::Moderate { text, mask } => {
            let synthesizer = Synthesizer::new(load_config(config_path)?)?;
            let mode = if mask {
                ModerationMode::Mask
            } else {
                ModerationMode::Drop
            };
            let (clean, flags) = synthesizer.moderate(&text, mode);
            println!("{}", clean);
            println!("{}", serde_json::to_string(&flags)?);
        }

        Commands::Health => {
            let synthesizer = Synthesizer::new(load_config(config_path)?)?;
            println!("{}", serde_json::to_string_pretty(&synthesizer.health())?);
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            Config::create_default(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Keys { file, show } => {
            let path = match file {
                Some(file) => file,
                None => load_config(config_path)?.auth.secrets_path(),
            };
            let store = FileSecretStore::new(&path);
            let keys = store.ensure_role_keys()?;

            for role in ROLES {
                match keys.get(role) {
                    Some(key) if show => println!("{:<8} {}", role, key),
                    Some(_) => println!("{:<8} set", role),
                    None if KEYLESS_ROLES.contains(&role) => {
                        println!("{:<8} (accepts any role key)", role)
                    }
                    None => println!("{:<8} missing", role),
                }
            }
            println!("✓ Keys stored in: {}", path.display());
        }

        Commands::Info => {
            println!("piperline - text-to-speech request pipeline");
            println!("===========================================");
            println!("Version: {}", piperline::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Canonical sample rate: {} Hz", piperline::audio::CANONICAL_SAMPLE_RATE);
            println!("Default voice sample rate: {} Hz", piperline::DEFAULT_SAMPLE_RATE);
            println!();
            println!("CPU Cores: {}", num_cpus::get());
            println!("Physical Cores: {}", num_cpus::get_physical());
        }
    }

    Ok(())
}
