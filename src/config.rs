//! Configuration management for leafcast.
//!
//! Loads config from YAML files in standard locations. Every value the
//! playback tuning depends on (segment cap, inter-segment pauses, speech
//! hints) lives here rather than in code.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Soft cap on segment length, in characters.
    pub max_segment_chars: usize,
    /// Pause between segments, milliseconds.
    pub inter_segment_pause_ms: u64,
    /// Shorter pause before continuing past a failed segment, milliseconds.
    pub failure_skip_pause_ms: u64,
    /// Source language of diagnosis results.
    pub source_language: String,
    /// Append a history record per finished session.
    pub record_history: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: 300,
            inter_segment_pause_ms: 800,
            failure_skip_pause_ms: 500,
            source_language: "zh-CN".into(),
            record_history: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Rate hint passed to the narration engine (1.0 = native speed).
    pub rate: f32,
    /// Pitch hint (1.0 = native pitch).
    pub pitch: f32,
    /// Pitch applied instead when a curated voice was bound.
    pub quality_voice_pitch: f32,
    /// Volume hint in [0, 1].
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: 0.85,
            pitch: 1.0,
            quality_voice_pitch: 1.05,
            volume: 0.9,
        }
    }
}

/// One voice the deployment's synthesis backend offers.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceEntry {
    pub id: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voices available to the narration engine. Empty means the engine
    /// publishes its own catalog.
    pub catalog: Vec<VoiceEntry>,
    /// Curated voice names per language tag, highest priority first.
    /// Merged over the built-in defaults.
    pub preferred: HashMap<String, Vec<String>>,
    /// Attempts to read a late-populating catalog before giving up.
    pub catalog_retries: u32,
    /// Delay between catalog attempts, milliseconds.
    pub catalog_retry_delay_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            catalog: vec![
                VoiceEntry {
                    id: "zh-cn-xiaoxiao".into(),
                    name: "Microsoft Xiaoxiao - Chinese (Simplified, PRC)".into(),
                    language: "zh-CN".into(),
                    default: true,
                },
                VoiceEntry {
                    id: "en-us-zira".into(),
                    name: "Microsoft Zira - English (United States)".into(),
                    language: "en-US".into(),
                    default: false,
                },
                VoiceEntry {
                    id: "ja-jp-haruka".into(),
                    name: "Microsoft Haruka - Japanese".into(),
                    language: "ja-JP".into(),
                    default: false,
                },
            ],
            preferred: HashMap::new(),
            catalog_retries: 3,
            catalog_retry_delay_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub enabled: bool,
    /// Translation endpoint (LibreTranslate-style JSON contract).
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:5000/translate".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8771 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broadcast: BroadcastConfig,
    pub speech: SpeechConfig,
    pub voice: VoiceConfig,
    pub translator: TranslatorConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/leafcast/config.yaml
    /// 3. /etc/leafcast/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/leafcast/config.yaml")),
                Some(PathBuf::from("/etc/leafcast/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }
}
