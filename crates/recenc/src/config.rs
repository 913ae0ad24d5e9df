use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What to do when a source has no usable video or audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStreamsPolicy {
    /// Log and end the whole run with a non-zero exit status
    #[default]
    AbortRun,
    /// Log and move on to the next program
    SkipProgram,
}

/// Codec names that make a probed stream eligible for selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPatternConfig {
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
}

impl Default for StreamPatternConfig {
    fn default() -> Self {
        Self {
            video_codecs: vec!["mpeg2video".to_string()],
            audio_codecs: vec!["aac".to_string()],
        }
    }
}

/// Fixed target codec settings handed to the encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub qmin: u32,
    /// Video bitrate ceiling in encoder notation (e.g. "2000k")
    pub video_bitrate: String,
    pub audio_codec: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            qmin: 10,
            video_bitrate: "2000k".to_string(),
            audio_codec: "libfdk_aac".to_string(),
        }
    }
}

/// Configuration for the recorded-program encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Scheduler metadata feed listing recorded programs
    pub recorded_json: PathBuf,
    /// Directory that `recorded` paths in the feed are relative to
    pub recorded_root: PathBuf,
    /// Publish root; each title gets a subdirectory here
    pub encoded_dir: PathBuf,
    /// Where encodes are written before being published
    pub temp_dir: PathBuf,
    /// Lock marker directory
    pub lock_path: PathBuf,
    /// Directory holding one log file per day
    pub log_dir: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
    /// Container extension of published files, without the dot
    pub container_ext: String,
    /// Relative-path marker stripped from the front of `recorded`
    pub recorded_prefix: String,
    pub streams: StreamPatternConfig,
    pub encode: EncodeSettings,
    pub on_missing_streams: MissingStreamsPolicy,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl EncodeConfig {
    /// Create a default configuration rooted at the user's home directory
    pub fn default_config() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_home(&home)
    }

    /// Create the default layout rooted at `home`
    pub fn with_home(home: &Path) -> Self {
        let scheduler_dir = home.join("chinachu");
        let enc_dir = home.join("enc");
        let log_dir = enc_dir.join("logs");

        Self {
            recorded_json: scheduler_dir.join("data").join("recorded.json"),
            recorded_root: scheduler_dir,
            encoded_dir: enc_dir.join("encoded").join("latest"),
            temp_dir: PathBuf::from("/var/tmp"),
            lock_path: log_dir.join("enc.lock"),
            log_dir,
            ffprobe_bin: PathBuf::from("ffprobe"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            container_ext: "mp4".to_string(),
            recorded_prefix: "./".to_string(),
            streams: StreamPatternConfig::default(),
            encode: EncodeSettings::default(),
            on_missing_streams: MissingStreamsPolicy::default(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
                config = Self::parse(config_path, &content)?;
            }
        }

        Ok(config)
    }

    /// Parse config text, picking TOML or JSON by the file extension
    fn parse(config_path: &Path, content: &str) -> Result<Self> {
        if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))
        } else {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))
        }
    }
}
