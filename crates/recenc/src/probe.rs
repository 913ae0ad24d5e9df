use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use log::debug;
use regex::Regex;
use thiserror::Error;
use crate::config::StreamPatternConfig;
use crate::tool::{ToolInvocation, ToolRunner};

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The source lacks a video or an audio stream with a recognized codec
    #[error("No available map in {} (video: {}, audio: {})", .path.display(), found(.video), found(.audio))]
    MissingStreams {
        path: PathBuf,
        video: Option<String>,
        audio: Option<String>,
    },

    #[error("failed to run probe for {}: {source}", .path.display())]
    Tool {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid codec pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn found(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("none")
}

/// The one video and one audio stream kept from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSelection {
    /// Stream identifier as printed by the probe, e.g. "0:0"
    pub video: String,
    pub audio: String,
}

impl StreamSelection {
    /// Encoder arguments keeping exactly these two streams
    pub fn map_args(&self) -> Vec<OsString> {
        ["-map", self.video.as_str(), "-map", self.audio.as_str()]
            .into_iter()
            .map(OsString::from)
            .collect()
    }
}

impl fmt::Display for StreamSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-map {} -map {}", self.video, self.audio)
    }
}

/// Compiled line patterns for recognized video and audio streams
#[derive(Debug, Clone)]
pub struct StreamPatterns {
    video: Regex,
    audio: Regex,
}

impl StreamPatterns {
    pub fn new(cfg: &StreamPatternConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            video: stream_regex("Video", &cfg.video_codecs)?,
            audio: stream_regex("Audio", &cfg.audio_codecs)?,
        })
    }
}

/// `Stream #0:1[0x112](jpn): Audio: aac ...` with the codec restricted to `codecs`
fn stream_regex(kind: &str, codecs: &[String]) -> Result<Regex, regex::Error> {
    let alternatives = codecs
        .iter()
        .map(|c| regex::escape(c))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"Stream #(\d+:\d+)\S*: {}: (?:{})(?:[\s,(]|$)",
        kind, alternatives
    ))
}

fn first_match(text: &str, pattern: &Regex) -> Option<String> {
    text.lines()
        .find_map(|line| pattern.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Pick the first recognized video stream and the first recognized audio stream
pub fn parse_stream_selection(
    path: &Path,
    diagnostics: &str,
    patterns: &StreamPatterns,
) -> Result<StreamSelection, ProbeError> {
    let video = first_match(diagnostics, &patterns.video);
    let audio = first_match(diagnostics, &patterns.audio);

    match (video, audio) {
        (Some(video), Some(audio)) => Ok(StreamSelection { video, audio }),
        (video, audio) => Err(ProbeError::MissingStreams {
            path: path.to_path_buf(),
            video,
            audio,
        }),
    }
}

/// Runs the probing tool and turns its output into a [`StreamSelection`]
pub struct StreamProbe<'a, R> {
    runner: &'a R,
    ffprobe_bin: PathBuf,
    patterns: StreamPatterns,
}

impl<'a, R: ToolRunner> StreamProbe<'a, R> {
    pub fn new(runner: &'a R, ffprobe_bin: impl Into<PathBuf>, cfg: &StreamPatternConfig) -> Result<Self, ProbeError> {
        Ok(Self {
            runner,
            ffprobe_bin: ffprobe_bin.into(),
            patterns: StreamPatterns::new(cfg)?,
        })
    }

    pub async fn probe(&self, source: &Path) -> Result<StreamSelection, ProbeError> {
        let invocation = ToolInvocation::new(&self.ffprobe_bin).arg(source);
        debug!("probe command: {}", invocation);

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source_err| ProbeError::Tool {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        // ffprobe describes streams on stderr; its exit status carries nothing we need
        let selection = parse_stream_selection(source, &output.stderr, &self.patterns)?;
        debug!("Selected streams for {}: {}", source.display(), selection);
        Ok(selection)
    }
}
