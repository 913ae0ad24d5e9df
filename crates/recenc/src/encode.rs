use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info};
use thiserror::Error;
use crate::config::EncodeSettings;
use crate::probe::StreamSelection;
use crate::tool::{ToolInvocation, ToolRunner};

/// Number of trailing stderr lines kept in an encode failure
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encoder exited with code {code} for {}: {stderr_tail}", .input.display())]
    Failed {
        input: PathBuf,
        code: i32,
        stderr_tail: String,
    },

    #[error("encoder was terminated by a signal while encoding {}", .input.display())]
    Terminated { input: PathBuf },

    #[error("encoder reported success but wrote no output at {}", .output.display())]
    MissingOutput { output: PathBuf },

    #[error("failed to run encoder for {}: {source}", .input.display())]
    Tool {
        input: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Build the encoder argument list
///
/// `-y` lets a run overwrite a temporary file orphaned by an earlier crash.
pub fn build_encode_args(
    input: &Path,
    output: &Path,
    selection: &StreamSelection,
    settings: &EncodeSettings,
) -> Vec<OsString> {
    let qmin = settings.qmin.to_string();
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
    args.extend(selection.map_args());
    args.extend(
        [
            "-vcodec",
            settings.video_codec.as_str(),
            "-qmin",
            qmin.as_str(),
            "-vb",
            settings.video_bitrate.as_str(),
            "-acodec",
            settings.audio_codec.as_str(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Runs the encoding tool for one program
pub struct Encoder<'a, R> {
    runner: &'a R,
    ffmpeg_bin: PathBuf,
    settings: EncodeSettings,
}

impl<'a, R: ToolRunner> Encoder<'a, R> {
    pub fn new(runner: &'a R, ffmpeg_bin: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            runner,
            ffmpeg_bin: ffmpeg_bin.into(),
            settings,
        }
    }

    /// Encode `input` into `output`, keeping only the selected streams
    pub async fn encode(&self, input: &Path, output: &Path, selection: &StreamSelection) -> Result<(), EncodeError> {
        let invocation = ToolInvocation::new(&self.ffmpeg_bin)
            .args(build_encode_args(input, output, selection, &self.settings));

        info!("Encoding {} ...", input.display());
        debug!("encode command: {}", invocation);

        let result = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| EncodeError::Tool {
                input: input.to_path_buf(),
                source,
            })?;

        match result.exit_code {
            Some(0) => {}
            Some(code) => {
                return Err(EncodeError::Failed {
                    input: input.to_path_buf(),
                    code,
                    stderr_tail: stderr_tail(&result.stderr),
                })
            }
            None => {
                return Err(EncodeError::Terminated {
                    input: input.to_path_buf(),
                })
            }
        }

        if !output.is_file() {
            return Err(EncodeError::MissingOutput {
                output: output.to_path_buf(),
            });
        }

        info!("Finish! Output is {}", output.display());
        Ok(())
    }
}
