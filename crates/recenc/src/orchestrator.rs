use std::fmt;
use std::fs;
use std::future::Future;
use std::path::Path;
use log::{debug, error, info, warn};
use thiserror::Error;
use crate::config::{EncodeConfig, MissingStreamsPolicy};
use crate::encode::Encoder;
use crate::lock::{LockError, RunLock};
use crate::probe::{ProbeError, StreamProbe};
use crate::program::{load_programs, ProgramPaths, ProgramRecord};
use crate::publish::publish;
use crate::signal::StopSignal;
use crate::tool::ToolRunner;

const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");

/// Errors that end a whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to load programs: {0:#}")]
    Programs(anyhow::Error),

    /// A source had no usable stream pair and the policy is to abort
    #[error(transparent)]
    MissingStreams(ProbeError),

    #[error(transparent)]
    Probe(ProbeError),

    #[error("interrupted by SIG{signal}")]
    Interrupted { signal: &'static str },
}

impl RunError {
    pub fn is_already_running(&self) -> bool {
        matches!(self, RunError::Lock(LockError::AlreadyRunning { .. }))
    }
}

/// Where a program is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Pending,
    Skipped,
    Probing,
    Encoding,
    Publishing,
    Done,
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramState::Pending => write!(f, "pending"),
            ProgramState::Skipped => write!(f, "skipped"),
            ProgramState::Probing => write!(f, "probing"),
            ProgramState::Encoding => write!(f, "encoding"),
            ProgramState::Publishing => write!(f, "publishing"),
            ProgramState::Done => write!(f, "done"),
        }
    }
}

/// How processing a single program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramOutcome {
    Published,
    /// The final output already exists
    SkippedExisting,
    SkippedMissingSource,
    /// No usable stream pair, under the skip policy
    SkippedNoStreams,
    /// The encoder failed or left no output; retried next run
    EncodeFailed,
    /// The output could not be moved into the library; retried next run
    PublishFailed,
}

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: ProgramOutcome) {
        match outcome {
            ProgramOutcome::Published => self.published += 1,
            ProgramOutcome::SkippedExisting
            | ProgramOutcome::SkippedMissingSource
            | ProgramOutcome::SkippedNoStreams => self.skipped += 1,
            ProgramOutcome::EncodeFailed | ProgramOutcome::PublishFailed => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} published, {} skipped, {} failed",
            self.published, self.skipped, self.failed
        )
    }
}

/// Sequential pipeline over the program list
pub struct Orchestrator<'a, R> {
    cfg: &'a EncodeConfig,
    probe: StreamProbe<'a, R>,
    encoder: Encoder<'a, R>,
    stop: &'a StopSignal,
}

impl<'a, R: ToolRunner> Orchestrator<'a, R> {
    pub fn new(cfg: &'a EncodeConfig, runner: &'a R, stop: &'a StopSignal) -> Result<Self, RunError> {
        let probe = StreamProbe::new(runner, &cfg.ffprobe_bin, &cfg.streams).map_err(RunError::Probe)?;
        let encoder = Encoder::new(runner, &cfg.ffmpeg_bin, cfg.encode.clone());
        Ok(Self {
            cfg,
            probe,
            encoder,
            stop,
        })
    }

    /// Process every program in list order
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let programs = load_programs(&self.cfg.recorded_json).map_err(RunError::Programs)?;
        debug!("Loaded {} programs from {}", programs.len(), self.cfg.recorded_json.display());

        let mut summary = RunSummary::default();
        for record in &programs {
            if let Some(signal) = self.stop.signal_name() {
                return Err(RunError::Interrupted { signal });
            }
            let outcome = self.process(record).await?;
            summary.record(outcome);
        }
        Ok(summary)
    }

    async fn process(&self, record: &ProgramRecord) -> Result<ProgramOutcome, RunError> {
        let paths = ProgramPaths::resolve(record, self.cfg);
        transition(&paths, ProgramState::Pending);

        if paths.final_path.exists() {
            transition(&paths, ProgramState::Skipped);
            return Ok(ProgramOutcome::SkippedExisting);
        }
        if !paths.source.exists() {
            transition(&paths, ProgramState::Skipped);
            return Ok(ProgramOutcome::SkippedMissingSource);
        }

        if let Err(e) = fs::create_dir_all(&paths.output_dir) {
            error!("Failed to create output directory {}: {}", paths.output_dir.display(), e);
            return Ok(ProgramOutcome::PublishFailed);
        }

        transition(&paths, ProgramState::Probing);
        let selection = match self.until_stopped(self.probe.probe(&paths.source)).await? {
            Ok(selection) => selection,
            Err(e @ ProbeError::MissingStreams { .. }) => {
                return match self.cfg.on_missing_streams {
                    MissingStreamsPolicy::AbortRun => Err(RunError::MissingStreams(e)),
                    MissingStreamsPolicy::SkipProgram => {
                        warn!("{}, skipping", e);
                        transition(&paths, ProgramState::Skipped);
                        Ok(ProgramOutcome::SkippedNoStreams)
                    }
                };
            }
            Err(e) => return Err(RunError::Probe(e)),
        };

        transition(&paths, ProgramState::Encoding);
        match self
            .until_stopped(self.encoder.encode(&paths.source, &paths.temp, &selection))
            .await
        {
            Err(interrupted) => {
                remove_temp(&paths.temp);
                return Err(interrupted);
            }
            Ok(Err(e)) => {
                error!("{}", e);
                remove_temp(&paths.temp);
                return Ok(ProgramOutcome::EncodeFailed);
            }
            Ok(Ok(())) => {}
        }

        transition(&paths, ProgramState::Publishing);
        if let Err(e) = publish(&paths.temp, &paths.final_path) {
            error!("{}", e);
            remove_temp(&paths.temp);
            return Ok(ProgramOutcome::PublishFailed);
        }

        info!("Published {}", paths.final_path.display());
        transition(&paths, ProgramState::Done);
        Ok(ProgramOutcome::Published)
    }

    /// Race `fut` against a stop request; the loser is dropped
    async fn until_stopped<F: Future>(&self, fut: F) -> Result<F::Output, RunError> {
        tokio::select! {
            biased;
            signal = self.stop.requested() => Err(RunError::Interrupted { signal }),
            output = fut => Ok(output),
        }
    }
}

fn transition(paths: &ProgramPaths, state: ProgramState) {
    debug!("{} -> {}", paths.source.display(), state);
}

fn remove_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => debug!("Removed temporary output {}", temp.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temporary output {}: {}", temp.display(), e),
    }
}

/// One complete run under the process-wide lock
///
/// The lock is released on every return path once acquired. A run that
/// could not acquire it leaves the existing marker alone.
pub async fn run_exclusive<R: ToolRunner>(
    cfg: &EncodeConfig,
    runner: &R,
    stop: &StopSignal,
) -> Result<RunSummary, RunError> {
    info!("{} start", PROGRAM_NAME);

    let lock = match RunLock::acquire(&cfg.lock_path) {
        Ok(lock) => lock,
        Err(e) => {
            if matches!(e, LockError::AlreadyRunning { .. }) {
                warn!("{} is already running", PROGRAM_NAME);
            } else {
                error!("{}", e);
            }
            info!("exit");
            return Err(e.into());
        }
    };

    let result = match Orchestrator::new(cfg, runner, stop) {
        Ok(orchestrator) => orchestrator.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = lock.release() {
        error!("Failed to remove lock marker {}: {}", cfg.lock_path.display(), e);
    }

    match &result {
        Ok(summary) => {
            info!("Run complete: {}", summary);
            info!("{} end", PROGRAM_NAME);
        }
        Err(e) => {
            error!("{}", e);
            info!("exit");
        }
    }
    result
}
