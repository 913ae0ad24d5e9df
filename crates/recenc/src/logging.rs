use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use env_logger::{Builder, Env, Target, WriteStyle};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Path of the log file for a given calendar day
pub fn daily_log_path(log_dir: &Path, day: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}.log", day.format("%Y%m%d")))
}

/// Format one log line (without the trailing newline)
pub fn format_line(timestamp: chrono::DateTime<Local>, message: &str) -> String {
    format!("{} {}", timestamp.format(TIMESTAMP_FORMAT), message)
}

/// Writer that appends to today's log file, reopening it on every write
///
/// Nothing is buffered between writes, so a line is on disk once the call
/// returns and a run that crosses midnight continues in the next day's file.
pub struct DailyLogWriter {
    log_dir: PathBuf,
    echo_stderr: bool,
}

impl DailyLogWriter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            echo_stderr: false,
        }
    }

    /// Also copy every line to stderr
    pub fn with_stderr_echo(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }

    pub fn current_path(&self) -> PathBuf {
        daily_log_path(&self.log_dir, Local::now().date_naive())
    }
}

impl Write for DailyLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.echo_stderr {
            let _ = io::stderr().write_all(buf);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install the global logger writing to the day-scoped file under `log_dir`
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when verbose.
pub fn init(log_dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let default_level = if verbose { "debug" } else { "info" };
    let writer = DailyLogWriter::new(log_dir).with_stderr_echo(verbose);

    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "{}", format_line(Local::now(), &record.args().to_string())))
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(writer)))
        .try_init()
        .context("Failed to install logger")?;

    Ok(())
}
