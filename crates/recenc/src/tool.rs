use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or None if the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external tool to completion
///
/// Dropping the returned future before it resolves must stop the tool.
pub trait ToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> impl Future<Output = io::Result<ToolOutput>> + Send;
}

/// Runs tools as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> io::Result<ToolOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = ToolInvocation::new("ffmpeg")
            .arg("-i")
            .arg("in file.ts")
            .args(["-map", "0:0"]);
        assert_eq!(inv.to_string(), "ffmpeg -i in file.ts -map 0:0");
        assert_eq!(inv.args.len(), 4);
    }

    #[test]
    fn test_output_success() {
        let ok = ToolOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        let failed = ToolOutput {
            exit_code: Some(1),
            ..Default::default()
        };
        let killed = ToolOutput::default();
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_streams() {
        let inv = ToolInvocation::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = ProcessRunner.run(&inv).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_process_runner_missing_binary() {
        let inv = ToolInvocation::new("/nonexistent/recenc-test-tool");
        let err = ProcessRunner.run(&inv).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
