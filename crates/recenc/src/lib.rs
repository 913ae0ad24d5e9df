pub mod config;
pub mod logging;
pub mod lock;
pub mod signal;
pub mod tool;
pub mod program;
pub mod probe;
pub mod encode;
pub mod publish;
pub mod orchestrator;

pub use config::{EncodeConfig, EncodeSettings, MissingStreamsPolicy, StreamPatternConfig};
pub use lock::{LockError, RunLock};
pub use signal::StopSignal;
pub use tool::{ProcessRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use program::{ProgramPaths, ProgramRecord};
pub use probe::{ProbeError, StreamProbe, StreamSelection};
pub use encode::{EncodeError, Encoder};
pub use publish::{publish, PublishError};
pub use orchestrator::{run_exclusive, Orchestrator, ProgramOutcome, RunError, RunSummary};
