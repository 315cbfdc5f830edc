use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use which::which;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwiOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl HwiOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn failure(exit_code: i32, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

// Arguments are never included: they may carry PINs or passphrases.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HwiCommandError {
    #[error("hwi executable '{program}' not found")]
    MissingBinary { program: String },
    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },
    #[error("{program}: {message}")]
    Io { program: String, message: String },
}

#[async_trait]
pub trait HwiCommandRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<HwiOutput, HwiCommandError>;
}

/// Runs the `hwi` executable directly (no shell), one process per call.
pub struct SystemHwiCommandRunner {
    program: String,
    timeout: Duration,
}

impl SystemHwiCommandRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn resolve_program(&self) -> Option<PathBuf> {
        which(&self.program).ok()
    }

    fn build_command(&self, args: &[String]) -> Result<Command, HwiCommandError> {
        let path = self
            .resolve_program()
            .ok_or_else(|| HwiCommandError::MissingBinary {
                program: self.program.clone(),
            })?;
        let mut cmd = Command::new(path);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl HwiCommandRunner for SystemHwiCommandRunner {
    async fn run(&self, args: &[String]) -> Result<HwiOutput, HwiCommandError> {
        let mut cmd = self.build_command(args)?;
        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| HwiCommandError::Timeout {
                program: self.program.clone(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|err| HwiCommandError::Io {
                program: self.program.clone(),
                message: err.to_string(),
            })?;
        Ok(HwiOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
