use std::ffi::OsStr;
use std::process::{Command, Output};

use tracing::{debug, trace};

/// A finished process that exited non-zero, or could not be spawned at all.
#[derive(Debug, thiserror::Error)]
#[error("{program} {}: {stderr}", .args.join(" "))]
pub struct CmdFailure {
    pub program: String,
    pub args: Vec<String>,
    pub status: Option<i32>,
    pub stderr: String,
}

/// A builder for executing container runtime commands with unified error handling
pub struct Cmd {
    program: String,
    args: Vec<String>,
}

impl Cmd {
    /// Create a new command builder
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            args: Vec::new(),
        }
    }

    /// Add a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument only when `cond` holds
    pub fn arg_if(self, cond: bool, arg: impl Into<String>) -> Self {
        if cond { self.arg(arg) } else { self }
    }

    /// Execute the command and return the output.
    /// A non-zero exit code becomes a `CmdFailure` carrying the trimmed stderr.
    pub fn run(self) -> Result<Output, CmdFailure> {
        let Cmd { program, args } = self;
        trace!(program = %program, args = ?args, "cmd:run start");

        let output = match Command::new(&program).args(&args).output() {
            Ok(output) => output,
            Err(e) => {
                debug!(program = %program, error = %e, "cmd:run spawn failure");
                return Err(CmdFailure {
                    program,
                    args,
                    status: None,
                    stderr: e.to_string(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(
                program = %program,
                args = ?args,
                status = ?output.status.code(),
                stderr = %stderr,
                "cmd:run failure"
            );
            return Err(CmdFailure {
                program,
                args,
                status: output.status.code(),
                stderr,
            });
        }
        trace!(program = %program, "cmd:run success");
        Ok(output)
    }

    /// Execute the command and return stdout as a trimmed string
    pub fn run_and_capture_stdout(self) -> Result<String, CmdFailure> {
        let output = self.run()?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
