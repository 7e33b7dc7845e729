//! Running external tools.
//!
//! Every external call goes through [`ToolRunner`], so the pipeline can be driven
//! against a recording fake in tests and against real child processes otherwise.
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use derive_new::new;
use itertools::Itertools;
use log::debug;
use snafu::ResultExt;

use crate::errors;

/// Where a child's output stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Collected into [`ToolOutput`].
    Capture,
    /// Passed through to our own stream.
    Inherit,
    /// Sent to our stderr, whichever stream it is.
    Stderr,
    /// Written to a file, created or truncated.
    File(PathBuf),
}

impl Default for Sink {
    fn default() -> Self {
        Sink::Capture
    }
}

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    #[new(default)]
    pub cwd: Option<PathBuf>,
    #[new(default)]
    pub stdout: Sink,
    #[new(default)]
    pub stderr: Sink,
}

impl Invocation {
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.program.display(),
            self.args.iter().map(|arg| arg.to_string_lossy()).join(" ")
        )
    }
}

/// What a finished command left behind. Streams not captured are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_owned(),
        }
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

pub trait ToolRunner {
    /// Run the command to completion. An `Err` means it could not be started at all;
    /// a non-zero exit is reported through [`ToolOutput::code`].
    fn run(&self, invocation: &Invocation) -> errors::Result<ToolOutput>;
}

/// Runs invocations as blocking child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn stdio(sink: &Sink) -> errors::Result<Stdio> {
        Ok(match sink {
            Sink::Capture => Stdio::piped(),
            Sink::Inherit => Stdio::inherit(),
            Sink::Stderr => Stdio::from(io::stderr()),
            Sink::File(path) => Stdio::from(File::create(path).context(errors::StagingIo {
                action: "create",
                path: path.clone(),
            })?),
        })
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> errors::Result<ToolOutput> {
        debug!("Using the following command: '{}'", invocation);
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Self::stdio(&invocation.stdout)?)
            .stderr(Self::stdio(&invocation.stderr)?);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        let output = command.output().context(errors::ToolSpawn {
            program: invocation.program.clone(),
        })?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;

    use super::*;

    type Responder = Box<dyn Fn(&Invocation) -> ToolOutput>;

    /// Records invocations and answers them with a canned responder.
    pub(crate) struct FakeRunner {
        pub(crate) invocations: RefCell<Vec<Invocation>>,
        responder: Responder,
    }

    impl FakeRunner {
        pub(crate) fn new<F: Fn(&Invocation) -> ToolOutput + 'static>(responder: F) -> Self {
            FakeRunner {
                invocations: RefCell::new(Vec::new()),
                responder: Box::new(responder),
            }
        }

        pub(crate) fn succeeding() -> Self {
            FakeRunner::new(|_| ok())
        }

        /// Invocations whose arguments include `arg`.
        pub(crate) fn calls_with(&self, arg: &str) -> usize {
            self.invocations
                .borrow()
                .iter()
                .filter(|inv| inv.args.iter().any(|a| a == arg))
                .count()
        }
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, invocation: &Invocation) -> errors::Result<ToolOutput> {
            self.invocations.borrow_mut().push(invocation.clone());
            Ok((self.responder)(invocation))
        }
    }

    pub(crate) fn ok() -> ToolOutput {
        ToolOutput {
            code: Some(0),
            ..Default::default()
        }
    }

    pub(crate) fn failed(code: i32, stderr: &str) -> ToolOutput {
        ToolOutput {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}
