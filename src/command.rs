//! Pipeline stages: stream bindings, redirection files, dispatch.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;

use crate::builtins;
use crate::history::{History, HistoryError};
use crate::path;

/// Errors surfaced while running one stage. The executor applies the
/// suppression rules (non-zero child exits, builtin broken pipes) before
/// any of these reach the user.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    /// The child ran and exited non-zero; it already reported on its own
    /// stderr.
    #[error("exit status {0}")]
    ChildExit(i32),
    #[error("cd: {0}: No such file or directory")]
    NoSuchDirectory(String),
    #[error("{path}: {source}")]
    Redirect { path: String, source: io::Error },
    #[error("history: {0}: invalid option")]
    HistoryOption(String),
    #[error("history: missing file argument")]
    HistoryFile,
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl RunError {
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, RunError::Io(err) if err.kind() == io::ErrorKind::BrokenPipe)
    }
}

/// One binding of a stage's standard streams: the inherited descriptor,
/// or an owned handle (redirection target, pipe end, null sink) that is
/// released when the binding is dropped.
#[derive(Debug, Default)]
pub enum Stream {
    #[default]
    Inherit,
    Handle(File),
}

impl Stream {
    pub fn take(&mut self) -> Stream {
        std::mem::take(self)
    }

    fn into_stdio(self) -> Stdio {
        match self {
            Stream::Inherit => Stdio::inherit(),
            Stream::Handle(file) => Stdio::from(file),
        }
    }
}

/// Which standard stream a redirection replaces, and whether the target
/// is opened truncating or appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Stdout,
    StdoutAppend,
    Stderr,
    StderrAppend,
}

impl RedirectKind {
    /// Recognize a redirection operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" | "1>" => Some(RedirectKind::Stdout),
            ">>" | "1>>" => Some(RedirectKind::StdoutAppend),
            "2>" => Some(RedirectKind::Stderr),
            "2>>" => Some(RedirectKind::StderrAppend),
            _ => None,
        }
    }

    pub fn is_stdout(self) -> bool {
        matches!(self, RedirectKind::Stdout | RedirectKind::StdoutAppend)
    }

    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if matches!(self, RedirectKind::StdoutAppend | RedirectKind::StderrAppend) {
            options.append(true);
        } else {
            options.truncate(true);
        }
        options
    }
}

/// A stage's redirection: the effective kind (last operator wins) and
/// every target named in source order. All targets are opened, and so
/// created, but only the last receives the stream.
#[derive(Debug, Default)]
pub struct Redirect {
    pub kind: Option<RedirectKind>,
    pub targets: Vec<String>,
    /// Non-effective targets, held open until the stage finishes.
    opened: Vec<File>,
}

/// One command position within a pipeline.
#[derive(Debug, Default)]
pub struct Stage {
    pub cmd: String,
    pub args: Vec<String>,
    pub redirect: Redirect,
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
}

impl Stage {
    pub fn is_builtin(&self) -> bool {
        builtins::is_builtin(&self.cmd)
    }

    /// True when the stage's stdout is claimed by a file redirection, so
    /// the executor must not hand it a pipe write end.
    pub fn redirects_stdout(&self) -> bool {
        self.redirect.kind.map(RedirectKind::is_stdout).unwrap_or(false)
    }

    /// Open every redirection target in source order. The last handle
    /// becomes the effective stdout or stderr; earlier ones stay open
    /// (the files are truthfully created) until the stage is done. On any
    /// open failure all handles opened so far are released and the stage
    /// must not execute.
    pub fn setup_redirection(&mut self) -> Result<(), RunError> {
        let Some(kind) = self.redirect.kind else {
            return Ok(());
        };

        let mut opened = Vec::with_capacity(self.redirect.targets.len());
        for target in &self.redirect.targets {
            match kind.open_options().open(target) {
                Ok(file) => opened.push(file),
                Err(source) => {
                    return Err(RunError::Redirect {
                        path: target.clone(),
                        source,
                    });
                }
            }
        }
        let Some(last) = opened.pop() else {
            return Ok(());
        };
        if kind.is_stdout() {
            self.stdout = Stream::Handle(last);
        } else {
            self.stderr = Stream::Handle(last);
        }
        self.redirect.opened = opened;
        Ok(())
    }

    /// Run the stage to completion on the current thread.
    pub fn run(&mut self, history: &Arc<History>) -> Result<(), RunError> {
        if self.is_builtin() {
            builtins::run(self, history)
        } else {
            self.run_external()
        }
    }

    fn run_external(&mut self) -> Result<(), RunError> {
        let Some(resolved) = path::lookup(&self.cmd) else {
            return Err(RunError::CommandNotFound(self.cmd.clone()));
        };

        let mut command = Command::new(&resolved);
        command
            .args(&self.args)
            .stdin(self.stdin.take().into_stdio())
            .stdout(self.stdout.take().into_stdio())
            .stderr(self.stderr.take().into_stdio());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.arg0(&self.cmd);
        }

        let mut child = command.spawn()?;
        let status = child.wait()?;
        if !status.success() {
            return Err(RunError::ChildExit(status.code().unwrap_or(-1)));
        }
        Ok(())
    }

    /// Write builtin output through the stage's stdout binding.
    pub fn write_stdout(&mut self, text: &str) -> io::Result<()> {
        match &mut self.stdout {
            Stream::Inherit => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Stream::Handle(file) => file.write_all(text.as_bytes()),
        }
    }

    /// Report an error through the stage's stderr binding. Reporting
    /// failures are ignored; there is nowhere left to complain.
    pub fn write_stderr(&mut self, text: &str) {
        let _ = match &mut self.stderr {
            Stream::Inherit => io::stderr().lock().write_all(text.as_bytes()),
            Stream::Handle(file) => file.write_all(text.as_bytes()),
        };
    }
}
