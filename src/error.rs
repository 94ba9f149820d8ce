//! Script and command errors

use std::fmt;

/// The kind of script error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Command exited with a non-zero status
    CommandFailed,
    /// Command succeeded but its status was inverted (! prefix)
    UnexpectedSuccess,
    /// Invalid script syntax
    SyntaxError,
    /// Invalid usage of a command (bad flag, wrong argument count)
    UsageError,
    /// Help was requested for a command
    Help,
    /// A query string failed to compile
    QuerySyntax,
    /// A query produced an error value while running
    QueryRuntime,
    /// Input could not be decoded as YAML or JSON
    Decode,
    /// File not found
    FileNotFound,
    /// Executable not found on PATH
    NotFound,
    /// External command exceeded its wait limit
    Timeout,
    /// IO error
    Io,
    /// Other error
    Other,
}

/// A script error with file/line context
#[derive(Debug)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Exit status carried by `CommandFailed`
    pub status: Option<i32>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
            command: None,
            args: Vec::new(),
            status: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, msg)
    }

    pub fn usage(cmd: &str, expected: &str) -> Self {
        Self::new(ErrorKind::UsageError, format!("usage: {} {}", cmd, expected))
    }

    pub fn help(text: impl Into<String>) -> Self {
        Self::new(ErrorKind::Help, text)
    }

    pub fn failed(status: i32, msg: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::CommandFailed, msg);
        err.status = Some(status);
        err
    }

    pub fn is_help(&self) -> bool {
        self.kind == ErrorKind::Help
    }

    /// The exit status a command reports when it fails with this error.
    pub fn exit_status(&self) -> i32 {
        match self.kind {
            ErrorKind::Help => 2,
            ErrorKind::NotFound => 127,
            ErrorKind::Timeout => 124,
            ErrorKind::CommandFailed => self.status.unwrap_or(1),
            _ => 1,
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}:", file)?;
        }
        if let Some(line) = self.line {
            write!(f, "{}:", line)?;
        }
        if let Some(ref cmd) = self.command {
            if self.args.is_empty() {
                write!(f, " {}: ", cmd)?;
            } else {
                let quoted = self.args.iter().map(|a| {
                    if a.contains(' ') || a.contains('\t') || a.is_empty() {
                        format!("'{}'", a)
                    } else {
                        a.clone()
                    }
                }).collect::<Vec<_>>().join(" ");
                write!(f, " {} {}: ", cmd, quoted)?;
            }
        } else if self.file.is_some() || self.line.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}
