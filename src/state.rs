//! Script execution state
//!
//! Holds mutable per-run state: working directory, variables, the standard
//! streams commands read and write, the last exit status, and the log.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A shell variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    /// A plain string value
    Scalar(String),
    /// An array of strings (`array NAME a b c`)
    Indexed(Vec<String>),
    /// A string-keyed table (`map NAME k=v`)
    Associative(BTreeMap<String, String>),
}

impl Variable {
    /// The text a variable expands to on a command line.
    pub fn expand(&self) -> String {
        match self {
            Variable::Scalar(s) => s.clone(),
            Variable::Indexed(list) => list.join(" "),
            Variable::Associative(map) => {
                map.values().cloned().collect::<Vec<_>>().join(" ")
            }
        }
    }
}

/// Where a command's output goes.
pub enum Output {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    /// In-memory capture, for embedding and tests
    Buffer(Vec<u8>),
}

impl Output {
    /// Take everything captured so far. Process streams return nothing.
    pub fn take(&mut self) -> String {
        match self {
            Output::Buffer(buf) => String::from_utf8_lossy(&std::mem::take(buf)).into_owned(),
            _ => String::new(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(s) => s.write(buf),
            Output::Stderr(s) => s.write(buf),
            Output::Buffer(b) => b.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(s) => s.flush(),
            Output::Stderr(s) => s.flush(),
            Output::Buffer(_) => Ok(()),
        }
    }
}

/// Mutable state for a single script execution
pub struct State {
    /// Current working directory (changed by `cd`)
    pub pwd: PathBuf,
    /// Variables, in definition order for deterministic subprocess env
    vars: Vec<(String, Variable)>,
    /// Index for O(1) lookup by name → position in `vars`
    var_index: HashMap<String, usize>,
    /// Standard output of the running command
    pub stdout: Output,
    /// Standard error of the running command
    pub stderr: Output,
    /// Standard input of the running command
    stdin: String,
    /// Input queued for the next command by `stdin`
    pending_stdin: Option<String>,
    /// Last command's exit status
    pub status: i32,
    /// Execution log
    pub log: String,
}

impl State {
    /// Create a State writing to the process's stdout and stderr.
    pub fn new(pwd: PathBuf) -> Self {
        Self::with_output(pwd, Output::Stdout(io::stdout()), Output::Stderr(io::stderr()))
    }

    /// Create a State whose stdout and stderr are captured in memory.
    pub fn captured(pwd: PathBuf) -> Self {
        Self::with_output(pwd, Output::Buffer(Vec::new()), Output::Buffer(Vec::new()))
    }

    fn with_output(pwd: PathBuf, stdout: Output, stderr: Output) -> Self {
        let mut state = Self {
            pwd,
            vars: Vec::new(),
            var_index: HashMap::new(),
            stdout,
            stderr,
            stdin: String::new(),
            pending_stdin: None,
            status: 0,
            log: String::new(),
        };

        // Inherit the parent environment as scalar variables
        for (key, value) in std::env::vars() {
            state.setenv(&key, &value);
        }
        let pwd_str = state.pwd.to_string_lossy().to_string();
        state.setenv("PWD", pwd_str);
        state.set_status(0);

        state
    }

    /// Set a scalar variable.
    pub fn setenv(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set_var(key, Variable::Scalar(value.into()));
    }

    /// Define or replace a variable of any kind.
    pub fn set_var(&mut self, key: impl Into<String>, value: Variable) {
        let key = key.into();
        if let Some(&idx) = self.var_index.get(&key) {
            self.vars[idx].1 = value;
        } else {
            let idx = self.vars.len();
            self.vars.push((key.clone(), value));
            self.var_index.insert(key, idx);
        }
    }

    /// Look up a variable by name.
    pub fn var(&self, key: &str) -> Option<&Variable> {
        self.var_index.get(key).map(|&idx| &self.vars[idx].1)
    }

    /// Get a scalar variable's value.
    pub fn getenv(&self, key: &str) -> Option<&str> {
        match self.var(key) {
            Some(Variable::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Remove a variable. Returns whether it existed.
    pub fn unset(&mut self, key: &str) -> bool {
        let Some(idx) = self.var_index.remove(key) else {
            return false;
        };
        self.vars.remove(idx);
        for (k, _) in &self.vars[idx..] {
            if let Some(i) = self.var_index.get_mut(k) {
                *i -= 1;
            }
        }
        true
    }

    /// Scalar variables as key=value pairs for a subprocess.
    ///
    /// Arrays, maps and single-character specials (`?`, `#`, `0`..`9`)
    /// are not exported.
    pub fn environ(&self) -> Vec<(&str, &str)> {
        self.vars.iter()
            .filter(|(k, _)| !is_special(k))
            .filter_map(|(k, v)| match v {
                Variable::Scalar(s) => Some((k.as_str(), s.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Record a command's exit status, mirrored in `$?`.
    pub fn set_status(&mut self, status: i32) {
        self.status = status;
        self.setenv("?", status.to_string());
    }

    /// Bind the script name and positional parameters (`$0`, `$1`.., `$#`).
    pub fn set_params(&mut self, script_name: &str, params: &[String]) {
        self.setenv("0", script_name);
        for (i, p) in params.iter().enumerate() {
            self.setenv((i + 1).to_string(), p.clone());
        }
        self.setenv("#", params.len().to_string());
    }

    /// Queue input for the next command.
    pub fn set_stdin(&mut self, input: impl Into<String>) {
        self.pending_stdin = Some(input.into());
    }

    /// Hand queued input to the command about to run. Commands without
    /// queued input read nothing.
    pub fn begin_command(&mut self) {
        self.stdin = self.pending_stdin.take().unwrap_or_default();
    }

    /// Take the running command's standard input.
    pub fn take_stdin(&mut self) -> String {
        std::mem::take(&mut self.stdin)
    }

    /// Resolve a path relative to the current working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            clean_path(p)
        } else {
            clean_path(&self.pwd.join(path))
        }
    }

    /// Change the current working directory.
    /// Also updates the PWD variable.
    pub fn chdir(&mut self, dir: &str) -> Result<(), io::Error> {
        let new_pwd = self.resolve_path(dir);
        if !new_pwd.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {}", new_pwd.display()),
            ));
        }
        let pwd_str = new_pwd.to_string_lossy().to_string();
        self.pwd = new_pwd;
        self.setenv("PWD", pwd_str);
        Ok(())
    }

    /// Expand variables in a string.
    pub fn expand(&self, s: &str) -> String {
        crate::parser::expand_vars(s, &|key| self.var(key).map(Variable::expand))
    }

    /// Write a log entry
    pub fn logf(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
    }
}

fn is_special(key: &str) -> bool {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c == '?' || c == '#' || c.is_ascii_digit(),
        _ => false,
    }
}

/// Clean a path by resolving `.` and `..` components lexically.
///
/// Unlike `canonicalize()`, this does not require the path to exist on disk.
fn clean_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    let mut has_root = false;
    let mut prefix: Option<std::path::Component> = None;

    for component in path.components() {
        match component {
            std::path::Component::RootDir => {
                has_root = true;
                components.clear();
            }
            std::path::Component::Prefix(_) => {
                prefix = Some(component);
                components.clear();
            }
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                // '..' at root is ignored
                if let Some(last) = components.last() {
                    if matches!(last, std::path::Component::Normal(_)) {
                        components.pop();
                    } else if !has_root {
                        components.push(component);
                    }
                } else if !has_root {
                    components.push(component);
                }
            }
            std::path::Component::Normal(_) => {
                components.push(component);
            }
        }
    }

    if components.is_empty() && !has_root && prefix.is_none() {
        return PathBuf::from(".");
    }

    let mut result = PathBuf::new();
    if let Some(p) = prefix {
        result.push(p);
    }
    if has_root {
        result.push(std::path::MAIN_SEPARATOR.to_string());
    }
    for c in &components {
        result.push(c);
    }
    result
}
