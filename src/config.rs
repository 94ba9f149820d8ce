//! Session configuration

use std::time::Duration;
use anyhow::{bail, Result};
use crate::exec::DEFAULT_TIMEOUT;

/// Settings for a script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long an external command may run before it is killed
    pub exec_timeout: Duration,
    /// Abort the script when a command fails
    pub errexit: bool,
    /// Print the execution log after the run
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_timeout: DEFAULT_TIMEOUT,
            errexit: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `EVENTSH_TIMEOUT` (seconds), `EVENTSH_ERREXIT`
    /// and `EVENTSH_VERBOSE`. A malformed timeout is an error.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(secs) = lookup("EVENTSH_TIMEOUT") {
            match secs.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && n > 0.0 => {
                    self.exec_timeout = Duration::from_secs_f64(n);
                }
                _ => bail!("EVENTSH_TIMEOUT={:?} is not a positive number of seconds", secs),
            }
        }
        if let Some(v) = lookup("EVENTSH_ERREXIT") {
            self.errexit = is_enabled(&v);
        }
        if let Some(v) = lookup("EVENTSH_VERBOSE") {
            self.verbose = is_enabled(&v);
        }
        Ok(self)
    }

    pub fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn errexit(mut self, errexit: bool) -> Self {
        self.errexit = errexit;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn is_enabled(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "no" | "off")
}
