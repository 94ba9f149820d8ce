//! Script conditions
//!
//! Conditions are used in `[cond]` guards to conditionally execute commands.
//! Prefix conditions take a `:suffix` argument; the others reject one.

use std::collections::HashMap;
use crate::error::ScriptError;
use crate::state::State;

/// A condition that can be evaluated
pub trait Condition: Send + Sync {
    /// Evaluate the condition.
    /// `suffix` is for prefix conditions like `exec:curl` (suffix = "curl").
    /// For non-prefix conditions, suffix is "".
    fn eval(&self, state: &State, suffix: &str) -> Result<bool, ScriptError>;

    /// Brief description
    fn summary(&self) -> &str;

    /// Whether this is a prefix condition requiring a `:suffix`.
    fn is_prefix(&self) -> bool;
}

/// Boxed condition
pub type BoxedCondition = Box<dyn Condition>;

/// Return the default set of conditions
pub fn default_conditions() -> HashMap<String, BoxedCondition> {
    let mut conds: HashMap<String, BoxedCondition> = HashMap::new();

    conds.insert("unix".into(), Box::new(BoolCondition {
        summary: "true on Unix-like systems".into(),
        value: cfg!(unix),
    }));
    conds.insert("windows".into(), Box::new(BoolCondition {
        summary: "true on Windows".into(),
        value: cfg!(windows),
    }));
    conds.insert("darwin".into(), Box::new(BoolCondition {
        summary: "true on macOS".into(),
        value: cfg!(target_os = "macos"),
    }));
    conds.insert("linux".into(), Box::new(BoolCondition {
        summary: "true on Linux".into(),
        value: cfg!(target_os = "linux"),
    }));

    conds.insert("ok".into(), Box::new(StatusCondition));
    conds.insert("exec".into(), Box::new(ExecCondition));
    conds.insert("var".into(), Box::new(VarCondition));

    conds
}

/// A static boolean condition (non-prefix)
struct BoolCondition {
    summary: String,
    value: bool,
}

impl Condition for BoolCondition {
    fn eval(&self, _state: &State, suffix: &str) -> Result<bool, ScriptError> {
        if !suffix.is_empty() {
            return Err(ScriptError::syntax(
                format!("condition does not accept a suffix, got :{}", suffix),
            ));
        }
        Ok(self.value)
    }
    fn summary(&self) -> &str {
        &self.summary
    }
    fn is_prefix(&self) -> bool {
        false
    }
}

/// True when the previous command succeeded
struct StatusCondition;

impl Condition for StatusCondition {
    fn eval(&self, state: &State, _suffix: &str) -> Result<bool, ScriptError> {
        Ok(state.status == 0)
    }
    fn summary(&self) -> &str {
        "true if the last command succeeded"
    }
    fn is_prefix(&self) -> bool {
        false
    }
}

/// Condition that checks if an executable is in the script's PATH
struct ExecCondition;

impl Condition for ExecCondition {
    fn eval(&self, state: &State, suffix: &str) -> Result<bool, ScriptError> {
        if suffix.is_empty() {
            return Err(ScriptError::syntax("exec condition requires :program suffix"));
        }
        Ok(crate::exec::look_path(state, suffix).is_some())
    }

    fn summary(&self) -> &str {
        "true if program is in PATH"
    }

    fn is_prefix(&self) -> bool {
        true
    }
}

/// Condition that checks if a variable of any kind is defined
struct VarCondition;

impl Condition for VarCondition {
    fn eval(&self, state: &State, suffix: &str) -> Result<bool, ScriptError> {
        if suffix.is_empty() {
            return Err(ScriptError::syntax("var condition requires :name suffix"));
        }
        Ok(state.var(suffix).is_some())
    }

    fn summary(&self) -> &str {
        "true if variable is defined"
    }

    fn is_prefix(&self) -> bool {
        true
    }
}
