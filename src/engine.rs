//! Script engine
//!
//! The Engine holds the builtin and condition registries plus the exec
//! handler that resolves every other command name. It is stateless config:
//! one engine can run many scripts.

use std::collections::HashMap;
use std::io::Write;
use crate::error::{ErrorKind, ScriptError};
use crate::exec::ExternalExec;
use crate::parser::{ArgFragment, ScriptLine};
use crate::state::State;

/// Result returned by a command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdResult {
    /// Command completed with status 0
    Ok,
    /// Command completed with the given status
    Status(i32),
    /// Script should end with the given status
    Exit(i32),
}

/// Usage information for a command
pub struct CmdUsage {
    /// One-line summary
    pub summary: String,
    /// Argument syntax
    pub args: String,
}

/// A builtin command that can be executed in a script
pub trait Cmd: Send + Sync {
    /// Execute the command
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError>;

    /// Return usage information
    fn usage(&self) -> CmdUsage;
}

/// A boxed command
pub type BoxedCmd = Box<dyn Cmd>;

/// Runs every command that is not a builtin.
///
/// This is the interception point: the default handler launches an external
/// process, and embedders substitute their own strategy (see
/// [`Dispatcher`](crate::Dispatcher)).
pub trait ExecHandler: Send + Sync {
    /// Run `args[0]` with arguments `args[1..]`.
    fn exec(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError>;

    /// Commands this handler provides, listed by `help`.
    fn commands(&self) -> Vec<(String, CmdUsage)> {
        Vec::new()
    }
}

/// The script engine
pub struct Engine {
    /// Registered builtins
    pub commands: HashMap<String, BoxedCmd>,
    /// Registered conditions
    pub conditions: HashMap<String, crate::conditions::BoxedCondition>,
    /// Handler for non-builtin commands
    exec: Box<dyn ExecHandler>,
    /// Abort the script when a command fails (unless prefixed with `?`)
    pub errexit: bool,
}

impl Engine {
    /// Create a new engine with default builtins and conditions, running
    /// other commands as external processes.
    pub fn new() -> Self {
        let mut engine = Self {
            commands: crate::commands::default_commands(),
            conditions: crate::conditions::default_conditions(),
            exec: Box::new(ExternalExec::default()),
            errexit: false,
        };
        engine.rebuild_help();
        engine
    }

    /// Replace the handler for non-builtin commands
    pub fn set_exec_handler(&mut self, handler: Box<dyn ExecHandler>) {
        self.exec = handler;
        self.rebuild_help();
    }

    /// The help command knows every builtin, handler command and condition,
    /// so it is rebuilt whenever a registry changes.
    fn rebuild_help(&mut self) {
        let mut cmd_help: Vec<(String, String, String)> = self.commands.iter()
            .filter(|(name, _)| name.as_str() != "help")
            .map(|(name, cmd)| {
                let u = cmd.usage();
                (name.clone(), u.args, u.summary)
            })
            .chain(self.exec.commands().into_iter().map(|(name, u)| (name, u.args, u.summary)))
            .collect();
        cmd_help.sort_by(|a, b| a.0.cmp(&b.0));

        let mut cond_help: Vec<String> = self.conditions.iter()
            .map(|(name, c)| {
                let tag = if c.is_prefix() { format!("[{}:*]", name) } else { format!("[{}]", name) };
                format!("{:<12} {}", tag, c.summary())
            })
            .collect();
        cond_help.sort();

        self.commands.insert("help".into(),
            Box::new(crate::commands::HelpCmd::new(cmd_help, cond_help)));
    }

    /// Parse a whole script up front. A syntax error anywhere means nothing runs.
    pub fn parse_script(script: &str, filename: &str) -> Result<Vec<ScriptLine>, ScriptError> {
        let mut lines = Vec::new();
        for (i, line) in script.lines().enumerate() {
            let line_number = i + 1;
            match crate::parser::parse_line(line, line_number) {
                Ok(Some(parsed)) => lines.push(parsed),
                Ok(None) => {}
                Err(e) => {
                    return Err(ScriptError::syntax(e.message)
                        .with_location(filename, line_number));
                }
            }
        }
        Ok(lines)
    }

    /// Execute parsed script lines. Returns the script's final status: the
    /// status of the last command run, or the code given to `exit`.
    pub fn execute(
        &self,
        state: &mut State,
        lines: &[ScriptLine],
        filename: &str,
    ) -> Result<i32, ScriptError> {
        for parsed in lines {
            let line_number = parsed.line_number;

            state.logf(&format!("> {}", parsed.raw.trim()));

            let mut skip_line = false;
            for cond in &parsed.conditions {
                let result = self.eval_condition(state, cond)
                    .map_err(|e| e.with_location(filename, line_number))?;
                if !result {
                    skip_line = true;
                    break;
                }
            }
            if skip_line {
                state.logf("[condition not met]");
                continue;
            }

            let expanded_args = expand_args(state, &parsed.raw_args);

            state.begin_command();
            let result = self.run_command(state, &parsed.command, &expanded_args);

            let status = match result {
                Ok(CmdResult::Ok) => 0,
                Ok(CmdResult::Status(status)) => status,
                Ok(CmdResult::Exit(code)) => {
                    flush_streams(state);
                    state.logf(&format!("[exit {}]", code));
                    state.set_status(code);
                    return Ok(code);
                }
                Err(e) => {
                    report(state, &parsed.command, &e);
                    e.exit_status()
                }
            };
            flush_streams(state);

            let status = if parsed.negate {
                if status == 0 { 1 } else { 0 }
            } else {
                status
            };
            if status != 0 {
                state.logf(&format!("[status {}]", status));
            }
            state.set_status(status);

            if self.errexit && status != 0 && !parsed.may_fail {
                let err = if parsed.negate {
                    ScriptError::new(ErrorKind::UnexpectedSuccess,
                        format!("command succeeded unexpectedly: {}", parsed.raw.trim()))
                } else {
                    ScriptError::failed(status, format!("exit status {}", status))
                };
                return Err(err.with_location(filename, line_number)
                    .with_command(&parsed.command)
                    .with_args(expanded_args));
            }
        }

        Ok(state.status)
    }

    /// Run one command: a builtin if registered, otherwise the exec handler.
    pub fn run_command(&self, state: &mut State, name: &str, args: &[String]) -> Result<CmdResult, ScriptError> {
        if let Some(cmd) = self.commands.get(name) {
            return cmd.run(state, args);
        }
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(name.to_string());
        argv.extend_from_slice(args);
        self.exec.exec(state, &argv)
    }

    /// Evaluate a condition.
    ///
    /// The condition tag may be "name" or "name:suffix".
    /// Prefix conditions (like `exec`) require a suffix; others reject one.
    fn eval_condition(&self, state: &State, cond: &crate::parser::ScriptCondition) -> Result<bool, ScriptError> {
        let (prefix, suffix, has_colon) = if let Some(colon) = cond.tag.find(':') {
            (&cond.tag[..colon], Some(&cond.tag[colon + 1..]), true)
        } else {
            (cond.tag.as_str(), None, false)
        };

        let condition = if has_colon {
            let c = self.conditions.get(prefix).ok_or_else(|| {
                let mut known: Vec<&str> = self.conditions.keys().map(|s| s.as_str()).collect();
                known.sort();
                ScriptError::syntax(format!("unknown condition prefix {:?}; known: {:?}", prefix, known))
            })?;
            if !c.is_prefix() {
                return Err(ScriptError::syntax(
                    format!("condition {:?} cannot be used with a suffix", prefix),
                ));
            }
            c
        } else {
            let c = self.conditions.get(prefix).ok_or_else(|| {
                ScriptError::syntax(format!("unknown condition {:?}", prefix))
            })?;
            if c.is_prefix() {
                return Err(ScriptError::syntax(
                    format!("condition {:?} requires a suffix", prefix),
                ));
            }
            c
        };

        let result = condition.eval(state, suffix.unwrap_or("")).map_err(|e| {
            ScriptError::syntax(format!("evaluating condition {:?}: {}", cond.tag, e.message))
        })?;
        Ok(if cond.negate { !result } else { result })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Print a command's error on its stderr, the way a failing program would.
fn report(state: &mut State, command: &str, err: &ScriptError) {
    let name = err.command.as_deref().unwrap_or(command);
    let _ = if err.is_help() {
        writeln!(state.stderr, "{}", err.message)
    } else {
        writeln!(state.stderr, "{}: {}", name, err.message)
    };
    state.logf(&format!("[{}: {}]", name, err.message));
}

fn flush_streams(state: &mut State) {
    let _ = state.stdout.flush();
    let _ = state.stderr.flush();
}

/// Expand arguments from raw fragments.
///
/// Quoted fragments are emitted verbatim; unquoted fragments have variables
/// expanded.
pub fn expand_args(state: &State, raw_args: &[Vec<ArgFragment>]) -> Vec<String> {
    let mut args = Vec::with_capacity(raw_args.len());
    for frags in raw_args {
        let mut buf = String::new();
        for frag in frags {
            if frag.quoted {
                buf.push_str(&frag.s);
            } else {
                buf.push_str(&state.expand(&frag.s));
            }
        }
        args.push(buf);
    }
    args
}
