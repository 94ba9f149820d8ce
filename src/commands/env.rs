//! Environment commands: cd, echo, env, array, map, unset

use std::collections::BTreeMap;
use std::io::Write;
use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::{ScriptError, ErrorKind};
use crate::state::{State, Variable};

// ──────────────────────────────────────────────────────────
// cd — change directory
// ──────────────────────────────────────────────────────────

pub(super) struct CdCmd;

impl Cmd for CdCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.len() != 1 {
            return Err(ScriptError::usage("cd", "dir"));
        }

        state.chdir(&args[0]).map_err(|e| {
            ScriptError::new(ErrorKind::FileNotFound, e.to_string())
        })?;

        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Change working directory".into(),
            args: "dir".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// echo — print arguments
// ──────────────────────────────────────────────────────────

pub(super) struct EchoCmd;

impl Cmd for EchoCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        writeln!(state.stdout, "{}", args.join(" "))?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Print arguments to stdout".into(),
            args: "[string...]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// env — set/print variables
// ──────────────────────────────────────────────────────────

pub(super) struct EnvCmd;

impl Cmd for EnvCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let mut output = String::new();

        if args.is_empty() {
            for (k, v) in state.environ() {
                output.push_str(&format!("{}={}\n", k, v));
            }
        }

        for arg in args {
            if let Some((key, value)) = arg.split_once('=') {
                if key.is_empty() {
                    return Err(ScriptError::usage("env", "[key[=value]...]"));
                }
                state.setenv(key, value);
            } else {
                // Unset names print as KEY= with an empty value
                let val = state.var(arg).map(Variable::expand).unwrap_or_default();
                output.push_str(&format!("{}={}\n", arg, val));
            }
        }

        state.stdout.write_all(output.as_bytes())?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Set or print variables".into(),
            args: "[key[=value]...]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// array — define an indexed variable
// ──────────────────────────────────────────────────────────

pub(super) struct ArrayCmd;

impl Cmd for ArrayCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let Some((name, elems)) = args.split_first() else {
            return Err(ScriptError::usage("array", "name [elem...]"));
        };
        state.set_var(name.clone(), Variable::Indexed(elems.to_vec()));
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Define an array variable".into(),
            args: "name [elem...]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// map — define an associative variable
// ──────────────────────────────────────────────────────────

pub(super) struct MapCmd;

impl Cmd for MapCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let Some((name, pairs)) = args.split_first() else {
            return Err(ScriptError::usage("map", "name [key=value...]"));
        };
        let mut map = BTreeMap::new();
        for pair in pairs {
            let (k, v) = pair.split_once('=').ok_or_else(|| {
                ScriptError::new(ErrorKind::UsageError, format!("{:?} is not key=value", pair))
            })?;
            map.insert(k.to_string(), v.to_string());
        }
        state.set_var(name.clone(), Variable::Associative(map));
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Define a map variable".into(),
            args: "name [key=value...]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// unset — remove variables
// ──────────────────────────────────────────────────────────

pub(super) struct UnsetCmd;

impl Cmd for UnsetCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.is_empty() {
            return Err(ScriptError::usage("unset", "name..."));
        }
        for name in args {
            state.unset(name);
        }
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Remove variables".into(),
            args: "name...".into(),
        }
    }
}
