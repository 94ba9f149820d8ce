//! File input commands: cat, stdin

use std::io::Write;
use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::{ScriptError, ErrorKind};
use crate::state::State;

fn read_file(state: &State, file: &str) -> Result<String, ScriptError> {
    let path = state.resolve_path(file);
    std::fs::read_to_string(&path).map_err(|e| {
        ScriptError::new(ErrorKind::FileNotFound, format!("{}: {}", file, e))
    })
}

// ──────────────────────────────────────────────────────────
// cat — print files, or stdin when none are named
// ──────────────────────────────────────────────────────────

pub(super) struct CatCmd;

impl Cmd for CatCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.is_empty() {
            let input = state.take_stdin();
            state.stdout.write_all(input.as_bytes())?;
            return Ok(CmdResult::Ok);
        }

        let mut output = String::new();
        for file in args {
            output.push_str(&read_file(state, file)?);
        }
        state.stdout.write_all(output.as_bytes())?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Concatenate files and print to stdout".into(),
            args: "[file...]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// stdin — feed a file to the next command
// ──────────────────────────────────────────────────────────

pub(super) struct StdinCmd;

impl Cmd for StdinCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.len() != 1 {
            return Err(ScriptError::usage("stdin", "file"));
        }
        let content = read_file(state, &args[0])?;
        state.set_stdin(content);
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Use file content as the next command's stdin".into(),
            args: "file".into(),
        }
    }
}
