//! help — display command help

use std::io::Write;
use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::ScriptError;
use crate::state::State;

pub struct HelpCmd {
    /// (name, args, summary) for each command
    cmd_info: Vec<(String, String, String)>,
    /// Condition names
    cond_names: Vec<String>,
}

impl HelpCmd {
    pub fn new(cmd_info: Vec<(String, String, String)>, cond_names: Vec<String>) -> Self {
        Self { cmd_info, cond_names }
    }
}

fn describe(output: &mut String, name: &str, args: &str, summary: &str) {
    if args.is_empty() {
        output.push_str(&format!("{}\n    {}\n", name, summary));
    } else {
        output.push_str(&format!("{} {}\n    {}\n", name, args, summary));
    }
}

impl Cmd for HelpCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let mut output = String::new();
        let mut status = 0;

        if args.is_empty() {
            for (name, args_str, summary) in &self.cmd_info {
                describe(&mut output, name, args_str, summary);
            }

            if !self.cond_names.is_empty() {
                output.push_str("\nconditions:\n");
                for name in &self.cond_names {
                    output.push_str(&format!("    {}\n", name));
                }
            }
        } else {
            for name in args {
                if let Some((_, args_str, summary)) = self.cmd_info.iter().find(|(n, _, _)| n == name) {
                    describe(&mut output, name, args_str, summary);
                } else {
                    writeln!(state.stderr, "help: {}: unknown command", name)?;
                    status = 1;
                }
            }
        }

        state.stdout.write_all(output.as_bytes())?;
        if status == 0 {
            Ok(CmdResult::Ok)
        } else {
            Ok(CmdResult::Status(status))
        }
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Display help for commands".into(),
            args: "[command...]".into(),
        }
    }
}
