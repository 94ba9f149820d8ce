//! Flow control commands: exit

use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::{ScriptError, ErrorKind};
use crate::state::State;

// ──────────────────────────────────────────────────────────
// exit — end the script
// ──────────────────────────────────────────────────────────

pub(super) struct ExitCmd;

impl Cmd for ExitCmd {
    fn run(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        // Without a code, the last status is kept
        let code = match args {
            [] => state.status,
            [code] => code.parse::<i32>().map_err(|_| {
                ScriptError::new(ErrorKind::UsageError,
                    format!("numeric argument required: {}", code))
            })?,
            _ => return Err(ScriptError::usage("exit", "[code]")),
        };
        Ok(CmdResult::Exit(code))
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "End the script with a status".into(),
            args: "[code]".into(),
        }
    }
}
