//! Built-in script commands
//!
//! Builtins run inside the interpreter; every other command name goes to the
//! engine's exec handler.

mod env;
mod flow;
mod help;
mod io;

use std::collections::HashMap;
use crate::engine::BoxedCmd;

pub use help::HelpCmd;

/// Return the default set of built-in commands
pub fn default_commands() -> HashMap<String, BoxedCmd> {
    let mut cmds: HashMap<String, BoxedCmd> = HashMap::new();
    cmds.insert("cd".into(), Box::new(env::CdCmd));
    cmds.insert("echo".into(), Box::new(env::EchoCmd));
    cmds.insert("env".into(), Box::new(env::EnvCmd));
    cmds.insert("array".into(), Box::new(env::ArrayCmd));
    cmds.insert("map".into(), Box::new(env::MapCmd));
    cmds.insert("unset".into(), Box::new(env::UnsetCmd));
    cmds.insert("cat".into(), Box::new(io::CatCmd));
    cmds.insert("stdin".into(), Box::new(io::StdinCmd));
    cmds.insert("exit".into(), Box::new(flow::ExitCmd));
    cmds
}
