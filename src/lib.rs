//! eventsh: a shell for querying monitoring events with jq
//!
//! Scripts run line by line in a small interpreter. Three command forms are
//! answered in process instead of being executed as programs:
//!
//! ```text
//! # query the event the session was started with
//! event .entity.metadata.name
//!
//! # query YAML or JSON from stdin or a variable
//! stdin check.yaml
//! query -j '.check.status'
//! query '.items[]' DOC
//!
//! # shorthand for `query [flags] [query] NAME`
//! @PATH -R 'split(":")[]'
//! ```
//!
//! # Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `-j`, `-json` | One JSON value per line |
//! | `-Y`, `-yaml` | YAML document stream |
//! | `-p`, `-pretty` | Indent JSON output |
//! | `-R`, `-raw-input` | Query the input as one string (`query` and `@name` only) |
//!
//! Without `-j` or `-Y`, strings print verbatim and collections print as
//! compact JSON, one result per line.
//!
//! # Prefixes
//!
//! - `!` - Invert the command's status
//! - `?` - Failure never aborts the script
//! - `[cond]` - Conditional execution

mod commands;
mod conditions;
mod config;
mod dispatch;
mod engine;
mod error;
mod exec;
mod parser;
pub mod query;
mod session;
mod state;

pub use engine::{Engine, Cmd, CmdUsage, CmdResult, ExecHandler, expand_args};
pub use state::{State, Output, Variable};
pub use parser::{ScriptLine, ArgFragment, parse_line};
pub use commands::default_commands;
pub use conditions::{Condition, default_conditions};
pub use config::Config;
pub use dispatch::{Dispatch, Dispatcher};
pub use exec::{ExternalExec, DEFAULT_TIMEOUT};
pub use session::{Event, Script, Session};
pub use error::{ScriptError, ErrorKind};
