//! Session: the event, the script and the engine that runs it

use std::io::Read;
use anyhow::{bail, Context, Result};
use jaq_json::Val;
use serde_json::{Map, Value};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::error::ScriptError;
use crate::exec::ExternalExec;
use crate::parser::ScriptLine;
use crate::query::json_to_val;
use crate::state::State;

/// Read a file, or standard input for `-`.
fn read_source(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
    }
}

/// The event document exposed to `event`. Read once, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Decode a YAML or JSON mapping.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            bail!("event is empty");
        }
        let doc: Value = serde_yaml::from_str(text).context("invalid event document")?;
        match doc {
            Value::Object(map) => Ok(Event(map)),
            other => bail!("event must be a mapping, got {}", kind_name(&other)),
        }
    }

    /// Read and decode the event from a file, or standard input for `-`.
    pub fn load(path: &str) -> Result<Self> {
        let text = read_source(path).with_context(|| format!("error reading event [{}]", path))?;
        Self::parse(&text).with_context(|| format!("error parsing event [{}]", path))
    }

    /// A fresh query value of the whole event.
    pub fn to_val(&self) -> Val {
        json_to_val(Value::Object(self.0.clone()))
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// A fully parsed script
#[derive(Debug, Clone)]
pub struct Script {
    /// Name used in error locations
    pub name: String,
    pub lines: Vec<ScriptLine>,
}

impl Script {
    /// Parse script text. Any syntax error rejects the whole script.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, ScriptError> {
        let name = name.into();
        let lines = Engine::parse_script(text, &name)?;
        Ok(Self { name, lines })
    }

    /// Read and parse a script file, or standard input for `-`.
    pub fn load(path: &str) -> Result<Self> {
        let text = read_source(path).with_context(|| format!("error opening script [{}]", path))?;
        Self::parse(path, &text).with_context(|| format!("error parsing script [{}]", path))
    }

    /// A script made of command strings, one per line.
    pub fn inline(commands: &[String]) -> Result<Self, ScriptError> {
        Self::parse("<commands>", &commands.join("\n"))
    }
}

/// An engine wired to answer `query`, `event` and `@name`
pub struct Session {
    engine: Engine,
}

impl Session {
    pub fn new(event: Event, config: &Config) -> Self {
        let mut engine = Engine::new();
        engine.errexit = config.errexit;
        engine.set_exec_handler(Box::new(Dispatcher::new(
            event,
            ExternalExec::new(config.exec_timeout),
        )));
        Self { engine }
    }

    /// Run a script to completion, returning its final status.
    pub fn run(&self, state: &mut State, script: &Script) -> Result<i32, ScriptError> {
        self.engine.execute(state, &script.lines, &script.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accepts_yaml_and_json() {
        let yaml = Event::parse("check:\n  status: 1\n").unwrap();
        let json = Event::parse("{\"check\": {\"status\": 1}}").unwrap();
        assert_eq!(yaml, json);
        let doc = crate::query::val_to_json(&yaml.to_val());
        assert_eq!(doc, serde_json::json!({"check": {"status": 1}}));
    }

    #[test]
    fn test_event_must_be_a_mapping() {
        assert!(Event::parse("").is_err());
        assert!(Event::parse("  \n").is_err());
        let err = Event::parse("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("mapping"));
        assert!(Event::parse("{unclosed").is_err());
    }

    #[test]
    fn test_event_load_reports_path() {
        let err = Event::load("/definitely/missing/event.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/missing/event.json"));
    }

    #[test]
    fn test_script_syntax_error_rejects_all() {
        let err = Script::parse("check.sh", "echo one\necho 'two").unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_inline_script() {
        let script = Script::inline(&["echo a".into(), "event .x".into()]).unwrap();
        assert_eq!(script.lines.len(), 2);
        assert_eq!(script.lines[1].command, "event");
    }

    #[test]
    fn test_session_runs_script() {
        let event = Event::parse("entity: {metadata: {name: foobar}}").unwrap();
        let session = Session::new(event, &Config::default());
        let mut state = State::captured(std::env::temp_dir());
        let script = Script::parse("t", "event .entity.metadata.name\necho\n").unwrap();
        assert_eq!(session.run(&mut state, &script).unwrap(), 0);
        assert_eq!(state.stdout.take(), "foobar\n");
    }
}
