//! Query filter: flag parsing, input decoding and result rendering
//!
//! Flags follow the single-dash long-flag convention: `-j` and `-json`
//! (or `--json`) are the same flag, booleans accept `-flag=false`, and flag
//! parsing stops at the first positional argument or after `--`.

use std::io::Write;
use jaq_json::Val;
use serde::Deserialize;
use crate::error::{ErrorKind, ScriptError};
use super::encode::{Encoder, Mode};
use super::value::json_to_val;
use super::Query;

/// Rendering and decoding switches shared by `query`, `event` and `@name`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub json: bool,
    pub yaml: bool,
    pub pretty: bool,
    pub raw_input: bool,
}

impl FilterConfig {
    /// The render mode. JSON wins when both JSON and YAML are requested.
    pub fn mode(&self) -> Mode {
        if self.json {
            Mode::Json
        } else if self.yaml {
            Mode::Yaml
        } else {
            Mode::Plain
        }
    }
}

/// (short, long, help) for each boolean flag
const FLAGS: &[(&str, &str, &str)] = &[
    ("j", "json", "Print output as JSON."),
    ("Y", "yaml", "Output YAML instead of JSON or text."),
    ("p", "pretty", "Pretty-print JSON."),
];

const RAW_INPUT_FLAG: (&str, &str, &str) = ("R", "raw-input", "Read raw input as a string.");

/// Parsed command line of a filtering command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    pub config: FilterConfig,
    pub positional: Vec<String>,
}

impl FilterArgs {
    /// Parse `args` for `command`. `-R` is accepted only when
    /// `allow_raw_input` is set.
    pub fn parse(command: &str, args: &[String], allow_raw_input: bool) -> Result<Self, ScriptError> {
        let mut config = FilterConfig::default();
        let mut rest = args;

        while let Some((arg, tail)) = rest.split_first() {
            if arg == "--" {
                rest = tail;
                break;
            }
            if arg.len() < 2 || !arg.starts_with('-') {
                break;
            }
            rest = tail;

            let body = arg.strip_prefix("--").unwrap_or(&arg[1..]);
            if body.is_empty() || body.starts_with('-') || body.starts_with('=') {
                return Err(usage_error(command, allow_raw_input, format!("bad flag syntax: {}", arg)));
            }
            let (name, value) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };

            let slot = match name {
                "j" | "json" => &mut config.json,
                "Y" | "yaml" => &mut config.yaml,
                "p" | "pretty" => &mut config.pretty,
                "R" | "raw-input" if allow_raw_input => &mut config.raw_input,
                "h" | "help" => return Err(ScriptError::help(usage_text(command, allow_raw_input))),
                _ => {
                    return Err(usage_error(command, allow_raw_input,
                        format!("flag provided but not defined: -{}", name)));
                }
            };
            *slot = match value {
                None => true,
                Some(v) => parse_bool(v).ok_or_else(|| {
                    usage_error(command, allow_raw_input,
                        format!("invalid boolean value {:?} for -{}: parse error", v, name))
                })?,
            };
        }

        Ok(Self { config, positional: rest.to_vec() })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn usage_error(command: &str, allow_raw_input: bool, msg: String) -> ScriptError {
    ScriptError::new(ErrorKind::UsageError,
        format!("{}\n{}", msg, usage_text(command, allow_raw_input).trim_end()))
}

/// Flag listing printed for `-h` and after flag errors.
pub fn usage_text(command: &str, allow_raw_input: bool) -> String {
    let mut entries: Vec<(&str, String)> = Vec::new();
    let flags = FLAGS.iter().chain(allow_raw_input.then_some(&RAW_INPUT_FLAG));
    for &(short, long, help) in flags {
        entries.push((short, format!("{} (long: -{})", help, long)));
        entries.push((long, format!("{} (short: -{})", help, short)));
    }
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = format!("Usage of {}:\n", command);
    for (name, help) in entries {
        if name.len() == 1 {
            out.push_str(&format!("  -{}\t{}\n", name, help));
        } else {
            out.push_str(&format!("  -{}\n    \t{}\n", name, help));
        }
    }
    out
}

/// Runs a compiled query over decoded input and renders the results.
pub struct QueryFilter {
    encoder: Encoder,
}

impl QueryFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self { encoder: Encoder::new(config.mode(), config.pretty) }
    }

    /// Query the whole input as a single string value.
    pub fn run_raw(&mut self, query: &Query, text: String, out: &mut dyn Write) -> Result<(), ScriptError> {
        self.run_value(query, Val::Str(std::rc::Rc::new(text)), out)
    }

    /// Query each document of a YAML stream in order. JSON is accepted as
    /// YAML; input without content is an empty stream.
    pub fn run_documents(&mut self, query: &Query, text: &str, out: &mut dyn Write) -> Result<(), ScriptError> {
        if !has_content(text) {
            return Ok(());
        }
        for document in serde_yaml::Deserializer::from_str(text) {
            let doc = serde_json::Value::deserialize(document).map_err(|e| {
                ScriptError::new(ErrorKind::Decode, format!("error decoding input: {}", e))
            })?;
            self.run_value(query, json_to_val(doc), out)?;
        }
        Ok(())
    }

    /// Query one value.
    pub fn run_value(&mut self, query: &Query, input: Val, out: &mut dyn Write) -> Result<(), ScriptError> {
        let encoder = &mut self.encoder;
        query.run(input, |val| {
            encoder.encode(&mut *out, &val).map_err(|e| {
                ScriptError::new(ErrorKind::Io, format!("encoding error: {}", e))
            })
        })
    }
}

/// Whether a YAML stream holds anything beyond comments, directives and
/// document markers.
fn has_content(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        let rest = line.strip_prefix("---").or_else(|| line.strip_prefix("...")).unwrap_or(line).trim();
        !(rest.is_empty() || rest.starts_with('#') || line.starts_with('%'))
    })
}
