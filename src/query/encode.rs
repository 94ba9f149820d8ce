//! Result encoder
//!
//! Renders query results in one of three modes. An encoder lives for one
//! command invocation, so separators span every input document.

use std::io::{self, Write};
use jaq_json::Val;
use super::value::{val_to_json, val_to_yaml};

/// Output rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Strings verbatim, other scalars as text, collections as compact JSON
    #[default]
    Plain,
    /// One JSON value per line
    Json,
    /// A YAML document stream
    Yaml,
}

/// Writes query results to an output stream.
#[derive(Debug)]
pub struct Encoder {
    mode: Mode,
    pretty: bool,
    written: bool,
}

impl Encoder {
    pub fn new(mode: Mode, pretty: bool) -> Self {
        Self { mode, pretty, written: false }
    }

    /// Encode one result value.
    pub fn encode(&mut self, out: &mut dyn Write, val: &Val) -> io::Result<()> {
        let first = !self.written;
        self.written = true;

        match self.mode {
            Mode::Json => {
                let doc = json_doc(val)?;
                if self.pretty {
                    serde_json::to_writer_pretty(&mut *out, &doc)?;
                } else {
                    serde_json::to_writer(&mut *out, &doc)?;
                }
                out.write_all(b"\n")
            }
            Mode::Yaml => {
                let text = serde_yaml::to_string(&val_to_yaml(val))
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                if !first {
                    out.write_all(b"---\n")?;
                }
                out.write_all(text.as_bytes())
            }
            Mode::Plain => {
                if !first {
                    out.write_all(b"\n")?;
                }
                out.write_all(plain_text(val)?.as_bytes())
            }
        }
    }
}

fn plain_text(val: &Val) -> io::Result<String> {
    Ok(match val {
        Val::Arr(_) | Val::Obj(_) => serde_json::to_string(&json_doc(val)?)?,
        Val::Str(s) => s.to_string(),
        Val::Float(f) => format_float(*f),
        Val::Int(n) => n.to_string(),
        Val::Num(s) => s.to_string(),
        Val::Bool(b) => b.to_string(),
        Val::Null => "null".to_string(),
    })
}

/// Shortest decimal form; non-finite values spelled `+Inf`, `-Inf` and `NaN`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{}", f)
    }
}

/// The JSON document for `val`. JSON has no non-finite numbers.
fn json_doc(val: &Val) -> io::Result<serde_json::Value> {
    match non_finite(val) {
        Some(f) => Err(io::Error::new(io::ErrorKind::InvalidData,
            format!("json: unsupported value: {}", format_float(f)))),
        None => Ok(val_to_json(val)),
    }
}

fn non_finite(val: &Val) -> Option<f64> {
    match val {
        Val::Float(f) if !f.is_finite() => Some(*f),
        Val::Arr(items) => items.iter().find_map(non_finite),
        Val::Obj(entries) => entries.values().find_map(non_finite),
        _ => None,
    }
}
