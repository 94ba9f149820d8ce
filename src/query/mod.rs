//! jq queries over decoded documents
//!
//! Queries are compiled with the jaq standard library. Results are produced
//! lazily and handed to a sink one at a time; the first error stops the
//! sequence without evaluating what follows.

mod encode;
mod filter;
mod rewrite;
mod value;

use std::fmt::Display;
use jaq_core::load::parse::Def;
use jaq_core::{compile, load, Ctx, RcIter};
use jaq_json::Val;
use crate::error::{ErrorKind, ScriptError};
use rewrite::null_safe;

pub use encode::{Encoder, Mode};
pub use filter::{FilterArgs, FilterConfig, QueryFilter};
pub use value::{json_to_val, val_to_json};

type Filter = jaq_core::Filter<jaq_core::Native<Val>>;

/// Name the guarded query is compiled under
const ENTRY: &str = "__eventsh_query";

/// A compiled jq query
pub struct Query {
    filter: Filter,
}

impl Query {
    /// Compile a query string. Indexing null yields null, as in jq.
    pub fn parse(code: &str) -> Result<Self, ScriptError> {
        let Some(main) = load::parse(code, |p| p.term()) else {
            return Err(parse_failure(code));
        };

        let arena = load::Arena::default();
        let entry = Def { name: ENTRY, args: Vec::new(), body: null_safe(main) };
        let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()).map(|d| -> Def<&str> { d }).chain([entry]));
        let modules = loader
            .load(&arena, load::File { path: (), code: ENTRY })
            .map_err(load_errors)?;

        let compiler = compile::Compiler::default().with_funs(jaq_std::funs().chain(jaq_json::funs()));
        let filter = compiler.compile(modules).map_err(|errs| {
            let msgs: Vec<String> = errs
                .into_iter()
                .flat_map(|(_, errors)| {
                    errors.into_iter().map(|(_, undefined)| format!("undefined {}", undefined.as_str()))
                })
                .collect();
            syntax_error(msgs)
        })?;

        Ok(Self { filter })
    }

    /// Run the query on one input, passing each result to `emit` in order.
    pub fn run<F>(&self, input: Val, emit: F) -> Result<(), ScriptError>
    where
        F: FnMut(Val) -> Result<(), ScriptError>,
    {
        let inputs: RcIter<_> = RcIter::new(Box::new(core::iter::empty()));
        let ctx = Ctx::new(Vec::new(), &inputs);
        drain(self.filter.run((ctx, input)), emit)
    }
}

/// Load the query as written to report why it does not parse.
fn parse_failure(code: &str) -> ScriptError {
    let arena = load::Arena::default();
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    match loader.load(&arena, load::File { path: (), code }) {
        Ok(_) => syntax_error(vec!["module directives are not supported".into()]),
        Err(errs) => load_errors(errs),
    }
}

fn load_errors(errs: load::Errors<&str, ()>) -> ScriptError {
    let msgs: Vec<String> = errs
        .into_iter()
        .flat_map(|(_, e)| -> Vec<String> {
            match e {
                load::Error::Io(io_errs) => io_errs.into_iter().map(|(_, msg)| msg).collect(),
                load::Error::Lex(lex_errs) => lex_errs.into_iter()
                    .map(|(expected, _)| format!("expected {}", expected.as_str()))
                    .collect(),
                load::Error::Parse(parse_errs) => parse_errs.into_iter()
                    .map(|(expected, _)| format!("expected {}", expected.as_str()))
                    .collect(),
            }
        })
        .collect();
    syntax_error(msgs)
}

fn syntax_error(msgs: Vec<String>) -> ScriptError {
    ScriptError::new(ErrorKind::QuerySyntax, format!("unable to parse query: {}", msgs.join(", ")))
}

/// Feed results to `emit` until the sequence ends or yields an error.
/// Elements after an error are never pulled.
pub fn drain<I, E, F>(results: I, mut emit: F) -> Result<(), ScriptError>
where
    I: IntoIterator<Item = Result<Val, E>>,
    E: Display,
    F: FnMut(Val) -> Result<(), ScriptError>,
{
    for result in results {
        match result {
            Ok(val) => emit(val)?,
            Err(e) => {
                return Err(ScriptError::new(ErrorKind::QueryRuntime, format!("query error: {}", e)));
            }
        }
    }
    Ok(())
}
