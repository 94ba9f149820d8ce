//! Command dispatch
//!
//! Every command that is not a builtin passes through the [`Dispatcher`].
//! `query`, `event` and `@name` are answered in process; everything else is
//! handed to [`ExternalExec`].

use crate::engine::{CmdResult, CmdUsage, ExecHandler};
use crate::error::{ErrorKind, ScriptError};
use crate::exec::ExternalExec;
use crate::query::{FilterArgs, Query, QueryFilter};
use crate::session::Event;
use crate::state::{State, Variable};

/// How a command name is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// `query [flags] [query] [source]`
    Query,
    /// `event [flags] [query]`
    Event,
    /// `@name [flags] [query]`, shorthand for a query on variable `name`
    Variable(String),
    /// Anything else runs as an external program
    External,
}

impl Dispatch {
    /// Classify a command name against the live variables.
    ///
    /// `@name` only applies to scalar and indexed variables; `@` alone and
    /// any other `@name` run as external programs.
    pub fn classify(name: &str, state: &State) -> Self {
        match name {
            "query" => Dispatch::Query,
            "event" => Dispatch::Event,
            _ => match name.strip_prefix('@') {
                Some(var) if !var.is_empty() => match state.var(var) {
                    Some(Variable::Scalar(_)) | Some(Variable::Indexed(_)) => {
                        Dispatch::Variable(var.to_string())
                    }
                    _ => Dispatch::External,
                },
                _ => Dispatch::External,
            },
        }
    }
}

/// Exec handler answering `query`, `event` and `@name`
pub struct Dispatcher {
    event: Event,
    fallback: ExternalExec,
}

impl Dispatcher {
    pub fn new(event: Event, fallback: ExternalExec) -> Self {
        Self { event, fallback }
    }

    fn query(&self, state: &mut State, args: &[String], forced: Option<&str>) -> Result<CmdResult, ScriptError> {
        let parsed = FilterArgs::parse("query", args, true)?;

        let mut positional = parsed.positional;
        if positional.is_empty() {
            positional.push(".".into());
        }
        if let Some(name) = forced {
            positional.push(name.to_string());
        }

        let (code, source) = match positional.as_slice() {
            [code] => (code.as_str(), "-"),
            [code, source] => (code.as_str(), source.as_str()),
            _ => return Err(ScriptError::new(ErrorKind::UsageError,
                "too many arguments to query: expected 0..2")),
        };

        let query = Query::parse(code)?;
        let input = if source == "-" {
            state.take_stdin()
        } else {
            variable_text(state, source)
        };

        let mut filter = QueryFilter::new(&parsed.config);
        if parsed.config.raw_input {
            filter.run_raw(&query, input, &mut state.stdout)?;
        } else {
            filter.run_documents(&query, &input, &mut state.stdout)?;
        }
        Ok(CmdResult::Ok)
    }

    fn event(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let parsed = FilterArgs::parse("event", args, false)?;
        let code = match parsed.positional.as_slice() {
            [] => ".",
            [code] => code.as_str(),
            _ => return Err(ScriptError::new(ErrorKind::UsageError,
                "too many arguments to event: expected 0..1")),
        };

        let query = Query::parse(code)?;
        let mut filter = QueryFilter::new(&parsed.config);
        filter.run_value(&query, self.event.to_val(), &mut state.stdout)?;
        Ok(CmdResult::Ok)
    }
}

/// The input text a variable provides: scalars as-is, indexed variables
/// joined by newlines, anything else empty.
fn variable_text(state: &State, name: &str) -> String {
    match state.var(name) {
        Some(Variable::Scalar(s)) => s.clone(),
        Some(Variable::Indexed(list)) => list.join("\n"),
        _ => String::new(),
    }
}

impl ExecHandler for Dispatcher {
    fn exec(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let Some((name, rest)) = args.split_first() else {
            return self.fallback.exec(state, args);
        };

        let dispatch = Dispatch::classify(name, state);
        log::debug!("dispatch {} => {:?}", name, dispatch);

        match dispatch {
            Dispatch::Query => self.query(state, rest, None),
            Dispatch::Event => self.event(state, rest),
            Dispatch::Variable(var) => self.query(state, rest, Some(var.as_str()))
                .map_err(|e| e.with_command("query")),
            Dispatch::External => self.fallback.exec(state, args),
        }
    }

    fn commands(&self) -> Vec<(String, CmdUsage)> {
        vec![
            ("query".into(), CmdUsage {
                summary: "Query YAML or JSON from stdin or a variable".into(),
                args: "[-j] [-Y] [-p] [-R] [query] [source]".into(),
            }),
            ("event".into(), CmdUsage {
                summary: "Query the event".into(),
                args: "[-j] [-Y] [-p] [query]".into(),
            }),
            ("@name".into(), CmdUsage {
                summary: "Query the variable name".into(),
                args: "[-j] [-Y] [-p] [-R] [query]".into(),
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn state() -> State {
        State::captured(std::env::temp_dir())
    }

    fn dispatcher() -> Dispatcher {
        let event = Event::parse("entity:\n  metadata:\n    name: foobar\ncheck:\n  status: 2\n").unwrap();
        Dispatcher::new(event, ExternalExec::default())
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify() {
        let mut st = state();
        st.setenv("EVENTSH_SCALAR", "x");
        st.set_var("EVENTSH_LIST", Variable::Indexed(vec![]));
        st.set_var("EVENTSH_MAP", Variable::Associative(BTreeMap::new()));

        assert_eq!(Dispatch::classify("query", &st), Dispatch::Query);
        assert_eq!(Dispatch::classify("event", &st), Dispatch::Event);
        assert_eq!(Dispatch::classify("@EVENTSH_SCALAR", &st), Dispatch::Variable("EVENTSH_SCALAR".into()));
        assert_eq!(Dispatch::classify("@EVENTSH_LIST", &st), Dispatch::Variable("EVENTSH_LIST".into()));
        assert_eq!(Dispatch::classify("@EVENTSH_MAP", &st), Dispatch::External);
        assert_eq!(Dispatch::classify("@EVENTSH_ABSENT", &st), Dispatch::External);
        assert_eq!(Dispatch::classify("@", &st), Dispatch::External);
        assert_eq!(Dispatch::classify("ls", &st), Dispatch::External);
    }

    #[test]
    fn test_event_query() {
        let mut st = state();
        dispatcher().exec(&mut st, &argv(&["event", ".entity.metadata.name"])).unwrap();
        assert_eq!(st.stdout.take(), "foobar");
    }

    #[test]
    fn test_event_too_many_arguments() {
        let mut st = state();
        let err = dispatcher().exec(&mut st, &argv(&["event", ".a", ".b"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UsageError);
        assert!(err.message.starts_with("too many arguments to event: expected 0..1"));
    }

    #[test]
    fn test_query_reads_stdin_by_default() {
        let mut st = state();
        st.set_stdin("a: 1\n---\na: 2\n");
        st.begin_command();
        dispatcher().exec(&mut st, &argv(&["query", "-j", ".a"])).unwrap();
        assert_eq!(st.stdout.take(), "1\n2\n");
    }

    #[test]
    fn test_query_without_arguments_is_identity() {
        let mut st = state();
        st.set_stdin("{\"b\": [1, 2]}");
        st.begin_command();
        dispatcher().exec(&mut st, &argv(&["query"])).unwrap();
        assert_eq!(st.stdout.take(), "{\"b\":[1,2]}");
    }

    #[test]
    fn test_query_from_variable() {
        let mut st = state();
        st.setenv("EVENTSH_DOC", "{\"x\": \"y\"}");
        dispatcher().exec(&mut st, &argv(&["query", ".x", "EVENTSH_DOC"])).unwrap();
        assert_eq!(st.stdout.take(), "y");
    }

    #[test]
    fn test_query_from_absent_variable_is_empty() {
        let mut st = state();
        let result = dispatcher().exec(&mut st, &argv(&["query", ".x", "EVENTSH_ABSENT"])).unwrap();
        assert_eq!(result, CmdResult::Ok);
        assert_eq!(st.stdout.take(), "");
    }

    #[test]
    fn test_query_too_many_arguments() {
        let mut st = state();
        let err = dispatcher().exec(&mut st, &argv(&["query", ".", "-", "extra"])).unwrap_err();
        assert_eq!(err.exit_status(), 1);
        assert!(err.message.starts_with("too many arguments to query: expected 0..2"));
    }

    #[test]
    fn test_variable_shorthand_joins_indexed_with_newlines() {
        let mut st = state();
        st.set_var("EVENTSH_NUMS", Variable::Indexed(argv(&["1", "2", "3"])));
        dispatcher().exec(&mut st, &argv(&["@EVENTSH_NUMS", "-j"])).unwrap();
        // "1\n2\n3" decodes as the single plain scalar "1 2 3"
        assert_eq!(st.stdout.take(), "\"1 2 3\"\n");
    }

    #[test]
    fn test_variable_shorthand_raw_input() {
        let mut st = state();
        st.setenv("EVENTSH_PATHS", "/bin:/usr/bin");
        dispatcher().exec(&mut st, &argv(&["@EVENTSH_PATHS", "-R", "split(\":\")[]"])).unwrap();
        assert_eq!(st.stdout.take(), "/bin\n/usr/bin");
    }

    #[test]
    fn test_variable_shorthand_rejects_explicit_source() {
        let mut st = state();
        st.setenv("EVENTSH_DOC", "a: 1");
        let err = dispatcher().exec(&mut st, &argv(&["@EVENTSH_DOC", ".a", "-"])).unwrap_err();
        assert_eq!(err.command.as_deref(), Some("query"));
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        let mut st = state();
        let err = dispatcher().exec(&mut st, &argv(&["event", "1, error(\"boom\"), 2"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QueryRuntime);
        assert_eq!(st.stdout.take(), "1");
    }

    #[test]
    fn test_query_syntax_error() {
        let mut st = state();
        let err = dispatcher().exec(&mut st, &argv(&["event", ".[[["])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuerySyntax);
        assert_eq!(st.stdout.take(), "");
    }
}
