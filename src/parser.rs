//! Script line parser
//!
//! Scripts are line oriented, one command per line:
//! - `#` at line start is a comment (whole line ignored)
//! - `#` at the start of a later word ends the line (inline comment)
//! - `!` prefix inverts the command's exit status
//! - `?` prefix lets the command fail without aborting an errexit script
//! - `[cond]` / `[!cond]` guard execution
//! - Single-quote strings disable word splitting and variable expansion;
//!   `''` inside quotes produces a literal `'`
//! - Double-quote strings disable word splitting but still expand variables;
//!   `\"`, `\\` and `\$` are escapes inside them
//!
//! Variable expansion (`$VAR`, `${VAR}`) happens in the engine, not here.
//! The parser preserves fragments with quoted/unquoted tracking.

/// A fragment of a parsed argument, tracking whether it was quoted.
/// Quoted fragments suppress variable expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgFragment {
    /// The text content of this fragment
    pub s: String,
    /// If true, this fragment is literal text (single quotes or an escape)
    pub quoted: bool,
}

/// A parsed script line
#[derive(Debug, Clone)]
pub struct ScriptLine {
    /// Whether the command's exit status is inverted
    pub negate: bool,
    /// Whether the command may fail without aborting the script
    pub may_fail: bool,
    /// Conditions that must be true for the command to run
    pub conditions: Vec<ScriptCondition>,
    /// Command name
    pub command: String,
    /// Raw arguments as fragments (quoted/unquoted tracking for expansion)
    pub raw_args: Vec<Vec<ArgFragment>>,
    /// Original line text (for error messages)
    pub raw: String,
    /// Line number in the script
    pub line_number: usize,
}

/// A condition guard on a script line
#[derive(Debug, Clone)]
pub struct ScriptCondition {
    /// The full condition tag (e.g. "unix", "exec:curl", "var:PATH")
    pub tag: String,
    /// Whether the condition is negated
    pub negate: bool,
}

/// Characters that separate arguments
const ARG_SEP_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Parse error returned when a line has invalid syntax
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parse a single script line into a ScriptLine.
///
/// Returns `Ok(None)` for blank lines and comment-only lines.
/// Returns `Err(ParseError)` for syntax errors (unterminated quotes, etc.).
///
/// The first unquoted word that isn't `!`, `?`, or `[cond]` becomes the
/// command name. `#` opens an inline comment at the start of an unquoted word.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<ScriptLine>, ParseError> {
    let line_bytes = line.as_bytes();
    let len = line_bytes.len();

    let mut raw_args: Vec<Vec<ArgFragment>> = Vec::new();
    let mut current_frags: Vec<ArgFragment> = Vec::new();
    let mut start: Option<usize> = None; // start of current text chunk
    let mut quote = Quote::None;
    // Whether any part of the current word was quoted
    let mut word_quoted = false;

    let mut negate = false;
    let mut may_fail = false;
    let mut conditions: Vec<ScriptCondition> = Vec::new();
    let mut command: Option<String> = None;

    /// Flush the current word (fragments) into either a prefix/condition/command/arg
    macro_rules! flush_arg {
        () => {
            if !current_frags.is_empty() {
                if command.is_none() && current_frags.len() == 1 && !word_quoted {
                    let arg = &current_frags[0].s;

                    if arg == "!" || arg == "?" {
                        if negate || may_fail {
                            return Err(ParseError {
                                message: "duplicated '!' or '?' token".into(),
                                line: line_number,
                            });
                        }
                        if arg == "!" {
                            negate = true;
                        } else {
                            may_fail = true;
                        }
                        current_frags.clear();
                    } else if arg.starts_with('[') && arg.ends_with(']') && arg.len() >= 2 {
                        let inner = arg[1..arg.len()-1].trim();
                        let (want_true, tag) = if let Some(rest) = inner.strip_prefix('!') {
                            (false, rest.trim())
                        } else {
                            (true, inner)
                        };
                        if tag.is_empty() {
                            return Err(ParseError {
                                message: "empty condition".into(),
                                line: line_number,
                            });
                        }
                        conditions.push(ScriptCondition {
                            tag: tag.to_string(),
                            negate: !want_true,
                        });
                        current_frags.clear();
                    } else {
                        command = Some(arg.clone());
                        current_frags.clear();
                    }
                } else if command.is_none() {
                    // A quoted command name is taken literally
                    command = Some(current_frags.iter().map(|f| f.s.as_str()).collect());
                    current_frags.clear();
                } else {
                    raw_args.push(std::mem::take(&mut current_frags));
                }
            }
            word_quoted = false;
        };
    }

    /// Push `line[s..i]` as an unquoted fragment when non-empty
    macro_rules! push_chunk {
        ($s:expr, $i:expr) => {
            if $s < $i {
                current_frags.push(ArgFragment {
                    s: line[$s..$i].to_string(),
                    quoted: false,
                });
            }
        };
    }

    let mut i = 0;
    loop {
        // '#' only opens a comment at the start of a word, so `$#` and `a#b` stay literal
        let at_comment = i < len && line_bytes[i] == b'#' && start.is_none() && current_frags.is_empty();
        if quote == Quote::None && (i >= len || at_comment || ARG_SEP_CHARS.contains(&(line_bytes[i] as char))) {
            if let Some(s) = start.take() {
                push_chunk!(s, i);
            }
            flush_arg!();
            if i >= len || at_comment {
                break;
            }
            i += 1;
            continue;
        }
        if i >= len {
            return Err(ParseError {
                message: "unterminated quoted argument".into(),
                line: line_number,
            });
        }
        match (quote, line_bytes[i]) {
            (Quote::None, b'\'') | (Quote::None, b'"') => {
                if let Some(s) = start.take() {
                    push_chunk!(s, i);
                }
                quote = if line_bytes[i] == b'\'' { Quote::Single } else { Quote::Double };
                word_quoted = true;
                start = Some(i + 1);
                i += 1;
            }
            (Quote::Single, b'\'') => {
                let s = start.unwrap_or(i);
                current_frags.push(ArgFragment {
                    s: line[s..i].to_string(),
                    quoted: true,
                });
                if i + 1 < len && line_bytes[i + 1] == b'\'' {
                    // '' is a literal quote: the next chunk starts with it
                    start = Some(i + 1);
                    i += 2;
                    continue;
                }
                start = None;
                quote = Quote::None;
                i += 1;
            }
            (Quote::Double, b'"') => {
                let s = start.unwrap_or(i);
                current_frags.push(ArgFragment {
                    s: line[s..i].to_string(),
                    quoted: false,
                });
                start = None;
                quote = Quote::None;
                i += 1;
            }
            (Quote::Double, b'\\') if i + 1 < len && matches!(line_bytes[i + 1], b'"' | b'\\' | b'$') => {
                if let Some(s) = start {
                    push_chunk!(s, i);
                }
                current_frags.push(ArgFragment {
                    s: (line_bytes[i + 1] as char).to_string(),
                    quoted: true,
                });
                start = Some(i + 2);
                i += 2;
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                }
                i += 1;
            }
        }
    }

    let command = match command {
        Some(c) => c,
        None => {
            if negate || may_fail || !conditions.is_empty() || !raw_args.is_empty() {
                return Err(ParseError {
                    message: "missing command".into(),
                    line: line_number,
                });
            }
            return Ok(None);
        }
    };

    Ok(Some(ScriptLine {
        negate,
        may_fail,
        conditions,
        command,
        raw_args,
        raw: line.to_string(),
        line_number,
    }))
}

/// Expand variables in a string.
///
/// Supports `$VAR` and `${VAR}` plus the single-character specials `$?`
/// (last status), `$#` (parameter count) and `$0`..`$9`.
/// Undefined variables expand to the empty string.
pub fn expand_vars(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some('{') => {
                chars.next();
                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }
                result.push_str(&lookup(&var_name).unwrap_or_default());
            }
            Some(c) if c == '?' || c == '#' || c.is_ascii_digit() => {
                chars.next();
                result.push_str(&lookup(&c.to_string()).unwrap_or_default());
            }
            _ => {
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                if var_name.is_empty() {
                    result.push('$');
                } else {
                    result.push_str(&lookup(&var_name).unwrap_or_default());
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: join fragments of a raw_arg into a single string (simulating expansion without env)
    fn join_frags(frags: &[ArgFragment]) -> String {
        frags.iter().map(|f| f.s.as_str()).collect()
    }

    /// Helper: collect all args as joined strings
    fn flat_args(line: &ScriptLine) -> Vec<String> {
        line.raw_args.iter().map(|a| join_frags(a)).collect()
    }

    fn lookup(key: &str) -> Option<String> {
        match key {
            "NAME" => Some("world".to_string()),
            "HOME" => Some("/usr/local".to_string()),
            "?" => Some("1".to_string()),
            "1" => Some("first".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(parse_line("", 1).unwrap().is_none());
        assert!(parse_line("   ", 1).unwrap().is_none());
    }

    #[test]
    fn test_parse_comment() {
        assert!(parse_line("# comment", 1).unwrap().is_none());
        assert!(parse_line("  # indented comment", 1).unwrap().is_none());
    }

    #[test]
    fn test_parse_simple_command() {
        let line = parse_line("query .entity.metadata.name", 1).unwrap().unwrap();
        assert_eq!(line.command, "query");
        assert_eq!(flat_args(&line), vec![".entity.metadata.name"]);
        assert!(!line.negate);
        assert!(!line.may_fail);
    }

    #[test]
    fn test_parse_variable_shorthand_command() {
        let line = parse_line("@PATH -R 'split(\":\")[]'", 1).unwrap().unwrap();
        assert_eq!(line.command, "@PATH");
        assert_eq!(flat_args(&line), vec!["-R", "split(\":\")[]"]);
    }

    #[test]
    fn test_parse_negate() {
        let line = parse_line("! query '.missing'", 1).unwrap().unwrap();
        assert!(line.negate);
        assert_eq!(line.command, "query");
    }

    #[test]
    fn test_parse_may_fail() {
        let line = parse_line("? curl -s localhost", 1).unwrap().unwrap();
        assert!(line.may_fail);
        assert_eq!(line.command, "curl");
    }

    #[test]
    fn test_parse_conditions() {
        let line = parse_line("[unix] echo yes", 1).unwrap().unwrap();
        assert_eq!(line.conditions.len(), 1);
        assert_eq!(line.conditions[0].tag, "unix");
        assert!(!line.conditions[0].negate);
    }

    #[test]
    fn test_parse_negated_condition() {
        let line = parse_line("[!ok] exit 1", 1).unwrap().unwrap();
        assert_eq!(line.conditions[0].tag, "ok");
        assert!(line.conditions[0].negate);
    }

    #[test]
    fn test_parse_prefix_condition() {
        let line = parse_line("[exec:curl] curl localhost", 1).unwrap().unwrap();
        assert_eq!(line.conditions[0].tag, "exec:curl");
    }

    #[test]
    fn test_parse_single_quoted_args() {
        let line = parse_line("event '.check | .status'", 1).unwrap().unwrap();
        let args = &line.raw_args;
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].len(), 1);
        assert_eq!(args[0][0].s, ".check | .status");
        assert!(args[0][0].quoted);
    }

    #[test]
    fn test_parse_double_quoted_args_expand() {
        let line = parse_line("echo \"hello $NAME\" # trailing", 1).unwrap().unwrap();
        assert_eq!(line.raw_args.len(), 1);
        assert_eq!(line.raw_args[0].len(), 1);
        assert_eq!(line.raw_args[0][0].s, "hello $NAME");
        assert!(!line.raw_args[0][0].quoted);
    }

    #[test]
    fn test_parse_double_quote_escapes() {
        let line = parse_line(r#"echo "a \"b\" \$HOME""#, 1).unwrap().unwrap();
        assert_eq!(join_frags(&line.raw_args[0]), "a \"b\" $HOME");
        // the escaped dollar is literal, so it must not expand
        let dollar = line.raw_args[0].iter().find(|f| f.s == "$").unwrap();
        assert!(dollar.quoted);
    }

    #[test]
    fn test_parse_empty_quoted_arg() {
        let line = parse_line("echo '' \"\"", 1).unwrap().unwrap();
        assert_eq!(flat_args(&line), vec!["", ""]);
    }

    #[test]
    fn test_parse_mixed_fragments() {
        let line = parse_line("echo pre'mid'suf", 1).unwrap().unwrap();
        let arg = &line.raw_args[0];
        assert_eq!(arg.len(), 3);
        assert_eq!(arg[0].s, "pre");
        assert!(!arg[0].quoted);
        assert_eq!(arg[1].s, "mid");
        assert!(arg[1].quoted);
        assert_eq!(arg[2].s, "suf");
        assert!(!arg[2].quoted);
    }

    #[test]
    fn test_parse_escaped_quote() {
        let line = parse_line("echo 'it''s working'", 1).unwrap().unwrap();
        assert_eq!(join_frags(&line.raw_args[0]), "it's working");
    }

    #[test]
    fn test_parse_inline_comment() {
        let line = parse_line("echo hello # this is a comment", 1).unwrap().unwrap();
        assert_eq!(flat_args(&line), vec!["hello"]);
    }

    #[test]
    fn test_parse_hash_in_quotes() {
        let line = parse_line("echo 'hello # world' \"a#b\"", 1).unwrap().unwrap();
        assert_eq!(flat_args(&line), vec!["hello # world", "a#b"]);
    }

    #[test]
    fn test_parse_hash_inside_word_is_literal() {
        let line = parse_line("echo $# a#b #c", 1).unwrap().unwrap();
        assert_eq!(flat_args(&line), vec!["$#", "a#b"]);
    }

    #[test]
    fn test_parse_quoted_bang_is_a_command() {
        let line = parse_line("'!' query", 1).unwrap().unwrap();
        assert!(!line.negate);
        assert_eq!(line.command, "!");
        assert_eq!(flat_args(&line), vec!["query"]);
    }

    #[test]
    fn test_parse_unterminated_quote_error() {
        let result = parse_line("echo 'unterminated", 1);
        assert!(result.unwrap_err().message.contains("unterminated"));
        let result = parse_line("echo \"unterminated", 1);
        assert!(result.unwrap_err().message.contains("unterminated"));
    }

    #[test]
    fn test_parse_missing_command_error() {
        let result = parse_line("! ", 1);
        assert!(result.unwrap_err().message.contains("missing command"));
    }

    #[test]
    fn test_parse_duplicate_prefix_error() {
        let result = parse_line("! ? query", 1);
        assert!(result.unwrap_err().message.contains("duplicated"));
    }

    #[test]
    fn test_expand_vars_simple() {
        assert_eq!(expand_vars("hello $NAME", &lookup), "hello world");
    }

    #[test]
    fn test_expand_vars_braces() {
        assert_eq!(expand_vars("${HOME}/bin", &lookup), "/usr/local/bin");
    }

    #[test]
    fn test_expand_vars_specials() {
        assert_eq!(expand_vars("status=$? arg=$1x", &lookup), "status=1 arg=firstx");
    }

    #[test]
    fn test_expand_vars_undefined_is_empty() {
        assert_eq!(expand_vars("hello $UNDEF end", &lookup), "hello  end");
    }

    #[test]
    fn test_expand_vars_lone_dollar() {
        assert_eq!(expand_vars("cost: $ 5", &lookup), "cost: $ 5");
    }
}
