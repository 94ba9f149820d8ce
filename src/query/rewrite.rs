//! Null-tolerant indexing
//!
//! jq answers `null | .a`, `null | .[0]` and `null | .[1:2]` with `null`.
//! jaq's JSON values reject indexing null, so every index and slice in a
//! parsed query is guarded before compilation:
//!
//! ```text
//! t.a[$i]  =>  . as $input | t | (if . == null then null else .a end)
//!                              | (if . == null then null else .[$input | $i] end)
//! ```
//!
//! Index expressions are evaluated against the input of the whole path, as
//! in the unguarded form. Iteration (`.[]`) on null still fails.

use jaq_core::load::lex::StrPart;
use jaq_core::load::parse::{BinaryOp, Def, Pattern, Term};
use jaq_core::ops::Cmp;
use jaq_core::path::{Opt, Part, Path};

/// Variable holding the input of a guarded path
const INPUT: &str = "$__eventsh_input";

type T<'s> = Term<&'s str>;

/// Guard every index and slice in `term`.
pub(super) fn null_safe(term: T<'_>) -> T<'_> {
    match term {
        Term::Path(base, path) => guard_path(null_safe(*base), path),
        Term::Str(fmt, parts) => Term::Str(fmt, parts.into_iter().map(str_part).collect()),
        Term::Arr(items) => Term::Arr(items.map(boxed)),
        Term::Obj(entries) => Term::Obj(entries.into_iter().map(obj_entry).collect()),
        Term::Neg(t) => Term::Neg(boxed(t)),
        Term::Pipe(l, pat, r) => Term::Pipe(boxed(l), pat.map(pattern), boxed(r)),
        Term::BinOp(l, op, r) => Term::BinOp(boxed(l), op, boxed(r)),
        Term::Label(name, t) => Term::Label(name, boxed(t)),
        Term::Fold(name, xs, pat, args) => {
            Term::Fold(name, boxed(xs), pattern(pat), args.into_iter().map(null_safe).collect())
        }
        Term::TryCatch(t, catch) => Term::TryCatch(boxed(t), catch.map(boxed)),
        Term::IfThenElse(branches, otherwise) => Term::IfThenElse(
            branches.into_iter().map(|(c, t)| (null_safe(c), null_safe(t))).collect(),
            otherwise.map(boxed),
        ),
        Term::Def(defs, t) => Term::Def(defs.into_iter().map(def).collect(), boxed(t)),
        Term::Call(name, args) => Term::Call(name, args.into_iter().map(null_safe).collect()),
        leaf => leaf,
    }
}

fn boxed(t: Box<T<'_>>) -> Box<T<'_>> {
    Box::new(null_safe(*t))
}

fn def(d: Def<&str>) -> Def<&str> {
    Def { name: d.name, args: d.args, body: null_safe(d.body) }
}

fn str_part<'s>(part: StrPart<&'s str, T<'s>>) -> StrPart<&'s str, T<'s>> {
    match part {
        StrPart::Term(t) => StrPart::Term(null_safe(t)),
        other => other,
    }
}

fn pattern(pat: Pattern<&str>) -> Pattern<&str> {
    match pat {
        Pattern::Var(v) => Pattern::Var(v),
        Pattern::Arr(pats) => Pattern::Arr(pats.into_iter().map(pattern).collect()),
        Pattern::Obj(entries) => {
            Pattern::Obj(entries.into_iter().map(|(k, p)| (null_safe(k), pattern(p))).collect())
        }
    }
}

/// `{a}` is shorthand for `{a: .a}`; the implied lookup is guarded too.
fn obj_entry<'s>((key, value): (T<'s>, Option<T<'s>>)) -> (T<'s>, Option<T<'s>>) {
    match value {
        Some(v) => (null_safe(key), Some(null_safe(v))),
        None => match constant(&key) {
            Some(index) => (key, Some(or_null(step(Part::Index(index), Opt::Essential)))),
            None => (null_safe(key), None),
        },
    }
}

fn guard_path<'s>(base: T<'s>, path: Path<T<'s>>) -> T<'s> {
    let mut uses_input = false;
    let mut guarded = base;
    for (part, opt) in path.0 {
        let next = match part {
            Part::Range(None, None) => step(Part::Range(None, None), opt),
            Part::Index(i) => or_null(step(Part::Index(from_input(i, &mut uses_input)), opt)),
            Part::Range(from, upto) => {
                let from = from.map(|t| from_input(t, &mut uses_input));
                let upto = upto.map(|t| from_input(t, &mut uses_input));
                or_null(step(Part::Range(from, upto), opt))
            }
        };
        guarded = Term::Pipe(Box::new(guarded), None, Box::new(next));
    }
    if uses_input {
        Term::Pipe(Box::new(Term::Id), Some(Pattern::Var(INPUT)), Box::new(guarded))
    } else {
        guarded
    }
}

/// An index evaluated against the input of the whole path
fn from_input<'s>(index: T<'s>, uses_input: &mut bool) -> T<'s> {
    if constant(&index).is_some() {
        return index;
    }
    *uses_input = true;
    Term::Pipe(Box::new(Term::Var(INPUT)), None, Box::new(null_safe(index)))
}

/// `.[part]`, applied to the current value
fn step<'s>(part: Part<T<'s>>, opt: Opt) -> T<'s> {
    Term::Path(Box::new(Term::Id), Path(vec![(part, opt)]))
}

/// `if . == null then null else access end`
fn or_null(access: T<'_>) -> T<'_> {
    let null = || Term::Call("null", Vec::new());
    let is_null = Term::BinOp(Box::new(Term::Id), BinaryOp::Cmp(Cmp::Eq), Box::new(null()));
    Term::IfThenElse(vec![(is_null, null())], Some(Box::new(access)))
}

/// A copy of a literal number or plain string, which needs no input.
fn constant<'s>(term: &T<'s>) -> Option<T<'s>> {
    match term {
        Term::Num(n) => Some(Term::Num(*n)),
        Term::Str(None, parts) => parts
            .iter()
            .map(|part| match part {
                StrPart::Str(s) => Some(StrPart::Str(*s)),
                StrPart::Char(c) => Some(StrPart::Char(*c)),
                StrPart::Term(_) => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| Term::Str(None, parts)),
        _ => None,
    }
}
