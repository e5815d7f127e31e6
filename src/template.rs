//! Template expansion
//!
//! Free-form text carries two kinds of tokens: `&{name}` references into a
//! layered context, and `@{expr}` / `@[fmt]{expr}` arithmetic. Expansion
//! runs in two fixed-point phases: substitute names until the text stops
//! changing, then evaluate arithmetic tokens leftmost-first until none
//! remain. Both phases are capped; a template that keeps producing new
//! tokens is a configuration error, not a hang.

use std::collections::HashMap;

use crate::expr::{self, ExprError};
use crate::numfmt::{self, Format};
use crate::span::Span;

/// Iterations allowed per expansion phase before giving up
pub const EXPANSION_LIMIT: usize = 100;

/// A layered name-to-string binding map. Layering is by cloning: take a
/// `child()` of the parent and bind over it; later bindings win.
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn child(&self) -> Context {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandError {
    /// An arithmetic token failed to evaluate. `span` covers the whole
    /// token in the text being expanded when it failed (earlier
    /// substitutions may have shifted it from the original template);
    /// `source` carries a position inside `expr` itself.
    Expression {
        expr: String,
        span: Span,
        source: ExprError,
    },
    /// Variable substitution never reached a fixed point
    SubstitutionLimit { text: String },
    /// Expression evaluation kept producing new tokens
    ExpressionLimit { text: String },
}

impl std::fmt::Display for ExpandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpandError::Expression { expr, source, .. } => {
                write!(f, "Expression error in '{}': {}", expr, source)
            }
            ExpandError::SubstitutionLimit { .. } => write!(
                f,
                "Variable substitution did not converge after {} passes (self-referential template?)",
                EXPANSION_LIMIT
            ),
            ExpandError::ExpressionLimit { .. } => write!(
                f,
                "Expression expansion did not converge after {} passes",
                EXPANSION_LIMIT
            ),
        }
    }
}

impl std::error::Error for ExpandError {}

/// Expand all `&{name}` references and arithmetic tokens in `input`
pub fn expand(input: &str, context: &Context) -> Result<String, ExpandError> {
    let mut text = input.to_string();

    // Phase 1: substitute names to a fixed point. Unresolved names stay
    // literal so a later layer can fill them.
    let mut converged = false;
    for _ in 0..EXPANSION_LIMIT {
        let next = substitute(&text, context);
        if next == text {
            converged = true;
            break;
        }
        text = next;
    }
    if !converged {
        return Err(ExpandError::SubstitutionLimit { text });
    }

    // Phase 2: evaluate the leftmost arithmetic token, splice, repeat.
    for _ in 0..EXPANSION_LIMIT {
        match find_token(&text) {
            None => return Ok(text),
            Some(token) => {
                let raw = &text[token.expr_span.range()];
                let cleaned: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
                let value = expr::evaluate(&cleaned).map_err(|source| ExpandError::Expression {
                    expr: cleaned.clone(),
                    span: token.span,
                    source,
                })?;
                let rendered = numfmt::apply(value, &token.format);
                text = format!(
                    "{}{}{}",
                    &text[..token.span.start],
                    rendered,
                    &text[token.span.end..]
                );
            }
        }
    }
    Err(ExpandError::ExpressionLimit { text })
}

/// One pass of `&{name}` substitution
fn substitute(text: &str, context: &Context) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("&{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail[2..].find('}') {
            Some(close) => {
                let name = &tail[2..2 + close];
                match context.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..close + 3]),
                }
                rest = &tail[close + 3..];
            }
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

struct Token {
    span: Span,
    expr_span: Span,
    format: Format,
}

/// Find the leftmost complete `@{expr}` or `@[fmt]{expr}` token. A token
/// whose body contains another `{` is not complete yet; scanning continues
/// so an inner token expands first.
fn find_token(text: &str) -> Option<Token> {
    let bytes = text.as_bytes();
    let mut at = 0;
    while let Some(found) = text[at..].find('@') {
        let start = at + found;
        let mut pos = start + 1;
        let mut format = Format::default();

        if bytes.get(pos) == Some(&b'[') {
            match text[pos + 1..].find(']') {
                Some(close) => {
                    let spec = &text[pos + 1..pos + 1 + close];
                    if !spec.bytes().all(|b| b.is_ascii_digit() || matches!(b, b't' | b'T' | b'g' | b'G')) {
                        at = start + 1;
                        continue;
                    }
                    format = Format::parse(spec);
                    pos = pos + close + 2;
                }
                None => {
                    at = start + 1;
                    continue;
                }
            }
        }

        if bytes.get(pos) != Some(&b'{') {
            at = start + 1;
            continue;
        }
        let body_start = pos + 1;
        let mut end = None;
        for (offset, b) in text[body_start..].bytes().enumerate() {
            match b {
                b'}' => {
                    end = Some(body_start + offset);
                    break;
                }
                b'{' => break,
                _ => {}
            }
        }
        match end {
            Some(end) => {
                return Some(Token {
                    span: Span::new(start, end + 1),
                    expr_span: Span::new(body_start, end),
                    format,
                });
            }
            None => {
                at = start + 1;
                continue;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> Context {
        let mut ctx = Context::new();
        for (name, value) in pairs {
            ctx.bind(*name, *value);
        }
        ctx
    }

    #[test]
    fn test_variable_and_expression() {
        let ctx = context(&[("X", "3")]);
        assert_eq!(expand("&{X}+1=@{ &{X} +1}", &ctx).unwrap(), "3+1=4");
    }

    #[test]
    fn test_expansion_is_idempotent_on_plain_text() {
        let ctx = context(&[("X", "3")]);
        let plain = "nothing to expand here & neither @ here";
        assert_eq!(expand(plain, &ctx).unwrap(), plain);
    }

    #[test]
    fn test_unresolved_names_stay_literal() {
        let ctx = context(&[]);
        assert_eq!(expand("hello &{WHO}", &ctx).unwrap(), "hello &{WHO}");
    }

    #[test]
    fn test_nested_references_expand_to_fixed_point() {
        let ctx = context(&[("A", "&{B}"), ("B", "done")]);
        assert_eq!(expand("&{A}", &ctx).unwrap(), "done");
    }

    #[test]
    fn test_mutually_recursive_references_error() {
        let ctx = context(&[("A", "&{B}x"), ("B", "&{A}")]);
        assert!(matches!(
            expand("&{A}", &ctx),
            Err(ExpandError::SubstitutionLimit { .. })
        ));
    }

    #[test]
    fn test_formatted_expression() {
        let ctx = context(&[]);
        assert_eq!(expand("@[3]{1+1}", &ctx).unwrap(), "2.00");
        assert_eq!(
            expand("@[2t]{3E+8}", &ctx).unwrap(),
            "\\ensuremath{3.0\\times{}10^{8}}"
        );
    }

    #[test]
    fn test_inner_token_expands_first() {
        let ctx = context(&[]);
        assert_eq!(expand("@{ @{1+1} * 3 }", &ctx).unwrap(), "6");
    }

    #[test]
    fn test_expression_error_carries_text() {
        let ctx = context(&[]);
        match expand("total: @{1+}", &ctx) {
            Err(ExpandError::Expression { expr, span, .. }) => {
                assert_eq!(expr, "1+");
                assert_eq!(span.start, 7);
            }
            other => panic!("expected expression error, got {:?}", other),
        }
    }

    #[test]
    fn test_newlines_inside_expressions_are_ignored() {
        let ctx = context(&[]);
        assert_eq!(expand("@{1 +\n 2}", &ctx).unwrap(), "3");
    }

    #[test]
    fn test_child_context_overrides_parent() {
        let mut parent = Context::new();
        parent.bind("NAME", "parent");
        parent.bind("KEEP", "kept");
        let mut child = parent.child();
        child.bind("NAME", "child");
        assert_eq!(expand("&{NAME}/&{KEEP}", &child).unwrap(), "child/kept");
        assert_eq!(expand("&{NAME}", &parent).unwrap(), "parent");
    }
}
