//! Expression parser
//!
//! Turns the inner text of one expression into an [`Expr`] tree.
//!
//! Grammar:
//! - variable: `namespace.seg1.seg2...`
//! - call: `name(arg, arg, ...)`
//! - argument: `'string'` (with `\'` escapes), decimal number, `null`, call or variable

use crate::error::{RouterError, RouterResult};

use super::ast::{Expr, Namespace, VariablePath};
use super::functions::Builtin;
use serde_json::{Number, Value};

/// Parse a top-level expression: a function call or a variable reference
pub fn parse_expression(inner: &str) -> RouterResult<Expr> {
    let inner = inner.trim();
    if is_function_call(inner) {
        parse_call(inner)
    } else {
        parse_variable(inner).map(Expr::Variable)
    }
}

/// An identifier immediately followed by `(`
pub fn is_function_call(inner: &str) -> bool {
    let ident_len = inner
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit()))
        .count();
    ident_len > 0 && inner[ident_len..].starts_with('(')
}

/// Parse `namespace.seg1.seg2...`
pub fn parse_variable(inner: &str) -> RouterResult<VariablePath> {
    let inner = inner.trim();
    let mut parts = inner.split('.');

    let head = parts.next().unwrap_or_default();
    let namespace: Namespace = head.parse().map_err(|_| {
        RouterError::validation(format!(
            "Unknown namespace '{}' in expression '{}'",
            head, inner
        ))
    })?;

    let segments: Vec<String> = parts.map(str::to_string).collect();
    if segments.iter().any(|seg| !is_valid_segment(seg)) {
        return Err(RouterError::validation(format!(
            "Invalid variable reference '{}'",
            inner
        )));
    }

    Ok(VariablePath {
        namespace,
        segments,
    })
}

fn is_valid_segment(seg: &str) -> bool {
    !seg.is_empty()
        && !seg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '\'' | ','))
}

/// Parse `name(arg, ...)`
pub fn parse_call(inner: &str) -> RouterResult<Expr> {
    let inner = inner.trim();
    let open = inner
        .find('(')
        .ok_or_else(|| RouterError::validation(format!("Malformed function call '{}'", inner)))?;
    let name = &inner[..open];

    let close = matching_paren(inner, open)?;
    if close != inner.len() - 1 {
        return Err(RouterError::validation(format!(
            "Unexpected text after function call '{}'",
            inner
        )));
    }

    let function =
        Builtin::lookup(name).ok_or_else(|| RouterError::UnknownFunction(name.to_string()))?;

    let args = split_arguments(&inner[open + 1..close])?
        .into_iter()
        .map(parse_argument)
        .collect::<RouterResult<Vec<_>>>()?;

    if args.len() != function.arity() {
        return Err(RouterError::validation(format!(
            "{}() takes {} argument(s), got {}",
            function.name(),
            function.arity(),
            args.len()
        )));
    }

    Ok(Expr::Call { function, args })
}

/// Split an argument list on top-level commas, respecting nested
/// parentheses and string literals.
pub fn split_arguments(text: &str) -> RouterResult<Vec<&str>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut in_literal = false;
    let mut piece_start = 0;
    let mut chars = trimmed.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_literal {
            match c {
                '\\' if matches!(chars.peek(), Some((_, '\''))) => {
                    chars.next();
                }
                '\'' => in_literal = false,
                _ => {}
            }
            continue;
        }

        match c {
            '\'' => in_literal = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(unbalanced(text));
                }
            }
            ',' if depth == 0 => {
                args.push(trimmed[piece_start..i].trim());
                piece_start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || in_literal {
        return Err(unbalanced(text));
    }
    args.push(trimmed[piece_start..].trim());

    if args.iter().any(|arg| arg.is_empty()) {
        return Err(RouterError::validation(format!(
            "Empty argument in '{}'",
            text.trim()
        )));
    }

    Ok(args)
}

fn parse_argument(arg: &str) -> RouterResult<Expr> {
    if arg.starts_with('\'') {
        return parse_string_literal(arg).map(|s| Expr::Literal(Value::String(s)));
    }
    if arg == "null" {
        return Ok(Expr::Literal(Value::Null));
    }
    if let Some(number) = parse_number(arg) {
        return Ok(Expr::Literal(Value::Number(number)));
    }
    parse_expression(arg)
}

fn parse_string_literal(arg: &str) -> RouterResult<String> {
    let mut out = String::new();
    let mut chars = arg[1..].char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '\''))) => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            '\'' => {
                if i + 2 != arg.len() {
                    return Err(RouterError::validation(format!(
                        "Unexpected text after string literal {}",
                        arg
                    )));
                }
                return Ok(out);
            }
            other => out.push(other),
        }
    }

    Err(RouterError::validation(format!(
        "Unterminated string literal {}",
        arg
    )))
}

fn parse_number(arg: &str) -> Option<Number> {
    let first = arg.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '.') {
        return None;
    }
    if let Ok(n) = arg.parse::<i64>() {
        return Some(n.into());
    }
    arg.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Index of the `)` matching the `(` at `open`
fn matching_paren(text: &str, open: usize) -> RouterResult<usize> {
    let mut depth = 0i32;
    let mut in_literal = false;
    let mut chars = text[open..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if in_literal {
            match c {
                '\\' if matches!(chars.peek(), Some((_, '\''))) => {
                    chars.next();
                }
                '\'' => in_literal = false,
                _ => {}
            }
            continue;
        }
        match c {
            '\'' => in_literal = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + offset);
                }
            }
            _ => {}
        }
    }

    Err(unbalanced(text))
}

fn unbalanced(text: &str) -> RouterError {
    RouterError::validation(format!("Unbalanced parentheses or quotes in '{}'", text.trim()))
}
