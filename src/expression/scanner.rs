//! Delimited expression scanner
//!
//! Locates every top-level `${{ ... }}` occurrence in a template string.
//! Nested open delimiters are depth-counted and single-quoted literals are
//! skipped, so a close delimiter inside `'...'` never ends an expression.

/// One located expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionRef {
    /// The full matched text, delimiters included
    pub match_text: String,
    /// Trimmed text between the delimiters
    pub inner_text: String,
    /// Byte offset of the open delimiter
    pub start: usize,
    /// Byte offset just past the close delimiter
    pub end: usize,
}

impl ExpressionRef {
    /// True when this expression is the whole of `template`
    pub fn spans(&self, template: &str) -> bool {
        self.start == 0 && self.end == template.len()
    }
}

/// Scan `template` for expressions, left to right.
///
/// An unterminated expression ends the scan; everything from its open
/// delimiter onward is plain text.
pub fn scan(template: &str, open: &str, close: &str) -> Vec<ExpressionRef> {
    let mut refs = Vec::new();
    if open.is_empty() || close.is_empty() {
        return refs;
    }

    let bytes = template.as_bytes();
    let mut pos = 0;

    while let Some(found) = template[pos..].find(open) {
        let start = pos + found;
        let Some(end) = find_close(bytes, start + open.len(), open.as_bytes(), close.as_bytes())
        else {
            break;
        };

        let inner = &template[start + open.len()..end - close.len()];
        refs.push(ExpressionRef {
            match_text: template[start..end].to_string(),
            inner_text: inner.trim().to_string(),
            start,
            end,
        });
        pos = end;
    }

    refs
}

/// Walk from `from` to the matching close delimiter and return the offset
/// just past it.
fn find_close(bytes: &[u8], from: usize, open: &[u8], close: &[u8]) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_literal = false;
    let mut i = from;

    while i < bytes.len() {
        if in_literal {
            match bytes[i] {
                b'\\' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                b'\'' => {
                    in_literal = false;
                    i += 1;
                }
                _ => i += 1,
            }
            continue;
        }

        if bytes[i..].starts_with(open) {
            depth += 1;
            i += open.len();
        } else if bytes[i..].starts_with(close) {
            depth -= 1;
            i += close.len();
            if depth == 0 {
                return Some(i);
            }
        } else {
            if bytes[i] == b'\'' {
                in_literal = true;
            }
            i += 1;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str = "${{";
    const CLOSE: &str = "}}";

    #[test]
    fn test_empty_template() {
        assert!(scan("", OPEN, CLOSE).is_empty());
        assert!(scan("SELECT 1", OPEN, CLOSE).is_empty());
    }

    #[test]
    fn test_offsets_and_inner_text() {
        let template = "a = ${{ path.id }} AND b = ${{query.b}}";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].inner_text, "path.id");
        assert_eq!(refs[0].match_text, "${{ path.id }}");
        assert_eq!(&template[refs[0].start..refs[0].end], "${{ path.id }}");
        assert_eq!(refs[1].inner_text, "query.b");
        assert_eq!(&template[refs[1].start..refs[1].end], "${{query.b}}");
    }

    #[test]
    fn test_close_delimiter_inside_literal() {
        let template = "x = ${{ default(query.a, '}}') }} end";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].inner_text, "default(query.a, '}}')");
        assert_eq!(&template[refs[0].end..], " end");
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let template = r"${{ default(body.name, 'it\'s }}') }}";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].inner_text, r"default(body.name, 'it\'s }}')");
        assert!(refs[0].spans(template));
    }

    #[test]
    fn test_nested_open_delimiter_is_depth_counted() {
        let template = "${{ a ${{ b }} c }} tail";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].inner_text, "a ${{ b }} c");
    }

    #[test]
    fn test_unterminated_expression_is_plain_text() {
        let template = "a = ${{ path.id }} AND b = ${{ query.b";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].inner_text, "path.id");
    }

    #[test]
    fn test_non_ascii_text_around_expressions() {
        let template = "naïve → ${{ body.x }} ✓";
        let refs = scan(template, OPEN, CLOSE);

        assert_eq!(refs.len(), 1);
        assert_eq!(&template[refs[0].start..refs[0].end], "${{ body.x }}");
    }
}
