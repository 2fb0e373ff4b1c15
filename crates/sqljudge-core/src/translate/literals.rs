use super::tokenizer::{Token, TokenKind};

/// Rewrites MySQL quoting into the SQLite form: backtick identifiers become
/// double-quoted identifiers, and every string literal ends up single-quoted
/// with backslash escapes resolved.
pub fn normalize(tokens: &mut [Token]) {
    for tok in tokens.iter_mut() {
        match tok.kind {
            TokenKind::BacktickIdent => {
                if let Some(name) = unquote(&tok.text, '`', false) {
                    *tok = Token::new(TokenKind::QuotedIdent, quote_ident(&name));
                }
            }
            TokenKind::Str if tok.text.starts_with('"') || tok.text.contains('\\') => {
                let delim = if tok.text.starts_with('"') { '"' } else { '\'' };
                if let Some(value) = unquote(&tok.text, delim, true) {
                    tok.text = quote_str(&value);
                }
            }
            _ => {}
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_str(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Decodes a quoted span. Unterminated spans yield `None` and are forwarded
/// untouched so the backend reports them.
fn unquote(text: &str, delim: char, backslash: bool) -> Option<String> {
    let inner = text.strip_prefix(delim)?.strip_suffix(delim)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if backslash && c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{8}'),
                Some('Z') => out.push('\u{1a}'),
                // NUL cannot travel through SQL text
                Some('0') => out.push_str("\\0"),
                // kept verbatim by MySQL so LIKE patterns still see the escape
                Some(c @ ('%' | '_')) => {
                    out.push('\\');
                    out.push(c);
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else if c == delim {
            if chars.peek() == Some(&delim) {
                chars.next();
            }
            out.push(delim);
        } else {
            out.push(c);
        }
    }
    Some(out)
}
