//! MySQL-flavoured SQL to SQLite translation.
//!
//! `translate` is total: anything it does not recognise is forwarded
//! unchanged and the backend reports the resulting syntax error. Rewrites
//! operate on tokens, so keywords inside string literals, quoted identifiers
//! and comments are never touched.

mod clauses;
mod ddl;
mod functions;
mod literals;
pub mod tokenizer;
mod tree;

use tokenizer::{render, tokenize, Token};
use tree::{flatten, visit_bottom_up};

/// Translates every statement in `sql`, keeping statement separators.
pub fn translate(sql: &str) -> String {
    let mut tokens = tokenize(sql);
    literals::normalize(&mut tokens);

    let mut out = String::with_capacity(sql.len());
    for (body, terminated) in split_tokens(tokens) {
        let text = translate_statement(body);
        if terminated {
            out.push_str(text.trim_end());
            out.push(';');
        } else {
            out.push_str(&text);
        }
    }
    out.trim().to_string()
}

/// Splits on `;` outside literals and comments. Statements that hold nothing
/// but whitespace or comments are dropped. The text is returned untranslated.
pub fn split_statements(sql: &str) -> Vec<String> {
    split_tokens(tokenize(sql))
        .into_iter()
        .filter_map(|(body, _)| {
            let start = body.iter().position(|t| !t.is_trivia())?;
            let end = body.iter().rposition(|t| !t.is_trivia())?;
            Some(render(&body[start..=end]))
        })
        .collect()
}

fn split_tokens(tokens: Vec<Token>) -> Vec<(Vec<Token>, bool)> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for tok in tokens {
        if tok.is_punct(';') {
            out.push((std::mem::take(&mut current), true));
        } else {
            current.push(tok);
        }
    }
    if !current.is_empty() {
        out.push((current, false));
    }
    out
}

fn translate_statement(tokens: Vec<Token>) -> String {
    let mut nodes = tree::parse(tokens);
    let ddl = ddl::is_ddl(&nodes);

    visit_bottom_up(&mut nodes, &mut |seq, scope| ddl::map_types(seq, ddl, scope));
    if ddl {
        visit_bottom_up(&mut nodes, &mut |seq, scope| ddl::strip_noise(seq, scope));
    }
    visit_bottom_up(&mut nodes, &mut |seq, _| ddl::map_autoincrement(seq, ddl));
    visit_bottom_up(&mut nodes, &mut |seq, _| functions::rewrite_calls(seq));
    visit_bottom_up(&mut nodes, &mut |seq, _| clauses::rewrite_limit(seq));
    visit_bottom_up(&mut nodes, &mut |seq, _| clauses::rewrite_joins(seq));

    let mut toks = Vec::new();
    flatten(&nodes, &mut toks);
    render(&toks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_schema() {
        let schema = "CREATE TABLE `users` (\n  `id` INT AUTO_INCREMENT PRIMARY KEY,\n  `name` VARCHAR(255) NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;\nINSERT INTO `users` (`name`) VALUES (\"Alice\"), ('Bob\\'s') ;";
        assert_eq!(
            translate(schema),
            "CREATE TABLE \"users\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \"name\" TEXT NOT NULL\n);\nINSERT INTO \"users\" (\"name\") VALUES ('Alice'), ('Bob''s');"
        );
    }

    #[test]
    fn test_whitespace_before_semicolon_removed() {
        assert_eq!(translate("  SELECT 1 ;  SELECT 2 ;  "), "SELECT 1;  SELECT 2;");
    }

    #[test]
    fn test_already_sqlite_is_stable() {
        let sql = "SELECT a || b, SUBSTR(c, 1, 2) FROM t INNER JOIN u ON t.id = u.id LIMIT 5 OFFSET 1;";
        assert_eq!(translate(sql), sql);
        assert_eq!(translate(&translate(sql)), sql);
    }

    #[test]
    fn test_unbalanced_input_forwarded() {
        assert_eq!(translate("SELECT CONCAT(a, b"), "SELECT CONCAT(a, b");
    }

    #[test]
    fn test_split_statements() {
        let parts = split_statements("UPDATE t SET v = 'a;b'; -- trailing\n SELECT * FROM t;;\n");
        assert_eq!(parts, vec!["UPDATE t SET v = 'a;b'", "SELECT * FROM t"]);
        assert!(split_statements("  ; /* nothing */ ;").is_empty());
    }
}
