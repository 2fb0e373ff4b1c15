//! Column types, table options and autoincrement columns.

use super::tokenizer::TokenKind;
use super::tree::{next_sig, prev_sig, remove_with_leading_space, Node, Scope};

/// Words that can precede a type-shaped word without being a column name.
const NOT_A_COLUMN: &[&str] = &[
    "ADD", "ALTER", "AND", "AS", "BY", "CHARSET", "CHECK", "COLLATE", "COLUMN", "COMMENT",
    "CONSTRAINT", "CREATE", "DEFAULT", "DROP", "ENGINE", "EXISTS", "FOREIGN", "FROM", "IF",
    "INDEX", "INTO", "JOIN", "KEY", "MODIFY", "NOT", "NULL", "ON", "OR", "PRIMARY", "REFERENCES",
    "RENAME", "SELECT", "SET", "TABLE", "TEMPORARY", "TO", "UNIQUE", "VIEW", "WHERE",
];

const NUMERIC_MODIFIERS: &[&str] = &["UNSIGNED", "SIGNED", "ZEROFILL"];

pub fn is_ddl(nodes: &[Node]) -> bool {
    next_sig(nodes, 0).is_some_and(|i| nodes[i].is_word("CREATE") || nodes[i].is_word("ALTER"))
}

fn is_column_name(node: &Node) -> bool {
    match node.tok() {
        Some(t) if t.kind == TokenKind::QuotedIdent => true,
        Some(t) if t.kind == TokenKind::Word => !NOT_A_COLUMN.iter().any(|kw| t.is_word(kw)),
        _ => false,
    }
}

/// Collapses MySQL column types onto SQLite's affinity names.
pub fn map_types(nodes: &mut Vec<Node>, ddl: bool, scope: Scope<'_>) {
    let in_cast = scope.caller == Some("CAST");
    if !ddl && !in_cast {
        return;
    }
    let mut i = 0;
    while i < nodes.len() {
        let Some(word) = nodes[i].word_upper() else {
            i += 1;
            continue;
        };
        let positioned = prev_sig(nodes, i).is_some_and(|p| {
            if in_cast {
                nodes[p].is_word("AS")
            } else {
                is_column_name(&nodes[p])
            }
        });
        if positioned {
            if let Some((end, name)) = match_type(nodes, i, &word, in_cast) {
                nodes.splice(i..end, [Node::word(name)]);
            }
        }
        i += 1;
    }
}

/// Returns the end of the type expression starting at `i` and its SQLite name.
fn match_type(
    nodes: &[Node],
    i: usize,
    word: &str,
    in_cast: bool,
) -> Option<(usize, &'static str)> {
    let mut end = i + 1;
    if word == "DOUBLE" {
        if let Some(n) = next_sig(nodes, end).filter(|&n| nodes[n].is_word("PRECISION")) {
            end = n + 1;
        }
    }
    if in_cast && (word == "SIGNED" || word == "UNSIGNED") {
        if let Some(n) = next_sig(nodes, end)
            .filter(|&n| nodes[n].is_word("INT") || nodes[n].is_word("INTEGER"))
        {
            end = n + 1;
        }
        return Some((end, "INTEGER"));
    }

    let mut has_group = false;
    if let Some(n) = next_sig(nodes, end).filter(|&n| nodes[n].is_group()) {
        has_group = true;
        end = n + 1;
    }

    let numeric = matches!(
        word,
        "INT" | "INTEGER" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "DECIMAL" | "NUMERIC"
            | "FLOAT" | "DOUBLE" | "REAL"
    );
    let mut has_modifier = false;
    if numeric {
        while let Some(n) = next_sig(nodes, end)
            .filter(|&n| NUMERIC_MODIFIERS.iter().any(|m| nodes[n].is_word(m)))
        {
            has_modifier = true;
            end = n + 1;
        }
    }

    let name = match word {
        "INT" | "INTEGER" if has_group || has_modifier => "INTEGER",
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" => "INTEGER",
        "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => "REAL",
        "REAL" if has_group || has_modifier => "REAL",
        "VARCHAR" | "NVARCHAR" | "CHAR" | "NCHAR" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => {
            "TEXT"
        }
        "TEXT" | "ENUM" | "SET" if has_group => "TEXT",
        _ => return None,
    };
    Some((end, name))
}

/// Drops MySQL storage options SQLite has no syntax for.
pub fn strip_noise(nodes: &mut Vec<Node>, scope: Scope<'_>) {
    let mut i = 0;
    while i < nodes.len() {
        let Some(end) = noise_end(nodes, i) else {
            i += 1;
            continue;
        };
        let mut start = i;
        // table options may be comma separated
        if scope.depth == 0 {
            if let Some(p) = prev_sig(nodes, i).filter(|&p| nodes[p].is_punct(',')) {
                start = p;
            }
        }
        i = remove_with_leading_space(nodes, start, end);
    }
}

fn noise_end(nodes: &[Node], i: usize) -> Option<usize> {
    let word = nodes[i].word_upper()?;
    match word.as_str() {
        "ENGINE" | "ROW_FORMAT" | "CHARSET" | "COLLATE" => option_value_end(nodes, i + 1),
        "CHARACTER" => character_set_end(nodes, i + 1),
        "DEFAULT" => {
            let n = next_sig(nodes, i + 1)?;
            match nodes[n].word_upper()?.as_str() {
                "CHARSET" | "COLLATE" => option_value_end(nodes, n + 1),
                "CHARACTER" => character_set_end(nodes, n + 1),
                _ => None,
            }
        }
        "AUTO_INCREMENT" => {
            let n = next_sig(nodes, i + 1)?;
            let is_number = nodes[n].tok().is_some_and(|t| t.kind == TokenKind::Number);
            if nodes[n].is_punct('=') || is_number {
                option_value_end(nodes, i + 1)
            } else {
                None
            }
        }
        "COMMENT" => {
            let end = option_value_end(nodes, i + 1)?;
            nodes[end - 1]
                .tok()
                .is_some_and(|t| t.kind == TokenKind::Str)
                .then_some(end)
        }
        "ON" => {
            let n = next_sig(nodes, i + 1).filter(|&n| nodes[n].is_word("UPDATE"))?;
            let m = next_sig(nodes, n + 1).filter(|&m| {
                ["CURRENT_TIMESTAMP", "NOW", "LOCALTIMESTAMP"]
                    .iter()
                    .any(|kw| nodes[m].is_word(kw))
            })?;
            let mut end = m + 1;
            if let Some(Node::Group(inner)) = nodes.get(end) {
                if inner.iter().all(Node::is_trivia) {
                    end += 1;
                }
            }
            Some(end)
        }
        _ => None,
    }
}

fn character_set_end(nodes: &[Node], from: usize) -> Option<usize> {
    let n = next_sig(nodes, from).filter(|&n| nodes[n].is_word("SET"))?;
    option_value_end(nodes, n + 1)
}

/// `[=] value`, returning the index just past the value.
fn option_value_end(nodes: &[Node], from: usize) -> Option<usize> {
    let mut n = next_sig(nodes, from)?;
    if nodes[n].is_punct('=') {
        n = next_sig(nodes, n + 1)?;
    }
    let valued = nodes[n].tok().is_some_and(|t| {
        matches!(
            t.kind,
            TokenKind::Word | TokenKind::Str | TokenKind::Number | TokenKind::QuotedIdent
        )
    });
    valued.then_some(n + 1)
}

/// SQLite only honours `AUTOINCREMENT` on `INTEGER PRIMARY KEY`, so the keyword
/// moves behind the column's primary key clause and the type is forced.
pub fn map_autoincrement(nodes: &mut Vec<Node>, ddl: bool) {
    if !ddl {
        for n in nodes.iter_mut() {
            if n.is_word("AUTO_INCREMENT") {
                *n = Node::word("AUTOINCREMENT");
            }
        }
        return;
    }
    while let Some(k) = nodes.iter().position(|n| n.is_word("AUTO_INCREMENT")) {
        let start = (0..k).rev().find(|&i| nodes[i].is_punct(',')).map_or(0, |i| i + 1);
        let end = (k..nodes.len())
            .find(|&i| nodes[i].is_punct(','))
            .unwrap_or(nodes.len());

        if let Some(name) = next_sig(nodes, start).filter(|&n| n < k) {
            if let Some(ty) = next_sig(nodes, name + 1).filter(|&t| t < k) {
                if nodes[ty].word_upper().is_some() {
                    nodes[ty] = Node::word("INTEGER");
                }
            }
        }

        let removed_from = remove_with_leading_space(nodes, k, k + 1);
        let end = end - (k + 1 - removed_from);
        if let Some(pos) = primary_key_end(nodes, start, end) {
            nodes.splice(pos..pos, [Node::space(), Node::word("AUTOINCREMENT")]);
        }
    }
}

fn primary_key_end(nodes: &[Node], start: usize, end: usize) -> Option<usize> {
    let p = (start..end).find(|&i| nodes[i].is_word("PRIMARY"))?;
    let key = next_sig(nodes, p + 1).filter(|&k| k < end && nodes[k].is_word("KEY"))?;
    let mut pos = key + 1;
    if let Some(o) = next_sig(nodes, pos)
        .filter(|&o| o < end && (nodes[o].is_word("ASC") || nodes[o].is_word("DESC")))
    {
        pos = o + 1;
    }
    Some(pos)
}
