use super::tree::{prev_sig, trim, Node};

const LIMIT_STOP: &[&str] = &["FOR", "UNION", "INTO", "LOCK"];

fn is_limit_stop(node: &Node) -> bool {
    LIMIT_STOP.iter().any(|kw| node.is_word(kw))
}

/// `LIMIT offset, count` becomes `LIMIT count OFFSET offset`.
pub fn rewrite_limit(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i < nodes.len() {
        if !nodes[i].is_word("LIMIT") {
            i += 1;
            continue;
        }
        let Some(comma) = (i + 1..nodes.len())
            .take_while(|&j| !is_limit_stop(&nodes[j]))
            .find(|&j| nodes[j].is_punct(','))
        else {
            i += 1;
            continue;
        };
        let end = (comma + 1..nodes.len())
            .find(|&j| is_limit_stop(&nodes[j]) || nodes[j].is_punct(','))
            .unwrap_or(nodes.len());

        let offset = trim(&nodes[i + 1..comma]).to_vec();
        let count_region = &nodes[comma + 1..end];
        let count = trim(count_region).to_vec();
        if offset.is_empty() || count.is_empty() {
            i += 1;
            continue;
        }
        let trailing_from = count_region
            .iter()
            .rposition(|n| !n.is_trivia())
            .map_or(count_region.len(), |p| p + 1);
        let trailing = count_region[trailing_from..].to_vec();

        let mut replacement = vec![Node::space()];
        replacement.extend(count);
        replacement.extend([Node::space(), Node::word("OFFSET"), Node::space()]);
        replacement.extend(offset);
        replacement.extend(trailing);
        let len = replacement.len();
        nodes.splice(i + 1..end, replacement);
        i += len + 1;
    }
}

/// Spells out the join kinds SQLite's grammar expects.
pub fn rewrite_joins(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i < nodes.len() {
        if nodes[i].is_word("STRAIGHT_JOIN") {
            nodes.splice(i..i + 1, [Node::word("INNER"), Node::space(), Node::word("JOIN")]);
            i += 3;
            continue;
        }
        if !nodes[i].is_word("JOIN") {
            i += 1;
            continue;
        }
        let prev = prev_sig(nodes, i).and_then(|p| nodes[p].word_upper());
        let insert = match prev.as_deref() {
            Some("LEFT" | "RIGHT" | "FULL") => Some("OUTER"),
            Some("INNER" | "CROSS" | "OUTER" | "NATURAL") => None,
            _ => Some("INNER"),
        };
        if let Some(kw) = insert {
            nodes.splice(i..i, [Node::word(kw), Node::space()]);
            i += 2;
        }
        i += 1;
    }
}
