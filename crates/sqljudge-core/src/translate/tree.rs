use super::tokenizer::{tokenize, Token, TokenKind};

/// A token stream with parentheses folded into groups, so call arguments and
/// column lists can be addressed as units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Tok(Token),
    /// Contents between a matching `(` and `)`, parentheses excluded.
    Group(Vec<Node>),
}

impl Node {
    pub fn tok(&self) -> Option<&Token> {
        match self {
            Node::Tok(t) => Some(t),
            Node::Group(_) => None,
        }
    }

    pub fn is_trivia(&self) -> bool {
        self.tok().is_some_and(Token::is_trivia)
    }

    pub fn is_word(&self, kw: &str) -> bool {
        self.tok().is_some_and(|t| t.is_word(kw))
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.tok().is_some_and(|t| t.is_punct(c))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }

    pub fn word_upper(&self) -> Option<String> {
        self.tok()
            .filter(|t| t.kind == TokenKind::Word)
            .map(Token::upper)
    }

    pub fn word(text: &str) -> Self {
        Node::Tok(Token::word(text))
    }

    pub fn space() -> Self {
        Node::Tok(Token::space())
    }
}

/// Folds parentheses into groups. Unbalanced input stays flat so the rules
/// that need structure simply find nothing to match.
pub fn parse(tokens: Vec<Token>) -> Vec<Node> {
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
    for tok in &tokens {
        if tok.is_punct('(') {
            stack.push(Vec::new());
        } else if tok.is_punct(')') {
            if stack.len() == 1 {
                return flat(tokens);
            }
            let inner = stack.pop().unwrap_or_default();
            if let Some(top) = stack.last_mut() {
                top.push(Node::Group(inner));
            }
        } else if let Some(top) = stack.last_mut() {
            top.push(Node::Tok(tok.clone()));
        }
    }
    if stack.len() != 1 {
        return flat(tokens);
    }
    stack.pop().unwrap_or_default()
}

fn flat(tokens: Vec<Token>) -> Vec<Node> {
    tokens.into_iter().map(Node::Tok).collect()
}

pub fn flatten(nodes: &[Node], out: &mut Vec<Token>) {
    for n in nodes {
        match n {
            Node::Tok(t) => out.push(t.clone()),
            Node::Group(inner) => {
                out.push(Token::punct('('));
                flatten(inner, out);
                out.push(Token::punct(')'));
            }
        }
    }
}

pub fn render_nodes(nodes: &[Node]) -> String {
    let mut toks = Vec::new();
    flatten(nodes, &mut toks);
    super::tokenizer::render(&toks)
}

/// Parses a generated SQL fragment into nodes.
pub fn snippet(sql: &str) -> Vec<Node> {
    parse(tokenize(sql))
}

pub fn next_sig(nodes: &[Node], from: usize) -> Option<usize> {
    (from..nodes.len()).find(|&i| !nodes[i].is_trivia())
}

pub fn prev_sig(nodes: &[Node], before: usize) -> Option<usize> {
    (0..before).rev().find(|&i| !nodes[i].is_trivia())
}

/// Strips leading and trailing trivia.
pub fn trim(nodes: &[Node]) -> &[Node] {
    let start = nodes.iter().position(|n| !n.is_trivia()).unwrap_or(nodes.len());
    let end = nodes
        .iter()
        .rposition(|n| !n.is_trivia())
        .map_or(start, |i| i + 1);
    &nodes[start..end]
}

/// Splits a sequence on top-level commas. Nested commas live inside groups.
pub fn split_commas(nodes: &[Node]) -> Vec<Vec<Node>> {
    let mut parts = vec![Vec::new()];
    for n in nodes {
        if n.is_punct(',') {
            parts.push(Vec::new());
        } else if let Some(last) = parts.last_mut() {
            last.push(n.clone());
        }
    }
    parts
}

pub fn join_with(parts: &[Vec<Node>], sep: &str) -> Vec<Node> {
    let sep = snippet(sep);
    let mut out = Vec::new();
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            out.extend(sep.iter().cloned());
        }
        out.extend(trim(p).iter().cloned());
    }
    out
}

/// Removes `range` plus the trivia directly in front of it.
pub fn remove_with_leading_space(nodes: &mut Vec<Node>, start: usize, end: usize) -> usize {
    let mut from = start;
    while from > 0 && nodes[from - 1].tok().is_some_and(|t| t.kind == TokenKind::Whitespace) {
        from -= 1;
    }
    nodes.drain(from..end);
    from
}

/// Where a sequence sits inside its statement.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Word glued to the opening parenthesis of the group, uppercased.
    pub caller: Option<&'a str>,
    /// 0 for the statement itself.
    pub depth: usize,
}

/// Applies `f` to every sequence, innermost groups first.
pub fn visit_bottom_up(nodes: &mut Vec<Node>, f: &mut dyn FnMut(&mut Vec<Node>, Scope<'_>)) {
    visit(nodes, Scope { caller: None, depth: 0 }, f);
}

fn visit(nodes: &mut Vec<Node>, scope: Scope<'_>, f: &mut dyn FnMut(&mut Vec<Node>, Scope<'_>)) {
    for i in 0..nodes.len() {
        let name = if i > 0 { nodes[i - 1].word_upper() } else { None };
        if let Node::Group(inner) = &mut nodes[i] {
            let inner_scope = Scope {
                caller: name.as_deref(),
                depth: scope.depth + 1,
            };
            visit(inner, inner_scope, f);
        }
    }
    f(nodes, scope);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_round_trip() {
        let sql = "SELECT f(a, g(b, c)) FROM t WHERE (x = 1)";
        assert_eq!(render_nodes(&snippet(sql)), sql);
    }

    #[test]
    fn test_unbalanced_stays_flat() {
        let nodes = snippet("SELECT (a");
        assert!(nodes.iter().all(|n| !n.is_group()));
        let nodes = snippet("SELECT a)");
        assert!(nodes.iter().all(|n| !n.is_group()));
    }

    #[test]
    fn test_split_commas_ignores_nested() {
        let nodes = snippet("a, f(b, c), d");
        let parts = split_commas(&nodes);
        assert_eq!(parts.len(), 3);
        assert_eq!(render_nodes(trim(&parts[1])), "f(b, c)");
    }
}
