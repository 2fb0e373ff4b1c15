//! Scalar function rewrites. Runs over each sequence after its groups have
//! been rewritten, so arguments arrive in the target dialect already.

use super::literals::quote_str;
use super::tokenizer::{Token, TokenKind};
use super::tree::{join_with, snippet, split_commas, trim, Node};

pub fn rewrite_calls(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i + 1 < nodes.len() {
        let qualified = i > 0 && nodes[i - 1].is_punct('.');
        let call = match (&nodes[i], &nodes[i + 1]) {
            (name, Node::Group(args)) if !qualified => {
                name.word_upper().and_then(|n| rewrite(&n, args))
            }
            _ => None,
        };
        match call {
            Some(replacement) => {
                let len = replacement.len();
                nodes.splice(i..i + 2, replacement);
                i += len.max(1);
            }
            None => i += 1,
        }
    }
}

fn rewrite(name: &str, inner: &[Node]) -> Option<Vec<Node>> {
    let args: Vec<Vec<Node>> = if trim(inner).is_empty() {
        Vec::new()
    } else {
        split_commas(inner)
            .iter()
            .map(|a| trim(a).to_vec())
            .collect()
    };
    let argc = args.len();

    match name {
        "CONCAT" if argc >= 1 => Some(chain(&args, None)),
        "CONCAT_WS" if argc >= 2 => {
            let sep = wrap(&args[0]);
            Some(chain(&args[1..], Some(&sep)))
        }
        "SUBSTRING" | "MID" | "SUBSTR" if argc == 1 => substring_from(&args[0]),
        "SUBSTRING" | "MID" if argc == 2 || argc == 3 => Some(call("SUBSTR", &args)),
        "LEFT" if argc == 2 => Some(call(
            "SUBSTR",
            &[args[0].clone(), snippet("1"), args[1].clone()],
        )),
        "RIGHT" if argc == 2 => Some(call("SUBSTR", &[args[0].clone(), negate(&args[1])])),
        "IFNULL" => Some(call_raw("COALESCE", inner)),
        "LCASE" => Some(call_raw("LOWER", inner)),
        "UCASE" => Some(call_raw("UPPER", inner)),
        "CHAR_LENGTH" | "CHARACTER_LENGTH" => Some(call_raw("LENGTH", inner)),
        "IF" if argc == 3 => {
            let mut out = snippet("CASE WHEN ");
            out.extend(args[0].iter().cloned());
            out.extend(snippet(" THEN "));
            out.extend(args[1].iter().cloned());
            out.extend(snippet(" ELSE "));
            out.extend(args[2].iter().cloned());
            out.extend(snippet(" END"));
            Some(out)
        }
        "NOW" | "CURRENT_TIMESTAMP" | "LOCALTIME" | "LOCALTIMESTAMP" if argc == 0 => {
            Some(snippet("CURRENT_TIMESTAMP"))
        }
        "CURDATE" | "CURRENT_DATE" | "UTC_DATE" if argc == 0 => Some(snippet("DATE('now')")),
        "CURTIME" | "CURRENT_TIME" | "UTC_TIME" if argc == 0 => Some(snippet("TIME('now')")),
        "UTC_TIMESTAMP" | "SYSDATE" if argc == 0 => Some(snippet("DATETIME('now')")),
        "DATE_ADD" if argc == 2 => date_arith(&args, 1, false),
        "ADDDATE" if argc == 2 => date_arith(&args, 1, true),
        "DATE_SUB" if argc == 2 => date_arith(&args, -1, false),
        "SUBDATE" if argc == 2 => date_arith(&args, -1, true),
        "YEAR" | "MONTH" | "DAY" | "DAYOFMONTH" | "HOUR" | "MINUTE" | "SECOND" if argc == 1 => {
            let fmt = match name {
                "YEAR" => "%Y",
                "MONTH" => "%m",
                "DAY" | "DAYOFMONTH" => "%d",
                "HOUR" => "%H",
                "MINUTE" => "%M",
                _ => "%S",
            };
            let strftime = call("STRFTIME", &[snippet(&quote_str(fmt)), args[0].clone()]);
            Some(cast_integer(strftime))
        }
        "DATEDIFF" if argc == 2 => {
            let mut diff = julian_date(&args[0]);
            diff.extend(snippet(" - "));
            diff.extend(julian_date(&args[1]));
            Some(cast_integer(diff))
        }
        "QUARTER" if argc == 1 => {
            let month = cast_integer(call("STRFTIME", &[snippet("'%m'"), args[0].clone()]));
            let mut shifted = month;
            shifted.extend(snippet(" + 2"));
            let mut out = vec![Node::Group(shifted)];
            out.extend(snippet(" / 3"));
            Some(vec![Node::Group(out)])
        }
        // MySQL counts 1 = Sunday, STRFTIME('%w') counts 0 = Sunday
        "DAYOFWEEK" if argc == 1 => {
            let mut out = cast_integer(call("STRFTIME", &[snippet("'%w'"), args[0].clone()]));
            out.extend(snippet(" + 1"));
            Some(vec![Node::Group(out)])
        }
        "LAST_DAY" if argc == 1 => Some(call(
            "DATE",
            &[
                args[0].clone(),
                snippet("'start of month'"),
                snippet("'+1 month'"),
                snippet("'-1 day'"),
            ],
        )),
        "CEIL" | "CEILING" if argc == 1 => Some(round_toward(&args[0], true)),
        "FLOOR" if argc == 1 => Some(round_toward(&args[0], false)),
        "MOD" if argc == 2 => {
            let mut out = wrap(&args[0]);
            out.extend(snippet(" % "));
            out.extend(wrap(&args[1]));
            Some(vec![Node::Group(out)])
        }
        // the sandbox registers POWER for backends built without math functions
        "POW" if argc == 2 => Some(call("POWER", &args)),
        "RAND" if argc == 0 => Some(snippet("(ABS(RANDOM()) / 9223372036854775807.0)")),
        "GROUP_CONCAT" if argc == 1 => {
            let arg = &args[0];
            let s = arg.iter().position(|n| n.is_word("SEPARATOR"))?;
            let parts = [trim(&arg[..s]).to_vec(), trim(&arg[s + 1..]).to_vec()];
            Some(call("GROUP_CONCAT", &parts))
        }
        _ => None,
    }
}

fn call(name: &str, args: &[Vec<Node>]) -> Vec<Node> {
    vec![Node::word(name), Node::Group(join_with(args, ", "))]
}

fn call_raw(name: &str, inner: &[Node]) -> Vec<Node> {
    vec![Node::word(name), Node::Group(inner.to_vec())]
}

fn cast_integer(expr: Vec<Node>) -> Vec<Node> {
    let mut inner = expr;
    inner.extend(snippet(" AS INTEGER"));
    vec![Node::word("CAST"), Node::Group(inner)]
}

/// `CEIL(x)` as `CAST(x AS INTEGER) + (x > CAST(x AS INTEGER))`, and `FLOOR`
/// with the signs flipped. The cast truncates toward zero.
fn round_toward(arg: &[Node], up: bool) -> Vec<Node> {
    let truncated = cast_integer(arg.to_vec());
    let mut fraction = wrap(arg);
    fraction.extend(snippet(if up { " > " } else { " < " }));
    fraction.extend(truncated.iter().cloned());

    let mut out = truncated;
    out.extend(snippet(if up { " + " } else { " - " }));
    out.push(Node::Group(fraction));
    vec![Node::Group(out)]
}

fn julian_date(arg: &[Node]) -> Vec<Node> {
    call("JULIANDAY", &[call("DATE", &[arg.to_vec()])])
}

/// Operands that bind tighter than `||` and `-` without parentheses.
fn is_simple(arg: &[Node]) -> bool {
    let sig: Vec<&Node> = arg.iter().filter(|n| !n.is_trivia()).collect();
    match sig.as_slice() {
        [_] => true,
        [name, Node::Group(_)] => name.word_upper().is_some(),
        [a, dot, b] => dot.is_punct('.') && !a.is_group() && !b.is_group(),
        [minus, n] => minus.is_punct('-') && is_number(n),
        _ => false,
    }
}

fn is_number(node: &Node) -> bool {
    node.tok().is_some_and(|t| t.kind == TokenKind::Number)
}

fn wrap(arg: &[Node]) -> Vec<Node> {
    if is_simple(arg) {
        arg.to_vec()
    } else {
        vec![Node::Group(arg.to_vec())]
    }
}

fn chain(args: &[Vec<Node>], sep: Option<&[Node]>) -> Vec<Node> {
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.extend(snippet(" || "));
            if let Some(sep) = sep {
                out.extend(sep.iter().cloned());
                out.extend(snippet(" || "));
            }
        }
        out.extend(wrap(arg));
    }
    out
}

fn negate(arg: &[Node]) -> Vec<Node> {
    let sig: Vec<&Node> = arg.iter().filter(|n| !n.is_trivia()).collect();
    match sig.as_slice() {
        [minus, n] if minus.is_punct('-') && is_number(n) => vec![(*n).clone()],
        _ => {
            let mut out = vec![Node::Tok(Token::punct('-'))];
            out.extend(wrap(arg));
            out
        }
    }
}

/// `SUBSTRING(s FROM p [FOR l])`.
fn substring_from(arg: &[Node]) -> Option<Vec<Node>> {
    let from = arg.iter().position(|n| n.is_word("FROM"))?;
    let rest = &arg[from + 1..];
    let mut args = vec![trim(&arg[..from]).to_vec()];
    match rest.iter().position(|n| n.is_word("FOR")) {
        Some(f) => {
            args.push(trim(&rest[..f]).to_vec());
            args.push(trim(&rest[f + 1..]).to_vec());
        }
        None => args.push(trim(rest).to_vec()),
    }
    if args.iter().any(Vec::is_empty) {
        return None;
    }
    Some(call("SUBSTR", &args))
}

/// `DATE_ADD(d, INTERVAL n UNIT)` and friends. `days_shorthand` accepts the
/// `ADDDATE(d, n)` form where a bare number counts days.
fn date_arith(args: &[Vec<Node>], sign: i64, days_shorthand: bool) -> Option<Vec<Node>> {
    let date = &args[0];
    let spec = &args[1];
    let (amount, unit) = if spec.first().is_some_and(|n| n.is_word("INTERVAL")) {
        if spec.len() < 3 {
            return None;
        }
        let unit = spec.last()?.word_upper()?;
        (trim(&spec[1..spec.len() - 1]), unit)
    } else if days_shorthand {
        (spec.as_slice(), "DAY".to_string())
    } else {
        return None;
    };
    if amount.is_empty() {
        return None;
    }

    let (func, factor, unit) = match unit.as_str() {
        "DAY" => ("DATE", 1, "day"),
        "WEEK" => ("DATE", 7, "day"),
        "MONTH" => ("DATE", 1, "month"),
        "QUARTER" => ("DATE", 3, "month"),
        "YEAR" => ("DATE", 1, "year"),
        "HOUR" => ("DATETIME", 1, "hour"),
        "MINUTE" => ("DATETIME", 1, "minute"),
        "SECOND" => ("DATETIME", 1, "second"),
        _ => return None,
    };

    let modifier = match literal_int(amount) {
        Some(n) => {
            let n = n.checked_mul(factor)?.checked_mul(sign)?;
            snippet(&quote_str(&format!("{n:+} {unit}")))
        }
        None => {
            let mut expr = vec![Node::Group(amount.to_vec())];
            if factor != 1 {
                expr.extend(snippet(&format!(" * {factor}")));
                expr = vec![Node::Group(expr)];
            }
            if sign < 0 {
                expr.insert(0, Node::Tok(Token::punct('-')));
                expr = vec![Node::Group(expr)];
            }
            expr.extend(snippet(&format!(" || {}", quote_str(&format!(" {unit}")))));
            expr
        }
    };
    Some(call(func, &[date.clone(), modifier]))
}

/// Integer amounts written as a number, a signed number or a quoted number.
fn literal_int(amount: &[Node]) -> Option<i64> {
    let sig: Vec<&Token> = amount
        .iter()
        .filter(|n| !n.is_trivia())
        .map(Node::tok)
        .collect::<Option<_>>()?;
    match sig.as_slice() {
        [n] if n.kind == TokenKind::Number => n.text.parse().ok(),
        [n] if n.kind == TokenKind::Str => n.text.trim_matches('\'').trim().parse().ok(),
        [s, n] if n.kind == TokenKind::Number && (s.is_punct('-') || s.is_punct('+')) => {
            let v: i64 = n.text.parse().ok()?;
            Some(if s.is_punct('-') { -v } else { v })
        }
        _ => None,
    }
}
