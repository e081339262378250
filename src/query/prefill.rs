//! Seed values for records created through a filtered select.
//!
//! Works on the select's last resolved filter text (parameters inlined).
//! Only conjuncts of the form `field = literal` or `field LIKE 'literal'`
//! contribute; anything containing `OR`, a placeholder or an inequality is
//! skipped.

use serde_json::{Map, Value};

/// Split `text` on `AND` at nesting depth zero, outside quotes.
fn split_top_level_and(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && is_keyword_at(&chars, i, "AND") {
            parts.push(std::mem::take(&mut current));
            i += 3;
            continue;
        }
        current.push(ch);
        i += 1;
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether a whole-word, case-insensitive `keyword` starts at `i`.
fn is_keyword_at(chars: &[char], i: usize, keyword: &str) -> bool {
    let len = keyword.len();
    if i + len > chars.len() {
        return false;
    }
    let word: String = chars[i..i + len].iter().collect();
    if !word.eq_ignore_ascii_case(keyword) {
        return false;
    }
    let boundary = |c: Option<&char>| c.map_or(true, |c| !(c.is_alphanumeric() || *c == '_'));
    boundary(i.checked_sub(1).and_then(|p| chars.get(p))) && boundary(chars.get(i + len))
}

fn contains_keyword(text: &str, keyword: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut quote: Option<char> = None;
    for (i, ch) in chars.iter().enumerate() {
        match quote {
            Some(q) if *ch == q => quote = None,
            Some(_) => {}
            None if matches!(ch, '\'' | '"') => quote = Some(*ch),
            None if is_keyword_at(&chars, i, keyword) => return true,
            None => {}
        }
    }
    false
}

/// Remove one pair of parentheses wrapping the whole text.
fn strip_parens(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = match trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => inner,
        None => return trimmed,
    };
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for ch in inner.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    // `(a) AND (b)`: the outer pair does not wrap everything.
                    if depth < 0 {
                        return trimmed;
                    }
                }
                _ => {}
            },
        }
    }
    inner.trim()
}

/// Parse a literal from the right-hand side of a conjunct.
fn literal(text: &str, like: bool) -> Option<Value> {
    let text = text.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = text.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            let doubled: String = [q, q].iter().collect();
            let mut s = inner.replace(&doubled, &q.to_string());
            if like {
                s = s.replace('%', "");
            }
            return Some(Value::String(s));
        }
    }
    if like {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        return serde_json::Number::from_f64(f).map(Value::Number);
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn is_field_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_'))
        && !text.starts_with(|c: char| c.is_ascii_digit())
}

fn conjunct(text: &str) -> Option<(String, Value)> {
    if text.contains('?')
        || contains_keyword(text, "OR")
        || ["!=", "<>", "<=", ">=", "=="].iter().any(|op| text.contains(op))
    {
        return None;
    }
    let chars: Vec<char> = text.chars().collect();
    if let Some(pos) = (0..chars.len()).find(|&i| is_keyword_at(&chars, i, "LIKE")) {
        let field: String = chars[..pos].iter().collect();
        let value: String = chars[pos + 4..].iter().collect();
        let field = field.trim();
        if field.to_ascii_uppercase().ends_with(" NOT") || !is_field_path(field) {
            return None;
        }
        return literal(&value, true).map(|v| (field.to_string(), v));
    }
    let (field, value) = text.split_once('=')?;
    let field = field.trim().trim_matches('`');
    if !is_field_path(field) {
        return None;
    }
    literal(value, false).map(|v| (field.to_string(), v))
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Field values implied by `filter`, as a (possibly nested) JSON object.
pub fn prefill_from_filter(filter: &str) -> Map<String, Value> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Map::new();
    for part in split_top_level_and(strip_parens(filter)) {
        let part = strip_parens(&part).to_string();
        if seen.contains(&part) {
            continue;
        }
        seen.push(part.clone());
        if let Some((field, value)) = conjunct(&part) {
            insert_path(&mut out, &field, value);
        }
    }
    out
}
