//! Final cleanup pass removing duplicate field and relationship
//! declarations from rendered schema text. Idempotent.

use std::collections::HashSet;

enum State {
    OutsideTable,
    InsideTable { seen_fields: HashSet<String> },
}

/// Drop repeated field declarations within each table block and repeated
/// `Ref:` lines anywhere in the text. The first occurrence wins. Target
/// fields `id` and `_id` count as the same canonical key when comparing
/// refs.
///
/// Operates line by line: a table block is scanned for duplicates only
/// when its header and fields are on separate lines, as the serializer
/// emits them. A self-contained `Table a { id unique }` line passes
/// through unchanged.
pub fn dedup(text: &str) -> String {
    let mut state = State::OutsideTable;
    let mut seen_refs: HashSet<(String, String, String, String)> = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(key) = ref_key(trimmed) {
            if !seen_refs.insert(key) {
                continue;
            }
            kept.push(line);
            continue;
        }

        match &mut state {
            State::OutsideTable => {
                if is_table_open(trimmed) {
                    state = State::InsideTable {
                        seen_fields: HashSet::new(),
                    };
                }
                kept.push(line);
            }
            State::InsideTable { seen_fields } => {
                if trimmed.starts_with('}') {
                    state = State::OutsideTable;
                    kept.push(line);
                } else if trimmed.is_empty() || is_note_line(trimmed) {
                    kept.push(line);
                } else if let Some(name) = trimmed.split_whitespace().next() {
                    if seen_fields.insert(name.to_string()) {
                        kept.push(line);
                    }
                } else {
                    kept.push(line);
                }
            }
        }
    }

    let mut out = kept.join("\n");
    if text.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// A `Table` header whose block is still open at the end of the line.
fn is_table_open(trimmed: &str) -> bool {
    if !trimmed.starts_with("Table ") {
        return false;
    }
    match trimmed.find('{') {
        Some(pos) => !trimmed[pos..].contains('}'),
        None => false,
    }
}

fn is_note_line(trimmed: &str) -> bool {
    let lower = trimmed.to_ascii_lowercase();
    lower.starts_with("note:") || lower.starts_with("note ")
}

/// Key for a `Ref:` line: source endpoint plus the target with its field
/// normalized (`_id` and `id` are the same identifier). Returns None for
/// non-ref lines or refs that do not parse.
fn ref_key(trimmed: &str) -> Option<(String, String, String, String)> {
    let rest = trimmed.strip_prefix("Ref:")?.trim();

    let (op_pos, op_len) = [" > ", " < ", " - "]
        .iter()
        .filter_map(|op| rest.find(op).map(|p| (p, op.len())))
        .min()?;
    let left = rest[..op_pos].trim();
    let right = rest[op_pos + op_len..].trim();

    let (from_table, from_field) = split_endpoint(left)?;
    let (to_table, to_field) = split_endpoint(right)?;

    let canonical_field = if to_field == "_id" { "id" } else { to_field };
    Some((
        from_table.to_string(),
        from_field.to_string(),
        to_table.to_string(),
        canonical_field.to_string(),
    ))
}

fn split_endpoint(end: &str) -> Option<(&str, &str)> {
    let (table, field) = end.rsplit_once('.')?;
    Some((table.trim_matches('"'), field))
}
