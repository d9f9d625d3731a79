//! Serializer for converting a parsed schema back to schema text.

use crate::ast::{Field, Ref, Schema, Table, TableGroup};

/// Serialize a schema to text. Tables come first, blank-line separated,
/// then the refs block, then the table groups; empty sections are omitted.
/// Raw type spellings are emitted verbatim so that `parse(serialize(s))`
/// reproduces `s`.
pub fn serialize(schema: &Schema) -> String {
    let mut sections = Vec::new();

    for table in &schema.tables {
        sections.push(serialize_table(table));
    }

    if !schema.refs.is_empty() {
        let refs: Vec<String> = schema.refs.iter().map(serialize_ref).collect();
        sections.push(refs.join("\n"));
    }

    for group in &schema.groups {
        sections.push(serialize_group(group));
    }

    let mut out = sections.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub fn serialize_table(table: &Table) -> String {
    let mut out = String::new();
    out.push_str(&format!("Table {} {{\n", quote_name(&table.name)));
    if let Some(note) = &table.note {
        out.push_str(&format!("  Note: \"{}\"\n", escape(note)));
    }
    for field in &table.fields {
        serialize_field(&mut out, field);
    }
    out.push('}');
    out
}

fn serialize_field(out: &mut String, field: &Field) {
    out.push_str(&format!("  {} {}", field.name, field.typ));

    let mut entries = field.constraints.clone();
    if let Some(note) = &field.note {
        entries.push(format!("Note: \"{}\"", escape(note)));
    }
    if !entries.is_empty() {
        out.push_str(&format!(" [{}]", entries.join(", ")));
    }
    out.push('\n');
}

pub fn serialize_ref(r: &Ref) -> String {
    format!(
        "Ref: {}.{} {} {}.{}",
        quote_name(&r.from.table),
        r.from.field,
        r.op.as_str(),
        quote_name(&r.to.table),
        r.to.field
    )
}

pub fn serialize_group(group: &TableGroup) -> String {
    let mut out = String::new();
    out.push_str(&format!("TableGroup \"{}\"", escape(&group.name)));
    if let Some(color) = &group.color {
        out.push_str(&format!(" [color: {}]", color));
    }
    out.push_str(" {\n");
    for member in &group.members {
        out.push_str(&format!("  {}", quote_name(&member.table)));
        if let Some(comment) = &member.comment {
            out.push_str(&format!(" // {}", comment));
        }
        out.push('\n');
    }
    if let Some(note) = &group.note {
        out.push_str(&format!("  Note: '''{}'''\n", note));
    }
    out.push('}');
    out
}

/// Quote a name when it is not a bare identifier.
fn quote_name(name: &str) -> String {
    let bare = !name.is_empty()
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if bare {
        name.to_string()
    } else {
        format!("\"{}\"", escape(name))
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
