//! Recombines a base schema, a generated schema, an edited changeset and
//! the rename map into a single schema text, recomputing refs and table
//! groups along the way.

use std::collections::HashSet;

use crate::ast::{
    ChangeSet, Field, GroupMember, Ref, RefEnd, RefOp, RenameMap, Schema, Table, TableGroup,
};
use crate::dedup::dedup;
use crate::serializer::serialize;
use crate::types::infer_relation;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeWarning {
    #[error("dropped dangling ref {from_table}.{from_field} -> {to_table}.{to_field}")]
    DanglingRefDropped {
        from_table: String,
        from_field: String,
        to_table: String,
        to_field: String,
    },
    #[error("dropped orphan member {table} from group {group}")]
    OrphanGroupMemberDropped { group: String, table: String },
    #[error("ambiguous relation inference for {table}.{field}, kept type {kept}")]
    AmbiguousRelationInference {
        table: String,
        field: String,
        kept: String,
    },
}

/// Merge and return the resulting schema text. Warnings are reported
/// through `tracing`; the merge itself always completes.
pub fn merge(
    base: &Schema,
    generated: &Schema,
    changes: &ChangeSet,
    renames: &RenameMap,
) -> String {
    let (text, warnings) = merge_with_warnings(base, generated, changes, renames);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    text
}

/// Deterministic given identical inputs: table order follows the
/// changeset's explicit order array, never map iteration order.
pub fn merge_with_warnings(
    base: &Schema,
    generated: &Schema,
    changes: &ChangeSet,
    renames: &RenameMap,
) -> (String, Vec<MergeWarning>) {
    let mut warnings = Vec::new();
    let mut tables: Vec<Table> = Vec::new();

    // Steps 1-2: tables added or modified by the changeset, in display order.
    for name in &changes.order {
        if tables.iter().any(|t| &t.name == name) {
            continue;
        }
        if let Some(fields) = changes.new_tables.get(name) {
            tables.push(Table {
                name: name.clone(),
                note: changes.table_descriptions.get(name).cloned(),
                fields: fields.clone(),
            });
        } else if let Some(added) = changes.new_fields.get(name) {
            // The generated schema still knows the table by its pre-rename
            // name.
            let original = pre_rename_name(name, renames);
            let existing = generated.table(original);
            let mut fields: Vec<Field> =
                existing.map(|t| t.fields.clone()).unwrap_or_default();
            fields.extend(added.iter().cloned());
            let note = changes
                .table_descriptions
                .get(name)
                .cloned()
                .or_else(|| existing.and_then(|t| t.note.clone()));
            tables.push(Table {
                name: name.clone(),
                note,
                fields,
            });
        }
    }
    let changed_names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();

    // Step 3: genuinely untouched base tables, emitted as-is apart from a
    // defensive type remap.
    for table in &base.tables {
        let untouched = !tables.iter().any(|t| t.name == table.name)
            && !renames.contains_key(&table.name)
            && !renames.values().any(|v| v == &table.name);
        if untouched {
            tables.push(table.clone());
        }
    }

    let emitted: HashSet<String> = tables.iter().map(|t| t.name.clone()).collect();

    // Field regeneration: remap types through the rename map everywhere;
    // run relation inference and canonical respelling on the tables this
    // merge created or modified.
    for table in &mut tables {
        let regenerate = changed_names.contains(&table.name);
        let table_name = table.name.clone();
        for field in &mut table.fields {
            remap_field(field, renames);
            if regenerate {
                let inline = field.inline_ref().map(|end| end.table);
                let (typ, ambiguous) =
                    infer_relation(&field.name, &field.typ, inline.as_deref(), &emitted);
                if ambiguous {
                    warnings.push(MergeWarning::AmbiguousRelationInference {
                        table: table_name.clone(),
                        field: field.name.clone(),
                        kept: typ.clone(),
                    });
                }
                field.typ = typ;
            }
        }
    }

    // Step 4: keep still-valid generated refs, then synthesize refs for
    // table-typed fields not yet covered.
    let mut refs: Vec<Ref> = Vec::new();
    for r in &generated.refs {
        let remapped = Ref {
            from: remap_end(&r.from, renames),
            op: r.op,
            to: remap_end(&r.to, renames),
        };
        let source_field_exists = tables
            .iter()
            .find(|t| t.name == remapped.from.table)
            .is_some_and(|t| t.has_field(&remapped.from.field));
        if emitted.contains(&remapped.to.table) && source_field_exists {
            refs.push(remapped);
        } else {
            warnings.push(MergeWarning::DanglingRefDropped {
                from_table: remapped.from.table,
                from_field: remapped.from.field,
                to_table: remapped.to.table,
                to_field: remapped.to.field,
            });
        }
    }
    for table in &tables {
        for field in &table.fields {
            if !emitted.contains(&field.typ) {
                continue;
            }
            let covered = refs.iter().any(|r| {
                r.from.table == table.name
                    && r.from.field == field.name
                    && r.to.table == field.typ
            });
            if !covered {
                refs.push(Ref {
                    from: RefEnd {
                        table: table.name.clone(),
                        field: field.name.clone(),
                    },
                    op: RefOp::ManyToOne,
                    to: RefEnd {
                        table: field.typ.clone(),
                        field: "id".to_string(),
                    },
                });
            }
        }
    }

    // Step 5: rebuild groups around the emitted tables, preserving notes.
    let mut groups: Vec<TableGroup> = Vec::new();
    for group in &generated.groups {
        let mut members = Vec::new();
        for member in &group.members {
            let name = renames.get(&member.table).unwrap_or(&member.table);
            if emitted.contains(name) {
                members.push(GroupMember {
                    table: name.clone(),
                    comment: member.comment.clone(),
                });
            } else {
                warnings.push(MergeWarning::OrphanGroupMemberDropped {
                    group: group.name.clone(),
                    table: member.table.clone(),
                });
            }
        }
        groups.push(TableGroup {
            name: group.name.clone(),
            color: group.color.clone(),
            members,
            note: group.note.clone(),
        });
    }
    // Tables created or modified by this merge and belonging to no group
    // join the first one.
    let assigned: HashSet<String> = groups
        .iter()
        .flat_map(|g| g.members.iter().map(|m| m.table.clone()))
        .collect();
    if let Some(first) = groups.first_mut() {
        for name in &changed_names {
            if !assigned.contains(name) {
                first.members.push(GroupMember {
                    table: name.clone(),
                    comment: None,
                });
            }
        }
    }

    // Steps 6-7: serialize and run the final cleanup pass.
    let result = Schema {
        tables,
        refs,
        groups,
    };
    (dedup(&serialize(&result)), warnings)
}

/// Reverse lookup: the name a now-renamed table had in the generated schema.
fn pre_rename_name<'a>(name: &'a str, renames: &'a RenameMap) -> &'a str {
    renames
        .iter()
        .find(|(_, new)| new.as_str() == name)
        .map(|(old, _)| old.as_str())
        .unwrap_or(name)
}

/// Remap a field whose type, or inline ref target, names a renamed table.
/// The ref target is parsed out and compared exactly; a rename of `user`
/// must not touch a ref aimed at `poweruser`.
fn remap_field(field: &mut Field, renames: &RenameMap) {
    if let Some(new) = renames.get(&field.typ) {
        field.typ = new.clone();
    }
    for entry in &mut field.constraints {
        let Some(rest) = entry.strip_prefix("ref:") else {
            continue;
        };
        let rest = rest.trim_start();
        let (op, target) = match rest.chars().next() {
            Some(c @ ('>' | '<' | '-')) => (Some(c), rest[1..].trim_start()),
            _ => (None, rest),
        };
        let Some((table, target_field)) = target.rsplit_once('.') else {
            continue;
        };
        let bare = table.trim_matches('"');
        if let Some(new) = renames.get(bare) {
            let table_out = if table.starts_with('"') || new.contains(' ') {
                format!("\"{}\"", new)
            } else {
                new.clone()
            };
            *entry = match op {
                Some(op) => format!("ref: {} {}.{}", op, table_out, target_field),
                None => format!("ref: {}.{}", table_out, target_field),
            };
        }
    }
}

fn remap_end(end: &RefEnd, renames: &RenameMap) -> RefEnd {
    RefEnd {
        table: renames.get(&end.table).cloned().unwrap_or_else(|| end.table.clone()),
        field: end.field.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn renames(pairs: &[(&str, &str)]) -> RenameMap {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_noop_changeset_reproduces_schema() {
        let text = "Table user {\n  id unique [pk]\n  name text\n}\n";
        let schema = parse(text).unwrap();
        let out = merge(&schema, &schema, &ChangeSet::default(), &HashMap::new());
        assert_eq!(out, text);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let base = parse("Table user {\n id unique\n}").unwrap();
        let generated = parse("Table user {\n id unique\n}").unwrap();
        let mut changes = ChangeSet::default();
        changes.new_tables.insert(
            "order".into(),
            vec![Field::new("id", "unique"), Field::new("user_id", "int")],
        );
        changes.new_tables.insert(
            "invoice".into(),
            vec![Field::new("id", "unique"), Field::new("order_id", "int")],
        );
        changes.order = vec!["invoice".into(), "order".into()];

        let map = HashMap::new();
        let a = merge(&base, &generated, &changes, &map);
        let b = merge(&base, &generated, &changes, &map);
        assert_eq!(a, b);
        // Order array governs emission order, not map iteration.
        let invoice_pos = a.find("Table invoice").unwrap();
        let order_pos = a.find("Table order").unwrap();
        assert!(invoice_pos < order_pos);
    }

    #[test]
    fn test_new_table_gets_inferred_relation_and_ref() {
        let base = parse("Table user {\n id unique\n}").unwrap();
        let generated = base.clone();
        let mut changes = ChangeSet::default();
        changes.new_tables.insert(
            "order".into(),
            vec![Field::new("id", "unique"), Field::new("user_id", "int")],
        );
        changes.order = vec!["order".into()];

        let out = merge(&base, &generated, &changes, &HashMap::new());
        assert!(out.contains("user_id user"));
        assert!(out.contains("Ref: order.user_id > user.id"));
    }

    #[test]
    fn test_rename_cascade() {
        let text = "Table user {\n  id unique\n}\n\nTable order {\n  id unique\n  user_id user\n}\n\nRef: order.user_id > user._id\n";
        let base = parse(text).unwrap();
        let generated = base.clone();

        // The editor renamed user -> customer; user carries a pending field.
        let mut changes = ChangeSet::default();
        changes
            .new_fields
            .insert("customer".into(), vec![Field::new("segment", "text")]);
        changes.order = vec!["customer".into()];
        let map = renames(&[("user", "customer")]);

        let out = merge(&base, &generated, &changes, &map);
        assert!(out.contains("Table customer {"));
        assert!(!out.contains("Table user {"));
        assert!(out.contains("user_id customer"));
        assert!(out.contains("Ref: order.user_id > customer._id"));
        // The remapped explicit ref covers the pair; no second ref appears.
        assert!(!out.contains("Ref: order.user_id > customer.id\n"));
    }

    #[test]
    fn test_inline_ref_rewrite_respects_table_boundaries() {
        let text = "Table user {\n  id unique\n}\n\nTable poweruser {\n  id unique\n}\n";
        let base = parse(text).unwrap();
        let generated = base.clone();

        let mut changes = ChangeSet::default();
        changes
            .new_fields
            .insert("customer".into(), vec![Field::new("segment", "text")]);
        let mut admin = Field::new("admin_ref", "int");
        admin.constraints.push("ref: > poweruser.id".into());
        let mut owner = Field::new("owner_id", "int");
        owner.constraints.push("ref: > user.id".into());
        changes
            .new_tables
            .insert("audit".into(), vec![Field::new("id", "unique"), admin, owner]);
        changes.order = vec!["customer".into(), "audit".into()];
        let map = renames(&[("user", "customer")]);

        let out = merge(&base, &generated, &changes, &map);
        // Renaming user must leave a ref aimed at poweruser alone.
        assert!(out.contains("ref: > poweruser.id"));
        assert!(!out.contains("powercustomer"));
        // The ref aimed at user itself is retargeted.
        assert!(out.contains("ref: > customer.id"));
        assert!(out.contains("owner_id customer"));
    }

    #[test]
    fn test_dangling_ref_dropped_with_warning() {
        let text = "Table user {\n id unique\n}\nTable order {\n id unique\n}\nRef: order.user_id > user.id";
        let base = parse(text).unwrap();
        let generated = base.clone();
        // order.user_id does not exist on the emitted table, so the ref
        // cannot survive.
        let (out, warnings) =
            merge_with_warnings(&base, &generated, &ChangeSet::default(), &HashMap::new());
        assert!(!out.contains("Ref:"));
        assert_eq!(
            warnings,
            vec![MergeWarning::DanglingRefDropped {
                from_table: "order".into(),
                from_field: "user_id".into(),
                to_table: "user".into(),
                to_field: "id".into(),
            }]
        );
    }

    #[test]
    fn test_group_rebuilt_and_new_table_appended() {
        let text = r#"
Table user { id unique }
TableGroup "Core" [color: #4CAF50] {
  user // main account table
  ghost
  Note: '''Core tables'''
}
"#;
        let base = parse(text).unwrap();
        let generated = base.clone();
        let mut changes = ChangeSet::default();
        changes
            .new_tables
            .insert("order".into(), vec![Field::new("id", "unique")]);
        changes.order = vec!["order".into()];

        let (out, warnings) =
            merge_with_warnings(&base, &generated, &changes, &HashMap::new());
        assert!(out.contains("TableGroup \"Core\" [color: #4CAF50] {"));
        assert!(out.contains("user // main account table"));
        assert!(out.contains("\n  order\n"));
        assert!(!out.contains("ghost"));
        assert!(out.contains("Note: '''Core tables'''"));
        assert!(warnings.contains(&MergeWarning::OrphanGroupMemberDropped {
            group: "Core".into(),
            table: "ghost".into(),
        }));
    }

    #[test]
    fn test_new_fields_appended_to_generated_fields() {
        let base = parse("Table user {\n id unique\n}").unwrap();
        let generated = parse("Table user {\n id unique\n name text\n}").unwrap();
        let mut changes = ChangeSet::default();
        changes
            .new_fields
            .insert("user".into(), vec![Field::new("email", "text")]);
        changes.order = vec!["user".into()];

        let out = merge(&base, &generated, &changes, &HashMap::new());
        let user_block = out.split("\n\n").next().unwrap();
        assert!(user_block.contains("id unique"));
        assert!(user_block.contains("name text"));
        assert!(user_block.contains("email text"));
    }

    #[test]
    fn test_untouched_base_table_keeps_raw_spellings() {
        let base = parse("Table log {\n id unique\n payload varchar(255)\n}").unwrap();
        let generated = base.clone();
        let out = merge(&base, &generated, &ChangeSet::default(), &HashMap::new());
        // Step 3 emits verbatim: no canonical respelling of untouched tables.
        assert!(out.contains("payload varchar(255)"));
    }

    #[test]
    fn test_merge_output_is_deduplicated() {
        let base = parse("Table user {\n id unique\n}").unwrap();
        let generated = base.clone();
        let mut changes = ChangeSet::default();
        // The editor ended up with a duplicate field name.
        changes.new_fields.insert(
            "user".into(),
            vec![Field::new("id", "unique"), Field::new("name", "text")],
        );
        changes.order = vec!["user".into()];

        let out = merge(&base, &generated, &changes, &HashMap::new());
        assert_eq!(out.matches("  id unique").count(), 1);
    }
}
