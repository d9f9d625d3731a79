//! Structural comparison of two parsed schemas into a pending [`ChangeSet`].

use crate::ast::{ChangeSet, Schema};

/// Compare `proposed` against `base` and collect what is new.
///
/// Field identity is the field *name* only: a field whose type or
/// constraints changed but whose name did not is never reported, so type
/// normalization passes cannot masquerade as schema changes. The result is
/// independent of field declaration order within a table.
pub fn diff(base: &Schema, proposed: &Schema) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for table in &proposed.tables {
        match base.table(&table.name) {
            None => {
                changes
                    .new_tables
                    .insert(table.name.clone(), table.fields.clone());
                changes.order.push(table.name.clone());
                if let Some(note) = &table.note {
                    changes
                        .table_descriptions
                        .insert(table.name.clone(), note.clone());
                }
            }
            Some(existing) => {
                let added: Vec<_> = table
                    .fields
                    .iter()
                    .filter(|f| !existing.has_field(&f.name))
                    .cloned()
                    .collect();
                if !added.is_empty() {
                    changes.new_fields.insert(table.name.clone(), added);
                    changes.order.push(table.name.clone());
                    if let Some(note) = &table.note {
                        changes
                            .table_descriptions
                            .insert(table.name.clone(), note.clone());
                    }
                }
            }
        }
    }

    changes
}
