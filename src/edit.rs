//! In-memory edit operations over a pending changeset. All state for one
//! editing session lives in [`EditSession`]; nothing is ambient.

use std::collections::HashSet;

use crate::ast::{ChangeSet, Field, RenameMap, Schema};
use crate::diff::diff;
use crate::merge;
use crate::parser::{parse, ParseError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("table {0} already exists")]
    TableAlreadyExists(String),
    #[error("renaming to {0} would collide with an existing table")]
    DuplicateTableNameAfterRename(String),
    #[error("table {0} is not part of the changeset")]
    UnknownTable(String),
    #[error("field index {index} out of range for table {table}")]
    FieldIndexOutOfRange { table: String, index: usize },
}

/// Which half of the changeset a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    NewTables,
    NewFields,
}

impl Section {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_tables" => Some(Self::NewTables),
            "new_fields" => Some(Self::NewFields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProp {
    Name,
    Type,
    Description,
}

impl FieldProp {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "type" => Some(Self::Type),
            "description" => Some(Self::Description),
            _ => None,
        }
    }
}

/// One editing session: the base schema, the generated proposal, the
/// pending changeset and the accumulated rename history, threaded through
/// every operation as a single value.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub base: Schema,
    pub generated: Schema,
    pub changes: ChangeSet,
    pub renames: RenameMap,
}

impl EditSession {
    /// Parse both texts and diff them into a fresh changeset. Either input
    /// failing validation aborts the whole session.
    pub fn new(base_text: &str, generated_text: &str) -> Result<Self, ParseError> {
        let base = parse(base_text)?;
        let generated = parse(generated_text)?;
        Ok(Self::from_parts(base, generated))
    }

    pub fn from_parts(base: Schema, generated: Schema) -> Self {
        let changes = diff(&base, &generated);
        Self {
            base,
            generated,
            changes,
            renames: RenameMap::new(),
        }
    }

    /// Table names currently visible to the user: changeset entries plus
    /// base tables the changeset does not manage.
    fn visible_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self
            .changes
            .new_tables
            .keys()
            .chain(self.changes.new_fields.keys())
            .cloned()
            .collect();
        for table in &self.base.tables {
            if !self.renames.contains_key(&table.name) && !names.contains(&table.name) {
                names.insert(table.name.clone());
            }
        }
        names
    }

    /// Rename a changeset table, keeping the rename history so the merger
    /// can retarget foreign-key-typed fields and refs. A collision with any
    /// visible table name is rejected, never silently overwritten.
    pub fn rename_table(&mut self, old: &str, new: &str) -> Result<(), EditError> {
        if old == new {
            return Ok(());
        }
        if !self.changes.contains_table(old) {
            return Err(EditError::UnknownTable(old.to_string()));
        }
        if self.visible_names().contains(new) {
            return Err(EditError::DuplicateTableNameAfterRename(new.to_string()));
        }

        if let Some(fields) = self.changes.new_tables.remove(old) {
            self.changes.new_tables.insert(new.to_string(), fields);
        }
        if let Some(fields) = self.changes.new_fields.remove(old) {
            self.changes.new_fields.insert(new.to_string(), fields);
        }
        if let Some(desc) = self.changes.table_descriptions.remove(old) {
            self.changes.table_descriptions.insert(new.to_string(), desc);
        }

        // Collapse chains: a->b followed by b->c is stored as a->c.
        if let Some(entry) = self.renames.values_mut().find(|v| v.as_str() == old) {
            *entry = new.to_string();
        } else {
            self.renames.insert(old.to_string(), new.to_string());
        }

        for slot in &mut self.changes.order {
            if slot == old {
                *slot = new.to_string();
            }
        }
        Ok(())
    }

    /// Add a fresh table to the changeset, seeded with an identifier field.
    pub fn add_table(&mut self, name: &str) -> Result<(), EditError> {
        if self.visible_names().contains(name) {
            return Err(EditError::TableAlreadyExists(name.to_string()));
        }
        let mut id = Field::new("id", "unique");
        id.constraints.push("pk".to_string());
        self.changes.new_tables.insert(name.to_string(), vec![id]);
        self.changes.order.push(name.to_string());
        Ok(())
    }

    pub fn delete_table(&mut self, name: &str) {
        self.changes.new_tables.remove(name);
        self.changes.new_fields.remove(name);
        self.changes.table_descriptions.remove(name);
        self.changes.order.retain(|n| n != name);
    }

    /// Append a placeholder field to the named table in the given section.
    pub fn add_field(&mut self, table: &str, section: Section) {
        let map = match section {
            Section::NewTables => &mut self.changes.new_tables,
            Section::NewFields => &mut self.changes.new_fields,
        };
        map.entry(table.to_string())
            .or_default()
            .push(Field::new("new_field", "text"));
        if !self.changes.order.iter().any(|n| n == table) {
            self.changes.order.push(table.to_string());
        }
    }

    pub fn edit_field(
        &mut self,
        table: &str,
        index: usize,
        prop: FieldProp,
        value: &str,
    ) -> Result<(), EditError> {
        let fields = self
            .changes
            .new_tables
            .get_mut(table)
            .or_else(|| self.changes.new_fields.get_mut(table))
            .ok_or_else(|| EditError::UnknownTable(table.to_string()))?;
        let field = fields
            .get_mut(index)
            .ok_or_else(|| EditError::FieldIndexOutOfRange {
                table: table.to_string(),
                index,
            })?;
        match prop {
            FieldProp::Name => field.name = value.to_string(),
            FieldProp::Type => field.typ = value.to_string(),
            FieldProp::Description => {
                field.note = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
        }
        Ok(())
    }

    /// Remove a field; a table whose last pending field goes away leaves
    /// the changeset entirely, since an empty entry is not a valid change.
    pub fn delete_field(
        &mut self,
        table: &str,
        index: usize,
        section: Section,
    ) -> Result<(), EditError> {
        let map = match section {
            Section::NewTables => &mut self.changes.new_tables,
            Section::NewFields => &mut self.changes.new_fields,
        };
        let fields = map
            .get_mut(table)
            .ok_or_else(|| EditError::UnknownTable(table.to_string()))?;
        if index >= fields.len() {
            return Err(EditError::FieldIndexOutOfRange {
                table: table.to_string(),
                index,
            });
        }
        fields.remove(index);
        if fields.is_empty() {
            map.remove(table);
            if !self.changes.contains_table(table) {
                self.changes.table_descriptions.remove(table);
                self.changes.order.retain(|n| n != table);
            }
        }
        Ok(())
    }

    /// Render the merged schema text for the current session state.
    pub fn merge(&self) -> String {
        merge::merge(&self.base, &self.generated, &self.changes, &self.renames)
    }

    /// Apply the pending changes: the merge output becomes the new base and
    /// generated schema, and the changeset and rename history start over.
    pub fn commit(&mut self) -> Result<(), ParseError> {
        let merged = parse(&self.merge())?;
        self.base = merged.clone();
        self.generated = merged;
        self.changes = ChangeSet::default();
        self.renames = RenameMap::new();
        Ok(())
    }
}
