use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub refs: Vec<Ref>,
    pub groups: Vec<TableGroup>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub note: Option<String>,
    pub fields: Vec<Field>,
}

impl Table {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// A field declaration. `constraints` holds the bracket-list entries with
/// any `Note:` entry hoisted into `note`; an inline ref entry stays in the
/// list and is exposed through [`Field::inline_ref`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            note: None,
            constraints: Vec::new(),
        }
    }

    /// Target of an inline `ref: > table.field` constraint entry, if any.
    pub fn inline_ref(&self) -> Option<RefEnd> {
        for entry in &self.constraints {
            let Some(rest) = entry.strip_prefix("ref:") else {
                continue;
            };
            let rest = rest.trim().trim_start_matches(['>', '<', '-']).trim_start();
            let (table, field) = rest.split_once('.')?;
            return Some(RefEnd {
                table: table.trim().trim_matches('"').to_string(),
                field: field.trim().to_string(),
            });
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ref {
    pub from: RefEnd,
    pub op: RefOp,
    pub to: RefEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefEnd {
    pub table: String,
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefOp {
    ManyToOne, // >
    OneToMany, // <
    OneToOne,  // -
}

impl RefOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefOp::ManyToOne => ">",
            RefOp::OneToMany => "<",
            RefOp::OneToOne => "-",
        }
    }
}

/// Presentation-only cluster of tables. Carries no referential constraints
/// beyond "members should exist", which the merger enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub name: String,
    pub color: Option<String>,
    pub members: Vec<GroupMember>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub table: String,
    pub comment: Option<String>,
}

/// Pending additions not yet committed into a base schema. `order` is the
/// explicit display order across both maps; serialization never iterates
/// the maps directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub new_tables: HashMap<String, Vec<Field>>,
    pub new_fields: HashMap<String, Vec<Field>>,
    pub table_descriptions: HashMap<String, String>,
    pub order: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty() && self.new_fields.is_empty()
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.new_tables.contains_key(name) || self.new_fields.contains_key(name)
    }
}

/// Accumulated old-name -> new-name history, reset when a changeset is
/// committed into a new base schema.
pub type RenameMap = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_ref_extraction() {
        let mut f = Field::new("user_id", "int");
        f.constraints.push("ref: > user.id".into());
        let end = f.inline_ref().unwrap();
        assert_eq!(end.table, "user");
        assert_eq!(end.field, "id");
    }

    #[test]
    fn test_inline_ref_quoted_table() {
        let mut f = Field::new("owner_id", "int");
        f.constraints.push("ref: > \"app user\".id".into());
        assert_eq!(f.inline_ref().unwrap().table, "app user");
    }

    #[test]
    fn test_no_inline_ref() {
        let mut f = Field::new("id", "unique");
        f.constraints.push("pk".into());
        assert!(f.inline_ref().is_none());
    }
}
