//! Raw type spellings to canonical type mapping, and foreign-key type
//! inference from field naming conventions.

use std::collections::HashSet;

/// The five canonical type categories every raw spelling normalizes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Text,
    Number,
    YesNo,
    Date,
    Unique,
}

impl PrimitiveType {
    pub fn spelling(&self) -> &'static str {
        match self {
            PrimitiveType::Text => "text",
            PrimitiveType::Number => "number",
            PrimitiveType::YesNo => "yesno",
            PrimitiveType::Date => "date",
            PrimitiveType::Unique => "unique",
        }
    }
}

/// Map a raw type spelling to its canonical category. Case-insensitive;
/// parenthesized arguments are ignored. Unrecognized spellings map to
/// `Text` by policy: an unknown type renders as free text rather than
/// failing the whole schema.
pub fn canonicalize(raw: &str) -> PrimitiveType {
    let lower = raw.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match base {
        "unique" | "uuid" | "guid" => PrimitiveType::Unique,

        "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" | "serial"
        | "bigserial" | "number" | "numeric" | "decimal" | "float" | "double" | "real"
        | "money" => PrimitiveType::Number,

        "bool" | "boolean" | "yesno" | "bit" => PrimitiveType::YesNo,

        "date" | "datetime" | "timestamp" | "timestamptz" | "time" | "year" => {
            PrimitiveType::Date
        }

        _ => PrimitiveType::Text,
    }
}

/// Canonicalize a field's type, honoring the identifier convention: a field
/// named `id` or ending in `_id` is always `Unique`, whatever its spelling,
/// because this grammar uses `unique` for both primary and foreign keys
/// once relation inference fails.
pub fn canonicalize_field(field_name: &str, raw: &str) -> PrimitiveType {
    if field_name == "id" || field_name.ends_with("_id") {
        PrimitiveType::Unique
    } else {
        canonicalize(raw)
    }
}

/// Decide the serialized type of a field: either a table name (a relation)
/// or a canonical primitive spelling.
///
/// Precedence, highest first:
/// 1. an explicit inline ref target captured during parsing;
/// 2. exact match of the field name minus its `_id` suffix against a table;
/// 3. pluralization-normalized match of the same stem;
/// 4. suffix match for compound names (`billing_user_id` matches `user`
///    when no table named `billing_user` exists).
///
/// When nothing matches, the field keeps its current type (canonicalized);
/// a non-match is treated as a non-relational field rather than a guessed
/// foreign key.
pub fn infer_relation_type(
    field_name: &str,
    current_type: &str,
    inline_target: Option<&str>,
    tables: &HashSet<String>,
) -> String {
    infer_relation(field_name, current_type, inline_target, tables).0
}

/// Like [`infer_relation_type`], but also reports whether inference was
/// abandoned because several tables matched the same stem. On ambiguity
/// the field keeps its current (canonicalized) type.
pub fn infer_relation(
    field_name: &str,
    current_type: &str,
    inline_target: Option<&str>,
    tables: &HashSet<String>,
) -> (String, bool) {
    if let Some(target) = inline_target {
        return (target.to_string(), false);
    }

    let fallback = canonicalize_field(field_name, current_type)
        .spelling()
        .to_string();

    // Only `_id`-suffixed names carry a relation hint; `id` itself is the
    // table's own identifier.
    if let Some(stem) = field_name.strip_suffix("_id").filter(|s| !s.is_empty()) {
        if tables.contains(stem) {
            return (stem.to_string(), false);
        }
        match plural_candidates(stem, tables).as_slice() {
            [only] => return (only.clone(), false),
            [] => {}
            _ => return (fallback, true),
        }

        // Compound names: try progressively shorter trailing segments.
        let parts: Vec<&str> = stem.split('_').collect();
        for start in 1..parts.len() {
            let candidate = parts[start..].join("_");
            if tables.contains(&candidate) {
                return (candidate, false);
            }
            match plural_candidates(&candidate, tables).as_slice() {
                [only] => return (only.clone(), false),
                [] => {}
                _ => return (fallback, true),
            }
        }
    }

    (fallback, false)
}

/// Tables whose singular form matches the stem's, sorted for determinism.
fn plural_candidates(name: &str, tables: &HashSet<String>) -> Vec<String> {
    let singular = singularize(name);
    let mut candidates: Vec<String> = tables
        .iter()
        .filter(|t| singularize(t) == singular)
        .cloned()
        .collect();
    candidates.sort();
    candidates
}

/// Best-effort English singularization, enough for table-naming conventions.
fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            return format!("{}{}", stem, &suffix[..suffix.len() - 2]);
        }
    }
    if name.ends_with('s') && !name.ends_with("ss") {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonicalize_families() {
        assert_eq!(canonicalize("VARCHAR(255)"), PrimitiveType::Text);
        assert_eq!(canonicalize("bigint"), PrimitiveType::Number);
        assert_eq!(canonicalize("decimal(10,2)"), PrimitiveType::Number);
        assert_eq!(canonicalize("Boolean"), PrimitiveType::YesNo);
        assert_eq!(canonicalize("timestamptz"), PrimitiveType::Date);
        assert_eq!(canonicalize("unique"), PrimitiveType::Unique);
    }

    #[test]
    fn test_unknown_spelling_defaults_to_text() {
        assert_eq!(canonicalize("geometry"), PrimitiveType::Text);
        assert_eq!(canonicalize(""), PrimitiveType::Text);
    }

    #[test]
    fn test_id_fields_are_always_unique() {
        assert_eq!(canonicalize_field("id", "int"), PrimitiveType::Unique);
        assert_eq!(canonicalize_field("user_id", "varchar"), PrimitiveType::Unique);
        assert_eq!(canonicalize_field("count", "int"), PrimitiveType::Number);
    }

    #[test]
    fn test_inline_ref_wins() {
        let t = tables(&["user", "account"]);
        assert_eq!(
            infer_relation_type("user_id", "int", Some("account"), &t),
            "account"
        );
    }

    #[test]
    fn test_exact_match() {
        let t = tables(&["order", "user"]);
        assert_eq!(infer_relation_type("order_id", "unique", None, &t), "order");
    }

    #[test]
    fn test_plural_match() {
        let t = tables(&["users", "categories"]);
        assert_eq!(infer_relation_type("user_id", "int", None, &t), "users");
        assert_eq!(infer_relation_type("category_id", "int", None, &t), "categories");
    }

    #[test]
    fn test_compound_suffix_match() {
        let t = tables(&["user"]);
        assert_eq!(infer_relation_type("billing_user_id", "int", None, &t), "user");
    }

    #[test]
    fn test_compound_prefers_longest_prefix() {
        let t = tables(&["billing_user", "user"]);
        assert_eq!(
            infer_relation_type("billing_user_id", "int", None, &t),
            "billing_user"
        );
    }

    #[test]
    fn test_no_match_keeps_current_type() {
        let t = tables(&["user"]);
        // `_id` field with no matching table stays unique, not a relation.
        assert_eq!(infer_relation_type("session_id", "int", None, &t), "unique");
        // Non-id field keeps its canonical primitive.
        assert_eq!(infer_relation_type("total", "decimal(10,2)", None, &t), "number");
    }

    #[test]
    fn test_ambiguous_plural_match_falls_back() {
        // An exact stem match short-circuits before plural matching.
        let t = tables(&["item", "items"]);
        let (typ, ambiguous) = infer_relation("item_id", "int", None, &t);
        assert_eq!(typ, "item");
        assert!(!ambiguous);

        // Two tables singularize to the same stem; inference must not guess.
        let t = tables(&["entries", "entrys"]);
        let (typ, ambiguous) = infer_relation("entry_id", "int", None, &t);
        assert_eq!(typ, "unique");
        assert!(ambiguous);
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("address"), "address");
    }
}
