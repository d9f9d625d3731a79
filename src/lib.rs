pub mod ast;
pub mod dedup;
pub mod diff;
pub mod edit;
pub mod lexer;
pub mod merge;
pub mod parser;
pub mod serializer;
pub mod types;

use wasm_bindgen::prelude::*;

use edit::{EditSession, FieldProp, Section};

pub use ast::{ChangeSet, Field, Ref, RenameMap, Schema, Table, TableGroup};
pub use diff::diff;
pub use merge::{merge, MergeWarning};
pub use parser::{parse, ParseError};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Validate schema text without keeping the result. Text-generation
/// output is untrusted and must pass through here (or a session
/// constructor) before anything downstream sees it.
#[wasm_bindgen(js_name = "checkSchema")]
pub fn check_schema(source: &str) -> Result<(), String> {
    parser::parse(source).map(|_| ()).map_err(|e| e.to_string())
}

/// Remove duplicate field and ref declarations from schema text.
#[wasm_bindgen(js_name = "dedupSchema")]
pub fn dedup_schema(source: &str) -> String {
    dedup::dedup(source)
}

/// One schema editing session held behind the wasm boundary. The UI drives
/// it through the edit methods and reads the pending changeset as JSON.
#[wasm_bindgen]
pub struct Session {
    inner: EditSession,
}

#[wasm_bindgen]
impl Session {
    #[wasm_bindgen(constructor)]
    pub fn new(base: &str, generated: &str) -> Result<Session, String> {
        let inner = EditSession::new(base, generated).map_err(|e| e.to_string())?;
        Ok(Session { inner })
    }

    #[wasm_bindgen(js_name = "changesJson")]
    pub fn changes_json(&self) -> Result<String, String> {
        serde_json::to_string(&self.inner.changes).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "renameTable")]
    pub fn rename_table(&mut self, old: &str, new_name: &str) -> Result<(), String> {
        self.inner.rename_table(old, new_name).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "addTable")]
    pub fn add_table(&mut self, name: &str) -> Result<(), String> {
        self.inner.add_table(name).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deleteTable")]
    pub fn delete_table(&mut self, name: &str) {
        self.inner.delete_table(name);
    }

    #[wasm_bindgen(js_name = "addField")]
    pub fn add_field(&mut self, table: &str, section: &str) -> Result<(), String> {
        let section = Section::from_str(section)
            .ok_or_else(|| format!("unknown section: {}", section))?;
        self.inner.add_field(table, section);
        Ok(())
    }

    #[wasm_bindgen(js_name = "editField")]
    pub fn edit_field(
        &mut self,
        table: &str,
        index: usize,
        prop: &str,
        value: &str,
    ) -> Result<(), String> {
        let prop =
            FieldProp::from_str(prop).ok_or_else(|| format!("unknown property: {}", prop))?;
        self.inner
            .edit_field(table, index, prop, value)
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deleteField")]
    pub fn delete_field(
        &mut self,
        table: &str,
        index: usize,
        section: &str,
    ) -> Result<(), String> {
        let section = Section::from_str(section)
            .ok_or_else(|| format!("unknown section: {}", section))?;
        self.inner
            .delete_field(table, index, section)
            .map_err(|e| e.to_string())
    }

    /// Render the merged schema text for the current state.
    pub fn merge(&self) -> String {
        self.inner.merge()
    }

    /// Apply the pending changes as the new base schema.
    pub fn commit(&mut self) -> Result<(), String> {
        self.inner.commit().map_err(|e| e.to_string())
    }
}
