pub mod api;
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod debounce;
#[cfg(not(target_arch = "wasm32"))]
pub mod editor;
pub mod model;
pub mod sql;
pub mod store;

use serde::Deserialize;
use wasm_bindgen::prelude::*;

use model::{Relationship, Table};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

#[derive(Deserialize)]
struct GenerateInput {
    tables: Vec<Table>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

/// Render `{"tables": [...], "relationships": [...]}` as CREATE TABLE text
#[wasm_bindgen(js_name = "generateSql")]
pub fn generate_sql_json(model: &str) -> Result<String, String> {
    let input: GenerateInput = serde_json::from_str(model).map_err(|e| e.to_string())?;
    Ok(sql::generate_sql(&input.tables, &input.relationships))
}

/// Parse SQL DDL into `{"tables": [...], "relationships": []}`
#[wasm_bindgen(js_name = "parseSql")]
pub fn parse_sql_json(source: &str) -> Result<String, String> {
    let parsed = sql::parse_sql(source);
    serde_json::to_string(&parsed).map_err(|e| e.to_string())
}
