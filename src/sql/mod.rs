//! Conversion between the table model and SQL DDL text.

mod generator;
mod lexer;
mod parser;
mod types;

pub use generator::generate_sql;
pub use parser::{parse_sql, ParsedSql, LAYOUT_ROW_Y, LAYOUT_STEP_X};
