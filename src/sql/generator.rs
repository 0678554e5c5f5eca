//! DDL generation from the table model.

use super::types::render_type;
use crate::model::{Column, Relationship, Table};

/// Render every table as a `CREATE TABLE` block, in iteration order.
///
/// Relationships are accepted for symmetry with [`super::parse_sql`] but are
/// not rendered; foreign keys come from column metadata only.
pub fn generate_sql(tables: &[Table], _relationships: &[Relationship]) -> String {
    let mut sql = String::new();

    for table in tables {
        sql.push_str(&format!("CREATE TABLE {} (\n", table.name));

        let mut lines: Vec<String> = table.columns.iter().map(column_line).collect();
        lines.extend(table.columns.iter().filter_map(foreign_key_line));

        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n);\n\n");
    }

    sql
}

fn column_line(column: &Column) -> String {
    let typ = render_type(column.typ, column.length, column.precision, column.scale);
    let mut line = format!("  {} {}", column.name, typ);
    if column.is_primary_key {
        line.push_str(" PRIMARY KEY");
    }
    line
}

fn foreign_key_line(column: &Column) -> Option<String> {
    if !column.is_foreign_key {
        return None;
    }
    let target = column.references.as_ref()?;
    Some(format!(
        "  FOREIGN KEY ({}) REFERENCES {}({})",
        column.name, target.table, target.column
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;
    use crate::sql::parse_sql;

    fn blog() -> Vec<Table> {
        vec![
            Table::new("users").with_columns(vec![
                Column::new("id", ColumnType::Bigint).primary_key(),
                Column::new("email", ColumnType::Varchar),
            ]),
            Table::new("posts").with_columns(vec![
                Column::new("id", ColumnType::Bigint).primary_key(),
                Column::new("user_id", ColumnType::Bigint).references("users", "id"),
                Column::new("title", ColumnType::Varchar),
            ]),
        ]
    }

    #[test]
    fn test_generate_template() {
        let sql = generate_sql(&blog()[..1], &[]);

        assert_eq!(
            sql,
            "CREATE TABLE users (\n  id bigint PRIMARY KEY,\n  email varchar\n);\n\n"
        );
    }

    #[test]
    fn test_generate_foreign_key_line() {
        let sql = generate_sql(&blog(), &[]);
        let posts = &sql[sql.find("CREATE TABLE posts").unwrap()..];

        assert!(posts.contains("  title varchar,\n  FOREIGN KEY (user_id) REFERENCES users(id)\n);"));
    }

    #[test]
    fn test_generate_skips_dangling_foreign_key() {
        let mut column = Column::new("owner_id", ColumnType::Bigint);
        column.is_foreign_key = true;
        let sql = generate_sql(&[Table::new("pets").with_columns(vec![column])], &[]);

        assert!(!sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_generate_empty() {
        assert_eq!(generate_sql(&[], &[]), "");
    }

    #[test]
    fn test_round_trip_is_stable() {
        let mut tables = blog();
        let mut price = Column::new("price", ColumnType::Decimal);
        price.precision = Some(10);
        price.scale = Some(2);
        let mut sku = Column::new("sku", ColumnType::Varchar);
        sku.length = Some(32);
        tables.push(Table::new("items").with_columns(vec![price, sku]));

        let first = generate_sql(&tables, &[]);
        let second = generate_sql(&parse_sql(&first).tables, &[]);

        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_keyword_column_names() {
        for name in ["key", "index", "check", "on", "default", "unique", "table", "primary", "serial"] {
            let tables = vec![
                Table::new("settings").with_columns(vec![
                    Column::new("id", ColumnType::Bigint).primary_key(),
                    Column::new(name, ColumnType::Text),
                ]),
                Table::new("overrides").with_columns(vec![
                    Column::new(name, ColumnType::Varchar).references("settings", "id"),
                ]),
            ];

            let first = generate_sql(&tables, &[]);
            let parsed = parse_sql(&first);
            assert_eq!(parsed.tables[0].columns.len(), 2, "column `{name}` was dropped");
            assert_eq!(generate_sql(&parsed.tables, &[]), first, "column `{name}`");
        }
    }
}
