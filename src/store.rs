//! The authoritative in-memory schema model and its mutations.
//!
//! Every structural mutation regenerates `sql` before returning, so the text
//! never lags the model. The reverse direction only happens through
//! [`SchemaStore::sync_from_sql`].

use chrono::{DateTime, Utc};

use crate::api::wire::{SchemaDocument, SchemaDraft};
use crate::api::{from_document, to_draft};
use crate::model::{Column, ColumnType, Position, References, Relationship, Table, TableColor, TableId};
use crate::sql::{generate_sql, parse_sql};

pub const UNTITLED_SCHEMA: &str = "Untitled Schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Entry of the "open schema" list.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSummary {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&SchemaDocument> for SchemaSummary {
    fn from(doc: &SchemaDocument) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            updated_at: doc.updated_at,
        }
    }
}

/// Partial table edit; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct TableUpdate {
    pub name: Option<String>,
    pub columns: Option<Vec<Column>>,
    pub position: Option<Position>,
    pub color: Option<TableColor>,
}

/// Partial column edit. Optional attributes take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct ColumnUpdate {
    pub name: Option<String>,
    pub typ: Option<ColumnType>,
    pub length: Option<Option<u32>>,
    pub precision: Option<Option<u32>>,
    pub scale: Option<Option<u32>>,
    pub is_primary_key: Option<bool>,
    pub is_foreign_key: Option<bool>,
    pub nullable: Option<Option<bool>>,
    pub unique: Option<Option<bool>>,
    pub auto_increment: Option<Option<bool>>,
    pub default_value: Option<Option<String>>,
    pub comment: Option<Option<String>>,
    pub references: Option<Option<References>>,
}

impl ColumnUpdate {
    fn apply_to(self, column: &mut Column) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut column.name, self.name);
        set(&mut column.typ, self.typ);
        set(&mut column.length, self.length);
        set(&mut column.precision, self.precision);
        set(&mut column.scale, self.scale);
        set(&mut column.is_primary_key, self.is_primary_key);
        set(&mut column.is_foreign_key, self.is_foreign_key);
        set(&mut column.nullable, self.nullable);
        set(&mut column.unique, self.unique);
        set(&mut column.auto_increment, self.auto_increment);
        set(&mut column.default_value, self.default_value);
        set(&mut column.comment, self.comment);
        set(&mut column.references, self.references);
    }
}

#[derive(Debug, Clone)]
pub struct SchemaStore {
    tables: Vec<Table>,
    relationships: Vec<Relationship>,
    sql: String,
    selected_table: Option<TableId>,
    schema_id: Option<String>,
    schema_name: String,
    save_status: SaveStatus,
    available_schemas: Vec<SchemaSummary>,
    /// Bumped on every change that should eventually be persisted.
    revision: u64,
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            relationships: Vec::new(),
            sql: String::new(),
            selected_table: None,
            schema_id: None,
            schema_name: UNTITLED_SCHEMA.to_string(),
            save_status: SaveStatus::Idle,
            available_schemas: Vec::new(),
            revision: 0,
        }
    }
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn selected_table(&self) -> Option<&TableId> {
        self.selected_table.as_ref()
    }

    pub fn schema_id(&self) -> Option<&str> {
        self.schema_id.as_deref()
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save_status
    }

    pub fn available_schemas(&self) -> &[SchemaSummary] {
        &self.available_schemas
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn table(&self, id: &TableId) -> Option<&Table> {
        self.tables.iter().find(|t| &t.id == id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, id: &TableId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| &t.id == id)
    }

    fn regenerate(&mut self) {
        self.sql = generate_sql(&self.tables, &self.relationships);
        self.revision += 1;
    }

    /// Append a table, assigning an id when it has none.
    pub fn add_table(&mut self, mut table: Table) -> TableId {
        if table.id.is_empty() {
            table.id = TableId::generate();
        }
        let id = table.id.clone();
        self.tables.push(table);
        self.regenerate();
        id
    }

    pub fn update_table(&mut self, id: &TableId, update: TableUpdate) {
        let Some(table) = self.table_mut(id) else {
            tracing::debug!(table = %id, "update_table: no such table");
            return;
        };
        let old_name = table.name.clone();
        if let Some(name) = update.name {
            table.name = name;
        }
        if let Some(columns) = update.columns {
            table.columns = columns;
        }
        if let Some(position) = update.position {
            table.position = position;
        }
        if let Some(color) = update.color {
            table.color = color;
        }

        let new_name = table.name.clone();
        if new_name != old_name {
            self.rewrite_references(|target| {
                if target.table == old_name {
                    target.table = new_name.clone();
                }
            });
        }
        self.regenerate();
    }

    pub fn remove_table(&mut self, id: &TableId) {
        let before = self.tables.len();
        self.tables.retain(|t| &t.id != id);
        if self.tables.len() == before {
            tracing::debug!(table = %id, "remove_table: no such table");
            return;
        }
        if self.selected_table.as_ref() == Some(id) {
            self.selected_table = None;
        }
        self.regenerate();
    }

    /// Move a table identified by either its name or its id. Layout only;
    /// the SQL text is unaffected.
    pub fn update_table_position(&mut self, name_or_id: &str, position: Position) {
        let mut moved = false;
        for table in &mut self.tables {
            if table.name == name_or_id || table.id.as_str() == name_or_id {
                table.position = position;
                moved = true;
            }
        }
        if moved {
            self.revision += 1;
        }
    }

    pub fn select_table(&mut self, id: Option<TableId>) {
        self.selected_table = id;
    }

    pub fn add_column(&mut self, table: &TableId, column: Column) {
        let Some(t) = self.table_mut(table) else {
            tracing::debug!(%table, "add_column: no such table");
            return;
        };
        t.columns.push(column);
        self.regenerate();
    }

    /// Patch the column at `index`. Renaming a column also rewrites foreign
    /// keys that point at it.
    pub fn update_column(&mut self, table: &TableId, index: usize, update: ColumnUpdate) {
        let Some(t) = self.table_mut(table) else {
            tracing::debug!(%table, "update_column: no such table");
            return;
        };
        let table_name = t.name.clone();
        let Some(column) = t.columns.get_mut(index) else {
            tracing::debug!(%table, index, "update_column: index out of range");
            return;
        };
        let old_name = column.name.clone();
        update.apply_to(column);

        let new_name = column.name.clone();
        if new_name != old_name {
            self.rewrite_references(|target| {
                if target.table == table_name && target.column == old_name {
                    target.column = new_name.clone();
                }
            });
        }
        self.regenerate();
    }

    pub fn remove_column(&mut self, table: &TableId, index: usize) {
        let Some(t) = self.table_mut(table) else {
            tracing::debug!(%table, "remove_column: no such table");
            return;
        };
        if index >= t.columns.len() {
            tracing::debug!(%table, index, "remove_column: index out of range");
            return;
        }
        t.columns.remove(index);
        self.regenerate();
    }

    fn rewrite_references(&mut self, mut f: impl FnMut(&mut References)) {
        for column in self.tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
            if let Some(target) = column.references.as_mut() {
                f(target);
            }
        }
    }

    pub fn add_relationship(&mut self, rel: Relationship) {
        self.relationships.push(rel);
        self.revision += 1;
    }

    pub fn remove_relationship(&mut self, id: &str) {
        let before = self.relationships.len();
        self.relationships.retain(|r| r.id != id);
        if self.relationships.len() != before {
            self.revision += 1;
        }
    }

    /// Store raw editor text without parsing it.
    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    /// Replace the model with the tables parsed from `sql`. Tables whose name
    /// survives keep their id, position and color; relationships are
    /// replaced by the parsed (empty) set. Each existing table is claimed by
    /// at most one parsed table, so repeated names get fresh ids.
    pub fn sync_from_sql(&mut self, sql: &str) {
        let parsed = parse_sql(sql);
        let mut unclaimed: Vec<&Table> = self.tables.iter().collect();
        let mut tables = Vec::with_capacity(parsed.tables.len());
        for mut table in parsed.tables {
            if let Some(i) = unclaimed.iter().position(|t| t.name == table.name) {
                let existing = unclaimed.remove(i);
                table.id = existing.id.clone();
                table.position = existing.position;
                table.color = existing.color;
            }
            tables.push(table);
        }

        if let Some(selected) = &self.selected_table {
            if !tables.iter().any(|t| &t.id == selected) {
                self.selected_table = None;
            }
        }

        tracing::debug!(tables = tables.len(), "synced model from sql");
        self.tables = tables;
        self.relationships = parsed.relationships;
        self.sql = sql.to_string();
        self.revision += 1;
    }

    /// Start an empty, unsaved schema.
    pub fn new_schema(&mut self, name: Option<&str>) {
        self.tables.clear();
        self.relationships.clear();
        self.sql.clear();
        self.selected_table = None;
        self.schema_id = None;
        self.schema_name = name.unwrap_or(UNTITLED_SCHEMA).to_string();
        self.save_status = SaveStatus::Idle;
        self.revision += 1;
    }

    pub fn set_schema_name(&mut self, name: impl Into<String>) {
        self.schema_name = name.into();
        self.revision += 1;
    }

    pub fn set_save_status(&mut self, status: SaveStatus) {
        self.save_status = status;
    }

    pub fn set_available_schemas(&mut self, schemas: Vec<SchemaSummary>) {
        self.available_schemas = schemas;
    }

    /// Record the identity the backend assigned after a save.
    pub fn mark_saved(&mut self, doc: &SchemaDocument) {
        self.schema_id = Some(doc.id.clone());
        self.schema_name = doc.name.clone();
        self.save_status = SaveStatus::Saved;
    }

    /// Forget the backend identity, e.g. after the schema was deleted.
    pub fn detach(&mut self) {
        self.schema_id = None;
    }

    pub fn to_draft(&self, description: Option<&str>) -> SchemaDraft {
        to_draft(&self.tables, &self.relationships, &self.schema_name, description)
    }

    /// Replace the whole model with a stored document.
    pub fn apply_document(&mut self, doc: &SchemaDocument) {
        let loaded = from_document(doc);
        self.tables = loaded.tables;
        self.relationships = loaded.relationships;
        self.schema_id = Some(loaded.id);
        self.schema_name = loaded.name;
        self.selected_table = None;
        self.save_status = SaveStatus::Idle;
        self.sql = generate_sql(&self.tables, &self.relationships);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cardinality;

    fn users() -> Table {
        Table::new("users").with_columns(vec![
            Column::new("id", ColumnType::Bigint).primary_key(),
            Column::new("email", ColumnType::Varchar),
        ])
    }

    fn posts() -> Table {
        Table::new("posts").with_columns(vec![
            Column::new("id", ColumnType::Bigint).primary_key(),
            Column::new("user_id", ColumnType::Bigint).references("users", "id"),
        ])
    }

    fn assert_in_sync(store: &SchemaStore) {
        assert_eq!(store.sql(), generate_sql(store.tables(), store.relationships()));
    }

    #[test]
    fn test_every_mutation_keeps_sql_in_sync() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        assert_in_sync(&store);
        let posts = store.add_table(posts());
        assert_in_sync(&store);

        store.update_table(&users, TableUpdate { name: Some("members".to_string()), ..Default::default() });
        assert_in_sync(&store);
        store.add_column(&posts, Column::new("title", ColumnType::Text));
        assert_in_sync(&store);
        store.update_column(&posts, 2, ColumnUpdate { typ: Some(ColumnType::Varchar), ..Default::default() });
        assert_in_sync(&store);
        store.remove_column(&posts, 2);
        assert_in_sync(&store);
        store.remove_table(&users);
        assert_in_sync(&store);
        assert!(store.sql().starts_with("CREATE TABLE posts ("));
    }

    #[test]
    fn test_add_table_assigns_missing_id() {
        let mut store = SchemaStore::new();
        let mut table = users();
        table.id = TableId::default();

        let id = store.add_table(table);
        assert!(!id.is_empty());
        assert_eq!(store.tables()[0].id, id);
    }

    #[test]
    fn test_rename_selected_table_keeps_selection() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let posts = store.add_table(posts());
        store.select_table(Some(users.clone()));

        store.update_table(&users, TableUpdate { name: Some("members".to_string()), ..Default::default() });
        let selected = store.selected_table().and_then(|id| store.table(id)).unwrap();
        assert_eq!(selected.name, "members");

        store.update_table(&posts, TableUpdate { name: Some("articles".to_string()), ..Default::default() });
        assert_eq!(store.selected_table(), Some(&users));
    }

    #[test]
    fn test_rename_rewrites_foreign_keys() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        store.add_table(posts());

        store.update_table(&users, TableUpdate { name: Some("members".to_string()), ..Default::default() });
        assert!(store.sql().contains("FOREIGN KEY (user_id) REFERENCES members(id)"));

        store.update_column(&users, 0, ColumnUpdate { name: Some("member_id".to_string()), ..Default::default() });
        assert!(store.sql().contains("FOREIGN KEY (user_id) REFERENCES members(member_id)"));
    }

    #[test]
    fn test_remove_table_selection() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let posts = store.add_table(posts());

        store.select_table(Some(users.clone()));
        store.remove_table(&posts);
        assert_eq!(store.selected_table(), Some(&users));

        store.remove_table(&users);
        assert_eq!(store.selected_table(), None);
    }

    #[test]
    fn test_update_table_position_by_name_or_id() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let sql = store.sql().to_string();

        store.update_table_position("users", Position::new(10.0, 20.0));
        assert_eq!(store.table(&users).unwrap().position, Position::new(10.0, 20.0));

        store.update_table_position(users.as_str(), Position::new(30.0, 40.0));
        assert_eq!(store.table(&users).unwrap().position, Position::new(30.0, 40.0));
        assert_eq!(store.sql(), sql);
    }

    #[test]
    fn test_out_of_range_column_is_ignored() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let revision = store.revision();

        store.remove_column(&users, 9);
        store.update_column(&users, 9, ColumnUpdate::default());
        store.add_column(&TableId::new("missing"), Column::new("x", ColumnType::Text));

        assert_eq!(store.table(&users).unwrap().columns.len(), 2);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_sync_from_sql_preserves_layout() {
        let mut store = SchemaStore::new();
        let mut table = users();
        table.position = Position::new(42.0, 7.0);
        table.color = TableColor::Purple;
        let users = store.add_table(table);

        store.sync_from_sql(
            "CREATE TABLE users (id bigint PRIMARY KEY, email varchar, name text);\nCREATE TABLE tags (id integer);",
        );

        let synced = store.table_by_name("users").unwrap();
        assert_eq!(synced.id, users);
        assert_eq!(synced.position, Position::new(42.0, 7.0));
        assert_eq!(synced.color, TableColor::Purple);
        assert_eq!(synced.columns.len(), 3);

        let tags = store.table_by_name("tags").unwrap();
        assert_eq!(tags.position, Position::new(600.0, 100.0));
        assert_eq!(tags.color, TableColor::Blue);
    }

    #[test]
    fn test_sync_from_sql_repeated_name_gets_own_id() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());

        store.sync_from_sql("CREATE TABLE users (id bigint);\nCREATE TABLE users (id bigint);");

        let ids: Vec<&TableId> = store.tables().iter().map(|t| &t.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], &users);
        assert_ne!(ids[1], &users);

        store.remove_table(&users);
        assert_eq!(store.tables().len(), 1);
    }

    #[test]
    fn test_sync_from_sql_drops_vanished_tables() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let posts = store.add_table(posts());
        store.select_table(Some(posts.clone()));
        store.add_relationship(Relationship::new(users, "id", posts, "user_id"));

        let text = "CREATE TABLE users (id bigint PRIMARY KEY);";
        store.sync_from_sql(text);

        assert_eq!(store.tables().len(), 1);
        assert!(store.relationships().is_empty());
        assert_eq!(store.selected_table(), None);
        assert_eq!(store.sql(), text);
    }

    #[test]
    fn test_set_sql_does_not_parse() {
        let mut store = SchemaStore::new();
        store.add_table(users());

        store.set_sql("CREATE TABLE other (id integer);");
        assert_eq!(store.tables()[0].name, "users");
        assert_eq!(store.sql(), "CREATE TABLE other (id integer);");
    }

    #[test]
    fn test_relationships() {
        let mut store = SchemaStore::new();
        let users = store.add_table(users());
        let posts = store.add_table(posts());
        let mut rel = Relationship::new(users, "id", posts, "user_id");
        rel.kind = Cardinality::OneToOne;
        let rel_id = rel.id.clone();

        store.add_relationship(rel);
        assert_eq!(store.relationships().len(), 1);
        // relationships are not rendered as SQL
        assert_in_sync(&store);

        store.remove_relationship("unknown");
        assert_eq!(store.relationships().len(), 1);
        store.remove_relationship(&rel_id);
        assert!(store.relationships().is_empty());
    }

    #[test]
    fn test_new_schema_resets() {
        let mut store = SchemaStore::new();
        store.add_table(users());
        store.set_save_status(SaveStatus::Error);

        store.new_schema(None);
        assert!(store.tables().is_empty());
        assert_eq!(store.sql(), "");
        assert_eq!(store.schema_name(), UNTITLED_SCHEMA);
        assert_eq!(store.schema_id(), None);
        assert_eq!(store.save_status(), SaveStatus::Idle);

        store.new_schema(Some("Inventory"));
        assert_eq!(store.schema_name(), "Inventory");
    }

    #[test]
    fn test_apply_document_regenerates_sql() {
        let mut source = SchemaStore::new();
        source.add_table(users());
        source.add_table(posts());
        source.set_schema_name("Blog");
        let draft = source.to_draft(None);
        let doc = SchemaDocument {
            id: "abc".to_string(),
            name: draft.name,
            description: None,
            tables: draft.tables,
            relationships: draft.relationships,
            indexes: draft.indexes,
            is_public: false,
            user_id: None,
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut store = SchemaStore::new();
        store.set_save_status(SaveStatus::Error);
        store.apply_document(&doc);

        assert_eq!(store.schema_id(), Some("abc"));
        assert_eq!(store.schema_name(), "Blog");
        assert_eq!(store.save_status(), SaveStatus::Idle);
        assert_eq!(store.sql(), source.sql());
    }
}
