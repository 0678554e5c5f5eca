//! Conversion between the editor model and backend documents.

use super::wire::{
    ColumnDoc, ForeignKeyDoc, ReferentialAction, RelationshipDoc,
    RelationshipKind, SchemaDocument, SchemaDraft, TableDoc,
};
use crate::model::{
    Cardinality, Column, ColumnType, References, Relationship, Table, TableColor, TableId,
};

/// Tables and relationships recovered from a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSchema {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
}

pub fn to_draft(
    tables: &[Table],
    relationships: &[Relationship],
    name: &str,
    description: Option<&str>,
) -> SchemaDraft {
    SchemaDraft {
        name: name.to_string(),
        description: description.map(str::to_string),
        tables: tables.iter().map(table_doc).collect(),
        relationships: relationships.iter().map(relationship_doc).collect(),
        indexes: Vec::new(),
        is_public: false,
    }
}

fn table_doc(table: &Table) -> TableDoc {
    let id = if table.id.is_empty() {
        format!("table_{}", table.name)
    } else {
        table.id.to_string()
    };

    TableDoc {
        id,
        name: table.name.clone(),
        position: table.position,
        color: table.color.as_str().to_string(),
        columns: table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| column_doc(&table.name, idx, column))
            .collect(),
        comment: None,
    }
}

fn column_doc(table: &str, idx: usize, column: &Column) -> ColumnDoc {
    let pk = column.is_primary_key;
    let foreign_key = match (&column.references, column.is_foreign_key) {
        (Some(target), true) => Some(ForeignKeyDoc {
            table: target.table.clone(),
            column: target.column.clone(),
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Cascade,
        }),
        _ => None,
    };

    ColumnDoc {
        id: format!("col_{}_{}_{}", table, column.name, idx),
        name: column.name.clone(),
        typ: column.typ,
        length: column.length,
        precision: column.precision,
        scale: column.scale,
        nullable: column.nullable.unwrap_or(!pk),
        primary_key: pk,
        unique: column.unique.unwrap_or(pk),
        auto_increment: column
            .auto_increment
            .unwrap_or(pk && column.typ == ColumnType::Bigint),
        default_value: column.default_value.clone(),
        foreign_key,
        index: false,
        comment: column.comment.clone(),
    }
}

fn relationship_doc(rel: &Relationship) -> RelationshipDoc {
    let kind = match rel.kind {
        Cardinality::OneToOne => RelationshipKind::OneToOne,
        Cardinality::OneToMany => RelationshipKind::OneToMany,
        Cardinality::ManyToMany => RelationshipKind::ManyToMany,
    };
    let handle = |h: &str| if h.is_empty() { "id".to_string() } else { h.to_string() };

    RelationshipDoc {
        id: rel.id.clone(),
        kind,
        from_table: rel.source.to_string(),
        from_column: handle(&rel.source_handle),
        to_table: rel.target.to_string(),
        to_column: handle(&rel.target_handle),
        label: None,
    }
}

pub fn from_document(doc: &SchemaDocument) -> LoadedSchema {
    let tables = doc
        .tables
        .iter()
        .map(|t| Table {
            id: if t.id.is_empty() {
                TableId::generate()
            } else {
                TableId::new(t.id.clone())
            },
            name: t.name.clone(),
            columns: t.columns.iter().map(column_from_doc).collect(),
            position: t.position,
            color: TableColor::from_str(&t.color).unwrap_or_default(),
        })
        .collect();

    let relationships = doc
        .relationships
        .iter()
        .map(|r| Relationship {
            id: r.id.clone(),
            source: TableId::new(r.from_table.clone()),
            target: TableId::new(r.to_table.clone()),
            source_handle: r.from_column.clone(),
            target_handle: r.to_column.clone(),
            kind: match r.kind {
                RelationshipKind::OneToOne => Cardinality::OneToOne,
                RelationshipKind::OneToMany => Cardinality::OneToMany,
                RelationshipKind::ManyToMany => Cardinality::ManyToMany,
            },
        })
        .collect();

    LoadedSchema {
        id: doc.id.clone(),
        name: doc.name.clone(),
        description: doc.description.clone(),
        tables,
        relationships,
    }
}

fn column_from_doc(doc: &ColumnDoc) -> Column {
    Column {
        name: doc.name.clone(),
        typ: doc.typ,
        length: doc.length,
        precision: doc.precision,
        scale: doc.scale,
        is_primary_key: doc.primary_key,
        is_foreign_key: doc.foreign_key.is_some(),
        nullable: Some(doc.nullable),
        unique: Some(doc.unique),
        auto_increment: Some(doc.auto_increment),
        default_value: doc.default_value.clone().filter(|v| !v.is_empty()),
        comment: doc.comment.clone().filter(|c| !c.is_empty()),
        references: doc.foreign_key.as_ref().map(|fk| References {
            table: fk.table.clone(),
            column: fk.column.clone(),
        }),
    }
}
