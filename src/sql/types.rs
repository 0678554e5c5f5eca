//! SQL type name to column type mapping.

use crate::model::ColumnType;

/// A column type as read from DDL, with its arguments split out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlType {
    pub typ: ColumnType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Set for the SERIAL family, which implies an auto-incrementing integer.
    pub auto_increment: bool,
}

impl SqlType {
    fn plain(typ: ColumnType) -> Self {
        Self {
            typ,
            length: None,
            precision: None,
            scale: None,
            auto_increment: false,
        }
    }
}

/// Map a type name (possibly several words, any case) and its numeric
/// arguments to a column type. Unknown names fall back to varchar.
pub fn map_type(name: &str, args: &[u32]) -> SqlType {
    let lower = name.to_ascii_lowercase();
    let typ = match lookup(&lower) {
        Some(typ) => typ,
        None => {
            let first = lower.split_whitespace().next().unwrap_or_default();
            match lookup(first) {
                Some(typ) => typ,
                None => {
                    tracing::debug!(sql_type = %name, "unknown column type, using varchar");
                    return SqlType::plain(ColumnType::Varchar);
                }
            }
        }
    };

    let mut sql_type = SqlType::plain(typ);
    sql_type.auto_increment = lower.ends_with("serial");
    match typ {
        ColumnType::Varchar => sql_type.length = args.first().copied(),
        ColumnType::Decimal => {
            sql_type.precision = args.first().copied();
            sql_type.scale = args.get(1).copied();
        }
        _ => {}
    }
    sql_type
}

/// Whether `word` opens a type this module recognizes.
pub fn is_type_name(word: &str) -> bool {
    lookup(&word.to_ascii_lowercase()).is_some()
}

fn lookup(name: &str) -> Option<ColumnType> {
    let typ = match name {
        "int" | "integer" | "int4" | "smallint" | "int2" | "mediumint" | "tinyint" | "serial"
        | "smallserial" => ColumnType::Integer,
        "bigint" | "int8" | "bigserial" => ColumnType::Bigint,
        "varchar" | "character varying" | "char" | "character" | "nvarchar" | "string" => {
            ColumnType::Varchar
        }
        "text" | "longtext" | "mediumtext" | "tinytext" | "clob" => ColumnType::Text,
        "boolean" | "bool" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "timestamp" | "timestamptz" | "datetime" | "timestamp with time zone"
        | "timestamp without time zone" => ColumnType::Timestamp,
        "decimal" | "numeric" | "money" => ColumnType::Decimal,
        "json" | "jsonb" => ColumnType::Json,
        "uuid" | "uniqueidentifier" => ColumnType::Uuid,
        "float" | "real" | "float4" => ColumnType::Float,
        "double" | "double precision" | "float8" => ColumnType::Double,
        _ => return None,
    };
    Some(typ)
}

/// Render a column type back to DDL, arguments included.
pub fn render_type(typ: ColumnType, length: Option<u32>, precision: Option<u32>, scale: Option<u32>) -> String {
    match (typ, length, precision, scale) {
        (ColumnType::Varchar, Some(len), _, _) => format!("varchar({})", len),
        (ColumnType::Decimal, _, Some(p), Some(s)) => format!("decimal({},{})", p, s),
        (ColumnType::Decimal, _, Some(p), None) => format!("decimal({})", p),
        _ => typ.as_str().to_string(),
    }
}
