//! Recursive-descent reader for CREATE TABLE statements.
//!
//! The reader is forgiving: anything it does not understand is
//! skipped up to the next item or statement boundary, and it never fails.

use serde::Serialize;

use super::lexer::{Lexer, Token};
use super::types::{is_type_name, map_type};
use crate::model::{Column, ColumnType, Position, References, Relationship, Table, TableColor, TableId};

/// Horizontal step and fixed row used to lay out freshly parsed tables.
pub const LAYOUT_STEP_X: f64 = 300.0;
pub const LAYOUT_ROW_Y: f64 = 100.0;

/// Result of reading a DDL document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedSql {
    pub tables: Vec<Table>,
    /// Foreign keys are recovered as column metadata only, so this is
    /// always empty.
    pub relationships: Vec<Relationship>,
}

/// Parse DDL text into tables. Text without any CREATE TABLE block yields no
/// tables.
pub fn parse_sql(input: &str) -> ParsedSql {
    let (tokens, words) = Lexer::new(input).tokenize_words().into_iter().unzip();
    let mut parser = Parser {
        tokens,
        words,
        pos: 0,
    };
    let mut tables = parser.parse();

    for (i, table) in tables.iter_mut().enumerate() {
        table.position = Position::new(LAYOUT_STEP_X * (i + 1) as f64, LAYOUT_ROW_Y);
    }

    tracing::debug!(tables = tables.len(), "parsed sql");
    ParsedSql {
        tables,
        relationships: Vec::new(),
    }
}

struct ForeignKeyClause {
    columns: Vec<String>,
    target: String,
    target_columns: Vec<String>,
}

struct Parser {
    tokens: Vec<Token>,
    /// Source spelling of bare-word tokens, parallel to `tokens`.
    words: Vec<Option<String>>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Consume `token` if it is next.
    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        match self.current() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// An identifier, or a keyword standing where a name is expected.
    fn name(&mut self) -> Option<String> {
        let name = match self.current() {
            Token::Ident(name) => name.clone(),
            _ => self.words.get(self.pos).cloned().flatten()?,
        };
        self.advance();
        Some(name)
    }

    /// A body item is a column when it starts with an identifier, or with a
    /// keyword used as a name and followed by a type (`key text`,
    /// `index integer`). `KEY idx (...)` and `UNIQUE (...)` stay table-level.
    fn starts_column(&self) -> bool {
        match self.current() {
            Token::Ident(_) => true,
            _ if self.words.get(self.pos).is_some_and(Option::is_some) => {
                match self.tokens.get(self.pos + 1) {
                    Some(Token::Serial(_)) => true,
                    Some(Token::Ident(word)) => is_type_name(word),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn parse(&mut self) -> Vec<Table> {
        let mut tables = Vec::new();

        while self.current() != &Token::Eof {
            if !self.eat(&Token::Create) {
                self.advance();
                continue;
            }

            // CREATE [TEMPORARY | UNLOGGED | ...] TABLE
            while matches!(self.current(), Token::Ident(_)) {
                self.advance();
            }
            if !self.eat(&Token::Table) {
                self.skip_statement();
                continue;
            }
            if let Some(table) = self.parse_create_table() {
                tables.push(table);
            }
        }

        tables
    }

    fn parse_create_table(&mut self) -> Option<Table> {
        if self.eat(&Token::If) {
            self.eat(&Token::Not);
            self.eat(&Token::Exists);
        }

        let Some(mut name) = self.name() else {
            self.skip_statement();
            return None;
        };
        // schema.table keeps the table part
        if self.eat(&Token::Dot) {
            match self.name() {
                Some(table) => name = table,
                None => {
                    self.skip_statement();
                    return None;
                }
            }
        }

        if !self.eat(&Token::LParen) {
            self.skip_statement();
            return None;
        }

        let mut columns: Vec<Column> = Vec::new();
        let mut primary_keys: Vec<String> = Vec::new();
        let mut foreign_keys: Vec<ForeignKeyClause> = Vec::new();

        loop {
            if self.starts_column() {
                if let Some(column) = self.parse_column() {
                    columns.push(column);
                }
                continue;
            }
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Comma => self.advance(),
                Token::Constraint => {
                    self.advance();
                    self.ident();
                }
                Token::Primary => {
                    self.advance();
                    if self.eat(&Token::Key) {
                        primary_keys.extend(self.parse_name_list());
                    }
                    self.skip_item();
                }
                Token::Foreign => {
                    if let Some(fk) = self.parse_foreign_key() {
                        foreign_keys.push(fk);
                    }
                    self.skip_item();
                }
                // UNIQUE (...), INDEX, KEY, CHECK (...) and anything else
                _ => self.skip_item(),
            }
        }

        // Table options such as ENGINE=InnoDB
        self.skip_statement();

        for column in &mut columns {
            if primary_keys.contains(&column.name) {
                column.is_primary_key = true;
            }
        }
        for fk in foreign_keys {
            for (source, target_column) in fk.columns.iter().zip(fk.target_columns.iter()) {
                match columns.iter_mut().find(|c| &c.name == source) {
                    Some(column) => {
                        column.is_foreign_key = true;
                        column.references = Some(References {
                            table: fk.target.clone(),
                            column: target_column.clone(),
                        });
                    }
                    None => {
                        tracing::debug!(table = %name, column = %source, "foreign key names unknown column");
                    }
                }
            }
        }

        Some(Table {
            id: TableId::generate(),
            name,
            columns,
            position: Position::default(),
            color: TableColor::default(),
        })
    }

    fn parse_column(&mut self) -> Option<Column> {
        let name = self.name()?;

        let mut words: Vec<String> = Vec::new();
        loop {
            match self.current() {
                Token::Ident(word) | Token::Serial(word) => {
                    words.push(word.clone());
                    self.advance();
                }
                _ => break,
            }
        }
        let mut args = Vec::new();
        if !words.is_empty() && self.current() == &Token::LParen {
            args = self.parse_type_args();
        }

        let sql_type = if words.is_empty() {
            tracing::debug!(column = %name, "column without type, using varchar");
            map_type(ColumnType::Varchar.as_str(), &[])
        } else {
            map_type(&words.join(" "), &args)
        };

        let mut column = Column {
            name,
            typ: sql_type.typ,
            length: sql_type.length,
            precision: sql_type.precision,
            scale: sql_type.scale,
            auto_increment: sql_type.auto_increment.then_some(true),
            ..Default::default()
        };

        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.is_primary_key = true;
                }
                Token::Not => {
                    self.advance();
                    if self.eat(&Token::Null) {
                        column.nullable = Some(false);
                    }
                }
                Token::Null => {
                    self.advance();
                    column.nullable = Some(true);
                }
                Token::Unique => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.unique = Some(true);
                }
                Token::AutoIncrement => {
                    self.advance();
                    column.auto_increment = Some(true);
                }
                Token::Default => {
                    self.advance();
                    column.default_value = self.parse_default_value();
                }
                Token::References => {
                    self.advance();
                    column.is_foreign_key = true;
                    if let Some((table, target_column)) = self.parse_reference() {
                        column.references = Some(References {
                            table,
                            column: target_column,
                        });
                    }
                }
                Token::Constraint => {
                    self.advance();
                    self.ident();
                }
                Token::LParen => self.skip_parenthesized(),
                // CHECK, ON DELETE ..., COLLATE ..., and other noise
                _ => self.advance(),
            }
        }

        Some(column)
    }

    /// `( 10 , 2 )` after a type name. Non-numeric arguments are ignored.
    fn parse_type_args(&mut self) -> Vec<u32> {
        let mut args = Vec::new();
        self.advance();
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Num(n) => {
                    if let Ok(value) = n.parse::<u32>() {
                        args.push(value);
                    }
                    self.advance();
                }
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
        args
    }

    fn parse_default_value(&mut self) -> Option<String> {
        let value = match self.current() {
            Token::Str(s) | Token::Num(s) => s.clone(),
            Token::Null => "NULL".to_string(),
            Token::Ident(word) => {
                let mut value = word.clone();
                self.advance();
                if self.current() == &Token::LParen {
                    value.push_str(&self.collect_parenthesized());
                }
                return Some(value);
            }
            Token::LParen => return Some(self.collect_parenthesized()),
            _ => return None,
        };
        self.advance();
        Some(value)
    }

    /// Render a parenthesized expression back to text, e.g. `(now())`.
    fn collect_parenthesized(&mut self) -> String {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let piece = match self.current() {
                Token::LParen => {
                    depth += 1;
                    "(".to_string()
                }
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    ")".to_string()
                }
                Token::Comma => ", ".to_string(),
                Token::Ident(s) | Token::Num(s) => s.clone(),
                Token::Str(s) => format!("'{}'", s.replace('\'', "''")),
                Token::Null => "NULL".to_string(),
                Token::Eof => break,
                _ => String::new(),
            };
            text.push_str(&piece);
            self.advance();
            if depth == 0 {
                break;
            }
        }
        text
    }

    /// `table(column)` or `schema.table(column)` after REFERENCES. The
    /// column defaults to `id` when omitted.
    fn parse_reference(&mut self) -> Option<(String, String)> {
        let mut table = self.name()?;
        if self.eat(&Token::Dot) {
            if let Some(name) = self.name() {
                table = name;
            }
        }
        let column = self
            .parse_name_list()
            .into_iter()
            .next()
            .unwrap_or_else(|| "id".to_string());
        Some((table, column))
    }

    fn parse_foreign_key(&mut self) -> Option<ForeignKeyClause> {
        self.advance();
        if !self.eat(&Token::Key) {
            return None;
        }
        let columns = self.parse_name_list();
        if !self.eat(&Token::References) {
            return None;
        }
        let mut target = self.name()?;
        if self.eat(&Token::Dot) {
            if let Some(name) = self.name() {
                target = name;
            }
        }
        let mut target_columns = self.parse_name_list();
        if target_columns.is_empty() {
            target_columns.push("id".to_string());
        }
        Some(ForeignKeyClause {
            columns,
            target,
            target_columns,
        })
    }

    /// `(a, b, c)`; empty when no list follows.
    fn parse_name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        if !self.eat(&Token::LParen) {
            return names;
        }
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Comma => self.advance(),
                _ => match self.name() {
                    Some(name) => names.push(name),
                    None => self.advance(),
                },
            }
        }
        names
    }

    fn skip_parenthesized(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Eof => return,
                _ => {}
            }
            self.advance();
            if depth == 0 {
                return;
            }
        }
    }

    /// Skip to the comma or closing parenthesis ending the current body item.
    fn skip_item(&mut self) {
        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => return,
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        self.eat(&Token::Semicolon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_users_example() {
        let parsed = parse_sql("CREATE TABLE users (id bigint PRIMARY KEY, email varchar);");

        assert_eq!(parsed.tables.len(), 1);
        let users = &parsed.tables[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.columns.len(), 2);
        assert!(users.columns[0].is_primary_key);
        assert!(!users.columns[1].is_primary_key);
        assert!(users.columns.iter().all(|c| !c.is_foreign_key));
        assert!(parsed.relationships.is_empty());
    }

    #[test]
    fn test_parse_without_tables_is_empty() {
        assert!(parse_sql("").tables.is_empty());
        assert!(parse_sql("SELECT * FROM users;").tables.is_empty());
        assert!(parse_sql("CREATE INDEX idx ON users (email);").tables.is_empty());
        assert!(parse_sql("CREATE TABLE ;").tables.is_empty());
    }

    #[test]
    fn test_parse_inline_reference() {
        let parsed = parse_sql("create table posts (id bigint primary key, user_id bigint references users(id) on delete cascade);");
        let user_id = &parsed.tables[0].columns[1];

        assert!(user_id.is_foreign_key);
        assert_eq!(
            user_id.references,
            Some(References {
                table: "users".to_string(),
                column: "id".to_string()
            })
        );
    }

    #[test]
    fn test_parse_merges_standalone_foreign_key() {
        let sql = r#"
            CREATE TABLE posts (
              id bigint PRIMARY KEY,
              user_id bigint,
              FOREIGN KEY (user_id) REFERENCES users(id)
            );
        "#;
        let posts = &parse_sql(sql).tables[0];

        assert_eq!(posts.columns.len(), 2);
        assert!(posts.columns[1].is_foreign_key);
        assert_eq!(posts.columns[1].references.as_ref().unwrap().table, "users");
    }

    #[test]
    fn test_parse_nested_type_arguments() {
        let posts = &parse_sql("CREATE TABLE items (price decimal(10,2) NOT NULL, name VARCHAR(80) UNIQUE);").tables[0];

        assert_eq!(posts.columns.len(), 2);
        assert_eq!(posts.columns[0].typ, ColumnType::Decimal);
        assert_eq!(posts.columns[0].precision, Some(10));
        assert_eq!(posts.columns[0].scale, Some(2));
        assert_eq!(posts.columns[0].nullable, Some(false));
        assert_eq!(posts.columns[1].length, Some(80));
        assert_eq!(posts.columns[1].unique, Some(true));
    }

    #[test]
    fn test_parse_table_level_primary_key_and_constraints() {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS public.memberships (
              user_id bigint,
              group_id bigint,
              role text DEFAULT 'member',
              created_at timestamp DEFAULT now(),
              CONSTRAINT pk_memberships PRIMARY KEY (user_id, group_id),
              UNIQUE (role),
              CHECK (role <> '')
            ) ENGINE=InnoDB;
        "#;
        let table = &parse_sql(sql).tables[0];

        assert_eq!(table.name, "memberships");
        assert_eq!(table.columns.len(), 4);
        assert!(table.columns[0].is_primary_key);
        assert!(table.columns[1].is_primary_key);
        assert!(!table.columns[2].is_primary_key);
        assert_eq!(table.columns[2].default_value.as_deref(), Some("member"));
        assert_eq!(table.columns[3].default_value.as_deref(), Some("now()"));
    }

    #[test]
    fn test_parse_auto_layout() {
        let sql = "CREATE TABLE a (id integer);\nCREATE TABLE b (id integer);\nCREATE TABLE c (id integer);";
        let parsed = parse_sql(sql);

        let xs: Vec<f64> = parsed.tables.iter().map(|t| t.position.x).collect();
        assert_eq!(xs, vec![300.0, 600.0, 900.0]);
        assert!(parsed.tables.iter().all(|t| t.position.y == 100.0));
        assert!(parsed.tables.iter().all(|t| t.color == TableColor::Blue));
    }

    #[test]
    fn test_parse_truncated_block_keeps_read_columns() {
        let parsed = parse_sql("CREATE TABLE users (id bigint PRIMARY KEY, email");

        assert_eq!(parsed.tables.len(), 1);
        assert_eq!(parsed.tables[0].columns.len(), 2);
        assert_eq!(parsed.tables[0].columns[1].typ, ColumnType::Varchar);
    }

    #[test]
    fn test_parse_keyword_named_columns() {
        let sql = r#"
            CREATE TABLE settings (
              key varchar(64) PRIMARY KEY,
              Index integer,
              check boolean,
              default text,
              owner bigint,
              KEY idx_owner (owner),
              UNIQUE (default),
              FOREIGN KEY (owner) REFERENCES table(key)
            );
        "#;
        let table = &parse_sql(sql).tables[0];

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["key", "Index", "check", "default", "owner"]);
        assert!(table.columns[0].is_primary_key);
        assert_eq!(table.columns[0].length, Some(64));
        assert_eq!(table.columns[2].typ, ColumnType::Boolean);
        assert_eq!(
            table.columns[4].references,
            Some(References {
                table: "table".to_string(),
                column: "key".to_string()
            })
        );
    }

    #[test]
    fn test_parse_serial_column() {
        let table = &parse_sql("CREATE TABLE t (id SERIAL PRIMARY KEY);").tables[0];

        assert_eq!(table.columns[0].typ, ColumnType::Integer);
        assert_eq!(table.columns[0].auto_increment, Some(true));
        assert!(table.columns[0].is_primary_key);
    }
}
