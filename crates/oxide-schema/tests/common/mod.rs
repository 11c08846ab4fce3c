//! In-memory connection that understands the DDL the MySQL dialect emits.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream;
use oxide_schema::{
    ColumnMetadata, Connection, ConstraintKind, DataType, DefaultValue, Engine, Error,
    IndexMetadata, MySqlDialect, Position, Result, Row, RowStream, TableDescriptor, TableMetadata,
};
use regex::Regex;

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, TableMetadata>,
    statements: Vec<String>,
    fetches: Vec<String>,
    results: HashMap<String, Vec<Row>>,
    fail_on: Option<String>,
    introspections: usize,
    last_insert_id: u64,
}

/// A fake MySQL server holding table structures in memory.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    state: Mutex<State>,
}

impl MemoryConnection {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert_table(&self, metadata: TableMetadata) {
        self.lock().tables.insert(metadata.name.clone(), metadata);
    }

    pub fn table(&self, name: &str) -> Option<TableMetadata> {
        self.lock().tables.get(name).cloned()
    }

    pub fn column_names(&self, name: &str) -> Vec<String> {
        self.table(name)
            .map(|t| t.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default()
    }

    /// Statements passed to `execute`, failed ones included.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.lock().statements.clear();
    }

    /// Queries passed to `fetch`.
    pub fn fetches(&self) -> Vec<String> {
        self.lock().fetches.clone()
    }

    pub fn introspections(&self) -> usize {
        self.lock().introspections
    }

    /// Rows returned when exactly `sql` is fetched.
    pub fn script(&self, sql: &str, rows: Vec<Row>) {
        self.lock().results.insert(sql.to_owned(), rows);
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_on(&self, pattern: &str) {
        self.lock().fail_on = Some(pattern.to_owned());
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.lock();
        state.statements.push(sql.to_owned());
        if let Some(pattern) = &state.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(Error::driver(Some(sql), "simulated failure"));
            }
        }
        let upper = sql.trim_start().to_uppercase();
        let outcome = if upper.starts_with("CREATE TABLE") {
            state.create_table(sql).map(|()| 0)
        } else if upper.starts_with("ALTER TABLE") {
            state.alter_table(sql).map(|()| 0)
        } else if upper.starts_with("DROP TABLE") {
            state.drop_table(sql).map(|()| 0)
        } else if upper.starts_with("INSERT") {
            state.last_insert_id += 1;
            Ok(1)
        } else {
            Ok(1)
        };
        outcome.map_err(|message| Error::driver(Some(sql), message))
    }

    fn fetch(&self, sql: &str) -> RowStream {
        let mut state = self.lock();
        state.fetches.push(sql.to_owned());
        let rows = state.results.get(sql).cloned().unwrap_or_default();
        Box::pin(stream::iter(rows.into_iter().map(Ok)))
    }

    fn last_insert_id(&self) -> u64 {
        self.lock().last_insert_id
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().tables.contains_key(name))
    }

    async fn introspect_table(&self, name: &str) -> Result<TableMetadata> {
        let mut state = self.lock();
        state.introspections += 1;
        state
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("table", name))
    }
}

type Applied = std::result::Result<(), String>;

impl State {
    fn create_table(&mut self, sql: &str) -> Applied {
        let rest = sql.trim()["CREATE TABLE".len()..].trim();
        let parts = tokens(rest);
        let name = ident(&parts[0]);
        if self.tables.contains_key(&name) {
            return Err(format!("Table '{name}' already exists"));
        }
        if parts.get(1).is_some_and(|t| t.eq_ignore_ascii_case("LIKE")) {
            let source = ident(&parts[2]);
            let mut copy = self
                .tables
                .get(&source)
                .cloned()
                .ok_or_else(|| format!("Table '{source}' doesn't exist"))?;
            copy.name = name.clone();
            self.tables.insert(name, copy);
            return Ok(());
        }

        let body = parts.get(1).ok_or("missing table body")?;
        let mut table = TableMetadata {
            name: name.clone(),
            columns: Vec::new(),
            indexes: Vec::new(),
        };
        for definition in split_top_level(unwrap_parens(body)) {
            let words = tokens(&definition);
            if is_constraint(&words) {
                add_constraint(&mut table, &words)?;
            } else {
                let (column, primary, _) = parse_column(&words)?;
                add_column(&mut table, column, primary, &Position::Unspecified)?;
            }
        }
        self.tables.insert(name, table);
        Ok(())
    }

    fn alter_table(&mut self, sql: &str) -> Applied {
        let rest = sql.trim()["ALTER TABLE".len()..].trim();
        let (name, fragments) = split_name(rest)?;
        let mut table = self
            .tables
            .get(&name)
            .cloned()
            .ok_or_else(|| format!("Table '{name}' doesn't exist"))?;

        // MySQL drops keys before adding new ones within one ALTER.
        let (drops, others): (Vec<String>, Vec<String>) = split_top_level(fragments)
            .into_iter()
            .partition(|f| {
                let upper = f.to_uppercase();
                upper.starts_with("DROP PRIMARY") || upper.starts_with("DROP INDEX")
            });

        for fragment in drops.into_iter().chain(others) {
            let words = tokens(&fragment);
            let upper: Vec<String> = words.iter().map(|w| w.to_uppercase()).collect();
            match upper.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                ["ADD", "COLUMN", ..] => {
                    let (column, primary, position) = parse_column(&words[2..])?;
                    add_column(&mut table, column, primary, &position)?;
                }
                ["ADD", ..] => add_constraint(&mut table, &words[1..])?,
                ["CHANGE", "COLUMN", ..] => {
                    let old = ident(&words[2]);
                    let (column, primary, position) = parse_column(&words[3..])?;
                    change_column(&mut table, &old, column, primary, &position)?;
                }
                ["DROP", "COLUMN", _] => drop_column(&mut table, &ident(&words[2]))?,
                ["DROP", "PRIMARY", "KEY"] => drop_index(&mut table, "PRIMARY")?,
                ["DROP", "INDEX", _] => drop_index(&mut table, &ident(&words[2]))?,
                _ => return Err(format!("unsupported ALTER fragment: {fragment}")),
            }
        }

        // ALTER TABLE is all or nothing.
        self.tables.insert(name, table);
        Ok(())
    }

    fn drop_table(&mut self, sql: &str) -> Applied {
        let rest = sql.trim()["DROP TABLE".len()..].trim();
        let name = ident(rest);
        self.tables
            .remove(&name)
            .map(|_| ())
            .ok_or_else(|| format!("Unknown table '{name}'"))
    }
}

fn is_constraint(words: &[String]) -> bool {
    let first = words.first().map(|w| w.to_uppercase()).unwrap_or_default();
    matches!(first.as_str(), "PRIMARY" | "UNIQUE" | "INDEX")
}

fn add_constraint(table: &mut TableMetadata, words: &[String]) -> Applied {
    let upper: Vec<String> = words.iter().map(|w| w.to_uppercase()).collect();
    let index = match upper.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["PRIMARY", "KEY", _] => index("PRIMARY", ConstraintKind::Primary, true, &words[2]),
        ["UNIQUE", "INDEX", _, _] => {
            index(&ident(&words[2]), ConstraintKind::Index, true, &words[3])
        }
        ["INDEX", _, _] => index(&ident(&words[1]), ConstraintKind::Index, false, &words[2]),
        _ => return Err(format!("unsupported constraint: {}", words.join(" "))),
    };
    for field in &index.field_names {
        if !table.columns.iter().any(|c| &c.name == field) {
            return Err(format!("Key column '{field}' doesn't exist in table"));
        }
    }
    push_index(table, index)
}

fn index(name: &str, kind: ConstraintKind, unique: bool, columns: &str) -> IndexMetadata {
    IndexMetadata {
        name: name.to_owned(),
        kind,
        unique,
        field_names: split_top_level(unwrap_parens(columns))
            .iter()
            .map(|c| ident(c))
            .collect(),
        index_type: "BTREE".into(),
    }
}

fn push_index(table: &mut TableMetadata, index: IndexMetadata) -> Applied {
    if table.indexes.iter().any(|i| i.name == index.name) {
        return Err(match index.kind {
            ConstraintKind::Primary => "Multiple primary key defined".to_string(),
            ConstraintKind::Index => format!("Duplicate key name '{}'", index.name),
        });
    }
    table.indexes.push(index);
    Ok(())
}

fn drop_index(table: &mut TableMetadata, name: &str) -> Applied {
    let before = table.indexes.len();
    table.indexes.retain(|i| i.name != name);
    if table.indexes.len() == before {
        return Err(format!("Can't DROP '{name}'; check that column/key exists"));
    }
    Ok(())
}

fn column_index(table: &TableMetadata, name: &str) -> std::result::Result<usize, String> {
    table
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| format!("Unknown column '{name}'"))
}

fn insert_at(
    table: &mut TableMetadata,
    column: ColumnMetadata,
    fallback: usize,
    position: &Position,
) -> Applied {
    let at = match position {
        Position::Unspecified => fallback,
        Position::First => 0,
        Position::After(name) => column_index(table, name)? + 1,
    };
    table.columns.insert(at, column);
    Ok(())
}

fn add_column(
    table: &mut TableMetadata,
    column: ColumnMetadata,
    primary: bool,
    position: &Position,
) -> Applied {
    if table.columns.iter().any(|c| c.name == column.name) {
        return Err(format!("Duplicate column name '{}'", column.name));
    }
    let name = column.name.clone();
    let end = table.columns.len();
    insert_at(table, column, end, position)?;
    if primary {
        push_index(table, index("PRIMARY", ConstraintKind::Primary, true, &format!("(`{name}`)")))?;
    }
    Ok(())
}

fn change_column(
    table: &mut TableMetadata,
    old: &str,
    column: ColumnMetadata,
    primary: bool,
    position: &Position,
) -> Applied {
    let at = column_index(table, old)?;
    if column.name != old && table.columns.iter().any(|c| c.name == column.name) {
        return Err(format!("Duplicate column name '{}'", column.name));
    }
    let name = column.name.clone();
    table.columns.remove(at);
    for index in &mut table.indexes {
        for field in &mut index.field_names {
            if field == old {
                field.clone_from(&name);
            }
        }
    }
    insert_at(table, column, at, position)?;
    if primary {
        push_index(table, index("PRIMARY", ConstraintKind::Primary, true, &format!("(`{name}`)")))?;
    }
    Ok(())
}

fn drop_column(table: &mut TableMetadata, name: &str) -> Applied {
    let at = column_index(table, name)?;
    if table.columns.len() == 1 {
        return Err("You can't delete all columns with ALTER TABLE; use DROP TABLE instead".into());
    }
    table.columns.remove(at);
    for index in &mut table.indexes {
        index.field_names.retain(|f| f != name);
    }
    table.indexes.retain(|i| !i.field_names.is_empty());
    Ok(())
}

/// Parses `name TYPE [UNSIGNED] NULL|NOT NULL [DEFAULT v] [AUTO_INCREMENT]
/// [PRIMARY KEY] [FIRST|AFTER x]`.
fn parse_column(words: &[String]) -> std::result::Result<(ColumnMetadata, bool, Position), String> {
    let name = ident(words.first().ok_or("missing column name")?);
    let column_type = words.get(1).ok_or("missing column type")?.to_uppercase();
    let pattern = Regex::new(r"^([A-Z]+)(?:\((\d+)\))?$").unwrap();
    let captures = pattern
        .captures(&column_type)
        .ok_or_else(|| format!("bad column type {column_type}"))?;
    let width: Option<u64> = captures.get(2).map(|m| m.as_str().parse().unwrap());
    let (data_type, length) = match (&captures[1], width) {
        ("TINYINT", Some(1)) => (DataType::Boolean, None),
        ("TINYINT", _) => (DataType::Int, Some(1)),
        ("SMALLINT", _) => (DataType::Int, Some(2)),
        ("MEDIUMINT", _) => (DataType::Int, Some(3)),
        ("INT", _) => (DataType::Int, Some(4)),
        ("BIGINT", _) => (DataType::Int, Some(8)),
        ("VARCHAR", Some(n)) => (DataType::Text, Some(n)),
        ("TINYTEXT", _) => (DataType::Text, Some(255)),
        ("TEXT", _) => (DataType::Text, Some(65_535)),
        ("MEDIUMTEXT", _) => (DataType::Text, Some(16_777_215)),
        ("LONGTEXT", _) => (DataType::Text, Some(4_294_967_295)),
        ("DATETIME", _) => (DataType::DateTime, None),
        _ => return Err(format!("unsupported column type {column_type}")),
    };

    let mut column = ColumnMetadata {
        name,
        data_type,
        length,
        signed: true,
        default: None,
        nullable: true,
        auto_increment: false,
    };
    let mut primary = false;
    let mut position = Position::Unspecified;

    let mut rest = words[2..].iter();
    while let Some(word) = rest.next() {
        match word.to_uppercase().as_str() {
            "UNSIGNED" => column.signed = false,
            "NOT" => {
                rest.next();
                column.nullable = false;
            }
            "NULL" => column.nullable = true,
            "DEFAULT" => {
                let value = rest.next().ok_or("missing default value")?;
                column.default = parse_default(value, data_type);
            }
            "AUTO_INCREMENT" => column.auto_increment = true,
            "PRIMARY" => {
                rest.next();
                primary = true;
            }
            "FIRST" => position = Position::First,
            "AFTER" => {
                position = Position::After(ident(rest.next().ok_or("missing AFTER column")?));
            }
            other => return Err(format!("unexpected token {other}")),
        }
    }
    if primary {
        column.nullable = false;
    }
    Ok((column, primary, position))
}

/// Mirrors how information_schema reports defaults.
fn parse_default(value: &str, data_type: DataType) -> Option<DefaultValue> {
    if value.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if let Some(text) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return Some(DefaultValue::Text(text.replace("''", "'")));
    }
    let number = match value.to_uppercase().as_str() {
        "TRUE" => Some(1),
        "FALSE" => Some(0),
        other => other.parse::<i64>().ok(),
    };
    Some(match (data_type, number) {
        (DataType::Boolean, Some(n)) => DefaultValue::Bool(n != 0),
        (_, Some(n)) => DefaultValue::Integer(n),
        (_, None) => DefaultValue::Expression(value.to_owned()),
    })
}

/// Splits on whitespace, keeping quoted and parenthesized runs whole.
fn tokens(input: &str) -> Vec<String> {
    split_outside(input, char::is_whitespace)
}

/// Splits on commas that are not quoted or parenthesized.
fn split_top_level(input: &str) -> Vec<String> {
    split_outside(input, |c| c == ',')
}

fn split_outside(input: &str, is_separator: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '`' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            c if depth == 0 && is_separator(c) => {
                let part = current.trim().to_owned();
                if !part.is_empty() {
                    parts.push(part);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let part = current.trim().to_owned();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

fn unwrap_parens(input: &str) -> &str {
    input
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(input)
}

fn ident(token: &str) -> String {
    token
        .trim()
        .trim_start_matches('`')
        .trim_end_matches('`')
        .replace("``", "`")
}

fn split_name(rest: &str) -> std::result::Result<(String, &str), String> {
    let inner = rest.strip_prefix('`').ok_or("expected a quoted table name")?;
    let end = inner.find('`').ok_or("unterminated table name")?;
    Ok((inner[..end].to_owned(), &inner[end + 1..]))
}

// ==================== Fixtures ====================

pub fn engine(connection: &Arc<MemoryConnection>) -> Engine {
    Engine::from_shared(connection.clone(), Arc::new(MySqlDialect::new()))
}

/// Creates `widgets (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
/// label VARCHAR(100) NOT NULL)` and returns it freshly loaded.
pub async fn create_widgets(engine: &Engine) -> TableDescriptor {
    let mut widgets = engine.schema().create_table("widgets").await.unwrap();
    let _ = widgets.big_int("id").unsigned().auto_increment().primary_key();
    let _ = widgets.varchar("label", 100).not_nullable();
    widgets.save().await.unwrap()
}
