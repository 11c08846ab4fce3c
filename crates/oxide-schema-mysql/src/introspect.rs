//! Maps `information_schema` rows to table metadata.

use oxide_schema::{
    ColumnMetadata, ConstraintKind, DataType, DefaultValue, Error, IndexMetadata, Result,
    PRIMARY_KEY_NAME,
};

/// Columns of a table in physical order.
pub(crate) const COLUMNS_QUERY: &str = "SELECT \
        CAST(COLUMN_NAME AS CHAR), \
        CAST(DATA_TYPE AS CHAR), \
        CAST(COLUMN_TYPE AS CHAR), \
        CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED), \
        CAST(COLUMN_DEFAULT AS CHAR), \
        CAST(IS_NULLABLE AS CHAR), \
        CAST(EXTRA AS CHAR) \
    FROM information_schema.COLUMNS \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
    ORDER BY ORDINAL_POSITION";

/// Index parts of a table, grouped by index and in sequence order.
pub(crate) const INDEXES_QUERY: &str = "SELECT \
        CAST(INDEX_NAME AS CHAR), \
        CAST(COLUMN_NAME AS CHAR), \
        CAST(NON_UNIQUE AS SIGNED), \
        CAST(INDEX_TYPE AS CHAR) \
    FROM information_schema.STATISTICS \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
    ORDER BY INDEX_NAME = 'PRIMARY' DESC, INDEX_NAME, SEQ_IN_INDEX";

pub(crate) const TABLE_EXISTS_QUERY: &str = "SELECT CAST(COUNT(*) AS SIGNED) \
    FROM information_schema.TABLES \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

/// One row of [`COLUMNS_QUERY`].
pub(crate) type ColumnRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    String,
    String,
);

/// One row of [`INDEXES_QUERY`].
pub(crate) type IndexRow = (String, String, i64, String);

/// Maps a `DATA_TYPE`/`COLUMN_TYPE` pair to a data type and length.
///
/// `tinyint(1)` is a boolean; every other integer carries its width in
/// bytes; text types carry their maximum length.
pub(crate) fn column_type(
    table: &str,
    column: &str,
    data_type: &str,
    column_type: &str,
    max_length: Option<i64>,
) -> Result<(DataType, Option<u64>)> {
    let column_type = column_type.to_ascii_lowercase();
    if column_type.starts_with("tinyint(1)") {
        return Ok((DataType::Boolean, None));
    }
    let mapped = match data_type.to_ascii_lowercase().as_str() {
        "tinyint" => (DataType::Int, Some(1)),
        "smallint" => (DataType::Int, Some(2)),
        "mediumint" => (DataType::Int, Some(3)),
        "int" | "integer" => (DataType::Int, Some(4)),
        "bigint" => (DataType::Int, Some(8)),
        "varchar" => (
            DataType::Text,
            max_length.and_then(|n| u64::try_from(n).ok()),
        ),
        "tinytext" => (DataType::Text, Some(255)),
        "text" => (DataType::Text, Some(65_535)),
        "mediumtext" => (DataType::Text, Some(16_777_215)),
        "longtext" => (DataType::Text, Some(4_294_967_295)),
        "datetime" => (DataType::DateTime, None),
        other => {
            return Err(Error::InvariantViolation(format!(
                "column '{column}' of table '{table}' has unsupported type '{other}'"
            )))
        }
    };
    Ok(mapped)
}

/// Maps a `COLUMN_DEFAULT` value to a typed default.
///
/// MySQL 8 reports text defaults as the bare value (`it's`). MariaDB 10.2.7
/// and later report a quoted SQL literal (`'it''s'`) and the string `NULL`
/// for a NULL default; the quotes are stripped and `''` collapsed.
pub(crate) fn column_default(data_type: DataType, raw: Option<&str>) -> Option<DefaultValue> {
    let raw = raw?;
    if raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"));
    match data_type {
        DataType::Boolean => match raw.to_ascii_uppercase().as_str() {
            "1" | "TRUE" => Some(DefaultValue::Bool(true)),
            "0" | "FALSE" => Some(DefaultValue::Bool(false)),
            _ => Some(DefaultValue::Expression(raw.to_owned())),
        },
        DataType::Int => raw.parse().map_or_else(
            |_| Some(DefaultValue::Expression(raw.to_owned())),
            |n| Some(DefaultValue::Integer(n)),
        ),
        DataType::DateTime if is_expression(raw) => Some(DefaultValue::Expression(raw.to_owned())),
        DataType::DateTime | DataType::Text => {
            Some(DefaultValue::Text(unquoted.unwrap_or_else(|| raw.to_owned())))
        }
    }
}

fn is_expression(raw: &str) -> bool {
    let upper = raw.to_ascii_uppercase();
    upper.starts_with("CURRENT_TIMESTAMP") || upper.starts_with("NOW(")
}

/// Builds column metadata from one `information_schema.COLUMNS` row.
pub(crate) fn column(table: &str, row: ColumnRow) -> Result<ColumnMetadata> {
    let (name, data_type, full_type, max_length, default, nullable, extra) = row;
    let (data_type, length) = column_type(table, &name, &data_type, &full_type, max_length)?;
    let default = column_default(data_type, default.as_deref());
    Ok(ColumnMetadata {
        signed: !full_type.to_ascii_lowercase().contains("unsigned"),
        nullable: nullable.eq_ignore_ascii_case("YES"),
        auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
        name,
        data_type,
        length,
        default,
    })
}

/// Groups `information_schema.STATISTICS` rows into one entry per index.
pub(crate) fn indexes(rows: Vec<IndexRow>) -> Vec<IndexMetadata> {
    let mut indexes: Vec<IndexMetadata> = Vec::new();
    for (name, column, non_unique, index_type) in rows {
        if let Some(index) = indexes.iter_mut().find(|i| i.name == name) {
            index.field_names.push(column);
            continue;
        }
        let kind = if name == PRIMARY_KEY_NAME {
            ConstraintKind::Primary
        } else {
            ConstraintKind::Index
        };
        indexes.push(IndexMetadata {
            unique: kind == ConstraintKind::Primary || non_unique == 0,
            kind,
            name,
            field_names: vec![column],
            index_type,
        });
    }
    indexes
}
