//! Converts sqlx rows into engine rows.

use chrono::NaiveDateTime;
use oxide_schema::{Error, Result, Row, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// How a column's values are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Bool,
    Signed,
    Unsigned,
    Float,
    DateTime,
    Text,
}

impl Decoder {
    /// Picks a decoder from the type name sqlx reports for a column.
    pub(crate) fn for_type(name: &str) -> Self {
        match name {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Self::Signed,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => Self::Unsigned,
            "FLOAT" | "DOUBLE" => Self::Float,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            _ => Self::Text,
        }
    }
}

/// Decodes every column of a row, keeping their order.
pub(crate) fn decode_row(row: &MySqlRow, sql: &str) -> Result<Row> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = decode_value(row, index, Decoder::for_type(column.type_info().name()))
            .map_err(|err| Error::driver(Some(sql), err))?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_value(
    row: &MySqlRow,
    index: usize,
    decoder: Decoder,
) -> std::result::Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }
    let value = match decoder {
        Decoder::Bool => Value::Bool(row.try_get::<bool, _>(index)?),
        Decoder::Signed => Value::Int(row.try_get::<i64, _>(index)?),
        Decoder::Unsigned => {
            let n = row.try_get::<u64, _>(index)?;
            i64::try_from(n).map_or_else(|_| Value::Text(n.to_string()), Value::Int)
        }
        Decoder::Float => Value::Float(row.try_get::<f64, _>(index)?),
        Decoder::DateTime => Value::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
        // DECIMAL, DATE, TIME, JSON and the rest arrive as text.
        Decoder::Text => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_for_type() {
        assert_eq!(Decoder::for_type("BOOLEAN"), Decoder::Bool);
        assert_eq!(Decoder::for_type("BIGINT"), Decoder::Signed);
        assert_eq!(Decoder::for_type("BIGINT UNSIGNED"), Decoder::Unsigned);
        assert_eq!(Decoder::for_type("DOUBLE"), Decoder::Float);
        assert_eq!(Decoder::for_type("TIMESTAMP"), Decoder::DateTime);
        assert_eq!(Decoder::for_type("VARCHAR"), Decoder::Text);
        assert_eq!(Decoder::for_type("DECIMAL"), Decoder::Text);
    }
}
