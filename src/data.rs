use anyhow::{Context, Result};

use crate::schema::{ColumnType, Schema};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }
}

/// Empty cells are null for every type. Text cells are kept verbatim so
/// sentinel comparisons such as `"0.00"` see the raw characters.
pub fn parse_typed_value(value: &str, ty: ColumnType) -> Result<Option<Value>> {
    match ty {
        ColumnType::String => {
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::String(value.to_string())))
            }
        }
        ColumnType::Float => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: f64 = trimmed
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Ok(Some(Value::Float(parsed)))
        }
    }
}

pub fn parse_typed_row(schema: &Schema, raw: &[String]) -> Result<Vec<Option<Value>>> {
    schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = raw.get(idx).map(|s| s.as_str()).unwrap_or("");
            parse_typed_value(value, column.datatype)
                .with_context(|| format!("Column '{}'", column.name))
        })
        .collect()
}
