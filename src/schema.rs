//! Flight schema model, header validation, and YAML persistence.
//!
//! The flight table has a fixed 35-column layout. [`flight_schema()`] turns
//! that layout into a [`Schema`] where the delay, taxi, distance, and
//! timezone-offset columns are numeric and everything else stays textual.
//! Unlike a purely positional reader, every file is checked against the
//! schema before any row is typed: header names when a header row is
//! present, and field counts on every row.

use std::{fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};

const CURRENT_SCHEMA_VERSION: &str = "1.0";

/// Ordered header of the flight table.
pub const FLIGHT_HEADER: &str = "FL_DATE,UNIQUE_CARRIER,AIRLINE_ID,CARRIER,FL_NUM,ORIGIN_AIRPORT_ID,ORIGIN_AIRPORT_SEQ_ID,ORIGIN_CITY_MARKET_ID,ORIGIN,DEST_AIRPORT_ID,DEST_AIRPORT_SEQ_ID,DEST_CITY_MARKET_ID,DEST,CRS_DEP_TIME,DEP_TIME,DEP_DELAY,TAXI_OUT,WHEELS_OFF,WHEELS_ON,TAXI_IN,CRS_ARR_TIME,ARR_TIME,ARR_DELAY,CANCELLED,CANCELLATION_CODE,DIVERTED,DISTANCE,DEP_AIRPORT_LAT,DEP_AIRPORT_LON,DEP_AIRPORT_TZOFFSET,ARR_AIRPORT_LAT,ARR_AIRPORT_LON,ARR_AIRPORT_TZOFFSET,EVENT,NOTIFY_TIME";

/// Columns parsed as floating point; all others are kept as text.
pub const NUMERIC_COLUMNS: &[&str] = &[
    "ARR_DELAY",
    "DEP_DELAY",
    "DISTANCE",
    "TAXI_OUT",
    "DEP_AIRPORT_TZOFFSET",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Float,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Float => "Float",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default = "Schema::default_has_headers")]
    pub has_headers: bool,
}

/// Declared type for a flight column name.
pub fn column_type_for(name: &str) -> ColumnType {
    if NUMERIC_COLUMNS.contains(&name) {
        ColumnType::Float
    } else {
        ColumnType::String
    }
}

/// Schema for the fixed flight header.
pub fn flight_schema() -> Schema {
    let headers = FLIGHT_HEADER.split(',').collect::<Vec<_>>();
    Schema::from_headers(&headers)
}

impl Schema {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let columns = headers
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                ColumnMeta {
                    name: name.to_string(),
                    datatype: column_type_for(name),
                }
            })
            .collect();
        Schema {
            columns,
            schema_version: Some(CURRENT_SCHEMA_VERSION.to_string()),
            has_headers: true,
        }
    }

    pub const fn default_has_headers() -> bool {
        true
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| anyhow!("Column '{name}' not found in schema"))
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        if headers.len() != self.columns.len() {
            return Err(anyhow!(
                "Header length mismatch: schema expects {} column(s) but file contains {}",
                self.columns.len(),
                headers.len()
            ));
        }
        for (idx, column) in self.columns.iter().enumerate() {
            let name = headers.get(idx).map(|s| s.trim()).unwrap_or_default();
            if name != column.name {
                return Err(anyhow!(
                    "Header mismatch at position {}: expected '{}' but found '{}'",
                    idx + 1,
                    column.name,
                    name
                ));
            }
        }
        Ok(())
    }

    pub fn validate_field_count(&self, field_count: usize, row_number: usize) -> Result<()> {
        ensure!(
            field_count == self.columns.len(),
            "Row {row_number} has {field_count} field(s) but schema expects {}",
            self.columns.len()
        );
        Ok(())
    }

    /// Checks that every column the pipeline reads is present with the
    /// expected type.
    pub fn ensure_flight_columns(&self, required: &[&str]) -> Result<()> {
        for name in required {
            let idx = self.require_column(name)?;
            let expected = column_type_for(name);
            let actual = self.columns[idx].datatype;
            if actual != expected {
                bail!("Column '{name}' must be declared {expected} but schema declares {actual}");
            }
        }
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        ensure!(
            !schema.columns.is_empty(),
            "Schema file {path:?} declares no columns"
        );
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }
}
