//! Typed flight and training-day records and their CSV readers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{Value, parse_typed_row},
    io_utils,
    schema::Schema,
};

pub const DAY_DATE_COLUMN: &str = "FL_DATE";
pub const DAY_TRAIN_FLAG_COLUMN: &str = "is_train_day";

/// Flight columns the pipeline reads by name.
pub const REQUIRED_FLIGHT_COLUMNS: &[&str] = &[
    "FL_DATE",
    "UNIQUE_CARRIER",
    "FL_NUM",
    "ORIGIN",
    "DEST",
    "CRS_DEP_TIME",
    "DEP_TIME",
    "DEP_DELAY",
    "TAXI_OUT",
    "CRS_ARR_TIME",
    "ARR_TIME",
    "ARR_DELAY",
    "CANCELLED",
    "DIVERTED",
    "DISTANCE",
    "DEP_AIRPORT_TZOFFSET",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    /// 1-based line number in the source file.
    pub source_row: usize,
    pub fl_date: String,
    pub carrier: String,
    pub flight_number: String,
    pub origin: String,
    pub dest: String,
    pub crs_dep_time: String,
    pub dep_time: String,
    pub crs_arr_time: String,
    pub arr_time: String,
    pub dep_delay: Option<f64>,
    pub taxi_out: Option<f64>,
    pub arr_delay: Option<f64>,
    pub distance: Option<f64>,
    pub cancelled: String,
    pub diverted: String,
    /// Seconds added to the departure timestamp to obtain local time.
    pub dep_airport_tzoffset: Option<f64>,
}

impl FlightRecord {
    pub fn departure_delay(&self) -> Option<f64> {
        self.dep_delay
    }

    pub fn taxi_out_minutes(&self) -> Option<f64> {
        self.taxi_out
    }

    pub fn arrival_delay(&self) -> Option<f64> {
        self.arr_delay
    }

    pub fn departure_timestamp(&self) -> &str {
        &self.dep_time
    }

    pub fn departure_utc_offset(&self) -> Option<f64> {
        self.dep_airport_tzoffset
    }
}

/// Column positions resolved once per schema.
#[derive(Debug, Clone)]
pub struct FlightColumns {
    fl_date: usize,
    carrier: usize,
    flight_number: usize,
    origin: usize,
    dest: usize,
    crs_dep_time: usize,
    dep_time: usize,
    dep_delay: usize,
    taxi_out: usize,
    crs_arr_time: usize,
    arr_time: usize,
    arr_delay: usize,
    cancelled: usize,
    diverted: usize,
    distance: usize,
    dep_airport_tzoffset: usize,
}

impl FlightColumns {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        schema.ensure_flight_columns(REQUIRED_FLIGHT_COLUMNS)?;
        Ok(Self {
            fl_date: schema.require_column("FL_DATE")?,
            carrier: schema.require_column("UNIQUE_CARRIER")?,
            flight_number: schema.require_column("FL_NUM")?,
            origin: schema.require_column("ORIGIN")?,
            dest: schema.require_column("DEST")?,
            crs_dep_time: schema.require_column("CRS_DEP_TIME")?,
            dep_time: schema.require_column("DEP_TIME")?,
            dep_delay: schema.require_column("DEP_DELAY")?,
            taxi_out: schema.require_column("TAXI_OUT")?,
            crs_arr_time: schema.require_column("CRS_ARR_TIME")?,
            arr_time: schema.require_column("ARR_TIME")?,
            arr_delay: schema.require_column("ARR_DELAY")?,
            cancelled: schema.require_column("CANCELLED")?,
            diverted: schema.require_column("DIVERTED")?,
            distance: schema.require_column("DISTANCE")?,
            dep_airport_tzoffset: schema.require_column("DEP_AIRPORT_TZOFFSET")?,
        })
    }

    pub fn build(&self, source_row: usize, typed: &[Option<Value>]) -> FlightRecord {
        let text = |idx: usize| {
            typed
                .get(idx)
                .and_then(|v| v.as_ref())
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let number = |idx: usize| typed.get(idx).and_then(|v| v.as_ref()).and_then(Value::as_f64);
        FlightRecord {
            source_row,
            fl_date: text(self.fl_date),
            carrier: text(self.carrier),
            flight_number: text(self.flight_number),
            origin: text(self.origin),
            dest: text(self.dest),
            crs_dep_time: text(self.crs_dep_time),
            dep_time: text(self.dep_time),
            crs_arr_time: text(self.crs_arr_time),
            arr_time: text(self.arr_time),
            dep_delay: number(self.dep_delay),
            taxi_out: number(self.taxi_out),
            arr_delay: number(self.arr_delay),
            distance: number(self.distance),
            cancelled: text(self.cancelled),
            diverted: text(self.diverted),
            dep_airport_tzoffset: number(self.dep_airport_tzoffset),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub has_headers: bool,
}

/// Streams typed flight records from one file.
///
/// Header names (when present) and every row's field count are checked
/// against `schema` before the row is typed.
pub fn flight_records(
    path: &Path,
    schema: &Schema,
    options: ReadOptions,
) -> Result<impl Iterator<Item = Result<FlightRecord>> + use<>> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let encoding = options.encoding;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, options.has_headers)?;
    if options.has_headers {
        let headers = io_utils::reader_headers(&mut reader, encoding)?;
        schema
            .validate_headers(&headers)
            .with_context(|| format!("Validating flight headers for {path:?}"))?;
    }
    let columns = FlightColumns::resolve(schema)?;
    let schema = schema.clone();
    let source: PathBuf = path.to_path_buf();
    let first_row = if options.has_headers { 2 } else { 1 };
    debug!("Streaming flights from {source:?}");

    Ok(reader
        .into_byte_records()
        .enumerate()
        .map(move |(idx, record)| {
            let row_number = idx + first_row;
            let record =
                record.with_context(|| format!("Reading row {row_number} of {source:?}"))?;
            schema
                .validate_field_count(record.len(), row_number)
                .with_context(|| format!("Validating {source:?}"))?;
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {row_number} of {source:?}"))?;
            let typed = parse_typed_row(&schema, &decoded)
                .with_context(|| format!("Parsing row {row_number} of {source:?}"))?;
            Ok(columns.build(row_number, &typed))
        }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainDayRecord {
    pub fl_date: String,
    /// Raw validity flag as supplied; valid days read `"True"`.
    pub is_train_day: String,
    pub holdout: bool,
}

/// Day table as read from disk, before any holdout assignment.
#[derive(Debug, Clone)]
pub struct DayTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    date_idx: usize,
    flag_idx: usize,
}

impl DayTable {
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| anyhow!("Day table is missing required column '{name}'"))
        };
        let date_idx = find(DAY_DATE_COLUMN)?;
        let flag_idx = find(DAY_TRAIN_FLAG_COLUMN)?;
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == headers.len(),
                "Row {} of day table has {} field(s) but header has {}",
                idx + 2,
                row.len(),
                headers.len()
            );
        }
        Ok(Self {
            headers,
            rows,
            date_idx,
            flag_idx,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn date(&self, row: usize) -> &str {
        &self.rows[row][self.date_idx]
    }

    pub fn train_flag(&self, row: usize) -> &str {
        &self.rows[row][self.flag_idx]
    }
}

pub fn read_day_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<DayTable> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading day table headers from {path:?}"))?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading day row {}", row_idx + 2))?;
        rows.push(io_utils::decode_record(&record, encoding)?);
    }
    DayTable::from_rows(headers, rows).with_context(|| format!("Loading day table {path:?}"))
}
