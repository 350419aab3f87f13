#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flight_ontime::schema::flight_schema;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builder for one 35-column flight row; unset columns stay empty.
#[derive(Debug, Clone)]
pub struct FlightRow {
    fields: Vec<String>,
}

impl FlightRow {
    pub fn new(date: &str) -> Self {
        let schema = flight_schema();
        let mut row = Self {
            fields: vec![String::new(); schema.columns.len()],
        };
        row.set("FL_DATE", date)
            .set("UNIQUE_CARRIER", "AA")
            .set("FL_NUM", "100")
            .set("ORIGIN", "DFW")
            .set("DEST", "ORD")
            .set("DEP_TIME", &format!("{date} 14:00:00"))
            .set("DEP_DELAY", "0.0")
            .set("TAXI_OUT", "12.0")
            .set("ARR_DELAY", "0.0")
            .set("CANCELLED", "0.00")
            .set("DIVERTED", "0.00")
            .set("DISTANCE", "802.0")
            .set("DEP_AIRPORT_TZOFFSET", "0.0");
        row
    }

    pub fn set(&mut self, column: &str, value: &str) -> &mut Self {
        let idx = flight_schema()
            .column_index(column)
            .unwrap_or_else(|| panic!("unknown column {column}"));
        self.fields[idx] = value.to_string();
        self
    }

    pub fn line(&self) -> String {
        self.fields.join(",")
    }
}

pub fn flight_header() -> String {
    flight_schema().headers().join(",")
}

pub fn flight_csv(rows: &[FlightRow], with_header: bool) -> String {
    let mut out = String::new();
    if with_header {
        out.push_str(&flight_header());
        out.push('\n');
    }
    for row in rows {
        out.push_str(&row.line());
        out.push('\n');
    }
    out
}

pub fn day_date(day: usize) -> String {
    let month = day / 28 + 1;
    let dom = day % 28 + 1;
    format!("2015-{month:02}-{dom:02}")
}

/// Day table with `days` consecutive valid training days.
pub fn day_csv(days: usize) -> String {
    let mut out = String::from("FL_DATE,is_train_day\n");
    for day in 0..days {
        out.push_str(&format!("{},True\n", day_date(day)));
    }
    out
}

/// Flights whose departure delay mostly decides arrival: early departures
/// arrive on time, late ones do not, with every seventh flight flipped.
pub fn synthetic_flights(days: usize, per_day: usize) -> Vec<FlightRow> {
    let mut rows = Vec::with_capacity(days * per_day);
    for day in 0..days {
        let date = day_date(day);
        for slot in 0..per_day {
            let idx = day * per_day + slot;
            let dep_delay = (idx % 30) as f64 - 5.0;
            let mut arr_delay = dep_delay + 2.0;
            if idx % 7 == 0 {
                arr_delay = if arr_delay < 15.0 { 40.0 } else { -5.0 };
            }
            let hour = 5 + (idx % 18);
            let mut row = FlightRow::new(&date);
            row.set("FL_NUM", &idx.to_string())
                .set("DEP_TIME", &format!("{date}T{hour:02}:10:00"))
                .set("DEP_DELAY", &format!("{dep_delay:.1}"))
                .set("TAXI_OUT", &format!("{:.1}", 8 + idx % 10))
                .set("ARR_DELAY", &format!("{arr_delay:.1}"))
                .set("DEP_AIRPORT_TZOFFSET", "-18000.0");
            rows.push(row);
        }
    }
    rows
}
