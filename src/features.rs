//! Record-to-example feature extraction.
//!
//! Every qualifying flight becomes a [`LabeledExample`]: an on-time label and
//! a six-wide feature vector of departure delay, taxi-out time, and a one-hot
//! local time-of-day bucket.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use clap::ValueEnum;
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::FlightRecord;

/// Arrivals strictly earlier than this many minutes late count as on time.
pub const ON_TIME_THRESHOLD_MINUTES: f64 = 15.0;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const FEATURE_COUNT: usize = 6;
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "dep_delay",
    "taxi_out",
    "hour_night",
    "hour_morning",
    "hour_midday",
    "hour_evening",
];

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("missing value for {0}")]
    MissingField(&'static str),
    #[error("malformed departure timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("timezone offset {0} seconds cannot be applied to the departure time")]
    Offset(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Night,
    Morning,
    MidDay,
    Evening,
}

impl TimeBucket {
    pub fn from_hour(hour: u32) -> Self {
        if hour < 6 || hour > 20 {
            TimeBucket::Night
        } else if hour < 10 {
            TimeBucket::Morning
        } else if hour < 5 {
            // Never taken: hours below 5 are already night.
            TimeBucket::MidDay
        } else {
            TimeBucket::Evening
        }
    }

    pub fn one_hot(&self) -> [f64; 4] {
        match self {
            TimeBucket::Night => [1.0, 0.0, 0.0, 0.0],
            TimeBucket::Morning => [0.0, 1.0, 0.0, 0.0],
            TimeBucket::MidDay => [0.0, 0.0, 1.0, 0.0],
            TimeBucket::Evening => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledExample {
    pub label: f64,
    pub features: [f64; FEATURE_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum BadRowPolicy {
    /// Abort the run on the first row that cannot be turned into features
    #[default]
    Fail,
    /// Drop such rows and report how many were dropped
    Skip,
}

pub fn parse_departure_time(raw: &str) -> Result<NaiveDateTime, FeatureError> {
    let normalized = raw.replace('T', " ");
    NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT).map_err(|source| {
        FeatureError::Timestamp {
            value: raw.to_string(),
            source,
        }
    })
}

/// Hour of day after shifting `timestamp` by `offset_seconds`.
pub fn local_hour(timestamp: &str, offset_seconds: f64) -> Result<u32, FeatureError> {
    let departure = parse_departure_time(timestamp)?;
    if !offset_seconds.is_finite() {
        return Err(FeatureError::Offset(offset_seconds));
    }
    let shifted = TimeDelta::try_milliseconds((offset_seconds * 1000.0).round() as i64)
        .and_then(|delta| departure.checked_add_signed(delta))
        .ok_or(FeatureError::Offset(offset_seconds))?;
    Ok(shifted.hour())
}

pub fn label_for(arrival_delay: f64) -> f64 {
    if arrival_delay < ON_TIME_THRESHOLD_MINUTES {
        1.0
    } else {
        0.0
    }
}

pub fn to_example(record: &FlightRecord) -> Result<LabeledExample, FeatureError> {
    let dep_delay = record
        .departure_delay()
        .ok_or(FeatureError::MissingField("DEP_DELAY"))?;
    let taxi_out = record
        .taxi_out_minutes()
        .ok_or(FeatureError::MissingField("TAXI_OUT"))?;
    let arr_delay = record
        .arrival_delay()
        .ok_or(FeatureError::MissingField("ARR_DELAY"))?;
    let offset = record
        .departure_utc_offset()
        .ok_or(FeatureError::MissingField("DEP_AIRPORT_TZOFFSET"))?;
    if record.departure_timestamp().is_empty() {
        return Err(FeatureError::MissingField("DEP_TIME"));
    }
    let hour = local_hour(record.departure_timestamp(), offset)?;
    let bucket = TimeBucket::from_hour(hour).one_hot();

    let mut features = [0.0; FEATURE_COUNT];
    features[0] = dep_delay;
    features[1] = taxi_out;
    features[2..].copy_from_slice(&bucket);
    Ok(LabeledExample {
        label: label_for(arr_delay),
        features,
    })
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub examples: Vec<LabeledExample>,
    pub skipped: usize,
}

/// Converts `records` in parallel across `partitions` chunks. Output order
/// follows input order regardless of the partition count.
pub fn extract_examples(
    records: &[FlightRecord],
    partitions: usize,
    policy: BadRowPolicy,
) -> anyhow::Result<Extraction> {
    if records.is_empty() {
        return Ok(Extraction::default());
    }
    let chunk_size = records.len().div_ceil(partitions.max(1)).max(1);
    let results: Vec<Vec<Result<LabeledExample, FeatureError>>> = records
        .par_chunks(chunk_size)
        .map(|chunk| chunk.iter().map(to_example).collect())
        .collect();

    let mut extraction = Extraction {
        examples: Vec::with_capacity(records.len()),
        skipped: 0,
    };
    let mut first_skip: Option<(usize, FeatureError)> = None;
    for (record, result) in records.iter().zip(results.into_iter().flatten()) {
        match result {
            Ok(example) => extraction.examples.push(example),
            Err(err) => match policy {
                BadRowPolicy::Fail => {
                    return Err(anyhow::Error::new(err).context(format!(
                        "Extracting features from flight row {} ({} {} on {})",
                        record.source_row, record.carrier, record.flight_number, record.fl_date
                    )));
                }
                BadRowPolicy::Skip => {
                    extraction.skipped += 1;
                    if first_skip.is_none() {
                        first_skip = Some((record.source_row, err));
                    }
                }
            },
        }
    }
    if let Some((row, err)) = first_skip {
        warn!(
            "Skipped {} row(s) without usable features; first at flight row {}: {}",
            extraction.skipped, row, err
        );
    }
    Ok(extraction)
}
