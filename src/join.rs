use std::collections::HashMap;

use anyhow::Result;
use log::{debug, info};

use crate::records::{FlightRecord, TrainDayRecord};

/// Text value of a cleared cancellation or diversion flag.
pub const ZERO_FLAG: &str = "0.00";
/// Text value of a valid training day flag.
pub const VALID_TRAIN_DAY: &str = "True";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitRole {
    Train,
    Holdout,
}

impl SplitRole {
    pub fn of(day: &TrainDayRecord) -> Self {
        if day.holdout {
            SplitRole::Holdout
        } else {
            SplitRole::Train
        }
    }
}

/// Day records keyed by exact date text.
#[derive(Debug, Clone, Default)]
pub struct DayLookup {
    by_date: HashMap<String, Vec<TrainDayRecord>>,
}

impl DayLookup {
    pub fn new(days: Vec<TrainDayRecord>) -> Self {
        let mut by_date: HashMap<String, Vec<TrainDayRecord>> = HashMap::new();
        for day in days {
            by_date.entry(day.fl_date.clone()).or_default().push(day);
        }
        Self { by_date }
    }

    pub fn days_for(&self, date: &str) -> &[TrainDayRecord] {
        self.by_date.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// Valid training day, not cancelled, not diverted.
pub fn qualifies(flight: &FlightRecord, day: &TrainDayRecord) -> bool {
    day.is_train_day == VALID_TRAIN_DAY && flight.cancelled == ZERO_FLAG && flight.diverted == ZERO_FLAG
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub flights_read: usize,
    pub unmatched: usize,
    pub rejected: usize,
    pub train: usize,
    pub holdout: usize,
}

#[derive(Debug, Clone, Default)]
pub struct JoinedSplits {
    pub train: Vec<FlightRecord>,
    pub holdout: Vec<FlightRecord>,
    pub stats: JoinStats,
}

impl JoinedSplits {
    /// Inner-joins `flights` against `lookup` and files each qualifying
    /// joined row under its day's role. Roles absent from `keep` are counted
    /// but not stored.
    pub fn absorb<I>(&mut self, flights: I, lookup: &DayLookup, keep: &[SplitRole]) -> Result<()>
    where
        I: IntoIterator<Item = Result<FlightRecord>>,
    {
        for flight in flights {
            let flight = flight?;
            self.stats.flights_read += 1;
            let days = lookup.days_for(&flight.fl_date);
            if days.is_empty() {
                self.stats.unmatched += 1;
                continue;
            }
            for day in days {
                if !qualifies(&flight, day) {
                    self.stats.rejected += 1;
                    continue;
                }
                let role = SplitRole::of(day);
                match role {
                    SplitRole::Train => self.stats.train += 1,
                    SplitRole::Holdout => self.stats.holdout += 1,
                }
                if keep.contains(&role) {
                    self.bucket_mut(role).push(flight.clone());
                }
            }
        }
        debug!("Join progress: {:?}", self.stats);
        Ok(())
    }

    pub fn rows(&self, role: SplitRole) -> &[FlightRecord] {
        match role {
            SplitRole::Train => &self.train,
            SplitRole::Holdout => &self.holdout,
        }
    }

    fn bucket_mut(&mut self, role: SplitRole) -> &mut Vec<FlightRecord> {
        match role {
            SplitRole::Train => &mut self.train,
            SplitRole::Holdout => &mut self.holdout,
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Join complete: {} flight(s) read, {} unmatched, {} rejected, {} train row(s), {} holdout row(s)",
            self.stats.flights_read,
            self.stats.unmatched,
            self.stats.rejected,
            self.stats.train,
            self.stats.holdout
        );
    }
}
