//! Seeded train/holdout assignment of calendar days.
//!
//! Each day receives one draw in `[0, 1)` from a generator seeded only by the
//! experiment seed. Draws are consumed in day-table order, so the same seed
//! over the same day file always reproduces the same partition. A day is held
//! out when its draw exceeds the train fraction.

use anyhow::{Context, Result, ensure};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    cli::SplitArgs,
    config::ExperimentConfig,
    io_utils,
    records::{DayTable, TrainDayRecord, read_day_table},
};

pub const HOLDOUT_COLUMN: &str = "holdout";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySplitter {
    seed: u64,
    train_fraction: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub holdout: usize,
}

impl DaySplitter {
    pub fn new(seed: u64, train_fraction: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&train_fraction),
            "Train fraction must be within [0, 1] (got {train_fraction})"
        );
        Ok(Self {
            seed,
            train_fraction,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The first `count` draws of the seeded sequence.
    pub fn draws(&self, count: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..count).map(|_| rng.random::<f64>()).collect()
    }

    pub fn is_holdout(&self, draw: f64) -> bool {
        draw > self.train_fraction
    }

    pub fn assign(&self, table: &DayTable) -> (Vec<TrainDayRecord>, SplitCounts) {
        let mut counts = SplitCounts::default();
        let days = self
            .draws(table.len())
            .into_iter()
            .enumerate()
            .map(|(row, draw)| {
                let holdout = self.is_holdout(draw);
                if holdout {
                    counts.holdout += 1;
                } else {
                    counts.train += 1;
                }
                TrainDayRecord {
                    fl_date: table.date(row).to_string(),
                    is_train_day: table.train_flag(row).to_string(),
                    holdout,
                }
            })
            .collect();
        (days, counts)
    }
}

pub fn execute(args: &SplitArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(fraction) = args.train_fraction {
        config.train_fraction = fraction;
    }
    config.validate()?;

    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = read_day_table(&args.days, args.delimiter, encoding)?;
    let splitter = DaySplitter::new(config.seed, config.train_fraction)?;
    let (days, counts) = splitter.assign(&table);

    let delimiter = io_utils::resolve_input_delimiter(&args.days, args.delimiter);
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    let mut headers = table.headers.clone();
    headers.push(HOLDOUT_COLUMN.to_string());
    writer
        .write_record(&headers)
        .context("Writing split headers")?;
    for (row, day) in table.rows.iter().zip(&days) {
        let mut combined = row.clone();
        combined.push(day.holdout.to_string());
        writer
            .write_record(&combined)
            .context("Writing split row")?;
    }
    writer.flush().context("Flushing split output")?;
    info!(
        "Split {} day(s) with seed {}: {} train, {} holdout",
        table.len(),
        splitter.seed(),
        counts.train,
        counts.holdout
    );
    Ok(())
}
