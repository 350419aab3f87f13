use flight_ontime::{
    evaluate::evaluate,
    features::{BadRowPolicy, TimeBucket, extract_examples, to_example},
    join::{DayLookup, JoinedSplits, SplitRole},
    records::{DayTable, FlightRecord},
    split::DaySplitter,
};
use proptest::prelude::*;

fn day_table(count: usize) -> DayTable {
    let rows = (0..count)
        .map(|day| {
            vec![
                format!("2015-{:02}-{:02}", day / 28 + 1, day % 28 + 1),
                if day % 5 == 4 { "False" } else { "True" }.to_string(),
            ]
        })
        .collect();
    DayTable::from_rows(vec!["FL_DATE".into(), "is_train_day".into()], rows).expect("day table")
}

fn flight(date: String, row: usize, dep_delay: f64, hour: u32, cancelled: bool) -> FlightRecord {
    FlightRecord {
        source_row: row,
        fl_date: date.clone(),
        carrier: "AA".to_string(),
        flight_number: row.to_string(),
        origin: "DFW".to_string(),
        dest: "ORD".to_string(),
        crs_dep_time: String::new(),
        dep_time: format!("{date} {hour:02}:30:00"),
        crs_arr_time: String::new(),
        arr_time: String::new(),
        dep_delay: Some(dep_delay),
        taxi_out: Some(11.0),
        arr_delay: Some(dep_delay - 3.0),
        distance: Some(500.0),
        cancelled: if cancelled { "1.00" } else { "0.00" }.to_string(),
        diverted: "0.00".to_string(),
        dep_airport_tzoffset: Some(0.0),
    }
}

fn flights_for(table: &DayTable, per_day: usize) -> Vec<FlightRecord> {
    let mut flights = Vec::new();
    for day in 0..table.len() {
        for _ in 0..per_day {
            let row = flights.len() + 2;
            flights.push(flight(
                table.date(day).to_string(),
                row,
                (row % 40) as f64 - 10.0,
                (row % 24) as u32,
                row % 9 == 0,
            ));
        }
    }
    // Flights on a date missing from the day table never join.
    flights.push(flight("1999-12-31".to_string(), 0, 0.0, 12, false));
    flights
}

proptest! {
    #[test]
    fn split_is_reproducible_for_a_seed(seed in any::<u64>(), days in 1usize..120, fraction in 0.0f64..=1.0) {
        let table = day_table(days);
        let splitter = DaySplitter::new(seed, fraction).expect("splitter");
        let (first, first_counts) = splitter.assign(&table);
        let (second, second_counts) = splitter.assign(&table);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first_counts, second_counts);
        prop_assert_eq!(first_counts.train + first_counts.holdout, days);
        for (row, day) in first.iter().enumerate() {
            prop_assert_eq!(day.fl_date.as_str(), table.date(row));
        }
    }

    #[test]
    fn joined_splits_are_disjoint_and_cover_qualifying_flights(seed in any::<u64>(), per_day in 1usize..6) {
        let table = day_table(30);
        let (days, _) = DaySplitter::new(seed, 0.8).expect("splitter").assign(&table);
        let lookup = DayLookup::new(days.clone());
        let flights = flights_for(&table, per_day);

        let mut splits = JoinedSplits::default();
        splits
            .absorb(flights.iter().cloned().map(Ok), &lookup, &[SplitRole::Train, SplitRole::Holdout])
            .expect("absorb");

        let holdout_dates = days
            .iter()
            .filter(|day| day.holdout)
            .map(|day| day.fl_date.as_str())
            .collect::<Vec<_>>();
        prop_assert!(splits.train.iter().all(|f| !holdout_dates.contains(&f.fl_date.as_str())));
        prop_assert!(splits.holdout.iter().all(|f| holdout_dates.contains(&f.fl_date.as_str())));

        let qualifying = flights
            .iter()
            .filter(|f| f.cancelled == "0.00")
            .filter(|f| {
                lookup
                    .days_for(&f.fl_date)
                    .iter()
                    .any(|day| day.is_train_day == "True")
            })
            .count();
        prop_assert_eq!(splits.train.len() + splits.holdout.len(), qualifying);
        prop_assert_eq!(splits.stats.unmatched, 1);
        prop_assert_eq!(splits.stats.flights_read, flights.len());
    }

    #[test]
    fn every_hour_maps_to_exactly_one_bucket(hour in 0u32..24) {
        let one_hot = TimeBucket::from_hour(hour).one_hot();
        prop_assert_eq!(one_hot.iter().sum::<f64>(), 1.0);
        prop_assert_eq!(one_hot[2], 0.0);
    }

    #[test]
    fn examples_depend_only_on_their_record(delay in -60.0f64..300.0, hour in 0u32..24, partitions in 1usize..50) {
        let record = flight("2015-03-04".to_string(), 2, delay, hour, false);
        let direct = to_example(&record).expect("example");
        let mut batch = flights_for(&day_table(3), 4);
        batch.insert(5, record);
        let extraction = extract_examples(&batch, partitions, BadRowPolicy::Fail).expect("extract");
        prop_assert_eq!(extraction.examples[5], direct);
        prop_assert_eq!(direct.features[0], delay);
        prop_assert_eq!(direct.label, if delay - 3.0 < 15.0 { 1.0 } else { 0.0 });
    }
}

#[test]
fn evaluation_matches_worked_example() {
    let summary = evaluate([(1.0, 1.0), (0.0, 1.0), (0.0, 0.0), (1.0, 0.0)]);
    assert_eq!(summary.total_cancel, 2);
    assert_eq!(summary.total_noncancel, 2);
    assert_eq!(summary.correct_cancel, 0.5);
    assert_eq!(summary.correct_noncancel, 0.5);
    assert!((summary.rmse - 0.5f64.sqrt()).abs() < 1e-12);
}

#[test]
fn evaluation_of_single_group_masks_the_empty_one() {
    let summary = evaluate([(1.0, 1.0), (1.0, 1.0), (0.0, 1.0)]);
    assert_eq!(summary.total_cancel, 0);
    assert_eq!(summary.correct_cancel, 1.0);
    assert!((summary.correct_noncancel - 2.0 / 3.0).abs() < 1e-12);
    // Denominator is the clamped group sizes: 1 + 3.
    assert!((summary.rmse - 0.25f64.sqrt()).abs() < 1e-12);
}

#[test]
fn bad_rows_are_counted_when_skipping() {
    let table = day_table(4);
    let mut batch = flights_for(&table, 3);
    batch[1].taxi_out = None;
    batch[4].dep_time = "garbage".to_string();
    let extraction = extract_examples(&batch, 3, BadRowPolicy::Skip).expect("extract");
    assert_eq!(extraction.skipped, 2);
    assert_eq!(extraction.examples.len(), batch.len() - 2);
    assert!(extract_examples(&batch, 3, BadRowPolicy::Fail).is_err());
}
