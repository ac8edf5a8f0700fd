#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
#![cfg_attr(feature = "strict", deny(missing_docs))]
//! This crate contains stuff that's really helpful for tests.
use chrono::{NaiveDate, NaiveDateTime};
use common::{Column, Table};
use proptest::prelude::*;

prop_compose! {
    /// This strategy, generates a random naive date in the years 2007 to 2021.
    pub fn naive_date()(year in 2007i32..2021i32, month in 1u32..=12u32, day in 1u32..=31u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| NaiveDate::from_ymd_opt(year, month, 28))
            .unwrap()
    }
}

prop_compose! {
    /// Gives a random timestamp on a [naive_date].
    pub fn naive_date_time()(date in naive_date(), seconds in 0u32..86_400) -> NaiveDateTime {
        date.and_hms_opt(seconds / 3600, seconds / 60 % 60, seconds % 60).unwrap()
    }
}

prop_compose! {
    /// Gives a normal range `(start, end)` with `start <= end`, spanning at most 400 days.
    pub fn date_range()(start in naive_date(), days in 0i64..400) -> (NaiveDate, NaiveDate) {
        (start, start + chrono::Duration::days(days))
    }
}

prop_compose! {
    /// Gives up to `limit` many, possibly overlapping and unsorted, [date_range]s.
    pub fn date_ranges(limit: usize)(ranges in prop::collection::vec(date_range(), 0..limit)) -> Vec<(NaiveDate, NaiveDate)> {
        ranges
    }
}

prop_compose! {
    /// Gives a table of between one and `limit` activities, with a timestamp column `start` and the
    /// numeric columns `distanceMiles` and `climbFeet`.
    pub fn activity_table(limit: usize)(
        rows in prop::collection::vec((naive_date_time(), 0.1..30.0f64, 0i64..5000), 1..limit)
    ) -> Table {
        let starts = rows.iter().map(|(start, _, _)| *start).collect();
        let distances = rows.iter().map(|(_, distance, _)| *distance).collect();
        let climbs = rows.iter().map(|(_, _, climb)| *climb).collect();
        Table::new(vec![
            ("start".to_string(), Column::Timestamp(starts)),
            ("distanceMiles".to_string(), Column::Float(distances)),
            ("climbFeet".to_string(), Column::Int(climbs)),
        ])
        .unwrap()
    }
}
