// src/services/transform.rs
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CreditSpreadSeries, SeriesColumn, YieldSeries};

/// Tenor label → maturity in years, used for x placement on the curve chart.
pub const TENOR_YEARS: &[(&str, f64)] = &[
    ("US1M", 1.0 / 12.0),
    ("US3M", 0.25),
    ("US6M", 0.5),
    ("US1Y", 1.0),
    ("US2Y", 2.0),
    ("US5Y", 5.0),
    ("US10Y", 10.0),
    ("US20Y", 20.0),
    ("US30Y", 30.0),
];

pub fn tenor_years(tenor: &str) -> Option<f64> {
    TENOR_YEARS
        .iter()
        .find(|(t, _)| *t == tenor)
        .map(|(_, y)| *y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SnapshotOffset {
    Latest,
    OneWeekAgo,
    OneMonthAgo,
    OneYearAgo,
}

impl SnapshotOffset {
    pub const ALL: [SnapshotOffset; 4] = [
        SnapshotOffset::Latest,
        SnapshotOffset::OneWeekAgo,
        SnapshotOffset::OneMonthAgo,
        SnapshotOffset::OneYearAgo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SnapshotOffset::Latest => "Latest",
            SnapshotOffset::OneWeekAgo => "1 Week Ago",
            SnapshotOffset::OneMonthAgo => "1 Month Ago",
            SnapshotOffset::OneYearAgo => "1 Year Ago",
        }
    }

    /// Observations back from the latest row.
    pub fn rows_back(self) -> usize {
        match self {
            SnapshotOffset::Latest => 0,
            SnapshotOffset::OneWeekAgo => 5,
            SnapshotOffset::OneMonthAgo => 25,
            SnapshotOffset::OneYearAgo => 255,
        }
    }

    /// Row index for a table of `len` rows; the first row when the table is
    /// too short to reach back that far.
    pub fn row_index(self, len: usize) -> usize {
        let back = self.rows_back();
        if len > back {
            len - 1 - back
        } else {
            0
        }
    }
}

/// One melted (tenor, offset) cell of the curve comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub tenor: String,
    pub offset: SnapshotOffset,
    pub label: &'static str,
    pub years: Option<f64>,
    #[serde(rename = "yield")]
    pub yield_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetDate {
    pub offset: SnapshotOffset,
    pub label: &'static str,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldCurveSnapshot {
    pub points: Vec<CurvePoint>,
    pub dates: Vec<OffsetDate>,
}

impl YieldCurveSnapshot {
    pub fn points_for(&self, offset: SnapshotOffset) -> impl Iterator<Item = &CurvePoint> {
        self.points.iter().filter(move |p| p.offset == offset)
    }

    pub fn value(&self, tenor: &str, offset: SnapshotOffset) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.offset == offset && p.tenor == tenor)
            .and_then(|p| p.yield_pct)
    }

    pub fn date_of(&self, offset: SnapshotOffset) -> Option<NaiveDate> {
        self.dates.iter().find(|d| d.offset == offset).map(|d| d.date)
    }
}

/// Melts the latest, 1W, 1M and 1Y rows of `series` into long form, offset
/// by offset. `None` for an empty series.
pub fn build_yield_curve_snapshot(series: &YieldSeries) -> Option<YieldCurveSnapshot> {
    if series.is_empty() {
        return None;
    }
    let len = series.len();

    let mut points = Vec::with_capacity(SnapshotOffset::ALL.len() * series.columns.len());
    let mut dates = Vec::with_capacity(SnapshotOffset::ALL.len());
    for offset in SnapshotOffset::ALL {
        let idx = offset.row_index(len);
        dates.push(OffsetDate {
            offset,
            label: offset.label(),
            date: series.dates[idx],
        });
        for (col, value) in series.columns.iter().zip(series.row(idx)) {
            points.push(CurvePoint {
                tenor: col.name.clone(),
                offset,
                label: offset.label(),
                years: tenor_years(&col.name),
                yield_pct: value,
            });
        }
    }
    Some(YieldCurveSnapshot { points, dates })
}

/// Percentage points → basis points. Returns a new table; `series` may be a
/// shared cached value and is never touched.
pub fn convert_spreads_to_bps(series: &CreditSpreadSeries) -> CreditSpreadSeries {
    CreditSpreadSeries {
        dates: series.dates.clone(),
        columns: series
            .columns
            .iter()
            .map(|c| SeriesColumn {
                name: c.name.clone(),
                values: c.values.iter().map(|v| v.map(|x| x * 100.0)).collect(),
            })
            .collect(),
    }
}

pub const PRIMARY_SPREAD_BUCKET: &str = "High Yield";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    Primary,
    Secondary,
}

/// High Yield gets its own axis; investment-grade buckets share the other.
pub fn assign_dual_axis(bucket: &str) -> Axis {
    if bucket == PRIMARY_SPREAD_BUCKET {
        Axis::Primary
    } else {
        Axis::Secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateTable;
    use chrono::Duration;
    use proptest::prelude::*;

    fn table(rows: usize, tenors: &[&str], value: impl Fn(usize, usize) -> f64) -> DateTable {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        DateTable {
            dates: (0..rows).map(|i| start + Duration::days(i as i64)).collect(),
            columns: tenors
                .iter()
                .enumerate()
                .map(|(c, t)| SeriesColumn {
                    name: t.to_string(),
                    values: (0..rows).map(|r| Some(value(r, c))).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn short_series_falls_back_to_first_row() {
        let series = table(3, &["US3M", "US10Y"], |r, c| (r * 10 + c) as f64);
        let snap = build_yield_curve_snapshot(&series).unwrap();

        assert_eq!(snap.value("US3M", SnapshotOffset::Latest), Some(20.0));
        for offset in [
            SnapshotOffset::OneWeekAgo,
            SnapshotOffset::OneMonthAgo,
            SnapshotOffset::OneYearAgo,
        ] {
            assert_eq!(snap.value("US3M", offset), Some(0.0));
            assert_eq!(snap.value("US10Y", offset), Some(1.0));
            assert_eq!(snap.date_of(offset), Some(series.dates[0]));
        }
    }

    #[test]
    fn offsets_map_to_their_source_rows() {
        let rows = 300;
        let series = table(rows, &["US2Y"], |r, _| r as f64);
        let snap = build_yield_curve_snapshot(&series).unwrap();
        let last = (rows - 1) as f64;

        let got: Vec<f64> = SnapshotOffset::ALL
            .iter()
            .map(|o| snap.value("US2Y", *o).unwrap())
            .collect();
        assert_eq!(got, vec![last, last - 5.0, last - 25.0, last - 255.0]);
    }

    #[test]
    fn fallback_boundaries() {
        assert_eq!(SnapshotOffset::OneWeekAgo.row_index(5), 0);
        assert_eq!(SnapshotOffset::OneWeekAgo.row_index(6), 0);
        assert_eq!(SnapshotOffset::OneWeekAgo.row_index(7), 1);
        assert_eq!(SnapshotOffset::OneMonthAgo.row_index(25), 0);
        assert_eq!(SnapshotOffset::OneMonthAgo.row_index(27), 1);
        assert_eq!(SnapshotOffset::OneYearAgo.row_index(255), 0);
        assert_eq!(SnapshotOffset::Latest.row_index(1), 0);
    }

    #[test]
    fn snapshot_attaches_maturities() {
        let series = table(1, &["US1M", "US10Y", "XX"], |_, _| 4.0);
        let snap = build_yield_curve_snapshot(&series).unwrap();
        let latest: Vec<Option<f64>> = snap
            .points_for(SnapshotOffset::Latest)
            .map(|p| p.years)
            .collect();

        assert_eq!(latest, vec![Some(1.0 / 12.0), Some(10.0), None]);
        assert_eq!(snap.points.len(), 12);
    }

    #[test]
    fn empty_series_has_no_snapshot() {
        assert!(build_yield_curve_snapshot(&DateTable::default()).is_none());
    }

    #[test]
    fn high_yield_is_primary() {
        assert_eq!(assign_dual_axis("High Yield"), Axis::Primary);
        assert_eq!(assign_dual_axis("BBB"), Axis::Secondary);
        assert_eq!(assign_dual_axis("AAA"), Axis::Secondary);
    }

    proptest! {
        #[test]
        fn bps_is_pure_times_100(
            values in prop::collection::vec(prop::option::of(-5.0..25.0f64), 1..30),
        ) {
            let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let input = DateTable {
                dates: (0..values.len()).map(|i| start + Duration::days(i as i64)).collect(),
                columns: vec![SeriesColumn { name: "BBB".into(), values: values.clone() }],
            };
            let before = input.clone();
            let out = convert_spreads_to_bps(&input);

            prop_assert_eq!(&input, &before);
            for (o, i) in out.columns[0].values.iter().zip(&values) {
                prop_assert_eq!(*o, i.map(|x| x * 100.0));
            }
        }
    }
}
