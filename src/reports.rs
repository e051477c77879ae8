use crate::error::ReportError;
use crate::output;
use crate::store::Persisted;
use crate::types::{
    DangerousTimesRow, MonthWeekdayRow, MonthlyTrendRow, OffenseCountRow, ReportSummary,
    RunManifest, StreetHotspotRow, TimeBandRow, YearlyTrendRow,
};
use crate::util::{format_int, pct_change};
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Average monthly incident count a location must exceed to be a hotspot.
pub const HOTSPOT_THRESHOLD: f64 = 10.0;

/// Calendar order used by the month/weekday report.
pub const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Eight three-hour bands, keyed by their first hour.
pub const TIME_BANDS: [(u32, &str); 8] = [
    (0, "12:00 AM - 2:59 AM"),
    (3, "3:00 AM - 5:59 AM"),
    (6, "6:00 AM - 8:59 AM"),
    (9, "9:00 AM - 11:59 AM"),
    (12, "12:00 PM - 2:59 PM"),
    (15, "3:00 PM - 5:59 PM"),
    (18, "6:00 PM - 8:59 PM"),
    (21, "9:00 PM - 11:59 PM"),
];

const HOUR_EXPR: &str = "CAST(strftime('%H', OCCURRED_ON_DATE) AS INTEGER)";

// Unknown weekday values sort after Saturday.
static WEEKDAY_RANK: Lazy<String> = Lazy::new(|| {
    let arms: Vec<String> = WEEKDAYS
        .iter()
        .enumerate()
        .map(|(i, day)| format!("WHEN '{}' THEN {}", day, i + 1))
        .collect();
    format!("CASE DAY_OF_WEEK {} ELSE {} END", arms.join(" "), WEEKDAYS.len() + 1)
});

static TIME_BAND_LABEL: Lazy<String> = Lazy::new(|| {
    let arms: Vec<String> = TIME_BANDS
        .iter()
        .map(|(start, label)| {
            format!("WHEN {} BETWEEN {} AND {} THEN '{}'", HOUR_EXPR, start, start + 2, label)
        })
        .collect();
    format!("CASE {} END", arms.join(" "))
});

/// Static description of one exported report.
pub struct ReportDef {
    pub title: &'static str,
    pub note: Option<&'static str>,
    pub file: &'static str,
}

pub const OFFENSE_COUNTS: ReportDef = ReportDef {
    title: "Offense counts",
    note: None,
    file: "offense_counts.csv",
};
pub const STREET_HOTSPOTS: ReportDef = ReportDef {
    title: "Streets with more than 10 average incidents per month (with lat/long)",
    note: Some("Average of per-month counts per street and location"),
    file: "avg_incidents_per_month.csv",
};
pub const MONTH_WEEKDAY: ReportDef = ReportDef {
    title: "Number of incidents by month and weekday",
    note: None,
    file: "total_incidents_by_month_weekday.csv",
};
pub const MONTHLY_TREND: ReportDef = ReportDef {
    title: "Total incidents per month",
    note: Some("PercentageChange is relative to the previous month"),
    file: "monthly_percentage_change.csv",
};
pub const YEARLY_TREND: ReportDef = ReportDef {
    title: "Total number of incidents by year",
    note: Some("YoYPercentageChange is relative to the previous year"),
    file: "yearly_percentage_change.csv",
};
pub const TIME_BANDS_REPORT: ReportDef = ReportDef {
    title: "Crime incidents by time range",
    note: None,
    file: "crime_by_time_range.csv",
};
pub const DANGEROUS_TIMES: ReportDef = ReportDef {
    title: "Most and least dangerous crime times",
    note: Some("Minute of day with the highest and lowest incident count"),
    file: "dangerous_crime_times.csv",
};

pub const MANIFEST_FILE: &str = "reports.json";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_dir: PathBuf,
    pub preview_rows: usize,
}

fn query_rows<T>(
    conn: &Connection,
    report: &'static str,
    sql: &str,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, ReportError> {
    let query_err = |source| ReportError::Query { report, source };
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let rows = stmt.query_map([], map).map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<T>>>().map_err(query_err)
}

/// Query 1: incidents per offense description, most frequent first.
pub fn offense_counts(conn: &Connection) -> Result<Vec<OffenseCountRow>, ReportError> {
    query_rows(
        conn,
        OFFENSE_COUNTS.file,
        "SELECT OFFENSE_DESCRIPTION, COUNT(*) AS total
         FROM incidents
         GROUP BY OFFENSE_DESCRIPTION
         ORDER BY total DESC, OFFENSE_DESCRIPTION ASC",
        |row| {
            Ok(OffenseCountRow {
                offense_description: row.get(0)?,
                count: row.get(1)?,
            })
        },
    )
}

/// Query 2: street/location groups whose average monthly count exceeds
/// [`HOTSPOT_THRESHOLD`].
pub fn street_hotspots(conn: &Connection) -> Result<Vec<StreetHotspotRow>, ReportError> {
    let query_err = |source| ReportError::Query {
        report: STREET_HOTSPOTS.file,
        source,
    };
    let mut stmt = conn
        .prepare(
            "SELECT STREET, LAT, LONG, AVG(monthly_incidents) AS avg_incidents_per_month
             FROM (
                 SELECT STREET, LAT, LONG, MONTH, COUNT(*) AS monthly_incidents
                 FROM incidents
                 GROUP BY STREET, LAT, LONG, MONTH
             ) AS monthly_totals
             GROUP BY STREET, LAT, LONG
             HAVING avg_incidents_per_month > ?1
             ORDER BY avg_incidents_per_month DESC, STREET ASC",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![HOTSPOT_THRESHOLD], |row| {
            Ok(StreetHotspotRow {
                street: row.get(0)?,
                lat: row.get(1)?,
                long: row.get(2)?,
                avg_incidents_per_month: row.get(3)?,
            })
        })
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

/// Query 3: incidents per month and weekday, weekdays in calendar order.
pub fn month_weekday_totals(conn: &Connection) -> Result<Vec<MonthWeekdayRow>, ReportError> {
    let sql = format!(
        "SELECT MONTH, DAY_OF_WEEK, COUNT(*) AS total_incidents
         FROM incidents
         GROUP BY MONTH, DAY_OF_WEEK
         ORDER BY MONTH ASC, {} ASC, DAY_OF_WEEK ASC",
        *WEEKDAY_RANK
    );
    query_rows(conn, MONTH_WEEKDAY.file, &sql, |row| {
        Ok(MonthWeekdayRow {
            month: row.get(0)?,
            day_of_week: row.get(1)?,
            total_incidents: row.get(2)?,
        })
    })
}

fn period_totals(conn: &Connection, report: &'static str, column: &str) -> Result<Vec<(i64, i64)>, ReportError> {
    let sql = format!(
        "SELECT {column}, COUNT(*) AS total_incidents FROM incidents GROUP BY {column} ORDER BY {column} ASC"
    );
    query_rows(conn, report, &sql, |row| Ok((row.get(0)?, row.get(1)?)))
}

/// Query 4: incidents per month with month-over-month change.
pub fn monthly_trend(conn: &Connection) -> Result<Vec<MonthlyTrendRow>, ReportError> {
    let totals = period_totals(conn, MONTHLY_TREND.file, "MONTH")?;
    let counts: Vec<i64> = totals.iter().map(|(_, n)| *n).collect();
    Ok(totals
        .into_iter()
        .zip(pct_change(&counts))
        .map(|((month, total_incidents), percentage_change)| MonthlyTrendRow {
            month,
            total_incidents,
            percentage_change,
        })
        .collect())
}

/// Query 5: incidents per year with year-over-year change.
pub fn yearly_trend(conn: &Connection) -> Result<Vec<YearlyTrendRow>, ReportError> {
    let totals = period_totals(conn, YEARLY_TREND.file, "YEAR")?;
    let counts: Vec<i64> = totals.iter().map(|(_, n)| *n).collect();
    Ok(totals
        .into_iter()
        .zip(pct_change(&counts))
        .map(|((year, total_incidents), yoy_percentage_change)| YearlyTrendRow {
            year,
            total_incidents,
            yoy_percentage_change,
        })
        .collect())
}

/// Query 6: incidents per three-hour band, busiest first.
pub fn time_band_totals(conn: &Connection) -> Result<Vec<TimeBandRow>, ReportError> {
    let sql = format!(
        "SELECT {label} AS time_range, COUNT(*) AS total_incidents, MIN({hour}) AS first_hour
         FROM incidents
         GROUP BY time_range
         ORDER BY total_incidents DESC, first_hour ASC",
        label = *TIME_BAND_LABEL,
        hour = HOUR_EXPR
    );
    query_rows(conn, TIME_BANDS_REPORT.file, &sql, |row| {
        Ok(TimeBandRow {
            time_range: row.get(0)?,
            total_incidents: row.get(1)?,
        })
    })
}

/// Query 7: the busiest and the quietest `HH:MM` minute of the day.
pub fn dangerous_times(conn: &Connection) -> Result<DangerousTimesRow, ReportError> {
    let extreme = |direction: &str| -> Result<Option<(String, i64)>, ReportError> {
        let sql = format!(
            "SELECT strftime('%H:%M', OCCURRED_ON_DATE) AS crime_time, COUNT(*) AS total_incidents
             FROM incidents
             GROUP BY crime_time
             ORDER BY total_incidents {direction}, crime_time ASC
             LIMIT 1"
        );
        conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(|source| ReportError::Query {
                report: DANGEROUS_TIMES.file,
                source,
            })
    };
    match (extreme("DESC")?, extreme("ASC")?) {
        (Some((most_time, most)), Some((least_time, least))) => Ok(DangerousTimesRow {
            most_dangerous_time: most_time,
            most_dangerous_incidents: most,
            least_dangerous_time: least_time,
            least_dangerous_incidents: least,
        }),
        _ => Err(ReportError::EmptyDataset(DANGEROUS_TIMES.file)),
    }
}

fn emit<T>(
    no: usize,
    def: &ReportDef,
    rows: &[T],
    opts: &ReportOptions,
) -> Result<ReportSummary, ReportError>
where
    T: Serialize + Tabled + Clone,
{
    output::preview_table(no, def.title, def.note, rows, opts.preview_rows);
    let path = opts.output_dir.join(def.file);
    output::write_csv(&path, rows)?;
    println!("(Full table exported to {})", path.display());
    log::info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(ReportSummary {
        title: def.title.to_string(),
        file: def.file.to_string(),
        rows: rows.len(),
    })
}

/// Run the seven queries against the persisted table, then export them in
/// order and write the manifest. One connection serves the whole phase.
pub fn run_all(persisted: &Persisted, opts: &ReportOptions) -> Result<Vec<ReportSummary>, ReportError> {
    let conn = persisted.open()?;
    log::info!(
        "generating reports from {} ({} incidents)",
        persisted.db_path().display(),
        format_int(persisted.rows())
    );

    // Every query runs before any file is touched, so a failing report
    // leaves the previous run's outputs as a consistent set.
    let offenses = offense_counts(&conn)?;
    let hotspots = street_hotspots(&conn)?;
    let month_weekday = month_weekday_totals(&conn)?;
    let monthly = monthly_trend(&conn)?;
    let yearly = yearly_trend(&conn)?;
    let bands = time_band_totals(&conn)?;
    let extremes = dangerous_times(&conn)?;

    std::fs::create_dir_all(&opts.output_dir).map_err(|source| ReportError::Io {
        path: opts.output_dir.clone(),
        source,
    })?;
    let summaries = vec![
        emit(1, &OFFENSE_COUNTS, &offenses, opts)?,
        emit(2, &STREET_HOTSPOTS, &hotspots, opts)?,
        emit(3, &MONTH_WEEKDAY, &month_weekday, opts)?,
        emit(4, &MONTHLY_TREND, &monthly, opts)?,
        emit(5, &YEARLY_TREND, &yearly, opts)?,
        emit(6, &TIME_BANDS_REPORT, &bands, opts)?,
        emit(7, &DANGEROUS_TIMES, &[extremes], opts)?,
    ];

    let manifest = RunManifest {
        database: persisted.db_path().display().to_string(),
        incidents: persisted.rows(),
        reports: summaries.clone(),
    };
    output::write_json(&opts.output_dir.join(MANIFEST_FILE), &manifest)?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::replace_incidents;
    use crate::store::tests::incident;
    use crate::types::Incident;

    fn conn_with(incidents: &[Incident]) -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        replace_incidents(&mut conn, incidents).unwrap();
        conn
    }

    fn repeat(n: usize, description: &str, occurred_on: &str) -> Vec<Incident> {
        (0..n).map(|_| incident(description, occurred_on)).collect()
    }

    #[test]
    fn offense_counts_sorted_descending() {
        let mut rows = repeat(1, "B", "2018-01-01 10:00:00");
        rows.extend(repeat(3, "C", "2018-01-01 10:00:00"));
        rows.extend(repeat(2, "A", "2018-01-01 10:00:00"));
        let got = offense_counts(&conn_with(&rows)).unwrap();
        let pairs: Vec<(&str, i64)> = got.iter().map(|r| (r.offense_description.as_str(), r.count)).collect();
        assert_eq!(pairs, vec![("C", 3), ("A", 2), ("B", 1)]);
    }

    #[test]
    fn hotspots_require_average_above_ten() {
        let mut rows = Vec::new();
        // 11 per month for two months: average 11, kept.
        for mut i in repeat(11, "A", "2018-01-05 10:00:00")
            .into_iter()
            .chain(repeat(11, "A", "2018-02-05 10:00:00"))
        {
            i.street = "BLUE HILL AVE".into();
            rows.push(i);
        }
        // Exactly 10 per month: excluded.
        for mut i in repeat(10, "A", "2018-01-05 10:00:00")
            .into_iter()
            .chain(repeat(10, "A", "2018-02-05 10:00:00"))
        {
            i.street = "BOYLSTON ST".into();
            rows.push(i);
        }
        // 12 on the same street but elsewhere: its own group.
        for mut i in repeat(12, "A", "2018-01-05 10:00:00") {
            i.street = "BLUE HILL AVE".into();
            i.latitude = 42.30;
            rows.push(i);
        }

        let got = street_hotspots(&conn_with(&rows)).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].avg_incidents_per_month, 12.0);
        assert_eq!(got[0].lat, 42.30);
        assert_eq!(got[1].street, "BLUE HILL AVE");
        assert_eq!(got[1].avg_incidents_per_month, 11.0);
        assert!(got.iter().all(|r| r.avg_incidents_per_month > HOTSPOT_THRESHOLD));
    }

    #[test]
    fn weekdays_follow_calendar_order() {
        // 2018-01-06 Saturday, 2018-01-03 Wednesday, 2018-01-07 Sunday,
        // 2018-01-01 Monday, 2018-02-01 Thursday.
        let rows = vec![
            incident("A", "2018-01-06 10:00:00"),
            incident("A", "2018-01-03 10:00:00"),
            incident("A", "2018-02-01 10:00:00"),
            incident("A", "2018-01-07 10:00:00"),
            incident("A", "2018-01-01 10:00:00"),
            incident("A", "2018-01-13 10:00:00"),
        ];
        let got = month_weekday_totals(&conn_with(&rows)).unwrap();
        let order: Vec<(i64, &str, i64)> = got
            .iter()
            .map(|r| (r.month, r.day_of_week.as_str(), r.total_incidents))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "Sunday", 1),
                (1, "Monday", 1),
                (1, "Wednesday", 1),
                (1, "Saturday", 2),
                (2, "Thursday", 1),
            ]
        );
    }

    #[test]
    fn monthly_trend_computes_change_from_previous_month() {
        let mut rows = repeat(4, "A", "2018-01-10 10:00:00");
        rows.extend(repeat(6, "A", "2018-02-10 10:00:00"));
        rows.extend(repeat(3, "A", "2018-03-10 10:00:00"));
        let got = monthly_trend(&conn_with(&rows)).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].percentage_change, 0.0);
        assert!((got[1].percentage_change - 50.0).abs() < 1e-9);
        assert!((got[2].percentage_change + 50.0).abs() < 1e-9);
    }

    #[test]
    fn yearly_trend_first_year_is_zero() {
        let mut rows = repeat(2, "A", "2016-05-10 10:00:00");
        rows.extend(repeat(3, "A", "2017-05-10 10:00:00"));
        let got = yearly_trend(&conn_with(&rows)).unwrap();
        assert_eq!(got[0].year, 2016);
        assert_eq!(got[0].yoy_percentage_change, 0.0);
        assert_eq!(got[1].total_incidents, 3);
        assert!((got[1].yoy_percentage_change - 50.0).abs() < 1e-9);
    }

    #[test]
    fn time_bands_bucket_by_hour() {
        let mut rows = repeat(3, "A", "2018-01-01 23:59:00");
        rows.extend(repeat(2, "A", "2018-01-01 00:10:00"));
        rows.extend(repeat(2, "A", "2018-01-01 14:00:00"));
        rows.push(incident("A", "2018-01-01 21:00:00"));
        let got = time_band_totals(&conn_with(&rows)).unwrap();
        let pairs: Vec<(&str, i64)> = got.iter().map(|r| (r.time_range.as_str(), r.total_incidents)).collect();
        assert_eq!(
            pairs,
            vec![
                ("9:00 PM - 11:59 PM", 4),
                ("12:00 AM - 2:59 AM", 2),
                ("12:00 PM - 2:59 PM", 2),
            ]
        );
    }

    #[test]
    fn time_band_edges_fall_on_three_hour_boundaries() {
        let rows = vec![
            incident("A", "2018-01-01 02:59:00"),
            incident("A", "2018-01-01 03:00:00"),
            incident("A", "2018-01-01 03:00:00"),
            incident("A", "2018-01-01 20:59:00"),
            incident("A", "2018-01-01 20:59:00"),
            incident("A", "2018-01-01 20:59:00"),
            incident("A", "2018-01-01 21:00:00"),
            incident("A", "2018-01-01 21:00:00"),
            incident("A", "2018-01-01 21:00:00"),
            incident("A", "2018-01-01 21:00:00"),
        ];
        let got = time_band_totals(&conn_with(&rows)).unwrap();
        let pairs: Vec<(&str, i64)> = got.iter().map(|r| (r.time_range.as_str(), r.total_incidents)).collect();
        assert_eq!(
            pairs,
            vec![
                ("9:00 PM - 11:59 PM", 4),
                ("6:00 PM - 8:59 PM", 3),
                ("3:00 AM - 5:59 AM", 2),
                ("12:00 AM - 2:59 AM", 1),
            ]
        );
    }

    #[test]
    fn empty_table_writes_no_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = crate::store::persist(&dir.path().join("crime.db"), &[]).unwrap();
        let opts = ReportOptions {
            output_dir: dir.path().join("Queries"),
            preview_rows: 5,
        };
        let err = run_all(&persisted, &opts).unwrap_err();
        assert!(matches!(err, ReportError::EmptyDataset(_)));
        assert!(!opts.output_dir.exists());
    }

    #[test]
    fn run_all_writes_every_report_and_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = crate::store::persist(
            &dir.path().join("crime.db"),
            &repeat(2, "A", "2018-01-01 10:00:00"),
        )
        .unwrap();
        let opts = ReportOptions {
            output_dir: dir.path().join("Queries"),
            preview_rows: 5,
        };
        let summaries = run_all(&persisted, &opts).unwrap();
        assert_eq!(summaries.len(), 7);
        for s in &summaries {
            assert!(opts.output_dir.join(&s.file).exists(), "{} missing", s.file);
        }
        assert!(opts.output_dir.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn dangerous_times_pick_extremes() {
        let mut rows = repeat(3, "A", "2018-01-01 17:00:00");
        rows.extend(repeat(2, "A", "2018-01-02 08:15:00"));
        rows.push(incident("A", "2018-01-03 04:37:00"));
        let got = dangerous_times(&conn_with(&rows)).unwrap();
        assert_eq!(got.most_dangerous_time, "17:00");
        assert_eq!(got.most_dangerous_incidents, 3);
        assert_eq!(got.least_dangerous_time, "04:37");
        assert_eq!(got.least_dangerous_incidents, 1);
        assert!(got.most_dangerous_incidents >= got.least_dangerous_incidents);
    }

    #[test]
    fn dangerous_times_on_empty_table_fails() {
        let err = dangerous_times(&conn_with(&[])).unwrap_err();
        assert!(matches!(err, ReportError::EmptyDataset(_)));
    }
}
