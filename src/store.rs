// SQLite persistence for normalized incidents.

use crate::error::StoreError;
use crate::types::Incident;
use crate::util::format_timestamp;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub const TABLE: &str = "incidents";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS incidents (
        INCIDENT_NUMBER TEXT,
        OFFENSE_CODE INTEGER,
        OFFENSE_CODE_GROUP TEXT,
        OFFENSE_DESCRIPTION TEXT,
        DISTRICT TEXT,
        REPORTING_AREA INTEGER,
        STREET TEXT,
        OCCURRED_ON_DATE TEXT,
        YEAR INTEGER,
        MONTH INTEGER,
        DAY_OF_WEEK TEXT,
        LONG REAL,
        LAT REAL
    );
"#;

const INSERT: &str = r#"
    INSERT INTO incidents (
        INCIDENT_NUMBER, OFFENSE_CODE, OFFENSE_CODE_GROUP, OFFENSE_DESCRIPTION,
        DISTRICT, REPORTING_AREA, STREET, OCCURRED_ON_DATE, YEAR, MONTH,
        DAY_OF_WEEK, LONG, LAT
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
"#;

/// Proof that the `incidents` table holds the current run's data.
///
/// Only [`persist`] hands one out, and the reporting phase requires it, so
/// reports never run against a table the current run failed to write.
#[derive(Debug, Clone)]
pub struct Persisted {
    db_path: PathBuf,
    rows: usize,
}

impl Persisted {
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Opens a fresh connection to the persisted database.
    pub fn open(&self) -> Result<Connection, StoreError> {
        open(&self.db_path)
    }
}

pub fn open(path: &Path) -> Result<Connection, StoreError> {
    Connection::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the `incidents` table in the database at `path` with `incidents`.
///
/// The connection lives only for this call and is dropped on every return
/// path. Failures are logged and returned; nothing is swallowed.
pub fn persist(path: &Path, incidents: &[Incident]) -> Result<Persisted, StoreError> {
    let result = open(path).and_then(|mut conn| {
        ensure_schema(&conn)?;
        replace_incidents(&mut conn, incidents)
    });
    match result {
        Ok(rows) => {
            log::info!("persisted {} incidents to {}", rows, path.display());
            Ok(Persisted {
                db_path: path.to_path_buf(),
                rows,
            })
        }
        Err(e) => {
            log::error!("persisting to {} failed: {}", path.display(), e);
            Err(e)
        }
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(CREATE_TABLE)?;
    Ok(())
}

/// Drop, recreate and fill the table in one transaction. On error the
/// transaction rolls back and the previous contents survive.
pub fn replace_incidents(conn: &mut Connection, incidents: &[Incident]) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE};"))?;
    tx.execute_batch(CREATE_TABLE)?;
    {
        let mut stmt = tx.prepare(INSERT)?;
        for i in incidents {
            stmt.execute(params![
                i.incident_number,
                i.offense_code,
                i.offense_code_group,
                i.offense_description,
                i.district,
                i.reporting_area,
                i.street,
                format_timestamp(i.occurred_on),
                i.year,
                i.month,
                i.day_of_week,
                i.longitude,
                i.latitude,
            ])?;
        }
    }
    tx.commit()?;
    Ok(incidents.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::parse_timestamp;

    fn count_incidents(conn: &Connection) -> usize {
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))
            .unwrap();
        n as usize
    }

    pub(crate) fn incident(description: &str, occurred_on: &str) -> Incident {
        let ts = parse_timestamp(occurred_on).unwrap();
        Incident {
            incident_number: format!("I-{occurred_on}"),
            offense_code: 3115,
            offense_code_group: "Investigate Person".into(),
            offense_description: description.into(),
            district: "B2".into(),
            reporting_area: 330,
            street: "WASHINGTON ST".into(),
            occurred_on: ts,
            year: chrono::Datelike::year(&ts) as i64,
            month: chrono::Datelike::month(&ts) as i64,
            day_of_week: ts.format("%A").to_string(),
            longitude: -71.08,
            latitude: 42.33,
        }
    }

    #[test]
    fn persist_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("crime.db");

        let first = vec![
            incident("A", "2018-01-01 10:00:00"),
            incident("B", "2018-01-02 11:00:00"),
            incident("C", "2018-01-03 12:00:00"),
        ];
        assert_eq!(persist(&db, &first).unwrap().rows(), 3);

        let second = vec![incident("D", "2018-02-01 10:00:00")];
        let persisted = persist(&db, &second).unwrap();
        assert_eq!(persisted.db_path(), db.as_path());

        let conn = persisted.open().unwrap();
        assert_eq!(count_incidents(&conn), 1);
        let desc: String = conn
            .query_row("SELECT OFFENSE_DESCRIPTION FROM incidents", [], |r| r.get(0))
            .unwrap();
        assert_eq!(desc, "D");
    }

    #[test]
    fn timestamps_are_readable_by_strftime() {
        let mut conn = Connection::open_in_memory().unwrap();
        replace_incidents(&mut conn, &[incident("A", "2018-09-02 13:45:00")]).unwrap();
        let (hour, minute): (String, String) = conn
            .query_row(
                "SELECT strftime('%H', OCCURRED_ON_DATE), strftime('%H:%M', OCCURRED_ON_DATE) FROM incidents",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(hour, "13");
        assert_eq!(minute, "13:45");
    }

    #[test]
    fn schema_keeps_street_column() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let mut stmt = conn.prepare("PRAGMA table_info(incidents)").unwrap();
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(cols.len(), 13);
        assert!(cols.iter().any(|c| c == "STREET"));
    }

    #[test]
    fn open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing").join("crime.db");
        let err = persist(&db, &[]).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }
}
