use chrono::Utc;
use rusqlite::{params, Connection};

use crate::catalog::model::ProcessingErrorRecord;

pub fn insert_error(conn: &Connection, error: &ProcessingErrorRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO processing_errors (
            scan_run_id, relative_path, error_type, error_category,
            error_message, timestamp
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            error.scan_run_id,
            error.relative_path,
            error.error_type.as_str(),
            error.error_category.as_str(),
            error.error_message,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn count_errors_for_run(conn: &Connection, scan_run_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM processing_errors WHERE scan_run_id = ?1",
        params![scan_run_id],
        |row| row.get(0),
    )
}

/// Per-category error counts for the scan summary.
pub fn error_breakdown(
    conn: &Connection,
    scan_run_id: &str,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT error_category, COUNT(*) FROM processing_errors
         WHERE scan_run_id = ?1 GROUP BY error_category ORDER BY error_category",
    )?;
    let rows = stmt.query_map(params![scan_run_id], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    rows.collect()
}

pub fn errors_for_path(
    conn: &Connection,
    relative_path: &str,
) -> rusqlite::Result<Vec<ProcessingErrorRecord>> {
    use crate::errors::{ErrorCategory, ErrorType};

    let mut stmt = conn.prepare(
        "SELECT scan_run_id, relative_path, error_type, error_category, error_message
         FROM processing_errors WHERE relative_path = ?1 ORDER BY error_id",
    )?;
    let rows = stmt.query_map(params![relative_path], |row| {
        let error_type: String = row.get(2)?;
        let category: String = row.get(3)?;
        Ok(ProcessingErrorRecord {
            scan_run_id: row.get(0)?,
            relative_path: row.get(1)?,
            error_type: match error_type.as_str() {
                "json_sidecar" => ErrorType::JsonSidecar,
                "album_metadata" => ErrorType::AlbumMetadata,
                _ => ErrorType::MediaFile,
            },
            error_category: match category.as_str() {
                "permission" => ErrorCategory::Permission,
                "corrupted" => ErrorCategory::Corrupted,
                "io" => ErrorCategory::Io,
                "parse" => ErrorCategory::Parse,
                "unsupported" => ErrorCategory::Unsupported,
                "tool_missing" => ErrorCategory::ToolMissing,
                _ => ErrorCategory::Unknown,
            },
            error_message: row.get(4)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use crate::errors::{ErrorCategory, ErrorType};

    fn in_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn make_error(path: &str, category: ErrorCategory) -> ProcessingErrorRecord {
        ProcessingErrorRecord {
            scan_run_id: "run-1".into(),
            relative_path: path.into(),
            error_type: ErrorType::MediaFile,
            error_category: category,
            error_message: "boom".into(),
        }
    }

    #[test]
    fn test_insert_and_count() {
        let conn = in_memory();
        insert_error(&conn, &make_error("a.jpg", ErrorCategory::Corrupted)).unwrap();
        insert_error(&conn, &make_error("b.jpg", ErrorCategory::Io)).unwrap();
        assert_eq!(count_errors_for_run(&conn, "run-1").unwrap(), 2);
        assert_eq!(count_errors_for_run(&conn, "run-2").unwrap(), 0);
    }

    #[test]
    fn test_breakdown_groups_by_category() {
        let conn = in_memory();
        insert_error(&conn, &make_error("a.jpg", ErrorCategory::Corrupted)).unwrap();
        insert_error(&conn, &make_error("b.jpg", ErrorCategory::Corrupted)).unwrap();
        insert_error(&conn, &make_error("c.jpg", ErrorCategory::Parse)).unwrap();

        let breakdown = error_breakdown(&conn, "run-1").unwrap();
        assert_eq!(
            breakdown,
            vec![("corrupted".to_string(), 2), ("parse".to_string(), 1)]
        );
    }

    #[test]
    fn test_errors_for_path_roundtrips_type_and_category() {
        let conn = in_memory();
        let mut err = make_error("Trip/x.jpg", ErrorCategory::ToolMissing);
        err.error_type = ErrorType::JsonSidecar;
        insert_error(&conn, &err).unwrap();

        let found = errors_for_path(&conn, "Trip/x.jpg").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].error_type, ErrorType::JsonSidecar);
        assert_eq!(found[0].error_category, ErrorCategory::ToolMissing);
    }
}
