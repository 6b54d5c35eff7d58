use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::catalog::model::{ScanRunRow, ScanStatus};

/// Counters owned by the writer thread. Absolute values, written per batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanProgress {
    pub media_files_processed: i64,
    pub metadata_files_processed: i64,
    pub media_new_files: i64,
    pub media_unchanged_files: i64,
    pub media_changed_files: i64,
    pub media_error_files: i64,
}

/// Create a scan run row with a random id and a UTC start timestamp.
pub fn create_scan_run(conn: &Connection) -> rusqlite::Result<String> {
    let scan_run_id = Uuid::new_v4().to_string();
    let start = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO scan_runs (scan_run_id, status, start_timestamp)
         VALUES (?1, 'running', ?2)",
        params![scan_run_id, start],
    )?;

    tracing::info!("created scan run {}", scan_run_id);
    Ok(scan_run_id)
}

/// Record discovery-phase totals, known before any file work begins.
pub fn set_discovery_counts(
    conn: &Connection,
    scan_run_id: &str,
    total_files: i64,
    media_files: i64,
    metadata_files: i64,
    albums_total: i64,
    files_in_albums: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE scan_runs SET
            total_files_discovered = ?2,
            media_files_discovered = ?3,
            metadata_files_discovered = ?4,
            albums_total = ?5,
            files_in_albums = ?6
         WHERE scan_run_id = ?1",
        params![
            scan_run_id,
            total_files,
            media_files,
            metadata_files,
            albums_total,
            files_in_albums
        ],
    )?;
    Ok(())
}

pub fn update_progress(
    conn: &Connection,
    scan_run_id: &str,
    progress: &ScanProgress,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE scan_runs SET
            media_files_processed = ?2,
            metadata_files_processed = ?3,
            media_new_files = ?4,
            media_unchanged_files = ?5,
            media_changed_files = ?6,
            media_error_files = ?7
         WHERE scan_run_id = ?1",
        params![
            scan_run_id,
            progress.media_files_processed,
            progress.metadata_files_processed,
            progress.media_new_files,
            progress.media_unchanged_files,
            progress.media_changed_files,
            progress.media_error_files,
        ],
    )?;
    Ok(())
}

pub fn set_validation_counts(
    conn: &Connection,
    scan_run_id: &str,
    missing_files: i64,
    inconsistent_files: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE scan_runs SET missing_files = ?2, inconsistent_files = ?3
         WHERE scan_run_id = ?1",
        params![scan_run_id, missing_files, inconsistent_files],
    )?;
    Ok(())
}

/// Close the run: final status, end timestamp, duration, and throughput,
/// computed in SQL from the recorded start timestamp.
pub fn complete_scan_run(
    conn: &Connection,
    scan_run_id: &str,
    status: ScanStatus,
) -> rusqlite::Result<()> {
    let end = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE scan_runs SET
            status = ?2,
            end_timestamp = ?3,
            duration_seconds = (julianday(?3) - julianday(start_timestamp)) * 86400,
            files_per_second = CASE
                WHEN media_files_processed > 0
                 AND (julianday(?3) - julianday(start_timestamp)) > 0 THEN
                    CAST(media_files_processed AS REAL) /
                    ((julianday(?3) - julianday(start_timestamp)) * 86400)
                ELSE 0
            END
         WHERE scan_run_id = ?1",
        params![scan_run_id, status.as_str(), end],
    )?;

    tracing::info!("scan run {} closed as {}", scan_run_id, status.as_str());
    Ok(())
}

pub fn get_scan_run(conn: &Connection, scan_run_id: &str) -> rusqlite::Result<Option<ScanRunRow>> {
    conn.query_row(
        "SELECT scan_run_id, start_timestamp, end_timestamp, status,
                duration_seconds, files_per_second,
                total_files_discovered, media_files_discovered,
                metadata_files_discovered, media_files_processed,
                metadata_files_processed, media_new_files,
                media_unchanged_files, media_changed_files, missing_files,
                media_error_files, inconsistent_files, albums_total,
                files_in_albums
         FROM scan_runs WHERE scan_run_id = ?1",
        params![scan_run_id],
        |row| {
            Ok(ScanRunRow {
                scan_run_id: row.get(0)?,
                start_timestamp: row.get(1)?,
                end_timestamp: row.get(2)?,
                status: row.get(3)?,
                duration_seconds: row.get(4)?,
                files_per_second: row.get(5)?,
                total_files_discovered: row.get(6)?,
                media_files_discovered: row.get(7)?,
                metadata_files_discovered: row.get(8)?,
                media_files_processed: row.get(9)?,
                metadata_files_processed: row.get(10)?,
                media_new_files: row.get(11)?,
                media_unchanged_files: row.get(12)?,
                media_changed_files: row.get(13)?,
                missing_files: row.get(14)?,
                media_error_files: row.get(15)?,
                inconsistent_files: row.get(16)?,
                albums_total: row.get(17)?,
                files_in_albums: row.get(18)?,
            })
        },
    )
    .optional()
}
