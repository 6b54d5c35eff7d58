use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::catalog::{albums, media_items, scan_runs};
use crate::catalog::model::MediaStatus;
use crate::errors::ScanError;

/// Outcome of post-scan validation, folded into the scan summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationStats {
    pub missing_files: usize,
    pub inconsistent_files: usize,
    pub missing_albums: usize,
    pub present_files: i64,
    pub error_files: i64,
    pub total_files: i64,
}

/// After the writer joins: demote rows this scan did not touch, flag
/// transactional anomalies, and reconcile counters against actual rows.
pub fn validate_scan(
    conn: &Connection,
    scan_run_id: &str,
    scan_start: &DateTime<Utc>,
) -> Result<ValidationStats, ScanError> {
    let mut stats = ValidationStats::default();

    // 1. Media rows from previous runs still marked present are missing.
    stats.missing_files = media_items::mark_missing(conn, scan_run_id)?;
    if stats.missing_files > 0 {
        tracing::info!("marked {} media item(s) missing", stats.missing_files);
    }

    // 2. Rows claimed by this run but last seen before it started point at
    // a transactional anomaly.
    stats.inconsistent_files = media_items::mark_inconsistent(conn, scan_run_id, scan_start)?;
    if stats.inconsistent_files > 0 {
        tracing::warn!(
            "marked {} media item(s) inconsistent",
            stats.inconsistent_files
        );
    }

    // 3. Albums this scan did not touch.
    stats.missing_albums = albums::mark_albums_missing(conn, scan_run_id)?;
    if stats.missing_albums > 0 {
        tracing::info!("marked {} album(s) missing", stats.missing_albums);
    }

    scan_runs::set_validation_counts(
        conn,
        scan_run_id,
        stats.missing_files as i64,
        stats.inconsistent_files as i64,
    )?;

    // 4. Reconcile counters against actual row counts; mismatches are
    // warnings, not failures.
    if let Some(run) = scan_runs::get_scan_run(conn, scan_run_id)? {
        let actual_items = media_items::count_for_scan_run(conn, scan_run_id)?;
        if run.media_files_processed != actual_items {
            tracing::warn!(
                "scan counter mismatch: media_files_processed={} but {} rows carry this scan run",
                run.media_files_processed,
                actual_items
            );
        }

        let actual_albums: i64 = conn.query_row(
            "SELECT COUNT(*) FROM albums WHERE scan_run_id = ?1",
            rusqlite::params![scan_run_id],
            |row| row.get(0),
        )?;
        if run.albums_total != actual_albums {
            tracing::warn!(
                "album counter mismatch: albums_total={} but {} albums carry this scan run",
                run.albums_total,
                actual_albums
            );
        }
    }

    stats.present_files = media_items::count_by_status(conn, MediaStatus::Present)?;
    stats.error_files = media_items::count_by_status(conn, MediaStatus::Error)?;
    stats.total_files = conn.query_row("SELECT COUNT(*) FROM media_items", [], |r| r.get(0))?;

    tracing::info!(
        "post-scan validation: {} present, {} missing, {} inconsistent, {} error",
        stats.present_files,
        stats.missing_files,
        stats.inconsistent_files,
        stats.error_files
    );

    Ok(stats)
}
