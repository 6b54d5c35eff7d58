use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rusqlite::Connection;

use crate::catalog::errors::insert_error;
use crate::catalog::media_items::{batch_mark_seen, insert_media_item};
use crate::catalog::scan_runs::{update_progress, ScanProgress};
use crate::db::open_catalog;
use crate::errors::ScanError;
use crate::scan::ScanResult;

/// How long the writer waits on the queue before polling again.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            batch_size: 100,
            max_retries: 3,
        }
    }
}

/// Totals accumulated by the writer; it is the only thread touching
/// scan-run counters, so no cross-thread races are possible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub media_written: usize,
    pub sidecars_written: usize,
    pub unchanged: usize,
    pub errors: usize,
}

/// Single-thread batch consumer of the results queue. Owns its own catalog
/// connection. Batches up to `batch_size` results per transaction; the
/// `Shutdown` sentinel (or a disconnected channel) flushes and exits.
pub fn writer_main(
    results: Receiver<ScanResult>,
    db_path: &Path,
    scan_run_id: &str,
    config: WriterConfig,
) -> Result<WriterStats, ScanError> {
    let mut conn = open_catalog(db_path)
        .map_err(|e| ScanError::Fatal(format!("writer cannot open catalog: {}", e)))?;

    tracing::info!("writer started (batch_size={})", config.batch_size);

    let mut stats = WriterStats::default();
    let mut batch: Vec<ScanResult> = Vec::with_capacity(config.batch_size);

    loop {
        match results.recv_timeout(POLL_TIMEOUT) {
            Ok(ScanResult::Shutdown) => {
                flush(&mut conn, &mut batch, scan_run_id, &mut stats, &config)?;
                break;
            }
            Ok(result) => {
                batch.push(result);
                if batch.len() >= config.batch_size {
                    flush(&mut conn, &mut batch, scan_run_id, &mut stats, &config)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                flush(&mut conn, &mut batch, scan_run_id, &mut stats, &config)?;
                break;
            }
        }
    }

    tracing::info!(
        "writer finished: {} media rows, {} unchanged, {} errors",
        stats.media_written,
        stats.unchanged,
        stats.errors
    );
    Ok(stats)
}

fn flush(
    conn: &mut Connection,
    batch: &mut Vec<ScanResult>,
    scan_run_id: &str,
    stats: &mut WriterStats,
    config: &WriterConfig,
) -> Result<(), ScanError> {
    if batch.is_empty() {
        return Ok(());
    }

    write_batch_with_retry(conn, batch, scan_run_id, stats, config)?;
    batch.clear();

    update_progress(
        conn,
        scan_run_id,
        &ScanProgress {
            media_files_processed: (stats.media_written + stats.unchanged) as i64,
            metadata_files_processed: stats.sidecars_written as i64,
            media_new_files: stats.media_written as i64,
            media_unchanged_files: stats.unchanged as i64,
            media_changed_files: 0,
            media_error_files: stats.errors as i64,
        },
    )?;
    Ok(())
}

/// Persistent batch failures terminate the scan; transient ones (usually
/// lock contention) are retried with exponential backoff.
fn write_batch_with_retry(
    conn: &mut Connection,
    batch: &[ScanResult],
    scan_run_id: &str,
    stats: &mut WriterStats,
    config: &WriterConfig,
) -> Result<(), ScanError> {
    let mut attempt = 0u32;
    loop {
        match write_batch(conn, batch, scan_run_id, stats) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < config.max_retries => {
                let backoff = Duration::from_millis(100 * (1 << attempt));
                tracing::warn!(
                    "batch write failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    config.max_retries,
                    backoff,
                    e
                );
                std::thread::sleep(backoff);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    "batch write failed after {} attempts ({} items): {}",
                    config.max_retries,
                    batch.len(),
                    e
                );
                if let Some(first) = batch.first() {
                    tracing::error!("first item in failed batch: {:?}", first);
                }
                return Err(e);
            }
        }
    }
}

fn write_batch(
    conn: &mut Connection,
    batch: &[ScanResult],
    scan_run_id: &str,
    stats: &mut WriterStats,
) -> Result<(), ScanError> {
    let tx = conn.transaction()?;
    let mut written = WriterStats::default();
    let mut seen_paths: Vec<String> = Vec::new();

    for result in batch {
        match result {
            ScanResult::Media(record) => {
                insert_media_item(&tx, record)?;
                written.media_written += 1;
                if record.sidecar_fingerprint.is_some() {
                    written.sidecars_written += 1;
                }
            }
            ScanResult::Unchanged(unchanged) => {
                seen_paths.push(unchanged.relative_path.clone());
            }
            ScanResult::Error(error) => {
                insert_error(&tx, error)?;
                written.errors += 1;
            }
            ScanResult::Shutdown => {}
        }
    }

    if !seen_paths.is_empty() {
        written.unchanged += batch_mark_seen(&tx, &seen_paths, scan_run_id, &Utc::now())?;
    }

    tx.commit()?;

    stats.media_written += written.media_written;
    stats.sidecars_written += written.sidecars_written;
    stats.unchanged += written.unchanged;
    stats.errors += written.errors;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::media_items::{count_for_scan_run, get_media_item_by_path};
    use crate::catalog::model::{MediaItemRecord, ProcessingErrorRecord};
    use crate::catalog::scan_runs::{create_scan_run, get_scan_run};
    use crate::db::run_migrations;
    use crate::errors::{ErrorCategory, ErrorType};
    use crate::scan::UnchangedFile;
    use crossbeam_channel::bounded;

    fn setup_catalog(dir: &std::path::Path) -> (std::path::PathBuf, String) {
        let db_path = dir.join("catalog.db");
        let conn = open_catalog(&db_path).unwrap();
        run_migrations(&conn).unwrap();
        let run_id = create_scan_run(&conn).unwrap();
        (db_path, run_id)
    }

    fn media(path: &str, run_id: &str) -> ScanResult {
        ScanResult::Media(Box::new(MediaItemRecord {
            media_item_id: crate::ids::media_item_id(path, None, 10, None),
            relative_path: path.to_string(),
            album_id: "album-1".into(),
            file_size: 10,
            content_fingerprint: Some("aa".repeat(32)),
            scan_run_id: run_id.to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_writer_drains_and_commits() {
        let tmp = tempfile::tempdir().unwrap();
        let (db_path, run_id) = setup_catalog(tmp.path());

        let (tx, rx) = bounded(16);
        tx.send(media("Trip/a.jpg", &run_id)).unwrap();
        tx.send(media("Trip/b.jpg", &run_id)).unwrap();
        tx.send(ScanResult::Error(ProcessingErrorRecord {
            scan_run_id: run_id.clone(),
            relative_path: "Trip/c.jpg".into(),
            error_type: ErrorType::MediaFile,
            error_category: ErrorCategory::Corrupted,
            error_message: "bad".into(),
        }))
        .unwrap();
        tx.send(ScanResult::Shutdown).unwrap();

        let stats = writer_main(rx, &db_path, &run_id, WriterConfig::default()).unwrap();
        assert_eq!(stats.media_written, 2);
        assert_eq!(stats.errors, 1);

        let conn = open_catalog(&db_path).unwrap();
        assert_eq!(count_for_scan_run(&conn, &run_id).unwrap(), 2);
        let run = get_scan_run(&conn, &run_id).unwrap().unwrap();
        assert_eq!(run.media_files_processed, 2);
        assert_eq!(run.media_new_files, 2);
        assert_eq!(run.media_error_files, 1);
    }

    #[test]
    fn test_writer_unchanged_tokens_refresh_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let (db_path, run_id) = setup_catalog(tmp.path());

        // Seed a row from a previous run.
        {
            let conn = open_catalog(&db_path).unwrap();
            let rec = MediaItemRecord {
                media_item_id: "old-id".into(),
                relative_path: "Trip/a.jpg".into(),
                album_id: "album-1".into(),
                file_size: 10,
                content_fingerprint: Some("aa".repeat(32)),
                scan_run_id: "old-run".into(),
                ..Default::default()
            };
            insert_media_item(&conn, &rec).unwrap();
        }

        let (tx, rx) = bounded(4);
        tx.send(ScanResult::Unchanged(UnchangedFile {
            relative_path: "Trip/a.jpg".into(),
        }))
        .unwrap();
        tx.send(ScanResult::Shutdown).unwrap();

        let stats = writer_main(rx, &db_path, &run_id, WriterConfig::default()).unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.media_written, 0);

        let conn = open_catalog(&db_path).unwrap();
        let row = get_media_item_by_path(&conn, "Trip/a.jpg").unwrap().unwrap();
        assert_eq!(row.record.scan_run_id, run_id);
        // Identity untouched by the lifecycle refresh.
        assert_eq!(row.record.media_item_id, "old-id");

        let run = get_scan_run(&conn, &run_id).unwrap().unwrap();
        assert_eq!(run.media_unchanged_files, 1);
    }

    #[test]
    fn test_writer_exits_on_disconnect() {
        let tmp = tempfile::tempdir().unwrap();
        let (db_path, run_id) = setup_catalog(tmp.path());

        let (tx, rx) = bounded(4);
        tx.send(media("Trip/a.jpg", &run_id)).unwrap();
        drop(tx); // no sentinel; channel disconnect must flush too

        let stats = writer_main(rx, &db_path, &run_id, WriterConfig::default()).unwrap();
        assert_eq!(stats.media_written, 1);
    }

    #[test]
    fn test_writer_batches_below_batch_size() {
        let tmp = tempfile::tempdir().unwrap();
        let (db_path, run_id) = setup_catalog(tmp.path());

        let (tx, rx) = bounded(16);
        for i in 0..5 {
            tx.send(media(&format!("Trip/{}.jpg", i), &run_id)).unwrap();
        }
        tx.send(ScanResult::Shutdown).unwrap();

        let stats = writer_main(
            rx,
            &db_path,
            &run_id,
            WriterConfig {
                batch_size: 2,
                max_retries: 1,
            },
        )
        .unwrap();
        assert_eq!(stats.media_written, 5);
    }

    #[test]
    fn test_duplicate_insert_fails_batch_after_retries() {
        let tmp = tempfile::tempdir().unwrap();
        let (db_path, run_id) = setup_catalog(tmp.path());

        let (tx, rx) = bounded(4);
        tx.send(media("Trip/a.jpg", &run_id)).unwrap();
        tx.send(media("Trip/a.jpg", &run_id)).unwrap(); // same deterministic id
        tx.send(ScanResult::Shutdown).unwrap();

        let result = writer_main(
            rx,
            &db_path,
            &run_id,
            WriterConfig {
                batch_size: 100,
                max_retries: 1,
            },
        );
        assert!(result.is_err());
    }
}
