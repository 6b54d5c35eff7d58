use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError};
use rusqlite::Connection;

use crate::catalog::media_items::{load_fingerprint_index, FingerprintIndex};
use crate::catalog::model::ScanStatus;
use crate::catalog::scan_runs;
use crate::db::{open_catalog, run_migrations};
use crate::errors::ScanError;
use crate::ids;
use crate::scan::albums::discover_albums;
use crate::scan::coordinator::coordinate;
use crate::scan::discovery::{discover_files, FileInfo};
use crate::scan::linking::{link_edited_variants, link_live_photos};
use crate::scan::post_scan::validate_scan;
use crate::scan::processor::{process_file, ToolSettings};
use crate::scan::writer::{writer_main, WriterConfig, WriterStats};
use crate::scan::ScanResult;
use crate::tools::check_required_tools;

/// Queue poll interval; workers recheck the cancellation flag this often.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// CPU worker pool default: 75% of cores, minimum 1.
pub fn default_worker_processes() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (cores * 3 / 4).max(1)
}

/// I/O coordinator default: one per core, minimum 2.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

#[derive(Debug, Clone)]
pub struct ScannerOptions {
    pub worker_threads: usize,
    pub worker_processes: usize,
    pub batch_size: usize,
    pub queue_maxsize: usize,
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        ScannerOptions {
            worker_threads: default_worker_threads(),
            worker_processes: default_worker_processes(),
            batch_size: 100,
            queue_maxsize: 1000,
            use_exiftool: false,
            use_ffprobe: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scan_run_id: String,
    pub status: ScanStatus,
    pub cancelled: bool,
    pub total_files: usize,
    pub files_processed: i64,
    pub duration_seconds: f64,
}

/// Sequences a full scan: open catalog → scan-run row → albums → discovery
/// → worker pool and writer → drain → join → linking → post-scan
/// validation → close. Owns the queues, the pool, and the cancellation
/// flag; all of them are released on every exit path.
pub struct ParallelScanner {
    db_path: PathBuf,
    options: ScannerOptions,
    cancel: Arc<AtomicBool>,
}

impl ParallelScanner {
    pub fn new(db_path: PathBuf, options: ScannerOptions) -> Self {
        tracing::info!(
            "scanner configured: {} worker threads, {} cpu workers, batch_size={}, queue_maxsize={}",
            options.worker_threads,
            options.worker_processes,
            options.batch_size,
            options.queue_maxsize
        );
        ParallelScanner {
            db_path,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag external interrupt handlers can set; workers observe it
    /// on every queue poll.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn scan(&self, target_media_path: &Path) -> Result<ScanOutcome, ScanError> {
        check_required_tools(self.options.use_exiftool, self.options.use_ffprobe)?;

        let conn = open_catalog(&self.db_path)
            .map_err(|e| ScanError::Fatal(format!("cannot open catalog: {}", e)))?;
        run_migrations(&conn).map_err(|e| ScanError::Fatal(format!("migration failed: {}", e)))?;

        let scan_run_id = scan_runs::create_scan_run(&conn)?;
        let scan_start = Utc::now();

        match self.run_phases(&conn, target_media_path, &scan_run_id, &scan_start) {
            Ok(total_files) => {
                let cancelled = self.cancel.load(Ordering::SeqCst);
                let status = if cancelled {
                    ScanStatus::Failed
                } else {
                    ScanStatus::Completed
                };
                scan_runs::complete_scan_run(&conn, &scan_run_id, status)?;

                let run = scan_runs::get_scan_run(&conn, &scan_run_id)?.unwrap_or_default();
                Ok(ScanOutcome {
                    scan_run_id,
                    status,
                    cancelled,
                    total_files,
                    files_processed: run.media_files_processed,
                    duration_seconds: run.duration_seconds.unwrap_or(0.0),
                })
            }
            Err(e) => {
                tracing::error!("scan failed: {}", e);
                // Close the run truthfully; rows committed so far stay put.
                let _ = scan_runs::complete_scan_run(&conn, &scan_run_id, ScanStatus::Failed);
                Err(e)
            }
        }
    }

    fn run_phases(
        &self,
        conn: &Connection,
        target_media_path: &Path,
        scan_run_id: &str,
        scan_start: &DateTime<Utc>,
    ) -> Result<usize, ScanError> {
        // Phase 1: albums, synchronously. File work needs valid album ids.
        tracing::info!("phase 1: album discovery");
        let albums = discover_albums(conn, target_media_path, scan_run_id)?;
        let album_map: HashMap<String, String> = albums
            .iter()
            .map(|a| (a.album_folder_path.clone(), a.album_id.clone()))
            .collect();

        // Phase 2: file discovery.
        tracing::info!("phase 2: file discovery");
        let discovery = discover_files(target_media_path)?;
        let total_files = discovery.files.len();
        let files_in_albums = discovery
            .files
            .iter()
            .filter(|f| album_map.contains_key(&f.album_folder_path))
            .count();

        scan_runs::set_discovery_counts(
            conn,
            scan_run_id,
            (discovery.stats.media_files + discovery.stats.sidecar_files) as i64,
            discovery.stats.media_files as i64,
            discovery.stats.sidecar_files as i64,
            albums.len() as i64,
            files_in_albums as i64,
        )?;

        if total_files == 0 {
            tracing::warn!("no media files discovered under {:?}", target_media_path);
            return Ok(0);
        }

        // Phase 3: parallel processing.
        tracing::info!("phase 3: processing {} files", total_files);
        let writer_stats =
            self.run_pipeline(scan_run_id, conn, discovery.files, &album_map)?;
        tracing::info!(
            "pipeline drained: {} new, {} unchanged, {} errors",
            writer_stats.media_written,
            writer_stats.unchanged,
            writer_stats.errors
        );

        // Phase 4: edited-variant and live-photo linking over this run's rows.
        link_edited_variants(conn, scan_run_id)?;
        link_live_photos(conn, scan_run_id)?;

        // Phase 5: post-scan validation closes the lifecycle.
        validate_scan(conn, scan_run_id, scan_start)?;

        Ok(total_files)
    }

    fn run_pipeline(
        &self,
        scan_run_id: &str,
        conn: &Connection,
        files: Vec<FileInfo>,
        album_map: &HashMap<String, String>,
    ) -> Result<WriterStats, ScanError> {
        // Fingerprint snapshot for the rescan predicate; read-only from here.
        let index = Arc::new(load_fingerprint_index(conn)?);
        tracing::debug!("fingerprint index loaded: {} entries", index.len());

        let cpu_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.worker_processes)
                .thread_name(|i| format!("cpu-{}", i))
                .build()
                .map_err(|e| ScanError::Fatal(format!("cannot build cpu pool: {}", e)))?,
        );

        let (work_tx, work_rx) = bounded::<(FileInfo, String)>(self.options.queue_maxsize);
        let (results_tx, results_rx) = bounded::<ScanResult>(self.options.queue_maxsize);

        let tools = ToolSettings {
            use_exiftool: self.options.use_exiftool,
            use_ffprobe: self.options.use_ffprobe,
        };

        // Writer first, so worker sends never deadlock against a full queue.
        let writer_handle = {
            let db_path = self.db_path.clone();
            let scan_run_id = scan_run_id.to_string();
            let config = WriterConfig {
                batch_size: self.options.batch_size,
                ..WriterConfig::default()
            };
            std::thread::Builder::new()
                .name("writer".to_string())
                .spawn(move || writer_main(results_rx, &db_path, &scan_run_id, config))
                .map_err(ScanError::Io)?
        };

        let mut workers = Vec::with_capacity(self.options.worker_threads);
        for worker_id in 0..self.options.worker_threads {
            let work_rx = work_rx.clone();
            let results_tx = results_tx.clone();
            let cpu_pool = cpu_pool.clone();
            let index: Arc<FingerprintIndex> = index.clone();
            let cancel = self.cancel.clone();
            let scan_run_id = scan_run_id.to_string();

            let handle = std::thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || {
                    worker_loop(
                        worker_id,
                        work_rx,
                        results_tx,
                        cpu_pool,
                        index,
                        tools,
                        cancel,
                        &scan_run_id,
                    )
                })
                .map_err(ScanError::Io)?;
            workers.push(handle);
        }
        drop(work_rx);

        // Feed the work queue; a full queue blocks here, which is the
        // backpressure bound on in-flight records.
        for file_info in files {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!("cancellation observed, stopping feed");
                break;
            }
            let album_id = match album_map.get(&file_info.album_folder_path) {
                Some(id) => id.clone(),
                None => {
                    // Loose file outside any discovered album folder.
                    tracing::warn!(
                        "no album for folder {:?}, deriving id from basename",
                        file_info.album_folder_path
                    );
                    let basename = file_info
                        .album_folder_path
                        .rsplit('/')
                        .next()
                        .unwrap_or(&file_info.album_folder_path);
                    ids::album_id(basename)
                }
            };
            if work_tx.send((file_info, album_id)).is_err() {
                break; // all workers gone
            }
        }
        drop(work_tx); // workers drain and exit on disconnect

        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }

        // All producers are done: the sentinel tells the writer to flush
        // and exit.
        let _ = results_tx.send(ScanResult::Shutdown);
        drop(results_tx);

        let stats = match writer_handle.join() {
            Ok(result) => result?,
            Err(_) => return Err(ScanError::Fatal("writer thread panicked".into())),
        };

        Ok(stats)
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    work_rx: crossbeam_channel::Receiver<(FileInfo, String)>,
    results_tx: crossbeam_channel::Sender<ScanResult>,
    cpu_pool: Arc<rayon::ThreadPool>,
    index: Arc<FingerprintIndex>,
    tools: ToolSettings,
    cancel: Arc<AtomicBool>,
    scan_run_id: &str,
) {
    let mut processed_count = 0usize;

    loop {
        match work_rx.recv_timeout(POLL_TIMEOUT) {
            Ok((file_info, album_id)) => {
                if cancel.load(Ordering::SeqCst) {
                    // Drain without processing; results are discarded.
                    continue;
                }

                let processed = {
                    let path = file_info.abs_path.clone();
                    let size = file_info.file_size;
                    cpu_pool.install(move || process_file(&path, size, &tools))
                };

                let results = coordinate(&file_info, processed, &album_id, scan_run_id, &index);
                for result in results {
                    if results_tx.send(result).is_err() {
                        tracing::warn!("worker {}: results queue closed", worker_id);
                        return;
                    }
                }
                processed_count += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.load(Ordering::SeqCst) && work_rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("worker {} done ({} files)", worker_id, processed_count);
}
