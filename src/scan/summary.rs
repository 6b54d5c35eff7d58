use rusqlite::Connection;

use crate::catalog::model::{AlbumStatus, MediaStatus, ScanRunRow};
use crate::catalog::{albums, errors as error_dal, media_items, scan_runs};
use crate::errors::ScanError;

/// Human-facing roll-up of a finished scan run: counters, status
/// breakdowns, and the error distribution by category.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub run: ScanRunRow,
    pub media_present: i64,
    pub media_missing: i64,
    pub media_error: i64,
    pub media_inconsistent: i64,
    pub albums_present: i64,
    pub albums_missing: i64,
    pub albums_error: i64,
    pub error_breakdown: Vec<(String, i64)>,
}

pub fn generate_summary(conn: &Connection, scan_run_id: &str) -> Result<ScanSummary, ScanError> {
    let run = scan_runs::get_scan_run(conn, scan_run_id)?
        .ok_or_else(|| ScanError::Fatal(format!("scan run not found: {}", scan_run_id)))?;

    Ok(ScanSummary {
        run,
        media_present: media_items::count_by_status(conn, MediaStatus::Present)?,
        media_missing: media_items::count_by_status(conn, MediaStatus::Missing)?,
        media_error: media_items::count_by_status(conn, MediaStatus::Error)?,
        media_inconsistent: media_items::count_by_status(conn, MediaStatus::Inconsistent)?,
        albums_present: albums::album_count(conn, Some(AlbumStatus::Present))?,
        albums_missing: albums::album_count(conn, Some(AlbumStatus::Missing))?,
        albums_error: albums::album_count(conn, Some(AlbumStatus::Error))?,
        error_breakdown: error_dal::error_breakdown(conn, scan_run_id)?,
    })
}

impl ScanSummary {
    /// Multi-line report in the shape operators see in the log.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("scan run:        {}\n", self.run.scan_run_id));
        out.push_str(&format!("status:          {}\n", self.run.status));
        if let Some(duration) = self.run.duration_seconds {
            out.push_str(&format!("duration:        {:.1}s\n", duration));
        }
        if let Some(rate) = self.run.files_per_second {
            out.push_str(&format!("throughput:      {:.1} files/s\n", rate));
        }
        out.push_str(&format!(
            "discovered:      {} media, {} sidecars\n",
            self.run.media_files_discovered, self.run.metadata_files_discovered
        ));
        out.push_str(&format!(
            "processed:       {} ({} new, {} unchanged, {} errors)\n",
            self.run.media_files_processed,
            self.run.media_new_files,
            self.run.media_unchanged_files,
            self.run.media_error_files
        ));
        out.push_str(&format!(
            "media status:    {} present, {} missing, {} error, {} inconsistent\n",
            self.media_present, self.media_missing, self.media_error, self.media_inconsistent
        ));
        out.push_str(&format!(
            "albums:          {} present, {} missing, {} error\n",
            self.albums_present, self.albums_missing, self.albums_error
        ));
        if !self.error_breakdown.is_empty() {
            out.push_str("errors by category:\n");
            for (category, count) in &self.error_breakdown {
                out.push_str(&format!("  {:<14} {}\n", category, count));
            }
        }
        out
    }
}
