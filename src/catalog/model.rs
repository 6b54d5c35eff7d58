use chrono::{DateTime, Utc};

use crate::errors::{ErrorCategory, ErrorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    Present,
    Missing,
    Error,
    Inconsistent,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Present => "present",
            MediaStatus::Missing => "missing",
            MediaStatus::Error => "error",
            MediaStatus::Inconsistent => "inconsistent",
        }
    }

    pub fn parse(s: &str) -> MediaStatus {
        match s {
            "missing" => MediaStatus::Missing,
            "error" => MediaStatus::Error,
            "inconsistent" => MediaStatus::Inconsistent,
            _ => MediaStatus::Present,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumStatus {
    Present,
    Missing,
    Error,
}

impl AlbumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumStatus::Present => "present",
            AlbumStatus::Missing => "missing",
            AlbumStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> AlbumStatus {
        match s {
            "missing" => AlbumStatus::Missing,
            "error" => AlbumStatus::Error,
            _ => AlbumStatus::Present,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

/// Complete media item record ready for insertion, combining discovery,
/// CPU-side extraction, and sidecar metadata.
#[derive(Debug, Clone, Default)]
pub struct MediaItemRecord {
    pub media_item_id: String,
    pub relative_path: String,
    pub album_id: String,
    pub title: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub crc32: Option<String>,
    pub content_fingerprint: Option<String>,
    pub sidecar_fingerprint: Option<String>,

    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,

    pub capture_timestamp: Option<DateTime<Utc>>,

    pub exif_datetime_original: Option<DateTime<Utc>>,
    pub exif_datetime_digitized: Option<DateTime<Utc>>,
    pub exif_gps_latitude: Option<f64>,
    pub exif_gps_longitude: Option<f64>,
    pub exif_gps_altitude: Option<f64>,
    pub exif_camera_make: Option<String>,
    pub exif_camera_model: Option<String>,
    pub exif_lens_make: Option<String>,
    pub exif_lens_model: Option<String>,
    pub exif_focal_length: Option<f64>,
    pub exif_f_number: Option<f64>,
    pub exif_exposure_time: Option<String>,
    pub exif_iso: Option<i64>,
    pub exif_orientation: Option<i64>,
    pub exif_flash: Option<String>,
    pub exif_white_balance: Option<String>,

    pub google_description: Option<String>,
    pub google_geo_latitude: Option<f64>,
    pub google_geo_longitude: Option<f64>,
    pub google_geo_altitude: Option<f64>,
    pub google_geo_latitude_span: Option<f64>,
    pub google_geo_longitude_span: Option<f64>,

    pub original_media_item_id: Option<String>,
    pub live_photo_pair_id: Option<String>,

    /// Person names from the sidecar; carried with the record for downstream
    /// consumers, not persisted as a column.
    pub people: Vec<String>,

    pub status: Option<MediaStatus>,
    pub scan_run_id: String,
}

/// A media row as read back from the catalog, with lifecycle columns.
#[derive(Debug, Clone)]
pub struct MediaItemRow {
    pub record: MediaItemRecord,
    pub status: MediaStatus,
    pub first_seen_timestamp: String,
    pub last_seen_timestamp: String,
}

/// Album upsert payload. The id is a pure function of the folder basename.
#[derive(Debug, Clone)]
pub struct AlbumUpsert {
    pub album_id: String,
    pub album_folder_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub access_level: Option<String>,
    pub status: AlbumStatus,
    pub scan_run_id: String,
}

#[derive(Debug, Clone)]
pub struct AlbumRow {
    pub album_id: String,
    pub album_folder_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_timestamp: Option<String>,
    pub access_level: Option<String>,
    pub status: AlbumStatus,
    pub scan_run_id: Option<String>,
}

/// One row of `scan_runs`; counters in declaration order of the schema.
#[derive(Debug, Clone, Default)]
pub struct ScanRunRow {
    pub scan_run_id: String,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
    pub status: String,
    pub duration_seconds: Option<f64>,
    pub files_per_second: Option<f64>,
    pub total_files_discovered: i64,
    pub media_files_discovered: i64,
    pub metadata_files_discovered: i64,
    pub media_files_processed: i64,
    pub metadata_files_processed: i64,
    pub media_new_files: i64,
    pub media_unchanged_files: i64,
    pub media_changed_files: i64,
    pub missing_files: i64,
    pub media_error_files: i64,
    pub inconsistent_files: i64,
    pub albums_total: i64,
    pub files_in_albums: i64,
}

/// One per-file failure, destined for `processing_errors`.
#[derive(Debug, Clone)]
pub struct ProcessingErrorRecord {
    pub scan_run_id: String,
    pub relative_path: String,
    pub error_type: ErrorType,
    pub error_category: ErrorCategory,
    pub error_message: String,
}
