use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde_json::Value;

use crate::catalog::albums::upsert_album;
use crate::catalog::errors::insert_error;
use crate::catalog::model::{AlbumStatus, AlbumUpsert, ProcessingErrorRecord};
use crate::errors::{ErrorType, ScanError};
use crate::ids;
use crate::paths::normalize_path;
use crate::scan::discovery::effective_scan_root;

/// A discovered album, yielded so the orchestrator can attribute files to
/// album ids before any file work begins.
#[derive(Debug, Clone)]
pub struct AlbumInfo {
    pub album_id: String,
    pub album_folder_path: String,
    pub title: String,
    pub description: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub access_level: Option<String>,
    pub is_user_album: bool,
    pub status: AlbumStatus,
}

#[derive(Debug, Default)]
struct AlbumMetadata {
    title: Option<String>,
    description: Option<String>,
    creation_timestamp: Option<DateTime<Utc>>,
    access_level: Option<String>,
}

/// Extract the year from a `Photos from YYYY` folder name. Years outside
/// 1900-2200 are rejected as implausible.
pub fn year_from_folder(folder_name: &str) -> Option<i32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^Photos from (\d{4})").unwrap());

    let year: i32 = re.captures(folder_name)?.get(1)?.as_str().parse().ok()?;
    if (1900..=2200).contains(&year) {
        Some(year)
    } else {
        None
    }
}

fn parse_album_metadata(path: &Path) -> Result<AlbumMetadata, ScanError> {
    let contents = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&contents)
        .map_err(|e| ScanError::Parse(format!("invalid album metadata {:?}: {}", path, e)))?;

    let mut meta = AlbumMetadata {
        title: data.get("title").and_then(|v| v.as_str()).map(String::from),
        description: data
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from),
        access_level: data.get("access").and_then(|v| v.as_str()).map(String::from),
        ..Default::default()
    };

    // Takeout shape: {"date": {"timestamp": "1234567890"}}
    if let Some(ts) = data.get("date").and_then(|d| d.get("timestamp")) {
        let raw = match ts {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        match raw.trim().parse::<i64>() {
            Ok(secs) => meta.creation_timestamp = Utc.timestamp_opt(secs, 0).single(),
            Err(_) => {
                tracing::warn!("unparseable album creation timestamp in {:?}", path);
            }
        }
    }

    Ok(meta)
}

/// Enumerate first-level folders under the effective scan root and upsert
/// one album row each. Synchronous: file processing needs valid album ids.
///
/// User albums carry a `metadata.json`; parse failures demote the album to
/// `error` status (recorded in processing_errors) without stopping the
/// scan. Folders named `Photos from YYYY` become year albums.
pub fn discover_albums(
    conn: &Connection,
    target_media_path: &Path,
    scan_run_id: &str,
) -> Result<Vec<AlbumInfo>, ScanError> {
    if !target_media_path.exists() {
        return Err(ScanError::Fatal(format!(
            "target media path does not exist: {:?}",
            target_media_path
        )));
    }
    if !target_media_path.is_dir() {
        return Err(ScanError::Fatal(format!(
            "target media path is not a directory: {:?}",
            target_media_path
        )));
    }

    let scan_root = effective_scan_root(target_media_path);
    tracing::info!("discovering albums under {:?}", scan_root);

    let mut albums = Vec::new();
    let mut user_albums = 0usize;
    let mut year_albums = 0usize;

    for entry in std::fs::read_dir(&scan_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let folder_name = entry.file_name().to_string_lossy().to_string();
        // The id is a pure function of the folder basename, never the path.
        let album_id = ids::album_id(&folder_name);
        let album_folder_path = normalize_path(&folder_name);

        let metadata_path = entry.path().join("metadata.json");
        let is_user_album = metadata_path.is_file();

        let mut title = folder_name.clone();
        let mut description = None;
        let mut creation_timestamp = None;
        let mut access_level = None;
        let mut status = AlbumStatus::Present;

        if is_user_album {
            match parse_album_metadata(&metadata_path) {
                Ok(meta) => {
                    if let Some(t) = meta.title {
                        title = t;
                    }
                    description = meta.description;
                    creation_timestamp = meta.creation_timestamp;
                    access_level = meta.access_level;
                    user_albums += 1;
                }
                Err(e) => {
                    tracing::warn!("failed to parse album metadata {:?}: {}", metadata_path, e);
                    status = AlbumStatus::Error;
                    insert_error(
                        conn,
                        &ProcessingErrorRecord {
                            scan_run_id: scan_run_id.to_string(),
                            relative_path: format!("{}/metadata.json", album_folder_path),
                            error_type: ErrorType::AlbumMetadata,
                            error_category: e.category(),
                            error_message: e.to_string(),
                        },
                    )?;
                }
            }
        } else if let Some(year) = year_from_folder(&folder_name) {
            title = format!("Photos from {}", year);
            year_albums += 1;
        }

        let info = AlbumInfo {
            album_id: album_id.clone(),
            album_folder_path: album_folder_path.clone(),
            title: title.clone(),
            description: description.clone(),
            creation_timestamp,
            access_level: access_level.clone(),
            is_user_album,
            status,
        };

        upsert_album(
            conn,
            &AlbumUpsert {
                album_id,
                album_folder_path,
                title: Some(title),
                description,
                creation_timestamp,
                access_level,
                status,
                scan_run_id: scan_run_id.to_string(),
            },
        )?;

        albums.push(info);
    }

    if albums.is_empty() {
        return Err(ScanError::Fatal(format!(
            "no albums discovered in {:?}: the directory contains no subdirectories",
            target_media_path
        )));
    }

    tracing::info!(
        "album discovery complete: {} albums ({} user, {} year)",
        albums.len(),
        user_albums,
        year_albums
    );

    Ok(albums)
}
