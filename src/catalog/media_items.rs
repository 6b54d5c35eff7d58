use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::catalog::model::{MediaItemRecord, MediaItemRow, MediaStatus};

/// Snapshot of (relative_path → fingerprints) taken before workers start,
/// consulted by the rescan predicate. Built once, then read-only.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    entries: HashMap<String, (String, Option<String>)>,
}

impl FingerprintIndex {
    /// `check_unchanged(path, content_fp, sidecar_fp)`: a file is unchanged
    /// when a row exists with the same path, the same content fingerprint,
    /// and a matching sidecar fingerprint (or both null).
    pub fn check_unchanged(
        &self,
        relative_path: &str,
        content_fingerprint: &str,
        sidecar_fingerprint: Option<&str>,
    ) -> bool {
        match self.entries.get(relative_path) {
            Some((content, sidecar)) => {
                content == content_fingerprint && sidecar.as_deref() == sidecar_fingerprint
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the fingerprint index for all rows that carry a content fingerprint.
pub fn load_fingerprint_index(conn: &Connection) -> rusqlite::Result<FingerprintIndex> {
    let mut stmt = conn.prepare(
        "SELECT relative_path, content_fingerprint, sidecar_fingerprint
         FROM media_items WHERE content_fingerprint IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut entries = HashMap::new();
    for row in rows {
        let (path, content, sidecar) = row?;
        entries.insert(path, (content, sidecar));
    }
    Ok(FingerprintIndex { entries })
}

/// Insert a new media item row. Plain INSERT: the id embeds the canonical
/// tuple, so a duplicate insert is a constraint violation indicating a bug.
/// Orientation values outside 1-8 are stored as null with a warning.
pub fn insert_media_item(conn: &Connection, item: &MediaItemRecord) -> rusqlite::Result<()> {
    let orientation = match item.exif_orientation {
        Some(o) if !(1..=8).contains(&o) => {
            tracing::warn!(
                "invalid exif orientation {} for {}, storing null",
                o,
                item.relative_path
            );
            None
        }
        other => other,
    };

    let now = Utc::now().to_rfc3339();
    let status = item.status.unwrap_or(MediaStatus::Present);

    conn.execute(
        "INSERT INTO media_items (
            media_item_id, relative_path, album_id, title, mime_type,
            file_size, crc32, content_fingerprint, sidecar_fingerprint,
            width, height, duration_seconds, frame_rate,
            capture_timestamp, scan_run_id, status,
            first_seen_timestamp, last_seen_timestamp,
            original_media_item_id, live_photo_pair_id,
            exif_datetime_original, exif_datetime_digitized,
            exif_gps_latitude, exif_gps_longitude, exif_gps_altitude,
            exif_camera_make, exif_camera_model,
            exif_lens_make, exif_lens_model,
            exif_focal_length, exif_f_number, exif_exposure_time,
            exif_iso, exif_orientation, exif_flash, exif_white_balance,
            google_description,
            google_geo_data_latitude, google_geo_data_longitude,
            google_geo_data_altitude, google_geo_data_latitude_span,
            google_geo_data_longitude_span
         )
         VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25,
            ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37,
            ?38, ?39, ?40, ?41
         )",
        params![
            item.media_item_id,
            item.relative_path,
            item.album_id,
            item.title,
            item.mime_type,
            item.file_size,
            item.crc32,
            item.content_fingerprint,
            item.sidecar_fingerprint,
            item.width,
            item.height,
            item.duration_seconds,
            item.frame_rate,
            item.capture_timestamp.map(|t| t.to_rfc3339()),
            item.scan_run_id,
            status.as_str(),
            now,
            item.original_media_item_id,
            item.live_photo_pair_id,
            item.exif_datetime_original.map(|t| t.to_rfc3339()),
            item.exif_datetime_digitized.map(|t| t.to_rfc3339()),
            item.exif_gps_latitude,
            item.exif_gps_longitude,
            item.exif_gps_altitude,
            item.exif_camera_make,
            item.exif_camera_model,
            item.exif_lens_make,
            item.exif_lens_model,
            item.exif_focal_length,
            item.exif_f_number,
            item.exif_exposure_time,
            item.exif_iso,
            orientation,
            item.exif_flash,
            item.exif_white_balance,
            item.google_description,
            item.google_geo_latitude,
            item.google_geo_longitude,
            item.google_geo_altitude,
            item.google_geo_latitude_span,
            item.google_geo_longitude_span,
        ],
    )?;
    Ok(())
}

/// Refresh `scan_run_id`, `last_seen_timestamp`, and status for a batch of
/// unchanged files so post-scan validation does not mark them missing.
/// No other column is touched. Returns the number of rows updated.
pub fn batch_mark_seen(
    conn: &Connection,
    relative_paths: &[String],
    scan_run_id: &str,
    seen_at: &DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let seen = seen_at.to_rfc3339();
    let mut stmt = conn.prepare(
        "UPDATE media_items
         SET scan_run_id = ?1, last_seen_timestamp = ?2, status = 'present'
         WHERE relative_path = ?3",
    )?;

    let mut updated = 0;
    for path in relative_paths {
        updated += stmt.execute(params![scan_run_id, seen, path])?;
    }
    Ok(updated)
}

/// Media rows still marked present that this scan did not touch.
pub fn mark_missing(conn: &Connection, scan_run_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE media_items SET status = 'missing'
         WHERE scan_run_id != ?1 AND status = 'present'",
        params![scan_run_id],
    )
}

/// Rows claimed by the current scan whose last-seen timestamp predates the
/// scan start indicate a transactional anomaly.
pub fn mark_inconsistent(
    conn: &Connection,
    scan_run_id: &str,
    scan_start: &DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE media_items SET status = 'inconsistent'
         WHERE scan_run_id = ?1 AND last_seen_timestamp < ?2 AND status = 'present'",
        params![scan_run_id, scan_start.to_rfc3339()],
    )
}

pub fn count_by_status(conn: &Connection, status: MediaStatus) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM media_items WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )
}

pub fn count_for_scan_run(conn: &Connection, scan_run_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM media_items WHERE scan_run_id = ?1",
        params![scan_run_id],
        |row| row.get(0),
    )
}

pub fn get_media_item_by_path(
    conn: &Connection,
    relative_path: &str,
) -> rusqlite::Result<Option<MediaItemRow>> {
    query_media_item(
        conn,
        "SELECT * FROM media_items WHERE relative_path = ?1",
        relative_path,
    )
}

pub fn get_media_item_by_id(
    conn: &Connection,
    media_item_id: &str,
) -> rusqlite::Result<Option<MediaItemRow>> {
    query_media_item(
        conn,
        "SELECT * FROM media_items WHERE media_item_id = ?1",
        media_item_id,
    )
}

fn query_media_item(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> rusqlite::Result<Option<MediaItemRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params![key], read_media_item_row)?;
    rows.next().transpose()
}

fn parse_utc(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn read_media_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaItemRow> {
    let status: String = row.get("status")?;
    let record = MediaItemRecord {
        media_item_id: row.get("media_item_id")?,
        relative_path: row.get("relative_path")?,
        album_id: row.get::<_, Option<String>>("album_id")?.unwrap_or_default(),
        title: row.get("title")?,
        mime_type: row.get("mime_type")?,
        file_size: row.get("file_size")?,
        crc32: row.get("crc32")?,
        content_fingerprint: row.get("content_fingerprint")?,
        sidecar_fingerprint: row.get("sidecar_fingerprint")?,
        width: row.get("width")?,
        height: row.get("height")?,
        duration_seconds: row.get("duration_seconds")?,
        frame_rate: row.get("frame_rate")?,
        capture_timestamp: parse_utc(row.get("capture_timestamp")?),
        exif_datetime_original: parse_utc(row.get("exif_datetime_original")?),
        exif_datetime_digitized: parse_utc(row.get("exif_datetime_digitized")?),
        exif_gps_latitude: row.get("exif_gps_latitude")?,
        exif_gps_longitude: row.get("exif_gps_longitude")?,
        exif_gps_altitude: row.get("exif_gps_altitude")?,
        exif_camera_make: row.get("exif_camera_make")?,
        exif_camera_model: row.get("exif_camera_model")?,
        exif_lens_make: row.get("exif_lens_make")?,
        exif_lens_model: row.get("exif_lens_model")?,
        exif_focal_length: row.get("exif_focal_length")?,
        exif_f_number: row.get("exif_f_number")?,
        exif_exposure_time: row.get("exif_exposure_time")?,
        exif_iso: row.get("exif_iso")?,
        exif_orientation: row.get("exif_orientation")?,
        exif_flash: row.get("exif_flash")?,
        exif_white_balance: row.get("exif_white_balance")?,
        google_description: row.get("google_description")?,
        google_geo_latitude: row.get("google_geo_data_latitude")?,
        google_geo_longitude: row.get("google_geo_data_longitude")?,
        google_geo_altitude: row.get("google_geo_data_altitude")?,
        google_geo_latitude_span: row.get("google_geo_data_latitude_span")?,
        google_geo_longitude_span: row.get("google_geo_data_longitude_span")?,
        original_media_item_id: row.get("original_media_item_id")?,
        live_photo_pair_id: row.get("live_photo_pair_id")?,
        people: Vec::new(),
        status: Some(MediaStatus::parse(&status)),
        scan_run_id: row.get::<_, Option<String>>("scan_run_id")?.unwrap_or_default(),
    };

    Ok(MediaItemRow {
        record,
        status: MediaStatus::parse(&status),
        first_seen_timestamp: row.get("first_seen_timestamp")?,
        last_seen_timestamp: row.get("last_seen_timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;

    fn in_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn make_record(path: &str, scan_run_id: &str) -> MediaItemRecord {
        MediaItemRecord {
            media_item_id: crate::ids::media_item_id(path, None, 100, None),
            relative_path: path.to_string(),
            album_id: "album-1".to_string(),
            title: Some("title".into()),
            mime_type: Some("image/jpeg".into()),
            file_size: 100,
            crc32: Some("0d4a1185".into()),
            content_fingerprint: Some("aa".repeat(32)),
            sidecar_fingerprint: None,
            scan_run_id: scan_run_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_read_back_roundtrip() {
        let conn = in_memory();
        let mut rec = make_record("Trip/a.jpg", "run-1");
        rec.capture_timestamp = Some(
            DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00")
                .unwrap()
                .with_timezone(&Utc),
        );
        rec.exif_iso = Some(400);
        rec.exif_f_number = Some(2.8);
        rec.google_geo_latitude = Some(41.9);
        insert_media_item(&conn, &rec).unwrap();

        let row = get_media_item_by_path(&conn, "Trip/a.jpg").unwrap().unwrap();
        assert_eq!(row.status, MediaStatus::Present);
        assert_eq!(row.record.media_item_id, rec.media_item_id);
        assert_eq!(row.record.crc32.as_deref(), Some("0d4a1185"));
        assert_eq!(row.record.capture_timestamp, rec.capture_timestamp);
        assert_eq!(row.record.exif_iso, Some(400));
        assert_eq!(row.record.exif_f_number, Some(2.8));
        assert_eq!(row.record.google_geo_latitude, Some(41.9));
        assert_eq!(row.record.sidecar_fingerprint, None);
    }

    #[test]
    fn test_duplicate_insert_is_constraint_violation() {
        let conn = in_memory();
        let rec = make_record("Trip/a.jpg", "run-1");
        insert_media_item(&conn, &rec).unwrap();
        assert!(insert_media_item(&conn, &rec).is_err());
    }

    #[test]
    fn test_orientation_out_of_range_stored_null() {
        let conn = in_memory();
        let mut rec = make_record("Trip/rot.jpg", "run-1");
        rec.exif_orientation = Some(12);
        insert_media_item(&conn, &rec).unwrap();

        let row = get_media_item_by_path(&conn, "Trip/rot.jpg").unwrap().unwrap();
        assert_eq!(row.record.exif_orientation, None);
    }

    #[test]
    fn test_orientation_in_range_kept() {
        let conn = in_memory();
        let mut rec = make_record("Trip/ok.jpg", "run-1");
        rec.exif_orientation = Some(6);
        insert_media_item(&conn, &rec).unwrap();
        let row = get_media_item_by_path(&conn, "Trip/ok.jpg").unwrap().unwrap();
        assert_eq!(row.record.exif_orientation, Some(6));
    }

    #[test]
    fn test_get_by_id_and_first_seen_survives_mark_seen() {
        let conn = in_memory();
        let rec = make_record("Trip/a.jpg", "run-1");
        insert_media_item(&conn, &rec).unwrap();

        let row = get_media_item_by_id(&conn, &rec.media_item_id).unwrap().unwrap();
        assert_eq!(row.record.relative_path, "Trip/a.jpg");
        let first_seen = row.first_seen_timestamp.clone();

        batch_mark_seen(&conn, &["Trip/a.jpg".to_string()], "run-2", &Utc::now()).unwrap();
        let row = get_media_item_by_id(&conn, &rec.media_item_id).unwrap().unwrap();
        assert_eq!(row.first_seen_timestamp, first_seen);
        assert!(row.last_seen_timestamp >= first_seen);
    }

    #[test]
    fn test_fingerprint_index_check_unchanged() {
        let conn = in_memory();
        let mut rec = make_record("Trip/a.jpg", "run-1");
        rec.sidecar_fingerprint = Some("bb".repeat(32));
        insert_media_item(&conn, &rec).unwrap();

        let index = load_fingerprint_index(&conn).unwrap();
        assert_eq!(index.len(), 1);

        let content = "aa".repeat(32);
        let sidecar = "bb".repeat(32);
        assert!(index.check_unchanged("Trip/a.jpg", &content, Some(&sidecar)));
        // Sidecar drift counts as changed.
        assert!(!index.check_unchanged("Trip/a.jpg", &content, None));
        assert!(!index.check_unchanged("Trip/a.jpg", &"cc".repeat(32), Some(&sidecar)));
        assert!(!index.check_unchanged("Other/b.jpg", &content, Some(&sidecar)));
    }

    #[test]
    fn test_fingerprint_index_both_null_sidecars_match() {
        let conn = in_memory();
        insert_media_item(&conn, &make_record("Trip/a.jpg", "run-1")).unwrap();
        let index = load_fingerprint_index(&conn).unwrap();
        assert!(index.check_unchanged("Trip/a.jpg", &"aa".repeat(32), None));
    }

    #[test]
    fn test_batch_mark_seen_updates_lifecycle_only() {
        let conn = in_memory();
        insert_media_item(&conn, &make_record("Trip/a.jpg", "run-1")).unwrap();

        let seen_at = Utc::now();
        let updated = batch_mark_seen(&conn, &["Trip/a.jpg".to_string()], "run-2", &seen_at).unwrap();
        assert_eq!(updated, 1);

        let row = get_media_item_by_path(&conn, "Trip/a.jpg").unwrap().unwrap();
        assert_eq!(row.record.scan_run_id, "run-2");
        assert_eq!(row.status, MediaStatus::Present);
        // Content columns untouched.
        assert_eq!(row.record.crc32.as_deref(), Some("0d4a1185"));
    }

    #[test]
    fn test_mark_missing_and_inconsistent() {
        let conn = in_memory();
        insert_media_item(&conn, &make_record("Trip/old.jpg", "run-1")).unwrap();
        insert_media_item(&conn, &make_record("Trip/new.jpg", "run-2")).unwrap();

        let missing = mark_missing(&conn, "run-2").unwrap();
        assert_eq!(missing, 1);
        assert_eq!(count_by_status(&conn, MediaStatus::Missing).unwrap(), 1);

        // A row claiming run-2 but last seen before a future scan start.
        let future_start = Utc::now() + chrono::Duration::seconds(60);
        let inconsistent = mark_inconsistent(&conn, "run-2", &future_start).unwrap();
        assert_eq!(inconsistent, 1);
        assert_eq!(count_by_status(&conn, MediaStatus::Inconsistent).unwrap(), 1);
    }
}
