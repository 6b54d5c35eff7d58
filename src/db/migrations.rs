/// Create the full catalog schema in one flat block. `CREATE TABLE IF NOT
/// EXISTS` keeps the call idempotent; `schema_version` is advanced so a
/// future migration chain can pick up from here.
pub fn run_migrations(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scan_runs (
            scan_run_id               TEXT PRIMARY KEY,
            start_timestamp           TEXT NOT NULL,
            end_timestamp             TEXT,
            status                    TEXT NOT NULL DEFAULT 'running',
            duration_seconds          REAL,
            files_per_second          REAL,
            total_files_discovered    INTEGER NOT NULL DEFAULT 0,
            media_files_discovered    INTEGER NOT NULL DEFAULT 0,
            metadata_files_discovered INTEGER NOT NULL DEFAULT 0,
            media_files_processed     INTEGER NOT NULL DEFAULT 0,
            metadata_files_processed  INTEGER NOT NULL DEFAULT 0,
            media_new_files           INTEGER NOT NULL DEFAULT 0,
            media_unchanged_files     INTEGER NOT NULL DEFAULT 0,
            media_changed_files       INTEGER NOT NULL DEFAULT 0,
            missing_files             INTEGER NOT NULL DEFAULT 0,
            media_error_files         INTEGER NOT NULL DEFAULT 0,
            inconsistent_files        INTEGER NOT NULL DEFAULT 0,
            albums_total              INTEGER NOT NULL DEFAULT 0,
            files_in_albums           INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS albums (
            album_id             TEXT PRIMARY KEY,
            album_folder_path    TEXT NOT NULL UNIQUE,
            title                TEXT,
            description          TEXT,
            creation_timestamp   TEXT,
            access_level         TEXT,
            status               TEXT NOT NULL DEFAULT 'present',
            scan_run_id          TEXT,
            first_seen_timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now')),
            last_seen_timestamp  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now'))
        );

        CREATE TABLE IF NOT EXISTS media_items (
            media_item_id                  TEXT PRIMARY KEY,
            relative_path                  TEXT NOT NULL,
            album_id                       TEXT,
            title                          TEXT,
            mime_type                      TEXT,
            file_size                      INTEGER NOT NULL,
            crc32                          TEXT,
            content_fingerprint            TEXT,
            sidecar_fingerprint            TEXT,
            width                          INTEGER,
            height                         INTEGER,
            duration_seconds               REAL,
            frame_rate                     REAL,
            capture_timestamp              TEXT,
            scan_run_id                    TEXT,
            status                         TEXT NOT NULL DEFAULT 'present',
            first_seen_timestamp           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now')),
            last_seen_timestamp            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now')),
            original_media_item_id         TEXT,
            live_photo_pair_id             TEXT,
            exif_datetime_original         TEXT,
            exif_datetime_digitized        TEXT,
            exif_gps_latitude              REAL,
            exif_gps_longitude             REAL,
            exif_gps_altitude              REAL,
            exif_camera_make               TEXT,
            exif_camera_model              TEXT,
            exif_lens_make                 TEXT,
            exif_lens_model                TEXT,
            exif_focal_length              REAL,
            exif_f_number                  REAL,
            exif_exposure_time             TEXT,
            exif_iso                       INTEGER,
            exif_orientation               INTEGER,
            exif_flash                     TEXT,
            exif_white_balance             TEXT,
            google_description             TEXT,
            google_geo_data_latitude       REAL,
            google_geo_data_longitude      REAL,
            google_geo_data_altitude       REAL,
            google_geo_data_latitude_span  REAL,
            google_geo_data_longitude_span REAL
        );

        CREATE TABLE IF NOT EXISTS processing_errors (
            error_id       INTEGER PRIMARY KEY,
            scan_run_id    TEXT NOT NULL,
            relative_path  TEXT NOT NULL,
            error_type     TEXT NOT NULL,
            error_category TEXT NOT NULL,
            error_message  TEXT NOT NULL,
            timestamp      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_media_scan_run    ON media_items(scan_run_id);
        CREATE INDEX IF NOT EXISTS idx_media_rel_path    ON media_items(relative_path);
        CREATE INDEX IF NOT EXISTS idx_media_fingerprint ON media_items(content_fingerprint);
        CREATE INDEX IF NOT EXISTS idx_media_album       ON media_items(album_id);
        CREATE INDEX IF NOT EXISTS idx_albums_scan_run   ON albums(scan_run_id);
        CREATE INDEX IF NOT EXISTS idx_errors_scan_run   ON processing_errors(scan_run_id);

        -- On a fresh DB: insert 0 first, then update. On an existing DB the
        -- INSERT is skipped (row exists) and the UPDATE is a no-op.
        INSERT INTO schema_version SELECT 1
            WHERE NOT EXISTS (SELECT 1 FROM schema_version);
        UPDATE schema_version SET version = 1 WHERE version < 1;
        ",
    )?;

    Ok(())
}

pub fn schema_version(conn: &rusqlite::Connection) -> anyhow::Result<u32> {
    let version: u32 = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn in_memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_run_migrations_succeeds() {
        let conn = in_memory();
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn test_schema_version_is_1_after_migration() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();
        for table in [
            "schema_version",
            "scan_runs",
            "albums",
            "media_items",
            "processing_errors",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    rusqlite::params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }

    #[test]
    fn test_run_migrations_is_idempotent() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();
        assert!(run_migrations(&conn).is_ok());
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_media_items_column_set() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(media_items)").unwrap();
        let cols: Vec<String> = stmt
            .query_map([], |r| r.get(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for col in [
            "media_item_id",
            "relative_path",
            "album_id",
            "crc32",
            "content_fingerprint",
            "sidecar_fingerprint",
            "capture_timestamp",
            "original_media_item_id",
            "live_photo_pair_id",
            "exif_orientation",
            "google_geo_data_longitude_span",
        ] {
            assert!(cols.contains(&col.to_string()), "missing column {}", col);
        }
    }

    #[test]
    fn test_album_folder_path_is_unique() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO albums (album_id, album_folder_path) VALUES ('a', 'Trip')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO albums (album_id, album_folder_path) VALUES ('b', 'Trip')",
            [],
        );
        assert!(dup.is_err(), "duplicate album_folder_path must be rejected");
    }
}
