use chrono::Utc;
use rusqlite::{params, Connection};

use crate::catalog::model::{AlbumRow, AlbumStatus, AlbumUpsert};

/// Insert a new album row or refresh an existing one. Keyed on the unique
/// folder path so a rescan updates scalar fields and the last-seen scan run
/// without disturbing `first_seen_timestamp`.
pub fn upsert_album(conn: &Connection, album: &AlbumUpsert) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    let creation = album.creation_timestamp.map(|t| t.to_rfc3339());

    conn.execute(
        "INSERT INTO albums (
            album_id, album_folder_path, title, description,
            creation_timestamp, access_level, status, scan_run_id,
            first_seen_timestamp, last_seen_timestamp
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(album_folder_path) DO UPDATE SET
            title               = excluded.title,
            description         = excluded.description,
            creation_timestamp  = excluded.creation_timestamp,
            access_level        = excluded.access_level,
            status              = excluded.status,
            scan_run_id         = excluded.scan_run_id,
            last_seen_timestamp = excluded.last_seen_timestamp",
        params![
            album.album_id,
            album.album_folder_path,
            album.title,
            album.description,
            creation,
            album.access_level,
            album.status.as_str(),
            album.scan_run_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn get_album_by_path(
    conn: &Connection,
    album_folder_path: &str,
) -> rusqlite::Result<Option<AlbumRow>> {
    query_album(
        conn,
        "SELECT album_id, album_folder_path, title, description, creation_timestamp,
                access_level, status, scan_run_id
         FROM albums WHERE album_folder_path = ?1",
        album_folder_path,
    )
}

pub fn get_album_by_id(conn: &Connection, album_id: &str) -> rusqlite::Result<Option<AlbumRow>> {
    query_album(
        conn,
        "SELECT album_id, album_folder_path, title, description, creation_timestamp,
                access_level, status, scan_run_id
         FROM albums WHERE album_id = ?1",
        album_id,
    )
}

fn query_album(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<Option<AlbumRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params![key], |row| {
        let status: String = row.get(6)?;
        Ok(AlbumRow {
            album_id: row.get(0)?,
            album_folder_path: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            creation_timestamp: row.get(4)?,
            access_level: row.get(5)?,
            status: AlbumStatus::parse(&status),
            scan_run_id: row.get(7)?,
        })
    })?;
    rows.next().transpose()
}

/// Albums still marked present that this scan did not touch are gone from
/// the tree. Returns the number of rows demoted.
pub fn mark_albums_missing(conn: &Connection, scan_run_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE albums SET status = 'missing'
         WHERE scan_run_id != ?1 AND status = 'present'",
        params![scan_run_id],
    )
}

pub fn album_count(conn: &Connection, status: Option<AlbumStatus>) -> rusqlite::Result<i64> {
    match status {
        Some(s) => conn.query_row(
            "SELECT COUNT(*) FROM albums WHERE status = ?1",
            params![s.as_str()],
            |row| row.get(0),
        ),
        None => conn.query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0)),
    }
}
