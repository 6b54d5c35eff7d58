use std::path::Path;

use rusqlite::Connection;

/// Open (creating if needed) the catalog database and apply the PRAGMA set
/// the engine relies on: WAL journaling with a single writer, 5 s busy
/// timeout, 64 MiB page cache, in-memory temp storage.
pub fn open_catalog(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA busy_timeout=5000;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    // Negative cache_size is KiB: 64 MiB.
    conn.execute_batch("PRAGMA cache_size=-65536;")?;
    conn.execute_batch("PRAGMA temp_store=MEMORY;")?;
    conn.execute_batch("PRAGMA wal_autocheckpoint=1000;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}
