use std::collections::HashMap;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::errors::ScanError;

/// Extensions participating in Live Photo pairing.
const LIVE_PHOTO_IMAGE_EXTS: &[&str] = &["heic", "jpg", "jpeg"];
const LIVE_PHOTO_VIDEO_EXT: &str = "mov";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditedVariantStats {
    pub variants_linked: usize,
    pub originals_found: usize,
    pub originals_missing: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivePhotoStats {
    pub pairs_linked: usize,
    pub files_updated: usize,
}

fn split_path(relative_path: &str) -> (&str, &str, String) {
    let (dir, name) = match relative_path.rsplit_once('/') {
        Some((d, n)) => (d, n),
        None => ("", relative_path),
    };
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], name[pos + 1..].to_lowercase()),
        _ => (name, String::new()),
    };
    (dir, stem, ext)
}

/// Link `-edited` variants to their originals for rows written by the
/// current scan run: same folder, stripped stem, identical extension.
/// Idempotent: re-running rewrites the same foreign keys.
pub fn link_edited_variants(
    conn: &Connection,
    scan_run_id: &str,
) -> Result<EditedVariantStats, ScanError> {
    let mut stmt = conn.prepare(
        "SELECT media_item_id, relative_path FROM media_items
         WHERE scan_run_id = ?1 AND status = 'present'",
    )?;
    let rows: Vec<(String, String)> = stmt
        .query_map(params![scan_run_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<rusqlite::Result<_>>()?;

    // (dir, stem, ext) → media_item_id, for locating originals.
    let mut by_name: HashMap<(String, String, String), String> = HashMap::new();
    for (id, path) in &rows {
        let (dir, stem, ext) = split_path(path);
        by_name.insert((dir.to_string(), stem.to_string(), ext), id.clone());
    }

    let mut stats = EditedVariantStats::default();

    for (_, path) in &rows {
        let (dir, stem, ext) = split_path(path);
        let original_stem = match stem.strip_suffix("-edited") {
            Some(s) => s,
            None => continue,
        };

        let key = (dir.to_string(), original_stem.to_string(), ext);
        match by_name.get(&key) {
            Some(original_id) => {
                stats.originals_found += 1;
                let changed = conn.execute(
                    "UPDATE media_items SET original_media_item_id = ?1
                     WHERE relative_path = ?2",
                    params![original_id, path],
                )?;
                if changed > 0 {
                    stats.variants_linked += 1;
                }
            }
            None => {
                tracing::debug!("no original found for edited variant {}", path);
                stats.originals_missing += 1;
            }
        }
    }

    tracing::info!(
        "edited variants: {} linked, {} originals found, {} missing",
        stats.variants_linked,
        stats.originals_found,
        stats.originals_missing
    );
    Ok(stats)
}

/// Pair HEIC/JPG images with a MOV sharing the stem in the same folder and
/// stamp both rows with one opaque pair id. An existing shared pair id is
/// kept, which makes re-runs produce the same linkage.
pub fn link_live_photos(conn: &Connection, scan_run_id: &str) -> Result<LivePhotoStats, ScanError> {
    let mut stmt = conn.prepare(
        "SELECT media_item_id, relative_path, live_photo_pair_id FROM media_items
         WHERE scan_run_id = ?1 AND status = 'present'",
    )?;
    let rows: Vec<(String, String, Option<String>)> = stmt
        .query_map(params![scan_run_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<rusqlite::Result<_>>()?;

    // Group candidates by (dir, stem).
    #[derive(Default)]
    struct Group {
        images: Vec<(String, Option<String>)>,
        videos: Vec<(String, Option<String>)>,
    }
    let mut groups: HashMap<(String, String), Group> = HashMap::new();

    for (id, path, pair_id) in rows {
        let (dir, stem, ext) = split_path(&path);
        let key = (dir.to_string(), stem.to_string());
        if LIVE_PHOTO_IMAGE_EXTS.contains(&ext.as_str()) {
            groups.entry(key).or_default().images.push((id, pair_id));
        } else if ext == LIVE_PHOTO_VIDEO_EXT {
            groups.entry(key).or_default().videos.push((id, pair_id));
        }
    }

    let mut stats = LivePhotoStats::default();

    for group in groups.values() {
        for (image_id, image_pair) in &group.images {
            for (video_id, video_pair) in &group.videos {
                // Already linked together from an earlier pass.
                if image_pair.is_some() && image_pair == video_pair {
                    stats.pairs_linked += 1;
                    continue;
                }

                let pair_id = Uuid::new_v4().to_string();
                let mut updated = 0;
                for id in [image_id, video_id] {
                    updated += conn.execute(
                        "UPDATE media_items SET live_photo_pair_id = ?1
                         WHERE media_item_id = ?2",
                        params![pair_id, id],
                    )?;
                }
                stats.pairs_linked += 1;
                stats.files_updated += updated;
            }
        }
    }

    tracing::info!(
        "live photos: {} pairs, {} rows updated",
        stats.pairs_linked,
        stats.files_updated
    );
    Ok(stats)
}
