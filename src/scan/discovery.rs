use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::ScanError;
use crate::paths::{normalize_path, should_scan_file};

/// Prefix matching tolerances for truncated raw-`.json` sidecars. A
/// candidate must share at least `PREFIX_MIN_LEN` characters and may drift
/// at most `PREFIX_MAX_DRIFT` characters, so chance collisions stay out.
const PREFIX_MIN_LEN: usize = 10;
const PREFIX_MAX_DRIFT: usize = 50;

/// The `.supplemental-metadata` suffix ladder, longest first, with minimum
/// filename lengths that prefilter false positives. Windows MAX_PATH
/// truncation can cut the suffix anywhere.
const SUPPLEMENTAL_SUFFIXES: &[(&str, usize)] = &[
    (".supplemental-metadata", 30),
    (".supplemental-metadat", 28),
    (".supplemental-metad", 25),
    (".supplemental-meta", 24),
    (".supplemental-me", 21),
    (".supplemental-", 0),
    (".supplemen", 18),
    (".suppleme", 17),
    (".supplem", 16),
    (".supple", 15),
    (".suppl", 14),
    (".supp", 13),
];

/// Dot-delimited remnants of very heavy truncation; these require the
/// trailing `.json` check to avoid matching ordinary filenames.
const SHORT_SUFFIXES: &[(&str, usize)] = &[(".sup.", 12), (".su.", 11), (".s.", 10)];

/// A discovered media file with its sidecar binding. Plain value type:
/// safe to hand across worker boundaries.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub abs_path: PathBuf,
    /// Normalized (NFC, forward slashes), relative to the effective scan
    /// root, which excludes any `Takeout/Google Photos` prefix.
    pub relative_path: String,
    /// Album folder path relative to the scan root; empty for loose files.
    pub album_folder_path: String,
    pub sidecar_path: Option<PathBuf>,
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryStats {
    pub media_files: usize,
    pub sidecar_files: usize,
    pub album_metadata_files: usize,
    pub other_files: usize,
}

#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub files: Vec<FileInfo>,
    pub paired_sidecars: HashSet<PathBuf>,
    pub all_sidecars: HashSet<PathBuf>,
    pub stats: DiscoveryStats,
}

/// Where albums actually live: `<root>/Takeout/Google Photos` when that
/// directory exists, the target itself otherwise. Relative paths computed
/// from this root are portable across extraction locations.
pub fn effective_scan_root(target_media_path: &Path) -> PathBuf {
    let google_photos = target_media_path.join("Takeout").join("Google Photos");
    if google_photos.is_dir() {
        google_photos
    } else {
        target_media_path.to_path_buf()
    }
}

/// Index of sidecars found in pass 1, keyed by the media filename each one
/// names. Raw-`.json` sidecars are kept per-directory as well for the
/// prefix fallback in pass 2.
#[derive(Debug, Default)]
struct SidecarIndex {
    by_media_file: HashMap<(PathBuf, String), PathBuf>,
    raw_by_dir: HashMap<PathBuf, Vec<PathBuf>>,
    all: HashSet<PathBuf>,
}

/// Given a sidecar filename, guess the media filename it accompanies.
/// Tries the canonical suffix, its truncations (longest to shortest), and
/// finally the bare `.json` pattern Google uses for very long names.
pub fn media_filename_for_sidecar(filename: &str) -> Option<String> {
    let len = filename.len();

    for (suffix, min_len) in SUPPLEMENTAL_SUFFIXES {
        if len > *min_len {
            if let Some((media, _)) = filename.split_once(suffix) {
                return Some(media.to_string());
            }
        }
    }

    for (suffix, min_len) in SHORT_SUFFIXES {
        if len > *min_len && filename.ends_with(".json") {
            if let Some((media, _)) = filename.split_once(suffix) {
                return Some(media.to_string());
            }
        }
    }

    if let Some(media) = filename.strip_suffix(".json") {
        return Some(media.to_string());
    }

    None
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn build_sidecar_index(scan_root: &Path) -> SidecarIndex {
    let mut index = SidecarIndex::default();

    for entry in WalkDir::new(scan_root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("sidecar walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_json(entry.path()) {
            continue;
        }
        if !should_scan_file(entry.path()) {
            continue;
        }

        let filename = match entry.path().file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if filename == "metadata.json" {
            continue; // album metadata, not a sidecar
        }

        index.all.insert(entry.path().to_path_buf());

        let parent = match entry.path().parent() {
            Some(p) => p.to_path_buf(),
            None => continue,
        };

        if let Some(media_filename) = media_filename_for_sidecar(&filename) {
            if !filename.contains(".supplemental") && filename.ends_with(".json") {
                index
                    .raw_by_dir
                    .entry(parent.clone())
                    .or_default()
                    .push(entry.path().to_path_buf());
            }
            index
                .by_media_file
                .insert((parent, media_filename), entry.path().to_path_buf());
        }
    }

    tracing::info!("sidecar index built: {} entries", index.by_media_file.len());
    index
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

fn file_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[pos..],
        _ => "",
    }
}

/// Resolve a media file to its sidecar: exact lookup, `-edited` strip,
/// tilde-suffix strip, then bounded prefix matching against raw-`.json`
/// sidecars in the same directory.
fn lookup_sidecar(index: &SidecarIndex, dir: &Path, filename: &str) -> Option<PathBuf> {
    let key = (dir.to_path_buf(), filename.to_string());
    if let Some(found) = index.by_media_file.get(&key) {
        return Some(found.clone());
    }

    let stem = file_stem(filename);
    let ext = file_ext(filename);

    if stem.contains("-edited") {
        let original_stem = match stem.strip_suffix("-edited") {
            Some(s) => s,
            None => stem.rsplit_once("-edited").map(|(a, _)| a).unwrap_or(stem),
        };
        let key = (dir.to_path_buf(), format!("{}{}", original_stem, ext));
        if let Some(found) = index.by_media_file.get(&key) {
            return Some(found.clone());
        }
    }

    if let Some((original_stem, _)) = stem.split_once('~') {
        let key = (dir.to_path_buf(), format!("{}{}", original_stem, ext));
        if let Some(found) = index.by_media_file.get(&key) {
            return Some(found.clone());
        }
    }

    // Prefix fallback: both names may have been truncated from the same base.
    let candidates = index.raw_by_dir.get(dir)?;
    for candidate in candidates {
        let candidate_stem = candidate
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".json"))?;

        let (shorter, longer) = if candidate_stem.len() <= stem.len() {
            (candidate_stem, stem)
        } else {
            (stem, candidate_stem)
        };
        if shorter.len() < PREFIX_MIN_LEN {
            continue;
        }
        if longer.len() - shorter.len() > PREFIX_MAX_DRIFT {
            continue;
        }
        if longer.starts_with(shorter) {
            return Some(candidate.clone());
        }
    }

    None
}

/// Two-pass discovery: build the sidecar index, then walk the tree pairing
/// every candidate media file with its sidecar.
pub fn discover_files(target_media_path: &Path) -> Result<DiscoveryResult, ScanError> {
    if !target_media_path.is_dir() {
        return Err(ScanError::Fatal(format!(
            "target media path does not exist or is not a directory: {:?}",
            target_media_path
        )));
    }

    let scan_root = effective_scan_root(target_media_path);
    tracing::info!("discovering files under {:?}", scan_root);

    let index = build_sidecar_index(&scan_root);

    let mut result = DiscoveryResult {
        all_sidecars: index.all.clone(),
        ..Default::default()
    };
    result.stats.sidecar_files = index.all.len();

    for entry in WalkDir::new(&scan_root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("discovery walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if is_json(path) {
            if path.file_name().and_then(|n| n.to_str()) == Some("metadata.json") {
                result.stats.album_metadata_files += 1;
            }
            continue;
        }
        if !should_scan_file(path) {
            result.stats.other_files += 1;
            continue;
        }

        let file_size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                tracing::warn!("cannot stat {:?}: {}", path, e);
                continue;
            }
        };

        let relative = match path.strip_prefix(&scan_root) {
            Ok(r) => r,
            Err(_) => {
                tracing::warn!("file not under scan root: {:?}", path);
                continue;
            }
        };
        let relative_path = normalize_path(&relative.to_string_lossy());
        let album_folder_path = relative
            .parent()
            .map(|p| normalize_path(&p.to_string_lossy()))
            .unwrap_or_default();

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        let dir = path.parent().unwrap_or(&scan_root);
        let sidecar_path = lookup_sidecar(&index, dir, filename);

        if let Some(ref sidecar) = sidecar_path {
            result.paired_sidecars.insert(sidecar.clone());
        }

        result.stats.media_files += 1;
        result.files.push(FileInfo {
            abs_path: path.to_path_buf(),
            relative_path,
            album_folder_path,
            sidecar_path,
            file_size,
        });
    }

    tracing::info!(
        "discovery complete: {} media files, {} with sidecars, {} sidecars total",
        result.files.len(),
        result.paired_sidecars.len(),
        result.all_sidecars.len()
    );

    Ok(result)
}
