use std::path::Path;

use unicode_normalization::UnicodeNormalization;

/// System artifacts excluded from scanning, compared against the lowercased
/// filename. The macOS folder icon carries a literal trailing carriage return.
const SYSTEM_FILES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store", "icon\r"];

const TEMP_EXTENSIONS: &[&str] = &["tmp", "temp", "cache", "bak", "swp"];

/// Normalize a path string for storage and id derivation: NFC form,
/// forward-slash separators, surrounding whitespace stripped.
/// Idempotent: `normalize_path(normalize_path(s)) == normalize_path(s)`.
pub fn normalize_path(s: &str) -> String {
    s.trim().replace('\\', "/").nfc().collect()
}

/// Cross-platform hidden file detection.
/// Unix: leading dot. Windows: the Hidden attribute queried from the OS,
/// not inferred from the name.
pub fn is_hidden(path: &Path) -> bool {
    if path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
    {
        return true;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        if let Ok(meta) = std::fs::metadata(path) {
            return meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0;
        }
    }

    false
}

/// Whether a file is a candidate for scanning. This filters only obvious
/// system/temp artifacts; MIME detection decides whether a candidate is media.
pub fn should_scan_file(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_lowercase(),
        None => return false,
    };

    if is_hidden(path) {
        return false;
    }

    if SYSTEM_FILES.contains(&filename.as_str()) {
        return false;
    }

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if TEMP_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_backslashes_and_whitespace() {
        assert_eq!(
            normalize_path("  Photos from 2023\\IMG_0001.JPG "),
            "Photos from 2023/IMG_0001.JPG"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_path(" a\\b/c\u{0301} ");
        assert_eq!(normalize_path(&once), once);
    }

    #[test]
    fn test_normalize_applies_nfc() {
        // "e" + combining acute accent must collapse to the precomposed form
        let decomposed = "caf\u{0065}\u{0301}";
        assert_eq!(normalize_path(decomposed), "caf\u{00e9}");
    }

    #[test]
    fn test_hidden_files_skipped() {
        assert!(!should_scan_file(&PathBuf::from("/a/.hidden.jpg")));
        assert!(should_scan_file(&PathBuf::from("/a/visible.jpg")));
    }

    #[test]
    fn test_system_files_skipped() {
        assert!(!should_scan_file(&PathBuf::from("/a/Thumbs.db")));
        assert!(!should_scan_file(&PathBuf::from("/a/desktop.ini")));
        assert!(!should_scan_file(&PathBuf::from("/a/.DS_Store")));
    }

    #[test]
    fn test_temp_extensions_skipped() {
        for ext in ["tmp", "temp", "cache", "bak", "swp"] {
            let p = PathBuf::from(format!("/a/file.{}", ext));
            assert!(!should_scan_file(&p), "should skip .{}", ext);
        }
        assert!(!should_scan_file(&PathBuf::from("/a/file.TMP")));
    }

    #[test]
    fn test_unknown_extensions_are_candidates() {
        // Extension filtering is NOT media detection; MIME stage decides.
        assert!(should_scan_file(&PathBuf::from("/a/file.xyz")));
        assert!(should_scan_file(&PathBuf::from("/a/file")));
    }
}
