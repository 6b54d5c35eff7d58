use std::io;
use std::path::Path;

/// MIME type returned when the magic-byte table has no match.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Detect the MIME type of a file by reading its magic bytes.
/// Returns `application/octet-stream` when the signature is not recognized
/// (RAW camera formats and other exotic types end up here).
pub fn detect_mime(path: &Path) -> io::Result<String> {
    match infer::get_from_path(path)? {
        Some(kind) => Ok(kind.mime_type().to_string()),
        None => Ok(UNKNOWN_MIME.to_string()),
    }
}

pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

pub fn is_unknown(mime: &str) -> bool {
    mime == UNKNOWN_MIME
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_jpeg_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("photo.jpg");
        fs::write(&p, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']).unwrap();
        assert_eq!(detect_mime(&p).unwrap(), "image/jpeg");
    }

    #[test]
    fn test_detect_png_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("shot.png");
        fs::write(&p, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
        assert_eq!(detect_mime(&p).unwrap(), "image/png");
    }

    #[test]
    fn test_unrecognized_bytes_fall_back_to_octet_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("notes.txt");
        fs::write(&p, b"just some text").unwrap();
        let mime = detect_mime(&p).unwrap();
        assert_eq!(mime, UNKNOWN_MIME);
        assert!(is_unknown(&mime));
    }

    #[test]
    fn test_classifiers() {
        assert!(is_image("image/jpeg"));
        assert!(!is_image("video/mp4"));
        assert!(is_video("video/quicktime"));
        assert!(!is_video("image/png"));
        assert!(is_unknown("application/octet-stream"));
        assert!(!is_unknown("image/heic"));
    }

    #[test]
    fn test_detect_missing_file_is_io_error() {
        assert!(detect_mime(Path::new("/nonexistent/file.bin")).is_err());
    }
}
