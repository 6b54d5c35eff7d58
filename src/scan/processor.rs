use std::path::Path;

use crate::errors::{ErrorCategory, ScanError};
use crate::fingerprint;
use crate::metadata::exif::{extract_exif, ExifData};
use crate::metadata::exiftool::extract_raw_exif;
use crate::metadata::ffprobe::{probe_video, VideoMetadata};
use crate::mime;

/// Which external tools a worker may invoke.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolSettings {
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
}

/// Output of the CPU-side pipeline for one file. A plain value type with no
/// open handles, so it can cross worker boundaries freely.
#[derive(Debug, Clone, Default)]
pub struct ProcessedFile {
    pub success: bool,
    pub mime_type: Option<String>,
    pub crc32: Option<String>,
    pub content_fingerprint: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub exif: ExifData,
    pub video: Option<VideoMetadata>,
    /// First non-fatal extraction failure, recorded in processing_errors
    /// while the media row itself is still written.
    pub error: Option<(ErrorCategory, String)>,
}

impl ProcessedFile {
    fn note_error(&mut self, category: ErrorCategory, message: String) {
        if self.error.is_none() {
            self.error = Some((category, message));
        }
    }
}

/// The CPU-bound per-file pipeline:
/// MIME → CRC32 → content fingerprint → EXIF → dimensions → video metadata.
///
/// Pure function of the file contents and tool settings. Individual stage
/// failures null the affected fields and continue; only a vanished file is
/// a hard failure.
pub fn process_file(path: &Path, file_size: u64, tools: &ToolSettings) -> ProcessedFile {
    let mut result = ProcessedFile::default();

    if !path.exists() {
        result.note_error(
            ErrorCategory::Io,
            format!("file does not exist: {:?}", path),
        );
        return result;
    }

    // 1. MIME by magic bytes.
    let mime_type = match mime::detect_mime(path) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("mime detection failed for {:?}: {}", path, e);
            mime::UNKNOWN_MIME.to_string()
        }
    };
    result.mime_type = Some(mime_type.clone());

    // 2. CRC32 over the full file.
    match fingerprint::crc32(path) {
        Ok(crc) => result.crc32 = Some(crc),
        Err(e) => {
            tracing::debug!("crc32 failed for {:?}: {}", path, e);
            result.note_error(ScanError::Io(e).category(), format!("crc32 failed: {:?}", path));
        }
    }

    // 3. Head+tail content fingerprint.
    match fingerprint::content_fingerprint(path, file_size) {
        Ok(fp) => result.content_fingerprint = Some(fp),
        Err(e) => {
            tracing::debug!("fingerprint failed for {:?}: {}", path, e);
            result.note_error(
                ScanError::Io(e).category(),
                format!("content fingerprint failed: {:?}", path),
            );
        }
    }

    // 4. EXIF: in-process for recognized images, external tool for unknowns.
    if mime::is_image(&mime_type) {
        result.exif = extract_exif(path);
    } else if mime::is_unknown(&mime_type) && tools.use_exiftool {
        match extract_raw_exif(path) {
            Ok(exif) => result.exif = exif,
            Err(e) => {
                tracing::debug!("exiftool failed for {:?}: {}", path, e);
                result.note_error(e.category(), format!("exiftool failed: {}", e));
            }
        }
    }

    // 5. Dimensions from the image decoder (images only; videos get theirs
    // from the probe).
    if mime::is_image(&mime_type) {
        match image::image_dimensions(path) {
            Ok((w, h)) => {
                result.width = Some(w as i64);
                result.height = Some(h as i64);
            }
            Err(e) => {
                tracing::debug!("dimension extraction failed for {:?}: {}", path, e);
                result.note_error(
                    ErrorCategory::Corrupted,
                    format!("cannot decode image dimensions: {}", e),
                );
            }
        }
    } else if result.exif.width.is_some() {
        result.width = result.exif.width;
        result.height = result.exif.height;
    }

    // 6. Video metadata via ffprobe.
    if mime::is_video(&mime_type) && tools.use_ffprobe {
        match probe_video(path) {
            Ok(video) => {
                if video.width.is_some() {
                    result.width = video.width;
                    result.height = video.height;
                }
                result.video = Some(video);
            }
            Err(e) => {
                tracing::debug!("ffprobe failed for {:?}: {}", path, e);
                result.note_error(e.category(), format!("ffprobe failed: {}", e));
            }
        }
    }

    result.success = true;
    result
}
