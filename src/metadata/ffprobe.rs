use std::path::Path;

use serde_json::Value;

use crate::errors::ScanError;
use crate::tools::run_tool;

const FFPROBE_ARGS: &[&str] = &[
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoMetadata {
    pub duration_seconds: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub frame_rate: Option<f64>,
}

/// Probe a video file with ffprobe: duration, dimensions, frame rate.
pub fn probe_video(path: &Path) -> Result<VideoMetadata, ScanError> {
    let stdout = run_tool("ffprobe", FFPROBE_ARGS, path)?;
    let text = String::from_utf8_lossy(&stdout);
    parse_ffprobe_json(&text)
}

/// Parse ffprobe's JSON output; separate from the subprocess call so the
/// parsing is testable without the tool installed.
pub fn parse_ffprobe_json(stdout: &str) -> Result<VideoMetadata, ScanError> {
    let data: Value = serde_json::from_str(stdout)
        .map_err(|e| ScanError::Parse(format!("invalid ffprobe output: {}", e)))?;

    let mut meta = VideoMetadata::default();

    if let Some(duration) = data
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
    {
        meta.duration_seconds = duration.parse().ok();
    }

    // Only the first video stream counts; audio streams are skipped.
    if let Some(streams) = data.get("streams").and_then(|s| s.as_array()) {
        for stream in streams {
            if stream.get("codec_type").and_then(|c| c.as_str()) != Some("video") {
                continue;
            }
            meta.width = stream.get("width").and_then(|w| w.as_i64());
            meta.height = stream.get("height").and_then(|h| h.as_i64());
            meta.frame_rate = stream
                .get("r_frame_rate")
                .or_else(|| stream.get("avg_frame_rate"))
                .and_then(|r| r.as_str())
                .and_then(parse_frame_rate);
            break;
        }
    }

    Ok(meta)
}

/// ffprobe reports frame rates as rationals like "30000/1001" or "30/1".
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den)
        }
        None => s.trim().parse().ok(),
    }
}
