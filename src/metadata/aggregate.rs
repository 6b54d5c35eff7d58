use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use regex::Regex;

use crate::metadata::exif::ExifData;
use crate::metadata::ffprobe::VideoMetadata;
use crate::metadata::sidecar::{GeoData, SidecarMetadata};

/// Fields the aggregator resolves across the three metadata sources.
/// EXIF scalars and video scalars pass through unmodified; only the fields
/// with cross-source precedence live here.
#[derive(Debug, Clone, Default)]
pub struct AggregatedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub capture_timestamp: Option<DateTime<Utc>>,
    pub google_geo: Option<GeoData>,
}

/// Apply the precedence rules:
/// title sidecar → filename stem; description sidecar only;
/// capture timestamp EXIF (reliable) → sidecar photoTakenTime →
/// sidecar creationTime → filename → null; geo sidecar only.
pub fn aggregate(
    file_name: &str,
    file_stem: &str,
    sidecar: Option<&SidecarMetadata>,
    exif: &ExifData,
) -> AggregatedMetadata {
    let title = sidecar
        .and_then(|s| s.title.clone())
        .unwrap_or_else(|| file_stem.to_string());

    AggregatedMetadata {
        title: Some(title),
        description: sidecar.and_then(|s| s.description.clone()),
        capture_timestamp: aggregate_timestamp(file_name, sidecar, exif),
        google_geo: sidecar.and_then(|s| s.geo),
    }
}

fn aggregate_timestamp(
    file_name: &str,
    sidecar: Option<&SidecarMetadata>,
    exif: &ExifData,
) -> Option<DateTime<Utc>> {
    if let Some(dt) = exif.datetime_original.filter(|dt| is_reliable_exif_timestamp(dt)) {
        return Some(dt);
    }
    if let Some(dt) = exif.datetime_digitized.filter(|dt| is_reliable_exif_timestamp(dt)) {
        return Some(dt);
    }
    if let Some(dt) = sidecar.and_then(|s| s.photo_taken_time) {
        return Some(dt);
    }
    if let Some(dt) = sidecar.and_then(|s| s.creation_time) {
        return Some(dt);
    }
    timestamp_from_filename(file_name)
}

/// Dimensions: video metadata wins over the image decoder / EXIF.
pub fn resolve_dimensions(
    image_dims: Option<(i64, i64)>,
    exif: &ExifData,
    video: Option<&VideoMetadata>,
) -> (Option<i64>, Option<i64>) {
    if let Some(v) = video {
        if v.width.is_some() || v.height.is_some() {
            return (v.width, v.height);
        }
    }
    if let Some((w, h)) = image_dims {
        return (Some(w), Some(h));
    }
    (exif.width, exif.height)
}

/// Cameras with unset clocks emit default timestamps; treat those (and other
/// implausible instants) as unreliable so the sidecar can take precedence.
pub fn is_reliable_exif_timestamp(dt: &DateTime<Utc>) -> bool {
    let trivial = [
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap(),
    ];
    for t in trivial {
        if (*dt - t).num_seconds().abs() < 60 {
            return false;
        }
    }

    if dt.year() < 1990 {
        return false;
    }

    if *dt > Utc::now() + Duration::days(365) {
        return false;
    }

    // Midnight on January 1 of any year is a common camera default.
    if dt.month() == 1
        && dt.day() == 1
        && dt.hour() == 0
        && dt.minute() == 0
        && dt.second() == 0
    {
        return false;
    }

    true
}

/// Parse a capture instant out of common filename shapes:
/// `IMG_20130608_143022`, `20130608_143022`, `2013-06-08 14.30.22`,
/// `2013-06-08`. All produced instants are UTC.
pub fn timestamp_from_filename(file_name: &str) -> Option<DateTime<Utc>> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?:IMG|VID)_(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})").unwrap(),
            Regex::new(r"(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})").unwrap(),
            Regex::new(r"(\d{4})-(\d{2})-(\d{2})\s+(\d{2})\.(\d{2})\.(\d{2})").unwrap(),
            Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap(),
        ]
    });

    for re in patterns {
        let caps = match re.captures(file_name) {
            Some(c) => c,
            None => continue,
        };

        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year: i32 = match caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            Some(y) => y,
            None => continue,
        };
        let (month, day) = match (field(2), field(3)) {
            (Some(m), Some(d)) => (m, d),
            _ => continue,
        };
        let (hour, minute, second) = if caps.len() > 4 {
            match (field(4), field(5), field(6)) {
                (Some(h), Some(m), Some(s)) => (h, m, s),
                _ => (0, 0, 0),
            }
        } else {
            (0, 0, 0)
        };

        // Calendar-invalid matches (e.g. month 13) fall through to the next
        // pattern, matching how less specific shapes can still apply.
        if let Some(dt) = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
        {
            return Some(dt);
        }
    }

    None
}
