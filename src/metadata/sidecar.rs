use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::errors::ScanError;

/// Formats Google has used for the human-readable `formatted` field.
const FORMATTED_PATTERNS: &[&str] = &[
    "%b %d, %Y, %I:%M:%S %p UTC",
    "%b %d, %Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S UTC",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoData {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub latitude_span: Option<f64>,
    pub longitude_span: Option<f64>,
}

/// Parsed Takeout sidecar. Raw epoch-second strings are kept alongside the
/// parsed instants because the media item id is derived from the raw values.
#[derive(Debug, Clone, Default)]
pub struct SidecarMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_taken_time: Option<DateTime<Utc>>,
    pub photo_taken_raw: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub creation_raw: Option<String>,
    pub geo: Option<GeoData>,
    pub people: Vec<String>,
    pub url: Option<String>,
    pub google_photos_origin: Option<Value>,
    /// Preserved as a string, which is how Takeout emits it.
    pub image_views: Option<String>,
    pub app_source: Option<String>,
}

/// Parse a Takeout JSON sidecar file.
///
/// Malformed individual fields produce a null value and a warning; only a
/// structurally invalid document is an error.
pub fn parse_sidecar(path: &Path) -> Result<SidecarMetadata, ScanError> {
    let contents = std::fs::read_to_string(path)?;
    parse_sidecar_str(&contents, path)
}

pub fn parse_sidecar_str(contents: &str, path: &Path) -> Result<SidecarMetadata, ScanError> {
    let data: Value = serde_json::from_str(contents)
        .map_err(|e| ScanError::Parse(format!("invalid sidecar JSON {:?}: {}", path, e)))?;

    let mut meta = SidecarMetadata {
        title: string_field(&data, "title"),
        description: string_field(&data, "description"),
        url: string_field(&data, "url"),
        app_source: string_field(&data, "appSource"),
        google_photos_origin: data.get("googlePhotosOrigin").cloned(),
        ..Default::default()
    };

    meta.image_views = match data.get("imageViews") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    if let Some(taken) = data.get("photoTakenTime") {
        let (instant, raw) = parse_time_value(taken, path);
        meta.photo_taken_time = instant;
        meta.photo_taken_raw = raw;
    }

    // creationTime is a fallback; only consulted when photoTakenTime is absent.
    if meta.photo_taken_time.is_none() && meta.photo_taken_raw.is_none() {
        if let Some(creation) = data.get("creationTime") {
            let (instant, raw) = parse_time_value(creation, path);
            meta.creation_time = instant;
            meta.creation_raw = raw;
        }
    }

    if let Some(geo) = data.get("geoData") {
        meta.geo = Some(parse_geo(geo));
    } else if let Some(geo) = data.get("geoDataExif") {
        meta.geo = Some(parse_geo(geo));
    }

    if let Some(Value::Array(people)) = data.get("people") {
        meta.people = people
            .iter()
            .filter_map(|p| p.get("name"))
            .filter_map(|n| n.as_str())
            .map(|n| n.to_string())
            .collect();
    }

    Ok(meta)
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// A Takeout time value is a `{timestamp, formatted}` object, a bare epoch
/// integer, or an ISO string. Returns the parsed instant plus the raw
/// timestamp string for id derivation.
fn parse_time_value(value: &Value, path: &Path) -> (Option<DateTime<Utc>>, Option<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(ts) = obj.get("timestamp") {
                let raw = match ts {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                };
                let instant = raw.as_deref().and_then(parse_epoch_seconds);
                if instant.is_none() {
                    tracing::warn!("unparseable sidecar timestamp in {:?}: {:?}", path, ts);
                }
                (instant, raw)
            } else if let Some(Value::String(formatted)) = obj.get("formatted") {
                (parse_formatted(formatted, path), None)
            } else {
                (None, None)
            }
        }
        Value::Number(n) => {
            let raw = n.to_string();
            let instant = parse_epoch_seconds(&raw);
            (instant, Some(raw))
        }
        Value::String(s) => {
            let instant = parse_formatted(s, path);
            (instant, Some(s.clone()))
        }
        _ => (None, None),
    }
}

fn parse_epoch_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_formatted(formatted: &str, path: &Path) -> Option<DateTime<Utc>> {
    // ISO strings with an offset pass through.
    if formatted.contains('T') && (formatted.contains('Z') || formatted.contains('+')) {
        return DateTime::parse_from_rfc3339(formatted)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }

    for pattern in FORMATTED_PATTERNS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(formatted, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    tracing::warn!("unrecognized timestamp format in {:?}: {}", path, formatted);
    None
}

fn parse_geo(geo: &Value) -> GeoData {
    GeoData {
        latitude: geo.get("latitude").and_then(|v| v.as_f64()),
        longitude: geo.get("longitude").and_then(|v| v.as_f64()),
        altitude: geo.get("altitude").and_then(|v| v.as_f64()),
        latitude_span: geo.get("latitudeSpan").and_then(|v| v.as_f64()),
        longitude_span: geo.get("longitudeSpan").and_then(|v| v.as_f64()),
    }
}
