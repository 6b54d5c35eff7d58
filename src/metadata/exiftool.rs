use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::errors::ScanError;
use crate::metadata::exif::{parse_exif_datetime, ExifData};
use crate::tools::run_tool;

/// Tag selection requested from the RAW EXIF tool.
const EXIFTOOL_ARGS: &[&str] = &[
    "-json",
    "-DateTimeOriginal",
    "-CreateDate",
    "-GPSLatitude",
    "-GPSLongitude",
    "-GPSAltitude",
    "-Make",
    "-Model",
    "-LensMake",
    "-LensModel",
    "-FocalLength",
    "-FNumber",
    "-ExposureTime",
    "-ISO",
    "-Orientation",
    "-Flash",
    "-WhiteBalance",
    "-ImageWidth",
    "-ImageHeight",
];

/// Extract EXIF from a RAW file by invoking exiftool with JSON output.
/// Used for formats the in-process reader cannot open (DNG, CR2, NEF, ARW).
pub fn extract_raw_exif(path: &Path) -> Result<ExifData, ScanError> {
    let stdout = run_tool("exiftool", EXIFTOOL_ARGS, path)?;
    let text = String::from_utf8_lossy(&stdout);
    parse_exiftool_json(&text)
}

/// Parse exiftool's `-json` output. Kept separate from the subprocess call
/// so the parsing is testable without the tool installed.
pub fn parse_exiftool_json(stdout: &str) -> Result<ExifData, ScanError> {
    let data: Value = serde_json::from_str(stdout)
        .map_err(|e| ScanError::Parse(format!("invalid exiftool output: {}", e)))?;

    // exiftool emits an array with one object per input file.
    let obj = match data.as_array().and_then(|a| a.first()) {
        Some(o) => o,
        None => return Ok(ExifData::default()),
    };

    let mut exif = ExifData {
        datetime_original: string_of(obj, "DateTimeOriginal")
            .as_deref()
            .and_then(parse_exif_datetime),
        camera_make: string_of(obj, "Make"),
        camera_model: string_of(obj, "Model"),
        lens_make: string_of(obj, "LensMake"),
        lens_model: string_of(obj, "LensModel"),
        focal_length: number_of(obj, "FocalLength"),
        f_number: number_of(obj, "FNumber"),
        exposure_time: obj.get("ExposureTime").map(value_to_string),
        iso: obj.get("ISO").and_then(|v| v.as_i64()),
        orientation: obj.get("Orientation").and_then(parse_orientation),
        flash: string_of(obj, "Flash"),
        white_balance: string_of(obj, "WhiteBalance"),
        gps_latitude: obj.get("GPSLatitude").and_then(parse_gps_coordinate),
        gps_longitude: obj.get("GPSLongitude").and_then(parse_gps_coordinate),
        gps_altitude: obj.get("GPSAltitude").and_then(parse_altitude),
        width: obj.get("ImageWidth").and_then(|v| v.as_i64()),
        height: obj.get("ImageHeight").and_then(|v| v.as_i64()),
        ..Default::default()
    };

    // CreateDate maps onto the digitized timestamp when present.
    exif.datetime_digitized = string_of(obj, "CreateDate")
        .as_deref()
        .and_then(parse_exif_datetime);

    Ok(exif)
}

fn string_of(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// exiftool prints numeric tags either as numbers or annotated strings
/// ("24.0 mm", "f/2.8").
fn number_of(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().trim_start_matches("f/");
            cleaned
                .split_whitespace()
                .next()
                .and_then(|t| t.parse().ok())
        }
        _ => None,
    }
}

/// Orientation arrives as an integer or a descriptive name.
fn parse_orientation(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    let name = v.as_str()?;
    match name {
        "Horizontal (normal)" => Some(1),
        "Mirror horizontal" => Some(2),
        "Rotate 180" => Some(3),
        "Mirror vertical" => Some(4),
        "Mirror horizontal and rotate 270 CW" => Some(5),
        "Rotate 90 CW" => Some(6),
        "Mirror horizontal and rotate 90 CW" => Some(7),
        "Rotate 270 CW" => Some(8),
        _ => name.parse().ok(),
    }
}

/// GPS coordinates arrive as decimal numbers (with `-n`) or DMS strings
/// like `41 deg 53' 24.84" N`.
fn parse_gps_coordinate(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    let s = v.as_str()?;

    static DMS: OnceLock<Regex> = OnceLock::new();
    let re = DMS.get_or_init(|| {
        Regex::new(r#"([\d.]+)\s*deg\s*([\d.]+)'\s*([\d.]+)"\s*([NSEW])"#).unwrap()
    });

    let caps = re.captures(s)?;
    let degrees: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if matches!(&caps[4], "S" | "W") {
        decimal = -decimal;
    }
    Some(decimal)
}

/// Altitude arrives as a number or a string like "21.3 m Above Sea Level".
fn parse_altitude(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    let s = v.as_str()?;
    let value: f64 = s.split_whitespace().next()?.parse().ok()?;
    if s.contains("Below") {
        Some(-value)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_output() {
        let exif = parse_exiftool_json(
            r#"[{
                "SourceFile": "photo.dng",
                "DateTimeOriginal": "2021:07:04 08:15:30",
                "CreateDate": "2021:07:04 08:15:31",
                "Make": "NIKON CORPORATION",
                "Model": "NIKON Z 6",
                "LensModel": "NIKKOR Z 24-70mm f/4 S",
                "FocalLength": "24.0 mm",
                "FNumber": 4.0,
                "ExposureTime": "1/250",
                "ISO": 100,
                "Orientation": "Rotate 90 CW",
                "Flash": "Off, Did not fire",
                "WhiteBalance": "Auto",
                "GPSLatitude": "41 deg 53' 24.84\" N",
                "GPSLongitude": "12 deg 29' 32.64\" E",
                "GPSAltitude": "21.3 m Above Sea Level",
                "ImageWidth": 6048,
                "ImageHeight": 4024
            }]"#,
        )
        .unwrap();

        assert_eq!(
            exif.datetime_original.unwrap().to_rfc3339(),
            "2021-07-04T08:15:30+00:00"
        );
        assert_eq!(
            exif.datetime_digitized.unwrap().to_rfc3339(),
            "2021-07-04T08:15:31+00:00"
        );
        assert_eq!(exif.camera_make.as_deref(), Some("NIKON CORPORATION"));
        assert_eq!(exif.focal_length, Some(24.0));
        assert_eq!(exif.f_number, Some(4.0));
        assert_eq!(exif.exposure_time.as_deref(), Some("1/250"));
        assert_eq!(exif.iso, Some(100));
        assert_eq!(exif.orientation, Some(6));
        assert!((exif.gps_latitude.unwrap() - 41.8902).abs() < 0.001);
        assert!((exif.gps_longitude.unwrap() - 12.4924).abs() < 0.001);
        assert_eq!(exif.gps_altitude, Some(21.3));
        assert_eq!(exif.width, Some(6048));
        assert_eq!(exif.height, Some(4024));
    }

    #[test]
    fn test_parse_southern_hemisphere_negates() {
        let exif = parse_exiftool_json(
            r#"[{"GPSLatitude": "33 deg 52' 4.8\" S", "GPSLongitude": "151 deg 12' 36\" E"}]"#,
        )
        .unwrap();
        assert!(exif.gps_latitude.unwrap() < 0.0);
        assert!(exif.gps_longitude.unwrap() > 0.0);
    }

    #[test]
    fn test_parse_decimal_gps_passthrough() {
        let exif =
            parse_exiftool_json(r#"[{"GPSLatitude": -33.868, "GPSAltitude": 12.0}]"#).unwrap();
        assert_eq!(exif.gps_latitude, Some(-33.868));
        assert_eq!(exif.gps_altitude, Some(12.0));
    }

    #[test]
    fn test_parse_below_sea_level() {
        let exif =
            parse_exiftool_json(r#"[{"GPSAltitude": "396 m Below Sea Level"}]"#).unwrap();
        assert_eq!(exif.gps_altitude, Some(-396.0));
    }

    #[test]
    fn test_parse_numeric_orientation() {
        let exif = parse_exiftool_json(r#"[{"Orientation": 3}]"#).unwrap();
        assert_eq!(exif.orientation, Some(3));
    }

    #[test]
    fn test_empty_array_is_default() {
        let exif = parse_exiftool_json("[]").unwrap();
        assert!(exif.is_empty());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            parse_exiftool_json("not json"),
            Err(ScanError::Parse(_))
        ));
    }
}
