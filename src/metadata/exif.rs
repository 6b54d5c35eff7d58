use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// The full EXIF field set the catalog records. Produced either by the
/// in-process reader (container formats) or the external RAW tool.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub datetime_original: Option<DateTime<Utc>>,
    pub datetime_digitized: Option<DateTime<Utc>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<f64>,
    pub f_number: Option<f64>,
    pub exposure_time: Option<String>,
    pub iso: Option<i64>,
    pub orientation: Option<i64>,
    pub flash: Option<String>,
    pub white_balance: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    /// Dimensions are only populated by the external tool; the image decoder
    /// supplies them for container formats.
    pub width: Option<i64>,
    pub height: Option<i64>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.datetime_original.is_none()
            && self.datetime_digitized.is_none()
            && self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.orientation.is_none()
            && self.gps_latitude.is_none()
    }
}

/// Extract EXIF metadata from an image container using kamadak-exif.
/// Never panics; returns all-None on any error.
pub fn extract_exif(path: &Path) -> ExifData {
    match std::panic::catch_unwind(|| extract_exif_inner(path)) {
        Ok(data) => data,
        Err(_) => {
            tracing::warn!("panic while reading EXIF from {:?}", path);
            ExifData::default()
        }
    }
}

fn extract_exif_inner(path: &Path) -> ExifData {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("cannot open {:?}: {}", path, e);
            return ExifData::default();
        }
    };
    let mut reader = std::io::BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("no EXIF in {:?}: {}", path, e);
            return ExifData::default();
        }
    };

    ExifData {
        datetime_original: read_datetime(&exif, exif::Tag::DateTimeOriginal),
        datetime_digitized: read_datetime(&exif, exif::Tag::DateTimeDigitized),
        camera_make: read_ascii(&exif, exif::Tag::Make),
        camera_model: read_ascii(&exif, exif::Tag::Model),
        lens_make: read_ascii(&exif, exif::Tag::LensMake),
        lens_model: read_ascii(&exif, exif::Tag::LensModel),
        focal_length: read_rational(&exif, exif::Tag::FocalLength),
        f_number: read_rational(&exif, exif::Tag::FNumber),
        exposure_time: read_exposure_time(&exif),
        iso: read_short(&exif, exif::Tag::PhotographicSensitivity),
        orientation: read_short(&exif, exif::Tag::Orientation),
        flash: read_flash(&exif),
        white_balance: read_white_balance(&exif),
        gps_latitude: read_gps_coordinate(&exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef),
        gps_longitude: read_gps_coordinate(
            &exif,
            exif::Tag::GPSLongitude,
            exif::Tag::GPSLongitudeRef,
        ),
        gps_altitude: read_gps_altitude(&exif),
        width: None,
        height: None,
    }
}

/// EXIF datetime format: "YYYY:MM:DD HH:MM:SS". Instants are treated as UTC;
/// EXIF carries no offset.
pub fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.len() < 19 {
        return None;
    }
    let date = s[..10].replace(':', "-");
    let normalized = format!("{} {}", date, &s[11..19]);
    let naive = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn read_datetime(exif: &exif::Exif, tag: exif::Tag) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => vecs
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(parse_exif_datetime),
        _ => None,
    }
}

fn read_ascii(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => {
            let s = vecs
                .first()
                .and_then(|v| std::str::from_utf8(v).ok())?
                .trim()
                .to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
        _ => None,
    }
}

fn read_short(exif: &exif::Exif, tag: exif::Tag) -> Option<i64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(v) => v.first().map(|&n| n as i64),
        exif::Value::Long(v) => v.first().map(|&n| n as i64),
        _ => None,
    }
}

fn read_rational(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) => v.first().and_then(rational_to_f64),
        _ => None,
    }
}

fn rational_to_f64(r: &exif::Rational) -> Option<f64> {
    if r.denom == 0 {
        return None;
    }
    Some(r.num as f64 / r.denom as f64)
}

/// Shutter speeds are conventionally shown as fractions ("1/250").
fn read_exposure_time(exif: &exif::Exif) -> Option<String> {
    let field = exif.get_field(exif::Tag::ExposureTime, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) => v.first().and_then(|r| {
            if r.denom == 0 {
                None
            } else if r.num == 1 {
                Some(format!("1/{}", r.denom))
            } else {
                Some(format!("{}/{}", r.num, r.denom))
            }
        }),
        _ => None,
    }
}

fn read_flash(exif: &exif::Exif) -> Option<String> {
    let value = read_short(exif, exif::Tag::Flash)?;
    // Bit 0 of the Flash tag: whether the flash fired.
    Some(if value & 0x1 != 0 {
        "Flash fired".to_string()
    } else {
        "Flash did not fire".to_string()
    })
}

fn read_white_balance(exif: &exif::Exif) -> Option<String> {
    let value = read_short(exif, exif::Tag::WhiteBalance)?;
    Some(if value == 0 {
        "Auto".to_string()
    } else {
        "Manual".to_string()
    })
}

/// GPS coordinates are stored as degrees/minutes/seconds rationals with a
/// hemisphere reference ("S"/"W" negate).
fn read_gps_coordinate(exif: &exif::Exif, tag: exif::Tag, ref_tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    let dms = match &field.value {
        exif::Value::Rational(v) if v.len() >= 3 => v,
        _ => return None,
    };

    let degrees = rational_to_f64(&dms[0])?;
    let minutes = rational_to_f64(&dms[1])?;
    let seconds = rational_to_f64(&dms[2])?;
    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;

    if let Some(hemisphere) = read_ascii(exif, ref_tag) {
        if hemisphere == "S" || hemisphere == "W" {
            decimal = -decimal;
        }
    }

    Some(decimal)
}

fn read_gps_altitude(exif: &exif::Exif) -> Option<f64> {
    let field = exif.get_field(exif::Tag::GPSAltitude, exif::In::PRIMARY)?;
    let mut altitude = match &field.value {
        exif::Value::Rational(v) => v.first().and_then(rational_to_f64)?,
        _ => return None,
    };

    // AltitudeRef 1 means below sea level.
    if let Some(ref_field) = exif.get_field(exif::Tag::GPSAltitudeRef, exif::In::PRIMARY) {
        if let exif::Value::Byte(v) = &ref_field.value {
            if v.first() == Some(&1) {
                altitude = -altitude;
            }
        }
    }

    Some(altitude)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exif_nonexistent_file() {
        let data = extract_exif(Path::new("/nonexistent/photo.jpg"));
        assert!(data.datetime_original.is_none());
        assert!(data.camera_model.is_none());
        assert!(data.orientation.is_none());
    }

    #[test]
    fn test_exif_garbage_file_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("bad.jpg");
        std::fs::write(&p, b"not a jpeg at all").unwrap();
        let data = extract_exif(&p);
        assert!(data.is_empty());
    }

    #[test]
    fn test_parse_exif_datetime() {
        let dt = parse_exif_datetime("2024:03:15 12:30:45").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-15T12:30:45+00:00");
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("").is_none());
    }

    #[test]
    fn test_exif_extracts_datetime_original() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("known.jpg");
        std::fs::write(&p, test_jpeg::jpeg_with_exif("2023:01:15 10:30:00", 1)).unwrap();

        let data = extract_exif(&p);
        assert_eq!(
            data.datetime_original.unwrap().to_rfc3339(),
            "2023-01-15T10:30:00+00:00"
        );
    }

    #[test]
    fn test_exif_extracts_orientation_and_camera() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("known.jpg");
        std::fs::write(&p, test_jpeg::jpeg_with_exif("2023:06:01 12:00:00", 6)).unwrap();

        let data = extract_exif(&p);
        assert_eq!(data.orientation, Some(6));
        assert_eq!(data.camera_make.as_deref(), Some("Canon"));
        assert_eq!(data.camera_model.as_deref(), Some("Canon EOS 5D Mark IV"));
    }

    #[test]
    fn test_synthetic_jpeg_without_exif_is_all_none() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("plain.jpg");
        image::DynamicImage::new_rgb8(32, 32).save(&p).unwrap();

        let data = extract_exif(&p);
        assert!(data.datetime_original.is_none());
        assert!(data.camera_model.is_none());
        assert!(data.orientation.is_none());
    }
}
