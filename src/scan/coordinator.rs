use crate::catalog::media_items::FingerprintIndex;
use crate::catalog::model::{MediaItemRecord, ProcessingErrorRecord};
use crate::errors::ErrorType;
use crate::fingerprint::sidecar_fingerprint;
use crate::ids;
use crate::metadata::aggregate::{aggregate, resolve_dimensions};
use crate::metadata::sidecar::{parse_sidecar, SidecarMetadata};
use crate::scan::discovery::FileInfo;
use crate::scan::processor::ProcessedFile;
use crate::scan::{ScanResult, UnchangedFile};

/// The I/O-side per-file pipeline: parse the sidecar, consult the rescan
/// predicate, aggregate metadata, derive the deterministic id, and build
/// the record. Emits one primary result plus any secondary error results
/// (sidecar parse failures, non-fatal extraction errors).
pub fn coordinate(
    file_info: &FileInfo,
    processed: ProcessedFile,
    album_id: &str,
    scan_run_id: &str,
    index: &FingerprintIndex,
) -> Vec<ScanResult> {
    let mut results = Vec::with_capacity(2);

    // A hard processing failure (file vanished mid-scan) yields only an
    // error row; there is nothing truthful to record about the file.
    if !processed.success {
        let (category, message) = processed
            .error
            .clone()
            .unwrap_or((crate::errors::ErrorCategory::Unknown, "processing failed".into()));
        results.push(ScanResult::Error(ProcessingErrorRecord {
            scan_run_id: scan_run_id.to_string(),
            relative_path: file_info.relative_path.clone(),
            error_type: ErrorType::MediaFile,
            error_category: category,
            error_message: message,
        }));
        return results;
    }

    // 1. Sidecar parse and fingerprint. Parse failures attach null metadata
    // but never abort the file.
    let mut sidecar: Option<SidecarMetadata> = None;
    let mut sidecar_fp: Option<String> = None;
    if let Some(sidecar_path) = &file_info.sidecar_path {
        match parse_sidecar(sidecar_path) {
            Ok(meta) => sidecar = Some(meta),
            Err(e) => {
                tracing::warn!("sidecar parse failed for {:?}: {}", sidecar_path, e);
                results.push(ScanResult::Error(ProcessingErrorRecord {
                    scan_run_id: scan_run_id.to_string(),
                    relative_path: file_info.relative_path.clone(),
                    error_type: ErrorType::JsonSidecar,
                    error_category: e.category(),
                    error_message: e.to_string(),
                }));
            }
        }
        match sidecar_fingerprint(sidecar_path) {
            Ok(fp) => sidecar_fp = Some(fp),
            Err(e) => {
                tracing::debug!("sidecar fingerprint failed for {:?}: {}", sidecar_path, e);
            }
        }
    }

    // 2. Rescan predicate: an unchanged file short-circuits to a lifecycle
    // refresh instead of a fresh record.
    if let Some(content_fp) = &processed.content_fingerprint {
        if index.check_unchanged(&file_info.relative_path, content_fp, sidecar_fp.as_deref()) {
            results.push(ScanResult::Unchanged(UnchangedFile {
                relative_path: file_info.relative_path.clone(),
            }));
            return results;
        }
    }

    // Non-fatal extraction failures ride along as separate error rows.
    if let Some((category, message)) = &processed.error {
        results.push(ScanResult::Error(ProcessingErrorRecord {
            scan_run_id: scan_run_id.to_string(),
            relative_path: file_info.relative_path.clone(),
            error_type: ErrorType::MediaFile,
            error_category: *category,
            error_message: message.clone(),
        }));
    }

    let file_name = file_info
        .relative_path
        .rsplit('/')
        .next()
        .unwrap_or(&file_info.relative_path);
    let file_stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };

    // 3. Precedence-resolved metadata.
    let aggregated = aggregate(file_name, file_stem, sidecar.as_ref(), &processed.exif);

    // 4. Deterministic id from the canonical tuple.
    let media_item_id = ids::media_item_id(
        &file_info.relative_path,
        sidecar.as_ref().and_then(|s| s.photo_taken_raw.as_deref()),
        file_info.file_size,
        sidecar.as_ref().and_then(|s| s.creation_raw.as_deref()),
    );

    let image_dims = match (processed.width, processed.height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => None,
    };
    let (width, height) =
        resolve_dimensions(image_dims, &processed.exif, processed.video.as_ref());

    let geo = aggregated.google_geo;
    let exif = &processed.exif;

    // 5. The full record.
    let record = MediaItemRecord {
        media_item_id,
        relative_path: file_info.relative_path.clone(),
        album_id: album_id.to_string(),
        title: aggregated.title,
        mime_type: processed.mime_type.clone(),
        file_size: file_info.file_size as i64,
        crc32: processed.crc32.clone(),
        content_fingerprint: processed.content_fingerprint.clone(),
        sidecar_fingerprint: sidecar_fp,
        width,
        height,
        duration_seconds: processed.video.and_then(|v| v.duration_seconds),
        frame_rate: processed.video.and_then(|v| v.frame_rate),
        capture_timestamp: aggregated.capture_timestamp,
        exif_datetime_original: exif.datetime_original,
        exif_datetime_digitized: exif.datetime_digitized,
        exif_gps_latitude: exif.gps_latitude,
        exif_gps_longitude: exif.gps_longitude,
        exif_gps_altitude: exif.gps_altitude,
        exif_camera_make: exif.camera_make.clone(),
        exif_camera_model: exif.camera_model.clone(),
        exif_lens_make: exif.lens_make.clone(),
        exif_lens_model: exif.lens_model.clone(),
        exif_focal_length: exif.focal_length,
        exif_f_number: exif.f_number,
        exif_exposure_time: exif.exposure_time.clone(),
        exif_iso: exif.iso,
        exif_orientation: exif.orientation,
        exif_flash: exif.flash.clone(),
        exif_white_balance: exif.white_balance.clone(),
        google_description: aggregated.description,
        google_geo_latitude: geo.and_then(|g| g.latitude),
        google_geo_longitude: geo.and_then(|g| g.longitude),
        google_geo_altitude: geo.and_then(|g| g.altitude),
        google_geo_latitude_span: geo.and_then(|g| g.latitude_span),
        google_geo_longitude_span: geo.and_then(|g| g.longitude_span),
        original_media_item_id: None,
        live_photo_pair_id: None,
        people: sidecar.map(|s| s.people).unwrap_or_default(),
        status: None,
        scan_run_id: scan_run_id.to_string(),
    };

    results.push(ScanResult::Media(Box::new(record)));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::processor::{process_file, ToolSettings};
    use std::fs;
    use std::path::PathBuf;

    fn make_file_info(dir: &std::path::Path, name: &str, sidecar: Option<PathBuf>) -> FileInfo {
        let abs = dir.join(name);
        let size = fs::metadata(&abs).unwrap().len();
        FileInfo {
            abs_path: abs,
            relative_path: format!("Trip/{}", name),
            album_folder_path: "Trip".to_string(),
            sidecar_path: sidecar,
            file_size: size,
        }
    }

    fn processed_for(info: &FileInfo) -> ProcessedFile {
        process_file(&info.abs_path, info.file_size, &ToolSettings::default())
    }

    #[test]
    fn test_coordinate_builds_record_with_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("IMG_1.jpg");
        image::DynamicImage::new_rgb8(10, 10).save(&img).unwrap();
        let sidecar = tmp.path().join("IMG_1.jpg.supplemental-metadata.json");
        fs::write(
            &sidecar,
            r#"{"title": "IMG_1.jpg", "description": "desc",
                "photoTakenTime": {"timestamp": "1577836800"},
                "geoData": {"latitude": 41.9, "longitude": 12.5},
                "people": [{"name": "A"}]}"#,
        )
        .unwrap();

        let info = make_file_info(tmp.path(), "IMG_1.jpg", Some(sidecar));
        let processed = processed_for(&info);
        let results = coordinate(
            &info,
            processed,
            "album-1",
            "run-1",
            &FingerprintIndex::default(),
        );

        assert_eq!(results.len(), 1);
        let record = match &results[0] {
            ScanResult::Media(r) => r,
            other => panic!("expected media result, got {:?}", other),
        };
        assert_eq!(record.album_id, "album-1");
        assert_eq!(record.title.as_deref(), Some("IMG_1.jpg"));
        assert_eq!(record.google_description.as_deref(), Some("desc"));
        assert_eq!(record.google_geo_latitude, Some(41.9));
        assert_eq!(
            record.capture_timestamp.unwrap().to_rfc3339(),
            "2020-01-01T00:00:00+00:00"
        );
        assert!(record.sidecar_fingerprint.is_some());
        assert_eq!(record.people, vec!["A"]);
        // Id embeds the sidecar's raw epoch value.
        assert_eq!(
            record.media_item_id,
            ids::media_item_id(
                "Trip/IMG_1.jpg",
                Some("1577836800"),
                record.file_size as u64,
                None
            )
        );
    }

    #[test]
    fn test_coordinate_without_sidecar_uses_stem_title() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("IMG_2.jpg");
        image::DynamicImage::new_rgb8(10, 10).save(&img).unwrap();

        let info = make_file_info(tmp.path(), "IMG_2.jpg", None);
        let processed = processed_for(&info);
        let results = coordinate(
            &info,
            processed,
            "album-1",
            "run-1",
            &FingerprintIndex::default(),
        );

        let record = match &results[0] {
            ScanResult::Media(r) => r,
            other => panic!("expected media result, got {:?}", other),
        };
        assert_eq!(record.title.as_deref(), Some("IMG_2"));
        assert!(record.sidecar_fingerprint.is_none());
        assert!(record.people.is_empty());
    }

    #[test]
    fn test_coordinate_broken_sidecar_emits_error_and_record() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("IMG_3.jpg");
        image::DynamicImage::new_rgb8(10, 10).save(&img).unwrap();
        let sidecar = tmp.path().join("IMG_3.jpg.supplemental-metadata.json");
        fs::write(&sidecar, b"{broken").unwrap();

        let info = make_file_info(tmp.path(), "IMG_3.jpg", Some(sidecar));
        let processed = processed_for(&info);
        let results = coordinate(
            &info,
            processed,
            "album-1",
            "run-1",
            &FingerprintIndex::default(),
        );

        assert_eq!(results.len(), 2);
        assert!(matches!(&results[0], ScanResult::Error(e)
            if e.error_type == ErrorType::JsonSidecar));
        assert!(matches!(&results[1], ScanResult::Media(_)));
    }

    #[test]
    fn test_coordinate_unchanged_short_circuits() {
        use crate::catalog::media_items::{insert_media_item, load_fingerprint_index};
        use crate::db::run_migrations;

        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("IMG_4.jpg");
        image::DynamicImage::new_rgb8(10, 10).save(&img).unwrap();

        let info = make_file_info(tmp.path(), "IMG_4.jpg", None);
        let processed = processed_for(&info);

        // Seed the catalog with the same fingerprints.
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let mut seeded = MediaItemRecord {
            media_item_id: "prev".into(),
            relative_path: info.relative_path.clone(),
            file_size: info.file_size as i64,
            content_fingerprint: processed.content_fingerprint.clone(),
            scan_run_id: "run-1".into(),
            ..Default::default()
        };
        seeded.crc32 = processed.crc32.clone();
        insert_media_item(&conn, &seeded).unwrap();
        let index = load_fingerprint_index(&conn).unwrap();

        let results = coordinate(&info, processed, "album-1", "run-2", &index);
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0], ScanResult::Unchanged(u)
            if u.relative_path == "Trip/IMG_4.jpg"));
    }

    #[test]
    fn test_coordinate_vanished_file_emits_only_error() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("ghost.jpg");
        image::DynamicImage::new_rgb8(4, 4).save(&img).unwrap();
        let info = make_file_info(tmp.path(), "ghost.jpg", None);
        fs::remove_file(&img).unwrap();

        let processed = process_file(&info.abs_path, info.file_size, &ToolSettings::default());
        let results = coordinate(
            &info,
            processed,
            "album-1",
            "run-1",
            &FingerprintIndex::default(),
        );

        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0], ScanResult::Error(_)));
    }

    #[test]
    fn test_coordinate_extraction_error_rides_along() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("bad.jpg");
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 32]);
        fs::write(&bad, &bytes).unwrap();

        let info = make_file_info(tmp.path(), "bad.jpg", None);
        let processed = processed_for(&info);
        let results = coordinate(
            &info,
            processed,
            "album-1",
            "run-1",
            &FingerprintIndex::default(),
        );

        assert_eq!(results.len(), 2);
        assert!(matches!(&results[0], ScanResult::Error(e)
            if e.error_type == ErrorType::MediaFile));
        let record = match &results[1] {
            ScanResult::Media(r) => r,
            other => panic!("expected media result, got {:?}", other),
        };
        assert_eq!(record.width, None);
        assert!(record.crc32.is_some());
    }
}
