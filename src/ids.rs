use uuid::Uuid;

use crate::paths::normalize_path;

/// Deterministic album id: UUIDv5 of the album folder basename under the
/// RFC 4122 DNS namespace. Only the basename participates, so the id is
/// invariant under changes in where the Takeout archive was extracted.
pub fn album_id(folder_name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, folder_name.as_bytes()).to_string()
}

/// Deterministic media item id: UUIDv5 over the canonical tuple
/// `relative_path | photoTakenTime | file_size | creationTime`.
///
/// The path is normalized before hashing; missing sidecar timestamps
/// contribute empty strings. Re-extractions of the same archive therefore
/// produce stable ids even when absolute paths change.
pub fn media_item_id(
    relative_path: &str,
    photo_taken_timestamp: Option<&str>,
    file_size: u64,
    creation_timestamp: Option<&str>,
) -> String {
    let canonical = format!(
        "{}|{}|{}|{}",
        normalize_path(relative_path),
        photo_taken_timestamp.unwrap_or(""),
        file_size,
        creation_timestamp.unwrap_or("")
    );
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, canonical.as_bytes()).to_string()
}
