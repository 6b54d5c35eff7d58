pub mod aggregate;
pub mod exif;
pub mod exiftool;
pub mod ffprobe;
pub mod sidecar;
