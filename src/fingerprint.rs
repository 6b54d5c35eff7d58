use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Bytes hashed from each end of the file for the content fingerprint.
const HEAD_SIZE: u64 = 8192;
const TAIL_SIZE: u64 = 8192;

const CRC_CHUNK_SIZE: usize = 64 * 1024;

/// CRC32 of the entire file, streamed in 64 KiB chunks, as an
/// eight-character lowercase hex string.
pub fn crc32(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CRC_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}

/// SHA-256 fingerprint of file head and tail as a 64-character hex string.
///
/// Files of at most `HEAD_SIZE + TAIL_SIZE` bytes are hashed whole; larger
/// files hash the first 8 KiB concatenated with the last 8 KiB. A fast
/// approximation for change detection that avoids reading large files fully.
pub fn content_fingerprint(path: &Path, file_size: u64) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();

    if file_size <= HEAD_SIZE + TAIL_SIZE {
        let mut contents = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut contents)?;
        hasher.update(&contents);
    } else {
        let mut head = vec![0u8; HEAD_SIZE as usize];
        file.read_exact(&mut head)?;
        hasher.update(&head);

        file.seek(SeekFrom::Start(file_size - TAIL_SIZE))?;
        let mut tail = vec![0u8; TAIL_SIZE as usize];
        file.read_exact(&mut tail)?;
        hasher.update(&tail);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of a sidecar JSON file, same scheme as the media fingerprint.
pub fn sidecar_fingerprint(path: &Path) -> io::Result<String> {
    let size = std::fs::metadata(path)?.len();
    content_fingerprint(path, size)
}
