use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ScanError;
use crate::scan::orchestrator::{default_worker_processes, default_worker_threads, ScannerOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter: trace, debug, info, warn, error.
    pub level: String,
    /// "plain" or "json".
    pub format: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

/// Scanner configuration, loadable from a JSON file. Absent fields take
/// their defaults; thread counts default to the machine shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub worker_threads: Option<usize>,
    pub worker_processes: Option<usize>,
    pub batch_size: usize,
    pub queue_maxsize: usize,
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
    pub log: LogConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            worker_threads: None,
            worker_processes: None,
            batch_size: 100,
            queue_maxsize: 1000,
            use_exiftool: false,
            use_ffprobe: false,
            log: LogConfig::default(),
        }
    }
}

impl ScannerConfig {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ScanError::Parse(format!("invalid config {:?}: {}", path, e)))
    }

    pub fn scanner_options(&self) -> ScannerOptions {
        ScannerOptions {
            worker_threads: self.worker_threads.unwrap_or_else(default_worker_threads),
            worker_processes: self
                .worker_processes
                .unwrap_or_else(default_worker_processes),
            batch_size: self.batch_size,
            queue_maxsize: self.queue_maxsize,
            use_exiftool: self.use_exiftool,
            use_ffprobe: self.use_ffprobe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.queue_maxsize, 1000);
        assert!(!config.use_exiftool);
        assert!(!config.use_ffprobe);
        assert_eq!(config.log.level, "info");

        let options = config.scanner_options();
        assert!(options.worker_threads >= 2);
        assert!(options.worker_processes >= 1);
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        fs::write(
            &p,
            r#"{"worker_threads": 4, "use_ffprobe": true, "log": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = ScannerConfig::load(&p).unwrap();
        assert_eq!(config.worker_threads, Some(4));
        assert!(config.use_ffprobe);
        assert!(!config.use_exiftool);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.scanner_options().worker_threads, 4);
    }

    #[test]
    fn test_load_invalid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("config.json");
        fs::write(&p, b"{nope").unwrap();
        assert!(matches!(
            ScannerConfig::load(&p),
            Err(ScanError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io() {
        assert!(matches!(
            ScannerConfig::load(Path::new("/nonexistent.json")),
            Err(ScanError::Io(_))
        ));
    }
}
