use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::errors::ScanError;

/// Timeout applied to every external tool invocation.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Locate a tool on PATH. Mirrors `which` without shelling out.
pub fn tool_available(name: &str) -> bool {
    let path_var = match std::env::var_os("PATH") {
        Some(p) => p,
        None => return false,
    };

    std::env::split_paths(&path_var).any(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return true;
        }
        if cfg!(windows) {
            return dir.join(format!("{}.exe", name)).is_file();
        }
        false
    })
}

/// Fail fast at startup when a configured tool is absent. Tools that are
/// disabled in configuration are tolerated whether or not they exist.
pub fn check_required_tools(use_exiftool: bool, use_ffprobe: bool) -> Result<(), ScanError> {
    if use_exiftool {
        if tool_available("exiftool") {
            tracing::info!("exiftool: available, RAW EXIF extraction enabled");
        } else {
            return Err(ScanError::ToolMissing(
                "exiftool is enabled in configuration but was not found on PATH".into(),
            ));
        }
    } else {
        tracing::info!("exiftool: disabled, RAW format EXIF will not be extracted");
    }

    if use_ffprobe {
        if tool_available("ffprobe") {
            tracing::info!("ffprobe: available, video metadata extraction enabled");
        } else {
            return Err(ScanError::ToolMissing(
                "ffprobe is enabled in configuration but was not found on PATH".into(),
            ));
        }
    } else {
        tracing::info!("ffprobe: disabled, video metadata will not be extracted");
    }

    Ok(())
}

/// Run an external tool and capture stdout, killing the child if it exceeds
/// `TOOL_TIMEOUT`. A timeout is reported as `ToolMissing` so the file's other
/// metadata fields are still filled in by the caller.
pub fn run_tool(program: &str, args: &[&str], file: &Path) -> Result<Vec<u8>, ScanError> {
    let mut child = Command::new(program)
        .args(args)
        .arg(file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::ToolMissing(format!("{} not found on PATH", program))
            } else {
                ScanError::Io(e)
            }
        })?;

    let deadline = Instant::now() + TOOL_TIMEOUT;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let output = child.wait_with_output()?;
                if !status.success() {
                    return Err(ScanError::Parse(format!(
                        "{} exited with {}: {}",
                        program,
                        status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                return Ok(output.stdout);
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("{} timed out after {:?} on {:?}", program, TOOL_TIMEOUT, file);
                    return Err(ScanError::ToolMissing(format!(
                        "{} timed out after {} seconds",
                        program,
                        TOOL_TIMEOUT.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}
