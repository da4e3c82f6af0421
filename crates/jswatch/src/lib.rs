use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

pub mod config;
pub mod telegram;

/// Log filter directive: explicit flag, then `RUST_LOG`, then the configured level.
pub fn log_filter(flag: Option<&str>, env: Option<&str>, configured: &str) -> String {
    flag.or(env)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(configured)
        .to_ascii_lowercase()
}

/// Append-mode log file for the file `fmt` layer, creating parent directories.
pub fn log_file_writer(path: &Path) -> Result<Mutex<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{log_file_writer, log_filter};

    #[test]
    fn flag_beats_env_beats_config() {
        assert_eq!(log_filter(Some("DEBUG"), Some("warn"), "info"), "debug");
        assert_eq!(log_filter(None, Some("warn"), "info"), "warn");
        assert_eq!(log_filter(None, Some("  "), "INFO"), "info");
        assert_eq!(log_filter(None, None, "error"), "error");
    }

    #[test]
    fn log_file_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("jswatch.log");
        writeln!(log_file_writer(&path).unwrap().lock().unwrap(), "first").unwrap();
        writeln!(log_file_writer(&path).unwrap().lock().unwrap(), "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
