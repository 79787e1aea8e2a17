use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::ConfigManager;

/// Rotate once the log file grows past 10MB
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Initialize the logging system
///
/// Console logging goes to stderr so `status --json` output stays clean, and
/// is controlled by `RUST_LOG` (`error`, `warn`, `info` (default), `debug`,
/// `trace`, `off`).
///
/// Every initialization is also recorded in `dotsync.log` inside the config
/// directory, which [`log_to_file`] appends to for operations worth keeping a
/// trail of (backups, restores, migrations, wipes).
///
/// ```bash
/// RUST_LOG=debug dotsync backup
/// ```
pub fn init_logger() -> Result<()> {
    ConfigManager::ensure_config_dir()?;

    let default_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(default_level)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok(); // Already initialized (tests, repeated calls)

    rotate_log_if_needed()?;
    log_to_file(&format!("Logger initialized with level: {default_level:?}"))?;

    Ok(())
}

/// Append a timestamped line to the log file only
pub fn log_to_file(message: &str) -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

/// Rotate the log file to `dotsync.log.old` if it exceeds the size limit
pub fn rotate_log_if_needed() -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    if log_path.exists() {
        let metadata = std::fs::metadata(&log_path)?;

        if metadata.len() > MAX_LOG_SIZE {
            let old_log_path = log_path.with_extension("log.old");
            if old_log_path.exists() {
                std::fs::remove_file(&old_log_path)?;
            }
            std::fs::rename(&log_path, &old_log_path)?;

            log::info!("Log file rotated to {}", old_log_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    /// Point the config directory at a scratch location for the duration of `f`
    fn with_temp_config<F: FnOnce()>(f: F) {
        let temp = TempDir::new().unwrap();
        let previous = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", temp.path());
        f();
        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_log_to_file() {
        with_temp_config(|| {
            ConfigManager::ensure_config_dir().unwrap();
            log_to_file("Test log message").unwrap();

            let log_path = ConfigManager::log_file_path().unwrap();
            let contents = std::fs::read_to_string(&log_path).unwrap();
            assert!(contents.contains("Test log message"));
        });
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_rotate_log_creates_backup() {
        with_temp_config(|| {
            ConfigManager::ensure_config_dir().unwrap();
            let log_path = ConfigManager::log_file_path().unwrap();
            let mut file = File::create(&log_path).unwrap();
            file.write_all(&vec![b'a'; 11 * 1024 * 1024]).unwrap();
            drop(file);

            rotate_log_if_needed().unwrap();

            assert!(log_path.with_extension("log.old").exists());
            assert!(!log_path.exists());
        });
    }
}
