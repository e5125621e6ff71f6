//! File logging for analysis runs, rotated daily in local time.

use anyhow::Result;
use logroller::{LogRollerBuilder, Rotation, RotationAge, TimeZone};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use time::macros::format_description;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;

use crate::config::Config;

/// Rolled files are named `coupling-lens.YYYY-MM-DD`.
const LOG_PREFIX: &str = "coupling-lens";
const KEEP_FILES: u64 = 3;
const MAX_AGE: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Install the file subscriber. Called once, only when debug logging is on.
pub fn init(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.log_path)?;
    cleanup_old_logs(&config.log_path)?;

    let filter = log_filter(config)?;

    let appender = LogRollerBuilder::new(config.log_path.as_path(), Path::new(LOG_PREFIX))
        .rotation(Rotation::AgeBased(RotationAge::Daily))
        .time_zone(TimeZone::Local)
        .max_keep_files(KEEP_FILES)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create log roller: {}", e))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let time_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(OffsetTime::new(local_offset, time_format)),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    // The writer flushes until the process exits.
    std::mem::forget(guard);
    Ok(())
}

/// `EnvFilter` built from the configured `log_level` directive.
pub fn log_filter(config: &Config) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| anyhow::anyhow!("Invalid log_level {:?}: {}", config.log_level, e))
}

/// Remove rolled log files older than three days. Other files are left alone.
pub fn cleanup_old_logs(log_path: &Path) -> Result<()> {
    if !log_path.is_dir() {
        return Ok(());
    }
    let cutoff = SystemTime::now() - MAX_AGE;

    for entry in fs::read_dir(log_path)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !path.file_name().and_then(|n| n.to_str()).is_some_and(is_log_file) {
            continue;
        }

        if let Ok(metadata) = entry.metadata()
            && let Ok(modified) = metadata.modified()
            && modified < cutoff
        {
            let _ = fs::remove_file(&path);
        }
    }

    Ok(())
}

fn is_log_file(file_name: &str) -> bool {
    file_name
        .strip_prefix(LOG_PREFIX)
        .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        let secs = when.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs();
        let stamp = libc::timespec {
            tv_sec: secs as libc::time_t,
            tv_nsec: 0,
        };
        let times = [stamp, stamp];
        let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();
        let ret = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) };
        assert_eq!(ret, 0, "{}", std::io::Error::last_os_error());
    }

    #[test]
    fn cleanup_removes_only_stale_rolled_logs() {
        let dir = tempfile::TempDir::new().unwrap();
        let stale = dir.path().join("coupling-lens.2026-10-01");
        let fresh = dir.path().join("coupling-lens.2026-10-15");
        let config = dir.path().join("coupling-lens-missing.toml");
        let foreign = dir.path().join("other-app.log");
        for path in [&stale, &fresh, &config, &foreign] {
            fs::write(path, "x").unwrap();
        }
        for path in [&stale, &config, &foreign] {
            age(path, 4);
        }
        fs::create_dir(dir.path().join("coupling-lens.archive")).unwrap();

        cleanup_old_logs(dir.path()).unwrap();

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(config.exists(), "Only rolled files share the dotted prefix");
        assert!(foreign.exists());
        assert!(dir.path().join("coupling-lens.archive").is_dir());
    }

    #[test]
    fn cleanup_tolerates_missing_dir() {
        assert!(cleanup_old_logs(Path::new("/tmp/nonexistent_coupling_lens_logs")).is_ok());
    }

    #[test]
    fn rolled_file_names() {
        assert!(is_log_file("coupling-lens.2026-10-16"));
        assert!(!is_log_file("coupling-lens"));
        assert!(!is_log_file("coupling-lens-missing.toml"));
        assert!(!is_log_file("astro.2026-10-16"));
    }

    #[test]
    fn filter_comes_from_log_level() {
        let config = Config {
            log_level: "coupling_lens::engine=trace,info".to_string(),
            ..Config::default()
        };
        let filter = log_filter(&config).unwrap();
        assert!(filter.to_string().contains("coupling_lens::engine=trace"));
    }

    #[test]
    fn init_rejects_invalid_log_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            log_path: dir.path().join("logs"),
            log_level: "coupling_lens=loudest".to_string(),
            ..Config::default()
        };

        assert!(init(&config).is_err());
        assert!(dir.path().join("logs").is_dir(), "Log directory is created first");
    }
}
