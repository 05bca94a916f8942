//! Append-only record of every org operation a user requested.
//!
//! One entry per operation: a timestamped header carrying the username and
//! operation name, then the detail text indented underneath. The file lives
//! next to the session and store files in the app config dir and is only
//! ever appended to; `forcebridge log` prints it back.

use anyhow::Result;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "operation_log.txt";

fn default_path() -> PathBuf {
    match dirs::config_dir() {
        Some(config_dir) => {
            let app_dir = config_dir.join("forcebridge");
            let _ = fs::create_dir_all(&app_dir);
            app_dir.join(LOG_FILE)
        }
        None => PathBuf::from(LOG_FILE),
    }
}

/// Log file location as display text.
pub fn log_file_path() -> String {
    default_path().display().to_string()
}

/// Record one operation in the default log file.
pub fn append_log(operation: &str, username: &str, details: impl AsRef<str>) -> Result<()> {
    append_to(&default_path(), operation, username, details.as_ref())
}

/// Record one operation in the given log file, creating it and its parent
/// directory on first use. Detail lines are indented two spaces under the
/// header; an empty detail string gets a placeholder line so entries stay
/// visually uniform.
pub fn append_to(path: &Path, operation: &str, username: &str, details: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(
        file,
        "[{}] username={} operation={}",
        Utc::now().to_rfc3339(),
        username,
        operation
    )?;
    if details.trim().is_empty() {
        writeln!(file, "  (no additional details)")?;
    } else {
        for line in details.lines() {
            if line.trim().is_empty() {
                writeln!(file)?;
            } else {
                writeln!(file, "  {}", line)?;
            }
        }
    }
    writeln!(file)?;
    Ok(())
}

/// Full content of the default log file; empty if nothing was logged yet.
pub fn read_log() -> Result<String> {
    read_from(&default_path())
}

pub fn read_from(path: &Path) -> Result<String> {
    if path.exists() {
        Ok(fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_writes_header_and_indented_details() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.txt");

        append_to(&path, "execute query", "dev@example.com", "SELECT Id FROM Account").unwrap();

        let content = read_from(&path).unwrap();
        assert!(content.contains("username=dev@example.com operation=execute query"));
        assert!(content.contains("  SELECT Id FROM Account"));
    }

    #[test]
    fn test_append_accumulates_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.txt");

        append_to(&path, "describe global", "dev@example.com", "").unwrap();
        append_to(&path, "retrieve all", "dev@example.com", "").unwrap();

        let content = read_from(&path).unwrap();
        let first = content.find("operation=describe global").unwrap();
        let second = content.find("operation=retrieve all").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_details_get_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.txt");

        append_to(&path, "retrieve all", "dev@example.com", "  ").unwrap();

        assert!(read_from(&path).unwrap().contains("(no additional details)"));
    }

    #[test]
    fn test_multiline_details_each_indented() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.txt");

        append_to(
            &path,
            "execute anonymous",
            "dev@example.com",
            "Integer i = 0;\nSystem.debug(i);",
        )
        .unwrap();

        let content = read_from(&path).unwrap();
        assert!(content.contains("  Integer i = 0;"));
        assert!(content.contains("  System.debug(i);"));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_from(&dir.path().join("absent.txt")).unwrap(), "");
    }

    #[test]
    fn test_append_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/ops.txt");

        append_to(&path, "run test", "dev@example.com", "").unwrap();

        assert!(path.exists());
    }
}
