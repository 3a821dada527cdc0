//! Install tasks

use std::path::{Path, PathBuf};

use apk_drop_core::{InstallError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single queued package install
#[derive(Debug, Clone)]
pub struct InstallTask {
    pub id: Uuid,
    pub path: PathBuf,
    pub enqueued_at: DateTime<Utc>,
}

impl InstallTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Check the package path right before it is installed
    pub fn validate(&self) -> Result<()> {
        validate_package(&self.path)
    }
}

/// A package must be an existing regular file with an `.apk` extension
pub fn validate_package(path: &Path) -> Result<()> {
    let is_apk = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("apk"))
        .unwrap_or(false);

    if !is_apk {
        return Err(InstallError::InvalidInput(format!(
            "{} does not have an .apk extension",
            path.display()
        )));
    }
    if !path.exists() {
        return Err(InstallError::InvalidInput(format!("{} does not exist", path.display())));
    }
    if !path.is_file() {
        return Err(InstallError::InvalidInput(format!("{} is not a file", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_package() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app-release.APK");
        let txt = dir.path().join("notes.txt");
        fs::write(&apk, b"PK").unwrap();
        fs::write(&txt, b"hello").unwrap();
        fs::create_dir(dir.path().join("folder.apk")).unwrap();

        assert!(validate_package(&apk).is_ok());
        assert!(matches!(validate_package(&txt), Err(InstallError::InvalidInput(_))));
        assert!(matches!(
            validate_package(&dir.path().join("missing.apk")),
            Err(InstallError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_package(&dir.path().join("folder.apk")),
            Err(InstallError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tasks_get_distinct_ids() {
        let a = InstallTask::new("/tmp/a.apk");
        let b = InstallTask::new("/tmp/a.apk");
        assert_ne!(a.id, b.id);
        assert!(a.enqueued_at <= b.enqueued_at);
    }
}
