//! ADB Locator
//!
//! Finds the ADB executable and remembers it for the life of the process.
//!
//! Strategies, first hit wins:
//! 1. an explicitly configured path
//! 2. `adb` on the `PATH`
//! 3. conventional SDK install locations (environment variables and `~` expanded)
//! 4. a portable `platform-tools` copy next to the running executable

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use apk_drop_core::config::BridgeConfig;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, info, warn};

/// ADB executable file name for this platform
pub const ADB_BINARY: &str = if cfg!(windows) { "adb.exe" } else { "adb" };

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid env var pattern")
});

/// Expand `~`, `%VAR%`, `${VAR}` and `$VAR`. Unknown variables are left untouched.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = ENV_VAR.replace_all(raw, |caps: &regex::Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });

    if let Some(rest) = expanded.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest.trim_start_matches(|c| c == '/' || c == '\\'));
            }
        }
    }
    PathBuf::from(expanded.into_owned())
}

/// Conventional SDK locations, relative paths to the `adb` binary
fn conventional_candidates() -> Vec<String> {
    let mut candidates = Vec::new();

    for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        candidates.push(format!("${{{}}}/platform-tools/{}", var, ADB_BINARY));
    }

    if cfg!(windows) {
        candidates.extend(
            [
                "%LOCALAPPDATA%/Android/Sdk/platform-tools/adb.exe",
                "~/AppData/Local/Android/Sdk/platform-tools/adb.exe",
                "C:/Android/Sdk/platform-tools/adb.exe",
                "C:/Program Files/Android/Sdk/platform-tools/adb.exe",
                "C:/Program Files (x86)/Android/android-sdk/platform-tools/adb.exe",
                "C:/Users/%USERNAME%/AppData/Local/Android/Sdk/platform-tools/adb.exe",
            ]
            .map(String::from),
        );
    } else {
        candidates.extend(
            [
                "~/Android/Sdk/platform-tools/adb",
                "~/Library/Android/sdk/platform-tools/adb",
                "~/android-sdk/platform-tools/adb",
                "/opt/android-sdk/platform-tools/adb",
                "/usr/local/android-sdk/platform-tools/adb",
                "/usr/lib/android-sdk/platform-tools/adb",
            ]
            .map(String::from),
        );
    }

    candidates
}

/// Locates and memoizes the ADB executable
pub struct BridgeLocator {
    explicit: Option<PathBuf>,
    search_path: Option<OsString>,
    use_path: bool,
    candidates: Vec<String>,
    portable_dir: Option<PathBuf>,
    cached: RwLock<Option<PathBuf>>,
}

impl BridgeLocator {
    /// Create a locator using the configured overrides plus the platform defaults
    pub fn new(config: &BridgeConfig) -> Self {
        let mut candidates = config.extra_candidates.clone();
        candidates.extend(conventional_candidates());

        let portable_dir = config.portable_dir.clone().or_else(|| {
            env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        });

        Self {
            explicit: config.adb_path.clone(),
            search_path: None,
            use_path: config.search_path,
            candidates,
            portable_dir,
            cached: RwLock::new(None),
        }
    }

    /// Create a locator with exactly the given strategies and no platform defaults
    pub fn with_strategies(
        explicit: Option<PathBuf>,
        search_path: Option<OsString>,
        candidates: Vec<String>,
        portable_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            explicit,
            use_path: search_path.is_some(),
            search_path,
            candidates,
            portable_dir,
            cached: RwLock::new(None),
        }
    }

    /// Create a locator already resolved to `path`, without probing
    pub fn fixed(path: PathBuf) -> Self {
        let locator = Self::with_strategies(None, None, Vec::new(), None);
        *locator.cached.write() = Some(path);
        locator
    }

    /// Resolve the ADB path. Successful lookups are memoized.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = self.cached.read().clone() {
            return Some(path);
        }

        let found = self
            .from_explicit()
            .or_else(|| self.from_search_path())
            .or_else(|| self.from_candidates())
            .or_else(|| self.from_portable());

        match found {
            Some(path) => {
                info!("Found ADB at {:?}", path);
                let mut cached = self.cached.write();
                // A concurrent resolve may have won; either result is valid
                Some(cached.get_or_insert(path).clone())
            }
            None => {
                warn!("ADB not found in PATH, SDK locations or portable directory");
                None
            }
        }
    }

    /// Currently memoized path, without probing
    pub fn cached(&self) -> Option<PathBuf> {
        self.cached.read().clone()
    }

    /// Forget the memoized path so the next `resolve` probes again
    pub fn invalidate(&self) {
        debug!("Invalidating cached ADB path");
        self.cached.write().take();
    }

    fn from_explicit(&self) -> Option<PathBuf> {
        let path = self.explicit.as_ref()?;
        if path.is_file() {
            Some(path.clone())
        } else {
            warn!("Configured ADB path {:?} does not exist", path);
            None
        }
    }

    fn from_search_path(&self) -> Option<PathBuf> {
        if !self.use_path {
            return None;
        }
        let paths = self.search_path.clone().or_else(|| env::var_os("PATH"))?;
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match which::which_in("adb", Some(paths), cwd) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("adb not on PATH: {}", e);
                None
            }
        }
    }

    fn from_candidates(&self) -> Option<PathBuf> {
        self.candidates
            .iter()
            .map(|raw| expand_path(raw))
            .find(|path| path.is_file())
    }

    fn from_portable(&self) -> Option<PathBuf> {
        let path = self
            .portable_dir
            .as_ref()?
            .join("platform-tools")
            .join(ADB_BINARY);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let locator = BridgeLocator::with_strategies(
            None,
            Some(dir.path().as_os_str().to_owned()),
            vec![dir.path().join("missing/adb").to_string_lossy().into_owned()],
            Some(dir.path().to_path_buf()),
        );
        assert_eq!(locator.resolve(), None);
        assert_eq!(locator.cached(), None);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom").join(ADB_BINARY);
        let portable = dir.path().join("platform-tools").join(ADB_BINARY);
        touch(&explicit);
        touch(&portable);

        let locator = BridgeLocator::with_strategies(
            Some(explicit.clone()),
            None,
            Vec::new(),
            Some(dir.path().to_path_buf()),
        );
        assert_eq!(locator.resolve(), Some(explicit));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_before_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let on_path = dir.path().join("bin").join("adb");
        let candidate = dir.path().join("sdk").join("adb");
        touch(&on_path);
        touch(&candidate);

        let locator = BridgeLocator::with_strategies(
            None,
            Some(dir.path().join("bin").into_os_string()),
            vec![candidate.to_string_lossy().into_owned()],
            None,
        );
        assert_eq!(locator.resolve(), Some(on_path));
    }

    #[test]
    fn test_candidate_with_env_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let adb = dir.path().join("platform-tools").join(ADB_BINARY);
        touch(&adb);
        env::set_var("APK_DROP_TEST_SDK_ROOT", dir.path());

        let locator = BridgeLocator::with_strategies(
            None,
            None,
            vec![format!("${{APK_DROP_TEST_SDK_ROOT}}/platform-tools/{}", ADB_BINARY)],
            None,
        );
        assert_eq!(locator.resolve(), Some(adb));
    }

    #[test]
    fn test_portable_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let portable = dir.path().join("platform-tools").join(ADB_BINARY);
        touch(&portable);

        let locator = BridgeLocator::with_strategies(
            None,
            None,
            vec!["/nonexistent/platform-tools/adb".into()],
            Some(dir.path().to_path_buf()),
        );
        assert_eq!(locator.resolve(), Some(portable));
    }

    #[test]
    fn test_resolved_path_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let portable = dir.path().join("platform-tools").join(ADB_BINARY);
        touch(&portable);

        let locator = BridgeLocator::with_strategies(
            None,
            None,
            Vec::new(),
            Some(dir.path().to_path_buf()),
        );
        let first = locator.resolve();
        fs::remove_file(&portable).unwrap();
        let second = locator.resolve();

        assert_eq!(first, Some(portable));
        assert_eq!(first, second);

        locator.invalidate();
        assert_eq!(locator.resolve(), None);
    }

    #[test]
    fn test_expand_path() {
        env::set_var("APK_DROP_TEST_USER", "alice");
        assert_eq!(
            expand_path("C:/Users/%APK_DROP_TEST_USER%/sdk"),
            PathBuf::from("C:/Users/alice/sdk")
        );
        assert_eq!(
            expand_path("/home/$APK_DROP_TEST_USER/sdk"),
            PathBuf::from("/home/alice/sdk")
        );
        assert_eq!(
            expand_path("/x/%APK_DROP_UNSET_VARIABLE%/adb"),
            PathBuf::from("/x/%APK_DROP_UNSET_VARIABLE%/adb")
        );
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/Android/Sdk"), home.join("Android/Sdk"));
        }
    }
}
