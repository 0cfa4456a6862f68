//! Builder configuration.
//!
//! One [`BuilderConfig`] is assembled at startup (defaults, optional TOML file,
//! environment overrides, CLI flags) and passed to the release builder.

use crate::error::{ConfigError, Result};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the repository identifier in `source_url`.
pub const REPOSITORY_PLACEHOLDER: &str = "{repository}";

/// Timeouts applied to each kind of release step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// git clone / fetch / archive / tag
    pub git: Duration,
    /// Installer download and execution
    pub installer: Duration,
    /// Dependency install
    pub install: Duration,
    /// Archive packaging
    pub package: Duration,
    /// Waiting for the per-repository build lock
    pub lock: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            git: Duration::from_secs(900),
            installer: Duration::from_secs(120),
            install: Duration::from_secs(900),
            package: Duration::from_secs(900),
            lock: Duration::from_secs(5),
        }
    }
}

/// Package manager invocation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManagerConfig {
    /// URL of the self-installing bootstrap script
    pub installer_url: String,
    /// File name the installer script is downloaded to
    pub installer_script: String,
    /// Installer binary produced by running the script
    pub binary: String,
    /// Interpreter used to run the script and the binary
    pub interpreter: String,
    /// Arguments passed to the binary to install dependencies
    pub install_args: Vec<String>,
    /// Lock file whose hash keys the vendor cache
    pub lock_file: String,
    /// Directory the dependencies are installed into
    pub vendor_dir: String,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            installer_url: "https://getcomposer.org/installer".to_string(),
            installer_script: "composer-setup.php".to_string(),
            binary: "composer.phar".to_string(),
            interpreter: "php".to_string(),
            install_args: vec![
                "install".to_string(),
                "--prefer-dist".to_string(),
                "--optimize-autoloader".to_string(),
                "--no-interaction".to_string(),
            ],
            lock_file: "composer.lock".to_string(),
            vendor_dir: "vendor".to_string(),
        }
    }
}

/// Configuration for release builds
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Root under which mirrors, releases and the vendor cache live
    pub data_root: PathBuf,
    /// Clone URL template; `{repository}` is replaced by the identifier
    pub source_url: String,
    /// Repository names offered in interactive selection
    pub known_repositories: Vec<String>,
    /// Whether `--create-tag` is honoured
    pub allow_tags: bool,
    /// Push created tags to the mirror's origin
    pub push_tags: bool,
    /// Where the optional parameters overlay is copied inside a release
    pub overlay_target: PathBuf,
    /// Runtime directories emptied before packaging
    pub runtime_dirs: Vec<PathBuf>,
    /// Per-step timeouts
    pub timeouts: Timeouts,
    /// Package manager settings
    pub package_manager: PackageManagerConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            source_url: format!("git@github.com:hacfi/{}.git", REPOSITORY_PLACEHOLDER),
            known_repositories: vec!["kis".to_string(), "gr".to_string()],
            allow_tags: true,
            push_tags: false,
            overlay_target: PathBuf::from("app/config/parameters.yml"),
            runtime_dirs: vec![PathBuf::from("app/cache"), PathBuf::from("app/logs")],
            timeouts: Timeouts::default(),
            package_manager: PackageManagerConfig::default(),
        }
    }
}

/// On-disk representation; every field optional so files can stay sparse.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_root: Option<PathBuf>,
    source_url: Option<String>,
    known_repositories: Option<Vec<String>>,
    allow_tags: Option<bool>,
    push_tags: Option<bool>,
    overlay_target: Option<PathBuf>,
    runtime_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    timeouts: FileTimeouts,
    #[serde(default)]
    package_manager: FilePackageManager,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTimeouts {
    git: Option<u64>,
    installer: Option<u64>,
    install: Option<u64>,
    package: Option<u64>,
    lock: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilePackageManager {
    installer_url: Option<String>,
    installer_script: Option<String>,
    binary: Option<String>,
    interpreter: Option<String>,
    install_args: Option<Vec<String>>,
    lock_file: Option<String>,
    vendor_dir: Option<String>,
}

/// Upper bound for any step timeout, in seconds (one day)
const MAX_TIMEOUT_SECS: u64 = 86_400;

impl BuilderConfig {
    /// Load configuration: defaults, then `config_path` if given, then environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            config.merge_file(path)?;
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge settings from a TOML file
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Loaded config file {}", path.display());
        self.apply_file(file);
        Ok(())
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.data_root {
            self.data_root = v;
        }
        if let Some(v) = file.source_url {
            self.source_url = v;
        }
        if let Some(v) = file.known_repositories {
            self.known_repositories = v;
        }
        if let Some(v) = file.allow_tags {
            self.allow_tags = v;
        }
        if let Some(v) = file.push_tags {
            self.push_tags = v;
        }
        if let Some(v) = file.overlay_target {
            self.overlay_target = v;
        }
        if let Some(v) = file.runtime_dirs {
            self.runtime_dirs = v;
        }

        let t = file.timeouts;
        let secs = |v: Option<u64>, current: Duration| {
            v.map(|s| Duration::from_secs(s.min(MAX_TIMEOUT_SECS)))
                .unwrap_or(current)
        };
        self.timeouts.git = secs(t.git, self.timeouts.git);
        self.timeouts.installer = secs(t.installer, self.timeouts.installer);
        self.timeouts.install = secs(t.install, self.timeouts.install);
        self.timeouts.package = secs(t.package, self.timeouts.package);
        self.timeouts.lock = secs(t.lock, self.timeouts.lock);

        let pm = file.package_manager;
        let target = &mut self.package_manager;
        if let Some(v) = pm.installer_url {
            target.installer_url = v;
        }
        if let Some(v) = pm.installer_script {
            target.installer_script = v;
        }
        if let Some(v) = pm.binary {
            target.binary = v;
        }
        if let Some(v) = pm.interpreter {
            target.interpreter = v;
        }
        if let Some(v) = pm.install_args {
            target.install_args = v;
        }
        if let Some(v) = pm.lock_file {
            target.lock_file = v;
        }
        if let Some(v) = pm.vendor_dir {
            target.vendor_dir = v;
        }
    }

    /// Parse a timeout in seconds from an environment variable, clamped to `max`
    fn parse_timeout_env(var_name: &str, default: Duration, max: u64) -> Duration {
        std::env::var(var_name)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|v| Duration::from_secs(v.min(max)))
            .unwrap_or(default)
    }

    /// Apply `DEPLOY_RELEASE_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DEPLOY_RELEASE_SOURCE_URL") {
            self.source_url = url;
        }
        if let Ok(root) = std::env::var("DEPLOY_RELEASE_DATA_DIR") {
            self.data_root = PathBuf::from(root);
        }

        self.timeouts.git = Self::parse_timeout_env(
            "DEPLOY_RELEASE_GIT_TIMEOUT",
            self.timeouts.git,
            MAX_TIMEOUT_SECS,
        );
        self.timeouts.installer = Self::parse_timeout_env(
            "DEPLOY_RELEASE_INSTALLER_TIMEOUT",
            self.timeouts.installer,
            MAX_TIMEOUT_SECS,
        );
        self.timeouts.install = Self::parse_timeout_env(
            "DEPLOY_RELEASE_INSTALL_TIMEOUT",
            self.timeouts.install,
            MAX_TIMEOUT_SECS,
        );
        self.timeouts.package = Self::parse_timeout_env(
            "DEPLOY_RELEASE_PACKAGE_TIMEOUT",
            self.timeouts.package,
            MAX_TIMEOUT_SECS,
        );
    }

    /// Override the data root (CLI flag takes precedence over everything else)
    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }

    /// Data root as an absolute path
    pub fn absolute_data_root(&self) -> Result<PathBuf> {
        Ok(self.data_root.absolutize()?.into_owned())
    }

    /// Clone URL for a repository identifier
    pub fn source_url_for(&self, repository: &str) -> String {
        self.source_url.replace(REPOSITORY_PLACEHOLDER, repository)
    }

    /// Validate values that would otherwise fail deep inside a build
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("timeouts.git", self.timeouts.git),
            ("timeouts.installer", self.timeouts.installer),
            ("timeouts.install", self.timeouts.install),
            ("timeouts.package", self.timeouts.package),
        ];
        for (key, value) in zero {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "timeout must be greater than zero".to_string(),
                }
                .into());
            }
        }

        if self.source_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source_url".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let pm = &self.package_manager;
        for (key, value) in [
            ("package_manager.lock_file", &pm.lock_file),
            ("package_manager.vendor_dir", &pm.vendor_dir),
            ("package_manager.binary", &pm.binary),
            ("package_manager.installer_script", &pm.installer_script),
        ] {
            if !is_plain_file_name(value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("'{}' must be a plain file name", value),
                }
                .into());
            }
        }

        for path in self.runtime_dirs.iter().chain(std::iter::once(&self.overlay_target)) {
            if path.is_absolute() || path.components().any(|c| c.as_os_str() == "..") {
                return Err(ConfigError::InvalidValue {
                    key: "runtime_dirs/overlay_target".to_string(),
                    reason: format!("'{}' must be relative to the release", path.display()),
                }
                .into());
            }
        }

        Ok(())
    }
}

fn is_plain_file_name(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_release_step_timeouts() {
        let config = BuilderConfig::default();
        assert_eq!(config.timeouts.git, Duration::from_secs(900));
        assert_eq!(config.timeouts.installer, Duration::from_secs(120));
        assert_eq!(config.timeouts.install, Duration::from_secs(900));
        assert_eq!(config.timeouts.package, Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn source_url_substitutes_repository() {
        let mut config = BuilderConfig::default();
        config.source_url = "https://git.example.com/{repository}.git".to_string();
        assert_eq!(
            config.source_url_for("kis"),
            "https://git.example.com/kis.git"
        );
    }

    #[test]
    fn file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        std::fs::write(
            &path,
            r#"
source_url = "file:///srv/git/{repository}"
push_tags = true

[timeouts]
git = 60

[package_manager]
lock_file = "package-lock.json"
"#,
        )
        .unwrap();

        let mut config = BuilderConfig::default();
        config.merge_file(&path).unwrap();

        assert_eq!(config.source_url, "file:///srv/git/{repository}");
        assert!(config.push_tags);
        assert_eq!(config.timeouts.git, Duration::from_secs(60));
        assert_eq!(config.timeouts.install, Duration::from_secs(900));
        assert_eq!(config.package_manager.lock_file, "package-lock.json");
        assert_eq!(config.package_manager.vendor_dir, "vendor");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        std::fs::write(&path, "sourceurl = \"x\"\n").unwrap();

        let mut config = BuilderConfig::default();
        assert!(config.merge_file(&path).is_err());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut config = BuilderConfig::default();
        config.timeouts.install = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nested_vendor_dir_is_invalid() {
        let mut config = BuilderConfig::default();
        config.package_manager.vendor_dir = "../vendor".to_string();
        assert!(config.validate().is_err());
    }
}
