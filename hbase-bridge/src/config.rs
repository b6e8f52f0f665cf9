//! Bridge configuration: JVM options and where to find `java-bridge.jar`.
//!
//! Resolution order is defaults, then the TOML file (`$HBASE_BRIDGE_CONFIG`
//! or `<config dir>/hbase-bridge/bridge.toml`), then environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::managed::LaunchOptions;

/// File name of the Java side of the bridge.
pub const ARCHIVE_NAME: &str = "java-bridge.jar";
/// Identity variable read by the Hadoop client for authorization.
pub const IDENTITY_VAR: &str = "HADOOP_USER_NAME";

pub const ENV_CONFIG: &str = "HBASE_BRIDGE_CONFIG";
pub const ENV_JAR: &str = "HBASE_BRIDGE_JAR";
pub const ENV_USER: &str = "HBASE_BRIDGE_USER";
pub const ENV_MAX_HEAP: &str = "HBASE_BRIDGE_MAX_HEAP";
pub const ENV_LIBJVM: &str = "HBASE_BRIDGE_LIBJVM";
pub const ENV_JVM_OPTS: &str = "HBASE_BRIDGE_JVM_OPTS";

const DEFAULT_MAX_HEAP: &str = "512m";
const FALLBACK_IDENTITY: &str = "hbase";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Candidate locations of `java-bridge.jar`, probed in order.
    pub archive_candidates: Vec<PathBuf>,
    /// Value of `HADOOP_USER_NAME` for the process and the JVM.
    pub identity: String,
    /// `-Xmx` value, e.g. `512m`.
    pub max_heap: String,
    /// Explicit libjvm path; located through `JAVA_HOME` when unset.
    pub libjvm: Option<PathBuf>,
    /// Add `-Xcheck:jni`.
    pub check_jni: bool,
    /// Add `-verbose:jni` and `-verbose:class`.
    pub verbose: bool,
    pub extra_options: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            archive_candidates: default_candidates(),
            identity: default_identity(),
            max_heap: DEFAULT_MAX_HEAP.to_string(),
            libjvm: None,
            check_jni: false,
            verbose: false,
            extra_options: Vec::new(),
        }
    }
}

/// The jar inside the app bundle first, then paths relative to the working
/// directory.
fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join("..").join("Resources").join(ARCHIVE_NAME));
    }
    candidates.extend(
        [
            "../Resources/java-bridge.jar",
            "../../Resources/java-bridge.jar",
            "./Resources/java-bridge.jar",
            "./java-bridge.jar",
        ]
        .into_iter()
        .map(PathBuf::from),
    );
    candidates
}

fn default_identity() -> String {
    std::env::var(IDENTITY_VAR)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| whoami::fallible::username().ok())
        .unwrap_or_else(|| FALLBACK_IDENTITY.to_string())
}

fn config_path() -> PathBuf {
    match std::env::var_os(ENV_CONFIG) {
        Some(path) => PathBuf::from(path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hbase-bridge")
            .join("bridge.toml"),
    }
}

impl BridgeConfig {
    /// Defaults, overlaid by the config file and then the environment.
    pub fn load() -> Self {
        let mut config = Self::from_file(&config_path()).unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Read a TOML config file. Missing, unreadable, or malformed files yield
    /// `None` (the latter two with a warning).
    pub fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(config) => {
                    tracing::debug!("loaded bridge config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!("bad bridge config {}: {e}", path.display());
                    None
                }
            },
            Err(e) => {
                tracing::warn!("can't read bridge config {}: {e}", path.display());
                None
            }
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(jar) = lookup(ENV_JAR) {
            self.archive_candidates.insert(0, PathBuf::from(jar));
        }
        if let Some(user) = lookup(ENV_USER) {
            self.identity = user;
        }
        if let Some(heap) = lookup(ENV_MAX_HEAP) {
            self.max_heap = heap;
        }
        if let Some(libjvm) = lookup(ENV_LIBJVM) {
            self.libjvm = Some(PathBuf::from(libjvm));
        }
        if let Some(opts) = lookup(ENV_JVM_OPTS) {
            self.extra_options
                .extend(opts.split_whitespace().map(String::from));
        }
    }

    /// First candidate that is an existing regular file.
    pub fn locate_archive(&self) -> Result<PathBuf> {
        for path in &self.archive_candidates {
            if path.is_file() {
                tracing::debug!("found {ARCHIVE_NAME} at {}", path.display());
                return Ok(path.clone());
            }
            tracing::debug!("no {ARCHIVE_NAME} at {}", path.display());
        }
        Err(BridgeError::ArchiveNotFound {
            searched: self.archive_candidates.clone(),
        })
    }

    /// JVM construction options with `archive` on the class path.
    pub fn launch_options(&self, archive: &Path) -> LaunchOptions {
        let mut options = vec![
            format!("-Djava.class.path={}", archive.display()),
            "-Djava.library.path=.".to_string(),
            "-Dfile.encoding=UTF-8".to_string(),
            format!("-Xmx{}", self.max_heap),
            format!("-D{IDENTITY_VAR}={}", self.identity),
            "-Dhadoop.home.dir=/tmp".to_string(),
            "-Djava.security.krb5.realm=".to_string(),
            "-Djava.security.krb5.kdc=".to_string(),
            "-Djava.awt.headless=true".to_string(),
        ];
        if self.check_jni {
            options.push("-Xcheck:jni".to_string());
        }
        if self.verbose {
            options.push("-verbose:jni".to_string());
            options.push("-verbose:class".to_string());
        }
        options.extend(self.extra_options.iter().cloned());
        LaunchOptions {
            options,
            libjvm: self.libjvm.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_heap, "512m");
        assert!(!config.identity.is_empty());
        assert_eq!(
            config.archive_candidates.last(),
            Some(&PathBuf::from("./java-bridge.jar"))
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config.apply_env(env(&[
            (ENV_JAR, "/opt/bridge/java-bridge.jar"),
            (ENV_USER, "analyst"),
            (ENV_MAX_HEAP, "1g"),
            (ENV_JVM_OPTS, "-Xss2m  -Dfoo=bar"),
            (ENV_LIBJVM, "  "),
        ]));
        assert_eq!(
            config.archive_candidates[0],
            PathBuf::from("/opt/bridge/java-bridge.jar")
        );
        assert_eq!(config.identity, "analyst");
        assert_eq!(config.max_heap, "1g");
        assert_eq!(config.extra_options, vec!["-Xss2m", "-Dfoo=bar"]);
        assert_eq!(config.libjvm, None);
    }

    #[test]
    fn test_launch_options() {
        let config = BridgeConfig {
            identity: "da_music".into(),
            check_jni: true,
            extra_options: vec!["-Xss2m".into()],
            ..BridgeConfig::default()
        };
        let launch = config.launch_options(Path::new("/app/java-bridge.jar"));
        let opts = &launch.options;
        assert_eq!(opts[0], "-Djava.class.path=/app/java-bridge.jar");
        assert!(opts.contains(&"-Dfile.encoding=UTF-8".to_string()));
        assert!(opts.contains(&"-Xmx512m".to_string()));
        assert!(opts.contains(&"-DHADOOP_USER_NAME=da_music".to_string()));
        assert!(opts.contains(&"-Djava.awt.headless=true".to_string()));
        assert!(opts.contains(&"-Xcheck:jni".to_string()));
        assert!(!opts.contains(&"-verbose:jni".to_string()));
        assert_eq!(opts.last().map(String::as_str), Some("-Xss2m"));
    }

    #[test]
    fn test_locate_archive_missing() {
        let config = BridgeConfig {
            archive_candidates: vec![PathBuf::from("/nonexistent/java-bridge.jar")],
            ..BridgeConfig::default()
        };
        match config.locate_archive() {
            Err(BridgeError::ArchiveNotFound { searched }) => assert_eq!(searched.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
