//! Configuration loading from snapsec.toml.

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// A security backend the CLI can compile for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Apparmor,
    Seccomp,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Apparmor => "apparmor",
            Backend::Seccomp => "seccomp",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compile: CompileConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Compile pass configuration.
#[derive(Debug, Deserialize)]
pub struct CompileConfig {
    /// Backends compiled when `--backend` is not given.
    #[serde(default = "default_backends")]
    pub backends: Vec<Backend>,

    /// Auto-connect every loaded snap before compiling.
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            auto_connect: default_auto_connect(),
        }
    }
}

/// Logging configuration. `RUST_LOG` takes precedence.
#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_backends() -> Vec<Backend> {
    vec![Backend::Apparmor, Backend::Seccomp]
}

fn default_auto_connect() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(
            config.compile.backends,
            vec![Backend::Apparmor, Backend::Seccomp]
        );
        assert!(config.compile.auto_connect);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let config = Config::parse(
            r#"
[compile]
backends = ["seccomp"]
auto_connect = false

[log]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.compile.backends, vec![Backend::Seccomp]);
        assert!(!config.compile.auto_connect);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Config::parse("[compile]\nbackends = [\"selinux\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/snapsec.toml").unwrap();
        assert!(config.compile.auto_connect);
    }
}
