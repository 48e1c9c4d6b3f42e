//! Compile configuration.
//!
//! Settings come from three layers, later ones winning: a JSON file, the
//! environment, then whatever the caller (usually the CLI) sets explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    builder::BuildOptions,
    error::{JxError, JxResult},
    es::Dialect,
};

/// Environment variable enabling the `script` operator.
pub const ALLOW_SCRIPTS_ENV: &str = "JX_ALLOW_SCRIPTS";

/// What to compile to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Search-engine filter JSON
    #[default]
    Es,
    /// Painless script source
    Painless,
    /// Typed SQL fragments
    Sql,
    /// Simplified expression JSON
    Simplify,
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "es" => Ok(Target::Es),
            "painless" => Ok(Target::Painless),
            "sql" => Ok(Target::Sql),
            "simplify" => Ok(Target::Simplify),
            other => Err(format!(
                "unknown target `{}` (expected es, painless, sql or simplify)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub allow_scripts: bool,
    pub target: Target,
    pub dialect: Dialect,
    pub pretty: bool,
}

impl Config {
    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> JxResult<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| JxError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Config::from_json_str(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> JxResult<Config> {
        serde_json::from_str(text).map_err(|e| JxError::Config(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Config {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Config {
        if let Some(value) = lookup(ALLOW_SCRIPTS_ENV) {
            self.allow_scripts = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            allow_scripts: self.allow_scripts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.allow_scripts);
        assert_eq!(config.target, Target::Es);
        assert_eq!(config.dialect, Dialect::Bool);
    }

    #[test]
    fn test_from_json_str() {
        let config =
            Config::from_json_str(r#"{"target": "sql", "dialect": "legacy", "pretty": true}"#)
                .unwrap();
        assert_eq!(config.target, Target::Sql);
        assert_eq!(config.dialect, Dialect::Legacy);
        assert!(config.pretty);

        let err = Config::from_json_str(r#"{"colour": "blue"}"#).unwrap_err();
        assert!(matches!(err, JxError::Config(_)));
    }

    #[test]
    fn test_env_override() {
        let config = Config::default().with_env_from(|k| {
            (k == ALLOW_SCRIPTS_ENV).then(|| "1".to_string())
        });
        assert!(config.allow_scripts);

        let config = Config {
            allow_scripts: true,
            ..Default::default()
        }
        .with_env_from(|_| Some("0".to_string()));
        assert!(!config.allow_scripts);
    }
}
