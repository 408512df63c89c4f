//! Configuration discovery and merging.
//!
//! Sources merge lowest-priority first: built-in defaults, then the XDG
//! global file, then a project-level `council.toml` / `.council.toml`,
//! then an explicitly passed path. [`LoadedConfig`] keeps the list of
//! files that actually contributed, plus the validation issues of the
//! merged result, so the shell can report both without re-deriving them.

use super::file_config::{ConfigIssue, FileConfig};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// A merged configuration with its provenance and validation findings.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: FileConfig,
    /// Files merged into the result, lowest priority first. Empty means
    /// built-in defaults only.
    pub sources: Vec<PathBuf>,
    /// Issues found by validating the merged configuration.
    pub issues: Vec<ConfigIssue>,
}

impl LoadedConfig {
    /// One-line provenance summary, for logs and diagnostics.
    pub fn describe_sources(&self) -> String {
        if self.sources.is_empty() {
            return "built-in defaults".to_string();
        }
        let files: Vec<String> = self
            .sources
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        format!("built-in defaults, then {}", files.join(", then "))
    }
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Discover, merge, and validate configuration.
    ///
    /// Returns `Err` only when a discovered file cannot be parsed; a
    /// config that parses but fails validation comes back as
    /// `LoadedConfig::issues` so the caller decides how hard to fail.
    pub fn load(explicit_path: Option<&PathBuf>) -> Result<LoadedConfig, Box<figment::Error>> {
        let sources = Self::discover(explicit_path.map(PathBuf::as_path));

        let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
        for path in &sources {
            figment = figment.merge(Toml::file(path));
        }

        let config: FileConfig = figment.extract().map_err(Box::new)?;
        let issues = config.validate();
        Ok(LoadedConfig {
            config,
            sources,
            issues,
        })
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// The existing config files, in merge order (lowest priority first).
    fn discover(explicit_path: Option<&Path>) -> Vec<PathBuf> {
        let mut sources = Vec::new();
        if let Some(global) = Self::global_config_path()
            && global.exists()
        {
            sources.push(global);
        }
        if let Some(project) = Self::project_config_path() {
            sources.push(project);
        }
        if let Some(path) = explicit_path {
            sources.push(path.to_path_buf());
        }
        sources
    }

    /// The global config file location: `XDG_CONFIG_HOME/llm-council/config.toml`,
    /// falling back to `~/.config/llm-council/config.toml`. The file may
    /// not exist.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("llm-council").join("config.toml"))
    }

    /// The project-level config file, if one exists in the working
    /// directory (`council.toml` preferred over `.council.toml`).
    pub fn project_config_path() -> Option<PathBuf> {
        ["council.toml", ".council.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file_config::Severity;

    #[test]
    fn defaults_only_when_no_files() {
        let loaded = ConfigLoader::load(None).unwrap();
        assert!(loaded.sources.is_empty());
        assert_eq!(loaded.describe_sources(), "built-in defaults");
        assert_eq!(loaded.config.council.chairman, "gpt-4o");
        assert!(!FileConfig::has_errors(&loaded.issues));
    }

    #[test]
    fn explicit_file_overrides_and_is_reported_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[council]
chairman = "z-ai/glm-4.5-air:free"
"#,
        )
        .unwrap();

        let loaded = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(loaded.config.council.chairman, "z-ai/glm-4.5-air:free");
        // Unspecified sections keep their defaults
        assert_eq!(loaded.config.limits.turn_deadline_ms, 600_000);
        assert_eq!(loaded.sources, vec![path.clone()]);
        assert!(loaded.describe_sources().contains("custom.toml"));
    }

    #[test]
    fn validation_issues_surface_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
[council]
chairman = "ghost"
"#,
        )
        .unwrap();

        let loaded = ConfigLoader::load(Some(&path)).unwrap();
        assert!(FileConfig::has_errors(&loaded.issues));
        assert!(loaded
            .issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("ghost")));
    }

    #[test]
    fn global_path_points_into_app_config_dir() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("llm-council"));
    }
}
