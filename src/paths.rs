//! XDG-compliant path resolution for biblion.
//!
//! Provides `BiblionPaths` (config, data, and state directories) following
//! the XDG Base Directory Specification, with `BIBLION_CONFIG_DIR` and
//! `BIBLION_DATA_DIR` overrides for containerized deployments.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(biblion::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(biblion::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for biblion.
#[derive(Debug, Clone)]
pub struct BiblionPaths {
    /// `$XDG_CONFIG_HOME/biblion/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/biblion/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/biblion/`
    pub state_dir: PathBuf,
}

impl BiblionPaths {
    /// Resolve directories from environment variables with standard fallbacks.
    ///
    /// `BIBLION_CONFIG_DIR` / `BIBLION_DATA_DIR` take precedence over the
    /// XDG variables when set.
    pub fn resolve() -> PathResult<Self> {
        if let (Ok(config), Ok(data)) = (
            std::env::var("BIBLION_CONFIG_DIR"),
            std::env::var("BIBLION_DATA_DIR"),
        ) {
            let data_dir = PathBuf::from(data);
            return Ok(Self {
                config_dir: PathBuf::from(config),
                state_dir: data_dir.join("state"),
                data_dir,
            });
        }

        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("BIBLION_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| home.join(".config"))
                    .join("biblion")
            });

        let data_dir = std::env::var("BIBLION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| home.join(".local/share"))
                    .join("biblion")
            });

        let state_dir = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/state"))
            .join("biblion");

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
        })
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the service config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory holding the catalog database.
    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_end_in_biblion() {
        // Avoids mutating env vars (unsafe in edition 2024): whatever the
        // environment provides, the leaf component must be ours.
        let paths = BiblionPaths::resolve().unwrap();
        assert!(
            paths.config_dir.to_string_lossy().contains("biblion"),
            "config_dir should contain 'biblion': {}",
            paths.config_dir.display()
        );
        assert!(
            paths.data_dir.to_string_lossy().contains("biblion"),
            "data_dir should contain 'biblion': {}",
            paths.data_dir.display()
        );
    }

    #[test]
    fn derived_files_live_under_their_dirs() {
        let paths = BiblionPaths {
            config_dir: PathBuf::from("/cfg/biblion"),
            data_dir: PathBuf::from("/data/biblion"),
            state_dir: PathBuf::from("/state/biblion"),
        };
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/biblion/config.toml"));
        assert_eq!(paths.catalog_dir(), PathBuf::from("/data/biblion/catalog"));
    }
}
