//! Testbed startup options, loadable from JSON or YAML.

use imgcheck::Release;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbedOptions {
    pub release: Release,
    pub auth_name: String,
    pub auth_secret: String,
    pub account: String,
}

impl Default for TestbedOptions {
    fn default() -> Self {
        Self {
            release: Release::FocalUssuri,
            auth_name: "imgcheck".to_string(),
            auth_secret: "imgcheck-secret".to_string(),
            account: "AUTH_imgcheck".to_string(),
        }
    }
}

impl TestbedOptions {
    /// Load options from a file path. Supports JSON (.json) and YAML
    /// (.yaml/.yml) based on file extension; anything else tries both.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| OptionsError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let parsed = match extension.to_lowercase().as_str() {
            "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
            _ => serde_json::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| OptionsError::Parse {
            path: path.display().to_string(),
            message,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    Io { path: String, message: String },
    Parse { path: String, message: String },
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::Io { path, message } => {
                write!(f, "Failed to read options file '{path}': {message}")
            }
            OptionsError::Parse { path, message } => {
                write!(f, "Failed to parse options file '{path}': {message}")
            }
        }
    }
}

impl std::error::Error for OptionsError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_yaml_options_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yaml");
        fs::write(&path, "release: bionic_queens\nauth_name: tester\n").unwrap();

        let options = TestbedOptions::from_path(&path).unwrap();
        assert_eq!(options.release, Release::BionicQueens);
        assert_eq!(options.auth_name, "tester");
        // Unspecified fields keep their defaults.
        assert_eq!(options.account, "AUTH_imgcheck");
    }

    #[test]
    fn loads_json_options_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"release": "bionic_stein"}"#).unwrap();

        let options = TestbedOptions::from_path(&path).unwrap();
        assert_eq!(options.release, Release::BionicStein);
    }

    #[test]
    fn unknown_extension_falls_back_to_trying_both() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.conf");
        fs::write(&path, "release: focal_victoria\n").unwrap();

        let options = TestbedOptions::from_path(&path).unwrap();
        assert_eq!(options.release, Release::FocalVictoria);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = TestbedOptions::from_path("/nonexistent/options.yaml").unwrap_err();
        assert!(matches!(err, OptionsError::Io { .. }));
    }
}
