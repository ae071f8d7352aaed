//! Configuration for the panel demo
//!
//! YAML file describing which driver backend to use and the pages to create
//! at startup. Every field has a default, so an empty file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::device::{DeviceClassId, X52Button, X52_PRO};
use crate::page::LedColor;
use crate::session::{SessionOptions, DEFAULT_PLUGIN_NAME};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PanelConfig {
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,
    #[serde(default = "default_device_class")]
    pub device_class: DeviceClassId,
    /// Directories searched for `DirectOutput.dll`, in order
    #[serde(default = "default_library_paths")]
    pub library_paths: Vec<PathBuf>,
    #[serde(default)]
    pub backend: Backend,
    /// How long the demo keeps the session open
    #[serde(default = "default_run_seconds")]
    pub run_seconds: u64,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

/// Driver implementation to talk to
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory device, no hardware required
    #[default]
    Simulated,
    /// Vendor `DirectOutput.dll` (Windows, `directoutput` feature)
    DirectOutput,
}

/// One page created at startup
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PageConfig {
    pub title: String,
    /// Line bound, 0 keeps every line
    #[serde(default)]
    pub max_lines: usize,
    /// Initial lines, oldest first
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub leds: HashMap<X52Button, LedColor>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            device_class: default_device_class(),
            library_paths: default_library_paths(),
            backend: Backend::default(),
            run_seconds: default_run_seconds(),
            pages: Vec::new(),
        }
    }
}

impl PanelConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document parses as null rather than an empty mapping
        let config: PanelConfig = if contents.trim().is_empty() {
            PanelConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plugin_name.trim().is_empty() {
            anyhow::bail!("plugin_name cannot be empty");
        }

        for (page_idx, page) in self.pages.iter().enumerate() {
            if page.title.trim().is_empty() {
                anyhow::bail!("Page {} title cannot be empty", page_idx);
            }
            if page.max_lines > 0 && page.lines.len() > page.max_lines {
                tracing::warn!(
                    page = %page.title,
                    lines = page.lines.len(),
                    max_lines = page.max_lines,
                    "Initial lines exceed max_lines, oldest will be dropped"
                );
            }
        }

        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            plugin_name: self.plugin_name.clone(),
            device_class: self.device_class,
        }
    }
}

fn default_plugin_name() -> String { DEFAULT_PLUGIN_NAME.to_string() }
fn default_device_class() -> DeviceClassId { X52_PRO }
fn default_run_seconds() -> u64 { 30 }
fn default_library_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(r"C:\Program Files (x86)\Saitek\DirectOutput"),
        PathBuf::from(r"C:\Program Files\Saitek\DirectOutput"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
plugin_name: "Flight Log"
backend: simulated
run_seconds: 5
pages:
  - title: First
    lines: ["a", "b"]
    leds:
      FireA: green
      Toggle1-2: amber
      Throttle: "on"
  - title: Second
    max_lines: 3
"#;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PanelConfig::from_yaml("").unwrap();
        assert_eq!(config, PanelConfig::default());
        assert_eq!(config.plugin_name, "Saitek");
        assert_eq!(config.device_class, X52_PRO);
        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.run_seconds, 30);
        assert_eq!(config.library_paths.len(), 2);
    }

    #[test]
    fn test_parse_pages_and_leds() {
        let config = PanelConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.plugin_name, "Flight Log");
        assert_eq!(config.run_seconds, 5);
        assert_eq!(config.pages.len(), 2);

        let first = &config.pages[0];
        assert_eq!(first.max_lines, 0);
        assert_eq!(first.lines, vec!["a", "b"]);
        assert_eq!(first.leds.get(&X52Button::FireA), Some(&LedColor::Green));
        assert_eq!(first.leds.get(&X52Button::Toggle1_2), Some(&LedColor::Amber));
        assert_eq!(first.leds.get(&X52Button::Throttle), Some(&LedColor::On));

        assert_eq!(config.pages[1].max_lines, 3);
        assert!(config.pages[1].leds.is_empty());
    }

    #[test]
    fn test_device_class_round_trip() {
        let config =
            PanelConfig::from_yaml("device_class: \"06d5da29-3bf9-204f-85fa-1e02c04fac17\"\n")
                .unwrap();
        assert_eq!(config.device_class, X52_PRO);

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("{06D5DA29-3BF9-204F-85FA-1E02C04FAC17}"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PanelConfig::from_yaml("device_class: \"not-a-guid\"\n").is_err());
        assert!(PanelConfig::from_yaml("backend: usb\n").is_err());
        assert!(PanelConfig::from_yaml("plugin_name: \"  \"\n").is_err());
        assert!(PanelConfig::from_yaml("pages:\n  - title: \"\"\n").is_err());
        assert!(PanelConfig::from_yaml("pages:\n  - title: A\n    leds:\n      Trigger: red\n").is_err());
    }

    #[test]
    fn test_session_options() {
        let config = PanelConfig::from_yaml(SAMPLE).unwrap();
        let options = config.session_options();
        assert_eq!(options.plugin_name, "Flight Log");
        assert_eq!(options.device_class, X52_PRO);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = PanelConfig::load(file.path()).await.unwrap();
        assert_eq!(config.pages[0].title, "First");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = PanelConfig::load(dir.path().join("missing.yaml"))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }
}
