//! Configuration change units and the structured view of rendered ini files.

use crate::error::ImgcheckError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A set of option values applied to the deployment in one change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDelta(BTreeMap<String, String>);

impl ConfigDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Structured representation of an ini-style config file: section -> key ->
/// values, one entry per occurrence of the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSections(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl ConfigSections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `section`/`key`.
    pub fn with_option(mut self, section: &str, key: &str, value: &str) -> Self {
        self.0
            .entry(section.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&[String]> {
        self.0
            .get(section)
            .and_then(|options| options.get(key))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse ini-style text. Keys before the first section header are
    /// attributed to `DEFAULT`; blank lines and `#`/`;` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ImgcheckError> {
        let mut sections = ConfigSections::new();
        let mut current = "DEFAULT".to_string();
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                current = header.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ImgcheckError::MalformedConfigLine {
                    line_number: index + 1,
                    line: raw_line.to_string(),
                });
            };
            sections = sections.with_option(&current, key.trim(), value.trim());
        }
        Ok(sections)
    }

    /// Render back to ini text, sections and keys in sorted order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (section, options) in &self.0 {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{section}]\n"));
            for (key, values) in options {
                for value in values {
                    out.push_str(&format!("{key} = {value}\n"));
                }
            }
        }
        out
    }

    /// Fold another file's sections into this one; on a key collision the
    /// incoming value list wins.
    pub fn merge(&mut self, other: ConfigSections) {
        for (section, options) in other.0 {
            let target = self.0.entry(section).or_default();
            for (key, values) in options {
                target.insert(key, values);
            }
        }
    }

    /// Whether every section/key/value-list in `expected` appears in `self`
    /// with an identical value list. Sections and keys not named by
    /// `expected` are ignored.
    pub fn contains(&self, expected: &ConfigSections) -> bool {
        expected.0.iter().all(|(section, options)| {
            options
                .iter()
                .all(|(key, values)| self.get(section, key) == Some(values.as_slice()))
        })
    }
}

impl fmt::Display for ConfigSections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_attributes_preamble_to_default_section() {
        let sections = ConfigSections::parse("debug = true\n[image_format]\ndisk_formats = qcow2\n")
            .unwrap();
        assert_eq!(
            sections.get("DEFAULT", "debug"),
            Some(&["true".to_string()][..])
        );
        assert_eq!(
            sections.get("image_format", "disk_formats"),
            Some(&["qcow2".to_string()][..])
        );
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let text = "# leading comment\n\n[DEFAULT]\n; another comment\ndebug = false\n";
        let sections = ConfigSections::parse(text).unwrap();
        assert_eq!(
            sections.get("DEFAULT", "debug"),
            Some(&["false".to_string()][..])
        );
    }

    #[test]
    fn parse_collects_repeated_keys_in_order() {
        let text = "[pipeline]\nfilter = authtoken\nfilter = context\n";
        let sections = ConfigSections::parse(text).unwrap();
        assert_eq!(
            sections.get("pipeline", "filter"),
            Some(&["authtoken".to_string(), "context".to_string()][..])
        );
    }

    #[test]
    fn parse_rejects_lines_without_separator() {
        let err = ConfigSections::parse("[DEFAULT]\nnot a key value pair\n").unwrap_err();
        assert_eq!(
            err,
            ImgcheckError::MalformedConfigLine {
                line_number: 2,
                line: "not a key value pair".to_string(),
            }
        );
    }

    #[test]
    fn render_parse_round_trip() {
        let sections = ConfigSections::new()
            .with_option("DEFAULT", "debug", "false")
            .with_option("image_format", "disk_formats", "qcow2");
        let rendered = sections.render();
        assert_eq!(ConfigSections::parse(&rendered).unwrap(), sections);
    }

    #[test]
    fn contains_checks_expected_subset_only() {
        let parsed = ConfigSections::new()
            .with_option("DEFAULT", "debug", "false")
            .with_option("image_format", "disk_formats", "qcow2");
        let expected = ConfigSections::new().with_option("image_format", "disk_formats", "qcow2");
        assert!(parsed.contains(&expected));

        let mismatched = ConfigSections::new().with_option("image_format", "disk_formats", "raw");
        assert!(!parsed.contains(&mismatched));

        let missing = ConfigSections::new().with_option("glance_store", "default_store", "swift");
        assert!(!parsed.contains(&missing));
    }

    #[test]
    fn merge_replaces_colliding_keys_and_keeps_the_rest() {
        let mut base = ConfigSections::new()
            .with_option("DEFAULT", "debug", "false")
            .with_option("image_format", "disk_formats", "qcow2");
        base.merge(ConfigSections::new().with_option("DEFAULT", "debug", "true"));
        assert_eq!(base.get("DEFAULT", "debug"), Some(&["true".to_string()][..]));
        assert_eq!(
            base.get("image_format", "disk_formats"),
            Some(&["qcow2".to_string()][..])
        );
    }

    #[test]
    fn delta_builder_accumulates_options() {
        let delta = ConfigDelta::new()
            .with("disk-formats", "qcow2")
            .with("debug", "true");
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get("disk-formats"), Some("qcow2"));
        assert_eq!(delta.get("unset"), None);
    }
}
