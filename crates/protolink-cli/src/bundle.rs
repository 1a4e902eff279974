//! Input bundles and configuration.
//!
//! A bundle is the JSON rendering of already-parsed files:
//! `{ "sources": [ProtoFileElement...], "dependencies": [ProtoFileElement...] }`.
//! Sources are linked and validated; dependencies are only loaded when a
//! source imports them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use protolink_schema::{LinkerOptions, ProtoFileElement, PruningRules, PruningRulesConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bundle {
    pub sources: Vec<ProtoFileElement>,
    pub dependencies: Vec<ProtoFileElement>,
}

impl Bundle {
    pub fn read(path: &Path) -> Result<Bundle> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("{} is not a valid bundle", path.display()))
    }
}

/// Linked or pruned files written back out as elements.
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub files: Vec<ProtoFileElement>,
}

impl Output {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub linker: LinkerOptions,
    pub pruning: PruningRulesConfig,
}

impl Config {
    /// Reads `path` if given; otherwise every setting is at its default.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Flags win over the file: switches turn settings on, lists extend
    /// the configured ones, versions replace them.
    pub fn apply_linker_flags(&mut self, load_exhaustively: bool, permit_package_cycles: bool, opaque_types: &[String]) {
        self.linker.load_exhaustively |= load_exhaustively;
        self.linker.permit_package_cycles |= permit_package_cycles;
        self.linker.opaque_types.extend(opaque_types.iter().cloned());
    }

    pub fn apply_rule_flags(&mut self, flags: RuleFlags) {
        self.pruning.roots.extend(flags.roots);
        self.pruning.prunes.extend(flags.prunes);
        if flags.since.is_some() {
            self.pruning.since = flags.since;
        }
        if flags.until.is_some() {
            self.pruning.until = flags.until;
        }
        if flags.only.is_some() {
            self.pruning.only = flags.only;
        }
    }

    pub fn pruning_rules(&self) -> Result<PruningRules> {
        self.pruning.clone().into_rules().context("invalid pruning rules")
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleFlags {
    pub roots: Vec<String>,
    pub prunes: Vec<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub only: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolink_schema::MessageElement;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).expect("write fixture");
        path
    }

    #[test]
    fn bundles_read_sources_and_dependencies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bundle = Bundle {
            sources: vec![ProtoFileElement::new("a.proto").package("a").message(MessageElement::new("A"))],
            dependencies: vec![ProtoFileElement::new("b.proto")],
        };
        let path = write(&dir, "bundle.json", &serde_json::to_string(&bundle).expect("json"));

        let read = Bundle::read(&path).expect("read bundle");
        assert_eq!(read.sources, bundle.sources);
        assert_eq!(read.dependencies.len(), 1);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "bundle.json", "{}");
        let read = Bundle::read(&path).expect("read bundle");
        assert!(read.sources.is_empty());
        assert!(read.dependencies.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "bundle.json", r#"{ "files": [] }"#);
        let err = Bundle::read(&path).expect_err("unknown key");
        assert!(format!("{err:#}").contains("is not a valid bundle"));
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            &dir,
            "config.json",
            r#"{
                "linker": { "opaque_types": ["a.Blob"] },
                "pruning": { "roots": ["a.A"], "since": "1.0" }
            }"#,
        );
        let mut config = Config::load(Some(&path)).expect("config");
        config.apply_linker_flags(true, false, &["a.Other".to_string()]);
        config.apply_rule_flags(RuleFlags {
            roots: vec!["a.B".to_string()],
            since: Some("2.0".to_string()),
            ..RuleFlags::default()
        });

        assert!(config.linker.load_exhaustively);
        assert!(!config.linker.permit_package_cycles);
        assert_eq!(config.linker.opaque_types, vec!["a.Blob", "a.Other"]);
        assert_eq!(config.pruning.roots, vec!["a.A", "a.B"]);
        assert_eq!(config.pruning.since.as_deref(), Some("2.0"));
        assert!(config.pruning_rules().is_ok());
    }

    #[test]
    fn conflicting_versions_are_reported() {
        let mut config = Config::load(None).expect("defaults");
        config.apply_rule_flags(RuleFlags {
            since: Some("1.0".to_string()),
            only: Some("2.0".to_string()),
            ..RuleFlags::default()
        });
        assert!(config.pruning_rules().is_err());
    }
}
