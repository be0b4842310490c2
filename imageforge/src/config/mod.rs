//! Build configuration.
//!
//! A build config is a TOML file describing the stage sequence: each stage
//! names the command to run, its pre-flight probes, an optional remediation
//! command, and retry tuning. Every timing value has a default and none is
//! a load-bearing contract.
//!
//! ```toml
//! [[stage]]
//! name = "create-media"
//! program = "copype"
//! args = ["amd64", "C:/scratch/winpe"]
//!
//! [stage.retry]
//! max_attempts = 3
//! base_delay_ms = 5000
//!
//! [[stage.probe]]
//! check = "tool_on_path"
//! tool = "copype"
//! ```

use crate::errors::ForgeError;
use crate::retry::RetryPolicy;
use crate::stage::{CommandLine, CommandStage, Probe, Stage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One stage definition in a build config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique within the config.
    pub name: String,
    /// Program to run.
    pub program: String,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Retry tuning; unspecified fields take defaults.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Pre-flight probes.
    #[serde(default, rename = "probe")]
    pub probes: Vec<Probe>,
    /// Optional remediation command run between failed attempts.
    #[serde(default)]
    pub remediate: Option<CommandLine>,
}

impl StageConfig {
    fn into_stage(self) -> CommandStage {
        let mut stage = CommandStage::new(
            self.name,
            CommandLine {
                program: self.program,
                args: self.args,
            },
        )
        .with_policy(self.retry);

        for probe in self.probes {
            stage = stage.with_probe(probe);
        }
        if let Some(remediate) = self.remediate {
            stage = stage.with_remediation(remediate);
        }
        stage
    }
}

/// A full build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Where to persist the run report as JSON, if anywhere.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// The ordered stage sequence.
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,
}

impl BuildConfig {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ForgeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Parses and validates config text.
    pub fn parse(raw: &str) -> Result<Self, ForgeError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ForgeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the stage sequence.
    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.stages.is_empty() {
            return Err(ForgeError::InvalidConfig("no stages defined".to_string()));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(ForgeError::InvalidConfig("stage with empty name".to_string()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(ForgeError::InvalidConfig(format!(
                    "duplicate stage name '{}'",
                    stage.name
                )));
            }
            if stage.retry.max_attempts == 0 {
                return Err(ForgeError::InvalidConfig(format!(
                    "stage '{}' has a zero attempt budget",
                    stage.name
                )));
            }
        }
        Ok(())
    }

    /// Converts the config into a runnable stage sequence.
    #[must_use]
    pub fn into_stages(self) -> Vec<Box<dyn Stage>> {
        self.stages
            .into_iter()
            .map(|s| Box::new(s.into_stage()) as Box<dyn Stage>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        report_path = "out/report.json"

        [[stage]]
        name = "create-media"
        program = "copype"
        args = ["amd64", "C:/scratch/winpe"]

        [stage.retry]
        max_attempts = 2
        base_delay_ms = 100

        [[stage.probe]]
        check = "tool_on_path"
        tool = "copype"

        [[stage]]
        name = "capture"
        program = "dism"
        args = ["/capture-ffu"]

        [stage.remediate]
        program = "dism"
        args = ["/cleanup-mountpoints"]
    "#;

    #[test]
    fn test_parse_sample() {
        let config = BuildConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.report_path, Some(PathBuf::from("out/report.json")));
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].name, "create-media");
        assert_eq!(config.stages[0].retry.max_attempts, 2);
        assert_eq!(config.stages[0].probes.len(), 1);
        // Unspecified retry settings fall back to defaults.
        assert_eq!(config.stages[1].retry, RetryPolicy::default());
        assert!(config.stages[1].remediate.is_some());
    }

    #[test]
    fn test_empty_config_rejected() {
        let err = BuildConfig::parse("").unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_stage_names_rejected() {
        let raw = r#"
            [[stage]]
            name = "capture"
            program = "dism"

            [[stage]]
            name = "capture"
            program = "dism"
        "#;
        let err = BuildConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let raw = r#"
            [[stage]]
            name = "capture"
            program = "dism"

            [stage.retry]
            max_attempts = 0
        "#;
        let err = BuildConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("zero attempt budget"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = BuildConfig::parse("[[stage]\nname=").unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_into_stages_preserves_order() {
        let config = BuildConfig::parse(SAMPLE).unwrap();
        let stages = config.into_stages();

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name(), "create-media");
        assert_eq!(stages[1].name(), "capture");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = BuildConfig::load(&path).unwrap();
        assert_eq!(config.stages.len(), 2);

        let err = BuildConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }
}
