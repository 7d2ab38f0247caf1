//! Step file (`zup.yaml`) loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::Step;

pub const DEFAULT_SETUP_PATH: &str = "zup.yaml";

/// Scaffold written by `zup init`.
pub const SAMPLE_SETUP: &str = r#"setup:
  - desc: Check git is installed
    cmd: git --version

  - desc: Install jq
    cmd: apt-get install -y jq
    meta: Prefer the system package manager.

  - desc: Serve the docs folder
    cmd: python3 -m http.server 8000
    mode: background
"#;

/// Parsed step file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupFile {
    #[serde(default)]
    pub setup: Vec<Step>,
}

impl SetupFile {
    /// Reject steps that have nothing to run.
    pub fn validate(&self) -> Result<()> {
        let problems: Vec<String> = self
            .setup
            .iter()
            .enumerate()
            .filter(|(_, step)| step.command.trim().is_empty())
            .map(|(i, step)| {
                if step.description.trim().is_empty() {
                    format!("step {} has an empty cmd", i + 1)
                } else {
                    format!("step {} ({}) has an empty cmd", i + 1, step.description)
                }
            })
            .collect();
        if !problems.is_empty() {
            bail!("invalid setup file:\n- {}", problems.join("\n- "));
        }
        Ok(())
    }
}

/// Parse a step file from YAML text.
pub fn parse_setup(raw: &str) -> Result<SetupFile> {
    let file: SetupFile = serde_yaml::from_str(raw).context("parse setup yaml")?;
    file.validate()?;
    Ok(file)
}

/// Read and validate the step file at `path`.
pub fn load_setup(path: &Path) -> Result<SetupFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file = parse_setup(&raw).with_context(|| format!("load {}", path.display()))?;
    debug!(path = %path.display(), steps = file.setup.len(), "loaded setup file");
    Ok(file)
}
