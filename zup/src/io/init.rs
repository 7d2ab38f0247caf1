//! Scaffolding for `zup init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::config::{DEFAULT_CONFIG_PATH, ZupConfig, write_config};
use super::steps::{DEFAULT_SETUP_PATH, SAMPLE_SETUP};

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing step file and config.
    pub force: bool,
}

/// Files `init_project` considered, and which of them it wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub setup_path: PathBuf,
    pub config_path: PathBuf,
    pub written: Vec<PathBuf>,
}

/// Write a sample `zup.yaml` and a default `.zup/config.toml` in `root`.
///
/// Existing files are left alone unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<InitReport> {
    let setup_path = root.join(DEFAULT_SETUP_PATH);
    let config_path = root.join(DEFAULT_CONFIG_PATH);
    let mut written = Vec::new();

    if options.force || !setup_path.exists() {
        fs::write(&setup_path, SAMPLE_SETUP)
            .with_context(|| format!("write {}", setup_path.display()))?;
        written.push(setup_path.clone());
    }
    if options.force || !config_path.exists() {
        write_config(&config_path, &ZupConfig::default())?;
        written.push(config_path.clone());
    }

    info!(written = written.len(), "initialized project");
    Ok(InitReport {
        setup_path,
        config_path,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::steps::load_setup;

    #[test]
    fn init_creates_loadable_files() {
        let temp = tempfile::tempdir().expect("tempdir");

        let report = init_project(temp.path(), &InitOptions { force: false }).expect("init");

        assert_eq!(report.written.len(), 2);
        assert_eq!(load_setup(&report.setup_path).expect("setup").setup.len(), 3);
        assert_eq!(load_config(&report.config_path).expect("config"), ZupConfig::default());
    }

    #[test]
    fn init_keeps_existing_files_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let setup_path = temp.path().join(DEFAULT_SETUP_PATH);
        fs::write(&setup_path, "setup: []\n").expect("write");

        let report = init_project(temp.path(), &InitOptions { force: false }).expect("init");

        assert_eq!(report.written, vec![report.config_path.clone()]);
        assert_eq!(fs::read_to_string(&setup_path).expect("read"), "setup: []\n");
    }

    #[test]
    fn init_force_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let setup_path = temp.path().join(DEFAULT_SETUP_PATH);
        fs::write(&setup_path, "setup: []\n").expect("write");

        init_project(temp.path(), &InitOptions { force: true }).expect("init");

        assert_eq!(fs::read_to_string(&setup_path).expect("read"), SAMPLE_SETUP);
    }
}
