//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::Config;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test environment that sets up a cardstat home directory with a Config.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a home directory with default settings and dummy credentials. Report output goes to
    /// `output` inside the temp dir, wherever the tests run.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cardstat");
        let config = Config::create(&root, "test-openid", "JSESSIONID=test")
            .await
            .unwrap()
            .with_output_base(temp_dir.path().join("output"));
        Self { temp_dir, config }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// The base directory that report output is written under.
    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("output")
    }
}
