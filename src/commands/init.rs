use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file with default settings
/// - Stores `openid` and `cookie` in `.secrets/credentials.json`
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/cardstat`
/// - `openid` - The identity the card system's web app knows you by.
/// - `cookie` - The session cookie of the card system's web app.
///
/// # Errors
/// - Returns an error if any file operations fail or if `home` already holds a config file.
pub async fn init(home: &Path, openid: &str, cookie: &str) -> Result<Out<()>> {
    let config = Config::create(home, openid, cookie)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the cardstat directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("cardstat");
        let out = init(&home, "o-42", "SESSION=abc").await.unwrap();
        assert!(out.message().starts_with("Successfully created"));

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.credentials().openid(), "o-42");
        assert_eq!(config.credentials().cookie(), "SESSION=abc");
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), "o-42", "SESSION=abc").await.unwrap();
        assert!(init(dir.path(), "o-43", "SESSION=def").await.is_err());
    }

    #[tokio::test]
    async fn test_init_rejects_empty_credentials() {
        let dir = TempDir::new().unwrap();
        assert!(init(&dir.path().join("a"), "", "SESSION=abc").await.is_err());
        assert!(init(&dir.path().join("b"), "o-42", "  ").await.is_err());
    }
}
