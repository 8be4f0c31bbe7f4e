//! Runs in its own test binary because it sets process environment variables.

use std::fs;

use anyhow::Result;
use reconciler::config::ReconcilerConfig;
use tempfile::TempDir;

#[test]
fn test_statusdb_env_does_not_collapse_validation_environments() -> Result<()> {
    std::env::set_var("STATUSDB_URL", "http://override.example.org:5984");
    std::env::set_var("STATUSDB_USERNAME", "override");

    let dir = TempDir::new()?;
    let prod = dir.path().join("prod.yaml");
    let dev = dir.path().join("dev.yaml");
    fs::write(&prod, "statusdb:\n  url: http://prod.example.org:5984\n  username: prod\n")?;
    fs::write(&dev, "statusdb:\n  url: http://dev.example.org:5984\n  username: dev\n")?;

    let (left, right) = ReconcilerConfig::load_environments(&prod, &dev)?;
    assert_eq!(left.statusdb.url, "http://prod.example.org:5984");
    assert_eq!(right.statusdb.url, "http://dev.example.org:5984");
    assert_eq!(left.statusdb.username.as_deref(), Some("prod"));
    assert_eq!(right.statusdb.username.as_deref(), Some("dev"));

    let single = ReconcilerConfig::load(&prod)?;
    assert_eq!(single.statusdb.url, "http://override.example.org:5984");
    Ok(())
}
