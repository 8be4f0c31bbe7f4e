use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use reconciler::config::ReconcilerConfig;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
statusdb:
  url: http://couch.example.org:5984
  username: user
  password: secret
  timeout_secs: 10
lims:
  base_url: https://lims.example.org/api/v2
  username: apiuser
  password: apisecret
catalog_path: /var/lib/reconciler/runs.sqlite
"#;

#[test]
fn test_full_config_parses() -> Result<()> {
    let config = ReconcilerConfig::from_yaml(FULL_CONFIG)?;

    assert_eq!(config.statusdb.url, "http://couch.example.org:5984");
    assert_eq!(config.statusdb.username.as_deref(), Some("user"));
    assert_eq!(config.statusdb.timeout_secs, 10);
    assert_eq!(
        config.statusdb.catalog_path,
        Some(PathBuf::from("/var/lib/reconciler/runs.sqlite"))
    );

    let lims = config.lims()?;
    assert_eq!(lims.base_url, "https://lims.example.org/api/v2");
    assert_eq!(lims.timeout_secs, 30);
    Ok(())
}

#[test]
fn test_validation_config_needs_no_lims_section() -> Result<()> {
    let config = ReconcilerConfig::from_yaml("statusdb:\n  url: http://localhost:5984\n")?;
    assert!(config.lims.is_none());
    assert!(config.lims().is_err());
    assert!(config.statusdb.catalog_path.is_none());
    Ok(())
}

#[test]
fn test_missing_statusdb_section_is_rejected() {
    let err = ReconcilerConfig::from_yaml("lims:\n  base_url: https://lims\n").unwrap_err();
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn test_load_reads_file_and_reports_path() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("post_process.yaml");
    fs::write(&path, FULL_CONFIG)?;

    let config = ReconcilerConfig::load_file(&path)?;
    assert!(config.lims.is_some());
    assert_eq!(config.statusdb.url, "http://couch.example.org:5984");

    let missing = dir.path().join("absent.yaml");
    let err = ReconcilerConfig::load_file(&missing).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
    Ok(())
}

#[test]
fn test_log_dir_is_optional() -> Result<()> {
    let config = ReconcilerConfig::from_yaml(FULL_CONFIG)?;
    assert!(config.log_dir.is_none());

    let config = ReconcilerConfig::from_yaml(
        "statusdb:\n  url: http://localhost:5984\nlog_dir: /var/log/reconciler\n",
    )?;
    assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/reconciler")));
    Ok(())
}

#[test]
fn test_default_path_points_into_opt_config() {
    let path = ReconcilerConfig::default_path();
    assert!(path.ends_with("opt/config/post_process.yaml"));
}
