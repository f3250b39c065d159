//! Configuration layering.

use std::fs;

use mediadedupe::actions::delete::DeletionMode;
use mediadedupe::canon::MediaKind;
use mediadedupe::config::{Config, ConfigError, ConfigOverrides, SearchPath};
use tempfile::tempdir;

#[test]
fn test_file_values_apply_and_defaults_fill_the_rest() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
media = "image"
deletion_mode = "trash"
supported_file_types = ["png", ".Jpg"]

[[search_paths]]
path = "/srv/library"
is_reference = true
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path), &ConfigOverrides::default()).unwrap();
    assert_eq!(config.media, MediaKind::Image);
    assert_eq!(config.deletion_mode, DeletionMode::Trash);
    assert!(config.should_scan_files);
    assert!(!config.should_delete_files);
    assert_eq!(config.search_paths, vec![SearchPath::reference("/srv/library")]);

    let file_types = config.file_types();
    let types: Vec<&str> = file_types.iter().collect();
    assert_eq!(types, vec!["JPG", "PNG"]);
    config.validate().unwrap();
}

#[test]
fn test_command_line_beats_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
workers = 8
should_delete_files = true

[[search_paths]]
path = "/from/file"
"#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        workers: Some(2),
        should_delete_files: Some(false),
        search_paths: Some(vec![SearchPath::new("/from/cli")]),
        ..ConfigOverrides::default()
    };
    let config = Config::load(Some(&path), &overrides).unwrap();

    assert_eq!(config.workers, 2);
    assert!(!config.should_delete_files);
    assert_eq!(config.search_paths, vec![SearchPath::new("/from/cli")]);
}

#[test]
fn test_malformed_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "media = \"video\"\n").unwrap();

    let err = Config::load(Some(&path), &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_scanning_without_search_paths_is_invalid() {
    let config = Config::default();
    assert!(matches!(config.validate(), Err(ConfigError::NoSearchPaths)));

    let resolve_only = Config {
        should_scan_files: false,
        ..Config::default()
    };
    resolve_only.validate().unwrap();
}
