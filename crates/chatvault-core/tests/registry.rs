//! Backend registry and config-driven construction.

use chatvault_core::backend::BackendConstructor;
use chatvault_core::{Backend, BackendConfig, BackendRegistry, FileSystemBackend, Result};

#[test]
fn defaults_cover_filesystem_aliases_and_sqlite() {
    let registry = BackendRegistry::with_defaults();
    assert_eq!(registry.names(), vec!["file", "filesystem", "fs", "sqlite"]);
    assert!(registry.contains("FileSystem"));
}

#[test]
fn creates_filesystem_backend_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BackendConfig::filesystem(dir.path().join("sessions"));
    let backend = BackendRegistry::with_defaults()
        .create(&config)
        .expect("create");
    assert_eq!(backend.name(), "filesystem");
    assert!(dir.path().join("sessions").is_dir());
}

#[test]
fn creates_sqlite_backend_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BackendConfig::sqlite(dir.path().join("sessions.db"));
    let backend = BackendRegistry::with_defaults()
        .create(&config)
        .expect("create");
    assert_eq!(backend.name(), "sqlite");
    assert!(backend.list().expect("list").is_empty());
}

#[test]
fn aliases_are_case_insensitive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = BackendConfig::filesystem(dir.path());
    config.backend_type = "FS".to_string();
    let backend = BackendRegistry::with_defaults()
        .create(&config)
        .expect("create");
    assert_eq!(backend.name(), "filesystem");
}

#[test]
fn unknown_type_lists_known_backends() {
    let err = BackendRegistry::with_defaults()
        .create(&BackendConfig::new("postgres"))
        .err()
        .expect("unknown");
    let message = err.to_string();
    assert!(message.contains("postgres"));
    assert!(message.contains("sqlite"));
}

#[test]
fn missing_path_setting_is_config_error() {
    let err = BackendRegistry::with_defaults()
        .create(&BackendConfig::new("filesystem"))
        .err()
        .expect("no path");
    assert!(matches!(err, chatvault_core::Error::Config(_)));
}

fn scratch_backend(_config: &BackendConfig) -> Result<Box<dyn Backend>> {
    let dir = std::env::temp_dir().join(format!("chatvault-scratch-{}", std::process::id()));
    Ok(Box::new(FileSystemBackend::new(dir)?))
}

#[test]
fn custom_constructors_can_be_registered() {
    let mut registry = BackendRegistry::new();
    assert!(registry.names().is_empty());

    let constructor: BackendConstructor = scratch_backend;
    registry.register("Scratch", constructor);
    assert!(registry.contains("scratch"));

    let backend = registry.create(&BackendConfig::new("scratch")).expect("create");
    assert_eq!(backend.name(), "filesystem");
}
