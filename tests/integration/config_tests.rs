use dupelink::actions::LinkStrategy;
use dupelink::config::{Config, ConfigError};
use dupelink::index::Durability;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.hash_workers, 4);
    assert_eq!(config.durability, Durability::Full);
    assert_eq!(config.link_strategy, LinkStrategy::Rename);
    assert!(config.index_path.is_none());
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("DUPELINK_QUEUE_CAPACITY", "77");
    std::env::set_var("DUPELINK_DURABILITY", "normal");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DUPELINK_").split("__"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.queue_capacity, 77);
    assert_eq!(config.durability, Durability::Normal);

    std::env::remove_var("DUPELINK_QUEUE_CAPACITY");
    std::env::remove_var("DUPELINK_DURABILITY");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
index_path = "/var/lib/dupelink/fp.db"
resolve_workers = 6
link_strategy = "delete-then-link"
paranoid = true
ignore_patterns = ["*.tmp", ".git/"]
"#,
    )
    .unwrap();

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.index_path, Some(PathBuf::from("/var/lib/dupelink/fp.db")));
    assert_eq!(config.resolve_workers, 6);
    assert_eq!(config.link_strategy, LinkStrategy::DeleteThenLink);
    assert!(config.paranoid);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", ".git/"]);
    assert_eq!(config.hash_workers, 4);
}

#[test]
fn test_explicit_config_file_must_exist() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    match Config::load(Some(&missing)) {
        Err(ConfigError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_value_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "link_strategy = \"hardlink\"\n").unwrap();

    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_normalizes_zero_workers() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "traversal_workers = 0\n").unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.traversal_workers, 1);
}
