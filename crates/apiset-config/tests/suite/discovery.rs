use apiset_config::{discover_config_path, load, APISET_CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use apiset_test_utils::{env_lock, EnvVarGuard};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn discovers_apiset_toml_in_working_dir() {
    let _lock = env_lock();
    let _env = EnvVarGuard::remove(APISET_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[run]\nshards = 4\n").unwrap();

    assert_eq!(discover_config_path(dir.path()), Some(path.clone()));
    let (config, used) = load(None, dir.path()).unwrap();
    assert_eq!(config.run.shards, 4);
    assert_eq!(used, Some(path));
}

#[test]
fn env_override_wins_over_working_dir_file() {
    let _lock = env_lock();

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run]\nshards = 4\n").unwrap();
    std::fs::write(dir.path().join("other.toml"), "[run]\nshards = 8\n").unwrap();
    let _env = EnvVarGuard::set(APISET_CONFIG_ENV_VAR, "other.toml");

    let (config, used) = load(None, dir.path()).unwrap();
    assert_eq!(config.run.shards, 8);
    assert_eq!(used, Some(dir.path().join("other.toml")));
}

#[test]
fn explicit_path_wins_over_everything() {
    let _lock = env_lock();

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("other.toml"), "[run]\nshards = 8\n").unwrap();
    let explicit = dir.path().join("explicit.toml");
    std::fs::write(&explicit, "[run]\nshards = 2\n").unwrap();
    let _env = EnvVarGuard::set(APISET_CONFIG_ENV_VAR, "other.toml");

    let (config, _) = load(Some(&explicit), dir.path()).unwrap();
    assert_eq!(config.run.shards, 2);
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let _lock = env_lock();
    let _env = EnvVarGuard::remove(APISET_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let (config, used) = load(None, dir.path()).unwrap();
    assert_eq!(config, Default::default());
    assert_eq!(used, None);
}
