use apiset_config::{ApisetConfig, ConfigError};
use pretty_assertions::assert_eq;

#[test]
fn defaults_match_an_empty_file() {
    let config = ApisetConfig::load_from_str("").unwrap();
    assert!(config.merge.deep_signature_merge);
    assert!(!config.merge.group_classes);
    assert!(config.output.stub_bodies);
    assert_eq!(config.output.class_major_version, 52);
    assert_eq!(config.run.shards, 1);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
}

#[test]
fn full_file_parses() {
    let text = r#"
[merge]
deep_signature_merge = false
group_classes = true
skip_package_private_member_classes = false

[output]
write_parameters = false
stub_bodies = false
class_major_version = 55

[run]
max_decode_failures = 3
shards = 4

[logging]
level = "apiset.merge=debug"
json = true
stderr = false
file = "apiset.log"
"#;
    let config = ApisetConfig::load_from_str(text).unwrap();
    assert!(config.merge.group_classes);
    assert!(!config.output.write_parameters);
    assert_eq!(config.run.max_decode_failures, 3);
    assert_eq!(config.logging.file.as_deref(), Some(std::path::Path::new("apiset.log")));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = ApisetConfig::load_from_str("[merge]\ndeep_signatures = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err}");
    assert!(err.to_string().contains("deep_signatures"), "{err}");
}

#[test]
fn zero_shards_are_invalid() {
    let err = ApisetConfig::load_from_str("[run]\nshards = 0\n").unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { key: "run.shards", .. }),
        "{err}"
    );
}
