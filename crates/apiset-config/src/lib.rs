use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use apiset_merge::{EncodeOptions, MergeOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable naming a config file to use instead of discovery.
pub const APISET_CONFIG_ENV_VAR: &str = "APISET_CONFIG";

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "apiset.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Unify structurally different signatures of ordinary methods too. Constructor signatures
    /// are always unified.
    pub deep_signature_merge: bool,
    /// Split classes whose versions are not mergeable into renamed groups before merging.
    pub group_classes: bool,
    pub skip_package_private_member_classes: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            deep_signature_merge: true,
            group_classes: false,
            skip_package_private_member_classes: true,
        }
    }
}

impl MergeConfig {
    pub fn options(&self) -> MergeOptions {
        MergeOptions {
            deep_signature_merge: self.deep_signature_merge,
            skip_package_private_member_classes: self.skip_package_private_member_classes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub write_parameters: bool,
    pub stub_bodies: bool,
    pub class_major_version: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_parameters: true,
            stub_bodies: true,
            class_major_version: 52,
        }
    }
}

impl OutputConfig {
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            write_parameters: self.write_parameters,
            stub_bodies: self.stub_bodies,
            major_version: self.class_major_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of undecodable class files tolerated before the run fails; 0 disables the limit.
    pub max_decode_failures: usize,
    /// Number of partitions merged in parallel.
    pub shards: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_decode_failures: 0,
            shards: 1,
        }
    }
}

impl RunConfig {
    pub fn decode_failures_exceeded(&self, failures: usize) -> bool {
        self.max_decode_failures != 0 && failures > self.max_decode_failures
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level name or a full `EnvFilter` directive string.
    pub level: String,
    pub json: bool,
    pub stderr: bool,
    /// Append logs to this file as well. Ignored if it cannot be opened.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

const LEVEL_NAMES: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Bare level names are matched case-insensitively (`warning` means `warn`); anything else is
/// taken as directives.
fn normalize_level(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return "info".to_owned();
    }
    let lower = match level.to_ascii_lowercase() {
        name if name == "warning" => "warn".to_owned(),
        name => name,
    };
    if LEVEL_NAMES.contains(&lower.as_str()) {
        lower
    } else {
        level.to_owned()
    }
}

impl LoggingConfig {
    /// The effective filter: the configured level, extended by `RUST_LOG` when set.
    ///
    /// Falls back to `RUST_LOG` alone, then to the configured level alone, when the combined
    /// directives do not parse.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = normalize_level(&self.level);
        let from_env = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        from_env
            .map(|env| [format!("{configured},{env}"), env])
            .into_iter()
            .flatten()
            .chain(std::iter::once(configured))
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApisetConfig {
    pub merge: MergeConfig,
    pub output: OutputConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        let message = match err.span() {
            Some(span) => format!("{} (at byte {})", err.message(), span.start),
            None => err.message().to_owned(),
        };
        ConfigError::Toml(message)
    }
}

impl ApisetConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: ApisetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run.shards == 0 {
            return Err(ConfigError::Invalid {
                key: "run.shards",
                message: "must be at least 1".into(),
            });
        }
        if self.output.class_major_version < 45 {
            return Err(ConfigError::Invalid {
                key: "output.class_major_version",
                message: format!("{} is not a class file version", self.output.class_major_version),
            });
        }
        Ok(())
    }
}

/// Finds the config file for a run started in `working_dir`.
///
/// Search order:
/// 1) `APISET_CONFIG` (absolute or relative to `working_dir`)
/// 2) `apiset.toml` in `working_dir`
pub fn discover_config_path(working_dir: &Path) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(APISET_CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        return Some(if candidate.is_absolute() {
            candidate
        } else {
            working_dir.join(candidate)
        });
    }

    let path = working_dir.join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

/// Loads the configuration: `explicit` if given, otherwise whatever discovery finds, otherwise
/// the defaults. Also returns the path that was read.
pub fn load(
    explicit: Option<&Path>,
    working_dir: &Path,
) -> Result<(ApisetConfig, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config_path(working_dir),
    };
    let Some(path) = path else {
        return Ok((ApisetConfig::default(), None));
    };
    let config = ApisetConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(logging: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = logging.env_filter();

        let file = logging.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let file_failed = logging.file.is_some() && file.is_none();

        let mut make_writer = if logging.stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::sink)
        };
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(Mutex::<File>::new(file)));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_failed {
            if let Some(path) = logging.file.as_ref() {
                tracing::warn!(
                    target: "apiset.config",
                    path = %path.display(),
                    "failed to open log file; logging to the remaining sinks"
                );
            }
        }
    });
}
