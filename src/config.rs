//! Configuration resolution for the dump tool.
//!
//! Values come from three places, in increasing precedence: an optional
//! TOML config file, `KAFKA_DUMP_*` environment variables, and command-line
//! flags. `Config::resolve` merges them, applies defaults, and validates
//! the result before a session is allowed to start.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tracing::info;

/// Default consumer group and client ID base.
const DEFAULT_ID: &str = "kafka-dump";
/// Protocol version assumed when the brokers predate API version requests.
const DEFAULT_KAFKA_VERSION: &str = "0.10.2.0";
/// Default root of the dump tree.
const DEFAULT_OUTPUT_DIR: &str = "OUTPUT_DATA";

/// Command-line arguments for `kafka-dump run`.
///
/// Fields are optional at parse time so that values may also come from the
/// config file; [`Config::resolve`] applies precedence and validation.
#[derive(Parser, Debug, Clone)]
pub struct DumpArgs {
    /// Path to a TOML config file (flags and env vars override its values)
    #[arg(long, env = "KAFKA_DUMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Kafka broker addresses, comma-separated
    #[arg(long, value_delimiter = ',', env = "KAFKA_DUMP_BROKERS")]
    pub brokers: Vec<String>,

    /// Topics to dump, comma-separated
    #[arg(long, value_delimiter = ',', env = "KAFKA_DUMP_TOPICS")]
    pub topics: Vec<String>,

    /// Consumer group ID
    #[arg(long, env = "KAFKA_DUMP_GROUP_ID")]
    pub group_id: Option<String>,

    /// Client ID reported to the brokers (the machine hostname is appended)
    #[arg(long, env = "KAFKA_DUMP_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Kafka protocol version to assume for old brokers, e.g. "0.10.2.0"
    #[arg(long, env = "KAFKA_DUMP_KAFKA_VERSION")]
    pub kafka_version: Option<String>,

    /// Directory the dump tree is written under
    #[arg(long, env = "KAFKA_DUMP_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Clear the output directory and re-read the topics from the beginning
    /// under fresh group/client IDs
    #[arg(long)]
    pub overwrite: bool,

    /// Dump only messages produced after the session starts
    #[arg(long)]
    pub newest: bool,
}

/// Config-file counterpart of [`DumpArgs`].
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub brokers: Vec<String>,
    pub topics: Vec<String>,
    pub group_id: Option<String>,
    pub client_id: Option<String>,
    pub kafka_version: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub overwrite: Option<bool>,
    pub newest: Option<bool>,
}

impl FileConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Fully resolved session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub brokers: Vec<String>,
    pub topics: Vec<String>,
    pub group_id: String,
    pub client_id: String,
    pub kafka_version: String,
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub newest: bool,
}

impl Config {
    /// Resolve the session configuration from flags, env vars, and the
    /// config file.
    ///
    /// An explicitly passed `--config` file must exist; the default path
    /// (`~/.config/kafka-dump/config.toml`) is consulted only when present.
    pub fn resolve(args: DumpArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => {
                info!("Using config file {}", path.display());
                FileConfig::load(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    info!("Using config file {}", path.display());
                    FileConfig::load(&path)?
                }
                _ => FileConfig::default(),
            },
        };
        Self::merge(args, file)
    }

    fn merge(args: DumpArgs, file: FileConfig) -> anyhow::Result<Self> {
        let brokers = if args.brokers.is_empty() {
            file.brokers
        } else {
            args.brokers
        };
        let topics = if args.topics.is_empty() {
            file.topics
        } else {
            args.topics
        };
        let group_id = args
            .group_id
            .or(file.group_id)
            .unwrap_or_else(|| DEFAULT_ID.to_string());
        let client_id = args
            .client_id
            .or(file.client_id)
            .unwrap_or_else(|| DEFAULT_ID.to_string());
        let kafka_version = args
            .kafka_version
            .or(file.kafka_version)
            .unwrap_or_else(|| DEFAULT_KAFKA_VERSION.to_string());
        let output_dir = args
            .output_dir
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let overwrite = args.overwrite || file.overwrite.unwrap_or(false);
        let newest = args.newest || file.newest.unwrap_or(false);

        if brokers.is_empty() {
            bail!(
                "No Kafka brokers configured: pass --brokers, set KAFKA_DUMP_BROKERS, \
                 or list them in the config file"
            );
        }
        if topics.is_empty() {
            bail!(
                "No topics configured: pass --topics, set KAFKA_DUMP_TOPICS, \
                 or list them in the config file"
            );
        }
        validate_kafka_version(&kafka_version)?;

        let mut config = Self {
            brokers,
            topics,
            group_id,
            client_id: append_host_suffix(&client_id),
            kafka_version,
            output_dir,
            overwrite,
            newest,
        };

        if config.overwrite {
            // Fresh IDs: a group nobody has committed offsets for re-reads
            // every retained message instead of resuming.
            let stamp = Utc::now().format("%H%M%S");
            config.group_id = format!("{}-{stamp}", config.group_id);
            config.client_id = format!("{}-{stamp}", config.client_id);
        }

        Ok(config)
    }

    /// Remove previously dumped data when overwrite is enabled.
    pub fn reset_output_dir(&self) -> anyhow::Result<()> {
        if self.overwrite && self.output_dir.exists() {
            info!(
                "Overwrite requested, removing {}",
                self.output_dir.display()
            );
            std::fs::remove_dir_all(&self.output_dir).with_context(|| {
                format!(
                    "Failed to remove output directory {}",
                    self.output_dir.display()
                )
            })?;
        }
        Ok(())
    }
}

/// Append the machine hostname so concurrent instances can be told apart in
/// broker logs. Falls back to a time stamp when the hostname is unavailable.
fn append_host_suffix(client_id: &str) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| Utc::now().format("%H%M%S").to_string());
    format!("{client_id}-{host}")
}

/// A protocol version is 2 to 4 dot-separated integers, e.g. "0.10.2.0".
fn validate_kafka_version(version: &str) -> anyhow::Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    let numeric = parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !(2..=4).contains(&parts.len()) || !numeric {
        bail!(
            "Invalid Kafka protocol version {version:?}: expected 2-4 dot-separated \
             integers such as \"0.10.2.0\""
        );
    }
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("kafka-dump")
            .join("config.toml")
    })
}

/// Starter config written by `kafka-dump init-config`.
const STARTER_CONFIG: &str = r#"# kafka-dump configuration.
# Command-line flags and KAFKA_DUMP_* environment variables override
# anything set here.

brokers = ["localhost:9092"]
topics = ["topic-one", "topic-two"]
group_id = "kafka-dump"
client_id = "kafka-dump"
kafka_version = "0.10.2.0"
output_dir = "OUTPUT_DATA"
overwrite = false
newest = false
"#;

/// Write a starter config file and return its path.
///
/// Refuses to touch an existing file so a populated config is never
/// clobbered.
pub fn init_config_file(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()
            .context("Cannot locate the default config directory: HOME is not set")?,
    };

    if path.exists() {
        bail!("Config file {} already exists", path.display());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }
    std::fs::write(&path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> DumpArgs {
        DumpArgs {
            config: None,
            brokers: vec!["localhost:9092".to_string()],
            topics: vec!["orders".to_string()],
            group_id: None,
            client_id: None,
            kafka_version: None,
            output_dir: None,
            overwrite: false,
            newest: false,
        }
    }

    #[test]
    fn test_merge_applies_defaults() {
        let config = Config::merge(args(), FileConfig::default()).unwrap();

        assert_eq!(config.brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(config.topics, vec!["orders".to_string()]);
        assert_eq!(config.group_id, "kafka-dump");
        assert!(config.client_id.starts_with("kafka-dump-"));
        assert_eq!(config.kafka_version, "0.10.2.0");
        assert_eq!(config.output_dir, PathBuf::from("OUTPUT_DATA"));
        assert!(!config.overwrite);
        assert!(!config.newest);
    }

    #[test]
    fn test_merge_prefers_flags_over_file() {
        let file = FileConfig {
            brokers: vec!["file-broker:9092".to_string()],
            topics: vec!["file-topic".to_string()],
            group_id: Some("file-group".to_string()),
            output_dir: Some(PathBuf::from("/file/dump")),
            ..FileConfig::default()
        };
        let flags = DumpArgs {
            group_id: Some("flag-group".to_string()),
            output_dir: Some(PathBuf::from("/flag/dump")),
            ..args()
        };

        let config = Config::merge(flags, file).unwrap();

        // Flags win where both are set; file values fill the gaps.
        assert_eq!(config.brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(config.group_id, "flag-group");
        assert_eq!(config.output_dir, PathBuf::from("/flag/dump"));
    }

    #[test]
    fn test_merge_takes_file_values_when_flags_absent() {
        let file = FileConfig {
            brokers: vec!["file-broker:9092".to_string()],
            topics: vec!["file-topic".to_string()],
            newest: Some(true),
            ..FileConfig::default()
        };
        let flags = DumpArgs {
            brokers: Vec::new(),
            topics: Vec::new(),
            ..args()
        };

        let config = Config::merge(flags, file).unwrap();

        assert_eq!(config.brokers, vec!["file-broker:9092".to_string()]);
        assert_eq!(config.topics, vec!["file-topic".to_string()]);
        assert!(config.newest);
    }

    #[test]
    fn test_merge_requires_brokers_and_topics() {
        let no_brokers = DumpArgs {
            brokers: Vec::new(),
            ..args()
        };
        assert!(Config::merge(no_brokers, FileConfig::default()).is_err());

        let no_topics = DumpArgs {
            topics: Vec::new(),
            ..args()
        };
        assert!(Config::merge(no_topics, FileConfig::default()).is_err());
    }

    #[test]
    fn test_merge_rejects_malformed_version() {
        let bad = DumpArgs {
            kafka_version: Some("banana".to_string()),
            ..args()
        };
        assert!(Config::merge(bad, FileConfig::default()).is_err());
    }

    #[test]
    fn test_validate_kafka_version() {
        assert!(validate_kafka_version("0.10.2.0").is_ok());
        assert!(validate_kafka_version("3.4").is_ok());
        assert!(validate_kafka_version("2.8.1").is_ok());

        assert!(validate_kafka_version("3").is_err());
        assert!(validate_kafka_version("1.2.3.4.5").is_err());
        assert!(validate_kafka_version("3..1").is_err());
        assert!(validate_kafka_version("3.x").is_err());
        assert!(validate_kafka_version("").is_err());
    }

    #[test]
    fn test_merge_overwrite_uniquifies_ids() {
        let config = Config::merge(
            DumpArgs {
                group_id: Some("dump-group".to_string()),
                overwrite: true,
                ..args()
            },
            FileConfig::default(),
        )
        .unwrap();

        assert!(config.overwrite);
        assert!(config.group_id.starts_with("dump-group-"));
        assert_ne!(config.group_id, "dump-group");
    }

    #[test]
    fn test_merge_keeps_group_id_without_overwrite() {
        let config = Config::merge(
            DumpArgs {
                group_id: Some("dump-group".to_string()),
                ..args()
            },
            FileConfig::default(),
        )
        .unwrap();

        assert_eq!(config.group_id, "dump-group");
    }

    #[test]
    fn test_cli_parses_delimited_lists() {
        let parsed = DumpArgs::try_parse_from([
            "kafka-dump",
            "--brokers",
            "a:9092,b:9092",
            "--topics",
            "orders,audit",
            "--overwrite",
        ])
        .unwrap();

        assert_eq!(
            parsed.brokers,
            vec!["a:9092".to_string(), "b:9092".to_string()]
        );
        assert_eq!(
            parsed.topics,
            vec!["orders".to_string(), "audit".to_string()]
        );
        assert!(parsed.overwrite);
        assert!(!parsed.newest);
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "brokers = [\"localhost:9092\"]\nbogus = true\n").unwrap();

        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_reset_output_dir_honors_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dump");
        std::fs::create_dir_all(output.join("orders")).unwrap();
        std::fs::write(output.join("orders").join("stale.txt"), b"old").unwrap();

        let mut config = Config::merge(
            DumpArgs {
                output_dir: Some(output.clone()),
                ..args()
            },
            FileConfig::default(),
        )
        .unwrap();

        config.reset_output_dir().unwrap();
        assert!(output.exists());

        config.overwrite = true;
        config.reset_output_dir().unwrap();
        assert!(!output.exists());
    }

    #[test]
    fn test_init_config_round_trips_and_refuses_clobber() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = init_config_file(Some(path.clone())).unwrap();
        assert_eq!(written, path);

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(file.group_id.as_deref(), Some("kafka-dump"));
        assert_eq!(file.overwrite, Some(false));

        assert!(init_config_file(Some(path)).is_err());
    }
}
