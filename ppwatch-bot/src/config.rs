//! Configuration loading for the ppwatch bot.
//!
//! The config file is JSON. Filter rules are compiled at load time so an
//! invalid pattern is rejected before the bot connects anywhere.

use podcast_index::PodcastIndexClient;
use ppwatch_core::processors::{DEFAULT_HIVE_NODES, DEFAULT_MESSAGE_FORMAT, DEFAULT_POLL_INTERVAL};
use ppwatch_core::rules::{RuleError, RuleSet, RuleSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Root configuration structure as read from the JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub irc: IrcConfig,

    #[serde(default)]
    pub hive: HiveConfig,

    #[serde(default)]
    pub podcast_index: PodcastIndexConfig,

    /// Channel name to filter rules. Rules without a `type` are exact.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<RuleSpec>>,

    #[serde(default)]
    pub message: MessageConfig,

    /// Command word the bot answers to (`!<command_name>` in channels).
    #[serde(default = "default_command_name")]
    pub command_name: String,

    /// Master switch for subscribe/unsubscribe over IRC. Default deny.
    #[serde(default)]
    pub allow_runtime_subscriptions: bool,

    /// Nicks allowed to manage subscriptions at runtime.
    #[serde(default)]
    pub authorized_users: Vec<String>,

    /// Upper bound for metadata lookups and feed fetches, in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Whether live/liveEnd podpings trigger feed verification.
    #[serde(default = "default_true")]
    pub verify_live_status: bool,
}

/// IRC connection section.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    #[serde(default = "default_irc_host")]
    pub host: String,

    #[serde(default = "default_irc_port")]
    pub port: u16,

    #[serde(default = "default_irc_nick")]
    pub nick: String,

    #[serde(default = "default_irc_user")]
    pub user: String,

    #[serde(default = "default_irc_realname")]
    pub realname: String,

    /// Connect over TLS.
    #[serde(default)]
    pub secure: bool,

    /// When set, the bot identifies with NickServ after connecting.
    #[serde(default)]
    pub nickserv_password: Option<String>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: default_irc_host(),
            port: default_irc_port(),
            nick: default_irc_nick(),
            user: default_irc_user(),
            realname: default_irc_realname(),
            secure: false,
            nickserv_password: None,
        }
    }
}

/// Hive node section.
#[derive(Debug, Clone, Deserialize)]
pub struct HiveConfig {
    /// JSON-RPC endpoints, tried in order with rotation on failure.
    #[serde(default = "default_hive_nodes")]
    pub nodes: Vec<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            nodes: default_hive_nodes(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Podcast Index API credentials. Both keys empty disables enrichment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodcastIndexConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Override for testing against a mock API.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Outcome of turning the `podcast_index` section into a client.
pub enum MetadataSetup {
    Configured(PodcastIndexClient),
    /// Credentials missing; enrichment is off.
    Disabled,
    Invalid(podcast_index::Error),
}

impl PodcastIndexConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Build the metadata client this section describes.
    pub fn metadata_client(&self) -> MetadataSetup {
        if !self.is_configured() {
            return MetadataSetup::Disabled;
        }
        let client = match &self.base_url {
            Some(base) => match Url::parse(base) {
                Ok(base) => Ok(PodcastIndexClient::with_base_url(
                    base,
                    self.api_key.clone(),
                    self.api_secret.clone(),
                )),
                Err(e) => Err(podcast_index::Error::Url(e)),
            },
            None => PodcastIndexClient::new(self.api_key.clone(), self.api_secret.clone()),
        };
        match client {
            Ok(client) => MetadataSetup::Configured(client),
            Err(e) => MetadataSetup::Invalid(e),
        }
    }
}

/// Announcement formatting section.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageConfig {
    /// Template with `{title}`, `{url}`, `{reason}`, `{trx_id}` placeholders.
    #[serde(default = "default_message_format")]
    pub format: String,

    /// Pause between consecutive IRC messages, for flood protection.
    #[serde(default = "default_message_delay_ms")]
    pub delay_ms: u64,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            format: default_message_format(),
            delay_ms: default_message_delay_ms(),
        }
    }
}

fn default_command_name() -> String {
    "ppwatch".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_irc_host() -> String {
    "irc.libera.chat".to_string()
}

fn default_irc_port() -> u16 {
    6667
}

fn default_irc_nick() -> String {
    "podping-bot".to_string()
}

fn default_irc_user() -> String {
    "podping".to_string()
}

fn default_irc_realname() -> String {
    "Podping RSS Update Bot".to_string()
}

fn default_hive_nodes() -> Vec<String> {
    DEFAULT_HIVE_NODES.iter().map(|s| s.to_string()).collect()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_message_format() -> String {
    DEFAULT_MESSAGE_FORMAT.to_string()
}

fn default_message_delay_ms() -> u64 {
    1000
}

/// Loaded configuration with the filter rules already compiled.
#[derive(Debug)]
pub struct LoadedConfig {
    pub file: FileConfig,
    pub rules: RuleSet,
}

/// Configuration loader, kept around for SIGHUP reloads.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the JSON file
    /// 2. Validate the configuration
    /// 3. Compile the filter rules
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = serde_json::from_str(&config_content)?;

        self.validate(&file_config)?;

        let rules = RuleSet::compile(&file_config.filters)?;

        Ok(LoadedConfig {
            file: file_config,
            rules,
        })
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.irc.host.is_empty() {
            return Err(ConfigError::Validation("irc.host must not be empty".into()));
        }
        if config.irc.nick.is_empty() {
            return Err(ConfigError::Validation("irc.nick must not be empty".into()));
        }
        if config.command_name.is_empty() {
            return Err(ConfigError::Validation(
                "command_name must not be empty".into(),
            ));
        }
        for channel in config.filters.keys() {
            if !channel.starts_with('#') {
                return Err(ConfigError::Validation(format!(
                    "filter key {channel} is not a channel name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"{
        "irc": {
            "host": "irc.example.org",
            "port": 6697,
            "nick": "ppwatch",
            "secure": true,
            "nickserv_password": "hunter2"
        },
        "podcast_index": {
            "api_key": "key",
            "api_secret": "secret"
        },
        "filters": {
            "#podcasts": [
                {"pattern": "https://example.com/feed.xml"},
                {"pattern": "*.example.org/*", "type": "wildcard"}
            ],
            "#live": [
                {"pattern": "^https://live\\.example\\.com/", "type": "regex"}
            ]
        },
        "message": {"delay_ms": 500},
        "allow_runtime_subscriptions": true,
        "authorized_users": ["alice"]
    }"##;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn sample_config_loads_and_compiles() {
        let file = write_config(SAMPLE);
        let loaded = ConfigLoader::new(file.path()).load().unwrap();

        assert_eq!(loaded.file.irc.host, "irc.example.org");
        assert_eq!(loaded.file.irc.port, 6697);
        assert!(loaded.file.irc.secure);
        assert!(loaded.file.podcast_index.is_configured());
        assert_eq!(loaded.file.message.delay_ms, 500);
        assert_eq!(loaded.file.message.format, DEFAULT_MESSAGE_FORMAT);
        assert!(loaded.file.allow_runtime_subscriptions);
        assert_eq!(loaded.rules.len(), 2);
        assert_eq!(
            loaded.rules.matches("https://example.com/feed.xml"),
            vec!["#podcasts"]
        );
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let file = write_config("{}");
        let loaded = ConfigLoader::new(file.path()).load().unwrap();

        assert_eq!(loaded.file.irc.host, "irc.libera.chat");
        assert_eq!(loaded.file.irc.port, 6667);
        assert_eq!(loaded.file.command_name, "ppwatch");
        assert!(!loaded.file.allow_runtime_subscriptions);
        assert!(loaded.file.verify_live_status);
        assert_eq!(loaded.file.api_timeout_secs, 10);
        assert!(!loaded.file.podcast_index.is_configured());
        assert!(loaded.rules.is_empty());
        assert_eq!(loaded.file.hive.nodes, default_hive_nodes());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ConfigLoader::new("/nonexistent/ppwatch.json")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let file = write_config("{ not json");
        let err = ConfigLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_regex_is_rejected_at_load() {
        let file = write_config(
            r##"{"filters": {"#pods": [{"pattern": "[unclosed", "type": "regex"}]}}"##,
        );
        let err = ConfigLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Rule(_)));
    }

    #[test]
    fn metadata_setup_covers_all_outcomes() {
        let disabled = PodcastIndexConfig::default();
        assert!(matches!(disabled.metadata_client(), MetadataSetup::Disabled));

        let invalid = PodcastIndexConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            base_url: Some("not a url".to_string()),
        };
        assert!(matches!(
            invalid.metadata_client(),
            MetadataSetup::Invalid(_)
        ));

        let configured = PodcastIndexConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            base_url: None,
        };
        assert!(matches!(
            configured.metadata_client(),
            MetadataSetup::Configured(_)
        ));
    }

    #[test]
    fn non_channel_filter_key_is_rejected() {
        let file = write_config(r#"{"filters": {"pods": []}}"#);
        let err = ConfigLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
