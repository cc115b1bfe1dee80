use crate::cli::Cli;
use crate::field::FieldParser;
use crate::libxml2::LibXml2Wrapper;
use crate::namespace::ScopeOrder;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// One hundred years
pub const MAX_CACHE_TTL_HOURS: u64 = 100 * 365 * 24;
/// Longest time-to-live the in-memory cache accepts
pub const MAX_MEMORY_TTL_SECONDS: u64 = 365 * 24 * 3600;

static TYPE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_type_name_regex() -> &'static Regex {
    TYPE_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("Failed to compile type name regex")
    })
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, alias = "namespaceScope")]
    pub namespace_scope: ScopeOrder,
    /// Upper bound on sources loaded at once; defaults to the CPU count
    #[serde(default, alias = "maxConcurrentSources")]
    pub max_concurrent_sources: Option<usize>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// One XML document and the mappings applied to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Source {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

impl Source {
    /// A source without a url or without mappings is skipped
    pub fn is_usable(&self) -> bool {
        !self.url.is_empty() && !self.mappings.is_empty()
    }
}

/// Keep only usable sources, in their original order
pub fn filter_sources(sources: &[Source]) -> Vec<&Source> {
    sources.iter().filter(|source| source.is_usable()).collect()
}

/// How the items of one source become records of one type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub type_name: String,
    pub item_selector: String,
    #[serde(default)]
    pub item_props: IndexMap<String, FieldSpec>,
}

/// Extraction and typing rules for a single record field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Declared type; a trailing `!` marks the field required
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<Value>,
    #[serde(default)]
    pub parser: FieldParser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_directive: Option<String>,
}

/// Document cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether fetched documents are cached at all
    pub enabled: bool,
    /// Cache directory path
    pub directory: PathBuf,
    /// Time-to-live for cached documents in hours
    pub ttl_hours: u64,
    /// Maximum number of entries in memory cache
    pub max_memory_entries: u64,
    /// Memory cache TTL in seconds
    pub memory_ttl_seconds: u64,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed downloads
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("anyxml-source"),
            ttl_hours: 24,
            max_memory_entries: 1000,
            memory_ttl_seconds: 3600, // 1 hour
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = if let Some(config_path) = &cli.config {
            Self::load_from_file(config_path).await?
        } else {
            Self::find_config_file().await?.unwrap_or_default()
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "anyxml-source.toml",
            "anyxml-source.json",
            ".anyxml-source.toml",
            ".anyxml-source.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("anyxml-source");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(cache_dir) = env.get("ANYXML_CACHE_DIR") {
            config.cache.directory = PathBuf::from(cache_dir);
        }

        if let Some(cache_ttl) = env.get("ANYXML_CACHE_TTL") {
            config.cache.ttl_hours = parse_env("ANYXML_CACHE_TTL", &cache_ttl)?;
        }

        if let Some(timeout) = env.get("ANYXML_TIMEOUT") {
            config.network.timeout_seconds = parse_env("ANYXML_TIMEOUT", &timeout)?;
        }

        if let Some(retry_attempts) = env.get("ANYXML_RETRY_ATTEMPTS") {
            config.network.retry_attempts = parse_env("ANYXML_RETRY_ATTEMPTS", &retry_attempts)?;
        }

        if let Some(scope) = env.get("ANYXML_NAMESPACE_SCOPE") {
            config.namespace_scope = ScopeOrder::parse(&scope).ok_or_else(|| {
                ConfigError::Environment(format!("Invalid ANYXML_NAMESPACE_SCOPE value: {}", scope))
            })?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(cache_dir) = &cli.cache_dir {
            config.cache.directory = cache_dir.clone();
        }
        if let Some(ttl) = cli.cache_ttl {
            config.cache.ttl_hours = ttl;
        }
        if cli.no_cache {
            config.cache.enabled = false;
        }

        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }

        if let Some(scope) = cli.namespace_scope {
            config.namespace_scope = scope;
        }
        if cli.concurrency.is_some() {
            config.max_concurrent_sources = cli.concurrency;
        }

        config
    }

    /// Validate configuration values and every usable source's mappings
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(limit) = config.max_concurrent_sources {
            if limit == 0 {
                return Err(ConfigError::Validation(
                    "max_concurrent_sources must be greater than 0".to_string(),
                ));
            }
            if limit > 1000 {
                return Err(ConfigError::Validation(
                    "max_concurrent_sources cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.cache.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }
        if config.cache.ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "Cache TTL cannot exceed {} hours",
                MAX_CACHE_TTL_HOURS
            )));
        }
        if config.cache.memory_ttl_seconds > MAX_MEMORY_TTL_SECONDS {
            return Err(ConfigError::Validation(format!(
                "Memory cache TTL cannot exceed {} seconds",
                MAX_MEMORY_TTL_SECONDS
            )));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        let wrapper = LibXml2Wrapper::new();
        for source in filter_sources(&config.sources) {
            for mapping in &source.mappings {
                Self::validate_mapping(&wrapper, &source.url, mapping)?;
            }
        }

        Ok(())
    }

    fn validate_mapping(wrapper: &LibXml2Wrapper, url: &str, mapping: &Mapping) -> Result<()> {
        if !get_type_name_regex().is_match(&mapping.type_name) {
            return Err(ConfigError::Validation(format!(
                "source \"{}\": invalid type name \"{}\"",
                url, mapping.type_name
            )));
        }

        if mapping.item_selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source \"{}\": type {} has an empty item selector",
                url, mapping.type_name
            )));
        }

        wrapper
            .compile_expression(&mapping.item_selector)
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "source \"{}\": type {}: {}",
                    url, mapping.type_name, e
                ))
            })?;

        for (key, field) in &mapping.item_props {
            if field.schema_type.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source \"{}\": {}.{} has no schema type",
                    url, mapping.type_name, key
                )));
            }

            if let Some(selector) = field.selector.as_deref().filter(|s| !s.is_empty()) {
                wrapper.compile_expression(selector).map_err(|e| {
                    ConfigError::Validation(format!(
                        "source \"{}\": {}.{}: {}",
                        url, mapping.type_name, key, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Effective number of sources loaded at once
    pub fn get_concurrency(config: &Config) -> usize {
        config.max_concurrent_sources.unwrap_or_else(num_cpus::get)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    const FEED_TOML: &str = r#"
namespace_scope = "outermost"
max_concurrent_sources = 4

[[sources]]
url = "https://example.com/feed.xml"

[[sources.mappings]]
typeName = "Item"
itemSelector = "//item"

[sources.mappings.itemProps.title]
schemaType = "String!"
selector = "title"
parser = "trim"

[sources.mappings.itemProps.kind]
schemaType = "String"
static = "article"
schemaDirective = "@deprecated"

[sources.mappings.itemProps.link]
schemaType = "String"
selector = "link"

[cache]
directory = "/tmp/anyxml-cache"
ttl_hours = 48

[network]
timeout_seconds = 10
"#;

    fn mapping(type_name: &str, item_selector: &str) -> Mapping {
        Mapping {
            type_name: type_name.to_string(),
            item_selector: item_selector.to_string(),
            item_props: IndexMap::new(),
        }
    }

    fn source(url: &str, mappings: Vec<Mapping>) -> Source {
        Source {
            url: url.to_string(),
            mappings,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.sources.is_empty());
        assert_eq!(config.namespace_scope, ScopeOrder::NearestWins);
        assert_eq!(config.max_concurrent_sources, None);
        assert!(config.cache.enabled);
        assert!(
            config
                .cache
                .directory
                .to_string_lossy()
                .contains("anyxml-source")
        );
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.network.timeout_seconds, 30);
        assert_eq!(config.network.retry_attempts, 3);
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sources.toml");
        fs::write(&config_path, FEED_TOML).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.namespace_scope, ScopeOrder::OutermostWins);
        assert_eq!(config.max_concurrent_sources, Some(4));
        assert_eq!(config.sources.len(), 1);

        let mapping = &config.sources[0].mappings[0];
        assert_eq!(mapping.type_name, "Item");
        assert_eq!(mapping.item_selector, "//item");

        let keys: Vec<&str> = mapping.item_props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "kind", "link"]);

        let title = &mapping.item_props["title"];
        assert_eq!(title.schema_type, "String!");
        assert_eq!(title.parser, FieldParser::Trim);

        let kind = &mapping.item_props["kind"];
        assert_eq!(kind.static_value, Some(json!("article")));
        assert_eq!(kind.schema_directive.as_deref(), Some("@deprecated"));
        assert_eq!(kind.parser, FieldParser::Identity);

        assert_eq!(config.cache.directory, PathBuf::from("/tmp/anyxml-cache"));
        assert_eq!(config.cache.ttl_hours, 48);
        // Unset keys keep their defaults
        assert_eq!(config.cache.max_memory_entries, 1000);
        assert_eq!(config.network.timeout_seconds, 10);
        assert_eq!(config.network.retry_attempts, 3);
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sources.json");

        let json_content = r#"{
  "namespaceScope": "nearest",
  "sources": [
    {
      "url": "https://example.com/people.xml",
      "mappings": [
        {
          "typeName": "Person",
          "itemSelector": "//person",
          "itemProps": {
            "name": { "schemaType": "String!", "selector": "@name" },
            "age": { "schemaType": "Int", "selector": "age" },
            "active": { "schemaType": "Boolean", "static": true }
          }
        }
      ]
    }
  ]
}"#;
        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        let props = &config.sources[0].mappings[0].item_props;

        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age", "active"]);
        assert_eq!(props["name"].selector.as_deref(), Some("@name"));
        assert_eq!(props["active"].static_value, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_unknown_parser_fails_deserialization() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sources.json");
        fs::write(
            &config_path,
            r#"{"sources":[{"url":"u","mappings":[{"typeName":"A","itemSelector":"//a",
               "itemProps":{"x":{"schemaType":"String","parser":"reverse"}}}]}]}"#,
        )
        .unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::JsonParsing(_))));
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "invalid: yaml").unwrap();

        match ConfigManager::load_from_file(&config_path).await.unwrap_err() {
            ConfigError::UnsupportedFormat(ext) => assert_eq!(ext, "yaml"),
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid toml [[[").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result.unwrap_err(), ConfigError::TomlParsing(_)));
    }

    #[test]
    fn test_filter_sources_preserves_order() {
        let sources = vec![
            source("a", vec![mapping("A", "//a")]),
            source("", vec![mapping("B", "//b")]),
            source("c", vec![]),
            source("d", vec![mapping("D", "//d")]),
        ];

        let kept: Vec<&str> = filter_sources(&sources)
            .into_iter()
            .map(|s| s.url.as_str())
            .collect();
        assert_eq!(kept, vec!["a", "d"]);
    }

    #[test]
    fn test_filter_sources_empty() {
        assert!(filter_sources(&[]).is_empty());
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("ANYXML_CACHE_DIR", "/env/cache");
        mock_env.set("ANYXML_CACHE_TTL", "72");
        mock_env.set("ANYXML_TIMEOUT", "120");
        mock_env.set("ANYXML_RETRY_ATTEMPTS", "1");
        mock_env.set("ANYXML_NAMESPACE_SCOPE", "outermost");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, Config::default()).unwrap();

        assert_eq!(config.cache.directory, PathBuf::from("/env/cache"));
        assert_eq!(config.cache.ttl_hours, 72);
        assert_eq!(config.network.timeout_seconds, 120);
        assert_eq!(config.network.retry_attempts, 1);
        assert_eq!(config.namespace_scope, ScopeOrder::OutermostWins);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("ANYXML_TIMEOUT", "soon");

        let result = ConfigManager::apply_environment_overrides_with(&mock_env, Config::default());
        assert!(matches!(result.unwrap_err(), ConfigError::Environment(_)));

        let mut mock_env = MockEnvProvider::default();
        mock_env.set("ANYXML_NAMESPACE_SCOPE", "sideways");
        let result = ConfigManager::apply_environment_overrides_with(&mock_env, Config::default());
        assert!(matches!(result.unwrap_err(), ConfigError::Environment(_)));
    }

    #[test]
    fn test_merge_with_cli() {
        use clap::Parser;

        let cli = Cli::try_parse_from([
            "anyxml-source",
            "--cache-ttl",
            "36",
            "--timeout",
            "90",
            "--namespace-scope",
            "outermost",
            "--no-cache",
            "-j",
            "3",
        ])
        .unwrap();

        let config = ConfigManager::merge_with_cli(Config::default(), &cli);

        assert_eq!(config.cache.ttl_hours, 36);
        assert!(!config.cache.enabled);
        assert_eq!(config.network.timeout_seconds, 90);
        assert_eq!(config.namespace_scope, ScopeOrder::OutermostWins);
        assert_eq!(config.max_concurrent_sources, Some(3));
        // Untouched settings survive
        assert_eq!(config.network.retry_attempts, 3);
    }

    #[test]
    fn test_config_validation_limits() {
        let mut config = Config::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.max_concurrent_sources = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.max_concurrent_sources = None;

        config.cache.ttl_hours = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.cache.ttl_hours = 24;

        config.network.timeout_seconds = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.network.timeout_seconds = 30;

        config.network.retry_attempts = 11;
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_cache_ttl_upper_bounds() {
        let mut config = Config::default();

        config.cache.ttl_hours = MAX_CACHE_TTL_HOURS;
        assert!(ConfigManager::validate_config(&config).is_ok());
        config.cache.ttl_hours = u64::MAX;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Validation(ref msg)) if msg.contains("Cache TTL")
        ));
        config.cache.ttl_hours = 24;

        config.cache.memory_ttl_seconds = MAX_MEMORY_TTL_SECONDS + 1;
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_config_validation_mappings() {
        let mut config = Config {
            sources: vec![source("u", vec![mapping("Item", "//item")])],
            ..Config::default()
        };
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.sources[0].mappings[0].type_name = "1Item".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());

        config.sources[0].mappings[0].type_name = "Item".to_string();
        config.sources[0].mappings[0].item_selector = "//item[".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());

        config.sources[0].mappings[0].item_selector = "//item".to_string();
        config.sources[0].mappings[0].item_props.insert(
            "title".to_string(),
            FieldSpec {
                schema_type: String::new(),
                ..FieldSpec::default()
            },
        );
        assert!(ConfigManager::validate_config(&config).is_err());

        config.sources[0].mappings[0].item_props["title"] = FieldSpec {
            schema_type: "String".to_string(),
            selector: Some("title[".to_string()),
            ..FieldSpec::default()
        };
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_filtered_sources_are_not_validated() {
        let config = Config {
            sources: vec![source("", vec![mapping("not a type", "")])],
            ..Config::default()
        };
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_concurrency_defaults_to_cpu_count() {
        let mut config = Config::default();
        assert_eq!(ConfigManager::get_concurrency(&config), num_cpus::get());

        config.max_concurrent_sources = Some(3);
        assert_eq!(ConfigManager::get_concurrency(&config), 3);
    }

    #[tokio::test]
    async fn test_load_config_integration() {
        use clap::Parser;

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sources.toml");
        fs::write(&config_path, FEED_TOML).unwrap();

        let cli = Cli::try_parse_from([
            "anyxml-source",
            "--config",
            config_path.to_str().unwrap(),
            "--timeout",
            "5",
        ])
        .unwrap();
        let config = ConfigManager::load_config(&cli).await.unwrap();

        assert_eq!(config.network.timeout_seconds, 5);
        assert_eq!(config.cache.ttl_hours, 48);
        assert_eq!(config.sources.len(), 1);
    }
}
