//! Reading harvest configuration files
//!
//! A config is parsed and validated from the file's text, and the SHA-256 of
//! that same text is what run rows record as their config hash.

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates configuration text
///
/// ```
/// use catalog_harvest::config::parse_config;
///
/// let config = parse_config(r#"
///     [user-agent]
///     crawler-name = "CatalogHarvest"
///     crawler-version = "1.0"
///     contact-url = "https://example.com/about"
///     contact-email = "admin@example.com"
///
///     [source]
///     list-url-template = "https://example.com/list/{page}.html"
///     detail-url-template = "https://example.com/detail?ID={id}"
///
///     [output]
///     database-path = "harvest.db"
/// "#).unwrap();
/// assert_eq!(config.layout.list_table_index, 21);
/// ```
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 of configuration text
pub fn hash_config_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads, parses and validates the config file at `path`
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hash of the config file at `path`, as recorded on run rows
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(hash_config_content(&std::fs::read_to_string(path)?))
}

/// Loads the config at `path` together with its hash
///
/// The file is read once, so the hash always describes the text that was
/// parsed even if the file changes underneath.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config_content(&content)))
}
