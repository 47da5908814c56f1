use crate::config::types::{Config, CrawlerConfig, LayoutConfig, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_source_config(&config.source)?;
    validate_layout_config(&config.layout)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the list and detail URL templates
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    validate_template("list_url_template", &config.list_url_template, "{page}")?;
    validate_template("detail_url_template", &config.detail_url_template, "{id}")?;

    if config.id_query_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "id_query_param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// A template must carry its placeholder and yield an http(s) URL once filled
fn validate_template(name: &str, template: &str, placeholder: &str) -> Result<(), ConfigError> {
    if !template.contains(placeholder) {
        return Err(ConfigError::Validation(format!(
            "{} must contain the '{}' placeholder, got '{}'",
            name, placeholder, template
        )));
    }

    let sample = template.replace(placeholder, "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            name, template
        )));
    }

    Ok(())
}

/// Summary columns and the link column must not collide
fn validate_layout_config(config: &LayoutConfig) -> Result<(), ConfigError> {
    if config
        .list_summary_columns
        .contains(&config.list_link_column)
    {
        return Err(ConfigError::Validation(format!(
            "list_link_column {} overlaps list_summary_columns {:?}",
            config.list_link_column, config.list_summary_columns
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.catalog_ledger_path.is_empty() || config.detail_ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger paths cannot be empty".to_string(),
        ));
    }

    if config.catalog_ledger_path == config.detail_ledger_path {
        return Err(ConfigError::Validation(format!(
            "catalog and detail stages must use separate ledgers, both are '{}'",
            config.catalog_ledger_path
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
