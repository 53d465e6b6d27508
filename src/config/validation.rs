use crate::config::types::{Config, CrawlerConfig, InstitutionEntry, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_institutions(&config.institutions)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if config.idle_backoff_ms < 10 || config.idle_backoff_ms > 3000 {
        return Err(ConfigError::Validation(format!(
            "idle_backoff_ms must be between 10 and 3000, got {}ms",
            config.idle_backoff_ms
        )));
    }

    if !(0.0..=1.0).contains(&config.match_threshold) {
        return Err(ConfigError::Validation(format!(
            "match_threshold must be between 0.0 and 1.0, got {}",
            config.match_threshold
        )));
    }

    if config.job_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "job_timeout_secs must be > 0 when set".to_string(),
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

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates institution entries
fn validate_institutions(institutions: &[InstitutionEntry]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();

    for entry in institutions {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "institution id cannot be empty".to_string(),
            ));
        }

        if !ids.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "institution id '{}' is defined more than once",
                entry.id
            )));
        }

        let url = Url::parse(&entry.start_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", entry.start_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Start URL '{}' must use http or https",
                entry.start_url
            )));
        }

        if entry.course_selectors.is_empty()
            || entry.course_selectors.iter().any(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "Institution '{}' needs a non-empty list of non-empty course selectors",
                entry.id
            )));
        }

        if entry.max_records < 1 {
            return Err(ConfigError::Validation(format!(
                "Institution '{}': max_records must be >= 1",
                entry.id
            )));
        }

        if entry.schema_path.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Institution '{}': schema_path cannot be empty",
                entry.id
            )));
        }
    }

    Ok(())
}

/// Performs basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email address: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email address: '{}'",
            email
        )));
    }

    Ok(())
}
