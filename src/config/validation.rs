use crate::config::types::{
    ArchiveConfig, Config, CrawlerConfig, EndpointConfig, UserAgentConfig, ID_PLACEHOLDER,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_archive_config(&config.archive)?;
    validate_endpoints(&config.endpoints)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.parallel_workers < 1 || config.parallel_workers > 256 {
        return Err(ConfigError::Validation(format!(
            "parallel_workers must be between 1 and 256, got {}",
            config.parallel_workers
        )));
    }

    if config.request_timeout < 1 || config.request_timeout > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be between 1 and 300 seconds, got {}",
            config.request_timeout
        )));
    }

    if config.pacing_min_delay > config.pacing_max_delay {
        return Err(ConfigError::Validation(format!(
            "pacing_min_delay ({}ms) must not exceed pacing_max_delay ({}ms)",
            config.pacing_min_delay, config.pacing_max_delay
        )));
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

/// Validates the archive location
fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "archive root cannot be empty".to_string(),
        ));
    }

    if let Some(roster) = &config.forum_roster {
        if roster.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "forum_roster cannot be an empty path".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates endpoint templates
fn validate_endpoints(endpoints: &EndpointConfig) -> Result<(), ConfigError> {
    for (name, template) in [
        ("overview", &endpoints.overview),
        ("package", &endpoints.package),
    ] {
        if !template.contains(ID_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "{} endpoint must contain the {} placeholder",
                name, ID_PLACEHOLDER
            )));
        }
    }

    for (name, template) in [
        ("sitemap", &endpoints.sitemap),
        ("overview", &endpoints.overview),
        ("package", &endpoints.package),
        ("reviews", &endpoints.reviews),
        ("support", &endpoints.support),
    ] {
        let rendered = template.replace(ID_PLACEHOLDER, &"a".repeat(crate::state::ID_LENGTH));
        Url::parse(&rendered).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid {} endpoint '{}': {}", name, template, e))
        })?;
    }

    Ok(())
}

/// Validates an email address (basic validation)
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "contact_email must contain '@', got '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "contact_email is malformed: '{}'",
            email
        )));
    }

    Ok(())
}
