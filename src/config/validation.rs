use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("notifications.webhook_url must be http(s), got '{url}'")]
    InvalidWebhookUrl { url: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_distribution(config)?;
    validate_notifications(config)?;
    validate_export(config)?;
    validate_telemetry(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_batch_size == 0 {
        return Err(ValidationError::MustBePositive {
            field: "server.max_batch_size",
        });
    }
    if config.server.max_concurrent_requests == 0 {
        return Err(ValidationError::MustBePositive {
            field: "server.max_concurrent_requests",
        });
    }
    Ok(())
}

fn validate_distribution(config: &Config) -> Result<(), ValidationError> {
    if config.distribution.max_conflict_retries == 0 {
        return Err(ValidationError::MustBePositive {
            field: "distribution.max_conflict_retries",
        });
    }
    Ok(())
}

fn validate_notifications(config: &Config) -> Result<(), ValidationError> {
    let notifications = &config.notifications;
    if notifications.channel_size == 0 {
        return Err(ValidationError::MustBePositive {
            field: "notifications.channel_size",
        });
    }
    if notifications.max_attempts == 0 {
        return Err(ValidationError::MustBePositive {
            field: "notifications.max_attempts",
        });
    }
    if let Some(url) = &notifications.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidWebhookUrl { url: url.clone() });
        }
    }
    Ok(())
}

fn validate_export(config: &Config) -> Result<(), ValidationError> {
    if config.export.bucket.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: "export.bucket",
        });
    }
    Ok(())
}

fn validate_telemetry(config: &Config) -> Result<(), ValidationError> {
    if config.telemetry.log_level.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: "telemetry.log_level",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = Config::default();
        config.server.max_batch_size = 0;

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::MustBePositive {
                field: "server.max_batch_size"
            })
        ));
    }

    #[test]
    fn test_zero_retries() {
        let mut config = Config::default();
        config.distribution.max_conflict_retries = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_channel_and_attempts() {
        let mut config = Config::default();
        config.notifications.channel_size = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.notifications.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_webhook_url() {
        let mut config = Config::default();
        config.notifications.webhook_url = Some("ftp://push".to_string());
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidWebhookUrl { .. })
        ));
    }

    #[test]
    fn test_empty_bucket_and_log_level() {
        let mut config = Config::default();
        config.export.bucket = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::Empty {
                field: "export.bucket"
            })
        ));

        let mut config = Config::default();
        config.telemetry.log_level = String::new();
        assert!(validate(&config).is_err());
    }
}
