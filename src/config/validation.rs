//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.addresses must not be empty")]
    NoAddresses,

    #[error("listener.addresses[{0}] is blank")]
    BlankAddress(usize),

    #[error("listener.socket.backlog must be greater than zero")]
    ZeroBacklog,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.addresses.is_empty() {
        errors.push(ValidationError::NoAddresses);
    }
    for (index, addr) in config.listener.addresses.iter().enumerate() {
        if addr.trim().is_empty() {
            errors.push(ValidationError::BlankAddress(index));
        }
    }

    if config.listener.socket.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.addresses = vec!["127.0.0.1:0".into(), "  ".into()];
        config.listener.socket.backlog = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::BlankAddress(1),
                ValidationError::ZeroBacklog,
                ValidationError::InvalidMetricsAddress("nowhere".into()),
            ])
        );
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}
