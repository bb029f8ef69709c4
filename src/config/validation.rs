//! Configuration validation.
//!
//! # Responsibilities
//! - Validate value ranges (port, attempt ceiling)
//! - Check header names and values are legal HTTP
//! - Check the proxy target is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is opened

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{ServerConfig, TlsMode};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(u32),

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("invalid proxy target '{target}': {reason}")]
    InvalidProxy { target: String, reason: String },

    #[error("max_port_attempts must be at least 1")]
    NoPortAttempts,

    #[error("TLS key and certificate paths must both be set")]
    IncompleteTlsFiles,
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::PortOutOfRange(0));
    }

    if config.max_port_attempts == 0 {
        errors.push(ValidationError::NoPortAttempts);
    }

    for (name, value) in &config.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue(name.clone()));
        }
    }

    if let Some(target) = &config.proxy {
        if let Err(reason) = check_proxy_target(target) {
            errors.push(ValidationError::InvalidProxy {
                target: target.clone(),
                reason,
            });
        }
    }

    if let TlsMode::Files { key_path, cert_path } = &config.tls {
        if key_path.as_os_str().is_empty() || cert_path.as_os_str().is_empty() {
            errors.push(ValidationError::IncompleteTlsFiles);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_proxy_target(target: &str) -> Result<(), String> {
    let url = url::Url::parse(target).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
