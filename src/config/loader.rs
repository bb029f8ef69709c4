//! Configuration assembly from command-line arguments.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::cli::CliArgs;
use crate::config::schema::{ServerConfig, TlsMode, DEFAULT_MAX_PORT_ATTEMPTS};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("headers must be a valid JSON object string: {0}")]
    InvalidHeaders(String),

    #[error("cannot resolve working directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build and validate a `ServerConfig` from parsed arguments.
pub fn from_args(args: CliArgs) -> Result<ServerConfig, ConfigError> {
    let headers = parse_headers(&args.headers)?;

    let port = u16::try_from(args.port)
        .map_err(|_| ConfigError::Validation(vec![ValidationError::PortOutOfRange(args.port)]))?;

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let tls = match (args.https, args.https_key, args.https_cert) {
        (false, _, _) => TlsMode::Disabled,
        (true, Some(key_path), Some(cert_path)) => TlsMode::Files { key_path, cert_path },
        (true, _, _) => TlsMode::SelfSigned,
    };

    let config = ServerConfig {
        port,
        host: args.host,
        root,
        proxy: args.proxy,
        headers,
        no_hot: args.no_hot,
        ignore: args.ignore,
        tls,
        debug: args.debug,
        max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse the `--headers` JSON object.
///
/// String values are taken as-is; numbers and booleans are stringified.
pub fn parse_headers(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidHeaders(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(ConfigError::InvalidHeaders("expected a JSON object".into()));
    };

    map.into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => Ok((name, s)),
            Value::Number(n) => Ok((name, n.to_string())),
            Value::Bool(b) => Ok((name, b.to_string())),
            _ => Err(ConfigError::InvalidHeaders(format!(
                "header '{name}' must be a string"
            ))),
        })
        .collect()
}
