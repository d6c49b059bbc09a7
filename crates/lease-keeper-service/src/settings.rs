//! Configuration loading and logging initialization.

use lease_keeper_api::{ConfigError, LoggingConfig, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "LK_CONFIG_FILE";

/// Prefix for configuration overrides, e.g. `LK__SERVER__PORT=9090`
pub const ENV_PREFIX: &str = "LK";

const SYSTEM_CONFIG: &str = "/etc/lease-keeper/service";
const LOCAL_CONFIG: &str = "config/service";

/// Load and validate the service configuration
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/lease-keeper/service.yaml`
///  2. `./config/service.yaml`
///  3. the file named by `explicit_path` (required when given)
///  4. environment variables prefixed `LK__`
///
/// Every field has a default, so no source is mandatory. A malformed file or
/// an override that cannot be coerced is an error.
pub fn load_service_config(explicit_path: Option<&str>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name(SYSTEM_CONFIG)
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name(LOCAL_CONFIG)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path.filter(|p| !p.is_empty()) {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    service_config.validate()?;
    Ok(service_config)
}

/// Filter directive for a configured level
///
/// A bare level such as `debug` applies to the Lease-Keeper crates, with
/// `tower_http` at debug. Anything containing `=` or `,` is taken as a full
/// `EnvFilter` directive.
pub fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    format!(
        "lease_keeper_service={level},lease_keeper_api={level},lease_keeper_core={level},tower_http=debug",
        level = level
    )
}

/// Install the global tracing subscriber
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&logging.level)))
        .unwrap_or_else(|_| EnvFilter::new(filter_directive("info")));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
