use std::env;

use tracing_subscriber::EnvFilter;
use vela_console_core::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterMode {
    Memory,
    Kube,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStoreConfig {
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub jwt_signing_key: String,
    pub cluster_mode: ClusterMode,
    pub system_namespace: String,
    pub default_namespace: String,
    pub definition_cache_ttl_seconds: u32,
    pub addon_catalog_refresh_seconds: u32,
    pub datastore: DataStoreConfig,
    pub redis: Option<RedisConfig>,
}

impl BootstrapConfig {
    pub fn load() -> Result<Self, AppError> {
        let jwt_signing_key = required_non_empty_env("VELA_JWT_SIGNING_KEY")?;
        let cluster_mode = parse_cluster_mode(&env_or("VELA_CLUSTER_MODE", "memory"))?;
        let system_namespace = env_or("VELA_SYSTEM_NAMESPACE", "vela-system");
        let default_namespace = env_or("VELA_DEFAULT_NAMESPACE", "default");
        let definition_cache_ttl_seconds = parse_number(
            "VELA_DEFINITION_CACHE_TTL_SECONDS",
            &env_or("VELA_DEFINITION_CACHE_TTL_SECONDS", "60"),
        )?;
        let addon_catalog_refresh_seconds = parse_number(
            "VELA_ADDON_CACHE_SECONDS",
            &env_or("VELA_ADDON_CACHE_SECONDS", "600"),
        )?;
        if addon_catalog_refresh_seconds == 0 {
            return Err(AppError::Validation(
                "VELA_ADDON_CACHE_SECONDS must be positive".to_owned(),
            ));
        }

        let datastore = match env_or("VELA_DATASTORE_TYPE", "memory").as_str() {
            "memory" => DataStoreConfig::Memory,
            "postgres" => DataStoreConfig::Postgres {
                database_url: required_non_empty_env("VELA_DATABASE_URL")?,
                max_connections: parse_number(
                    "VELA_DATABASE_MAX_CONNECTIONS",
                    &env_or("VELA_DATABASE_MAX_CONNECTIONS", "5"),
                )?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "VELA_DATASTORE_TYPE must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let redis = env::var("VELA_REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|url| RedisConfig {
                url,
                key_prefix: env_or("VELA_REDIS_KEY_PREFIX", "vela-console"),
            });

        Ok(Self {
            jwt_signing_key,
            cluster_mode,
            system_namespace,
            default_namespace,
            definition_cache_ttl_seconds,
            addon_catalog_refresh_seconds,
            datastore,
            redis,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_cluster_mode(value: &str) -> Result<ClusterMode, AppError> {
    match value {
        "memory" => Ok(ClusterMode::Memory),
        "kube" => Ok(ClusterMode::Kube),
        other => Err(AppError::Validation(format!(
            "VELA_CLUSTER_MODE must be either 'memory' or 'kube', got '{other}'"
        ))),
    }
}

fn parse_number(name: &str, value: &str) -> Result<u32, AppError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use vela_console_core::AppError;

    use super::{ClusterMode, parse_cluster_mode, parse_number};

    #[test]
    fn cluster_modes_parse() -> Result<(), AppError> {
        assert_eq!(parse_cluster_mode("memory")?, ClusterMode::Memory);
        assert_eq!(parse_cluster_mode("kube")?, ClusterMode::Kube);
        assert!(matches!(
            parse_cluster_mode("remote"),
            Err(AppError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn numbers_reject_garbage() -> Result<(), AppError> {
        assert_eq!(parse_number("TTL", " 30 ")?, 30);
        assert!(matches!(
            parse_number("TTL", "-1"),
            Err(AppError::Validation(_))
        ));
        Ok(())
    }
}
