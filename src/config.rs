use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
    #[error(transparent)]
    DotEnvError(#[from] dotenvy::Error),
}

/// Default image cap for the DynamoDB backend, leaving room for the other
/// attributes under the 400 KB item limit.
pub const DYNAMODB_MAX_IMAGE_BYTES: usize = 350_000;

/// Which `InitiativeRepository` implementation backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::DynamoDb),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}', expected 'dynamodb' or 'memory'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store_backend: StoreBackend,
    pub initiatives_table: String,
    // Store region as string, aws_clients converts it
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    // Explicit MAX_IMAGE_BYTES override; see `image_limit`
    pub max_image_bytes: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store_backend: StoreBackend::DynamoDb,
            initiatives_table: "initiatives".to_string(),
            aws_region: "ca-central-1".to_string(),
            localstack_endpoint: None,
            request_timeout: Duration::from_secs(10),
            max_body_bytes: 10 * 1024 * 1024,
            max_image_bytes: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let store_backend = parse_var("STORE_BACKEND", defaults.store_backend)?;

        let initiatives_table = env::var("INITIATIVES_TABLE").unwrap_or(defaults.initiatives_table);
        if initiatives_table.trim().is_empty() {
            return Err(ConfigError::MissingVar("INITIATIVES_TABLE".into()));
        }

        let aws_region = env::var("AWS_DEFAULT_REGION").unwrap_or(defaults.aws_region);

        // Allow overriding endpoint for localstack/testing
        let localstack_endpoint = env::var("AWS_ENDPOINT_URL").ok().filter(|url| !url.is_empty());

        let timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidVar("REQUEST_TIMEOUT_SECS".into(), "must be at least 1".into()));
        }

        Ok(Config {
            bind_address,
            store_backend,
            initiatives_table,
            aws_region,
            localstack_endpoint,
            request_timeout: Duration::from_secs(timeout_secs),
            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            max_image_bytes: parse_optional_var("MAX_IMAGE_BYTES")?,
        })
    }

    /// Longest accepted inline image. DynamoDB items cannot exceed 400 KB,
    /// so that backend gets a cap unless one is configured explicitly; the
    /// in-memory store is bounded only by the request body limit.
    pub fn image_limit(&self) -> Option<usize> {
        self.max_image_bytes.or(match self.store_backend {
            StoreBackend::DynamoDb => Some(DYNAMODB_MAX_IMAGE_BYTES),
            StoreBackend::Memory => None,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional_var(name)?.unwrap_or(default))
}

fn parse_optional_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidVar(name.into(), e.to_string())),
        Err(_) => Ok(None),
    }
}
