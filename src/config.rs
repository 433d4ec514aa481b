//! Configuration for swapsmith.
//!
//! Everything resolves from environment variables (a local `.env` is loaded
//! by the binary before this runs). Secrets are wrapped in `SecretString`
//! and never logged.

use secrecy::SecretString;
use url::Url;

use crate::api::ApiCredentials;
use crate::error::ConfigError;

/// Main configuration for the runtime.
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub backend: BackendConfig,
    pub provider: ProviderConfig,
    pub telegram: Option<TelegramConfig>,
    pub bridge: BridgeConfig,
    /// Chain a fresh session starts on before any wallet notification.
    pub default_chain_id: u64,
}

/// Web gateway bind address and public base URL.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build bridge links.
    pub public_url: String,
}

/// Command backend endpoint and default credentials.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub credentials: ApiCredentials,
}

/// Wallet provider (JSON-RPC) settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub rpc_url: String,
    pub receipt_poll_ms: u64,
}

/// Telegram companion bot settings. Absent when no token is configured.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub bot_name: String,
}

/// Wallet-bridge handshake settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub connection_ttl_secs: i64,
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            Ok(if trimmed.is_empty() { None } else { Some(trimmed) })
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(key.to_string())),
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        None => Ok(default),
    }
}

fn validated_url(key: &str, raw: String) -> Result<String, ConfigError> {
    Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("not a valid URL: {e}"),
    })?;
    Ok(raw.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = optional_env("GATEWAY_HOST")?.unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = parse_env("GATEWAY_PORT", 3000)?;
        let public_url = match optional_env("PUBLIC_URL")? {
            Some(raw) => validated_url("PUBLIC_URL", raw)?,
            None => format!("http://{host}:{port}"),
        };

        let backend = BackendConfig {
            base_url: validated_url("BACKEND_URL", require_env("BACKEND_URL")?)?,
            credentials: ApiCredentials {
                openai_key: optional_env("OPENAI_API_KEY")?.map(SecretString::from),
            },
        };

        let provider = ProviderConfig {
            rpc_url: validated_url("RPC_URL", require_env("RPC_URL")?)?,
            receipt_poll_ms: parse_env("RECEIPT_POLL_MS", 2000)?,
        };

        let telegram = match optional_env("TELEGRAM_BOT_TOKEN")? {
            Some(token) => Some(TelegramConfig {
                bot_token: SecretString::from(token),
                bot_name: require_env("TELEGRAM_BOT_NAME")?,
            }),
            None => None,
        };

        Ok(Self {
            gateway: GatewayConfig {
                host,
                port,
                public_url,
            },
            backend,
            provider,
            telegram,
            bridge: BridgeConfig {
                connection_ttl_secs: parse_env("BRIDGE_TTL_SECS", 1800)?,
            },
            default_chain_id: parse_env("DEFAULT_CHAIN_ID", 1)?,
        })
    }
}
