use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub kmsp: KmspConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmspConfig {
    pub api_key: String,
    /// Endpoint template; `{op}` is replaced by the operation slug
    /// (accesstokenlist, login, packagepurchase, ...).
    pub base_url: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions older than this are swept and cleared.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_payment_method() -> String {
    "DANA".to_string()
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_base_url() -> String {
    "https://golang-openapi-{op}-xltembakservice.kmsp-store.com/v1".to_string()
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build from environment variables and defaults.
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // The API key must be provided when there is no config file.
                let api_key = get_env("KMSP_API_KEY")
                    .ok_or("Missing KMSP_API_KEY environment variable and no config.toml found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    kmsp: KmspConfig {
                        api_key,
                        base_url: get_env("KMSP_BASE_URL").unwrap_or_else(default_base_url),
                        payment_method: get_env("KMSP_PAYMENT_METHOD")
                            .unwrap_or_else(default_payment_method),
                    },
                    session: SessionConfig {
                        idle_timeout_secs: get_env_parse(
                            "SESSION_IDLE_TIMEOUT_SECS",
                            default_idle_timeout(),
                        ),
                        sweep_interval_secs: get_env_parse(
                            "SESSION_SWEEP_INTERVAL_SECS",
                            default_sweep_interval(),
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment variable overrides apply even when the file exists.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("KMSP_API_KEY") {
            config.kmsp.api_key = v;
        }
        if let Ok(v) = env::var("KMSP_BASE_URL") {
            config.kmsp.base_url = v;
        }
        if let Ok(v) = env::var("KMSP_PAYMENT_METHOD") {
            config.kmsp.payment_method = v;
        }
        if let Ok(v) = env::var("SESSION_IDLE_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.session.idle_timeout_secs = n;
        }
        if let Ok(v) = env::var("SESSION_SWEEP_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.session.sweep_interval_secs = n;
        }

        Ok(config)
    }
}
