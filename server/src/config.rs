use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Presence hub server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "presence-hub", version, about = "Real-time presence and messaging hub")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PRESENCE_HUB_PORT", default_value = "5001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PRESENCE_HUB_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./presence-hub.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PRESENCE_HUB_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "PRESENCE_HUB_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Print an access token for the given user id and exit (development aid)
    #[arg(long, value_name = "USER_ID")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_token: Option<String>,

    /// Hub transport configuration (loaded from [hub] section in TOML)
    #[arg(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<HubConfig>,
}

/// Configuration for hub connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Seconds between server pings on every hub connection (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before dropping the connection (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,

    /// Lifetime of tokens minted by --issue-token (default: 604800 = 7 days)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl HubConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

fn default_token_ttl() -> i64 {
    7 * 24 * 3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5001,
            bind_address: "0.0.0.0".to_string(),
            config: "./presence-hub.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            issue_token: None,
            hub: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PRESENCE_HUB_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        Self::figment(cli).extract()
    }

    fn figment(cli: Config) -> Figment {
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PRESENCE_HUB_"))
            .merge(Serialized::defaults(cli))
    }

    /// Hub settings, falling back to defaults when no [hub] section is present.
    pub fn hub(&self) -> HubConfig {
        self.hub.clone().unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Presence Hub Server Configuration
# Place this file at ./presence-hub.toml or specify with --config <path>
# All settings can be overridden via environment variables (PRESENCE_HUB_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5001)
# port = 5001

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# ---- Hub connections ----
# [hub]

# Interval between server pings on each hub connection
# ping_interval_secs = 30

# Connections that do not answer a ping within this window are dropped,
# which also takes them out of the presence registry
# pong_timeout_secs = 10

# Lifetime of tokens minted with --issue-token
# token_ttl_secs = 604800
"#
    .to_string()
}
