use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub ledger: LedgerConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Replay attempts before a queued action is dropped.
    pub max_retries: u32,
    pub replay_timeout_secs: u64,
    /// Replay automatically when connectivity comes back.
    pub auto_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// How long a confirmed update stays visible before eviction.
    pub confirm_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub probe_url: Option<String>,
    pub probe_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/workforce_sync.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            queue: QueueConfig::default(),
            ledger: LedgerConfig::default(),
            network: NetworkConfig {
                probe_url: None,
                probe_interval_secs: 15,
                request_timeout_secs: 30,
            },
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            replay_timeout_secs: 30,
            auto_sync: true,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            confirm_grace_ms: 1_000,
        }
    }
}

impl QueueConfig {
    pub fn replay_timeout(&self) -> Duration {
        Duration::from_secs(self.replay_timeout_secs)
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn confirm_grace(&self) -> Duration {
        Duration::from_millis(self.confirm_grace_ms)
    }
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("WORKFORCE_SYNC_DATABASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.database.url = v.to_string();
            }
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_DATABASE_MAX_CONNECTIONS")
            .as_deref()
            .and_then(parse_u32)
        {
            cfg.database.max_connections = value;
        }

        if let Some(value) = lookup("WORKFORCE_SYNC_QUEUE_MAX_RETRIES")
            .as_deref()
            .and_then(parse_u32)
        {
            cfg.queue.max_retries = value;
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_QUEUE_REPLAY_TIMEOUT_SECS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.queue.replay_timeout_secs = value;
        }
        if let Some(v) = lookup("WORKFORCE_SYNC_QUEUE_AUTO_SYNC") {
            cfg.queue.auto_sync = parse_bool(&v, cfg.queue.auto_sync);
        }

        if let Some(value) = lookup("WORKFORCE_SYNC_LEDGER_TIMEOUT_MS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.ledger.timeout_ms = value;
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_LEDGER_MAX_RETRIES")
            .as_deref()
            .and_then(parse_u32)
        {
            cfg.ledger.max_retries = value;
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_LEDGER_RETRY_DELAY_MS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.ledger.retry_delay_ms = value;
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_LEDGER_CONFIRM_GRACE_MS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.ledger.confirm_grace_ms = value;
        }

        if let Some(v) = lookup("WORKFORCE_SYNC_PROBE_URL") {
            let v = v.trim();
            cfg.network.probe_url = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_PROBE_INTERVAL_SECS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.network.probe_interval_secs = value.max(1);
        }
        if let Some(value) = lookup("WORKFORCE_SYNC_REQUEST_TIMEOUT_SECS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.network.request_timeout_secs = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.queue.max_retries == 0 {
            return Err("Queue max_retries must be greater than 0".to_string());
        }
        if self.queue.replay_timeout_secs == 0 {
            return Err("Queue replay_timeout_secs must be greater than 0".to_string());
        }
        if self.ledger.timeout_ms == 0 {
            return Err("Ledger timeout_ms must be greater than 0".to_string());
        }
        if self.ledger.retry_delay_ms == 0 {
            return Err("Ledger retry_delay_ms must be greater than 0".to_string());
        }
        if let Some(url) = &self.network.probe_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Network probe_url must be an http(s) URL: {url}"));
            }
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
