use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, anyhow};
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::relay::RelaySettings;

/// Server configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    /// `NODE_ENV=production`: only `frontend_url` may make cross-origin calls.
    pub production: bool,
    pub frontend_url: Option<String>,
    pub relay: RelaySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            production: false,
            frontend_url: None,
            relay: RelaySettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let history_limit: usize = var_or(
            "CHAT_HISTORY_LIMIT",
            defaults.relay.chat_history_limit.unwrap_or(0),
        )?;
        let outbound_queue_capacity: usize = var_or(
            "OUTBOUND_QUEUE_CAPACITY",
            defaults.relay.outbound_queue_capacity,
        )?;
        let empty_room_ttl_secs: u64 = var_or(
            "EMPTY_ROOM_TTL_SECS",
            defaults.relay.empty_room_ttl.map_or(0, |ttl| ttl.as_secs()),
        )?;
        if outbound_queue_capacity == 0 {
            return Err(anyhow!("OUTBOUND_QUEUE_CAPACITY must be at least 1"));
        }

        Ok(Self {
            bind_address: var_or("BIND_ADDRESS", defaults.bind_address)?,
            port: var_or("PORT", defaults.port)?,
            production: dotenv::var("NODE_ENV").is_ok_and(|env| env == "production"),
            frontend_url: dotenv::var("FRONTEND_URL").ok().filter(|url| !url.is_empty()),
            relay: RelaySettings {
                max_chat_length: var_or("MAX_CHAT_LENGTH", defaults.relay.max_chat_length)?,
                chat_history_limit: (history_limit > 0).then_some(history_limit),
                outbound_queue_capacity,
                empty_room_ttl: (empty_room_ttl_secs > 0)
                    .then(|| Duration::from_secs(empty_room_ttl_secs)),
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn cors_layer(&self) -> anyhow::Result<CorsLayer> {
        if !self.production {
            return Ok(CorsLayer::permissive());
        }

        let Some(frontend_url) = &self.frontend_url else {
            tracing::warn!("NODE_ENV=production without FRONTEND_URL, cross-origin requests disabled");
            return Ok(CorsLayer::new());
        };

        let origin = HeaderValue::from_str(frontend_url)
            .with_context(|| format!("invalid FRONTEND_URL {frontend_url:?}"))?;

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]))
    }
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {key}={raw:?}: {err}")),
        Err(_) => Ok(default),
    }
}
