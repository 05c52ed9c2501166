//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Default page size when the request carries none.
pub const DEFAULT_LIMIT: u64 = 10;

/// Default cap on the page size.
pub const DEFAULT_MAX_LIMIT: u64 = 100;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Per-connection statement timeout in milliseconds (default: 10000).
    pub statement_timeout_ms: u64,

    /// Listing behaviour.
    pub listing: ListingConfig,
}

/// Settings that shape every listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingConfig {
    /// Page size used when the request has no usable `limit` (default: 10).
    pub default_limit: u64,

    /// Largest page size served; larger requests are capped (default: 100).
    pub max_limit: u64,

    /// Text-search configuration passed to `to_tsquery` (default: "english").
    pub search_config: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            search_config: "english".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let statement_timeout_ms = env::var("STATEMENT_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .context("STATEMENT_TIMEOUT_MS must be a valid u64")?;

        let listing = ListingConfig::from_lookup(|key| env::var(key).ok())?;

        Ok(Self {
            database_url,
            database_max_connections,
            statement_timeout_ms,
            listing,
        })
    }
}

impl ListingConfig {
    /// Build listing settings from a key lookup, falling back to defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let default_limit = match lookup("LISTING_DEFAULT_LIMIT") {
            Some(v) => v
                .parse()
                .context("LISTING_DEFAULT_LIMIT must be a valid u64")?,
            None => defaults.default_limit,
        };

        let max_limit = match lookup("LISTING_MAX_LIMIT") {
            Some(v) => v.parse().context("LISTING_MAX_LIMIT must be a valid u64")?,
            None => defaults.max_limit,
        };

        if default_limit == 0 || max_limit == 0 {
            anyhow::bail!("listing limits must be positive");
        }
        if default_limit > max_limit {
            anyhow::bail!(
                "LISTING_DEFAULT_LIMIT ({default_limit}) exceeds LISTING_MAX_LIMIT ({max_limit})"
            );
        }

        let search_config = lookup("SEARCH_CONFIG").unwrap_or(defaults.search_config);
        if search_config.trim().is_empty() {
            anyhow::bail!("SEARCH_CONFIG must not be empty");
        }

        Ok(Self {
            default_limit,
            max_limit,
            search_config,
        })
    }
}
