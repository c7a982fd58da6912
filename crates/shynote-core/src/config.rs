//! Sync engine configuration.
//!
//! Loaded from environment variables:
//! - `SHYNOTE_SHARE_SALT` (required): server secret mixed into share ids
//! - `SHYNOTE_PAGE_LIMIT` (optional): default page size for listings
//!
//! # Example
//!
//! ```rust,no_run
//! use shynote_core::config::SyncConfig;
//!
//! let config = SyncConfig::from_env().expect("share salt must be configured");
//! ```

use std::env;
use std::fmt;

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::defaults::{ENV_PAGE_LIMIT, ENV_SHARE_SALT, PAGE_LIMIT, PAGE_LIMIT_MAX, SHARE_SALT_MIN_LEN};
use crate::error::{Error, Result};

/// Server-side secret used to derive share ids.
///
/// Never printed; wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ShareSalt(String);

impl ShareSalt {
    /// Wrap a salt, rejecting values shorter than `SHARE_SALT_MIN_LEN` bytes.
    pub fn new(salt: impl Into<String>) -> Result<Self> {
        let salt = salt.into();
        if salt.trim().len() < SHARE_SALT_MIN_LEN {
            return Err(Error::Config(format!(
                "share salt must be at least {} bytes",
                SHARE_SALT_MIN_LEN
            )));
        }
        Ok(Self(salt))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ShareSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShareSalt(<redacted>)")
    }
}

/// Configuration of the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub share_salt: ShareSalt,
    /// Page size used when a listing does not ask for one.
    pub page_limit: i64,
}

impl SyncConfig {
    /// Create a configuration with the default page size.
    pub fn new(share_salt: ShareSalt) -> Self {
        Self {
            share_salt,
            page_limit: PAGE_LIMIT,
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let salt = lookup(ENV_SHARE_SALT)
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_SHARE_SALT)))?;

        let page_limit = match lookup(ENV_PAGE_LIMIT) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|e| {
                Error::Config(format!("{} is not a number: {}", ENV_PAGE_LIMIT, e))
            })?,
            None => PAGE_LIMIT,
        };

        let config = Self {
            share_salt: ShareSalt::new(salt)?,
            page_limit,
        };
        config.validate()?;

        debug!(
            subsystem = "sync",
            component = "config",
            page_limit = config.page_limit,
            "Loaded sync configuration"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(1..=PAGE_LIMIT_MAX).contains(&self.page_limit) {
            return Err(Error::Config(format!(
                "page limit must be between 1 and {}, got {}",
                PAGE_LIMIT_MAX, self.page_limit
            )));
        }
        Ok(())
    }
}
