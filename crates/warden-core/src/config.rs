//! Authorization server configuration.

use chrono::{DateTime, Duration, Utc};

use crate::defaults::{
    ACCESS_TOKEN_LIFETIME_SECS, ACCESS_TOKEN_MAX_LIFETIME_SECS, AUTH_CODE_LIFETIME_SECS,
    AUTH_CODE_MAX_LIFETIME_SECS, REFRESH_TOKEN_LIFETIME_SECS, REFRESH_TOKEN_MAX_LIFETIME_SECS,
};
use crate::error::{Error, Result};

/// Lifetimes and policy switches for issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Authorization code lifetime in seconds.
    pub auth_code_ttl_secs: i64,
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds; 0 means non-expiring.
    pub refresh_token_ttl_secs: i64,
    /// Reject authorization requests that carry no PKCE challenge.
    pub require_pkce: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_code_ttl_secs: AUTH_CODE_LIFETIME_SECS,
            access_token_ttl_secs: ACCESS_TOKEN_LIFETIME_SECS,
            refresh_token_ttl_secs: REFRESH_TOKEN_LIFETIME_SECS,
            require_pkce: false,
        }
    }
}

impl OAuthConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WARDEN_AUTH_CODE_TTL_SECS` | `600` | Authorization code lifetime |
    /// | `WARDEN_ACCESS_TOKEN_TTL_SECS` | `3600` | Access token lifetime |
    /// | `WARDEN_REFRESH_TOKEN_TTL_SECS` | `2592000` | Refresh token lifetime, `0` = never expires |
    /// | `WARDEN_REQUIRE_PKCE` | `false` | Require a PKCE challenge on every authorization |
    ///
    /// Unparseable values fall back to the default. Call [`validate`](Self::validate)
    /// before use.
    pub fn from_env() -> Self {
        let auth_code_ttl_secs = env_i64("WARDEN_AUTH_CODE_TTL_SECS", AUTH_CODE_LIFETIME_SECS);
        let access_token_ttl_secs =
            env_i64("WARDEN_ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_LIFETIME_SECS);
        let refresh_token_ttl_secs =
            env_i64("WARDEN_REFRESH_TOKEN_TTL_SECS", REFRESH_TOKEN_LIFETIME_SECS);
        let require_pkce = std::env::var("WARDEN_REQUIRE_PKCE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            auth_code_ttl_secs,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            require_pkce,
        }
    }

    pub fn with_auth_code_ttl(mut self, secs: i64) -> Self {
        self.auth_code_ttl_secs = secs;
        self
    }

    pub fn with_access_token_ttl(mut self, secs: i64) -> Self {
        self.access_token_ttl_secs = secs;
        self
    }

    /// Set the refresh token lifetime; 0 disables refresh token expiry.
    pub fn with_refresh_token_ttl(mut self, secs: i64) -> Self {
        self.refresh_token_ttl_secs = secs;
        self
    }

    pub fn with_require_pkce(mut self, require: bool) -> Self {
        self.require_pkce = require;
        self
    }

    /// Reject lifetimes that would make issued credentials unusable or
    /// authorization codes long-lived.
    pub fn validate(&self) -> Result<()> {
        if self.auth_code_ttl_secs <= 0 {
            return Err(Error::Config(format!(
                "auth code lifetime must be positive, got {}",
                self.auth_code_ttl_secs
            )));
        }
        if self.auth_code_ttl_secs > AUTH_CODE_MAX_LIFETIME_SECS {
            return Err(Error::Config(format!(
                "auth code lifetime must not exceed {}s, got {}",
                AUTH_CODE_MAX_LIFETIME_SECS, self.auth_code_ttl_secs
            )));
        }
        if self.access_token_ttl_secs <= 0 {
            return Err(Error::Config(format!(
                "access token lifetime must be positive, got {}",
                self.access_token_ttl_secs
            )));
        }
        if self.access_token_ttl_secs > ACCESS_TOKEN_MAX_LIFETIME_SECS {
            return Err(Error::Config(format!(
                "access token lifetime must not exceed {}s, got {}",
                ACCESS_TOKEN_MAX_LIFETIME_SECS, self.access_token_ttl_secs
            )));
        }
        if self.refresh_token_ttl_secs < 0 {
            return Err(Error::Config(format!(
                "refresh token lifetime must not be negative, got {}",
                self.refresh_token_ttl_secs
            )));
        }
        if self.refresh_token_ttl_secs > REFRESH_TOKEN_MAX_LIFETIME_SECS {
            return Err(Error::Config(format!(
                "refresh token lifetime must not exceed {}s, got {}",
                REFRESH_TOKEN_MAX_LIFETIME_SECS, self.refresh_token_ttl_secs
            )));
        }
        Ok(())
    }

    /// Expiry of an authorization code issued at `now`.
    pub fn auth_code_expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        expiry_after(now, self.auth_code_ttl_secs)
    }

    /// Expiry of an access token issued at `now`.
    pub fn access_token_expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        expiry_after(now, self.access_token_ttl_secs)
    }

    /// Expiry of a refresh token issued at `now`; `None` when refresh tokens
    /// do not expire.
    pub fn refresh_token_expiry(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        if self.refresh_token_ttl_secs == 0 {
            return Ok(None);
        }
        expiry_after(now, self.refresh_token_ttl_secs).map(Some)
    }
}

/// `now + secs`, or `Config` when the result is not representable.
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::Config(format!("lifetime of {}s is out of range", secs)))
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
