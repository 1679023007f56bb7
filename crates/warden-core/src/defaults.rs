//! Centralized default constants for warden.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// LIFETIMES
// =============================================================================

/// Authorization code lifetime in seconds (10 minutes).
pub const AUTH_CODE_LIFETIME_SECS: i64 = 600;

/// Upper bound accepted for a configured authorization code lifetime (1 hour).
pub const AUTH_CODE_MAX_LIFETIME_SECS: i64 = 3600;

/// Access token lifetime in seconds (1 hour).
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Upper bound accepted for a configured access token lifetime (365 days).
pub const ACCESS_TOKEN_MAX_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Refresh token lifetime in seconds (30 days). Zero means non-expiring.
pub const REFRESH_TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 3600;

/// Upper bound accepted for a configured refresh token lifetime (10 years).
pub const REFRESH_TOKEN_MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 3600;

// =============================================================================
// GENERATED SECRETS
// =============================================================================

/// Length of generated authorization codes (alphanumeric, ~285 bits).
pub const AUTH_CODE_LENGTH: usize = 48;

/// Length of the random part of generated access and refresh tokens.
pub const TOKEN_LENGTH: usize = 48;

/// Length of the random part of generated client identifiers.
pub const CLIENT_ID_LENGTH: usize = 24;

/// Length of generated client secrets.
pub const CLIENT_SECRET_LENGTH: usize = 48;

/// Prefix for generated client identifiers.
pub const CLIENT_ID_PREFIX: &str = "wd_";

/// Prefix for generated access tokens.
pub const ACCESS_TOKEN_PREFIX: &str = "wd_at_";

/// Prefix for generated refresh tokens.
pub const REFRESH_TOKEN_PREFIX: &str = "wd_rt_";

/// Salt length in bytes for user password hashing.
pub const PASSWORD_SALT_LENGTH: usize = 16;

// =============================================================================
// OAUTH
// =============================================================================

/// Scope granted when a client registers without one.
pub const OAUTH_DEFAULT_SCOPE: &str = "read";

/// Token type reported in token responses.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Role assigned to newly registered users.
pub const DEFAULT_USER_ROLE: &str = "ROLE_USER";

/// Minimum PKCE code verifier length (RFC 7636 section 4.1).
pub const PKCE_VERIFIER_MIN_LENGTH: usize = 43;

/// Maximum PKCE code verifier length (RFC 7636 section 4.1).
pub const PKCE_VERIFIER_MAX_LENGTH: usize = 128;

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Interval between expiry sweeps in seconds (5 minutes).
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Number of attempts a code redemption makes when it loses a race.
pub const REDEEM_MAX_ATTEMPTS: usize = 2;

/// Capacity of the sweeper event broadcast channel.
pub const SWEEPER_EVENT_CAPACITY: usize = 64;
