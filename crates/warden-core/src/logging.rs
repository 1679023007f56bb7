//! Structured logging schema and field name constants for warden.
//!
//! All crates use these names for structured logging fields so that log
//! aggregation can query the same field across every subsystem.
//!
//! Codes, tokens, client secrets and passwords are never logged, not even
//! truncated. Log the owning `client_id` / `user_id` instead.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Rejected credentials, replayed codes, lost races |
//! | INFO  | Lifecycle events (startup, shutdown), issuance and revocation |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "oauth", "store", "database", "sweeper"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "client_authenticator", "code_issuer", "token_exchanger", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "authenticate", "issue", "exchange", "refresh", "sweep"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Public OAuth client identifier.
pub const CLIENT_ID: &str = "client_id";

/// User UUID.
pub const USER_ID: &str = "user_id";

/// OAuth grant type ("authorization_code", "refresh_token", ...).
pub const GRANT_TYPE: &str = "grant_type";

/// Granted scope string.
pub const SCOPE: &str = "scope";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Authorization codes removed by an expiry sweep.
pub const CODES_DELETED: &str = "codes_deleted";

/// Access and refresh tokens removed by an expiry sweep.
pub const TOKENS_DELETED: &str = "tokens_deleted";

/// Redemption attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: &[&str] = &[
        SUBSYSTEM,
        COMPONENT,
        OPERATION,
        CLIENT_ID,
        USER_ID,
        GRANT_TYPE,
        SCOPE,
        DURATION_MS,
        CODES_DELETED,
        TOKENS_DELETED,
        ATTEMPT,
        POOL_SIZE,
        POOL_IDLE,
        DB_TABLE,
        SUCCESS,
        ERROR_MSG,
    ];

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let unique: HashSet<_> = ALL.iter().collect();
        assert_eq!(unique.len(), ALL.len());
        for name in ALL {
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
