use thiserror::Error;

/// Unified library error type.
///
/// Most variants describe a single failed unit of work (one line, one MAC,
/// one host). Those are counted and logged by the batch operations and never
/// escape them; only `Io`, `InvalidTarget`, `TargetTooLarge` and `Config`
/// halt an operation.
#[derive(Debug, Error)]
pub enum NetscanError {
    /// A format name that no parser answers to.
    #[error("input format not recognized: {0:?}")]
    FormatUnrecognized(String),

    /// A parsed line or object had no extractable IPv4 address.
    #[error("record unusable: {0}")]
    RecordUnusable(String),

    /// A MAC address did not reduce to exactly 12 hex digits.
    #[error("malformed MAC address: {0:?}")]
    MalformedMac(String),

    /// Timeout or connection failure talking to a remote peer.
    #[error("network error: {0}")]
    NetworkTransient(String),

    /// The upstream API explicitly asked us to slow down.
    #[error("rate limited by upstream")]
    RateLimited,

    /// The durable vendor cache could not be read or written.
    #[error("vendor cache unavailable: {0}")]
    CacheUnavailable(#[from] sqlx::Error),

    /// The input could not be opened or read at all.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A probe target was neither CIDR, range nor a single address.
    #[error("invalid probe target: {0}")]
    InvalidTarget(String),

    /// A probe target expanded to more hosts than the configured ceiling.
    #[error("probe target {target} expands to {hosts} hosts (limit {limit})")]
    TargetTooLarge {
        target: String,
        hosts: u64,
        limit: u64,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NetscanError {
    /// Whether the error is a per-unit failure that may be retried
    /// (only network-level failures qualify).
    pub fn is_transient(&self) -> bool {
        matches!(self, NetscanError::NetworkTransient(_))
    }
}

pub type Result<T, E = NetscanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(NetscanError::NetworkTransient("timeout".into()).is_transient());
        assert!(!NetscanError::RateLimited.is_transient());
        assert!(!NetscanError::MalformedMac("zz".into()).is_transient());
        assert!(!NetscanError::FormatUnrecognized("yaml".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            NetscanError::MalformedMac("12:34".into()).to_string(),
            "malformed MAC address: \"12:34\""
        );
        let err = NetscanError::TargetTooLarge {
            target: "10.0.0.0/8".into(),
            hosts: 16_777_214,
            limit: 65_536,
        };
        assert_eq!(
            err.to_string(),
            "probe target 10.0.0.0/8 expands to 16777214 hosts (limit 65536)"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NetscanError = io.into();
        assert!(matches!(err, NetscanError::Io(_)));
    }
}
