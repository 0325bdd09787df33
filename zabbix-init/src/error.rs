//! Error taxonomy for everything that talks to the Zabbix API
//!
//! - `Transport`: HTTP status outside 2xx, or the request never got an answer
//! - `Api`: the JSON-RPC envelope carried an `error` object
//! - `Timeout`: the availability wait ran out
//! - `Decode`: the `result` did not have the shape the method promises
//! - `Config`: invalid or missing settings

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZabbixError {
    #[error(
        "API {method}: HTTP {}: {detail}",
        .status.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
    )]
    Transport {
        method: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("API {method}: {} ({message}, code {code})", .data.as_deref().unwrap_or("no details"))]
    Api {
        method: String,
        code: i64,
        message: String,
        data: Option<String>,
    },

    #[error("API did not answer within {}s ({attempts} attempts)", .waited.as_secs())]
    Timeout { waited: Duration, attempts: u32 },

    #[error("API {method}: unexpected result: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration: {0}")]
    Config(String),
}

impl ZabbixError {
    pub(crate) fn transport(method: &str, err: reqwest::Error) -> Self {
        Self::Transport {
            method: method.to_string(),
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }

    pub(crate) fn decode(method: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            method: method.to_string(),
            source,
        }
    }

    /// True for errors raised by the server itself rather than the network.
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

pub type Result<T, E = ZabbixError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_method_and_detail() {
        let err = ZabbixError::Api {
            method: "host.create".into(),
            code: -32602,
            message: "Invalid params.".into(),
            data: Some("Host with the same name already exists.".into()),
        };
        let text = err.to_string();
        assert!(text.contains("host.create"));
        assert!(text.contains("already exists"));
        assert!(err.is_api_error());

        let err = ZabbixError::Transport {
            method: "apiinfo.version".into(),
            status: None,
            detail: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "API apiinfo.version: HTTP -: connection refused");
        assert!(!err.is_api_error());
    }

    #[test]
    fn test_timeout_message() {
        let err = ZabbixError::Timeout {
            waited: Duration::from_secs(20),
            attempts: 4,
        };
        assert_eq!(err.to_string(), "API did not answer within 20s (4 attempts)");
    }
}
