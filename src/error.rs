//! Banded error taxonomy for the core.
//!
//! Errors are values, not exceptions: every fallible call returns a
//! `CoreError` carrying a numeric band (Network/API/Internal/Business) and a
//! human-readable message. The bands mirror the wire status codes venues
//! return, so a decoder failure and a REST rejection land in the same shape.

use thiserror::Error;

/// Numeric error band, per spec: Network 100-199, API 200-299,
/// Internal 300-399, Business 400-499.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionFailed,
    ConnectionTimeout,
    ConnectionClosed,
    SslError,
    ApiError,
    InvalidRequest,
    AuthenticationFailed,
    RateLimited,
    InsufficientBalance,
    OrderNotFound,
    ExchangeError,
    ConfigError,
    ParseError,
    InvalidState,
    PremiumTooLow,
    RiskLimitExceeded,
    DailyLossLimitReached,
}

impl ErrorKind {
    /// The numeric code a monitoring dashboard would group by.
    pub fn code(&self) -> u16 {
        match self {
            Self::ConnectionFailed => 100,
            Self::ConnectionTimeout => 101,
            Self::ConnectionClosed => 102,
            Self::SslError => 103,
            Self::ApiError => 200,
            Self::InvalidRequest => 201,
            Self::AuthenticationFailed => 202,
            Self::RateLimited => 203,
            Self::InsufficientBalance => 204,
            Self::OrderNotFound => 205,
            Self::ExchangeError => 206,
            Self::ConfigError => 300,
            Self::ParseError => 301,
            Self::InvalidState => 302,
            Self::PremiumTooLow => 400,
            Self::RiskLimitExceeded => 401,
            Self::DailyLossLimitReached => 402,
        }
    }

    /// Network- and parse-plane errors recover locally (reconnect / drop and
    /// count); everything else must be observed by the caller.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed
                | Self::ConnectionTimeout
                | Self::ConnectionClosed
                | Self::SslError
                | Self::ParseError
        )
    }

    /// Fatal conditions set the kill-switch per spec.md §7.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}({})", self.code())
    }
}

#[derive(Debug, Error, Clone)]
#[error("[{kind}] {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, msg)
    }

    pub fn connection_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionTimeout, msg)
    }

    pub fn connection_closed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionClosed, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, msg)
    }

    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiError, msg)
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, msg)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigError, msg)
    }

    pub fn exchange_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExchangeError, msg)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse_error(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::connection_timeout(e.to_string())
        } else {
            Self::new(ErrorKind::ApiError, e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CoreError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::connection_failed(e.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(e: toml::de::Error) -> Self {
        Self::config_error(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_match_spec_ranges() {
        assert!((100..200).contains(&ErrorKind::SslError.code()));
        assert!((200..300).contains(&ErrorKind::ExchangeError.code()));
        assert!((300..400).contains(&ErrorKind::InvalidState.code()));
        assert!((400..500).contains(&ErrorKind::DailyLossLimitReached.code()));
    }

    #[test]
    fn network_and_parse_errors_are_locally_recoverable() {
        assert!(ErrorKind::ConnectionClosed.is_locally_recoverable());
        assert!(ErrorKind::ParseError.is_locally_recoverable());
        assert!(!ErrorKind::RiskLimitExceeded.is_locally_recoverable());
    }
}
