use std::fmt;

use crate::catalog::Category;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    Authentication(String),
    Api(String),
    Unsupported { category: Category, value: String },
    InvalidValue(String),
    InvalidUnit(usize),
    NotConnected,
    StaleSession(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Authentication(msg) => write!(f, "authentication failed: {msg}"),
            Error::Api(msg) => write!(f, "API error: {msg}"),
            Error::Unsupported { category, value } => {
                write!(f, "unit does not support {category} {value:?}")
            }
            Error::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Error::InvalidUnit(index) => write!(f, "invalid unit: {index}"),
            Error::NotConnected => write!(f, "not connected"),
            Error::StaleSession(msg) => write!(f, "stale session: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
