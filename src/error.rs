//! Error types for the SDMX client.
//!
//! Every public API returns [`Result<T>`]. Two kinds matter to callers:
//! [`Error::Connection`] when the service answers with a non-success status,
//! and [`Error::Decode`] when the payload is not an SDMX-JSON data message we
//! can flatten.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The web service answered with a non-success HTTP status.
    #[error("Error downloading {url} status code: {status}{}", fmt_detail(.detail))]
    Connection {
        url: String,
        status: u16,
        detail: String,
    },

    /// The payload does not have the expected data-message shape.
    #[error("Failed to decode SDMX-JSON data message: {message}")]
    Decode { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown label mode '{0}' (expected one of: id, label, both)")]
    InvalidLabelMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build table: {0}")]
    Table(#[from] arrow::error::ArrowError),
}

fn fmt_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Builds a connection error from a failed response body.
    pub(crate) fn connection(status: StatusCode, url: &str, body: &str) -> Self {
        Self::Connection {
            url: url.to_string(),
            status: status.as_u16(),
            detail: error_detail(body),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error payload some SDMX services send back, e.g.
/// `{"errors":[{"code":404,"title":"No results found"}]}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct SdmxErrorResponse {
    #[serde(default)]
    pub(crate) errors: Vec<SdmxErrorEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct SdmxErrorEntry {
    #[serde(default)]
    pub(crate) code: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    // Older services use "message" instead of "title"
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) detail: Option<String>,
}

const MAX_DETAIL_LEN: usize = 200;

/// Best-effort extraction of a human-readable reason from an error body.
pub(crate) fn error_detail(body: &str) -> String {
    if let Ok(resp) = serde_json::from_str::<SdmxErrorResponse>(body) {
        let parts: Vec<String> = resp
            .errors
            .iter()
            .map(|e| {
                let title = e.title.as_deref().or(e.message.as_deref()).unwrap_or("");
                let code = match &e.code {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(v) if !v.is_null() => v.to_string(),
                    _ => String::new(),
                };
                let mut out = String::new();
                if !code.is_empty() {
                    out.push_str(&code);
                    out.push_str(": ");
                }
                out.push_str(title);
                if let Some(detail) = e.detail.as_deref().filter(|d| !d.is_empty()) {
                    out.push_str(" - ");
                    out.push_str(detail);
                }
                out
            })
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }

    let line = body.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() > MAX_DETAIL_LEN {
        let cut: String = line.chars().take(MAX_DETAIL_LEN).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
