//! Decoded Alpaca requests and parameter access.
//!
//! GET parameters come from the query string, PUT parameters from an
//! `application/x-www-form-urlencoded` body. Both decode into the same
//! ordered list of `(name, value)` pairs.

use std::fmt;
use std::net::SocketAddr;

/// HTTP verb of an Alpaca request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// Property reads.
    Get,
    /// Property writes and method calls.
    Put,
}

impl RequestMethod {
    /// Upper-case verb name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request that must be answered with HTTP 400 and a plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

impl BadRequest {
    /// Message for a required parameter that is absent or empty.
    pub fn missing(name: &str) -> Self {
        Self(format!("Missing, empty, or misspelled parameter \"{name}\""))
    }
}

/// One incoming device request.
#[derive(Debug, Clone)]
pub struct AlpacaRequest {
    /// HTTP verb.
    pub method: RequestMethod,
    /// Raw device-number path segment.
    pub device_number: String,
    /// Member name, lower-cased.
    pub member: String,
    /// Decoded parameters in arrival order.
    pub fields: Vec<(String, String)>,
    /// Remote peer, when known.
    pub client: Option<SocketAddr>,
}

impl AlpacaRequest {
    /// Build a request from a raw urlencoded parameter string.
    pub fn new(method: RequestMethod, device_number: &str, member: &str, params: &[u8]) -> Self {
        Self {
            method,
            device_number: device_number.to_string(),
            member: member.to_ascii_lowercase(),
            fields: decode_fields(params),
            client: None,
        }
    }

    /// Attach the remote peer address.
    pub fn with_client(mut self, client: Option<SocketAddr>) -> Self {
        self.client = client;
        self
    }

    /// Request path for logging.
    pub fn path(&self) -> String {
        format!("/api/v1/rotator/{}/{}", self.device_number, self.member)
    }

    /// Look up a parameter.
    ///
    /// Names match exactly unless `caseless` is set. An empty value is
    /// treated as absent. When absent, `default` is returned if given,
    /// otherwise the request is rejected.
    pub fn get_field(
        &self,
        name: &str,
        caseless: bool,
        default: Option<&str>,
    ) -> Result<String, BadRequest> {
        self.find(name, caseless)
            .or(default)
            .map(str::to_string)
            .ok_or_else(|| BadRequest::missing(name))
    }

    /// Look up a parameter by exact name, rejecting the request if absent.
    pub fn require(&self, name: &str) -> Result<String, BadRequest> {
        self.get_field(name, false, None)
    }

    /// Value of a parameter if present and non-empty.
    pub fn find(&self, name: &str, caseless: bool) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| {
                if caseless {
                    key.eq_ignore_ascii_case(name)
                } else {
                    key == name
                }
            })
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Whether a parameter name is present at all (any case, any value).
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Append a parameter.
    pub fn push_field(&mut self, name: &str, value: &str) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    /// Parameters re-encoded for logging.
    pub fn fields_text(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

/// Decode an urlencoded parameter string.
pub fn decode_fields(params: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(params)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Parse an Alpaca boolean (`true`/`false`, any case).
pub fn parse_bool(value: &str) -> Result<bool, BadRequest> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(BadRequest(format!("Bad boolean value \"{other}\""))),
    }
}

/// Parse a decimal number. `None` when the text is not a number.
pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
