//! Alpaca response envelopes.
//!
//! Every device and management response carries the same JSON envelope:
//!
//! ```json
//! {"ServerTransactionID": 7, "ClientTransactionID": 3,
//!  "ErrorNumber": 0, "ErrorMessage": "", "Value": 90.0}
//! ```
//!
//! `Value` appears only on success and only when there is something to
//! return. [`AlpacaReply`] is what the HTTP layer sends: an envelope with
//! status 200, or a plain-text transport failure.

use std::fmt;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::request::AlpacaRequest;
use super::shared::AlpacaContext;
use crate::error::ProtocolError;

// ============================================================================
// Values
// ============================================================================

/// One `{Name, Value}` entry of a device state list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateValue {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: Value,
}

impl StateValue {
    /// Create a named entry.
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeValue {
    /// Any JSON value, written as-is.
    Scalar(Value),
    /// Written as an array of `{"Name": .., "Value": ..}` objects.
    NamedList(Vec<StateValue>),
}

impl fmt::Display for EnvelopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<unprintable>"),
        }
    }
}

impl From<Value> for EnvelopeValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<StateValue>> for EnvelopeValue {
    fn from(list: Vec<StateValue>) -> Self {
        Self::NamedList(list)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EnvelopeValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_from!(bool, f64, i32, u32, &str, String, Vec<String>, Vec<&str>);

// ============================================================================
// Envelope
// ============================================================================

/// The JSON body of every Alpaca response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Server-assigned, strictly increasing ID.
    #[serde(rename = "ServerTransactionID")]
    pub server_transaction_id: u32,
    /// Echo of the caller's ID, or 0.
    #[serde(rename = "ClientTransactionID")]
    pub client_transaction_id: u32,
    /// 0 on success.
    #[serde(rename = "ErrorNumber")]
    pub error_number: u32,
    /// Empty on success.
    #[serde(rename = "ErrorMessage")]
    pub error_message: String,
    /// Present only on success with a value.
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<EnvelopeValue>,
}

impl Envelope {
    /// Envelope for a property read.
    pub fn property(
        ctx: &AlpacaContext,
        value: Option<EnvelopeValue>,
        req: &AlpacaRequest,
        error: ProtocolError,
    ) -> Self {
        Self::build(ctx, req, error, value)
    }

    /// Envelope for a method call or property write.
    pub fn method(
        ctx: &AlpacaContext,
        req: &AlpacaRequest,
        error: ProtocolError,
        value: Option<EnvelopeValue>,
    ) -> Self {
        Self::build(ctx, req, error, value)
    }

    /// Whether the envelope reports success.
    pub fn is_success(&self) -> bool {
        self.error_number == 0
    }

    fn build(
        ctx: &AlpacaContext,
        req: &AlpacaRequest,
        error: ProtocolError,
        value: Option<EnvelopeValue>,
    ) -> Self {
        let server_transaction_id = ctx.sequencer.next();
        let client_transaction_id = client_transaction_id(req);

        let value = if error.is_success() { value } else { None };
        if let Some(value) = &value {
            info!("{} <- {}", peer(req), value);
        }

        let error_message = if error.is_success() {
            String::new()
        } else {
            error.message
        };

        Self {
            server_transaction_id,
            client_transaction_id,
            error_number: error.number,
            error_message,
            value,
        }
    }
}

fn client_transaction_id(req: &AlpacaRequest) -> u32 {
    req.find("ClientTransactionID", true)
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0)
}

/// Peer address text for request and response log lines.
pub(crate) fn peer(req: &AlpacaRequest) -> String {
    req.client
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// HTTP Reply
// ============================================================================

/// What a request handler hands back to axum.
#[derive(Debug)]
pub enum AlpacaReply {
    /// Protocol-level outcome, JSON with status 200.
    Envelope(Envelope),
    /// Malformed request, plain text with status 400.
    BadRequest(String),
    /// No such member, status 404.
    NotFound(String),
    /// Known member, wrong verb, status 405.
    MethodNotAllowed(String),
}

impl AlpacaReply {
    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Envelope(_) => StatusCode::OK,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl From<Envelope> for AlpacaReply {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}

impl IntoResponse for AlpacaReply {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Envelope(envelope) => Json(envelope).into_response(),
            Self::BadRequest(message) | Self::NotFound(message) | Self::MethodNotAllowed(message) => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                message,
            )
                .into_response(),
        }
    }
}
