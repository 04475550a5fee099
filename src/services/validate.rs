//! Request pre-processing for device endpoints.
//!
//! [`PreProcess::wrap`] turns a responder into a handler that logs the
//! request, checks the device number and the reserved client fields, and
//! answers HTTP 400 without running the responder when any check fails.

use tracing::{error, info};

use super::envelope::{peer, AlpacaReply, Envelope};
use super::request::{AlpacaRequest, BadRequest, RequestMethod};
use super::shared::AlpacaContext;

/// Reserved client identity field.
pub const CLIENT_ID: &str = "ClientID";
/// Reserved client transaction field.
pub const CLIENT_TRANSACTION_ID: &str = "ClientTransactionID";

/// Validator for one device type.
#[derive(Debug, Clone, Copy)]
pub struct PreProcess {
    max_device_number: u32,
}

impl PreProcess {
    /// Validator accepting device numbers `0..=max_device_number`.
    pub fn new(max_device_number: u32) -> Self {
        Self { max_device_number }
    }

    /// Check a request, injecting `"0"` for absent reserved fields.
    pub fn validate(&self, req: &mut AlpacaRequest) -> Result<(), BadRequest> {
        let devnum = req.device_number.as_str();
        let Some(number) = non_negative(devnum) else {
            return Err(reject(format!(
                "Request has bad Alpaca device number value {devnum}"
            )));
        };
        if number > u64::from(self.max_device_number) {
            return Err(reject(format!(
                "Device number {devnum} does not exist. Maximum device number is {}.",
                self.max_device_number
            )));
        }

        for name in [CLIENT_ID, CLIENT_TRANSACTION_ID] {
            match req.find(name, true) {
                Some(value) if client_field(value).is_none() => {
                    return Err(reject(format!("Request has bad Alpaca {name} value {value}")));
                }
                Some(_) => {}
                None => req.push_field(name, "0"),
            }
        }
        Ok(())
    }

    /// Wrap a responder with logging and validation.
    pub fn wrap<F>(self, responder: F) -> impl Fn(&AlpacaContext, AlpacaRequest) -> AlpacaReply
    where
        F: Fn(&AlpacaContext, &AlpacaRequest) -> Result<Envelope, BadRequest>,
    {
        move |ctx: &AlpacaContext, mut req: AlpacaRequest| {
            log_request(&req);
            if let Err(BadRequest(message)) = self.validate(&mut req) {
                return AlpacaReply::BadRequest(message);
            }
            match responder(ctx, &req) {
                Ok(envelope) => AlpacaReply::Envelope(envelope),
                Err(BadRequest(message)) => {
                    error!("{} {}: {}", peer(&req), req.path(), message);
                    AlpacaReply::BadRequest(message)
                }
            }
        }
    }
}

fn non_negative(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

/// Client fields are 32-bit, the width the envelope echoes.
fn client_field(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok()
}

fn reject(message: String) -> BadRequest {
    error!("{message}");
    BadRequest(message)
}

fn log_request(req: &AlpacaRequest) {
    let addr = peer(req);
    info!("{addr} -> {} {}", req.method, req.path());
    if req.method == RequestMethod::Put && !req.fields.is_empty() {
        info!("{addr} -> {}", req.fields_text());
    }
}
