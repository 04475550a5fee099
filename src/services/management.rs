//! Management API and setup pages.
//!
//! Management requests skip device validation but still consume a
//! transaction ID and echo the caller's `ClientTransactionID`.

use serde_json::json;

use super::envelope::Envelope;
use super::request::AlpacaRequest;
use super::responders::RotatorMetadata;
use super::shared::AlpacaContext;
use crate::error::ProtocolError;

/// Static description of the server itself.
pub struct ServerMetadata;

impl ServerMetadata {
    /// Server version.
    pub const VERSION: &'static str = "0.1";
    /// Server name.
    pub const DESCRIPTION: &'static str = "Alpyca32";
    /// Manufacturer.
    pub const MANUFACTURER: &'static str = "ASCOM Initiative";
}

/// Supported Alpaca API versions.
pub const API_VERSIONS: [u32; 1] = [1];

/// `GET /management/apiversions`
pub fn api_versions(ctx: &AlpacaContext, req: &AlpacaRequest) -> Envelope {
    Envelope::property(ctx, Some(json!(API_VERSIONS).into()), req, ProtocolError::success())
}

/// `GET /management/v1/description`
pub fn description(ctx: &AlpacaContext, req: &AlpacaRequest) -> Envelope {
    let value = json!({
        "ServerName": ServerMetadata::DESCRIPTION,
        "Manufacturer": ServerMetadata::MANUFACTURER,
        "ManufacturerVersion": ServerMetadata::VERSION,
        "Location": ctx.config.server.location,
    });
    Envelope::property(ctx, Some(value.into()), req, ProtocolError::success())
}

/// `GET /management/v1/configureddevices`
pub fn configured_devices(ctx: &AlpacaContext, req: &AlpacaRequest) -> Envelope {
    let value = json!([{
        "DeviceName": RotatorMetadata::NAME,
        "DeviceType": RotatorMetadata::DEVICE_TYPE,
        "DeviceNumber": 0,
        "UniqueID": RotatorMetadata::DEVICE_ID,
    }]);
    Envelope::property(ctx, Some(value.into()), req, ProtocolError::success())
}

/// Body of `GET /setup`.
pub const SERVER_SETUP_HTML: &str =
    "<!DOCTYPE html><html><body><h2>Server setup is in config.toml</h2></body></html>";

/// Body of `GET /setup/v1/rotator/{devnum}/setup`.
pub const DEVICE_SETUP_HTML: &str =
    "<!DOCTYPE html><html><body><h2>Device setup is in config.toml</h2></body></html>";
