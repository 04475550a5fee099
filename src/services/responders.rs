//! Rotator device responders.
//!
//! One function per Alpaca member. Each takes the server context and an
//! already-validated request and returns the envelope to send, or a
//! [`BadRequest`] when a required parameter is missing or malformed.
//!
//! Members that need a connection check it before reading any parameter,
//! so a disconnected device answers `NotConnected` even for a request that
//! is otherwise incomplete.

use chrono::Utc;
use tracing::info;

use super::envelope::{Envelope, EnvelopeValue, StateValue};
use super::request::{parse_bool, parse_float, AlpacaRequest, BadRequest, RequestMethod};
use super::shared::AlpacaContext;
use crate::error::{AlpacaError, ProtocolError};
use crate::rotator::{RotatorDevice, RotatorError};

/// Signature shared by every responder.
pub type Responder = fn(&AlpacaContext, &AlpacaRequest) -> Result<Envelope, BadRequest>;

/// Static description of the simulated rotator.
pub struct RotatorMetadata;

impl RotatorMetadata {
    /// Device name.
    pub const NAME: &'static str = "Sample Rotator";
    /// Driver version.
    pub const VERSION: &'static str = "0.6";
    /// Device description.
    pub const DESCRIPTION: &'static str = "Sample ASCOM Rotator";
    /// Alpaca device type.
    pub const DEVICE_TYPE: &'static str = "Rotator";
    /// Unique device ID.
    pub const DEVICE_ID: &'static str = "1892ED30-92F3-4236-843E-DA8EEEF2D1CC";
    /// Driver information text.
    pub const INFO: &'static str = "Alpaca Sample Device\nImplements IRotatorV4\nASCOM Initiative";
    /// Highest served device number.
    pub const MAX_DEVICE_NUMBER: u32 = 0;
    /// IRotatorV4.
    pub const INTERFACE_VERSION: i32 = 4;
    /// Custom actions accepted by `action`.
    pub const SUPPORTED_ACTIONS: [&'static str; 2] = ["MyAction", "YourAction"];
}

// ============================================================================
// Routing Table
// ============================================================================

/// Why a `(verb, member)` pair has no responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// No such member.
    UnknownMember,
    /// Member exists but not for this verb.
    WrongMethod,
}

const ROUTES: &[(&str, RequestMethod, Responder)] = &[
    ("action", RequestMethod::Put, action),
    ("commandblind", RequestMethod::Put, command_not_implemented),
    ("commandbool", RequestMethod::Put, command_not_implemented),
    ("commandstring", RequestMethod::Put, command_not_implemented),
    ("description", RequestMethod::Get, description),
    ("driverinfo", RequestMethod::Get, driver_info),
    ("interfaceversion", RequestMethod::Get, interface_version),
    ("driverversion", RequestMethod::Get, driver_version),
    ("name", RequestMethod::Get, name),
    ("supportedactions", RequestMethod::Get, supported_actions),
    ("canreverse", RequestMethod::Get, can_reverse),
    ("connect", RequestMethod::Put, connect),
    ("connected", RequestMethod::Get, get_connected),
    ("connected", RequestMethod::Put, put_connected),
    ("connecting", RequestMethod::Get, connecting),
    ("devicestate", RequestMethod::Get, device_state),
    ("disconnect", RequestMethod::Put, disconnect),
    ("ismoving", RequestMethod::Get, is_moving),
    ("mechanicalposition", RequestMethod::Get, mechanical_position),
    ("position", RequestMethod::Get, position),
    ("reverse", RequestMethod::Get, get_reverse),
    ("reverse", RequestMethod::Put, put_reverse),
    ("stepsize", RequestMethod::Get, step_size),
    ("targetposition", RequestMethod::Get, target_position),
    ("halt", RequestMethod::Put, halt),
    ("move", RequestMethod::Put, move_relative),
    ("moveabsolute", RequestMethod::Put, move_absolute),
    ("movemechanical", RequestMethod::Put, move_mechanical),
    ("sync", RequestMethod::Put, sync),
];

/// Find the responder for a member (any case) and verb.
pub fn lookup(member: &str, method: RequestMethod) -> Result<Responder, RouteError> {
    let mut known = false;
    for (name, verb, responder) in ROUTES {
        if name.eq_ignore_ascii_case(member) {
            if *verb == method {
                return Ok(*responder);
            }
            known = true;
        }
    }
    Err(if known {
        RouteError::WrongMethod
    } else {
        RouteError::UnknownMember
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn property(
    ctx: &AlpacaContext,
    req: &AlpacaRequest,
    result: Result<EnvelopeValue, AlpacaError>,
) -> Envelope {
    match result {
        Ok(value) => Envelope::property(ctx, Some(value), req, ProtocolError::success()),
        Err(err) => Envelope::property(ctx, None, req, err.to_protocol(ctx.verbose_errors())),
    }
}

fn method(ctx: &AlpacaContext, req: &AlpacaRequest, result: Result<(), AlpacaError>) -> Envelope {
    let error = match result {
        Ok(()) => ProtocolError::success(),
        Err(err) => err.to_protocol(ctx.verbose_errors()),
    };
    Envelope::method(ctx, req, error, None)
}

fn require_connected(ctx: &AlpacaContext) -> Result<(), AlpacaError> {
    if ctx.rotator.with_device(|d| d.connected()) {
        Ok(())
    } else {
        Err(AlpacaError::NotConnected)
    }
}

/// Read a connected-only property.
fn connected_property<T, F>(ctx: &AlpacaContext, req: &AlpacaRequest, read: F) -> Envelope
where
    T: Into<EnvelopeValue>,
    F: FnOnce(&RotatorDevice) -> T,
{
    let result: Result<EnvelopeValue, AlpacaError> =
        require_connected(ctx).map(|()| ctx.rotator.with_device(|d| read(&*d)).into());
    property(ctx, req, result)
}

/// `Position` as a number, or `InvalidValue` naming the text.
fn position_field(text: &str) -> Result<f64, AlpacaError> {
    parse_float(text)
        .filter(|p| p.is_finite())
        .ok_or_else(|| AlpacaError::InvalidValue(format!("Position {text} not a valid float.")))
}

/// `Position` restricted to `[0, 360)`.
fn angle_field(text: &str) -> Result<f64, AlpacaError> {
    let position = position_field(text)?;
    if (0.0..360.0).contains(&position) {
        Ok(position)
    } else {
        Err(AlpacaError::InvalidValue(format!(
            "Invalid position {position} outside range 0 <= pos < 360."
        )))
    }
}

/// Shared shape of the connected-only PUT methods taking `Position`.
fn positioned<F>(
    ctx: &AlpacaContext,
    req: &AlpacaRequest,
    member: &str,
    parse: fn(&str) -> Result<f64, AlpacaError>,
    apply: F,
) -> Result<Envelope, BadRequest>
where
    F: FnOnce(f64) -> Result<(), RotatorError>,
{
    if let Err(err) = require_connected(ctx) {
        return Ok(method(ctx, req, Err(err)));
    }
    let text = req.require("Position")?;
    let result = parse(&text)
        .and_then(|position| apply(position).map_err(|e| AlpacaError::from_rotator(member, e)));
    Ok(method(ctx, req, result))
}

// ============================================================================
// Common Members
// ============================================================================

fn action(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let action_name = req.require("ActionName")?;
    let _parameters = req.require("ActionParameters")?;

    let known = RotatorMetadata::SUPPORTED_ACTIONS
        .iter()
        .find(|a| a.eq_ignore_ascii_case(&action_name));
    let result = match known {
        Some(action) => {
            info!("{action} called");
            Ok(())
        }
        None => Err(AlpacaError::ActionNotImplemented(action_name)),
    };
    Ok(method(ctx, req, result))
}

fn command_not_implemented(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(method(ctx, req, Err(AlpacaError::not_implemented())))
}

fn description(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(property(ctx, req, Ok(RotatorMetadata::DESCRIPTION.into())))
}

fn driver_info(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(property(ctx, req, Ok(RotatorMetadata::INFO.into())))
}

fn interface_version(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(property(ctx, req, Ok(RotatorMetadata::INTERFACE_VERSION.into())))
}

fn driver_version(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(property(ctx, req, Ok(RotatorMetadata::VERSION.into())))
}

fn name(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(property(ctx, req, Ok(RotatorMetadata::NAME.into())))
}

fn supported_actions(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let actions = RotatorMetadata::SUPPORTED_ACTIONS.to_vec();
    Ok(property(ctx, req, Ok(actions.into())))
}

fn connect(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let result = ctx
        .rotator
        .connect()
        .map_err(|e| AlpacaError::from_rotator("Connect", e));
    Ok(method(ctx, req, result))
}

fn get_connected(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let connected = ctx.rotator.with_device(|d| d.connected());
    Ok(property(ctx, req, Ok(connected.into())))
}

fn put_connected(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let connected = parse_bool(&req.require("Connected")?)?;
    let result = if connected {
        ctx.rotator.connect()
    } else {
        ctx.rotator.disconnect()
    };
    Ok(method(
        ctx,
        req,
        result.map_err(|e| AlpacaError::from_rotator("Connected", e)),
    ))
}

fn connecting(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let connecting = ctx.rotator.with_device(|d| d.connecting());
    Ok(property(ctx, req, Ok(connecting.into())))
}

fn device_state(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let result = require_connected(ctx).map(|()| {
        let device = ctx.rotator.snapshot();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        EnvelopeValue::NamedList(vec![
            StateValue::new("IsMoving", device.is_moving()),
            StateValue::new("MechanicalPosition", device.mechanical_position()),
            StateValue::new("Position", device.position()),
            StateValue::new("TimeStamp", timestamp),
        ])
    });
    Ok(property(ctx, req, result))
}

fn disconnect(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let result = ctx
        .rotator
        .disconnect()
        .map_err(|e| AlpacaError::from_rotator("Disconnect", e));
    Ok(method(ctx, req, result))
}

// ============================================================================
// Rotator Members
// ============================================================================

fn can_reverse(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    // IRotatorV3 and later must report true, whatever the device config says
    Ok(property(ctx, req, Ok(true.into())))
}

fn is_moving(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.is_moving()))
}

fn mechanical_position(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.mechanical_position()))
}

fn position(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.position()))
}

fn get_reverse(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.reverse()))
}

fn put_reverse(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    if let Err(err) = require_connected(ctx) {
        return Ok(method(ctx, req, Err(err)));
    }
    let reverse = parse_bool(&req.require("Reverse")?)?;
    ctx.rotator.with_device(|d| d.set_reverse(reverse));
    Ok(method(ctx, req, Ok(())))
}

fn step_size(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.step_size()))
}

fn target_position(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    Ok(connected_property(ctx, req, |d| d.target_position()))
}

fn halt(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    let result = require_connected(ctx).map(|()| ctx.rotator.halt());
    Ok(method(ctx, req, result))
}

fn move_relative(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    positioned(ctx, req, "Move", position_field, |delta| {
        ctx.rotator.move_relative(delta)
    })
}

fn move_absolute(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    positioned(ctx, req, "MoveAbsolute", angle_field, |target| {
        ctx.rotator.move_absolute(target)
    })
}

fn move_mechanical(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    positioned(ctx, req, "MoveMechanical", angle_field, |target| {
        ctx.rotator.move_mechanical(target)
    })
}

fn sync(ctx: &AlpacaContext, req: &AlpacaRequest) -> Result<Envelope, BadRequest> {
    positioned(ctx, req, "Sync", angle_field, |position| ctx.rotator.sync(position))
}
