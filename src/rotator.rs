//! Simulated rotator and its motion state machine.
//!
//! This module provides [`RotatorDevice`], the central component that owns
//! the rotator's mechanical state and exposes the typed operations the
//! protocol responders call into.
//!
//! # Mechanical vs virtual position
//!
//! The *mechanical* position is the raw angle of the stage. The *virtual*
//! position is what clients see: the mechanical position shifted by the
//! offset established with [`RotatorDevice::sync`]. Both are kept in
//! `[0, 360)`.
//!
//! # Example
//!
//! ```rust
//! use alpaca_rotator::{RotatorDevice, DeviceConfig};
//!
//! let mut rotator = RotatorDevice::new(DeviceConfig::default());
//! rotator.complete_connect();
//!
//! rotator.move_absolute(90.0).unwrap();
//! while rotator.step() {}
//!
//! assert!((rotator.position() - 90.0).abs() <= rotator.step_size());
//! assert!(!rotator.is_moving());
//! ```
//!
//! The device itself never schedules anything. [`RotatorDevice::step`] is
//! driven by the stepping task owned by `services::SharedRotator` (or by a
//! test loop, as above).

use tracing::{debug, warn};

use crate::config::DeviceConfig;

/// Map any angle into `[0, 360)`.
///
/// ```rust
/// use alpaca_rotator::rotator::wrap360;
///
/// assert_eq!(wrap360(370.0), 10.0);
/// assert_eq!(wrap360(-90.0), 270.0);
/// assert_eq!(wrap360(360.0), 0.0);
/// ```
pub fn wrap360(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Map any angle into `[-180, 180)`.
pub fn wrap180(degrees: f64) -> f64 {
    wrap360(degrees + 180.0) - 180.0
}

/// Errors raised by rotator operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RotatorError {
    /// The operation is not allowed while the rotator is moving.
    #[error("Cannot {0} while the rotator is moving")]
    Busy(&'static str),
    /// The stepping task could not be scheduled.
    #[error("No async runtime available to drive the rotator: {0}")]
    NoRuntime(String),
}

/// Connection lifecycle of the rotator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Connect requested, not yet complete.
    Connecting,
    /// Connected and idle.
    Idle,
    /// Connected and moving toward the target.
    Moving,
}

/// Simulated rotator.
///
/// The rotator itself is not thread-safe. The services layer wraps it in
/// `SharedRotator`, which keeps every mutation under a single mutex.
#[derive(Debug, Clone)]
pub struct RotatorDevice {
    can_reverse: bool,
    step_size: f64,
    steps_per_sec: u32,

    reverse: bool,
    mech_pos: f64,
    target_mech_pos: f64,
    pos_offset: f64,
    is_moving: bool,
    connecting: bool,
    connected: bool,
    connect_generation: u64,
}

impl RotatorDevice {
    /// Create a disconnected rotator at mechanical position 0.
    ///
    /// A step size that is not a positive number falls back to the default.
    pub fn new(settings: DeviceConfig) -> Self {
        let step_size = if settings.step_size.is_finite() && settings.step_size > 0.0 {
            settings.step_size
        } else {
            let fallback = DeviceConfig::default().step_size;
            warn!(step_size = settings.step_size, fallback, "unusable step size");
            fallback
        };
        Self {
            can_reverse: settings.can_reverse,
            step_size,
            steps_per_sec: settings.steps_per_sec.max(1),
            reverse: false,
            mech_pos: 0.0,
            target_mech_pos: 0.0,
            pos_offset: 0.0,
            is_moving: false,
            connecting: false,
            connected: false,
            connect_generation: 0,
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Start a connect. Returns `false` when already connected (nothing to do).
    pub fn begin_connect(&mut self) -> bool {
        if self.connected {
            self.connecting = false;
            debug!("already connected");
            return false;
        }
        self.connecting = true;
        self.connect_generation += 1;
        true
    }

    /// Counter bumped by every connect that actually starts.
    ///
    /// A deferred completion compares it to tell whether it still belongs to
    /// the pending connect.
    pub fn connect_generation(&self) -> u64 {
        self.connect_generation
    }

    /// Finish a connect started with [`begin_connect`](Self::begin_connect).
    pub fn complete_connect(&mut self) {
        self.connecting = false;
        self.connected = true;
    }

    /// Connect synchronously. Idempotent.
    pub fn connect(&mut self) {
        if self.begin_connect() {
            self.complete_connect();
        }
    }

    /// Disconnect. Fails while moving; idempotent when already disconnected.
    pub fn disconnect(&mut self) -> Result<(), RotatorError> {
        if !self.connected {
            self.connecting = false;
            debug!("already disconnected");
            return Ok(());
        }
        if self.is_moving {
            return Err(RotatorError::Busy("disconnect"));
        }
        self.connected = false;
        self.connecting = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Motion
    // ------------------------------------------------------------------

    /// Start a move of `delta` degrees.
    ///
    /// The target is `mechanical + delta - offset`, wrapped into `[0, 360)`.
    /// Any finite delta is accepted.
    pub fn move_relative(&mut self, delta: f64) -> Result<(), RotatorError> {
        self.ensure_idle("start a move")?;
        self.start_motion(wrap360(self.mech_pos + delta - self.pos_offset));
        debug!(delta, target = self.target_position(), "relative move");
        Ok(())
    }

    /// Start a move to a virtual position in `[0, 360)`.
    pub fn move_absolute(&mut self, position: f64) -> Result<(), RotatorError> {
        self.ensure_idle("start a move")?;
        self.start_motion(self.to_mechanical(position));
        debug!(position, "absolute move");
        Ok(())
    }

    /// Start a move to a mechanical position in `[0, 360)`, ignoring the sync offset.
    pub fn move_mechanical(&mut self, position: f64) -> Result<(), RotatorError> {
        self.ensure_idle("start a move")?;
        self.start_motion(wrap360(position));
        debug!(position, "mechanical move");
        Ok(())
    }

    /// Declare the current mechanical position to be `position` in virtual terms.
    ///
    /// The offset is kept in `[-180, 180)`. Nothing moves.
    pub fn sync(&mut self, position: f64) -> Result<(), RotatorError> {
        self.ensure_idle("sync")?;
        self.pos_offset = wrap180(position - self.mech_pos);
        debug!(position, offset = self.pos_offset, "synced");
        Ok(())
    }

    /// Stop any motion. Always succeeds.
    pub fn halt(&mut self) {
        self.is_moving = false;
    }

    /// Advance one step toward the target.
    ///
    /// Returns `true` while more steps are needed. Calling this while not
    /// moving performs no motion and returns `false`.
    pub fn step(&mut self) -> bool {
        if !self.is_moving {
            return false;
        }
        let delta = wrap180(self.target_mech_pos - self.mech_pos);
        if delta.abs() <= self.step_size / 2.0 {
            self.is_moving = false;
            return false;
        }
        let step = if delta > 0.0 {
            self.step_size
        } else {
            -self.step_size
        };
        self.mech_pos = wrap360(self.mech_pos + step);
        true
    }

    fn ensure_idle(&self, what: &'static str) -> Result<(), RotatorError> {
        if self.is_moving {
            Err(RotatorError::Busy(what))
        } else {
            Ok(())
        }
    }

    fn start_motion(&mut self, target_mech: f64) {
        self.target_mech_pos = target_mech;
        self.is_moving = true;
    }

    fn to_mechanical(&self, position: f64) -> f64 {
        wrap360(position - self.pos_offset)
    }

    fn to_virtual(&self, mech: f64) -> f64 {
        wrap360(mech + self.pos_offset)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Client-visible position, including the sync offset.
    pub fn position(&self) -> f64 {
        self.to_virtual(self.mech_pos)
    }

    /// Raw mechanical position.
    pub fn mechanical_position(&self) -> f64 {
        self.mech_pos
    }

    /// Destination of the current (or last) move, in virtual terms.
    pub fn target_position(&self) -> f64 {
        self.to_virtual(self.target_mech_pos)
    }

    /// Offset applied by the last sync.
    pub fn position_offset(&self) -> f64 {
        self.pos_offset
    }

    /// Whether a move is in progress.
    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    /// Whether the rotator is connected.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Whether a connect is in progress.
    pub fn connecting(&self) -> bool {
        self.connecting
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        match (self.connected, self.connecting, self.is_moving) {
            (true, _, true) => ConnectionState::Moving,
            (true, _, false) => ConnectionState::Idle,
            (false, true, _) => ConnectionState::Connecting,
            (false, false, _) => ConnectionState::Disconnected,
        }
    }

    /// Rotation direction flag.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// Set the rotation direction flag.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Configured reverse capability. The protocol surface always reports `true`.
    pub fn can_reverse(&self) -> bool {
        self.can_reverse
    }

    /// Step size in degrees.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Stepping rate.
    pub fn steps_per_sec(&self) -> u32 {
        self.steps_per_sec
    }
}
