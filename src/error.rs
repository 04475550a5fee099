//! Alpaca protocol error taxonomy.
//!
//! These errors travel *inside* a successful HTTP response: the transport
//! worked, the operation did not. [`AlpacaError`] names each condition;
//! [`ProtocolError`] is the `{Number, Message}` pair written into the
//! response envelope.
//!
//! | Condition | Number |
//! |-----------|--------|
//! | success | `0x000` |
//! | [`AlpacaError::NotImplemented`] | `0x400` |
//! | [`AlpacaError::InvalidValue`] | `0x401` |
//! | [`AlpacaError::NotConnected`] | `0x407` |
//! | [`AlpacaError::InvalidOperation`] | `0x40B` |
//! | [`AlpacaError::ActionNotImplemented`] | `0x40C` |
//! | [`AlpacaError::Driver`] | `0x500..=0xFFF` |

use crate::rotator::RotatorError;

/// Error number for a property or method that is deliberately unimplemented.
pub const NOT_IMPLEMENTED: u32 = 0x400;
/// Error number for a parameter that failed range or type validation.
pub const INVALID_VALUE: u32 = 0x401;
/// Error number for an operation that requires a connection.
pub const NOT_CONNECTED: u32 = 0x407;
/// Error number for an operation that is invalid in the current state.
pub const INVALID_OPERATION: u32 = 0x40B;
/// Error number for an unknown custom action.
pub const ACTION_NOT_IMPLEMENTED: u32 = 0x40C;
/// Lowest driver-specific error number.
pub const DRIVER_ERROR_BASE: u32 = 0x500;
/// Highest driver-specific error number.
pub const DRIVER_ERROR_MAX: u32 = 0xFFF;

/// Protocol-level failure of a property read or method call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlpacaError {
    /// Property or method intentionally unimplemented.
    #[error("{0}")]
    NotImplemented(String),
    /// Parameter failed range/type validation.
    #[error("{0}")]
    InvalidValue(String),
    /// Operation requires a connected device.
    #[error("The device is not connected")]
    NotConnected,
    /// Operation not valid in the current state.
    #[error("{0}")]
    InvalidOperation(String),
    /// Unknown custom action name.
    #[error("The requested action {0} is not implemented in this driver")]
    ActionNotImplemented(String),
    /// Unexpected internal failure.
    #[error("{message}")]
    Driver {
        /// Driver-specific number in `0x500..=0xFFF`.
        number: u32,
        /// What failed.
        message: String,
        /// Description of the underlying cause.
        cause: String,
    },
}

impl AlpacaError {
    /// Generic "not implemented" error.
    pub fn not_implemented() -> Self {
        Self::NotImplemented("Property or method not implemented".into())
    }

    /// Wrap an unexpected failure. Numbers outside the driver range become `0x500`.
    pub fn driver(number: u32, message: impl Into<String>, cause: impl ToString) -> Self {
        let number = if (DRIVER_ERROR_BASE..=DRIVER_ERROR_MAX).contains(&number) {
            number
        } else {
            DRIVER_ERROR_BASE
        };
        Self::Driver {
            number,
            message: message.into(),
            cause: cause.to_string(),
        }
    }

    /// Map a rotator failure raised while serving `member`.
    pub fn from_rotator(member: &str, err: RotatorError) -> Self {
        match err {
            RotatorError::Busy(_) => Self::InvalidOperation(err.to_string()),
            RotatorError::NoRuntime(_) => {
                Self::driver(DRIVER_ERROR_BASE, format!("Rotator.{member} failed"), err)
            }
        }
    }

    /// Protocol error number.
    pub fn number(&self) -> u32 {
        match self {
            Self::NotImplemented(_) => NOT_IMPLEMENTED,
            Self::InvalidValue(_) => INVALID_VALUE,
            Self::NotConnected => NOT_CONNECTED,
            Self::InvalidOperation(_) => INVALID_OPERATION,
            Self::ActionNotImplemented(_) => ACTION_NOT_IMPLEMENTED,
            Self::Driver { number, .. } => *number,
        }
    }

    /// Convert to the envelope pair, optionally including driver causes.
    pub fn to_protocol(&self, verbose: bool) -> ProtocolError {
        let message = match self {
            Self::Driver { message, cause, .. } if verbose => format!("{message}\n{cause}"),
            other => other.to_string(),
        };
        ProtocolError {
            number: self.number(),
            message,
        }
    }
}

/// The `{Number, Message}` pair carried by every response envelope.
///
/// The default value is the success sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolError {
    /// Error number, `0` on success.
    pub number: u32,
    /// Error message, empty on success.
    pub message: String,
}

impl ProtocolError {
    /// The success sentinel.
    pub fn success() -> Self {
        Self::default()
    }

    /// Whether this represents success.
    pub fn is_success(&self) -> bool {
        self.number == 0
    }
}

impl From<&AlpacaError> for ProtocolError {
    fn from(err: &AlpacaError) -> Self {
        err.to_protocol(false)
    }
}

impl From<AlpacaError> for ProtocolError {
    fn from(err: AlpacaError) -> Self {
        Self::from(&err)
    }
}
