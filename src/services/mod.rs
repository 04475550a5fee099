//! Network services for the Alpaca rotator.
//!
//! - `web`: axum HTTP server for the device, management and setup APIs
//! - `discovery`: UDP responder for Alpaca discovery broadcasts
//!
//! All HTTP handlers share one [`AlpacaContext`] wrapped in `Arc`, which
//! owns the transaction sequencer and the single [`SharedRotator`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use alpaca_rotator::services::{build_router, AlpacaContext};
//!
//! let ctx = Arc::new(AlpacaContext::new(config));
//! let router = build_router(Arc::clone(&ctx), &ctx.config.network);
//! ```
//!
//! Request handling runs through three layers: [`dispatch`] picks the
//! responder for the member, [`PreProcess`] validates the request, and the
//! responder builds the [`Envelope`].

pub mod discovery;
pub mod envelope;
pub mod management;
pub mod request;
pub mod responders;
pub mod shared;
pub mod validate;
pub mod web;

// Re-exports
pub use discovery::*;
pub use envelope::*;
pub use request::*;
pub use responders::{lookup, Responder, RotatorMetadata, RouteError};
pub use shared::*;
pub use validate::*;
pub use web::*;
