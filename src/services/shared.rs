//! Shared rotator state and the server context.
//!
//! [`SharedRotator`] owns the single [`RotatorDevice`] behind one mutex and
//! drives it: moves spawn a stepping task, asynchronous connects spawn a
//! delay timer. Responders and the stepping task both go through the same
//! lock, so a step can never interleave with a `move`/`sync`/`halt`.
//!
//! [`AlpacaContext`] bundles everything a responder needs (transaction
//! sequencer, rotator, configuration) and is handed to the router as state.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use alpaca_rotator::services::AlpacaContext;
//!
//! let ctx = Arc::new(AlpacaContext::new(config));
//!
//! // Reads take the lock briefly
//! let position = ctx.rotator.with_device(|d| d.position());
//!
//! // Moves return immediately; the stepping task finishes the motion
//! ctx.rotator.move_absolute(90.0)?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{Config, DeviceConfig};
use crate::rotator::{RotatorDevice, RotatorError};
use crate::transaction::TransactionSequencer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Shared Rotator
// ============================================================================

/// Thread-safe handle to the rotator plus its stepping task.
///
/// # Lock order
///
/// Operations that start or stop motion take the stepper lock first and the
/// device lock second. The stepping task only ever takes the device lock.
pub struct SharedRotator {
    device: Arc<Mutex<RotatorDevice>>,
    stepper: Mutex<Option<JoinHandle<()>>>,
    step_interval: Duration,
    sync_connect: bool,
    connect_delay: Duration,
}

impl SharedRotator {
    /// Create a disconnected rotator from its configuration.
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(RotatorDevice::new(config.clone()))),
            stepper: Mutex::new(None),
            step_interval: config.step_interval(),
            sync_connect: config.sync_write_connected,
            connect_delay: config.connect_delay(),
        }
    }

    /// Access the rotator under the lock.
    ///
    /// The closure pattern keeps the lock from being held across await points.
    pub fn with_device<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut RotatorDevice) -> R,
    {
        let mut guard = lock(&self.device);
        f(&mut guard)
    }

    /// Copy of the current rotator state.
    pub fn snapshot(&self) -> RotatorDevice {
        lock(&self.device).clone()
    }

    /// Connect using the configured policy.
    ///
    /// Synchronous connects complete before returning. Otherwise the rotator
    /// reports `connecting` until the delay elapses.
    pub fn connect(&self) -> Result<(), RotatorError> {
        if self.sync_connect {
            self.with_device(|d| d.connect());
            info!("rotator connected");
            return Ok(());
        }

        let runtime = current_runtime()?;
        let generation = self.with_device(|d| d.begin_connect().then(|| d.connect_generation()));
        let Some(generation) = generation else {
            return Ok(());
        };
        info!(delay_ms = self.connect_delay.as_millis() as u64, "rotator connecting");

        let device = Arc::clone(&self.device);
        let delay = self.connect_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let completed = {
                let mut d = lock(&device);
                // Only the connect that armed this timer may complete
                if d.connecting() && d.connect_generation() == generation {
                    d.complete_connect();
                    true
                } else {
                    false
                }
            };
            if completed {
                info!("rotator connected");
            }
        });
        Ok(())
    }

    /// Disconnect. Fails while moving.
    pub fn disconnect(&self) -> Result<(), RotatorError> {
        self.with_device(|d| d.disconnect())?;
        info!("rotator disconnected");
        Ok(())
    }

    /// Start a relative move.
    pub fn move_relative(&self, delta: f64) -> Result<(), RotatorError> {
        self.start_motion(|d| d.move_relative(delta))
    }

    /// Start a move to a virtual position.
    pub fn move_absolute(&self, position: f64) -> Result<(), RotatorError> {
        self.start_motion(|d| d.move_absolute(position))
    }

    /// Start a move to a mechanical position.
    pub fn move_mechanical(&self, position: f64) -> Result<(), RotatorError> {
        self.start_motion(|d| d.move_mechanical(position))
    }

    /// Sync the virtual position. Fails while moving.
    pub fn sync(&self, position: f64) -> Result<(), RotatorError> {
        self.with_device(|d| d.sync(position))
    }

    /// Stop motion and cancel the stepping task.
    pub fn halt(&self) {
        let mut stepper = lock(&self.stepper);
        self.with_device(|d| d.halt());
        if let Some(task) = stepper.take() {
            task.abort();
        }
        info!("rotator halted");
    }

    fn start_motion<F>(&self, op: F) -> Result<(), RotatorError>
    where
        F: FnOnce(&mut RotatorDevice) -> Result<(), RotatorError>,
    {
        let runtime = current_runtime()?;
        let mut stepper = lock(&self.stepper);
        self.with_device(op)?;

        // A previous stepper can only be finishing (the move above would have
        // failed otherwise); replace it so exactly one drives this motion.
        if let Some(stale) = stepper.take() {
            stale.abort();
        }
        let device = Arc::clone(&self.device);
        let period = self.step_interval;
        *stepper = Some(runtime.spawn(run_stepper(device, period)));
        Ok(())
    }
}

impl Drop for SharedRotator {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.stepper).take() {
            task.abort();
        }
    }
}

fn current_runtime() -> Result<Handle, RotatorError> {
    Handle::try_current().map_err(|e| RotatorError::NoRuntime(e.to_string()))
}

/// Step the rotator once per `period` until the move completes or is halted.
async fn run_stepper(device: Arc<Mutex<RotatorDevice>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let (more, position) = {
            let mut d = lock(&device);
            (d.step(), d.position())
        };
        if !more {
            debug!(position, "rotator motion finished");
            break;
        }
    }
}

// ============================================================================
// Server Context
// ============================================================================

/// Everything the responders share.
pub struct AlpacaContext {
    /// Source of `ServerTransactionID`s.
    pub sequencer: TransactionSequencer,
    /// The rotator.
    pub rotator: SharedRotator,
    /// Server configuration.
    pub config: Config,
}

impl AlpacaContext {
    /// Build the context for a configuration.
    pub fn new(config: Config) -> Self {
        Self {
            sequencer: TransactionSequencer::new(),
            rotator: SharedRotator::new(&config.device),
            config,
        }
    }

    /// Whether driver errors should carry their underlying cause.
    pub fn verbose_errors(&self) -> bool {
        self.config.server.verbose_driver_exceptions
    }
}
