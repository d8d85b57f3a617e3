//! Bounded status polling.
//!
//! Every primitive in the PGFSM, ADB400, OCD, and mode-transition paths waits
//! on hardware the same way: re-check a status condition a fixed number of
//! times with a fixed delay between checks, then give up with `Timeout`.

use std::time::Duration;

use crate::bus::RegisterBus;
use crate::error::{DspError, Result};

/// Poll `check` up to `max_iters` times, sleeping `interval` between
/// attempts via the bus. Returns the first `Some` value, or
/// `Timeout { op, max_iters }` once the budget is exhausted.
///
/// The delay is routed through [`RegisterBus::delay`] so a simulated bus can
/// run at full speed.
pub(crate) fn poll_until<T>(
    bus: &dyn RegisterBus,
    op: &'static str,
    max_iters: u32,
    interval: Duration,
    mut check: impl FnMut() -> Option<T>,
) -> Result<T> {
    for _ in 0..max_iters {
        if let Some(value) = check() {
            return Ok(value);
        }
        bus.delay(interval);
    }
    Err(DspError::timeout(op, max_iters))
}
