//! Power, clock, and debug state management for the ADSP cluster.
//!
//! Eight heterogeneous DSP cores (six Gen1, two Gen2) share power-gating and
//! clock infrastructure; this crate arbitrates them between competing client
//! contexts and drives the per-core mode state machine:
//!
//! ```text
//! OFF ⇄ STOP/RUN ⇄ PAUSE (debug halt) → EXIT_OCD → RUN
//!            └→ HALT_ON_RESET (halt at the reset vector)
//! ```
//!
//! A mode request flows registry → state machine → {clock voting, PGFSM,
//! ADB400 handshake, OCD} → register bus. Everything runs synchronously on
//! the caller's context with bounded busy-polling; do not call from a
//! context that cannot block.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use adsp_driver::{DspId, DspMode, DspRegistry, NopTransport, SimBus};
//!
//! # fn main() -> adsp_driver::Result<()> {
//! let registry = DspRegistry::new(
//!     Arc::new(SimBus::new()),
//!     Arc::new(NopTransport),
//!     false,
//! );
//!
//! let client = registry.attach_client();
//! registry.set_mode(client, DspId(0), DspMode::Run)?;
//! assert_eq!(registry.read_mode(DspId(0))?, DspMode::Run);
//! registry.detach_client(client)?;
//! # Ok(())
//! # }
//! ```
//!
//! Backends: [`MmioBus`] maps the real register block; [`SimBus`] is the
//! software model used for CI and hardware-less deployments (where resources
//! run with the power-domain bypass flag set).

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

mod adb400;
mod bus;
mod clock;
mod error;
mod ocd;
mod pgfsm;
mod poll;
mod registry;
mod resource;
mod state;
mod window;

pub use adsp_chip::{ClockDomain, DpmLevel, DspFamily, DspId};
pub use bus::{MmioBus, RegisterBus, SimBus};
pub use clock::{ClockTransport, NopTransport};
pub use error::{DspError, Result};
pub use pgfsm::PgfsmState;
pub use registry::{ClientId, DspRegistry};
pub use resource::DspResource;
pub use state::{DspMode, MemHandle};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ClientId, ClockTransport, DspError, DspId, DspMode, DspRegistry, DspResource, MemHandle,
        NopTransport, RegisterBus, Result, SimBus,
    };
}
