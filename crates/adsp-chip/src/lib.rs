//! Hardware description of the ADSP cluster.
//!
//! Eight heterogeneous DSP cores share one power-gate sequencer (PGFSM), one
//! set of ADB400 bridge handshakes, and two clock domains. This crate holds
//! everything that is a property of the silicon rather than of the driver:
//! register offsets and bit positions, the instruction encodings injected
//! through the on-chip-debug port, the per-family capability tables, and the
//! fixed cluster topology.
//!
//! All values are `const`; nothing here touches hardware.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod cluster;
mod family;
pub mod isa;
pub mod regs;

pub use cluster::{
    dsp_window_base, DspId, ALL_IDS, DSP_COUNT, DSP_WINDOW_BASE, DSP_WINDOW_STRIDE, REG_SPACE_SIZE,
};
pub use family::{BreakpointLayout, ClockDomain, DpmLevel, DspFamily, NUM_BREAKPOINTS};
