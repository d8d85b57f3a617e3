//! Per-resource state.

use adsp_chip::{DpmLevel, DspFamily};

/// Operating mode of one DSP.
///
/// `ExitOcd` is a transition request only — it releases a debug-halted core
/// back toward `Run` and is never reported by `read_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspMode {
    /// Power removed, core held in reset. The safe quiescent state.
    Off,
    /// Powered but not released into execution.
    Stop,
    /// Halted in debug mode.
    Pause,
    /// Released and executing.
    Run,
    /// Released but halted at the reset vector for a debugger.
    HaltOnReset,
    /// Leave debug halt and resume execution.
    ExitOcd,
}

/// Opaque descriptor handle owned by the external memory manager. This core
/// only tracks lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemHandle(pub u64);

/// Mutable state of one DSP resource, guarded by the per-resource lock and
/// mutated only by the state machine.
#[derive(Debug)]
pub(crate) struct DspState {
    /// Last submitted mode. A failed transition leaves this updated while
    /// the confirmed mode may be stale; `read_mode` is the authority.
    pub submit_mode: DspMode,
    /// Boot from the alternate reset vector on the next release.
    pub alt_reset_vector: bool,
    /// Power-domain bypass: true in hardware-less deployments. Snapshotted
    /// from the platform when the resource is acquired.
    pub bypass: bool,
    /// Current DPM rate in Hz, voted whenever the core is active.
    pub clock_rate: u64,
    /// Descriptors the external memory manager has attached to this core.
    pub mem_handles: Vec<MemHandle>,
}

impl DspState {
    pub(crate) fn new(family: DspFamily) -> Self {
        Self {
            submit_mode: DspMode::Off,
            alt_reset_vector: false,
            bypass: false,
            clock_rate: family.dpm_hz(DpmLevel::Turbo),
            mem_handles: Vec::new(),
        }
    }
}
