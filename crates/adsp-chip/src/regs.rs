//! Register map for the ADSP cluster.
//!
//! The cluster exposes one shared control block (PGFSM sequencer and ADB400
//! bridge handshake) followed by a 1 KiB window per DSP. All registers are
//! 32 bit. Offsets are relative to the mapped base of the cluster space.

// ── PGFSM power-gate sequencer ───────────────────────────────────────────────

/// Command register. Write a 2-bit command into the per-DSP field.
pub const PGFSM_CMD: usize = 0x000;
/// Status register, 2-bit state per DSP (see [`pgfsm`] for the encoding).
pub const PGFSM_STATUS: usize = 0x004;

/// First per-DSP timing block (four delay words per DSP).
pub const PGFSM_TIMING_BASE: usize = 0x010;
/// Stride between per-DSP timing blocks.
pub const PGFSM_TIMING_STRIDE: usize = 0x10;

/// PGFSM field layouts and the fixed timing constants the sequencer expects.
pub mod pgfsm {
    /// Bits per DSP in `PGFSM_CMD` / `PGFSM_STATUS`.
    pub const FIELD_WIDTH: u32 = 2;
    /// Mask of one per-DSP field.
    pub const FIELD_MASK: u32 = 0b11;

    /// Command: begin power-up.
    pub const CMD_POWER_UP: u32 = 0b01;
    /// Command: begin power-down.
    pub const CMD_POWER_DOWN: u32 = 0b10;

    /// Status: gates closed, domain on.
    pub const ST_ON: u32 = 0b00;
    /// Status: power-up in progress.
    pub const ST_ON_IN_PROGRESS: u32 = 0b01;
    /// Status: power-down in progress.
    pub const ST_OFF_IN_PROGRESS: u32 = 0b11;
    /// Status: gates open, domain off.
    pub const ST_OFF: u32 = 0b10;

    /// Offsets of the four delay words inside a timing block.
    pub const TIMING_RESET: usize = 0x0;
    /// Isolation-cell delay word offset.
    pub const TIMING_ISO: usize = 0x4;
    /// Power-down ramp delay word offset.
    pub const TIMING_PWRDN: usize = 0x8;
    /// Power-up ramp delay word offset.
    pub const TIMING_PWRUP: usize = 0xC;

    /// Reset deassertion delay, in PGFSM reference ticks.
    pub const DLY_RESET: u32 = 0x14;
    /// Isolation-cell settle delay.
    pub const DLY_ISO: u32 = 0x05;
    /// Power-down ramp delay.
    pub const DLY_PWRDN: u32 = 0x28;
    /// Power-up ramp delay.
    pub const DLY_PWRUP: u32 = 0x3C;
}

// ── ADB400 bridge handshake ──────────────────────────────────────────────────

/// Bridge request register, one nibble (four bridge request bits) per DSP.
pub const ADB400_REQ: usize = 0x100;
/// Bridge acknowledge register, matching nibble layout.
pub const ADB400_ACK: usize = 0x104;

/// ADB400 nibble layout.
pub mod adb400 {
    /// Request/ack bits per DSP (one per bridge).
    pub const BRIDGES_PER_DSP: u32 = 4;
    /// Mask of one per-DSP nibble.
    pub const NIBBLE_MASK: u32 = 0xF;
}

// ── Per-DSP window ───────────────────────────────────────────────────────────

/// Status register offset within a DSP window.
pub const DSP_STATUS: usize = 0x00;
/// Control register offset within a DSP window.
pub const DSP_CONTROL: usize = 0x04;

/// Status register bits.
pub mod status {
    /// Core has executed WAITI and is idle.
    pub const WAITI: u32 = 1 << 0;
    /// Core logic active.
    pub const ACTIVE: u32 = 1 << 1;
    /// Core power good.
    pub const POWERED: u32 = 1 << 2;
    /// Power-up sequence in flight.
    pub const PWR_UP: u32 = 1 << 3;
    /// Core halted in debug mode.
    pub const DEBUG_MODE: u32 = 1 << 4;
}

/// Control register bits.
pub mod control {
    /// Hold the core in reset.
    pub const RESET: u32 = 1 << 0;
    /// Gate the core clock.
    pub const CLK_GATE: u32 = 1 << 1;
    /// Boot from the alternate reset vector.
    pub const ALT_VECTOR: u32 = 1 << 2;
    /// Core power enable.
    pub const PWR_EN: u32 = 1 << 3;
    /// Power-domain request (no acknowledge exists for this bit).
    pub const PWR_REQ: u32 = 1 << 4;
    /// Halt at the reset vector instead of executing.
    pub const HALT_ON_RESET: u32 = 1 << 5;
}

// ── On-chip debug window ─────────────────────────────────────────────────────

/// Debug control register offset within a DSP window.
pub const OCD_DCR: usize = 0x20;
/// Debug status register offset.
pub const OCD_DSR: usize = 0x24;
/// Data exchange register offset.
pub const OCD_DDR: usize = 0x28;
/// Instruction inject register offset.
pub const OCD_DIR: usize = 0x2C;
/// First per-breakpoint control register (Gen2 cores only).
pub const OCD_IBC_BASE: usize = 0x30;
/// Stride between per-breakpoint control registers.
pub const OCD_IBC_STRIDE: usize = 0x4;

/// Debug control register bits.
pub mod dcr {
    /// Enable the OCD port.
    pub const ENABLE: u32 = 1 << 0;
    /// Request a debug interrupt (halt).
    pub const DEBUG_INTERRUPT: u32 = 1 << 1;
}

/// Debug status register bits. `EXEC_*` and the DDR handshake bits are
/// write-1-to-clear; the rest are live status.
pub mod dsr {
    /// Core is stopped in the debug state.
    pub const STOPPED: u32 = 1 << 0;
    /// Injected instruction retired.
    pub const EXEC_DONE: u32 = 1 << 1;
    /// Injected instruction raised an exception.
    pub const EXEC_EXCEPTION: u32 = 1 << 2;
    /// Core wrote the data exchange register.
    pub const CORE_WROTE_DDR: u32 = 1 << 3;
    /// Core read the data exchange register.
    pub const CORE_READ_DDR: u32 = 1 << 4;
    /// Debug power domain ready.
    pub const DBG_PWR_READY: u32 = 1 << 5;

    /// Halt-cause field position.
    pub const CAUSE_SHIFT: u32 = 8;
    /// Halt-cause field mask (after shifting).
    pub const CAUSE_MASK: u32 = 0xF;

    /// Extract the halt-cause code from a DSR value.
    #[must_use]
    pub const fn cause(dsr: u32) -> u32 {
        (dsr >> CAUSE_SHIFT) & CAUSE_MASK
    }

    /// Build the cause field for a DSR value.
    #[must_use]
    pub const fn with_cause(dsr: u32, cause: u32) -> u32 {
        (dsr & !(CAUSE_MASK << CAUSE_SHIFT)) | ((cause & CAUSE_MASK) << CAUSE_SHIFT)
    }
}

/// Per-breakpoint control register bits (Gen2 layout).
pub mod ibc {
    /// Breakpoint enable.
    pub const ENABLE: u32 = 1 << 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_block_registers_non_overlapping() {
        assert_ne!(PGFSM_CMD, PGFSM_STATUS);
        assert!(PGFSM_TIMING_BASE + 8 * PGFSM_TIMING_STRIDE <= ADB400_REQ);
        assert_ne!(ADB400_REQ, ADB400_ACK);
    }

    #[test]
    fn dsp_window_registers_non_overlapping() {
        assert_ne!(DSP_STATUS, DSP_CONTROL);
        assert!(DSP_CONTROL + 4 <= OCD_DCR);
        assert_eq!(OCD_DIR - OCD_DCR, 0xC);
        assert!(OCD_IBC_BASE > OCD_DIR);
    }

    #[test]
    fn status_and_control_bits_disjoint_within_register() {
        let all_status =
            status::WAITI | status::ACTIVE | status::POWERED | status::PWR_UP | status::DEBUG_MODE;
        assert_eq!(all_status.count_ones(), 5);

        let all_control = control::RESET
            | control::CLK_GATE
            | control::ALT_VECTOR
            | control::PWR_EN
            | control::PWR_REQ
            | control::HALT_ON_RESET;
        assert_eq!(all_control.count_ones(), 6);
    }

    #[test]
    fn dsr_cause_field_round_trips() {
        let v = dsr::with_cause(dsr::STOPPED, 0x4);
        assert_eq!(dsr::cause(v), 0x4);
        assert_ne!(v & dsr::STOPPED, 0);
        // Cause field must not alias the handshake bits.
        assert_eq!(dsr::with_cause(0, 0xF) & 0xFF, 0);
    }

    #[test]
    fn pgfsm_settled_encodings() {
        assert_eq!(pgfsm::ST_ON, 0b00);
        assert_eq!(pgfsm::ST_OFF, 0b10);
        assert_ne!(pgfsm::ST_ON_IN_PROGRESS, pgfsm::ST_OFF_IN_PROGRESS);
    }
}
