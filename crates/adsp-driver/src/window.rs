//! Typed views of the register blocks.
//!
//! One struct per block — status/control, OCD, PGFSM, ADB400 — with named
//! accessors, so bit positions never leak out of `adsp_chip::regs` and into
//! the sequencing code.

use adsp_chip::regs::{self, adb400, control, dsr, pgfsm, status};
use adsp_chip::{dsp_window_base, DspId};

use crate::bus::RegisterBus;

// ── Status/control window ────────────────────────────────────────────────────

/// Status/control window of one DSP.
pub(crate) struct DspWindow<'b> {
    bus: &'b dyn RegisterBus,
    base: usize,
}

impl<'b> DspWindow<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus, id: DspId) -> Self {
        Self {
            bus,
            base: dsp_window_base(id),
        }
    }

    pub(crate) fn status(&self) -> Status {
        Status(self.bus.read32(self.base + regs::DSP_STATUS))
    }

    pub(crate) fn control(&self) -> Control {
        Control(self.bus.read32(self.base + regs::DSP_CONTROL))
    }

    /// Read-modify-write the control register.
    pub(crate) fn modify_control(&self, f: impl FnOnce(u32) -> u32) {
        let cur = self.bus.read32(self.base + regs::DSP_CONTROL);
        self.bus.write32(self.base + regs::DSP_CONTROL, f(cur));
    }
}

/// Snapshot of a DSP status register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Status(pub u32);

impl Status {
    pub(crate) fn waiti(self) -> bool {
        self.0 & status::WAITI != 0
    }
    pub(crate) fn active(self) -> bool {
        self.0 & status::ACTIVE != 0
    }
    pub(crate) fn powered(self) -> bool {
        self.0 & status::POWERED != 0
    }
    pub(crate) fn pwr_up(self) -> bool {
        self.0 & status::PWR_UP != 0
    }
    pub(crate) fn debug_mode(self) -> bool {
        self.0 & status::DEBUG_MODE != 0
    }
}

/// Snapshot of a DSP control register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Control(pub u32);

impl Control {
    pub(crate) fn reset(self) -> bool {
        self.0 & control::RESET != 0
    }
    pub(crate) fn halt_on_reset(self) -> bool {
        self.0 & control::HALT_ON_RESET != 0
    }
}

// ── OCD window ───────────────────────────────────────────────────────────────

/// On-chip-debug window of one DSP.
pub(crate) struct OcdWindow<'b> {
    bus: &'b dyn RegisterBus,
    base: usize,
}

impl<'b> OcdWindow<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus, id: DspId) -> Self {
        Self {
            bus,
            base: dsp_window_base(id),
        }
    }

    pub(crate) fn dcr(&self) -> u32 {
        self.bus.read32(self.base + regs::OCD_DCR)
    }

    pub(crate) fn write_dcr(&self, value: u32) {
        self.bus.write32(self.base + regs::OCD_DCR, value);
    }

    pub(crate) fn dsr(&self) -> Dsr {
        Dsr(self.bus.read32(self.base + regs::OCD_DSR))
    }

    /// Clear write-1-to-clear DSR bits.
    pub(crate) fn ack_dsr(&self, bits: u32) {
        self.bus.write32(self.base + regs::OCD_DSR, bits);
    }

    pub(crate) fn ddr(&self) -> u32 {
        self.bus.read32(self.base + regs::OCD_DDR)
    }

    pub(crate) fn write_ddr(&self, value: u32) {
        self.bus.write32(self.base + regs::OCD_DDR, value);
    }

    pub(crate) fn write_dir(&self, instr: u32) {
        self.bus.write32(self.base + regs::OCD_DIR, instr);
    }

    /// Access a family-specific register by its offset within the window.
    pub(crate) fn read_at(&self, rel: usize) -> u32 {
        self.bus.read32(self.base + rel)
    }

    pub(crate) fn write_at(&self, rel: usize, value: u32) {
        self.bus.write32(self.base + rel, value);
    }
}

/// Snapshot of a debug status register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dsr(pub u32);

impl Dsr {
    pub(crate) fn stopped(self) -> bool {
        self.0 & dsr::STOPPED != 0
    }
    pub(crate) fn exec_done(self) -> bool {
        self.0 & dsr::EXEC_DONE != 0
    }
    pub(crate) fn exec_exception(self) -> bool {
        self.0 & dsr::EXEC_EXCEPTION != 0
    }
    pub(crate) fn core_wrote_ddr(self) -> bool {
        self.0 & dsr::CORE_WROTE_DDR != 0
    }
    pub(crate) fn core_read_ddr(self) -> bool {
        self.0 & dsr::CORE_READ_DDR != 0
    }
    pub(crate) fn dbg_pwr_ready(self) -> bool {
        self.0 & dsr::DBG_PWR_READY != 0
    }
    pub(crate) fn cause(self) -> u32 {
        dsr::cause(self.0)
    }
}

// ── PGFSM block ──────────────────────────────────────────────────────────────

/// Shared power-gate sequencer block.
pub(crate) struct PgfsmBlock<'b> {
    bus: &'b dyn RegisterBus,
}

impl<'b> PgfsmBlock<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus) -> Self {
        Self { bus }
    }

    /// Issue a 2-bit command for one DSP. Other fields are written as zero,
    /// which the sequencer treats as no-command.
    pub(crate) fn command(&self, id: DspId, cmd: u32) {
        let shift = pgfsm::FIELD_WIDTH * id.index() as u32;
        self.bus
            .write32(regs::PGFSM_CMD, (cmd & pgfsm::FIELD_MASK) << shift);
    }

    /// 2-bit status field for one DSP.
    pub(crate) fn status_field(&self, id: DspId) -> u32 {
        let shift = pgfsm::FIELD_WIDTH * id.index() as u32;
        (self.bus.read32(regs::PGFSM_STATUS) >> shift) & pgfsm::FIELD_MASK
    }

    /// Write one delay word in the per-DSP timing block.
    pub(crate) fn write_timing(&self, id: DspId, word: usize, value: u32) {
        let base = regs::PGFSM_TIMING_BASE + id.index() * regs::PGFSM_TIMING_STRIDE;
        self.bus.write32(base + word, value);
    }
}

// ── ADB400 block ─────────────────────────────────────────────────────────────

/// Shared bridge-handshake block.
pub(crate) struct Adb400Block<'b> {
    bus: &'b dyn RegisterBus,
}

impl<'b> Adb400Block<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus) -> Self {
        Self { bus }
    }

    /// Drive all four bridge-request bits of one DSP high or low.
    pub(crate) fn set_requests(&self, id: DspId, on: bool) {
        let shift = adb400::BRIDGES_PER_DSP * id.index() as u32;
        let cur = self.bus.read32(regs::ADB400_REQ);
        let next = if on {
            cur | (adb400::NIBBLE_MASK << shift)
        } else {
            cur & !(adb400::NIBBLE_MASK << shift)
        };
        self.bus.write32(regs::ADB400_REQ, next);
    }

    /// Acknowledge nibble for one DSP.
    pub(crate) fn acks(&self, id: DspId) -> u32 {
        let shift = adb400::BRIDGES_PER_DSP * id.index() as u32;
        (self.bus.read32(regs::ADB400_ACK) >> shift) & adb400::NIBBLE_MASK
    }
}
