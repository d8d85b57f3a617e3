//! On-chip-debug protocol engine.
//!
//! Drives a halted core through the four debug registers: control (DCR),
//! status (DSR), data exchange (DDR), and instruction inject (DIR). The
//! cores have no immediate-load instruction reachable from the debug port,
//! so every register access is a composite of injected RSR/WSR steps with a
//! DDR handshake in the middle.
//!
//! Every operation returns success immediately when the resource is
//! bypassed; the getters then report zero.

use std::time::Duration;

use adsp_chip::isa;
use adsp_chip::regs::{dcr, dsr, ibc};
use adsp_chip::{BreakpointLayout, DspFamily, DspId, NUM_BREAKPOINTS};

use crate::bus::RegisterBus;
use crate::error::{DspError, Result};
use crate::poll::poll_until;
use crate::window::OcdWindow;

const ENTER_POLLS: u32 = 1000;
const EXEC_POLLS: u32 = 100;
const DDR_POLLS: u32 = 100;
const DBG_PWR_POLLS: u32 = 100;
const POLL_INTERVAL: Duration = Duration::from_micros(100);
const BREAKPOINT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Debug engine for one DSP.
pub(crate) struct OcdEngine<'b> {
    bus: &'b dyn RegisterBus,
    win: OcdWindow<'b>,
    id: DspId,
    family: DspFamily,
    bypass: bool,
}

impl<'b> OcdEngine<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus, id: DspId, family: DspFamily, bypass: bool) -> Self {
        Self {
            bus,
            win: OcdWindow::new(bus, id),
            id,
            family,
            bypass,
        }
    }

    /// Wait for the debug power domain to report ready.
    pub(crate) fn wait_debug_power(&self) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        poll_until(self.bus, "debug power", DBG_PWR_POLLS, POLL_INTERVAL, || {
            self.win.dsr().dbg_pwr_ready().then_some(())
        })
    }

    /// Enable the debug port and halt the core.
    pub(crate) fn enter(&self) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "entering debug halt");
        self.win.write_dcr(dcr::ENABLE | dcr::DEBUG_INTERRUPT);
        poll_until(self.bus, "debug halt", ENTER_POLLS, POLL_INTERVAL, || {
            self.win.dsr().stopped().then_some(())
        })
    }

    /// Disable the debug port. The core state is not confirmed.
    pub(crate) fn exit(&self) {
        if self.bypass {
            return;
        }
        let cur = self.win.dcr();
        self.win.write_dcr(cur & !dcr::ENABLE);
    }

    /// Release a halted core back into execution: drop the halt request,
    /// then disable the port.
    pub(crate) fn resume(&self) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "resuming from debug halt");
        let cur = self.win.dcr();
        self.win.write_dcr(cur & !dcr::DEBUG_INTERRUPT);
        self.exit();
        Ok(())
    }

    /// Inject one instruction and wait for it to retire. An exec exception
    /// aborts the composite operation in flight.
    pub(crate) fn exec(&self, instr: u32) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        // A stale exception would otherwise shadow this injection.
        self.win.ack_dsr(dsr::EXEC_DONE | dsr::EXEC_EXCEPTION);
        self.win.write_dir(instr);
        poll_until(self.bus, "exec retire", EXEC_POLLS, POLL_INTERVAL, || {
            let st = self.win.dsr();
            if st.exec_exception() {
                Some(Err(DspError::Exception {
                    id: self.id.0,
                    instr,
                }))
            } else if st.exec_done() {
                Some(Ok(()))
            } else {
                None
            }
        })?
    }

    /// Clear a latched exec-exception flag.
    pub(crate) fn clear_exception(&self) {
        if self.bypass {
            return;
        }
        self.win.ack_dsr(dsr::EXEC_EXCEPTION);
    }

    /// Place `value` in an address register. Two steps, because no
    /// immediate-load exists: stage the word in DDR, then inject the read of
    /// DDR into `ar` and confirm the core consumed it.
    pub(crate) fn load_to_ar(&self, value: u32, ar: u32) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        self.win.ack_dsr(dsr::CORE_READ_DDR);
        self.win.write_ddr(value);
        self.exec(isa::rsr(isa::SR_DDR, ar))?;
        poll_until(self.bus, "ddr consumed", DDR_POLLS, POLL_INTERVAL, || {
            self.win.dsr().core_read_ddr().then_some(())
        })
    }

    /// Read an address register through DDR.
    pub(crate) fn get_ar(&self, ar: u32) -> Result<u32> {
        if self.bypass {
            return Ok(0);
        }
        self.win.ack_dsr(dsr::CORE_WROTE_DDR);
        self.exec(isa::wsr(isa::SR_DDR, ar))?;
        poll_until(self.bus, "ddr produced", DDR_POLLS, POLL_INTERVAL, || {
            self.win.dsr().core_wrote_ddr().then_some(())
        })?;
        Ok(self.win.ddr())
    }

    /// Write an address register.
    pub(crate) fn set_ar(&self, ar: u32, value: u32) -> Result<()> {
        self.load_to_ar(value, ar)
    }

    /// Read a special register. Routed through the scratch AR, which is
    /// saved first and restored even when the access in between fails.
    pub(crate) fn get_sr(&self, sr: u32) -> Result<u32> {
        if self.bypass {
            return Ok(0);
        }
        let saved = self.get_ar(isa::AR_SCRATCH)?;
        let read = self
            .exec(isa::rsr(sr, isa::AR_SCRATCH))
            .and_then(|()| self.get_ar(isa::AR_SCRATCH));
        let restore = self.set_ar(isa::AR_SCRATCH, saved);
        let value = read?;
        restore?;
        Ok(value)
    }

    /// Write a special register, with the same scratch save/restore pairing.
    pub(crate) fn set_sr(&self, sr: u32, value: u32) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        let saved = self.get_ar(isa::AR_SCRATCH)?;
        let write = self
            .set_ar(isa::AR_SCRATCH, value)
            .and_then(|()| self.exec(isa::wsr(sr, isa::AR_SCRATCH)));
        let restore = self.set_ar(isa::AR_SCRATCH, saved);
        write?;
        restore
    }

    /// Arm instruction breakpoint `index` at `addr` and enable it through
    /// the family's enable mechanism.
    pub(crate) fn set_breakpoint(&self, index: usize, addr: u32) -> Result<()> {
        if index >= NUM_BREAKPOINTS {
            return Err(DspError::InvalidBreakpoint { index });
        }
        if self.bypass {
            return Ok(());
        }
        tracing::debug!(id = %self.id, index, addr = format_args!("{addr:#x}"), "arming breakpoint");
        self.load_to_ar(addr, isa::AR_SCRATCH)?;
        self.exec(isa::wsr(isa::sr_ibreaka(index), isa::AR_SCRATCH))?;
        match self.family.breakpoints() {
            BreakpointLayout::SharedEnable { sr } => {
                let enables = self.get_sr(sr)?;
                self.set_sr(sr, enables | (1 << index))
            }
            BreakpointLayout::PerBreakpointCtl { base, stride } => {
                self.win.write_at(base + index * stride, ibc::ENABLE);
                Ok(())
            }
        }
    }

    /// Disable instruction breakpoint `index`.
    pub(crate) fn clear_breakpoint(&self, index: usize) -> Result<()> {
        if index >= NUM_BREAKPOINTS {
            return Err(DspError::InvalidBreakpoint { index });
        }
        if self.bypass {
            return Ok(());
        }
        match self.family.breakpoints() {
            BreakpointLayout::SharedEnable { sr } => {
                let enables = self.get_sr(sr)?;
                self.set_sr(sr, enables & !(1 << index))
            }
            BreakpointLayout::PerBreakpointCtl { base, stride } => {
                let rel = base + index * stride;
                let cur = self.win.read_at(rel);
                self.win.write_at(rel, cur & !ibc::ENABLE);
                Ok(())
            }
        }
    }

    /// Wait for the core to stop with the family's breakpoint-hit cause.
    pub(crate) fn wait_breakpoint(&self, timeout: Duration) -> Result<()> {
        if self.bypass {
            return Ok(());
        }
        let iters = (timeout.as_micros() / BREAKPOINT_POLL_INTERVAL.as_micros()).max(1);
        #[allow(clippy::cast_possible_truncation)]
        let iters = iters.min(u128::from(u32::MAX)) as u32;
        let hit = self.family.hit_cause();
        poll_until(
            self.bus,
            "breakpoint hit",
            iters,
            BREAKPOINT_POLL_INTERVAL,
            || {
                let st = self.win.dsr();
                (st.stopped() && st.cause() == hit).then_some(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimBus;

    fn engine(bus: &SimBus, id: DspId) -> OcdEngine<'_> {
        OcdEngine::new(bus, id, id.family().unwrap(), false)
    }

    #[test]
    fn enter_halts_a_powered_core() {
        let bus = SimBus::new();
        let id = DspId(0);
        bus.hold_powered(id, true);
        let ocd = engine(&bus, id);
        ocd.wait_debug_power().unwrap();
        ocd.enter().unwrap();
        assert!(ocd.win.dsr().stopped());
        ocd.resume().unwrap();
        assert!(!ocd.win.dsr().stopped());
    }

    #[test]
    fn ar_round_trip() {
        let bus = SimBus::new();
        let ocd = engine(&bus, DspId(1));
        ocd.set_ar(7, 0x1234_5678).unwrap();
        assert_eq!(ocd.get_ar(7).unwrap(), 0x1234_5678);
    }

    #[test]
    fn sr_access_preserves_scratch_ar() {
        let bus = SimBus::new();
        let ocd = engine(&bus, DspId(0));
        ocd.set_ar(isa::AR_SCRATCH, 0xAA55_AA55).unwrap();
        ocd.set_sr(0x10, 99).unwrap();
        assert_eq!(ocd.get_sr(0x10).unwrap(), 99);
        assert_eq!(ocd.get_ar(isa::AR_SCRATCH).unwrap(), 0xAA55_AA55);
    }

    #[test]
    fn exec_exception_aborts_composite() {
        let bus = SimBus::new();
        let id = DspId(3);
        let ocd = engine(&bus, id);
        bus.fail_exec_after(id, 1);
        let err = ocd.get_ar(2).unwrap_err();
        assert!(matches!(err, DspError::Exception { .. }));
        ocd.clear_exception();
        // Subsequent operations work again.
        ocd.set_ar(2, 5).unwrap();
        assert_eq!(ocd.get_ar(2).unwrap(), 5);
    }

    #[test]
    fn bypass_short_circuits_everything() {
        let bus = SimBus::new();
        let ocd = OcdEngine::new(&bus, DspId(6), DspFamily::Gen2, true);
        ocd.enter().unwrap();
        ocd.set_ar(1, 42).unwrap();
        assert_eq!(ocd.get_ar(1).unwrap(), 0);
        ocd.set_breakpoint(0, 0x4000).unwrap();
        ocd.wait_breakpoint(Duration::from_millis(1)).unwrap();
    }
}
