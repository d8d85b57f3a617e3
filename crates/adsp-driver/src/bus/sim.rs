//! Software model of the cluster register space.
//!
//! `SimBus` stands in for the hardware wherever none is present: CI, bypassed
//! (power-domain-less) deployments, and the integration suites. It settles
//! the PGFSM, ADB400, and OCD handshakes the way the silicon does and runs
//! injected instructions against a modeled AR/SR file per core, so the full
//! driver paths execute unmodified against it.
//!
//! Fault knobs make the bounded-poll failure paths reachable from tests:
//! each knob pins one handshake in its unsettled state, or arms an exec
//! exception a fixed number of injections in the future.

// Per-DSP field arithmetic stays in u32 register space.
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use adsp_chip::isa::{self, Instr};
use adsp_chip::regs::{self, adb400, control, dcr, dsr, ibc, pgfsm};
use adsp_chip::{
    dsp_window_base, BreakpointLayout, DspId, DSP_COUNT, DSP_WINDOW_BASE, DSP_WINDOW_STRIDE,
    NUM_BREAKPOINTS, REG_SPACE_SIZE,
};

use crate::bus::RegisterBus;

const W1C_MASK: u32 =
    dsr::EXEC_DONE | dsr::EXEC_EXCEPTION | dsr::CORE_WROTE_DDR | dsr::CORE_READ_DDR;

/// Simulated register bus.
#[derive(Debug)]
pub struct SimBus {
    inner: Mutex<SimState>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct SimState {
    regs: Vec<u32>,
    cores: [SimCore; DSP_COUNT],
    faults: FaultPlan,
}

/// Modeled register file of one core.
#[derive(Debug, Default, Clone)]
struct SimCore {
    ar: [u32; 16],
    srs: HashMap<u32, u32>,
}

/// Per-core fault knobs. All default to "behave".
#[derive(Debug, Default)]
struct FaultPlan {
    /// Core power never drops, so an OFF sequence cannot confirm.
    hold_powered: [bool; DSP_COUNT],
    /// PGFSM status stays in-progress after a command.
    pgfsm_stuck: [bool; DSP_COUNT],
    /// Bridge acks never follow the request bits.
    bridge_stuck: [bool; DSP_COUNT],
    /// A halt request never reaches the stopped state.
    halt_stuck: [bool; DSP_COUNT],
    /// Countdown to an injected-exec exception; 0 = disarmed.
    exec_fault_in: [u32; DSP_COUNT],
}

impl SimState {
    fn new() -> Self {
        let mut regs = vec![0u32; REG_SPACE_SIZE / 4];
        // Every gate starts open.
        let mut st = 0u32;
        for id in 0..DSP_COUNT as u32 {
            st |= pgfsm::ST_OFF << (pgfsm::FIELD_WIDTH * id);
        }
        regs[regs::PGFSM_STATUS / 4] = st;
        Self {
            regs,
            cores: Default::default(),
            faults: FaultPlan::default(),
        }
    }

    fn word(&self, offset: usize) -> u32 {
        self.regs[offset / 4]
    }

    fn set_word(&mut self, offset: usize, value: u32) {
        self.regs[offset / 4] = value;
    }

    /// Which DSP window (if any) an offset falls in.
    fn window_of(offset: usize) -> Option<(DspId, usize)> {
        if offset < DSP_WINDOW_BASE {
            return None;
        }
        let index = (offset - DSP_WINDOW_BASE) / DSP_WINDOW_STRIDE;
        if index >= DSP_COUNT {
            return None;
        }
        let id = DspId(index as u8);
        Some((id, offset - dsp_window_base(id)))
    }

    fn powered(&self, id: DspId) -> bool {
        let ctl = self.word(dsp_window_base(id) + regs::DSP_CONTROL);
        ctl & control::PWR_EN != 0 || self.faults.hold_powered[id.index()]
    }

    /// Recompute the derived STATUS word and the live DSR bits of one core.
    fn refresh(&mut self, id: DspId) {
        let base = dsp_window_base(id);
        let ctl = self.word(base + regs::DSP_CONTROL);
        let dcr_v = self.word(base + regs::OCD_DCR);
        let powered = self.powered(id);
        let mut dsr_v = self.word(base + regs::OCD_DSR);

        if powered {
            dsr_v |= dsr::DBG_PWR_READY;
        } else {
            dsr_v &= !(dsr::DBG_PWR_READY | dsr::STOPPED);
            dsr_v = dsr::with_cause(dsr_v, 0);
        }
        self.set_word(base + regs::OCD_DSR, dsr_v);

        let halted = dcr_v & dcr::ENABLE != 0 && dsr_v & dsr::STOPPED != 0;
        let mut st = 0u32;
        if powered {
            // The modeled core idles immediately after release.
            st |= regs::status::POWERED | regs::status::ACTIVE | regs::status::WAITI;
            if ctl & control::HALT_ON_RESET != 0 || halted {
                st |= regs::status::DEBUG_MODE;
            }
        }
        self.set_word(base + regs::DSP_STATUS, st);
    }

    fn write_pgfsm_cmd(&mut self, value: u32) {
        self.set_word(regs::PGFSM_CMD, value);
        let mut st = self.word(regs::PGFSM_STATUS);
        for i in 0..DSP_COUNT as u32 {
            let shift = pgfsm::FIELD_WIDTH * i;
            let cmd = (value >> shift) & pgfsm::FIELD_MASK;
            let next = match cmd {
                pgfsm::CMD_POWER_UP if self.faults.pgfsm_stuck[i as usize] => {
                    pgfsm::ST_ON_IN_PROGRESS
                }
                pgfsm::CMD_POWER_UP => pgfsm::ST_ON,
                pgfsm::CMD_POWER_DOWN if self.faults.pgfsm_stuck[i as usize] => {
                    pgfsm::ST_OFF_IN_PROGRESS
                }
                pgfsm::CMD_POWER_DOWN => pgfsm::ST_OFF,
                _ => continue,
            };
            st = (st & !(pgfsm::FIELD_MASK << shift)) | (next << shift);
        }
        self.set_word(regs::PGFSM_STATUS, st);
    }

    fn write_bridge_req(&mut self, value: u32) {
        self.set_word(regs::ADB400_REQ, value);
        let mut ack = self.word(regs::ADB400_ACK);
        for i in 0..DSP_COUNT as u32 {
            if self.faults.bridge_stuck[i as usize] {
                continue;
            }
            let shift = adb400::BRIDGES_PER_DSP * i;
            let req = (value >> shift) & adb400::NIBBLE_MASK;
            ack = (ack & !(adb400::NIBBLE_MASK << shift)) | (req << shift);
        }
        self.set_word(regs::ADB400_ACK, ack);
    }

    fn write_dcr(&mut self, id: DspId, value: u32) {
        let base = dsp_window_base(id);
        self.set_word(base + regs::OCD_DCR, value);
        let mut dsr_v = self.word(base + regs::OCD_DSR);
        if value & dcr::ENABLE != 0 && value & dcr::DEBUG_INTERRUPT != 0 {
            if self.powered(id) && !self.faults.halt_stuck[id.index()] {
                dsr_v |= dsr::STOPPED;
            }
        } else if value & dcr::ENABLE == 0 {
            dsr_v &= !dsr::STOPPED;
            dsr_v = dsr::with_cause(dsr_v, 0);
        }
        self.set_word(base + regs::OCD_DSR, dsr_v);
        self.refresh(id);
    }

    fn exec(&mut self, id: DspId, word: u32) {
        let base = dsp_window_base(id);
        let mut dsr_v = self.word(base + regs::OCD_DSR);

        let armed = &mut self.faults.exec_fault_in[id.index()];
        if *armed > 0 {
            *armed -= 1;
            if *armed == 0 {
                self.set_word(base + regs::OCD_DSR, dsr_v | dsr::EXEC_EXCEPTION);
                return;
            }
        }

        let core = &mut self.cores[id.index()];
        match isa::decode(word) {
            Instr::Rsr { sr, ar } => {
                if sr == isa::SR_DDR {
                    core.ar[ar as usize] = self.regs[(base + regs::OCD_DDR) / 4];
                    dsr_v |= dsr::CORE_READ_DDR;
                } else {
                    core.ar[ar as usize] = core.srs.get(&sr).copied().unwrap_or(0);
                }
                dsr_v |= dsr::EXEC_DONE;
            }
            Instr::Wsr { sr, ar } => {
                let v = core.ar[ar as usize];
                if sr == isa::SR_DDR {
                    self.regs[(base + regs::OCD_DDR) / 4] = v;
                    dsr_v |= dsr::CORE_WROTE_DDR;
                } else {
                    core.srs.insert(sr, v);
                }
                dsr_v |= dsr::EXEC_DONE;
            }
            Instr::Unknown(_) => {
                dsr_v |= dsr::EXEC_EXCEPTION;
            }
        }
        self.set_word(base + regs::OCD_DSR, dsr_v);
    }
}

impl SimBus {
    /// Create a simulated cluster with every core unpowered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SimState::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pin `id`'s core power on, so an OFF sequence never confirms.
    pub fn hold_powered(&self, id: DspId, on: bool) {
        let mut st = self.lock();
        st.faults.hold_powered[id.index()] = on;
        st.refresh(id);
    }

    /// Leave `id`'s PGFSM status in-progress after the next command.
    pub fn stall_pgfsm(&self, id: DspId, on: bool) {
        self.lock().faults.pgfsm_stuck[id.index()] = on;
    }

    /// Stop `id`'s bridge acks from following the request bits.
    pub fn stall_bridge_acks(&self, id: DspId, on: bool) {
        self.lock().faults.bridge_stuck[id.index()] = on;
    }

    /// Stop `id` from reaching the stopped state on a halt request.
    pub fn stall_debug_halt(&self, id: DspId, on: bool) {
        self.lock().faults.halt_stuck[id.index()] = on;
    }

    /// Arm an exec exception: the `n`-th next injected instruction on `id`
    /// faults instead of retiring (`n = 1` means the very next one).
    pub fn fail_exec_after(&self, id: DspId, n: u32) {
        self.lock().faults.exec_fault_in[id.index()] = n;
    }

    /// Simulate the core hitting `addr`. Fires only if some enabled
    /// breakpoint matches; returns whether it fired.
    pub fn inject_breakpoint_hit(&self, id: DspId, addr: u32) -> bool {
        let mut st = self.lock();
        let Some(family) = id.family() else {
            return false;
        };
        let base = dsp_window_base(id);
        for index in 0..NUM_BREAKPOINTS {
            let armed_addr = st.cores[id.index()]
                .srs
                .get(&isa::sr_ibreaka(index))
                .copied();
            let enabled = match family.breakpoints() {
                BreakpointLayout::SharedEnable { sr } => {
                    st.cores[id.index()].srs.get(&sr).copied().unwrap_or(0) & (1 << index) != 0
                }
                BreakpointLayout::PerBreakpointCtl { base: ibc_base, stride } => {
                    st.word(base + ibc_base + index * stride) & ibc::ENABLE != 0
                }
            };
            if enabled && armed_addr == Some(addr) {
                let mut dsr_v = st.word(base + regs::OCD_DSR);
                dsr_v |= dsr::STOPPED;
                dsr_v = dsr::with_cause(dsr_v, family.hit_cause());
                st.set_word(base + regs::OCD_DSR, dsr_v);
                st.refresh(id);
                return true;
            }
        }
        false
    }

    /// Read an address register of the modeled core, for assertions.
    #[must_use]
    pub fn core_ar(&self, id: DspId, ar: u32) -> u32 {
        self.lock().cores[id.index()].ar[ar as usize]
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= REG_SPACE_SIZE, "register offset out of bounds");
        self.lock().word(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= REG_SPACE_SIZE, "register offset out of bounds");
        let mut st = self.lock();
        match offset {
            regs::PGFSM_CMD => st.write_pgfsm_cmd(value),
            regs::ADB400_REQ => st.write_bridge_req(value),
            regs::ADB400_ACK | regs::PGFSM_STATUS => {} // read-only
            _ => match SimState::window_of(offset) {
                Some((_, regs::DSP_STATUS)) => {} // read-only, derived
                Some((id, regs::DSP_CONTROL)) => {
                    st.set_word(offset, value);
                    st.refresh(id);
                }
                Some((id, regs::OCD_DCR)) => st.write_dcr(id, value),
                Some((id, regs::OCD_DSR)) => {
                    let cur = st.word(offset);
                    st.set_word(offset, cur & !(value & W1C_MASK));
                    st.refresh(id);
                }
                Some((id, regs::OCD_DIR)) => {
                    st.set_word(offset, value);
                    st.exec(id, value);
                }
                _ => st.set_word(offset, value),
            },
        }
    }

    fn delay(&self, _interval: Duration) {
        // Simulated handshakes settle on write; never sleep.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgfsm_status_starts_all_off() {
        let bus = SimBus::new();
        let st = bus.read32(regs::PGFSM_STATUS);
        for i in 0..DSP_COUNT as u32 {
            assert_eq!(
                (st >> (pgfsm::FIELD_WIDTH * i)) & pgfsm::FIELD_MASK,
                pgfsm::ST_OFF
            );
        }
    }

    #[test]
    fn bridge_acks_follow_requests_unless_stalled() {
        let bus = SimBus::new();
        bus.write32(regs::ADB400_REQ, 0x0000_00F0);
        assert_eq!(bus.read32(regs::ADB400_ACK), 0x0000_00F0);

        bus.stall_bridge_acks(DspId(0), true);
        bus.write32(regs::ADB400_REQ, 0x0000_00FF);
        assert_eq!(bus.read32(regs::ADB400_ACK), 0x0000_00F0);
    }

    #[test]
    fn injected_rsr_ddr_moves_data_into_ar() {
        let bus = SimBus::new();
        let id = DspId(0);
        let base = dsp_window_base(id);
        bus.write32(base + regs::OCD_DDR, 0xCAFE_F00D);
        bus.write32(base + regs::OCD_DIR, isa::rsr(isa::SR_DDR, 6));
        assert_eq!(bus.core_ar(id, 6), 0xCAFE_F00D);
        let dsr_v = bus.read32(base + regs::OCD_DSR);
        assert_ne!(dsr_v & dsr::EXEC_DONE, 0);
        assert_ne!(dsr_v & dsr::CORE_READ_DDR, 0);
    }

    #[test]
    fn armed_exec_fault_fires_once() {
        let bus = SimBus::new();
        let id = DspId(2);
        let base = dsp_window_base(id);
        bus.fail_exec_after(id, 2);

        bus.write32(base + regs::OCD_DIR, isa::rsr(isa::SR_DDR, 1));
        assert_eq!(bus.read32(base + regs::OCD_DSR) & dsr::EXEC_EXCEPTION, 0);

        bus.write32(base + regs::OCD_DSR, dsr::EXEC_DONE | dsr::CORE_READ_DDR);
        bus.write32(base + regs::OCD_DIR, isa::rsr(isa::SR_DDR, 1));
        assert_ne!(bus.read32(base + regs::OCD_DSR) & dsr::EXEC_EXCEPTION, 0);
    }
}
