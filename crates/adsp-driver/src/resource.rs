//! One DSP resource and its mode state machine.
//!
//! All transitions and debug operations on a resource are serialized by its
//! state lock; resources are independent of each other except through the
//! clock voter. A failed transition leaves the submitted mode updated while
//! the confirmed mode may be stale — callers re-read with [`DspResource::read_mode`]
//! rather than trusting the request's outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use adsp_chip::regs::control;
use adsp_chip::{DpmLevel, DspFamily, DspId};
use tracing::{debug, info, warn};

use crate::adb400::Adb400;
use crate::bus::RegisterBus;
use crate::clock::ClockVoter;
use crate::error::Result;
use crate::ocd::OcdEngine;
use crate::pgfsm::{Pgfsm, PgfsmState};
use crate::poll::poll_until;
use crate::state::{DspMode, DspState, MemHandle};
use crate::window::DspWindow;

const WAITI_POLLS: u32 = 10;
const CONFIRM_POLLS: u32 = 100;
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// One physical DSP core.
#[derive(Debug)]
pub struct DspResource {
    id: DspId,
    family: DspFamily,
    bus: Arc<dyn RegisterBus>,
    clock: Arc<ClockVoter>,
    state: Mutex<DspState>,
}

impl DspResource {
    pub(crate) fn new(
        id: DspId,
        family: DspFamily,
        bus: Arc<dyn RegisterBus>,
        clock: Arc<ClockVoter>,
    ) -> Self {
        Self {
            id,
            family,
            bus,
            clock,
            state: Mutex::new(DspState::new(family)),
        }
    }

    /// Id of this core.
    pub fn id(&self) -> DspId {
        self.id
    }

    /// Family of this core.
    pub fn family(&self) -> DspFamily {
        self.family
    }

    /// Poisoned state is recovered, not propagated: teardown after a panic
    /// must still be able to force the core OFF.
    fn lock_state(&self) -> MutexGuard<'_, DspState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn window(&self) -> DspWindow<'_> {
        DspWindow::new(&*self.bus, self.id)
    }

    fn adb(&self) -> Adb400<'_> {
        Adb400::new(&*self.bus, self.id)
    }

    fn pgfsm(&self) -> Pgfsm<'_> {
        Pgfsm::new(&*self.bus)
    }

    fn ocd(&self, bypass: bool) -> OcdEngine<'_> {
        OcdEngine::new(&*self.bus, self.id, self.family, bypass)
    }

    pub(crate) fn snapshot_bypass(&self, bypass: bool) {
        self.lock_state().bypass = bypass;
    }

    // ── Mode state machine ───────────────────────────────────────────────────

    /// Drive the core toward `requested`.
    ///
    /// # Errors
    ///
    /// `Timeout` if a bounded confirmation poll fails (the hardware is left
    /// as-is), `Exception` if a debug composite aborts, transport errors
    /// from clock voting. No automatic retry.
    pub fn set_mode(&self, requested: DspMode) -> Result<()> {
        let mut st = self.lock_state();
        info!(id = %self.id, ?requested, "mode change");
        st.submit_mode = requested;
        let outcome = match requested {
            DspMode::Off => self.seq_off(&st),
            // Pure bookkeeping; the hardware is not touched.
            DspMode::Stop => Ok(()),
            DspMode::Pause => self.seq_pause(&st),
            DspMode::Run => self.seq_run(&st),
            DspMode::HaltOnReset => self.seq_halt_on_reset(&st),
            DspMode::ExitOcd => self.seq_exit_ocd(&st),
        };
        if let Err(e) = &outcome {
            warn!(id = %self.id, ?requested, error = %e, "mode change failed");
        }
        outcome
    }

    /// Classify the confirmed mode from the status encoding.
    ///
    /// The physical encoding is coarse by construction: a just-powered but
    /// actually-OFF core can classify as `Stop`. Callers that need certainty
    /// re-poll; do not tighten this table without new hardware information.
    pub fn read_mode(&self) -> DspMode {
        let st = self.lock_state();
        self.read_mode_locked(&st)
    }

    /// Mode most recently submitted, confirmed or not.
    pub fn submitted_mode(&self) -> DspMode {
        self.lock_state().submit_mode
    }

    fn read_mode_locked(&self, st: &DspState) -> DspMode {
        let win = self.window();
        let s = win.status();
        if st.submit_mode == DspMode::Off && s.active() && !s.powered() {
            return DspMode::Off;
        }
        if s.pwr_up() || s.active() || s.debug_mode() {
            let c = win.control();
            return if !c.reset() || c.halt_on_reset() {
                DspMode::Run
            } else {
                DspMode::Stop
            };
        }
        if matches!(st.submit_mode, DspMode::Run | DspMode::ExitOcd) {
            // Submitted as running; idle-but-running reads as RUN.
            return DspMode::Run;
        }
        DspMode::Off
    }

    /// Full power-down. Every step runs even after an earlier one fails —
    /// this sequence is itself the recovery path — and the first error is
    /// reported. The power-domain request is re-raised unconditionally at
    /// the end.
    fn seq_off(&self, st: &DspState) -> Result<()> {
        let win = self.window();
        let adb = self.adb();

        if let Err(e) = poll_until(&*self.bus, "core idle", WAITI_POLLS, POLL_INTERVAL, || {
            win.status().waiti().then_some(())
        }) {
            debug!(id = %self.id, error = %e, "core not idle before power-down");
        }

        adb.request_disable();

        if !st.bypass {
            if let Err(e) = adb.quiesce() {
                warn!(id = %self.id, error = %e, "bridge quiesce ack missing");
            }
            if let Err(e) = adb.restore() {
                warn!(id = %self.id, error = %e, "bridge restore ack missing");
            }
        }

        win.modify_control(|c| c | control::CLK_GATE);
        win.modify_control(|c| c & !control::PWR_EN);
        win.modify_control(|c| c | control::RESET);

        let mut outcome = poll_until(
            &*self.bus,
            "off confirm",
            CONFIRM_POLLS,
            POLL_INTERVAL,
            || (self.read_mode_locked(st) == DspMode::Off).then_some(()),
        );

        if let Err(e) = self.clock.vote(self.id, 0) {
            warn!(id = %self.id, error = %e, "zero-rate vote failed");
            outcome = outcome.and(Err(e));
        }

        if let Err(e) = self.pgfsm().power_down(self.id, st.bypass) {
            outcome = outcome.and(Err(e));
        }

        adb.request_enable();
        outcome
    }

    /// Full power-up into execution.
    fn seq_run(&self, st: &DspState) -> Result<()> {
        let win = self.window();
        let adb = self.adb();

        adb.request_enable();
        self.clock.vote(self.id, st.clock_rate)?;
        self.pgfsm().power_up(self.id, st.bypass)?;

        win.modify_control(|c| c | control::RESET);
        win.modify_control(|c| c | control::PWR_EN);
        if !st.bypass {
            let alt = st.alt_reset_vector;
            win.modify_control(|c| {
                if alt {
                    c | control::ALT_VECTOR
                } else {
                    c & !control::ALT_VECTOR
                }
            });
            adb.restore()?;
            win.modify_control(|c| c & !control::CLK_GATE);
        }
        win.modify_control(|c| c & !(control::RESET | control::HALT_ON_RESET));

        poll_until(
            &*self.bus,
            "run confirm",
            CONFIRM_POLLS,
            POLL_INTERVAL,
            || (self.read_mode_locked(st) == DspMode::Run).then_some(()),
        )
    }

    /// Like RUN, but the core stays halted at the reset vector. Confirmed
    /// through the debug-mode status bit. Bypassed resources have no core to
    /// halt; success is immediate.
    fn seq_halt_on_reset(&self, st: &DspState) -> Result<()> {
        if st.bypass {
            return Ok(());
        }
        let win = self.window();
        let adb = self.adb();

        adb.request_enable();
        self.clock.vote(self.id, st.clock_rate)?;
        self.pgfsm().power_up(self.id, false)?;

        win.modify_control(|c| c | control::RESET);
        win.modify_control(|c| c | control::PWR_EN | control::HALT_ON_RESET);
        let alt = st.alt_reset_vector;
        win.modify_control(|c| {
            if alt {
                c | control::ALT_VECTOR
            } else {
                c & !control::ALT_VECTOR
            }
        });
        adb.restore()?;
        win.modify_control(|c| c & !control::CLK_GATE);
        win.modify_control(|c| c & !control::RESET);

        poll_until(
            &*self.bus,
            "halt-on-reset confirm",
            CONFIRM_POLLS,
            POLL_INTERVAL,
            || win.status().debug_mode().then_some(()),
        )
    }

    /// Halt into debug mode, keeping the clock voted.
    fn seq_pause(&self, st: &DspState) -> Result<()> {
        self.clock.vote(self.id, st.clock_rate)?;
        let ocd = self.ocd(st.bypass);
        ocd.wait_debug_power()?;
        ocd.enter()
    }

    /// Leave debug halt toward RUN. Defined to be equivalent to RUN when the
    /// resource is bypassed.
    fn seq_exit_ocd(&self, st: &DspState) -> Result<()> {
        if st.bypass {
            return self.seq_run(st);
        }
        self.clock.vote(self.id, st.clock_rate)?;
        self.ocd(false).resume()
    }

    /// Decoded power-gate state of this core's domain.
    pub fn power_gate_status(&self) -> PgfsmState {
        self.pgfsm().status(self.id)
    }

    /// Teardown path: force the core OFF, downgrading every failure to a
    /// logged warning so shutdown always completes.
    pub(crate) fn force_off(&self) {
        let mut st = self.lock_state();
        st.submit_mode = DspMode::Off;
        if let Err(e) = self.seq_off(&st) {
            warn!(id = %self.id, error = %e, "forced power-down incomplete");
        }
    }

    // ── Clock ────────────────────────────────────────────────────────────────

    /// Vote `hz` for this core's domain. A non-zero vote becomes the
    /// resource's DPM rate; a zero vote relinquishes the domain without
    /// forgetting the rate to resume at.
    ///
    /// # Errors
    ///
    /// Transport errors from the clock-rate request, unchanged.
    pub fn vote_rate(&self, hz: u64) -> Result<u64> {
        let mut st = self.lock_state();
        if hz > 0 {
            st.clock_rate = hz;
        }
        self.clock.vote(self.id, hz)
    }

    /// Currently recorded DPM rate in Hz.
    pub fn clock_rate(&self) -> u64 {
        self.lock_state().clock_rate
    }

    /// Adopt a DPM level: record the mapped frequency and re-vote it if the
    /// core is not OFF.
    pub(crate) fn revote_for_dpm(&self, level: DpmLevel) -> Result<()> {
        let mut st = self.lock_state();
        let hz = self.family.dpm_hz(level);
        st.clock_rate = hz;
        if st.submit_mode != DspMode::Off {
            self.clock.vote(self.id, hz)?;
        }
        Ok(())
    }

    // ── Boot configuration ───────────────────────────────────────────────────

    /// Boot from the alternate reset vector on the next release.
    pub fn set_alt_reset_vector(&self, on: bool) {
        self.lock_state().alt_reset_vector = on;
    }

    // ── Debug surface ────────────────────────────────────────────────────────

    /// Read an address register.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Exception` from the inject protocol.
    pub fn get_ar(&self, ar: u32) -> Result<u32> {
        let st = self.lock_state();
        self.ocd(st.bypass).get_ar(ar)
    }

    /// Write an address register.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Exception` from the inject protocol.
    pub fn set_ar(&self, ar: u32, value: u32) -> Result<()> {
        let st = self.lock_state();
        self.ocd(st.bypass).set_ar(ar, value)
    }

    /// Read a special register through the scratch AR. The scratch AR is
    /// restored even when the access fails mid-way.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Exception` from the inject protocol.
    pub fn get_sr(&self, sr: u32) -> Result<u32> {
        let st = self.lock_state();
        self.ocd(st.bypass).get_sr(sr)
    }

    /// Write a special register; scratch discipline as [`DspResource::get_sr`].
    ///
    /// # Errors
    ///
    /// `Timeout` or `Exception` from the inject protocol.
    pub fn set_sr(&self, sr: u32, value: u32) -> Result<()> {
        let st = self.lock_state();
        self.ocd(st.bypass).set_sr(sr, value)
    }

    /// Arm and enable instruction breakpoint `index` at `addr`.
    ///
    /// # Errors
    ///
    /// `InvalidBreakpoint` for an out-of-range index, otherwise protocol
    /// errors as above.
    pub fn set_breakpoint(&self, index: usize, addr: u32) -> Result<()> {
        let st = self.lock_state();
        self.ocd(st.bypass).set_breakpoint(index, addr)
    }

    /// Disable instruction breakpoint `index`.
    ///
    /// # Errors
    ///
    /// `InvalidBreakpoint` for an out-of-range index, otherwise protocol
    /// errors as above.
    pub fn clear_breakpoint(&self, index: usize) -> Result<()> {
        let st = self.lock_state();
        self.ocd(st.bypass).clear_breakpoint(index)
    }

    /// Wait for the core to stop on a breakpoint.
    ///
    /// # Errors
    ///
    /// `Timeout` if no hit is observed within `timeout`.
    pub fn wait_breakpoint(&self, timeout: Duration) -> Result<()> {
        let st = self.lock_state();
        self.ocd(st.bypass).wait_breakpoint(timeout)
    }

    /// Clear a latched exec-exception flag.
    pub fn clear_exception(&self) {
        let st = self.lock_state();
        self.ocd(st.bypass).clear_exception();
    }

    // ── Memory descriptor notifications ──────────────────────────────────────

    pub(crate) fn memory_attached(&self, handle: MemHandle) {
        self.lock_state().mem_handles.push(handle);
    }

    pub(crate) fn memory_released(&self, handle: MemHandle) {
        self.lock_state().mem_handles.retain(|h| *h != handle);
    }

    /// Descriptors currently attached by the external memory manager.
    pub fn memory_handles(&self) -> Vec<MemHandle> {
        self.lock_state().mem_handles.clone()
    }
}
