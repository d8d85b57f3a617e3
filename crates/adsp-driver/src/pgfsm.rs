//! PGFSM power-gate sequencing.
//!
//! The sequencer closes or opens a core's power-gate cells on command and
//! reports a 2-bit state per DSP. Commands are fire-and-forget at the
//! register level; completion is confirmed by polling the status field for
//! the settled encoding.

use std::time::Duration;

use adsp_chip::regs::pgfsm;
use adsp_chip::DspId;

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::poll::poll_until;
use crate::window::PgfsmBlock;

const SETTLE_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Decoded power-gate state of one DSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgfsmState {
    /// Gates closed, domain powered.
    On,
    /// Gates open, domain unpowered.
    Off,
    /// Power-up sequence running.
    OnInProgress,
    /// Power-down sequence running.
    OffInProgress,
}

/// Power-gate controller for the shared sequencer block.
pub(crate) struct Pgfsm<'b> {
    bus: &'b dyn RegisterBus,
    block: PgfsmBlock<'b>,
}

impl<'b> Pgfsm<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus) -> Self {
        Self {
            bus,
            block: PgfsmBlock::new(bus),
        }
    }

    /// Write the fixed delay constants for one DSP's gate chain.
    pub(crate) fn configure_timings(&self, id: DspId) {
        self.block
            .write_timing(id, pgfsm::TIMING_RESET, pgfsm::DLY_RESET);
        self.block.write_timing(id, pgfsm::TIMING_ISO, pgfsm::DLY_ISO);
        self.block
            .write_timing(id, pgfsm::TIMING_PWRDN, pgfsm::DLY_PWRDN);
        self.block
            .write_timing(id, pgfsm::TIMING_PWRUP, pgfsm::DLY_PWRUP);
        tracing::debug!(%id, "pgfsm timings configured");
    }

    /// Sequence the gates closed. With `bypass` the command is still issued
    /// but completion is not awaited.
    pub(crate) fn power_up(&self, id: DspId, bypass: bool) -> Result<()> {
        tracing::debug!(%id, "pgfsm power-up");
        self.block.command(id, pgfsm::CMD_POWER_UP);
        if bypass {
            return Ok(());
        }
        poll_until(self.bus, "pgfsm power-up", SETTLE_POLLS, POLL_INTERVAL, || {
            (self.status(id) == PgfsmState::On).then_some(())
        })
    }

    /// Sequence the gates open. With `bypass` the command is still issued
    /// but completion is not awaited.
    pub(crate) fn power_down(&self, id: DspId, bypass: bool) -> Result<()> {
        tracing::debug!(%id, "pgfsm power-down");
        self.block.command(id, pgfsm::CMD_POWER_DOWN);
        if bypass {
            return Ok(());
        }
        poll_until(self.bus, "pgfsm power-down", SETTLE_POLLS, POLL_INTERVAL, || {
            (self.status(id) == PgfsmState::Off).then_some(())
        })
    }

    /// Decode the status field for one DSP.
    pub(crate) fn status(&self, id: DspId) -> PgfsmState {
        match self.block.status_field(id) {
            pgfsm::ST_ON => PgfsmState::On,
            pgfsm::ST_ON_IN_PROGRESS => PgfsmState::OnInProgress,
            pgfsm::ST_OFF_IN_PROGRESS => PgfsmState::OffInProgress,
            _ => PgfsmState::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimBus;
    use crate::error::DspError;

    #[test]
    fn power_cycle_settles() {
        let bus = SimBus::new();
        let pg = Pgfsm::new(&bus);
        let id = DspId(3);
        assert_eq!(pg.status(id), PgfsmState::Off);

        pg.power_up(id, false).unwrap();
        assert_eq!(pg.status(id), PgfsmState::On);

        pg.power_down(id, false).unwrap();
        assert_eq!(pg.status(id), PgfsmState::Off);
    }

    #[test]
    fn stalled_sequencer_times_out() {
        let bus = SimBus::new();
        let pg = Pgfsm::new(&bus);
        let id = DspId(1);
        bus.stall_pgfsm(id, true);

        let err = pg.power_up(id, false).unwrap_err();
        assert!(matches!(err, DspError::Timeout { .. }));
        assert_eq!(pg.status(id), PgfsmState::OnInProgress);
    }

    #[test]
    fn bypass_skips_confirmation() {
        let bus = SimBus::new();
        let pg = Pgfsm::new(&bus);
        let id = DspId(0);
        bus.stall_pgfsm(id, true);
        // Would time out if it polled.
        pg.power_up(id, true).unwrap();
    }
}
