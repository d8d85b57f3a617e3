//! ADB400 bridge handshake.
//!
//! Two mechanisms with different contracts: the per-core power-domain request
//! bit has no acknowledge and is followed by a fixed settle delay; the four
//! bridge-request bits have matching ack bits that are polled with asymmetric
//! budgets (the power-down direction settles faster). Missing acks are logged
//! and tolerated — the surrounding OFF sequence must still run to completion
//! to leave the core electrically safe.

use std::time::Duration;

use adsp_chip::regs::{adb400, control};
use adsp_chip::DspId;

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::poll::poll_until;
use crate::window::{Adb400Block, DspWindow};

const QUIESCE_POLLS: u32 = 200;
const RESTORE_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_micros(100);
const REQ_SETTLE: Duration = Duration::from_micros(50);

/// Bridge handshake for one DSP.
pub(crate) struct Adb400<'b> {
    bus: &'b dyn RegisterBus,
    block: Adb400Block<'b>,
    win: DspWindow<'b>,
    id: DspId,
}

impl<'b> Adb400<'b> {
    pub(crate) fn new(bus: &'b dyn RegisterBus, id: DspId) -> Self {
        Self {
            bus,
            block: Adb400Block::new(bus),
            win: DspWindow::new(bus, id),
            id,
        }
    }

    /// Raise the power-domain request bit. No ack exists; a fixed settle
    /// delay stands in for one.
    pub(crate) fn request_enable(&self) {
        self.win.modify_control(|c| c | control::PWR_REQ);
        self.bus.delay(REQ_SETTLE);
    }

    /// Lower the power-domain request bit, settle delay as above.
    pub(crate) fn request_disable(&self) {
        self.win.modify_control(|c| c & !control::PWR_REQ);
        self.bus.delay(REQ_SETTLE);
    }

    /// Drive the four bridge requests low and wait for every ack to clear.
    pub(crate) fn quiesce(&self) -> Result<()> {
        self.block.set_requests(self.id, false);
        poll_until(self.bus, "bridge quiesce", QUIESCE_POLLS, POLL_INTERVAL, || {
            (self.block.acks(self.id) == 0).then_some(())
        })
    }

    /// Drive the four bridge requests high and wait for every ack to set.
    pub(crate) fn restore(&self) -> Result<()> {
        self.block.set_requests(self.id, true);
        poll_until(self.bus, "bridge restore", RESTORE_POLLS, POLL_INTERVAL, || {
            (self.block.acks(self.id) == adb400::NIBBLE_MASK).then_some(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimBus;
    use crate::error::DspError;

    #[test]
    fn handshake_round_trip() {
        let bus = SimBus::new();
        let adb = Adb400::new(&bus, DspId(2));
        adb.restore().unwrap();
        assert_eq!(Adb400Block::new(&bus).acks(DspId(2)), adb400::NIBBLE_MASK);
        adb.quiesce().unwrap();
        assert_eq!(Adb400Block::new(&bus).acks(DspId(2)), 0);
    }

    #[test]
    fn stuck_acks_time_out_without_touching_siblings() {
        let bus = SimBus::new();
        let stuck = Adb400::new(&bus, DspId(4));
        let fine = Adb400::new(&bus, DspId(5));

        fine.restore().unwrap();
        bus.stall_bridge_acks(DspId(4), true);
        let err = stuck.restore().unwrap_err();
        assert!(matches!(err, DspError::Timeout { .. }));
        // The sibling's acks are unaffected.
        assert_eq!(Adb400Block::new(&bus).acks(DspId(5)), adb400::NIBBLE_MASK);
    }
}
