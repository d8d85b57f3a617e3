//! Mode state machine round trips over the simulated cluster.

use std::sync::Arc;

use adsp_driver::{DspError, DspId, DspMode, DspRegistry, DspResource, NopTransport, SimBus};

fn registry(bypass: bool) -> (Arc<SimBus>, DspRegistry) {
    let bus = Arc::new(SimBus::new());
    let reg = DspRegistry::new(bus.clone(), Arc::new(NopTransport), bypass);
    (bus, reg)
}

fn acquire(reg: &DspRegistry, id: DspId) -> Arc<DspResource> {
    let client = reg.attach_client();
    reg.acquire_resource(client, id).unwrap()
}

#[test]
fn off_is_idempotent() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(0));

    r.set_mode(DspMode::Off).unwrap();
    assert_eq!(r.read_mode(), DspMode::Off);
    r.set_mode(DspMode::Off).unwrap();
    assert_eq!(r.read_mode(), DspMode::Off);
}

#[test]
fn run_round_trip() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(4));

    r.set_mode(DspMode::Run).unwrap();
    assert_eq!(r.read_mode(), DspMode::Run);
    assert_eq!(r.power_gate_status(), adsp_driver::PgfsmState::On);

    r.set_mode(DspMode::Off).unwrap();
    assert_eq!(r.read_mode(), DspMode::Off);
    assert_eq!(r.power_gate_status(), adsp_driver::PgfsmState::Off);
}

#[test]
fn stop_is_bookkeeping_only() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(2));

    r.set_mode(DspMode::Run).unwrap();
    r.set_mode(DspMode::Stop).unwrap();
    // The hardware was not touched; the status encoding still reads RUN.
    assert_eq!(r.submitted_mode(), DspMode::Stop);
    assert_eq!(r.read_mode(), DspMode::Run);
}

#[test]
fn halt_on_reset_confirms_through_debug_mode() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(6));

    r.set_mode(DspMode::HaltOnReset).unwrap();
    // The decision table folds a halted-at-reset core into RUN.
    assert_eq!(r.read_mode(), DspMode::Run);

    r.set_mode(DspMode::Off).unwrap();
    assert_eq!(r.read_mode(), DspMode::Off);
}

#[test]
fn pause_and_exit_ocd_round_trip() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(1));

    r.set_mode(DspMode::Run).unwrap();
    r.set_mode(DspMode::Pause).unwrap();
    r.set_mode(DspMode::ExitOcd).unwrap();
    assert_eq!(r.read_mode(), DspMode::Run);
}

#[test]
fn failed_transition_keeps_submit_mode_and_read_mode_stays_authoritative() {
    let (bus, reg) = registry(false);
    let r = acquire(&reg, DspId(3));

    r.set_mode(DspMode::Run).unwrap();
    bus.hold_powered(DspId(3), true);

    let err = r.set_mode(DspMode::Off).unwrap_err();
    assert!(matches!(err, DspError::Timeout { .. }));
    assert_eq!(r.submitted_mode(), DspMode::Off);
    // The core is in fact still powered; the status table says so.
    assert_eq!(r.read_mode(), DspMode::Stop);

    bus.hold_powered(DspId(3), false);
    r.set_mode(DspMode::Off).unwrap();
    assert_eq!(r.read_mode(), DspMode::Off);
}

#[test]
fn stalled_power_gate_fails_run() {
    let (bus, reg) = registry(false);
    let r = acquire(&reg, DspId(5));

    bus.stall_pgfsm(DspId(5), true);
    let err = r.set_mode(DspMode::Run).unwrap_err();
    assert!(matches!(err, DspError::Timeout { .. }));
}

#[test]
fn bypassed_resource_runs_without_handshakes() {
    let (bus, reg) = registry(true);
    let r = acquire(&reg, DspId(0));

    // Stuck acks would fail a non-bypassed RUN; bypass skips them.
    bus.stall_bridge_acks(DspId(0), true);
    r.set_mode(DspMode::Run).unwrap();
    assert_eq!(r.read_mode(), DspMode::Run);
}

#[test]
fn bypassed_halt_on_reset_succeeds_without_register_access() {
    let (_bus, reg) = registry(true);
    let r = acquire(&reg, DspId(7));
    r.set_mode(DspMode::HaltOnReset).unwrap();
    assert_eq!(r.submitted_mode(), DspMode::HaltOnReset);
}

#[test]
fn bypassed_exit_ocd_is_equivalent_to_run() {
    let (_bus, reg) = registry(true);
    let r = acquire(&reg, DspId(6));
    r.set_mode(DspMode::ExitOcd).unwrap();
    assert_eq!(r.read_mode(), DspMode::Run);
}

#[test]
fn transitions_on_one_core_leave_siblings_alone() {
    let (_bus, reg) = registry(false);
    let a = acquire(&reg, DspId(0));
    let b = acquire(&reg, DspId(1));

    a.set_mode(DspMode::Run).unwrap();
    b.set_mode(DspMode::Run).unwrap();
    a.set_mode(DspMode::Off).unwrap();

    assert_eq!(a.read_mode(), DspMode::Off);
    assert_eq!(b.read_mode(), DspMode::Run);
}

#[test]
fn shutdown_all_quiesces_every_core() {
    let (_bus, reg) = registry(false);
    let a = acquire(&reg, DspId(0));
    let b = acquire(&reg, DspId(6));
    a.set_mode(DspMode::Run).unwrap();
    b.set_mode(DspMode::Run).unwrap();

    reg.shutdown_all();
    assert_eq!(reg.read_mode(DspId(0)).unwrap(), DspMode::Off);
    assert_eq!(reg.read_mode(DspId(6)).unwrap(), DspMode::Off);
}

#[test]
fn alternate_vector_run_still_confirms() {
    let (_bus, reg) = registry(false);
    let r = acquire(&reg, DspId(2));
    r.set_alt_reset_vector(true);
    r.set_mode(DspMode::Run).unwrap();
    assert_eq!(r.read_mode(), DspMode::Run);
}
