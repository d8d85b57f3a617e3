//! Clock voting across sibling resources sharing a domain.

use std::sync::{Arc, Mutex};

use adsp_driver::{
    ClockDomain, ClockTransport, DpmLevel, DspId, DspMode, DspRegistry, Result, SimBus,
};

#[derive(Debug, Default)]
struct RecordingTransport {
    calls: Mutex<Vec<(ClockDomain, u64)>>,
}

impl RecordingTransport {
    fn last_for(&self, domain: ClockDomain) -> Option<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(d, _)| *d == domain)
            .map(|&(_, hz)| hz)
    }
}

impl ClockTransport for RecordingTransport {
    fn request_rate(&self, domain: ClockDomain, hz: u64) -> Result<()> {
        self.calls.lock().unwrap().push((domain, hz));
        Ok(())
    }
}

fn registry() -> (Arc<RecordingTransport>, DspRegistry) {
    let transport = Arc::new(RecordingTransport::default());
    let reg = DspRegistry::new(Arc::new(SimBus::new()), transport.clone(), false);
    (transport, reg)
}

#[test]
fn domain_rate_is_max_over_sibling_votes() {
    let (transport, reg) = registry();
    let client = reg.attach_client();
    let a = DspId(0);
    let b = DspId(1);

    // A off, B votes R: the domain runs at R.
    assert_eq!(reg.vote_rate(client, b, 200_000_000).unwrap(), 200_000_000);
    assert_eq!(transport.last_for(ClockDomain::Media), Some(200_000_000));

    // A votes higher while B stays active: the domain follows A.
    assert_eq!(reg.vote_rate(client, a, 400_000_000).unwrap(), 400_000_000);
    assert_eq!(transport.last_for(ClockDomain::Media), Some(400_000_000));

    // A relinquishes: the domain falls back to the remaining votes.
    assert_eq!(reg.vote_rate(client, a, 0).unwrap(), 200_000_000);
    assert_eq!(transport.last_for(ClockDomain::Media), Some(200_000_000));
}

#[test]
fn off_votes_zero_and_releases_the_domain() {
    let (transport, reg) = registry();
    let client = reg.attach_client();
    let id = DspId(2);

    reg.set_mode(client, id, DspMode::Run).unwrap();
    let running = transport.last_for(ClockDomain::Media).unwrap();
    assert!(running > 0);

    reg.set_mode(client, id, DspMode::Off).unwrap();
    assert_eq!(transport.last_for(ClockDomain::Media), Some(0));
}

#[test]
fn families_vote_on_their_own_domain() {
    let (transport, reg) = registry();
    let client = reg.attach_client();

    reg.vote_rate(client, DspId(0), 600_000_000).unwrap();
    reg.vote_rate(client, DspId(6), 300_000_000).unwrap();

    assert_eq!(transport.last_for(ClockDomain::Media), Some(600_000_000));
    assert_eq!(transport.last_for(ClockDomain::Control), Some(300_000_000));
}

#[test]
fn dpm_level_revotes_only_active_cores() {
    let (transport, reg) = registry();
    let client = reg.attach_client();
    let running = DspId(0);
    let off = DspId(1);

    reg.set_mode(client, running, DspMode::Run).unwrap();
    let before = transport.calls.lock().unwrap().len();

    reg.set_dpm_level(ClockDomain::Media, DpmLevel::Low).unwrap();

    // Exactly one re-vote: the running core. The OFF sibling only records
    // the new rate for its next power-up.
    let calls = transport.calls.lock().unwrap();
    assert_eq!(calls.len(), before + 1);
    assert_eq!(calls[before], (ClockDomain::Media, 200_000_000));
    drop(calls);

    assert_eq!(reg.lookup(off).unwrap().clock_rate(), 200_000_000);

    // The recorded rate is what the next RUN votes.
    reg.set_mode(client, off, DspMode::Run).unwrap();
    assert_eq!(transport.last_for(ClockDomain::Media), Some(200_000_000));
}

#[test]
fn pause_revotes_the_current_dpm_rate() {
    let (transport, reg) = registry();
    let client = reg.attach_client();
    let id = DspId(3);

    reg.set_mode(client, id, DspMode::Run).unwrap();
    reg.vote_rate(client, id, 100_000_000).unwrap();
    reg.set_mode(client, id, DspMode::Pause).unwrap();
    assert_eq!(transport.last_for(ClockDomain::Media), Some(100_000_000));
}
