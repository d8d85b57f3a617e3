//! Cross-resource clock-rate voting.
//!
//! Each family shares one clock domain, so the domain rate is the maximum
//! over every sibling's current vote. The winning rate is requested from an
//! external transport (mailbox to the system controller on hardware); this
//! engine owns only the arithmetic and the per-domain vote table.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use adsp_chip::{ClockDomain, DspId, DSP_COUNT};

use crate::error::Result;

/// External clock-rate transport. Synchronous; the timeout is owned by the
/// transport implementation.
pub trait ClockTransport: Debug + Send + Sync {
    /// Request `hz` for `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller refuses or the transport fails.
    fn request_rate(&self, domain: ClockDomain, hz: u64) -> Result<()>;
}

/// Transport that accepts every request. For bring-up, demos, and bypassed
/// deployments without a system controller.
#[derive(Debug, Default)]
pub struct NopTransport;

impl ClockTransport for NopTransport {
    fn request_rate(&self, domain: ClockDomain, hz: u64) -> Result<()> {
        tracing::trace!(?domain, hz, "clock request accepted");
        Ok(())
    }
}

/// Per-domain vote tables plus the transport behind them.
///
/// Voting locks the whole domain: computing the effective rate reads every
/// sibling's vote, so per-resource locking would race.
#[derive(Debug)]
pub(crate) struct ClockVoter {
    transport: Arc<dyn ClockTransport>,
    domains: [Mutex<[u64; DSP_COUNT]>; 2],
}

impl ClockVoter {
    pub(crate) fn new(transport: Arc<dyn ClockTransport>) -> Self {
        Self {
            transport,
            domains: [Mutex::new([0; DSP_COUNT]), Mutex::new([0; DSP_COUNT])],
        }
    }

    /// Record `hz` as `id`'s vote and request the resulting effective rate
    /// (max over the domain) from the transport.
    pub(crate) fn vote(&self, id: DspId, hz: u64) -> Result<u64> {
        let Some(family) = id.family() else {
            return Err(crate::error::DspError::invalid_id(id.0));
        };
        let domain = family.clock_domain();
        let mut votes = self.domains[domain.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        votes[id.index()] = hz;
        let effective = effective_rate(&*votes);
        tracing::debug!(%id, ?domain, hz, effective, "clock vote");
        self.transport.request_rate(domain, effective)?;
        Ok(effective)
    }
}

/// Max over all sibling votes.
fn effective_rate(votes: &[u64]) -> u64 {
    votes.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recording {
        calls: Mutex<Vec<(ClockDomain, u64)>>,
    }

    impl ClockTransport for Recording {
        fn request_rate(&self, domain: ClockDomain, hz: u64) -> Result<()> {
            self.calls.lock().unwrap().push((domain, hz));
            Ok(())
        }
    }

    #[test]
    fn effective_rate_is_max_of_votes() {
        assert_eq!(effective_rate(&[0, 0, 0]), 0);
        assert_eq!(effective_rate(&[100, 400, 200]), 400);
        assert_eq!(effective_rate(&[]), 0);
    }

    #[test]
    fn sibling_votes_keep_domain_high() {
        let transport = Arc::new(Recording::default());
        let voter = ClockVoter::new(transport.clone());

        voter.vote(DspId(0), 200).unwrap();
        voter.vote(DspId(1), 400).unwrap();
        // Dropping the smaller vote leaves the domain at the sibling's rate.
        assert_eq!(voter.vote(DspId(0), 0).unwrap(), 400);
        // Dropping the last vote releases the domain.
        assert_eq!(voter.vote(DspId(1), 0).unwrap(), 0);

        let calls = transport.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                (ClockDomain::Media, 200),
                (ClockDomain::Media, 400),
                (ClockDomain::Media, 400),
                (ClockDomain::Media, 0),
            ]
        );
    }

    #[test]
    fn domains_vote_independently() {
        let transport = Arc::new(Recording::default());
        let voter = ClockVoter::new(transport.clone());

        voter.vote(DspId(0), 600).unwrap();
        assert_eq!(voter.vote(DspId(6), 300).unwrap(), 300);

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[1], (ClockDomain::Control, 300));
    }
}
