//! Resource registry and client ownership.
//!
//! The registry is the single owner of every per-DSP resource object; it is
//! constructed explicitly and passed by reference — there is no hidden
//! singleton. Lock order is fixed: the registry lock is taken before any
//! resource lock and released before any resource-level blocking call, never
//! the reverse.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use adsp_chip::{ClockDomain, DpmLevel, DspId, ALL_IDS, DSP_COUNT};
use tracing::{debug, info, warn};

use crate::bus::RegisterBus;
use crate::clock::{ClockTransport, ClockVoter};
use crate::error::{DspError, Result};
use crate::pgfsm::Pgfsm;
use crate::resource::DspResource;
use crate::state::{DspMode, MemHandle};

/// Opaque consumer identity, created on attach and destroyed on detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_client: u64,
    /// Client → owned resources, so teardown never scans the cluster.
    clients: HashMap<u64, BTreeSet<DspId>>,
    owners: [Option<u64>; DSP_COUNT],
}

/// The cluster: all per-DSP resources plus client ownership arbitration.
#[derive(Debug)]
pub struct DspRegistry {
    bus: Arc<dyn RegisterBus>,
    resources: Vec<Arc<DspResource>>,
    /// Platform power-domain-bypass capability, snapshotted into a resource
    /// when it is acquired.
    bypass: bool,
    inner: Mutex<RegistryInner>,
}

impl DspRegistry {
    /// Build the fixed topology, configure the power-gate timings, and force
    /// every core through OFF once (idempotent; bring-up failures are logged
    /// and tolerated).
    pub fn new(
        bus: Arc<dyn RegisterBus>,
        transport: Arc<dyn ClockTransport>,
        bypass: bool,
    ) -> Self {
        let clock = Arc::new(ClockVoter::new(transport));
        let resources: Vec<Arc<DspResource>> = ALL_IDS
            .iter()
            .map(|&id| {
                let family = id.family().expect("topology id");
                Arc::new(DspResource::new(id, family, bus.clone(), clock.clone()))
            })
            .collect();

        let registry = Self {
            bus,
            resources,
            bypass,
            inner: Mutex::new(RegistryInner::default()),
        };

        let pgfsm = Pgfsm::new(&*registry.bus);
        for resource in &registry.resources {
            resource.snapshot_bypass(bypass);
            pgfsm.configure_timings(resource.id());
            resource.force_off();
        }
        info!(cores = registry.resources.len(), bypass, "cluster registry up");
        registry
    }

    fn lock_inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resource behind `id`.
    ///
    /// # Errors
    ///
    /// `InvalidId` if `id` is outside the configured topology.
    pub fn lookup(&self, id: DspId) -> Result<&Arc<DspResource>> {
        if id.family().is_none() {
            return Err(DspError::invalid_id(id.0));
        }
        Ok(&self.resources[id.index()])
    }

    // ── Clients ──────────────────────────────────────────────────────────────

    /// Create a client handle.
    pub fn attach_client(&self) -> ClientId {
        let mut inner = self.lock_inner();
        let id = inner.next_client;
        inner.next_client += 1;
        inner.clients.insert(id, BTreeSet::new());
        debug!(client = id, "client attached");
        ClientId(id)
    }

    /// Destroy a client handle, forcing every resource it owns to OFF
    /// (best-effort) before releasing the ownership.
    ///
    /// # Errors
    ///
    /// `UnknownClient` if the handle was never attached or already detached.
    pub fn detach_client(&self, client: ClientId) -> Result<()> {
        // Invalidate the handle first; ownership entries stay until the
        // cores are down, so nobody can acquire a core mid-teardown.
        let owned: Vec<Arc<DspResource>> = {
            let mut inner = self.lock_inner();
            let owned = inner
                .clients
                .remove(&client.0)
                .ok_or(DspError::UnknownClient { client: client.0 })?;
            owned
                .iter()
                .map(|&id| self.resources[id.index()].clone())
                .collect()
        };

        for resource in &owned {
            resource.force_off();
        }

        let mut inner = self.lock_inner();
        for resource in &owned {
            inner.owners[resource.id().index()] = None;
        }
        info!(%client, released = owned.len(), "client detached");
        Ok(())
    }

    // ── Ownership ────────────────────────────────────────────────────────────

    /// Bind `id` to `client` and return the resource. Idempotent for the
    /// owner; fails `Busy` while a different client holds it. The platform's
    /// bypass capability is snapshotted into the resource on success.
    ///
    /// # Errors
    ///
    /// `InvalidId`, `UnknownClient`, or `Busy`.
    pub fn acquire_resource(&self, client: ClientId, id: DspId) -> Result<Arc<DspResource>> {
        let resource = self.lookup(id)?.clone();
        {
            let mut inner = self.lock_inner();
            if !inner.clients.contains_key(&client.0) {
                return Err(DspError::UnknownClient { client: client.0 });
            }
            match inner.owners[id.index()] {
                Some(owner) if owner != client.0 => {
                    return Err(DspError::Busy { id: id.0, owner });
                }
                Some(_) => {}
                None => {
                    inner.owners[id.index()] = Some(client.0);
                    inner
                        .clients
                        .get_mut(&client.0)
                        .expect("checked above")
                        .insert(id);
                    debug!(%client, %id, "resource bound");
                }
            }
        }
        resource.snapshot_bypass(self.bypass);
        Ok(resource)
    }

    /// Release `client`'s ownership of `id`. Bookkeeping only: the core
    /// keeps its mode, and the next owner decides what to do with it.
    ///
    /// # Errors
    ///
    /// `InvalidId`, `UnknownClient`, or `Busy` if a different client owns it.
    pub fn release_resource(&self, client: ClientId, id: DspId) -> Result<()> {
        self.lookup(id)?;
        let mut inner = self.lock_inner();
        if !inner.clients.contains_key(&client.0) {
            return Err(DspError::UnknownClient { client: client.0 });
        }
        match inner.owners[id.index()] {
            Some(owner) if owner == client.0 => {
                inner.owners[id.index()] = None;
                inner
                    .clients
                    .get_mut(&client.0)
                    .expect("checked above")
                    .remove(&id);
                debug!(%client, %id, "resource released");
                Ok(())
            }
            Some(owner) => Err(DspError::Busy { id: id.0, owner }),
            None => Ok(()),
        }
    }

    /// Current owner of `id`, if any.
    ///
    /// # Errors
    ///
    /// `InvalidId`.
    pub fn owner(&self, id: DspId) -> Result<Option<ClientId>> {
        self.lookup(id)?;
        Ok(self.lock_inner().owners[id.index()].map(ClientId))
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Drive `id` toward `mode` on behalf of `client`. Ownership binds on
    /// this first touch; the registry lock is released before the transition
    /// runs.
    ///
    /// # Errors
    ///
    /// Ownership errors from acquisition, then transition errors unchanged.
    pub fn set_mode(&self, client: ClientId, id: DspId, mode: DspMode) -> Result<()> {
        let resource = self.acquire_resource(client, id)?;
        resource.set_mode(mode)
    }

    /// Confirmed mode of `id`, read from hardware status.
    ///
    /// # Errors
    ///
    /// `InvalidId`.
    pub fn read_mode(&self, id: DspId) -> Result<DspMode> {
        Ok(self.lookup(id)?.read_mode())
    }

    /// Vote a clock rate for `id` on behalf of `client` (first touch binds).
    ///
    /// # Errors
    ///
    /// Ownership errors from acquisition, then transport errors unchanged.
    pub fn vote_rate(&self, client: ClientId, id: DspId, hz: u64) -> Result<u64> {
        let resource = self.acquire_resource(client, id)?;
        resource.vote_rate(hz)
    }

    /// Apply a DPM level to every resource on `domain`: map it through the
    /// family table and re-vote each core that is not OFF.
    ///
    /// # Errors
    ///
    /// The first transport error; remaining siblings are still re-voted.
    pub fn set_dpm_level(&self, domain: ClockDomain, level: DpmLevel) -> Result<()> {
        info!(?domain, ?level, "dpm level change");
        let mut outcome = Ok(());
        for resource in &self.resources {
            if resource.family().clock_domain() != domain {
                continue;
            }
            if let Err(e) = resource.revote_for_dpm(level) {
                warn!(id = %resource.id(), error = %e, "dpm re-vote failed");
                outcome = outcome.and(Err(e));
            }
        }
        outcome
    }

    // ── External memory manager notifications ────────────────────────────────

    /// Record a descriptor the memory manager attached to `id`.
    ///
    /// # Errors
    ///
    /// `InvalidId`.
    pub fn memory_attached(&self, id: DspId, handle: MemHandle) -> Result<()> {
        self.lookup(id)?.memory_attached(handle);
        Ok(())
    }

    /// Drop a descriptor the memory manager released from `id`.
    ///
    /// # Errors
    ///
    /// `InvalidId`.
    pub fn memory_released(&self, id: DspId, handle: MemHandle) -> Result<()> {
        self.lookup(id)?.memory_released(handle);
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Reboot/shutdown notification: force every core OFF, downgrading all
    /// failures to logged warnings so shutdown always completes.
    pub fn shutdown_all(&self) {
        info!("cluster shutdown");
        for resource in &self.resources {
            resource.force_off();
        }
    }
}

impl Drop for DspRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
