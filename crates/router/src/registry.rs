//! Host registry: the fixed host set and the active designation.

use std::time::Duration;

use derive_more::Debug;
use parking_lot::RwLock;
use tomahawk_traits::{HostId, Rankable};
use tomahawk_types::{BlockHeight, HostAddress};

use crate::{
    host::Host,
    metrics,
    ranking::{self, ElectionReason},
};

/// Default number of consecutive failures tolerated before an election.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Result of probing one host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeResult {
    /// The host answered. `height` is `None` if the body was not a height.
    Answered {
        /// Measured round-trip time.
        rtt: Duration,
        /// Reported tip height.
        height: Option<BlockHeight>,
    },
    /// Connection error, error status or timeout.
    Failed,
}

impl ProbeResult {
    /// Height reported by the host, if it answered with one.
    #[must_use]
    pub const fn height(&self) -> Option<BlockHeight> {
        match self {
            Self::Answered { height, .. } => *height,
            Self::Failed => None,
        }
    }
}

/// A committed change of active host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    /// Why the election was held.
    pub reason: ElectionReason,
    /// Host deposed by the election.
    pub from: HostAddress,
    /// Host that is now active. May equal `from` if nothing better exists.
    pub to: HostAddress,
}

/// Outcome of applying one probe round.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Highest tip reported this round, 0 if no host answered.
    pub max_height: BlockHeight,
    /// Election triggered by the round, if any.
    pub election: Option<Election>,
    /// Registry state after the round.
    pub snapshot: RegistrySnapshot,
}

/// Consistent copy of every host, in ranked order, plus the active host.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    hosts: Vec<Host>,
    active: HostId,
}

impl RegistrySnapshot {
    /// Hosts in ranked order, best first.
    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// The active host.
    #[must_use]
    pub fn active(&self) -> Option<&Host> {
        self.hosts.iter().find(|h| h.id() == self.active)
    }

    /// The fallback host, derived from the ranked order.
    #[must_use]
    pub fn fallback(&self) -> Option<&Host> {
        ranking::fallback(&self.hosts, self.active)
    }

    /// Whether `host` is the active host.
    #[must_use]
    pub fn is_active(&self, host: &Host) -> bool {
        host.id() == self.active
    }
}

#[derive(Debug)]
struct RegistryState {
    /// Indexed by [`HostId`].
    #[debug("{} hosts", hosts.len())]
    hosts: Vec<Host>,
    /// Host ids in ranked order.
    order: Vec<HostId>,
    active: HostId,
    /// Bumped on every metric mutation.
    epoch: u64,
    /// Epoch at which the last election committed.
    last_election: Option<u64>,
}

impl RegistryState {
    fn rank(&mut self) {
        let hosts = &self.hosts;
        self.order.sort_by(|a, b| ranking::compare(&hosts[*a], &hosts[*b]));
    }

    fn ranked(&self) -> Vec<&Host> {
        self.order.iter().map(|id| &self.hosts[*id]).collect()
    }

    fn best(&self) -> &Host {
        self.order.first().map_or(&self.hosts[self.active], |id| &self.hosts[*id])
    }

    fn fallback(&self) -> &Host {
        let ranked = self.ranked();
        ranking::fallback(&ranked, self.active).copied().unwrap_or(&self.hosts[self.active])
    }

    /// Depose the active host and install the best-ranked one.
    ///
    /// A second election with no metric change in between is a no-op.
    fn elect(&mut self, reason: ElectionReason) -> Option<Election> {
        if self.last_election == Some(self.epoch) {
            return None;
        }

        let from = self.active;
        self.hosts[from].depose();
        self.rank();
        self.active = self.best().id();
        self.epoch += 1;
        self.last_election = Some(self.epoch);

        let election = Election {
            reason,
            from: self.hosts[from].address().clone(),
            to: self.hosts[self.active].address().clone(),
        };
        warn!(reason = %election.reason, from = %election.from, to = %election.to, "Switching esplora host");
        metrics::record_election(&election);
        Some(election)
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            hosts: self.ranked().into_iter().cloned().collect(),
            active: self.active,
        }
    }
}

/// Owns the fixed set of hosts and the current active designation.
///
/// All mutations serialize on one lock and readers never observe a
/// partially applied update or a half-finished election.
#[derive(Debug)]
pub struct HostRegistry {
    state: RwLock<RegistryState>,
    max_failures: u32,
}

impl HostRegistry {
    /// Create a registry from the primary host and its fallback mirrors.
    ///
    /// The primary is preferred and starts as the active host.
    #[must_use]
    pub fn new(
        primary: HostAddress,
        mirrors: impl IntoIterator<Item = HostAddress>,
        max_failures: u32,
    ) -> Self {
        let mut hosts = vec![Host::new(0, primary, true)];
        hosts.extend(mirrors.into_iter().enumerate().map(|(i, addr)| Host::new(i + 1, addr, false)));
        let order = (0..hosts.len()).collect();

        Self {
            state: RwLock::new(RegistryState {
                hosts,
                order,
                active: 0,
                epoch: 0,
                last_election: None,
            }),
            max_failures,
        }
    }

    /// Number of registered hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().hosts.len()
    }

    /// Always false; the primary host is always registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().hosts.is_empty()
    }

    /// Whether more than one host is registered.
    #[must_use]
    pub fn is_multihost(&self) -> bool {
        self.len() > 1
    }

    /// Failure threshold that triggers an election.
    #[must_use]
    pub const fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// The host currently serving live traffic.
    #[must_use]
    pub fn get_active(&self) -> Host {
        let state = self.state.read();
        state.hosts[state.active].clone()
    }

    /// The best alternative to the active host, or the active host itself
    /// when it is the only one.
    #[must_use]
    pub fn get_fallback(&self) -> Host {
        self.state.read().fallback().clone()
    }

    /// Every host id with its address, in registration order.
    #[must_use]
    pub fn addresses(&self) -> Vec<(HostId, HostAddress)> {
        self.state.read().hosts.iter().map(|h| (h.id(), h.address().clone())).collect()
    }

    /// Consistent copy of the registry in ranked order.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.read().snapshot()
    }

    /// Record a successful live request against `host`.
    ///
    /// The host is reachable again, so it is re-ranked.
    pub fn record_success(&self, host: HostId) {
        let mut state = self.state.write();
        if let Some(h) = state.hosts.get_mut(host) {
            h.record_success();
            state.epoch += 1;
            state.rank();
        }
    }

    /// Record a failed live request against `host` and return the host a
    /// retry should target.
    ///
    /// Once the failure count exceeds the threshold on a multi-host
    /// registry an election is held and the new active host is returned;
    /// otherwise the current fallback is returned.
    pub fn record_failure(&self, host: HostId) -> Host {
        self.fail(host, false)
    }

    /// Like [`HostRegistry::record_failure`], for a live request that could
    /// not connect at all: the host is also marked unreachable and re-ranked
    /// before the retry target is chosen.
    pub fn record_unreachable(&self, host: HostId) -> Host {
        self.fail(host, true)
    }

    fn fail(&self, host: HostId, unreachable: bool) -> Host {
        let mut state = self.state.write();
        let Some(h) = state.hosts.get_mut(host) else {
            return state.fallback().clone();
        };
        if unreachable {
            h.mark_unreachable();
        }
        let failures = h.record_failure();
        state.epoch += 1;
        if unreachable {
            state.rank();
        }

        if failures > self.max_failures && state.hosts.len() > 1 {
            warn!(host = %state.hosts[host].address(), failures, "Too many esplora failures, falling back to next best alternative");
            state.elect(ElectionReason::TooManyFailures);
            return state.hosts[state.active].clone();
        }

        state.fallback().clone()
    }

    /// Hold an election: depose the active host and install the best one.
    ///
    /// Returns `None` when nothing changed since the previous election.
    pub fn elect(&self, reason: ElectionReason) -> Option<Election> {
        self.state.write().elect(reason)
    }

    /// Apply the results of one probe round, re-rank, and elect a new active
    /// host if the current one is degraded or clearly outclassed.
    pub fn apply_probe_round(
        &self,
        results: impl IntoIterator<Item = (HostId, ProbeResult)>,
    ) -> ProbeOutcome {
        let results: Vec<_> = results.into_iter().collect();
        let max_height = results.iter().filter_map(|(_, r)| r.height()).max().unwrap_or(0);

        let mut state = self.state.write();
        for (id, result) in results {
            let Some(host) = state.hosts.get_mut(id) else { continue };
            match result {
                ProbeResult::Answered { rtt, height } => host.record_probe(rtt, height, max_height),
                ProbeResult::Failed => host.record_probe_failure(),
            }
        }
        state.epoch += 1;
        state.rank();

        let reason = ranking::should_elect(&state.hosts[state.active], state.best());
        let election = reason.and_then(|reason| state.elect(reason));

        ProbeOutcome { max_height, election, snapshot: state.snapshot() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(name: &str) -> HostAddress {
        HostAddress::url(format!("http://{name}.local"))
    }

    fn registry(mirrors: usize) -> HostRegistry {
        HostRegistry::new(
            url("primary"),
            (0..mirrors).map(|i| url(&format!("mirror{i}"))),
            DEFAULT_MAX_FAILURES,
        )
    }

    fn answered(ms: u64, height: BlockHeight) -> ProbeResult {
        ProbeResult::Answered { rtt: Duration::from_millis(ms), height: Some(height) }
    }

    #[test]
    fn test_primary_starts_active_and_preferred() {
        let registry = registry(2);
        let active = registry.get_active();
        assert_eq!(active.address(), &url("primary"));
        assert!(active.is_preferred());
        assert_eq!(registry.snapshot().hosts().iter().filter(|h| h.is_preferred()).count(), 1);
        assert_eq!(registry.get_fallback().address(), &url("mirror0"));
    }

    #[test]
    fn test_single_host_fallback_is_active() {
        let registry = registry(0);
        assert!(!registry.is_multihost());
        assert_eq!(registry.get_fallback(), registry.get_active());
        for _ in 0..10 {
            assert_eq!(registry.record_failure(0).id(), 0);
        }
        assert_eq!(registry.get_active().id(), 0);
    }

    #[test]
    fn test_success_decrements_with_floor() {
        let registry = registry(1);
        registry.record_failure(0);
        registry.record_failure(0);
        registry.record_success(0);
        assert_eq!(registry.get_active().failure_count(), 1);
        registry.record_success(0);
        registry.record_success(0);
        assert_eq!(registry.get_active().failure_count(), 0);
    }

    #[test]
    fn test_failure_threshold_triggers_election() {
        let registry = registry(1);
        for _ in 0..DEFAULT_MAX_FAILURES {
            let next = registry.record_failure(0);
            assert_eq!(next.address(), &url("mirror0"), "fallback before threshold");
            assert_eq!(registry.get_active().id(), 0);
        }

        let next = registry.record_failure(0);
        assert_eq!(next.address(), &url("mirror0"));
        assert_eq!(registry.get_active().address(), &url("mirror0"));

        let snapshot = registry.snapshot();
        let old = snapshot.hosts().iter().find(|h| h.id() == 0).unwrap();
        assert_eq!(old.failure_count(), 0);
        assert!(old.is_out_of_sync());
        assert!(old.is_preferred());
    }

    #[test]
    fn test_live_connection_failure_marks_unreachable() {
        let registry = registry(2);
        registry.apply_probe_round([(0, answered(10, 100)), (1, answered(40, 100)), (2, answered(20, 100))]);
        assert_eq!(registry.get_fallback().address(), &url("mirror1"));

        let next = registry.record_unreachable(0);

        let primary = registry.get_active();
        assert_eq!(primary.id(), 0, "no election below the threshold");
        assert!(primary.is_unreachable());
        assert_eq!(primary.failure_count(), 1);
        assert_eq!(next.address(), &url("mirror1"));
        assert_eq!(registry.snapshot().hosts().last().unwrap().id(), 0);

        registry.record_success(0);
        let primary = registry.get_active();
        assert!(!primary.is_unreachable());
        assert_eq!(registry.snapshot().hosts()[0].id(), 0);
    }

    #[test]
    fn test_plain_failure_keeps_host_reachable() {
        let registry = registry(1);
        registry.record_failure(0);
        assert!(!registry.get_active().is_unreachable());
    }

    #[test]
    fn test_election_is_idempotent() {
        let registry = registry(2);
        let first = registry.elect(ElectionReason::TooManyFailures).unwrap();
        assert_eq!(first.from, url("primary"));
        let active = registry.get_active();

        assert!(registry.elect(ElectionReason::TooManyFailures).is_none());
        assert_eq!(registry.get_active(), active);
    }

    #[test]
    fn test_probe_round_marks_lagging_host() {
        let registry = registry(1);
        let outcome = registry.apply_probe_round([(0, answered(10, 100)), (1, answered(20, 97))]);
        assert_eq!(outcome.max_height, 100);
        assert!(outcome.election.is_none());

        let snapshot = registry.snapshot();
        let primary = snapshot.hosts().iter().find(|h| h.id() == 0).unwrap();
        let mirror = snapshot.hosts().iter().find(|h| h.id() == 1).unwrap();
        assert!(!primary.is_out_of_sync());
        assert!(mirror.is_out_of_sync());
        assert_eq!(mirror.latest_height(), Some(97));
    }

    #[test]
    fn test_unprobed_preferred_stays_active() {
        let registry = registry(1);
        // Primary never answers a probe but is neither down nor behind.
        let outcome = registry.apply_probe_round([(1, answered(20, 100))]);
        assert!(outcome.election.is_none());
        assert_eq!(registry.get_active().id(), 0);
        assert!(registry.get_active().rtt().is_infinite());
    }

    #[test]
    fn test_unreachable_active_fails_over() {
        let registry = registry(2);
        let outcome = registry.apply_probe_round([
            (0, ProbeResult::Failed),
            (1, answered(40, 100)),
            (2, answered(20, 100)),
        ]);
        let election = outcome.election.unwrap();
        assert_eq!(election.reason, ElectionReason::Unreachable);
        assert_eq!(election.to, url("mirror1"));
        assert_eq!(registry.get_active().address(), &url("mirror1"));
        assert_eq!(registry.get_fallback().address(), &url("mirror0"));
    }

    #[test]
    fn test_preferred_host_reclaims_active() {
        let registry = registry(1);
        registry.apply_probe_round([(0, ProbeResult::Failed), (1, answered(20, 100))]);
        assert_eq!(registry.get_active().id(), 1);

        let outcome = registry.apply_probe_round([(0, answered(80, 101)), (1, answered(20, 101))]);
        assert_eq!(outcome.election.unwrap().reason, ElectionReason::PreferredAvailable);
        assert_eq!(registry.get_active().id(), 0);
    }

    #[test]
    fn test_slow_mirror_replaced_by_faster_mirror() {
        let registry = registry(2);
        registry.apply_probe_round([
            (0, ProbeResult::Failed),
            (1, answered(10, 100)),
            (2, answered(30, 100)),
        ]);
        assert_eq!(registry.get_active().id(), 1);

        // Primary still down; mirror0 degrades to 400ms over a full window.
        let mut outcome = None;
        for _ in 0..5 {
            outcome = Some(registry.apply_probe_round([
                (0, ProbeResult::Failed),
                (1, answered(400, 100)),
                (2, answered(30, 100)),
            ]));
        }
        assert_eq!(registry.get_active().id(), 2);
        assert!(outcome.unwrap().snapshot.is_active(&registry.get_active()));
    }

    #[test]
    fn test_snapshot_fallback_matches_registry() {
        let registry = registry(2);
        registry.apply_probe_round([(0, answered(50, 10)), (1, answered(30, 10)), (2, answered(10, 10))]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.active().unwrap(), &registry.get_active());
        assert_eq!(snapshot.fallback().unwrap(), &registry.get_fallback());
        assert_eq!(registry.get_fallback().id(), 2);
    }
}
