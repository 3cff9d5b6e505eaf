//! Host records and their round-trip-time window.

use std::{collections::VecDeque, time::Duration};

use tomahawk_traits::{HostId, Rankable};
use tomahawk_types::{BlockHeight, HostAddress};

/// Number of round-trip samples retained per host.
pub const RTT_WINDOW: usize = 5;

/// Maximum number of blocks a host may trail the best observed tip by.
pub const MAX_HEIGHT_LAG: BlockHeight = 2;

/// Bounded, newest-first window of round-trip times in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttWindow {
    samples: VecDeque<f64>,
}

impl RttWindow {
    /// Push a new sample, dropping the oldest once the window is full.
    pub fn push(&mut self, rtt: Duration) {
        self.samples.push_front(rtt.as_secs_f64() * 1000.0);
        self.samples.truncate(RTT_WINDOW);
    }

    /// Arithmetic mean of the retained samples, `+inf` when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return f64::INFINITY;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Retained samples, newest first.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A candidate Esplora backend and its runtime metrics.
///
/// Every field has a defined value from construction; `rtt` is derived from
/// the sample window on read so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    id: HostId,
    address: HostAddress,
    rtt_samples: RttWindow,
    latest_height: Option<BlockHeight>,
    failure_count: u32,
    out_of_sync: bool,
    unreachable: bool,
    preferred: bool,
}

impl Host {
    /// Create a host record with empty metrics.
    #[must_use]
    pub fn new(id: HostId, address: HostAddress, preferred: bool) -> Self {
        Self {
            id,
            address,
            rtt_samples: RttWindow::default(),
            latest_height: None,
            failure_count: 0,
            out_of_sync: false,
            unreachable: false,
            preferred,
        }
    }

    /// Connection target.
    #[must_use]
    pub const fn address(&self) -> &HostAddress {
        &self.address
    }

    /// Round-trip samples, newest first.
    #[must_use]
    pub const fn rtt_samples(&self) -> &RttWindow {
        &self.rtt_samples
    }

    /// Mean round-trip time in milliseconds.
    #[must_use]
    pub fn rtt(&self) -> f64 {
        self.rtt_samples.mean()
    }

    /// Last observed tip height.
    #[must_use]
    pub const fn latest_height(&self) -> Option<BlockHeight> {
        self.latest_height
    }

    /// Consecutive live-request failures.
    #[must_use]
    pub const fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Apply a successful probe.
    ///
    /// `height` is `None` when the host answered with something that is not a
    /// block height, which marks it out of sync like an unknown height.
    pub(crate) fn record_probe(
        &mut self,
        rtt: Duration,
        height: Option<BlockHeight>,
        max_height: BlockHeight,
    ) {
        self.rtt_samples.push(rtt);
        self.latest_height = height;
        self.out_of_sync = height.is_none_or(|h| max_height.saturating_sub(h) > MAX_HEIGHT_LAG);
        self.unreachable = false;
    }

    /// Apply a failed probe.
    pub(crate) const fn record_probe_failure(&mut self) {
        self.out_of_sync = true;
        self.unreachable = true;
    }

    pub(crate) const fn record_success(&mut self) {
        self.failure_count = self.failure_count.saturating_sub(1);
        self.unreachable = false;
    }

    /// A live request could not connect.
    pub(crate) const fn mark_unreachable(&mut self) {
        self.unreachable = true;
    }

    pub(crate) const fn record_failure(&mut self) -> u32 {
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count
    }

    /// Mark the host as deposed by an election.
    pub(crate) const fn depose(&mut self) {
        self.out_of_sync = true;
        self.failure_count = 0;
    }
}

impl Rankable for Host {
    fn id(&self) -> HostId {
        self.id
    }

    fn rtt_ms(&self) -> f64 {
        self.rtt()
    }

    fn is_preferred(&self) -> bool {
        self.preferred
    }

    fn is_out_of_sync(&self) -> bool {
        self.out_of_sync
    }

    fn is_unreachable(&self) -> bool {
        self.unreachable
    }
}
