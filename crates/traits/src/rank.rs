//! Ranking view of a host.

/// Stable identifier of a host within a registry.
///
/// Hosts are created once at startup and never removed, so an id stays valid
/// for the lifetime of the registry that issued it.
pub type HostId = usize;

/// The metrics the ranking policy orders hosts by.
pub trait Rankable {
    /// Registry identifier.
    fn id(&self) -> HostId;

    /// Mean round-trip time in milliseconds, `f64::INFINITY` when unmeasured.
    fn rtt_ms(&self) -> f64;

    /// Whether this is the configured primary host.
    fn is_preferred(&self) -> bool;

    /// Whether the host lags the observed chain tip or its height is unknown.
    fn is_out_of_sync(&self) -> bool;

    /// Whether the last probe failed outright.
    fn is_unreachable(&self) -> bool;

    /// Whether the host falls in the degraded availability bucket.
    fn is_degraded(&self) -> bool {
        self.is_unreachable() || self.is_out_of_sync()
    }
}

impl<T: Rankable + ?Sized> Rankable for &T {
    fn id(&self) -> HostId {
        (**self).id()
    }

    fn rtt_ms(&self) -> f64 {
        (**self).rtt_ms()
    }

    fn is_preferred(&self) -> bool {
        (**self).is_preferred()
    }

    fn is_out_of_sync(&self) -> bool {
        (**self).is_out_of_sync()
    }

    fn is_unreachable(&self) -> bool {
        (**self).is_unreachable()
    }
}
