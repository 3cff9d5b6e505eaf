//! Ranking and election policy.
//!
//! Pure decision logic over [`Rankable`] hosts: a total order by desirability,
//! the derived fallback choice and the trigger that decides when the active
//! host must be replaced.

use std::cmp::Ordering;

use derive_more::Display;
use tomahawk_traits::{HostId, Rankable};

/// Fixed slack, in milliseconds, a non-preferred active host may exceed
/// twice the best round-trip time by before it is replaced.
pub const SLOW_HOST_MARGIN_MS: f64 = 50.0;

/// Compare two hosts; `Ordering::Less` means `a` is the better host.
///
/// 1. Reachable, in-sync hosts before degraded ones.
/// 2. Within a bucket, the preferred host first.
/// 3. Otherwise lower round-trip time first.
pub fn compare<H: Rankable + ?Sized>(a: &H, b: &H) -> Ordering {
    a.is_degraded()
        .cmp(&b.is_degraded())
        .then_with(|| b.is_preferred().cmp(&a.is_preferred()))
        .then_with(|| a.rtt_ms().total_cmp(&b.rtt_ms()))
}

/// The fallback for `active` given hosts in ranked order.
///
/// If the best host is the active one the fallback is the runner-up,
/// otherwise it is the best host. A single host is its own fallback.
pub fn fallback<H: Rankable>(ranked: &[H], active: HostId) -> Option<&H> {
    match ranked {
        [] => None,
        [only] => Some(only),
        [best, runner_up, ..] => Some(if best.id() == active { runner_up } else { best }),
    }
}

/// Why an election was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ElectionReason {
    /// The active host failed its last probe.
    #[display("unreachable")]
    Unreachable,
    /// The active host has fallen behind the chain tip.
    #[display("out of sync")]
    OutOfSync,
    /// The preferred host is available again and ranks first.
    #[display("preferred host available")]
    PreferredAvailable,
    /// The active host is much slower than the best alternative.
    #[display("too slow")]
    TooSlow,
    /// The active host crossed the live-request failure threshold.
    #[display("too many failures")]
    TooManyFailures,
}

/// Decide whether the active host should be replaced after a probe round.
///
/// `best` is the top-ranked host and may be the active host itself.
pub fn should_elect<H: Rankable + ?Sized>(active: &H, best: &H) -> Option<ElectionReason> {
    if active.is_unreachable() {
        Some(ElectionReason::Unreachable)
    } else if active.is_out_of_sync() {
        Some(ElectionReason::OutOfSync)
    } else if best.id() != active.id() && best.is_preferred() {
        Some(ElectionReason::PreferredAvailable)
    } else if !active.is_preferred() && active.rtt_ms() > best.rtt_ms() * 2.0 + SLOW_HOST_MARGIN_MS
    {
        Some(ElectionReason::TooSlow)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Fake {
        id: HostId,
        rtt: f64,
        preferred: bool,
        out_of_sync: bool,
        unreachable: bool,
    }

    impl Fake {
        const fn new(id: HostId, rtt: f64) -> Self {
            Self { id, rtt, preferred: false, out_of_sync: false, unreachable: false }
        }

        const fn preferred(mut self) -> Self {
            self.preferred = true;
            self
        }

        const fn behind(mut self) -> Self {
            self.out_of_sync = true;
            self
        }

        const fn down(mut self) -> Self {
            self.unreachable = true;
            self.out_of_sync = true;
            self
        }
    }

    impl Rankable for Fake {
        fn id(&self) -> HostId {
            self.id
        }
        fn rtt_ms(&self) -> f64 {
            self.rtt
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

    fn ranked(mut hosts: Vec<Fake>) -> Vec<HostId> {
        hosts.sort_by(compare);
        hosts.iter().map(|h| h.id).collect()
    }

    #[test]
    fn test_lower_rtt_first() {
        assert_eq!(ranked(vec![Fake::new(1, 80.0), Fake::new(2, 20.0), Fake::new(3, 40.0)]), vec![
            2, 3, 1
        ]);
    }

    #[test]
    fn test_preferred_beats_faster_host() {
        let primary = Fake::new(0, f64::INFINITY).preferred();
        let mirror = Fake::new(1, 20.0);
        assert_eq!(compare(&primary, &mirror), Ordering::Less);
        assert_eq!(compare(&mirror, &primary), Ordering::Greater);
    }

    #[test]
    fn test_degraded_sorts_last_even_if_preferred() {
        let primary = Fake::new(0, 1.0).preferred().down();
        let mirror = Fake::new(1, 500.0);
        let behind = Fake::new(2, 5.0).behind();
        assert_eq!(ranked(vec![primary, mirror, behind]), vec![1, 0, 2]);
    }

    #[test]
    fn test_unmeasured_rtt_sorts_last_in_bucket() {
        assert_eq!(ranked(vec![Fake::new(1, f64::INFINITY), Fake::new(2, 900.0)]), vec![2, 1]);
    }

    #[test]
    fn test_comparator_is_transitive() {
        let hosts = [
            Fake::new(0, 30.0).preferred(),
            Fake::new(1, 10.0),
            Fake::new(2, 20.0),
            Fake::new(3, 5.0).behind(),
            Fake::new(4, f64::INFINITY),
            Fake::new(5, 1.0).down(),
        ];
        for a in &hosts {
            for b in &hosts {
                assert_eq!(compare(a, b), compare(b, a).reverse());
                for c in &hosts {
                    if compare(a, b) != Ordering::Greater && compare(b, c) != Ordering::Greater {
                        assert_ne!(compare(a, c), Ordering::Greater, "{a:?} {b:?} {c:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_fallback_is_runner_up_when_active_is_best() {
        let hosts = [Fake::new(0, 10.0), Fake::new(1, 20.0), Fake::new(2, 30.0)];
        assert_eq!(fallback(&hosts, 0).map(|h| h.id), Some(1));
    }

    #[test]
    fn test_fallback_is_best_when_active_is_not() {
        let hosts = [Fake::new(1, 10.0), Fake::new(0, 20.0), Fake::new(2, 30.0)];
        assert_eq!(fallback(&hosts, 0).map(|h| h.id), Some(1));
        assert_eq!(fallback(&hosts, 2).map(|h| h.id), Some(1));
    }

    #[test]
    fn test_single_host_is_own_fallback() {
        let hosts = [Fake::new(0, 10.0).preferred()];
        assert_eq!(fallback(&hosts, 0).map(|h| h.id), Some(0));
        assert!(fallback::<Fake>(&[], 0).is_none());
    }

    #[rstest]
    #[case::healthy_preferred(Fake::new(0, 300.0).preferred(), Fake::new(0, 300.0).preferred(), None)]
    #[case::unreachable(Fake::new(0, 10.0).preferred().down(), Fake::new(1, 20.0), Some(ElectionReason::Unreachable))]
    #[case::out_of_sync(Fake::new(0, 10.0).preferred().behind(), Fake::new(1, 20.0), Some(ElectionReason::OutOfSync))]
    #[case::preferred_back(Fake::new(1, 10.0), Fake::new(0, 40.0).preferred(), Some(ElectionReason::PreferredAvailable))]
    #[case::too_slow(Fake::new(1, 151.0), Fake::new(2, 50.0), Some(ElectionReason::TooSlow))]
    #[case::slow_within_margin(Fake::new(1, 150.0), Fake::new(2, 50.0), None)]
    #[case::slow_but_preferred(Fake::new(0, 900.0).preferred(), Fake::new(0, 900.0).preferred(), None)]
    fn test_should_elect(
        #[case] active: Fake,
        #[case] best: Fake,
        #[case] expected: Option<ElectionReason>,
    ) {
        assert_eq!(should_elect(&active, &best), expected);
    }
}
