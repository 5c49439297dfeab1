// src/load_balancer/least_conn.rs
use crate::load_balancer::{LoadBalancer, NoHealthyBackend};
use crate::proxy::Backend;
use std::sync::Arc;

/// Least-connections selection over the live backend set.
///
/// A plain linear scan: every call reads the current `healthy` and `load`
/// values, so there is no ordering structure that could go stale while
/// other requests move the counters. Among healthy backends with the lowest
/// load the one earliest in the set wins.
///
/// The answer is a snapshot. A concurrent request may bump the chosen
/// backend's load between selection and the caller's own increment.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn select_backend(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, NoHealthyBackend> {
        let mut best: Option<(&Arc<Backend>, usize)> = None;

        for backend in backends.iter().filter(|b| b.is_healthy()) {
            let load = backend.load();
            match best {
                // Strictly lower only: ties keep the earlier backend.
                Some((_, min)) if load >= min => {}
                _ => best = Some((backend, load)),
            }
        }

        best.map(|(backend, _)| backend.clone()).ok_or(NoHealthyBackend)
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::LoadGuard;
    use proptest::prelude::*;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| Arc::new(Backend::new(format!("server{}:8080", i + 1))))
            .collect()
    }

    fn with_loads(backends: &[Arc<Backend>], loads: &[usize]) -> Vec<LoadGuard> {
        backends
            .iter()
            .zip(loads)
            .flat_map(|(b, &n)| (0..n).map(move |_| b.acquire()))
            .collect()
    }

    fn index_of(backends: &[Arc<Backend>], chosen: &Arc<Backend>) -> usize {
        backends.iter().position(|b| Arc::ptr_eq(b, chosen)).unwrap()
    }

    #[test]
    fn picks_lowest_load() {
        let set = backends(3);
        let _guards = with_loads(&set, &[2, 2, 1]);

        let chosen = LeastConnections::new().select_backend(&set).unwrap();
        assert_eq!(index_of(&set, &chosen), 2);
    }

    #[test]
    fn skips_unhealthy_and_breaks_ties_by_position() {
        let set = backends(3);
        set[1].record_probe(false);

        let chosen = LeastConnections::new().select_backend(&set).unwrap();
        assert_eq!(index_of(&set, &chosen), 0);
    }

    #[test]
    fn unhealthy_backend_loses_even_when_idle() {
        let set = backends(3);
        let _guards = with_loads(&set, &[0, 0, 150]);
        set[0].record_probe(false);
        set[1].record_probe(false);

        let chosen = LeastConnections::new().select_backend(&set).unwrap();
        assert_eq!(chosen.addr, "server3:8080");
    }

    #[test]
    fn all_unhealthy_is_an_error() {
        let set = backends(3);
        for b in &set {
            b.record_probe(false);
        }

        assert_eq!(
            LeastConnections::new().select_backend(&set).unwrap_err(),
            NoHealthyBackend
        );
    }

    #[test]
    fn empty_set_is_an_error() {
        assert!(LeastConnections::new().select_backend(&[]).is_err());
    }

    #[test]
    fn follows_load_changes_between_calls() {
        let lb = LeastConnections::new();
        let set = backends(3);

        let mut held = Vec::new();
        for _ in 0..6 {
            let chosen = lb.select_backend(&set).unwrap();
            held.push(chosen.acquire());
        }
        assert!(set.iter().all(|b| b.load() == 2));

        // Releasing server2's requests makes it the only minimum.
        held.retain(|g| g.backend().addr != "server2:8080");
        let chosen = lb.select_backend(&set).unwrap();
        assert_eq!(chosen.addr, "server2:8080");
    }

    #[test]
    fn recovered_backend_rejoins_with_real_load() {
        let lb = LeastConnections::new();
        let set = backends(2);
        let _guards = with_loads(&set, &[3, 1]);

        set[1].record_probe(false);
        assert_eq!(lb.select_backend(&set).unwrap().addr, "server1:8080");

        set[1].record_probe(true);
        assert_eq!(lb.select_backend(&set).unwrap().addr, "server2:8080");
    }

    proptest! {
        #[test]
        fn chooses_a_healthy_minimum(
            state in proptest::collection::vec((any::<bool>(), 0usize..6), 1..8)
        ) {
            let set = backends(state.len());
            let loads: Vec<usize> = state.iter().map(|&(_, l)| l).collect();
            let _guards = with_loads(&set, &loads);
            for (b, &(healthy, _)) in set.iter().zip(&state) {
                b.record_probe(healthy);
            }

            let healthy_min = state.iter().filter(|(h, _)| *h).map(|&(_, l)| l).min();
            let result = LeastConnections::new().select_backend(&set);

            match healthy_min {
                None => prop_assert_eq!(result.unwrap_err(), NoHealthyBackend),
                Some(min) => {
                    let chosen = result.unwrap();
                    let idx = index_of(&set, &chosen);
                    let first = state.iter().position(|&(h, l)| h && l == min).unwrap();
                    prop_assert!(chosen.is_healthy());
                    prop_assert_eq!(chosen.load(), min);
                    prop_assert_eq!(idx, first);
                }
            }
        }

        #[test]
        fn repeated_selection_is_stable(loads in proptest::collection::vec(0usize..4, 1..6)) {
            let set = backends(loads.len());
            let _guards = with_loads(&set, &loads);
            let lb = LeastConnections::new();

            let first = lb.select_backend(&set).unwrap();
            for _ in 0..5 {
                prop_assert!(Arc::ptr_eq(&first, &lb.select_backend(&set).unwrap()));
            }
        }
    }
}
