use arc_swap::ArcSwapOption;
use crds::Route;
use std::sync::{Arc, Mutex};

/// The Routes seen by one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSnapshot {
    pub routes: Vec<Route>,
    pub generation: u64,
}

impl RouteSnapshot {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            generation: 0,
        }
    }
}

/// Holds the latest [`RouteSnapshot`]. Readers never block; writers are
/// serialized and stamp each snapshot with the next generation.
#[derive(Default)]
pub struct SnapshotRepo {
    current: ArcSwapOption<RouteSnapshot>,
    generation: Mutex<u64>,
}

impl SnapshotRepo {
    pub fn get(&self) -> Option<Arc<RouteSnapshot>> {
        self.current.load_full()
    }

    pub fn put(&self, mut snapshot: RouteSnapshot) -> u64 {
        let mut generation = match self.generation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *generation += 1;
        snapshot.generation = *generation;
        self.current.store(Some(Arc::new(snapshot)));
        *generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::tests::{destination, route};

    #[test]
    fn empty_until_first_put() {
        let repo = SnapshotRepo::default();
        assert!(repo.get().is_none());

        repo.put(RouteSnapshot::new(vec![]));
        let snapshot = repo.get().unwrap();
        assert!(snapshot.routes.is_empty());
        assert_eq!(snapshot.generation, 1);
    }

    #[test]
    fn later_puts_replace_earlier_ones() {
        let repo = SnapshotRepo::default();
        repo.put(RouteSnapshot::new(vec![route("r1", "h", "d.com", "", vec![])]));
        let held = repo.get().unwrap();

        let generation = repo.put(RouteSnapshot::new(vec![
            route("r1", "h", "d.com", "", vec![]),
            route("r2", "g", "d.com", "", vec![destination("x", 8080, None)]),
        ]));

        assert_eq!(generation, 2);
        assert_eq!(repo.get().unwrap().routes.len(), 2);
        // readers keep the snapshot they loaded
        assert_eq!(held.routes.len(), 1);
        assert_eq!(held.generation, 1);
    }

    #[test]
    fn concurrent_puts_get_distinct_generations() {
        let repo = Arc::new(SnapshotRepo::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                std::thread::spawn(move || repo.put(RouteSnapshot::new(vec![])))
            })
            .collect();
        let mut generations: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        generations.sort();

        assert_eq!(generations, (1..=8).collect::<Vec<_>>());
        assert_eq!(repo.get().unwrap().generation, 8);
    }
}
