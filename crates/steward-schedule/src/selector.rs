//! Store selection: scoring, tie-breaking, and the selector flavours used
//! by the schedulers and checkers.

use rand::rngs::StdRng;
use rand::Rng;

use steward_model::{ResourceKind, Store};

use crate::cluster::Cluster;
use crate::filter::{filter_source, filter_target, Filter};

/// Weight base for location labels. Earlier labels dominate later ones:
/// with three labels, a zone difference scores 16, a rack difference 4, a
/// host difference 1.
const REPLICA_BASE_SCORE: f64 = 4.0;

/// Topology-diversity contribution of placing a peer on `candidate` next to
/// peers on `stores`. For every existing store, the first label (in priority
/// order) at which the two differ contributes `4^(labels_below_it)`.
pub fn distinct_score(labels: &[String], stores: &[Store], candidate: &Store) -> f64 {
    let mut score = 0.0;
    for store in stores {
        if store.id == candidate.id {
            continue;
        }
        if let Some(index) = store.compare_location(candidate, labels) {
            score += REPLICA_BASE_SCORE.powi((labels.len() - index - 1) as i32);
        }
    }
    score
}

fn sorted_by_id(mut stores: Vec<Store>) -> Vec<Store> {
    stores.sort_by_key(|s| s.id);
    stores
}

/// Picks balance sources and targets by weighted resource score.
pub struct BalanceSelector {
    kind: ResourceKind,
    filters: Vec<Box<dyn Filter>>,
}

impl BalanceSelector {
    /// A selector ranking stores by the given resource.
    pub fn new(kind: ResourceKind, filters: Vec<Box<dyn Filter>>) -> Self {
        Self { kind, filters }
    }

    /// The unfiltered store with the highest resource score; ties go to the
    /// lowest id.
    pub fn select_source(&self, cluster: &dyn Cluster, stores: &[Store]) -> Option<Store> {
        let mut best: Option<(Store, f64)> = None;
        for store in sorted_by_id(stores.to_vec()) {
            if filter_source(cluster, &store, &self.filters) {
                continue;
            }
            let score = store.resource_score(self.kind, 0);
            match &best {
                Some((_, best_score)) if score <= *best_score => {}
                _ => best = Some((store, score)),
            }
        }
        best.map(|(store, _)| store)
    }

    /// The unfiltered store with the lowest resource score; ties go to the
    /// lowest id. `extra` filters apply on top of the pipeline.
    pub fn select_target(
        &self,
        cluster: &dyn Cluster,
        stores: &[Store],
        extra: &[Box<dyn Filter>],
    ) -> Option<Store> {
        let mut best: Option<(Store, f64)> = None;
        for store in sorted_by_id(stores.to_vec()) {
            if filter_target(cluster, &store, &self.filters)
                || filter_target(cluster, &store, extra)
            {
                continue;
            }
            let score = store.resource_score(self.kind, 0);
            match &best {
                Some((_, best_score)) if score >= *best_score => {}
                _ => best = Some((store, score)),
            }
        }
        best.map(|(store, _)| store)
    }
}

/// Picks replica placements by topology diversity first, then load.
pub struct ReplicaSelector {
    region_stores: Vec<Store>,
    labels: Vec<String>,
    filters: Vec<Box<dyn Filter>>,
}

impl ReplicaSelector {
    /// A selector scoring candidates against the region's current stores.
    pub fn new(region_stores: Vec<Store>, labels: Vec<String>, filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            region_stores,
            labels,
            filters,
        }
    }

    /// The best store to gain a replica: highest distinct score, then lowest
    /// region score, then lowest id. Filters apply per candidate.
    pub fn select_target(
        &self,
        cluster: &dyn Cluster,
        stores: &[Store],
        extra: &[Box<dyn Filter>],
    ) -> Option<Store> {
        let mut best: Option<(Store, f64)> = None;
        for store in sorted_by_id(stores.to_vec()) {
            if filter_target(cluster, &store, &self.filters)
                || filter_target(cluster, &store, extra)
            {
                continue;
            }
            let score = distinct_score(&self.labels, &self.region_stores, &store);
            let better = match &best {
                None => true,
                Some((held, held_score)) => {
                    score > *held_score
                        || (score == *held_score
                            && store.resource_score(ResourceKind::Region, 0)
                                < held.resource_score(ResourceKind::Region, 0))
                }
            };
            if better {
                best = Some((store, score));
            }
        }
        best.map(|(store, _)| store)
    }

    /// The worst replica holder: lowest distinct score, then highest region
    /// score, then lowest id. The choice is made before filtering; a worst
    /// store that fails the filters blocks selection instead of shifting it
    /// to the next candidate.
    pub fn select_source(&self, cluster: &dyn Cluster, stores: &[Store]) -> Option<Store> {
        let mut worst: Option<(Store, f64)> = None;
        for store in sorted_by_id(stores.to_vec()) {
            let score = distinct_score(&self.labels, &self.region_stores, &store);
            let is_worse = match &worst {
                None => true,
                Some((held, held_score)) => {
                    score < *held_score
                        || (score == *held_score
                            && store.resource_score(ResourceKind::Region, 0)
                                > held.resource_score(ResourceKind::Region, 0))
                }
            };
            if is_worse {
                worst = Some((store, score));
            }
        }
        let (store, _) = worst?;
        if filter_source(cluster, &store, &self.filters) {
            return None;
        }
        Some(store)
    }
}

/// Picks a uniformly random store passing the pipeline.
pub struct RandomSelector {
    filters: Vec<Box<dyn Filter>>,
}

impl RandomSelector {
    /// A selector over the given pipeline.
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// A random store usable as a source.
    pub fn select_source(
        &self,
        cluster: &dyn Cluster,
        stores: &[Store],
        rng: &mut StdRng,
    ) -> Option<Store> {
        let candidates: Vec<Store> = sorted_by_id(stores.to_vec())
            .into_iter()
            .filter(|s| !filter_source(cluster, s, &self.filters))
            .collect();
        pick(candidates, rng)
    }

    /// A random store usable as a target.
    pub fn select_target(
        &self,
        cluster: &dyn Cluster,
        stores: &[Store],
        rng: &mut StdRng,
    ) -> Option<Store> {
        let candidates: Vec<Store> = sorted_by_id(stores.to_vec())
            .into_iter()
            .filter(|s| !filter_target(cluster, s, &self.filters))
            .collect();
        pick(candidates, rng)
    }
}

fn pick(candidates: Vec<Store>, rng: &mut StdRng) -> Option<Store> {
    if candidates.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..candidates.len());
    candidates.into_iter().nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_model::StoreId;

    fn labeled(id: u64, zone: &str, rack: &str, host: &str) -> Store {
        let mut store = Store::new(StoreId::new(id));
        store.labels.insert("zone".into(), zone.into());
        store.labels.insert("rack".into(), rack.into());
        store.labels.insert("host".into(), host.into());
        store
    }

    fn location_labels() -> Vec<String> {
        vec!["zone".into(), "rack".into(), "host".into()]
    }

    #[test]
    fn distinct_score_weights_earlier_labels_heavier() {
        let labels = location_labels();
        let existing = vec![labeled(1, "z1", "r1", "h1")];
        // Zone difference dominates rack, which dominates host.
        assert_eq!(distinct_score(&labels, &existing, &labeled(2, "z2", "r1", "h1")), 16.0);
        assert_eq!(distinct_score(&labels, &existing, &labeled(3, "z1", "r2", "h1")), 4.0);
        assert_eq!(distinct_score(&labels, &existing, &labeled(4, "z1", "r1", "h2")), 1.0);
        assert_eq!(distinct_score(&labels, &existing, &labeled(5, "z1", "r1", "h1")), 0.0);
    }

    #[test]
    fn distinct_score_sums_over_existing_stores() {
        let labels = location_labels();
        let existing = vec![
            labeled(1, "z1", "r1", "h1"),
            labeled(2, "z1", "r2", "h1"),
        ];
        // Differs from store 1 at rack level and matches nothing of store 2
        // until host.
        let candidate = labeled(3, "z1", "r2", "h2");
        assert_eq!(distinct_score(&labels, &existing, &candidate), 4.0 + 1.0);
    }

    #[test]
    fn distinct_score_skips_self() {
        let labels = location_labels();
        let existing = vec![labeled(1, "z1", "r1", "h1"), labeled(2, "z2", "r1", "h1")];
        let candidate = labeled(1, "z1", "r1", "h1");
        assert_eq!(distinct_score(&labels, &existing, &candidate), 16.0);
    }
}
