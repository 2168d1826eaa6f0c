use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use resolver::Endpoint;

/// spec.md §3 "Endpoints (collection)": an ordered set of [`Endpoint`]
/// carrying a derived `hash(writable)` used as the pool's queue key.
#[derive(Debug, Clone)]
pub struct Endpoints {
    set: BTreeSet<Endpoint>,
}

impl Endpoints {
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Endpoints { set: endpoints.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.set.iter()
    }

    /// Combines every member endpoint's identity with `writable` into one
    /// pool-queue key (spec.md §4.D "computes `hash = hash(endpoints,
    /// writable)`").
    pub fn hash(&self, writable: bool) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for endpoint in &self.set {
            endpoint.to_uri_string().hash(&mut hasher);
        }
        writable.hash(&mut hasher);
        hasher.finish()
    }
}
