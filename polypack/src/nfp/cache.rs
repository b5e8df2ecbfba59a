use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geo::Polygon;

use crate::geometry::Piece;

/// Position-independent cache key for an (orbiting, stationary) pair.
///
/// The per-piece fingerprint hashes the outer vertices normalised to the
/// bbox min-corner together with rotation, area and vertex count, so two
/// translated copies of the same oriented piece share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NfpKey(u64, u64);

impl NfpKey {
    pub fn for_pair(orbiting: &Piece, stationary: &Piece) -> NfpKey {
        NfpKey(fingerprint(orbiting), fingerprint(stationary))
    }
}

fn fingerprint(piece: &Piece) -> u64 {
    let mut hasher = DefaultHasher::new();
    piece.rotation().to_bits().hash(&mut hasher);
    piece.area().to_bits().hash(&mut hasher);
    piece.vertex_count().hash(&mut hasher);

    let bbox = piece.bbox();
    for ring in piece.outer_rings() {
        for c in &ring.0 {
            (c.x - bbox.x_min).to_bits().hash(&mut hasher);
            (c.y - bbox.y_min).to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Snapshot of the cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Cache of normalised NFPs (stationary piece at the origin), keyed
/// position-independently. `None` entries record pairs whose Minkowski sum
/// came out empty, so the failure is not recomputed.
///
/// Lookups and inserts serialise through a mutex: one cache instance may be
/// shared by bins evaluated in parallel.
#[derive(Debug, Default)]
pub struct NfpCache {
    map: Mutex<HashMap<NfpKey, Option<Arc<Polygon<f64>>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl NfpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `key`, counting a hit or a miss.
    pub fn lookup(&self, key: NfpKey) -> Option<Option<Arc<Polygon<f64>>>> {
        let map = self.map.lock().expect("nfp cache poisoned");
        match map.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: NfpKey, nfp: Option<Arc<Polygon<f64>>>) {
        let mut map = self.map.lock().expect("nfp cache poisoned");
        map.insert(key, nfp);
    }

    /// Drops all entries and resets the counters.
    pub fn clear(&self) {
        let mut map = self.map.lock().expect("nfp cache poisoned");
        map.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let map = self.map.lock().expect("nfp cache poisoned");
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: map.len(),
        }
    }
}
